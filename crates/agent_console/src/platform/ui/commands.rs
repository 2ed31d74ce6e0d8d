pub(crate) const CMD_STOP: &str = "/stop";
pub(crate) const CMD_RECONNECT: &str = "/reconnect";
pub(crate) const CMD_QUIT: &str = "/quit";
pub(crate) const CMD_HELP: &str = "/help";
pub(crate) const CMD_PRESETS: &str = "/presets";
pub(crate) const CMD_PRESET: &str = "/preset";

/// Canned trade instructions, picked with `/preset <n>`.
pub(crate) const PRESETS: [&str; 4] = [
    "Buy 200 USDC worth of WIF on Raydium.",
    "Swap 150 USDC for SOL on Jupiter.",
    "Send 0.5 SOL to 0xA4...F5D2.",
    "Place a limit order to buy 0.5 SOL at $85.",
];

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Input {
    /// Free text; sent to the agent (stopping a running task first).
    Instruction(String),
    Stop,
    Reconnect,
    Quit,
    Help,
    Presets,
    Unknown(String),
    Empty,
}

pub(crate) fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if !line.starts_with('/') {
        return Input::Instruction(line.to_string());
    }
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or(line);
    match command.to_ascii_lowercase().as_str() {
        CMD_STOP => Input::Stop,
        CMD_RECONNECT => Input::Reconnect,
        CMD_QUIT | "/exit" => Input::Quit,
        CMD_HELP => Input::Help,
        CMD_PRESETS => Input::Presets,
        CMD_PRESET => match words.next().and_then(preset) {
            Some(text) => Input::Instruction(text.to_string()),
            None => Input::Unknown(line.to_string()),
        },
        _ => Input::Unknown(command.to_string()),
    }
}

/// 1-based lookup.
fn preset(number: &str) -> Option<&'static str> {
    let index = number.parse::<usize>().ok()?.checked_sub(1)?;
    PRESETS.get(index).copied()
}

pub(crate) fn preset_lines() -> Vec<String> {
    PRESETS
        .iter()
        .enumerate()
        .map(|(index, text)| format!("  {CMD_PRESET} {}  {text}", index + 1))
        .collect()
}

pub(crate) fn help_lines() -> Vec<String> {
    vec![
        "Type an instruction and press Enter to send it to the agent.".to_string(),
        "Sending while a task runs stops it first.".to_string(),
        format!("  {CMD_STOP:<11} stop the running task"),
        format!("  {CMD_RECONNECT:<11} reconnect the live status channel"),
        format!("  {CMD_PRESETS:<11} list preset trade instructions"),
        format!("  {:<11} send preset <n>", format!("{CMD_PRESET} <n>")),
        format!("  {CMD_HELP:<11} show this help"),
        format!("  {CMD_QUIT:<11} exit"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_instructions() {
        assert_eq!(parse_input("  /STOP "), Input::Stop);
        assert_eq!(parse_input("/reconnect now"), Input::Reconnect);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(
            parse_input(" Buy 1 SOL on Jupiter "),
            Input::Instruction("Buy 1 SOL on Jupiter".to_string())
        );
        assert_eq!(parse_input("/dance"), Input::Unknown("/dance".to_string()));
    }

    #[test]
    fn presets_are_numbered_from_one() {
        assert_eq!(parse_input("/presets"), Input::Presets);
        assert_eq!(
            parse_input("/preset 2"),
            Input::Instruction("Swap 150 USDC for SOL on Jupiter.".to_string())
        );
        assert_eq!(
            parse_input("/preset 0"),
            Input::Unknown("/preset 0".to_string())
        );
        assert_eq!(
            parse_input("/preset 5"),
            Input::Unknown("/preset 5".to_string())
        );
        assert_eq!(parse_input("/preset"), Input::Unknown("/preset".to_string()));
        assert_eq!(
            preset_lines()[3],
            "  /preset 4  Place a limit order to buy 0.5 SOL at $85."
        );
    }
}
