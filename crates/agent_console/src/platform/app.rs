use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use agent_core::{update, AppState, Msg};
use agent_logging::{agent_info, agent_warn};
use anyhow::Context;

use super::config::ClientConfig;
use super::effects::EffectRunner;
use super::logging;
use super::ui::commands::{self, Input};
use super::ui::render;

/// How often engine events are drained when the user is idle.
const TICK: Duration = Duration::from_millis(75);

enum AppEvent {
    Core(Msg),
    Help,
    Presets,
    Unknown(String),
    Quit,
}

pub fn run_app() -> anyhow::Result<()> {
    logging::initialize();

    let config = ClientConfig::load();
    let engine_config = config
        .engine_config()
        .context("invalid backend endpoint configuration")?;
    let runner = EffectRunner::new(engine_config).context("failed to start the engine")?;

    let (event_tx, event_rx) = mpsc::channel::<AppEvent>();
    spawn_input_reader(event_tx);

    let mut app = App {
        state: AppState::new(),
        runner,
        out: io::stdout(),
    };
    app.print_lines(&commands::help_lines())?;
    app.dispatch_msg(Msg::Started);

    loop {
        let event = match event_rx.recv_timeout(TICK) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => AppEvent::Core(Msg::Tick),
            Err(mpsc::RecvTimeoutError::Disconnected) => AppEvent::Quit,
        };
        match event {
            AppEvent::Core(msg) => app.dispatch_msg(msg),
            AppEvent::Help => app.print_lines(&commands::help_lines())?,
            AppEvent::Presets => app.print_lines(&commands::preset_lines())?,
            AppEvent::Unknown(command) => {
                app.print_lines(&[format!("Unknown command {command}; try /help")])?
            }
            AppEvent::Quit => break,
        }
        app.process_engine_events();
        app.render_if_dirty()?;
    }

    agent_info!("Console exiting");
    Ok(())
}

struct App {
    state: AppState,
    runner: EffectRunner,
    out: io::Stdout,
}

impl App {
    fn dispatch_msg(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.runner.enqueue(effects);
    }

    fn process_engine_events(&mut self) {
        for msg in self.runner.drain() {
            self.dispatch_msg(msg);
        }
    }

    fn render_if_dirty(&mut self) -> io::Result<()> {
        if !self.state.consume_dirty() {
            return Ok(());
        }
        let lines = render::render(&self.state.view());
        self.print_lines(&lines)
    }

    fn print_lines(&mut self, lines: &[String]) -> io::Result<()> {
        let mut out = self.out.lock();
        writeln!(out)?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }
}

fn spawn_input_reader(event_tx: mpsc::Sender<AppEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    agent_warn!("Failed to read input: {}", err);
                    break;
                }
            };
            let event = match commands::parse_input(&line) {
                Input::Instruction(text) => AppEvent::Core(Msg::InstructionSubmitted(text)),
                Input::Stop => AppEvent::Core(Msg::StopClicked),
                Input::Reconnect => AppEvent::Core(Msg::ReconnectClicked),
                Input::Help => AppEvent::Help,
                Input::Presets => AppEvent::Presets,
                Input::Unknown(command) => AppEvent::Unknown(command),
                Input::Empty => continue,
                Input::Quit => {
                    let _ = event_tx.send(AppEvent::Quit);
                    return;
                }
            };
            if event_tx.send(event).is_err() {
                return;
            }
        }
        let _ = event_tx.send(AppEvent::Quit);
    });
}
