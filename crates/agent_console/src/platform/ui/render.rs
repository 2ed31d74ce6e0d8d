use agent_core::{prompt_label, AppViewModel, ConnectionView};

use super::commands::{CMD_RECONNECT, CMD_STOP};

/// Lines describing the current view, top to bottom.
pub(crate) fn render(view: &AppViewModel) -> Vec<String> {
    let mut lines = vec![connection_line(&view.connection)];

    match &view.task_id {
        Some(task_id) => {
            let thinking = if view.thinking { " (thinking)" } else { "" };
            lines.push(format!("Task {task_id} | {}{thinking}", view.status));
        }
        None => lines.push(format!("Status: {}", view.status)),
    }

    if let Some(message) = &view.user_message {
        lines.push(format!("You:   {message}"));
    }
    if let Some(text) = view.agent_text() {
        lines.push(format!("Agent: {text}"));
    }

    match (&view.displayed_screenshot, view.screenshot_loading) {
        (Some(url), true) => lines.push(format!(
            "Screenshot: {} (newer one loading)",
            describe_screenshot(url)
        )),
        (Some(url), false) => lines.push(format!("Screenshot: {}", describe_screenshot(url))),
        (None, true) => lines.push("Screenshot: loading...".to_string()),
        (None, false) => {}
    }

    let mut prompt = format!("> {}", prompt_label(view.status));
    if view.can_stop {
        prompt.push_str(&format!(" ({CMD_STOP} to stop)"));
    }
    lines.push(prompt);
    lines
}

fn connection_line(connection: &ConnectionView) -> String {
    let line = match connection {
        ConnectionView::Connected => "[live] Connected".to_string(),
        ConnectionView::Disconnected => "[offline] Disconnected".to_string(),
        ConnectionView::Reconnecting { attempt } => {
            format!("[offline] Reconnecting (attempt {attempt})")
        }
        ConnectionView::ServerShutdown { message } => format!("[shutdown] {message}"),
        ConnectionView::GaveUp { message } => format!("[offline] {message}"),
    };
    if connection.needs_manual_reconnect() {
        format!("{line} | type {CMD_RECONNECT}")
    } else {
        line
    }
}

/// Short description of a screenshot URL; data URIs are summarised, not printed.
pub(crate) fn describe_screenshot(url: &str) -> String {
    let Some(rest) = url.strip_prefix("data:") else {
        return url.to_string();
    };
    let (meta, payload) = rest.split_once(',').unwrap_or((rest, ""));
    let mime = meta.split(';').next().filter(|mime| !mime.is_empty());
    let kib = payload.len() * 3 / 4 / 1024;
    format!("{} ({} KiB)", mime.unwrap_or("image"), kib)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::TaskStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn running_task_view() {
        let view = AppViewModel {
            status: TaskStatus::Running,
            task_id: Some("t1".to_string()),
            user_message: Some("Buy 1 SOL on Jupiter".to_string()),
            instruction: Some("Opening Jupiter".to_string()),
            thinking: true,
            is_running: true,
            displayed_screenshot: Some(format!("data:image/jpeg;base64,{}", "A".repeat(4096))),
            connection: ConnectionView::Connected,
            can_stop: true,
            ..AppViewModel::default()
        };
        assert_eq!(
            render(&view),
            vec![
                "[live] Connected",
                "Task t1 | RUNNING (thinking)",
                "You:   Buy 1 SOL on Jupiter",
                "Agent: Opening Jupiter",
                "Screenshot: image/jpeg (3 KiB)",
                "> Agent is running... (/stop to stop)",
            ]
        );
    }

    #[test]
    fn idle_view_with_shutdown_banner() {
        let view = AppViewModel {
            connection: ConnectionView::ServerShutdown {
                message: "Server is shutting down: maintenance".to_string(),
            },
            ..AppViewModel::default()
        };
        assert_eq!(
            render(&view),
            vec![
                "[shutdown] Server is shutting down: maintenance | type /reconnect",
                "Status: IDLE",
                "> Type your instruction...",
            ]
        );
    }

    #[test]
    fn pending_screenshot_without_current_one() {
        let view = AppViewModel {
            status: TaskStatus::Init,
            task_id: Some("t1".to_string()),
            reply: Some("Processing...".to_string()),
            screenshot_loading: true,
            connection: ConnectionView::Reconnecting { attempt: 2 },
            can_stop: true,
            ..AppViewModel::default()
        };
        let lines = render(&view);
        assert_eq!(lines[0], "[offline] Reconnecting (attempt 2)");
        assert!(lines.contains(&"Agent: Processing...".to_string()));
        assert!(lines.contains(&"Screenshot: loading...".to_string()));
    }

    #[test]
    fn remote_screenshot_url_is_shown_verbatim() {
        assert_eq!(
            describe_screenshot("https://cdn.example.com/shot.png"),
            "https://cdn.example.com/shot.png"
        );
    }
}
