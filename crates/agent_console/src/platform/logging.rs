//! Logger set-up for the console.
//!
//! Logs go to `./agent_console.log` so the terminal stays free for the
//! conversation. `AGENT_CONSOLE_LOG=terminal|both` adds stderr output.

use std::path::Path;

use agent_logging::LogDestination;
use log::LevelFilter;

const LOG_PATH: &str = "./agent_console.log";
const DESTINATION_ENV: &str = "AGENT_CONSOLE_LOG";

pub(crate) fn initialize() {
    let destination = std::env::var(DESTINATION_ENV)
        .ok()
        .and_then(|value| LogDestination::parse(&value))
        .unwrap_or_default();
    agent_logging::initialize(destination, LevelFilter::Info, Path::new(LOG_PATH));
}
