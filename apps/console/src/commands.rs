use std::fmt::Write as _;

use anyhow::Context;
use model::format_lap_time;

use crate::session::AppSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Laps,
    Trails,
    Remove(u8),
    Clear,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command `{0}` (try: laps, trails, remove <lap>, clear, status, quit)")]
    Unknown(String),
    #[error("`remove` needs a lap number between 1 and 255, got `{0}`")]
    BadLap(String),
}

/// `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Ok(None);
    };
    let cmd = match word.to_ascii_lowercase().as_str() {
        "laps" => Command::Laps,
        "trails" => Command::Trails,
        "remove" => {
            let arg = words.next().unwrap_or_default();
            match arg.parse::<u8>() {
                Ok(lap) if lap > 0 => Command::Remove(lap),
                _ => return Err(CommandError::BadLap(arg.to_string())),
            }
        }
        "clear" => Command::Clear,
        "status" => Command::Status,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

/// Runs everything except `Quit` and returns what to print.
pub fn execute(session: &AppSession, cmd: Command) -> anyhow::Result<String> {
    let text = match cmd {
        Command::Laps => {
            let laps = session.laps();
            if laps.is_empty() {
                "no completed laps".to_string()
            } else {
                let mut out = String::new();
                for (entry, fastest) in laps {
                    let mark = if fastest { " *" } else { "" };
                    let _ = writeln!(out, "lap {:>3}  {}{}", entry.lap_number, format_lap_time(entry.duration_ms), mark);
                }
                out.trim_end().to_string()
            }
        }
        Command::Trails => serde_json::to_string_pretty(&session.trails()).context("serialize trails")?,
        Command::Remove(lap) => {
            if session.remove_lap(lap) {
                format!("removed lap {lap}")
            } else {
                format!("nothing recorded for lap {lap}")
            }
        }
        Command::Clear => {
            session.clear();
            "history cleared".to_string()
        }
        Command::Status => {
            let s = session.status();
            let fastest = s.fastest_ms.map(format_lap_time).unwrap_or_else(|| "-".into());
            format!(
                "link {} ({} packets)  lap {}  samples {}  trails {}  fastest {}{}",
                s.connection,
                s.packets,
                s.current_lap,
                s.samples,
                s.trails,
                fastest,
                if s.restarting { "  [restarting]" } else { "" }
            )
        }
        Command::Quit => String::new(),
    };
    Ok(text)
}
