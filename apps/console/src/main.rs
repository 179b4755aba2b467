use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use client_core::{load_settings, AppState, ConnectionManager, Store};
use shared::domain::{ConnectionState, StatusNotice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;
use transmission::{
    input::{InputEvent, Key},
    Command, ControlState,
};

/// Rides the simulator from a terminal. One command per line: `left`,
/// `right`, `c`, `u`, `d`, `n`, a digit, `!` for full throttle, a command
/// name such as `shift_up`, `status`, `quit`.
#[derive(Parser, Debug)]
struct Args {
    /// Simulator websocket endpoint; overrides `client.toml` and environment.
    #[arg(long)]
    url: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Line {
    Input(InputEvent),
    Command(Command),
    Status,
    Quit,
    Unknown,
}

fn parse_line(line: &str) -> Line {
    let line = line.trim();
    match line.to_ascii_lowercase().as_str() {
        "quit" | "q" | "exit" => Line::Quit,
        "status" | "s" => Line::Status,
        "left" => Line::Input(InputEvent::key(Key::ArrowLeft)),
        "right" => Line::Input(InputEvent::key(Key::ArrowRight)),
        "!" => Line::Input(InputEvent::shifted(Key::Char('1'))),
        _ => {
            let mut chars = line.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Line::Input(InputEvent::key(Key::Char(c))),
                (Some(_), Some(_)) => line
                    .parse::<Command>()
                    .map_or(Line::Unknown, Line::Command),
                _ => Line::Unknown,
            }
        }
    }
}

// What the status line shows; telemetry alone does not reprint it.
#[derive(PartialEq)]
struct Dashboard {
    control: ControlState,
    connection: ConnectionState,
    notice: Option<StatusNotice>,
}

fn print_dashboard(state: &AppState) {
    let control = &state.control;
    let notice = state
        .active_notice(Utc::now())
        .map(|notice| format!(" | {:?}: {}", notice.severity, notice.text))
        .unwrap_or_default();
    println!(
        "[{:?}#{}] gear {} clutch {:.2} throttle {:.0}%{notice}",
        state.connection.status,
        state.connection.attempt,
        control.gear,
        control.clutch_position,
        control.throttle_position,
    );
}

fn print_telemetry(state: &AppState) {
    let t = &state.telemetry;
    println!(
        "rpm {:.0} | speed {:.1} | power {:.1} | torque {:.1} | gear {}",
        t.rpm, t.speed, t.power, t.torque, t.gear
    );
    println!(
        "temp {:.1} | afr {:.2}/{:.2} | injection {:.2}ms | advance {:.1}",
        t.engine_temp, t.afr_current, t.afr_target, t.fuel_injection_ms, t.ignition_advance
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.url {
        settings.ws_url = Some(url);
    }
    let endpoint = settings
        .endpoint_url()
        .context("resolving simulator endpoint")?;

    let manager = ConnectionManager::new(settings.reconnect_policy());
    let store = Store::new(manager.clone());
    let pump = store.attach(&manager);

    let last = Mutex::new(None::<Dashboard>);
    let _dashboard = store.subscribe(move |state| {
        let next = Dashboard {
            control: state.control,
            connection: state.connection,
            notice: state.notice.clone(),
        };
        let mut last = last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if last.as_ref() != Some(&next) {
            print_dashboard(state);
            *last = Some(next);
        }
    });

    info!(%endpoint, "starting simulator link");
    manager.start(endpoint.as_str());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        match parse_line(&line) {
            Line::Quit => break,
            Line::Status => print_telemetry(&store.state()),
            Line::Input(event) => {
                if !store.dispatch_input(event) {
                    println!("unbound key '{}'", line.trim());
                }
            }
            Line::Command(command) => store.dispatch_command(command),
            Line::Unknown => println!("unknown command '{}'", line.trim()),
        }
    }

    manager.stop();
    pump.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_words_and_single_keys() {
        assert_eq!(parse_line(" quit "), Line::Quit);
        assert_eq!(parse_line("status"), Line::Status);
        assert_eq!(
            parse_line("LEFT"),
            Line::Input(InputEvent::key(Key::ArrowLeft))
        );
        assert_eq!(
            parse_line("7"),
            Line::Input(InputEvent::key(Key::Char('7')))
        );
        assert_eq!(
            parse_line("!"),
            Line::Input(InputEvent::shifted(Key::Char('1')))
        );
        assert_eq!(parse_line("shift_up"), Line::Command(Command::ShiftUp));
        assert_eq!(
            parse_line(" Toggle_Clutch "),
            Line::Command(Command::ToggleClutch)
        );
        assert_eq!(parse_line("shift"), Line::Unknown);
        assert_eq!(parse_line(""), Line::Unknown);
    }
}
