mod config;
mod controller;
mod format;
mod gateway;
mod ipc;
mod notify;
mod record;
mod schema;
mod screen;
mod service;
mod stats;

use std::io::{self, BufRead, Write};

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    // stdout carries the protocol; diagnostics go to stderr.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("campusd=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn initial_state(config: &config::Config) -> Option<ipc::AppState> {
    match ipc::AppState::from_config(config) {
        Ok(state) => return Some(state),
        Err(e) => warn!(error = %e, "startup workspace unavailable, using mock data"),
    }
    match ipc::AppState::mock(config.load_policy) {
        Ok(state) => Some(state),
        Err(e) => {
            error!(error = %e, "mock data failed to load");
            None
        }
    }
}

fn main() {
    init_tracing();

    let config = config::Config::from_env();
    let Some(mut state) = initial_state(&config) else {
        std::process::exit(1);
    };
    info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = state.service.name(),
        policy = config.load_policy.as_str(),
        "campusd ready"
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
