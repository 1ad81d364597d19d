/// netforge Studio
///
/// Browser front end for a no-code deep learning backend: prepare a CSV
/// dataset, lay out a feed-forward network, then start and follow training.
/// Served by a synchronous tiny_http server; no JavaScript frameworks required.
///
/// Run with:
///   cargo run --bin studio --release
/// Then open the address printed at startup (http://127.0.0.1:7878 by default).
///
/// Settings come from `netforge.toml` (or the file named by `NETFORGE_CONFIG`),
/// with `NETFORGE_BACKEND_URL` and `NETFORGE_BIND` taking precedence.
///
/// Tabs:
///   1. Data:  upload, inspect, clean and split the dataset
///   2. Model: edit layers, preview the diagram, build the configuration
///   3. Train: start a run and watch progress and metrics live

mod state;
mod render;
mod routes;
mod handlers;
mod util;

use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tiny_http::Server;

use netforge::StudioConfig;
use state::StudioState;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match StudioConfig::load() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::http(&config.bind_addr) {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to bind {}: {e}", config.bind_addr);
            return ExitCode::FAILURE;
        }
    };

    log::info!("netforge studio listening on http://{}", config.bind_addr);
    log::info!("backend: {}, training channel: {}", config.backend_url, config.channel_url());

    let shared_state = Arc::new(Mutex::new(StudioState::new(config)));

    // Each request is dispatched on its own thread so the SSE handler
    // (which blocks for the entire training run) does not stall regular
    // page loads and form submissions.
    for request in server.incoming_requests() {
        let state_clone = shared_state.clone();
        std::thread::spawn(move || {
            routes::dispatch(request, state_clone);
        });
    }
    ExitCode::SUCCESS
}
