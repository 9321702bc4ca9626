mod app;
mod config;
mod context;
mod error;
mod generator;
mod playback;
mod pulse;
mod session;
mod vibrator;

// Rumble backend. Report building is always compiled so it stays tested;
// the device side needs hidapi.
#[cfg_attr(not(feature = "dualsense"), allow(dead_code))]
mod controller;
#[cfg_attr(not(feature = "dualsense"), allow(dead_code))]
mod crc32;
#[cfg(feature = "dualsense")]
mod hid;
#[cfg_attr(not(feature = "dualsense"), allow(dead_code))]
mod rumble;

use crate::app::App;
use crate::config::{Backend, DeviceConfig};
use crate::generator::ChatCompletions;
use crate::playback::Player;
use crate::session::Session;
use crate::vibrator::{LogVibrator, Vibrator};

use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("haptic-tuner v{} starting...", env!("CARGO_PKG_VERSION"));

    let cfg = config::Config::load();

    // The API key is injected through the environment, never stored in config.
    let generator = match ChatCompletions::from_env(&cfg.generation) {
        Ok(g) => Arc::new(g),
        Err(e) => {
            log::error!("{e}");
            log::error!("Export your API key, e.g. `export {}=...`", cfg.generation.api_key_env);
            std::process::exit(1);
        }
    };
    log::info!("Generating with {} via {}", cfg.generation.model, cfg.generation.endpoint);

    let player = Player::new(build_vibrator(&cfg.device));
    let app = App::new(Session::new(cfg.max_rounds), player, generator);

    app.run(spawn_stdin_reader()).await;
    log::info!("Bye.");
}

fn build_vibrator(device: &DeviceConfig) -> Arc<dyn Vibrator> {
    match device.backend {
        Backend::Log => Arc::new(LogVibrator),
        Backend::DualSense => dualsense_vibrator(device.intensity),
    }
}

#[cfg(feature = "dualsense")]
fn dualsense_vibrator(intensity: u8) -> Arc<dyn Vibrator> {
    match hid::RumbleVibrator::connect(intensity) {
        Ok(v) => Arc::new(v),
        Err(e) => {
            log::error!("Failed to open controller: {e}. Falling back to log output.");
            Arc::new(LogVibrator)
        }
    }
}

#[cfg(not(feature = "dualsense"))]
fn dualsense_vibrator(_intensity: u8) -> Arc<dyn Vibrator> {
    log::warn!("Built without the `dualsense` feature. Falling back to log output.");
    Arc::new(LogVibrator)
}

/// Forward stdin lines to the app from a dedicated thread (reads block).
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("Failed to start input thread: {e}");
    }
    rx
}
