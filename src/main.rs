use color_eyre::{eyre::eyre, Result};
use couchpad::config::AppConfig;
use couchpad::controller::{FramePacer, GilrsSource, SamplerHandle};
use couchpad::dispatch;
use couchpad::executor::ExecutorHandle;
use couchpad::mapping::MappingTable;
use couchpad::surface::document::{Document, MediaElement};
use couchpad::surface::SurfaceSlot;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load().map_err(|e| eyre!("Failed to load configuration: {}", e))?;
    info!(
        "Configuration loaded (deadzone {}, {} Hz, volume step {})",
        config.sampling.deadzone, config.sampling.refresh_hz, config.volume.step
    );

    let shutdown = CancellationToken::new();
    let close = CancellationToken::new();
    let (dispatch_tx, dispatch_rx) = dispatch::channel(config.dispatch.capacity);

    // Preview surface; a webview host attaches its own surface to the slot
    let surface = SurfaceSlot::new();
    let document = Arc::new(Document::new(vec![MediaElement::default()]));
    document.bind(dispatch_tx.clone());
    surface.attach(document.clone());
    spawn_preview_input(document);

    let mut executor = ExecutorHandle::spawn(
        dispatch_rx,
        surface.clone(),
        &config,
        close.clone(),
        shutdown.clone(),
    );
    if let Err(e) = executor.surface_loaded() {
        warn!("Could not prepare preview surface: {}", e);
    }

    let source =
        GilrsSource::new().map_err(|e| eyre!("Failed to start gamepad backend: {}", e))?;
    let frames = FramePacer::spawn(config.sampling.refresh_hz, shutdown.clone());
    let mut sampler = SamplerHandle::spawn(
        Box::new(source),
        MappingTable::standard(&config),
        dispatch_tx,
        frames,
        shutdown.clone(),
    );

    info!("couchpad running, press Ctrl-C or enter 'q' to quit");
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Ctrl-C received"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        },
        _ = close.cancelled() => info!("Close requested, shutting down"),
    }

    shutdown.cancel();
    surface.detach();
    sampler.join().await?;
    executor.join().await?;
    info!("Shutdown complete");
    Ok(())
}

/// Reads preview commands from stdin on a plain thread, so a pending read
/// never holds up runtime shutdown
fn spawn_preview_input(document: Arc<Document>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) if line.trim() == "q" => {
                    document.close();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Preview input closed: {}", e);
                    break;
                }
            }
        }
    });
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
