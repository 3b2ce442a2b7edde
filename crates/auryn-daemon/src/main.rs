//! auryn-daemon — runs the AURYN runtime core headless.
//! Pulses on the wall clock, logs the event stream, and feeds stdin lines in as user input.

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use auryn_core::config::Config;
use auryn_core::events::{EventPayload, EventType};
use auryn_core::runtime::Runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let project_root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| project_root.join("config.yaml"));
    let loaded = Config::load(&config_path);

    // Initialize tracing
    let default_filter = loaded
        .as_ref()
        .map(|c| c.log_filter.clone())
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            info!("Using default config ({:#})", e);
            Config::default()
        }
    };

    let runtime = Runtime::new(config);

    let _event_log = runtime.bus().subscribe_all(|event| {
        debug!(
            "{} from {}: {}",
            event.event_type(),
            event.source(),
            serde_json::to_string(event.payload())?
        );
        Ok(())
    })?;
    let _error_log = runtime.bus().subscribe(EventType::Error, |event| {
        if let EventPayload::Error(data) = event.payload() {
            warn!("{} failed: {}", data.component, data.message);
        }
        Ok(())
    })?;

    runtime.init()?;
    runtime.start()?;
    eprintln!(
        "\n  AURYN pulsing every {} ms. Type to talk, Ctrl+C to stop.\n",
        runtime.config().pulse.interval_ms
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(text)) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        runtime.record_input(text)?;
                    }
                }
                Ok(None) => {
                    info!("stdin closed");
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    runtime.shutdown();
    info!(
        "Stopped after {} pulses",
        runtime.pulse().pulse_count()
    );
    Ok(())
}
