//! # ShackMate CI-V
//!
//! Runs one station accessory on the CI-V bus.
//!
//! Frames arrive as raw bytes on one or two serial buses and as hex text
//! lines on stdin (the uplink). Replies go back to wherever the request came
//! from; bridging controllers also relay bus traffic to stdout and uplink
//! traffic onto the buses. Logs are written to stderr.

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Interval};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use shackmate_civ::civ::decoder::FrameDecoder;
use shackmate_civ::config::{Config, LoggingConfig};
use shackmate_civ::device::LoggingHooks;
use shackmate_civ::engine::CivEngine;
use shackmate_civ::serial::port_trait::TokioSerialPort;
use shackmate_civ::serial::{read_loop, BusChunk, BusSet, CivSerial};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Bus chunks queued between reader tasks and the processing task
const BUS_CHANNEL_CAPACITY: usize = 64;

/// Main entry point
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration (first argument or `config/default.toml`)
///    - Set up logging (stderr, plus daily files when `logging.log_dir` is set)
///    - Open the configured serial buses and spawn one reader task per bus
///
/// 2. **Main Loop**
///    - Decode bus bytes, answer frames, relay when bridging
///    - Answer hex lines from stdin, relay them onto the buses when bridging
///    - Log a JSON statistics snapshot every `stats.report_interval_s`
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C or all buses closing ends the loop
///    - Final statistics snapshot is logged
///
/// # Errors
///
/// Returns error if the configuration is invalid or no serial bus can be
/// opened.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    let _log_guard = init_logging(&config.logging)?;

    info!("ShackMate CI-V v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut engine = CivEngine::new(
        config.identity(),
        config.initial_state(),
        config.engine_settings(),
        LoggingHooks,
    );

    // One reader task per bus, all feeding this task
    let (tx, mut rx) = mpsc::channel::<BusChunk>(BUS_CHANNEL_CAPACITY);
    let mut buses: BusSet<TokioSerialPort> = BusSet::new();
    let mut decoders: Vec<FrameDecoder> = Vec::new();

    for serial in CivSerial::open_buses(&config.serial.ports, config.serial.baud_rate)? {
        let bus = serial.bus();
        let (reader, writer) = serial.into_split();
        buses.push(writer);

        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = read_loop(bus, reader, tx).await {
                error!("{}", e);
            }
        });
    }
    drop(tx);

    for _ in 0..config.serial.ports.len() {
        decoders.push(FrameDecoder::with_capacity(config.decoder.max_frame_len));
    }

    let mut uplink = BufReader::new(tokio::io::stdin()).lines();
    let mut uplink_open = true;
    let mut stdout = tokio::io::stdout();

    let mut report = (config.stats.report_interval_s > 0)
        .then(|| interval(Duration::from_secs(config.stats.report_interval_s)));

    info!("Listening on {} bus(es), uplink on stdin/stdout", buses.len());
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            chunk = rx.recv() => match chunk {
                Some(chunk) => {
                    handle_bus_chunk(&mut engine, &mut decoders, &mut buses, &mut stdout, chunk).await;
                }
                None => {
                    warn!("All CI-V buses closed, shutting down...");
                    break;
                }
            },

            line = uplink.next_line(), if uplink_open => match line {
                Ok(Some(line)) => {
                    handle_uplink_line(&mut engine, &mut buses, &mut stdout, &line).await;
                }
                Ok(None) => {
                    info!("Uplink closed, continuing with buses only");
                    uplink_open = false;
                }
                Err(e) => {
                    warn!("Uplink read failed: {}", e);
                    uplink_open = false;
                }
            },

            _ = next_report(&mut report) => log_stats(&engine),

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    log_stats(&engine);
    Ok(())
}

/// Set up the tracing subscriber
///
/// `RUST_LOG` wins over `logging.level` when set.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level '{}'", logging.level))?,
    };

    match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shackmate-civ.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Decode bytes from one bus, answer and relay complete frames
async fn handle_bus_chunk(
    engine: &mut CivEngine<LoggingHooks>,
    decoders: &mut [FrameDecoder],
    buses: &mut BusSet<TokioSerialPort>,
    stdout: &mut Stdout,
    chunk: BusChunk,
) {
    let Some(decoder) = decoders.get_mut(chunk.bus.index()) else {
        warn!("{}: no decoder, dropping {} bytes", chunk.bus, chunk.bytes.len());
        return;
    };

    for &byte in chunk.bytes.iter() {
        let Some(decoded) = decoder.feed_raw(byte) else {
            continue;
        };
        let now = Instant::now();

        match decoded {
            Ok(raw) => {
                if let Some(hex) = engine.relay_to_uplink(chunk.bus, &raw.raw, now) {
                    write_uplink(stdout, &hex).await;
                }
                if let Some(reply) = engine.handle_frame(&raw.frame, now) {
                    if let Err(e) = buses.send(chunk.bus, &reply).await {
                        warn!("Reply not sent: {}", e);
                    }
                }
            }
            Err(e) => {
                engine.handle_decoded(Err(e), now);
            }
        }
    }
}

/// Answer one hex line from the uplink and relay it when bridging
async fn handle_uplink_line(
    engine: &mut CivEngine<LoggingHooks>,
    buses: &mut BusSet<TokioSerialPort>,
    stdout: &mut Stdout,
    line: &str,
) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    let now = Instant::now();

    if let Some(reply) = engine.handle_hex(line, now) {
        write_uplink(stdout, &reply).await;
    }

    if let Some(frame) = engine.relay_to_buses(line, now) {
        if let Err(e) = buses.send_all(&frame).await {
            warn!("Uplink frame not relayed: {}", e);
        }
    }
}

/// Write one hex line to the uplink
async fn write_uplink(stdout: &mut Stdout, hex: &str) {
    let line = format!("{}\n", hex);
    if let Err(e) = stdout.write_all(line.as_bytes()).await {
        warn!("Uplink write failed: {}", e);
        return;
    }
    if let Err(e) = stdout.flush().await {
        warn!("Uplink flush failed: {}", e);
    }
}

/// Wait for the next report tick, forever when reports are disabled
async fn next_report(report: &mut Option<Interval>) {
    match report {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn log_stats(engine: &CivEngine<LoggingHooks>) {
    match engine.snapshot().to_json() {
        Ok(json) => info!("Stats: {}", json),
        Err(e) => warn!("Failed to serialize stats: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path() {
        assert_eq!(DEFAULT_CONFIG_PATH, "config/default.toml");
    }

    #[tokio::test]
    async fn test_next_report_ticks_when_enabled() {
        let mut report = Some(interval(Duration::from_millis(1)));
        // First tick of a tokio interval completes immediately
        tokio::time::timeout(Duration::from_secs(1), next_report(&mut report))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_next_report_pends_when_disabled() {
        let mut report: Option<Interval> = None;
        let result = tokio::time::timeout(Duration::from_millis(20), next_report(&mut report)).await;
        assert!(result.is_err());
    }
}
