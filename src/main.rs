//! Viamon - Serial capture console for the VIA spectrometer payload
//!
//! Subcommands cover the operator workflows: interactive console and
//! passive monitor (session capture), one-shot measurement capture, offline
//! log extraction, SD card file transfer, and the ground-station radio
//! receiver.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use viamon_core::cli::ExitCodes;
use viamon_core::config::AppConfig;
use viamon_core::core::classifier::{Classifier, LineClass};
use viamon_core::core::console::{run_session, ConsoleMode};
use viamon_core::core::file_transfer::{FileTransferClient, TransferConfig, TransferError};
use viamon_core::core::ground::{RadioEvent, RadioFramer};
use viamon_core::core::line_reader::LineReassembler;
use viamon_core::core::progress::ProgressBar;
use viamon_core::core::session::{CaptureEvent, EngineConfig, SessionEngine};
use viamon_core::core::sink::SessionSink;
use viamon_core::core::transport::{
    create_transport, list_ports, SerialConfig, Transport, TransportError, TransportTrait,
};

/// Serial capture console for the VIA spectrometer payload
#[derive(Parser, Debug)]
#[command(
    name = "viamon",
    author = "Viamon Team",
    version,
    about = "Serial capture console for the VIA spectrometer payload",
    long_about = None
)]
struct Cli {
    /// Verbose output (echo block-internal data lines)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive console with automatic session capture
    Console {
        /// Serial port (e.g., /dev/ttyACM0, COM3)
        port: String,

        /// Baud rate override
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// Passive session monitor with per-measurement extraction
    Monitor {
        /// Serial port
        port: String,

        /// Baud rate override
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// Send one measure command and capture a single CSV block
    Capture {
        /// Serial port
        port: String,

        /// Output CSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Baud rate override
        #[arg(short, long)]
        baud: Option<u32>,

        /// Command to send (default from config: VIA_MEASURE)
        #[arg(long)]
        command: Option<String>,
    },

    /// Re-extract measurement artifacts from a saved session log
    Extract {
        /// Session log file
        log: PathBuf,
    },

    /// File transfer client for the payload's SD card
    Transfer {
        /// Serial port
        port: String,

        /// Baud rate override
        #[arg(short, long)]
        baud: Option<u32>,

        #[command(subcommand)]
        action: TransferAction,
    },

    /// Ground-station receiver for the radio downlink
    Ground {
        /// Serial port of the receiver
        port: String,

        /// Baud rate override (receiver default is 9600)
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// List available serial ports
    ListPorts,
}

#[derive(Subcommand, Debug)]
enum TransferAction {
    /// List files on the SD card
    List,

    /// Download a file
    Get {
        /// Remote filename
        name: String,

        /// Local destination path (default: the remote name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load();

    let code = match run(cli, config).await {
        Ok(()) => ExitCodes::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    };
    ExitCode::from(code)
}

async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Console { port, baud } => {
            run_capture_session(
                &port,
                baud.unwrap_or(config.baud),
                &config,
                ConsoleMode::Interactive,
                cli.verbose,
            )
            .await
        }
        Commands::Monitor { port, baud } => {
            run_capture_session(
                &port,
                baud.unwrap_or(config.baud),
                &config,
                ConsoleMode::Monitor,
                cli.verbose,
            )
            .await
        }
        Commands::Capture {
            port,
            output,
            baud,
            command,
        } => {
            let command = command.unwrap_or_else(|| config.measure_command.clone());
            run_oneshot_capture(&port, baud.unwrap_or(config.baud), &command, &output).await
        }
        Commands::Extract { log } => run_extract(&log),
        Commands::Transfer { port, baud, action } => {
            run_transfer(&port, baud.unwrap_or(config.baud), &config, action).await
        }
        Commands::Ground { port, baud } => {
            run_ground(&port, baud.unwrap_or(config.ground_baud), &config, cli.verbose).await
        }
        Commands::ListPorts => {
            for info in list_ports()? {
                println!("{}", info.port_name);
            }
            Ok(())
        }
    }
}

/// Map an error chain to the process exit code.
fn exit_code_for(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if cause.downcast_ref::<TransportError>().is_some() {
            return ExitCodes::CONNECTION_FAILED;
        }
        if let Some(t) = cause.downcast_ref::<TransferError>() {
            return match t {
                TransferError::Timeout(_) => ExitCodes::TIMEOUT,
                TransferError::Transport(_) => ExitCodes::CONNECTION_FAILED,
                _ => ExitCodes::TRANSFER_FAILED,
            };
        }
        if cause.downcast_ref::<viamon_core::SinkError>().is_some()
            || cause.downcast_ref::<std::io::Error>().is_some()
        {
            return ExitCodes::FILESYSTEM;
        }
    }
    ExitCodes::INTERNAL_ERROR
}

async fn open_transport(port: &str, baud: u32) -> anyhow::Result<Box<dyn TransportTrait>> {
    let mut transport = create_transport(Transport::Serial(SerialConfig::new(port, baud)))?;
    transport.connect().await?;
    Ok(transport)
}

fn banner(title: &str, rows: &[(&str, String)]) {
    let rule = "=".repeat(55);
    println!("{rule}");
    println!("  {title}");
    println!("{rule}");
    for (key, value) in rows {
        println!("  {key:<13}{value}");
    }
    println!("{rule}");
    println!();
}

async fn run_capture_session(
    port: &str,
    baud: u32,
    config: &AppConfig,
    mode: ConsoleMode,
    verbose: bool,
) -> anyhow::Result<()> {
    let transport = open_transport(port, baud).await?;
    let sink = SessionSink::open(&config.output_dir())?;

    banner(
        match mode {
            ConsoleMode::Interactive => "VIA Interactive Console",
            ConsoleMode::Monitor => "VIA Data Monitor",
        },
        &[
            ("Port:", format!("{port} @ {baud} baud")),
            ("Session dir:", sink.dir().display().to_string()),
            (
                "Log file:",
                sink.log_filename().unwrap_or_default(),
            ),
            ("Verbose:", if verbose { "ON" } else { "OFF" }.to_string()),
        ],
    );
    println!("Auto-saving: full log + CSV/TXT per measurement");
    println!("Ctrl+C to exit");
    println!();

    let shutdown = Arc::new(AtomicBool::new(false));
    if mode == ConsoleMode::Monitor {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;
    }

    let engine = SessionEngine::new(
        sink,
        EngineConfig {
            verbose,
            ..EngineConfig::default()
        },
    );
    let session_dir = engine.sink().dir().to_path_buf();

    run_session(transport, engine, mode, verbose, shutdown).await?;

    println!();
    println!("Session closed");
    println!("Data saved in: {}", session_dir.display());
    Ok(())
}

/// One-shot capture: a degenerate run of the section state machine that
/// collects exactly one CSV block and exits.
async fn run_oneshot_capture(
    port: &str,
    baud: u32,
    command: &str,
    output: &std::path::Path,
) -> anyhow::Result<()> {
    let mut transport = open_transport(port, baud).await?;

    println!("Sending command: {command}");
    transport.send(format!("{command}\n").as_bytes()).await?;

    let classifier = Classifier::new();
    let mut lines = LineReassembler::new();
    let mut rows: Vec<(u32, i32)> = Vec::new();
    let mut in_csv = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(120);

    'outer: loop {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("timed out waiting for CSV data");
        }
        let chunk = transport.receive().await?;
        if chunk.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }
        for line in lines.push(&chunk) {
            let line = line.trim();
            println!("{line}");
            match classifier.classify(line) {
                LineClass::CsvStart => {
                    in_csv = true;
                    rows.clear();
                }
                LineClass::CsvEnd if in_csv => break 'outer,
                LineClass::CsvData if in_csv => {
                    if let Some(row) = Classifier::parse_csv_row(line) {
                        rows.push(row);
                    }
                }
                _ => {}
            }
        }
    }
    let _ = transport.disconnect().await;

    if rows.is_empty() {
        anyhow::bail!("no CSV data captured");
    }
    let mut body = String::from("Pixel,Intensity\n");
    for (pixel, intensity) in &rows {
        body.push_str(&format!("{pixel},{intensity}\n"));
    }
    std::fs::write(output, body)?;
    println!();
    println!("Saved {} rows to {}", rows.len(), output.display());
    Ok(())
}

/// Offline extraction: re-run the session engine over a saved log.
fn run_extract(log: &std::path::Path) -> anyhow::Result<()> {
    let content = std::fs::read(log)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", log.display()))?;
    let dir = log
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let stem = log
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "VIA".to_string());

    println!("Processing: {}", log.display());

    let sink = SessionSink::derived(dir, &stem);
    let mut engine = SessionEngine::new(sink, EngineConfig::default());

    let mut extracted = 0usize;
    let mut events = engine.feed(&content);
    events.extend(engine.finish());
    for event in events {
        if let CaptureEvent::Saved { path, lines } = event {
            extracted += 1;
            println!("  {} ({lines} lines)", path.display());
        }
    }

    println!("Extracted {extracted} artifacts");
    Ok(())
}

async fn run_transfer(
    port: &str,
    baud: u32,
    config: &AppConfig,
    action: TransferAction,
) -> anyhow::Result<()> {
    let transport = open_transport(port, baud).await?;
    let mut client = FileTransferClient::new(
        transport,
        TransferConfig {
            response_timeout: Duration::from_secs(config.response_timeout_secs),
            data_timeout: Duration::from_secs(config.data_timeout_secs),
        },
    );

    match action {
        TransferAction::List => {
            let files = client.list_files().await?;
            println!("Files on SD card:");
            for file in &files {
                println!("  {:<30} {:>10} bytes", file.name, file.size);
            }
            println!("Total files: {}", files.len());
        }
        TransferAction::Get { name, output } => {
            let dest = output.unwrap_or_else(|| PathBuf::from(&name));
            client.set_progress_hook(|received, declared| {
                let pct = if declared > 0 {
                    received * 100 / declared
                } else {
                    0
                };
                println!("  Progress: {pct}% ({received}/{declared} bytes)");
            });
            let download = client.get_file(&name, &dest).await?;
            if let Some(warning) = &download.warning {
                eprintln!("warning: {warning}");
            }
            println!(
                "Received {} bytes, saved to {}",
                download.actual,
                download.path.display()
            );
        }
    }
    Ok(())
}

async fn run_ground(
    port: &str,
    baud: u32,
    config: &AppConfig,
    verbose: bool,
) -> anyhow::Result<()> {
    let mut transport = open_transport(port, baud).await?;
    let mut sink = SessionSink::open(&config.output_dir())?;

    banner(
        "VIA Ground Station Receiver",
        &[
            ("Port:", format!("{port} @ {baud} baud")),
            ("Session dir:", sink.dir().display().to_string()),
            (
                "Log file:",
                sink.log_filename().unwrap_or_default(),
            ),
            ("Verbose:", if verbose { "ON" } else { "OFF" }.to_string()),
        ],
    );
    println!("Waiting for VIA data... Ctrl+C to exit");
    println!();

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;
    }

    let mut framer = RadioFramer::new();
    let mut bar = ProgressBar::new().with_width(config.progress_width);
    let mut frame_count = 0usize;

    while !shutdown.load(Ordering::Relaxed) {
        let chunk = match transport.receive().await {
            Ok(chunk) => chunk,
            Err(TransportError::Disconnected) => break,
            Err(e) => return Err(e.into()),
        };
        if chunk.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }

        if let Err(e) = sink.append_log(&String::from_utf8_lossy(&chunk)) {
            tracing::warn!("session log write failed: {e}");
        }

        for event in framer.push(&chunk) {
            match event {
                RadioEvent::Line(line) => {
                    if verbose {
                        println!("RX: {line}");
                    }
                }
                RadioEvent::FrameStarted { declared } => {
                    println!("Receiving VIA measurement ({declared} bytes expected)");
                }
                RadioEvent::Progress { received, declared } => {
                    if !verbose {
                        bar.update(received, declared, "Radio RX");
                    }
                }
                RadioEvent::Frame { payload, declared } => {
                    if !verbose {
                        bar.finish("Radio RX", declared, payload.len());
                    }
                    frame_count += 1;
                    match sink.write_radio_frame(&payload) {
                        Ok(path) => {
                            println!(
                                "Measurement #{frame_count} saved: {} ({} bytes)",
                                path.display(),
                                payload.len()
                            );
                            println!("Waiting for next transmission...");
                            println!();
                        }
                        Err(e) => eprintln!("write error: {e}"),
                    }
                }
            }
        }
    }
    bar.abandon();
    let _ = transport.disconnect().await;

    println!();
    println!("Ground station closed");
    println!("Data saved in: {}", sink.dir().display());
    println!("Measurements received: {frame_count}");
    Ok(())
}
