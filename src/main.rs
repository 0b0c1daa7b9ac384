//! Vibe Bridge - local HTTP control plane for a single-threaded host.
//!
//! The process main thread is the host thread and runs the dispatcher. The
//! tokio runtime serving HTTP lives on its own thread.

use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vibe_bridge::auth::SystemClock;
use vibe_bridge::config::Settings;
use vibe_bridge::dispatch::{Dispatcher, HandlerRegistry};
use vibe_bridge::error::BridgeError;
use vibe_bridge::server::{BridgeServer, BridgeState};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_CONFIG_PATH: &str = "vibe-bridge.toml";

fn main() -> ExitCode {
    // Parse command line arguments (simple std::env approach)
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("{} {}", NAME, VERSION);
        return ExitCode::SUCCESS;
    }

    let config_path = get_config_path(&args);
    let (settings, config_source) = match load_settings(config_path.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("Error initializing logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting {} v{}", NAME, VERSION);
    info!("Configuration: {}", config_source);
    info!("Listen address: {}", settings.server.socket_addr());
    info!("Log level: {}", settings.logging.level);

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bridge failed");
            ExitCode::FAILURE
        }
    }
}

/// Start the network thread and run the dispatcher on this thread until the
/// network side stops.
fn run(settings: Settings) -> Result<(), BridgeError> {
    let (state, receiver) = BridgeState::from_settings(&settings, Arc::new(SystemClock));

    let registry = HandlerRegistry::with_host_stubs();
    registry.validate_against(state.whitelist())?;

    let mut dispatcher = Dispatcher::new(receiver, registry, &settings.dispatcher)
        .with_metrics(Arc::clone(state.metrics()))
        .with_audit_logger(state.audit_logger().cloned());

    let stopped = Arc::new(AtomicBool::new(false));
    let network = {
        let stopped = Arc::clone(&stopped);
        let state = Arc::clone(&state);
        thread::Builder::new()
            .name("vibe-bridge-net".to_string())
            .spawn(move || {
                let result = serve(settings, state);
                stopped.store(true, Ordering::Release);
                result
            })?
    };

    dispatcher.run_until(&stopped);

    match network.join() {
        Ok(result) => result,
        Err(_) => Err(BridgeError::Server {
            message: "Network thread panicked".to_string(),
        }),
    }
}

/// Serve HTTP until a shutdown signal arrives or the listener fails.
fn serve(settings: Settings, state: Arc<BridgeState>) -> Result<(), BridgeError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let server =
            BridgeServer::bind(settings.server.socket_addr(), state, &settings.limits).await?;

        let shutdown = Arc::new(Notify::new());
        let run = server.run(Arc::clone(&shutdown));
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => result,
            _ = shutdown_signal() => {
                info!("Shutdown signal received, initiating graceful shutdown...");
                shutdown.notify_one();
                run.await
            }
        }
    })
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print help message.
fn print_help() {
    println!(
        r#"{} {}
Local HTTP control plane for a single-threaded host application.

USAGE:
    {} [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file
                           [default: {}, built-in defaults if absent]
    -h, --help             Print help information
    -V, --version          Print version information
"#,
        NAME, VERSION, NAME, DEFAULT_CONFIG_PATH
    );
}

/// Get the configuration file path given on the command line, if any.
fn get_config_path(args: &[String]) -> Option<String> {
    for (i, arg) in args.iter().enumerate() {
        if (arg == "--config" || arg == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(path.to_string());
        }
    }
    None
}

/// An explicit path must exist; the default path may be absent.
fn load_settings(explicit: Option<&str>) -> Result<(Settings, String), BridgeError> {
    match explicit {
        Some(path) => Ok((Settings::load(path)?, path.to_string())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Ok((
            Settings::load(DEFAULT_CONFIG_PATH)?,
            DEFAULT_CONFIG_PATH.to_string(),
        )),
        None => Ok((Settings::default(), "built-in defaults".to_string())),
    }
}

/// Initialize logging based on settings.
fn init_logging(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));

    match settings.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init()?;
        }
    }

    Ok(())
}
