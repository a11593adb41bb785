// # wg-ddnsd - WireGuard DDNS Daemon
//
// Thin integration layer: all monitoring logic lives in wg-ddns-core.
//
// The daemon is responsible for:
// 1. Parsing options (flags with `WG_DDNS_*` environment overlay)
// 2. Installing the log subscriber
// 3. Connecting to systemd and discovering tunnels
// 4. Running the engine and, when configured, the API server
// 5. Translating signals: SIGINT/SIGTERM stop (a second one forces the exit),
//    SIGHUP re-discovers
//
// ## Example
//
// ```bash
// wg-ddnsd --check-interval 30s
//
// WG_DDNS_SINGLE_INTERFACE=wg0 \
// WG_DDNS_LISTEN_ADDRESS=127.0.0.1 WG_DDNS_LISTEN_PORT=8080 WG_DDNS_API_KEY=secret \
//     wg-ddnsd
// ```

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use wg_ddns_core::config::MonitorConfig;
use wg_ddns_core::{MonitorEngine, RescanHandle, ServiceManager, SystemResolver};
use wg_ddns_systemd::SystemctlManager;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WgDdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<WgDdnsExitCode> for ExitCode {
    fn from(code: WgDdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let args = match cli::Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return WgDdnsExitCode::CleanShutdown.into();
        }
        Err(e) => {
            let _ = e.print();
            return WgDdnsExitCode::ConfigError.into();
        }
    };

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return WgDdnsExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::from(config.log_level))
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return WgDdnsExitCode::ConfigError.into();
    }

    info!("Starting wg-ddnsd {}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", config.log_level);
    info!("DNS check interval: {:?}", config.check_interval);

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return WgDdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let manager = match SystemctlManager::connect().await {
            Ok(manager) => manager,
            Err(e) => {
                error!("Failed to connect to service manager: {}", e);
                return WgDdnsExitCode::ConfigError;
            }
        };
        run_daemon(&config, Arc::new(manager), CancellationToken::new()).await
    })
    .into()
}

/// Run with an acquired service manager and release it on every path
async fn run_daemon(
    config: &MonitorConfig,
    manager: Arc<dyn ServiceManager>,
    shutdown: CancellationToken,
) -> WgDdnsExitCode {
    let code = supervise(config, manager.clone(), shutdown).await;

    if let Err(e) = manager.close().await {
        warn!("Failed to release service manager: {}", e);
    }
    info!("wg-ddnsd stopped");
    code
}

async fn supervise(
    config: &MonitorConfig,
    manager: Arc<dyn ServiceManager>,
    shutdown: CancellationToken,
) -> WgDdnsExitCode {
    let resolver = Arc::new(SystemResolver::with_timeout(config.resolve_timeout));

    let (engine, mut events) = match MonitorEngine::new(config, manager, resolver) {
        Ok(pair) => pair,
        Err(e) => {
            error!("Failed to create engine: {}", e);
            return WgDdnsExitCode::ConfigError;
        }
    };

    if let Err(e) = engine.discover().await {
        error!("Failed to discover WireGuard interfaces: {}", e);
        return WgDdnsExitCode::ConfigError;
    }

    let signals = match Signals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("{:#}", e);
            return WgDdnsExitCode::ConfigError;
        }
    };

    let api_task = match &config.api {
        Some(api) => {
            let listener = match wg_ddns_api::bind(api).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!("Failed to bind API server on {}: {}", api.bind_addr(), e);
                    return WgDdnsExitCode::ConfigError;
                }
            };
            let app = wg_ddns_api::router(engine.control_plane(), api.api_key.clone());
            Some(tokio::spawn(wg_ddns_api::serve(
                listener,
                app,
                shutdown.clone(),
            )))
        }
        None => {
            info!("API server disabled");
            None
        }
    };

    let event_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    // Finishes only when a second stop signal demands an immediate exit
    let mut signal_task = tokio::spawn(signals.watch(shutdown.clone(), engine.rescan_handle()));

    let mut code = WgDdnsExitCode::CleanShutdown;

    tokio::select! {
        result = engine.run(shutdown.clone()) => {
            if let Err(e) = result {
                error!("Engine error: {}", e);
                code = WgDdnsExitCode::RuntimeError;
            }
        }
        _ = &mut signal_task => {
            warn!("Forced shutdown, abandoning the pass in progress");
            code = WgDdnsExitCode::RuntimeError;
        }
    }
    shutdown.cancel();
    signal_task.abort();

    if let Some(task) = api_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("API server error: {}", e);
                code = WgDdnsExitCode::RuntimeError;
            }
            Err(e) => {
                error!("API server task failed: {}", e);
                code = WgDdnsExitCode::RuntimeError;
            }
        }
    }

    // Dropping the engine closes the event channel
    drop(engine);
    let _ = event_task.await;

    code
}

/// What the daemon does on receipt of a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalAction {
    /// Re-run interface discovery
    Rescan,
    /// Stop after the pass in progress
    Shutdown,
    /// Stop now; a shutdown was already requested
    ForceExit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessSignal {
    Terminate,
    Interrupt,
    Hangup,
}

impl ProcessSignal {
    fn name(self) -> &'static str {
        match self {
            ProcessSignal::Terminate => "SIGTERM",
            ProcessSignal::Interrupt => "SIGINT",
            ProcessSignal::Hangup => "SIGHUP",
        }
    }
}

fn signal_action(signal: ProcessSignal, stopping: bool) -> SignalAction {
    match signal {
        ProcessSignal::Hangup if !stopping => SignalAction::Rescan,
        ProcessSignal::Hangup => SignalAction::Shutdown,
        _ if stopping => SignalAction::ForceExit,
        _ => SignalAction::Shutdown,
    }
}

/// Apply `signal` and report whether the watcher should stop
fn handle_signal(
    signal: ProcessSignal,
    shutdown: &CancellationToken,
    rescan: &RescanHandle,
) -> bool {
    match signal_action(signal, shutdown.is_cancelled()) {
        SignalAction::Rescan => {
            info!("Received SIGHUP, re-discovering interfaces");
            rescan.trigger();
            false
        }
        SignalAction::Shutdown => {
            if !shutdown.is_cancelled() {
                info!("Received shutdown signal: {}", signal.name());
                shutdown.cancel();
            }
            false
        }
        SignalAction::ForceExit => {
            warn!("Received {} again, exiting without waiting", signal.name());
            true
        }
    }
}

/// Process signal handlers, installed before the engine starts
#[cfg(unix)]
struct Signals {
    sigterm: Signal,
    sigint: Signal,
    sighup: Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Self {
            sigterm: signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?,
            sigint: signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?,
            sighup: signal(SignalKind::hangup()).context("Failed to setup SIGHUP handler")?,
        })
    }

    /// Translate signals until a second stop signal arrives
    ///
    /// SIGINT/SIGTERM cancel `shutdown`; SIGHUP requests re-discovery.
    async fn watch(mut self, shutdown: CancellationToken, rescan: RescanHandle) {
        loop {
            let received = tokio::select! {
                _ = self.sigterm.recv() => ProcessSignal::Terminate,
                _ = self.sigint.recv() => ProcessSignal::Interrupt,
                _ = self.sighup.recv() => ProcessSignal::Hangup,
            };
            if handle_signal(received, &shutdown, &rescan) {
                return;
            }
        }
    }
}

/// Fallback for non-Unix platforms: Ctrl-C only
#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn watch(self, shutdown: CancellationToken, rescan: RescanHandle) {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to wait for CTRL-C: {}", e);
                std::future::pending::<()>().await;
            }
            if handle_signal(ProcessSignal::Interrupt, &shutdown, &rescan) {
                return;
            }
        }
    }
}
