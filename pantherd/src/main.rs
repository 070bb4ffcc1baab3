//! Panther System Update Manager daemon: wires storage, the worker pool and
//! scheduler, and the HTTP/WebSocket bridge together, then runs until
//! SIGINT or SIGTERM.
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use panther_config::Config;
use panther_core::{Host, HostOperation, Store, SystemScan};
use panther_runtime::{Cron, Dispatcher, Handlers, Pool};

/// Panther System Update Manager Utility (for Enterprise Linux).
#[derive(Parser)]
#[command(name = "panther", about = "Panther System Update Manager Utility")]
struct Cli {
    /// The configuration file of Panther Daemon. Supported format: TOML
    /// (default), YAML, and JSON.
    #[arg(short, long, default_value = "/etc/panther/panther.toml")]
    config: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !std::path::Path::new(&cli.config).exists() {
        eprintln!("File not found: {}", cli.config);
        return ExitCode::from(2);
    }

    let config = match Config::parse_from_file(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(2);
        }
    };

    let _log_guard = match panther_config::logging::init(&config.log) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(2);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("{err:#}");
            return ExitCode::from(3);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(3)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let backend = config.database.open().await?;
    let hosts: Store<Host> = Store::new(backend.clone());
    let scans: Store<SystemScan> = Store::new(backend.clone());
    let ops: Store<HostOperation> = Store::new(backend);

    let handlers = Arc::new(Handlers::new(hosts.clone(), scans.clone(), ops.clone()));
    let pool = Pool::new(handlers, config.executor.workers);
    let cron = Cron::parse(&config.executor.schedule)?;
    let dispatcher = Dispatcher::new(hosts.clone(), scans.clone(), ops.clone(), pool, cron);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut web_shutdown_rx = shutdown_rx.clone();

    tracing::info!("server is starting...");
    let dispatcher_task = tokio::spawn(dispatcher.serve(shutdown_rx));

    let router = panther_api::build_router(hosts, scans, ops, &config.web.www_root);
    let listener = tokio::net::TcpListener::bind(config.web.bind_addr()).await?;
    let mut web_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = web_shutdown_rx.wait_for(|shutdown| *shutdown).await;
            })
            .await
    });
    tracing::info!("server is ready.");

    // We accept graceful shutdowns when quit via SIGINT or SIGTERM. SIGKILL
    // or SIGQUIT will not be caught.
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let web_exited_early = tokio::select! {
        _ = term.recv() => false,
        _ = int.recv() => false,
        result = &mut web_task => {
            match result {
                Ok(Err(err)) => tracing::error!(error = %err, "web server exited before server is terminated"),
                Err(err) => tracing::error!(error = %err, "web server task panicked"),
                Ok(Ok(())) => {}
            }
            true
        }
    };

    let _ = shutdown_tx.send(true);
    dispatcher_task.await??;
    if !web_exited_early {
        web_task.await??;
    }
    tracing::info!("server exited");
    Ok(())
}
