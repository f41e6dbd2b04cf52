use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use storefront_client::{
    config::ClientConfig,
    diagnostics::ServiceHealthAggregator,
    monitor::{ConnectivityMonitor, Navigator},
    session::Credentials,
    ApiError, BackendStatus, ClientContext, ClientEvent,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "storefront",
    about = "Storefront client shell — connectivity status, session, and diagnostics",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Data directory for config.toml and the persisted session token
    #[arg(long, env = "STOREFRONT_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "STOREFRONT_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "STOREFRONT_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// One-shot connectivity readout: backend health, frontend self-check,
    /// and per-service diagnostics.
    ///
    /// Exits 0 when the backend is online, 1 otherwise.
    Status {
        /// Print the readout as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the connectivity monitor in the foreground, printing status
    /// transitions until interrupted.
    Watch,
    /// Log in and persist the session token.
    Login {
        /// Account email
        #[arg(long)]
        email: String,
        /// Account password (STOREFRONT_PASSWORD env var to avoid shell history)
        #[arg(long, env = "STOREFRONT_PASSWORD")]
        password: String,
    },
    /// Drop the persisted session token.
    Logout,
    /// Show the authenticated user's profile.
    Whoami,
    /// Exchange the current token for a freshly issued one.
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Init once — must happen before any tracing calls.
    let log_level = args.log.clone().unwrap_or_else(|| "info".to_string());
    let log_format =
        std::env::var("STOREFRONT_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    let config = ClientConfig::new(args.data_dir, args.log);
    let ctx = ClientContext::new(config).context("failed to build HTTP client")?;

    match args.command {
        Command::Status { json } => {
            let exit_code = run_status(&ctx, json).await?;
            std::process::exit(exit_code);
        }
        Command::Watch => run_watch(&ctx).await?,
        Command::Login { email, password } => {
            let resp = ctx
                .session
                .login(&Credentials { email, password })
                .await
                .map_err(describe_api_error)?;
            match resp.user.as_ref().and_then(|u| u["email"].as_str()) {
                Some(email) => println!("logged in as {email}"),
                None => println!("logged in"),
            }
        }
        Command::Logout => {
            ctx.session.logout().await;
            println!("logged out");
        }
        Command::Whoami => {
            let user = ctx.session.current_user().await.map_err(describe_api_error)?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Refresh => {
            ctx.session.refresh_token().await.map_err(describe_api_error)?;
            println!("token refreshed");
        }
    }

    Ok(())
}

/// The CLI has no in-app router; restoration just announces where the user
/// would have been sent.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn current_path(&self) -> String {
        "/".to_string()
    }

    fn navigate(&self, path: &str) {
        println!("restored route: {path}");
    }
}

async fn run_status(ctx: &ClientContext, json: bool) -> Result<i32> {
    let monitor = ConnectivityMonitor::new(
        &ctx.config,
        Arc::new(TerminalNavigator),
        ctx.broadcaster.clone(),
    )
    .context("failed to build probe client")?;
    monitor.retry_checks().await;
    let state = monitor.snapshot().await;

    let aggregator = ServiceHealthAggregator::new(
        Arc::clone(&ctx.session),
        std::time::Duration::from_secs(ctx.config.diagnostics.timeout_secs),
    );
    let report = aggregator.check_services(&ctx.config.diagnostics.services).await;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "backend": state.backend,
                "frontend": state.frontend,
                "last_checked": state.last_checked,
                "services": report.services,
            }))?
        );
    } else {
        println!("backend:  {}", state.backend);
        println!("frontend: {}", state.frontend);
        for check in &report.services {
            match check.latency_ms {
                Some(ms) => println!("  {:<10} {} ({ms}ms)", check.name, check.status),
                None => println!("  {:<10} {}", check.name, check.status),
            }
        }
    }

    Ok(if state.backend == BackendStatus::Online {
        0
    } else {
        1
    })
}

async fn run_watch(ctx: &ClientContext) -> Result<()> {
    let monitor = ConnectivityMonitor::new(
        &ctx.config,
        Arc::new(TerminalNavigator),
        ctx.broadcaster.clone(),
    )
    .context("failed to build probe client")?;

    let mut events = ctx.broadcaster.subscribe();
    monitor.start();
    info!("watching — press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(ClientEvent::BackendStatusChanged(status)) => {
                    println!("backend -> {status}");
                }
                Ok(ClientEvent::FrontendStatusChanged(status)) => {
                    println!("frontend -> {status}");
                }
                Ok(ClientEvent::RouteRestored(path)) => {
                    println!("route restored -> {path}");
                }
                Ok(ClientEvent::SessionInvalidated) => {
                    println!("session invalidated — log in again");
                }
                Err(_) => break,
            },
        }
    }

    monitor.stop();
    Ok(())
}

fn describe_api_error(err: ApiError) -> anyhow::Error {
    match &err {
        ApiError::AuthRequired => anyhow::anyhow!("not logged in — run `storefront login`"),
        _ => anyhow::Error::new(err),
    }
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"pretty"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("storefront.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
