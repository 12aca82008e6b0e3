use anyhow::Context;
use book_collection_api::app::{create_app_router, serve};
use book_collection_api::config::AppConfig;
use book_collection_api::state::AppState;
use reqwest::StatusCode;
use tokio::{
    io::{self, AsyncBufReadExt, BufReader},
    sync::oneshot,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type LogReloadHandle =
    tracing_subscriber::reload::Handle<tracing_subscriber::EnvFilter, tracing_subscriber::Registry>;

struct CommandResult {
    message: String,
    shutdown: bool,
}

impl CommandResult {
    fn reply(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            shutdown: false,
        }
    }
}

#[derive(Clone)]
struct CliContext {
    state: AppState,
    log_handle: Option<LogReloadHandle>,
    /// Address the listener actually bound, used for local probes.
    base_url: String,
}

fn parse_command(input: &str) -> (&str, Vec<&str>) {
    let mut parts = input.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    (cmd, parts.collect())
}

async fn fetch_local(ctx: &CliContext, path: &str) -> Result<(StatusCode, String), String> {
    let url = format!("{}{path}", ctx.base_url);
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3))
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {e}"))?;

    let res = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("Request to {url} failed: {e}"))?;
    let status = res.status();
    let body = res
        .text()
        .await
        .unwrap_or_else(|e| format!("Failed to read body: {e}"));
    Ok((status, body))
}

fn command_help(args: &[&str]) -> CommandResult {
    const COMMANDS: [(&str, &str); 9] = [
        ("/help [verbose]", "show commands"),
        ("/status", "show service status"),
        ("/health", "call the local health endpoint"),
        ("/metrics", "fetch the request metrics summary"),
        ("/rate-limit", "show rate limiter quotas and tracked clients"),
        ("/stats", "show stored users, authors and books"),
        ("/logs level <level>", "change the log level"),
        ("/reload", "validate a config reload (dry run)"),
        ("/quit", "stop the service"),
    ];

    if args.first().is_some_and(|v| *v == "verbose") {
        let names: Vec<&str> = COMMANDS.iter().map(|(name, _)| *name).collect();
        return CommandResult::reply(serde_json::json!({ "commands": names }).to_string());
    }

    CommandResult::reply(
        COMMANDS
            .iter()
            .map(|(name, desc)| format!("{name} - {desc}"))
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

fn command_status(ctx: &CliContext) -> CommandResult {
    let config = &ctx.state.config;
    CommandResult::reply(format!(
        "Service status:\n- Address: {}\n- API prefix: {}\n- Database: {:?}\n- Debug: {}\n- Rate limiting: {}",
        ctx.base_url,
        config.app.api_v1_str,
        ctx.state.db.location(),
        config.app.debug,
        if ctx.state.limiters.enabled { "on" } else { "off" },
    ))
}

async fn command_health(ctx: &CliContext) -> CommandResult {
    match fetch_local(ctx, "/health").await {
        Ok((status, body)) => CommandResult::reply(format!("GET /health -> {status}\n{body}")),
        Err(e) => CommandResult::reply(e),
    }
}

async fn command_metrics(ctx: &CliContext) -> CommandResult {
    let stats = ctx.state.metrics.get_stats().await;
    CommandResult::reply(format!(
        "Metrics: total={} client_errors={} server_errors={} rate_limited={} success_rate={:.2}% avg_latency_ms={:.2} p95_ms={} uptime_s={}",
        stats.total_requests,
        stats.client_errors,
        stats.server_errors,
        stats.rate_limited,
        stats.success_rate,
        stats.avg_latency_ms,
        stats.p95_latency_ms,
        stats.uptime_seconds,
    ))
}

async fn command_rate_limit(ctx: &CliContext) -> CommandResult {
    let limiters = &ctx.state.limiters;
    let mut lines = vec![format!(
        "Rate limiting: {}",
        if limiters.enabled { "enabled" } else { "disabled" }
    )];
    for (name, limiter) in limiters.named() {
        lines.push(format!(
            "- {name}: {}/minute, active_keys={}",
            limiter.limit(),
            limiter.tracked_keys().await
        ));
    }
    CommandResult::reply(lines.join("\n"))
}

async fn command_stats(ctx: &CliContext) -> CommandResult {
    match ctx.state.db.counts().await {
        Ok(counts) => CommandResult::reply(format!(
            "Stored rows: users={} authors={} books={}",
            counts.users, counts.authors, counts.books
        )),
        Err(e) => CommandResult::reply(format!("Failed to read row counts: {e}")),
    }
}

fn command_logs(args: &[&str], ctx: &CliContext) -> CommandResult {
    let [sub, level] = args else {
        return CommandResult::reply("Usage: /logs level <trace|debug|info|warn|error>");
    };
    if *sub != "level" {
        return CommandResult::reply("Usage: /logs level <trace|debug|info|warn|error>");
    }

    let Some(handle) = &ctx.log_handle else {
        return CommandResult::reply("Log level reload not available");
    };
    let level = level.to_lowercase();
    match EnvFilter::try_new(format!("{level},tower_http=debug")) {
        Ok(filter) => match handle.reload(filter) {
            Ok(()) => CommandResult::reply(format!("Log level set to {level}")),
            Err(e) => CommandResult::reply(format!("Failed to update log level: {e}")),
        },
        Err(e) => CommandResult::reply(format!("Invalid log level: {e}")),
    }
}

fn command_reload() -> CommandResult {
    match AppConfig::new() {
        Ok(config) => CommandResult::reply(format!(
            "Config reload validated (not applied): host {}:{}, database={}, debug={}, rate_limit={}",
            config.server.host,
            config.server.port,
            config.database.url,
            config.app.debug,
            config.rate_limit_enabled()
        )),
        Err(e) => CommandResult::reply(format!("Config reload failed: {e}")),
    }
}

async fn process_command(input: &str, ctx: &CliContext) -> CommandResult {
    let (cmd, args) = parse_command(input);

    match cmd.trim_start_matches('/') {
        "help" => command_help(&args),
        "status" => command_status(ctx),
        "health" => command_health(ctx).await,
        "metrics" => command_metrics(ctx).await,
        "rate-limit" => command_rate_limit(ctx).await,
        "stats" => command_stats(ctx).await,
        "logs" => command_logs(&args, ctx),
        "reload" => command_reload(),
        "quit" | "exit" => CommandResult {
            message: "Shutting down service...".to_string(),
            shutdown: true,
        },
        _ => CommandResult::reply("Unknown command. Type /help for a list of commands."),
    }
}

async fn setup_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                None
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating graceful shutdown");
            }
            () = async {
                match sigterm.as_mut() {
                    Some(sigterm) => {
                        sigterm.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            } => {
                info!("Received SIGTERM, initiating graceful shutdown");
            }
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            return;
        }
        info!("Received Ctrl+C, initiating graceful shutdown");
    }
}

fn setup_logging(config: &AppConfig) -> LogReloadHandle {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},tower_http=debug", config.log.level)))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (filter_layer, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

    match config.log.format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(false)
                        .with_current_span(true)
                        .with_span_list(true),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_line_number(true),
                )
                .init();
        }
    }

    reload_handle
}

async fn run_command_loop(ctx: CliContext, shutdown_tx: oneshot::Sender<()>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(io::stdin()).lines();

    println!("Interactive console ready. Type /help for available commands.");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let result = process_command(&line, &ctx).await;
        println!("{}", result.message);

        if result.shutdown {
            let _ = shutdown_tx.send(());
            return Ok(());
        }
    }

    info!("stdin closed; console disabled, server keeps running");
    Ok(())
}

/// Resolves only when the console sends `/quit`. A dropped sender (stdin at
/// EOF, or no console) never resolves, so signals alone stop the server.
async fn console_quit(rx: oneshot::Receiver<()>) {
    if rx.await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::new().map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration: {e}. Please check your environment variables and configuration."
        )
    })?;

    let log_handle = Some(setup_logging(&config));

    info!(
        "Starting {} v{}",
        config.app.project_name,
        env!("CARGO_PKG_VERSION")
    );
    if config.is_production() && config.jwt.secret_key.is_none() {
        warn!("Running with debug=false and no SECRET_KEY; issued tokens are lost on restart");
    }

    let state = AppState::connect(config.clone()).await?;
    let app = create_app_router(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    let local_addr = listener.local_addr()?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    if config.server.interactive {
        let ctx = CliContext {
            state: state.clone(),
            log_handle,
            base_url: format!("http://{local_addr}"),
        };
        tokio::spawn(async move {
            if let Err(e) = run_command_loop(ctx, shutdown_tx).await {
                warn!("Console loop terminated with error: {e}");
            }
        });
    } else {
        drop(shutdown_tx);
    }

    let shutdown = async move {
        tokio::select! {
            () = setup_shutdown_signal() => {},
            () = console_quit(shutdown_rx) => {},
        }
    };

    if let Err(e) = serve(listener, app, shutdown).await {
        error!("Server error: {e}");
        return Err(e);
    }
    Ok(())
}
