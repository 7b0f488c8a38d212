use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tls_print_helper::alerts::{ConsoleAlerts, UserAlerts};
use tls_print_helper::api::ApiClient;
use tls_print_helper::app::PrintHelper;
use tls_print_helper::auth::Session;
use tls_print_helper::config::{self, Config};
use tls_print_helper::deeplink;
use tls_print_helper::logging;
use tls_print_helper::printer;
use tls_print_helper::progress::{ProgressBoard, ProgressSink, TracingProgress};
use tls_print_helper::server::{self, ForwardOutcome, ServerState};

/// How long to wait for a resident helper to answer a forwarded deep link
const FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "tls-print-helper",
    version,
    about = "Prints frame-number documents from deep links"
)]
struct Cli {
    /// Path to config.json (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Stay resident and accept activations on the local endpoint
    #[arg(long)]
    serve: bool,

    /// Started at login; behaves like --serve
    #[arg(long, alias = "minimized")]
    hidden: bool,

    /// List the printers the system knows about
    #[arg(long)]
    list_printers: bool,

    /// Show the user the session cookie belongs to
    #[arg(long)]
    whoami: bool,

    /// Launch arguments; only the last one is read as the deep link
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref()).context("loading configuration")?;

    if cli.list_printers {
        for p in printer::list_printers().await? {
            let default_marker = if p.is_default { " (default)" } else { "" };
            println!("{}{} [{}]", p.name, default_marker, p.status);
        }
        return Ok(());
    }

    if cli.whoami {
        let session = Session::from_cookie_header(config.session_cookie.as_deref());
        let api = ApiClient::new(&config.base_url, session, config.request_timeout())?;
        println!("{}", api.current_user().await?);
        return Ok(());
    }

    if cli.serve || cli.hidden || cli.args.is_empty() {
        return serve(config).await;
    }

    print_from_deep_link(config, &cli.args).await
}

/// Alerts also land in `alerts.log` next to the audit files, for launches
/// from a browser where no console is visible.
fn alert_sink(config: &Config) -> ConsoleAlerts {
    ConsoleAlerts::with_log_file(config.audit_dir().join("alerts.log"))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let board = Arc::new(ProgressBoard::default());
    let progress: Arc<dyn ProgressSink> = Arc::new((TracingProgress, Arc::clone(&board)));
    let alerts = Arc::new(alert_sink(&config));
    let helper = Arc::new(PrintHelper::from_config(&config, progress, alerts)?);
    let state = Arc::new(ServerState { helper, board });

    tokio::select! {
        result = server::start_server(state, config.listen_port) => {
            result.with_context(|| format!("serving on port {}", config.listen_port))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}

async fn print_from_deep_link(config: Config, args: &[String]) -> anyhow::Result<()> {
    let alerts = alert_sink(&config);

    let request = match deeplink::decode_launch_args(args, &config.scheme) {
        Ok(request) => request,
        Err(e) => {
            alerts.error("Invalid print request", &e.to_string());
            anyhow::bail!(e);
        }
    };

    // Deep link is always the last argument once decoding succeeded
    let activation = args.last().map(String::as_str).unwrap_or_default();
    match server::forward_activation(config.listen_port, activation, FORWARD_TIMEOUT).await {
        Ok(ForwardOutcome::Accepted) => {
            tracing::info!("Deep link handed to the running helper");
            return Ok(());
        }
        Ok(ForwardOutcome::Busy(message)) => {
            alerts.error("Printer is busy", &message);
            return Ok(());
        }
        Ok(ForwardOutcome::Rejected(message)) => {
            alerts.error("Invalid print request", &message);
            return Ok(());
        }
        Err(e) => {
            tracing::debug!("No resident helper ({}), printing in this process", e);
        }
    }

    let helper = PrintHelper::from_config(&config, Arc::new(TracingProgress), Arc::new(alerts))?;
    let summary = helper.run_request(request).await?;

    if let Some(path) = &summary.audit_file {
        eprintln!("Failed entries written to {}", path.display());
        for entry in logging::recent_logs(Some(10), Some("error")).iter().rev() {
            eprintln!("  {} [{}] {}", entry.timestamp, entry.source, entry.message);
        }
    }

    Ok(())
}
