// main.rs — Entry point for the ankistat daemon.
// Supports CLI subcommands for zero-friction user experience:
//   ankistat               → run watch daemon (auto-setup on first run)
//   ankistat status        → one-shot snapshot of today's progress
//   ankistat setup         → interactive config wizard
//   ankistat set-endpoint  → update AnkiConnect endpoint without full setup
//   ankistat config        → print config file path

mod client;
mod config;
mod controller;
mod duration;
mod report;
mod stats;

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::client::AnkiClient;
use crate::controller::RefreshController;
use crate::stats::{build_snapshot, format_duration};

fn print_usage() {
    eprintln!("Usage: ankistat [command]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  (none)              Run the watch daemon (refreshes on a schedule)");
    eprintln!("  status              Fetch and print one snapshot of today's progress");
    eprintln!("  setup               Run interactive setup wizard");
    eprintln!("  set-endpoint <URL>  Update the AnkiConnect endpoint");
    eprintln!("  config              Show config file location");
    eprintln!("  help                Show this message");
    eprintln!();
    eprintln!("Requires Anki running with the AnkiConnect add-on (default port 8765).");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str());

    // Handle non-daemon commands before initializing logger
    match command {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            return Ok(());
        }
        Some("config") => {
            match config::config_path() {
                Ok(p) => println!("{}", p.display()),
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        Some("setup") => {
            let path = config::config_path()?;
            if let Err(e) = config::interactive_setup(&path) {
                eprintln!("\n❌ Setup failed: {e}\n");
                std::process::exit(1);
            }
            return Ok(());
        }
        Some("set-endpoint") => {
            let endpoint = args.get(2).map(|s| s.as_str());
            match endpoint {
                Some(url) => {
                    if let Err(e) = config::set_endpoint(url) {
                        eprintln!("\n❌ {e}\n");
                        std::process::exit(1);
                    }
                }
                None => {
                    eprintln!("Usage: ankistat set-endpoint <URL>");
                    std::process::exit(1);
                }
            }
            return Ok(());
        }
        Some("status") => {
            let cfg = match config::load() {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("\n❌ {e}\n");
                    std::process::exit(1);
                }
            };
            if let Err(e) = print_status(&cfg).await {
                eprintln!("\n❌ {e}\n");
                std::process::exit(1);
            }
            return Ok(());
        }
        Some(unknown) => {
            eprintln!("Unknown command: {}", unknown);
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
        None => {} // default: run daemon
    }

    // ── Daemon mode ────────────────────────────────────────

    // Initialize structured logging with env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ankistat=info,warn")),
        )
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .compact()
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "ankistat daemon starting"
    );

    // Load config (auto-triggers interactive setup if missing)
    let cfg = match config::load() {
        Ok(c) => c,
        Err(e) => {
            error!(%e, "Configuration error");
            eprintln!("\n❌ {e}\n");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_daemon(cfg).await {
        error!(%e, "Fatal error in daemon");
        eprintln!("\n❌ Fatal: {e}\n");
        std::process::exit(1);
    }

    Ok(())
}

/// Run the watch daemon: immediate refresh, then scheduled refreshes until
/// Ctrl-C. Each completed attempt is logged by the controller.
async fn run_daemon(cfg: config::Config) -> Result<()> {
    let api = AnkiClient::new(&cfg.endpoint, cfg.request_timeout())?;
    let mut controller = RefreshController::new(Arc::new(api));

    info!(
        endpoint = %cfg.endpoint,
        refresh_secs = cfg.refresh_secs,
        "Watching Anki study progress"
    );

    controller.refresh_now().await;
    controller.start_polling(cfg.refresh_interval());

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping scheduled refresh");
    controller.shutdown().await;

    Ok(())
}

/// One-shot snapshot, printed human-readably.
async fn print_status(cfg: &config::Config) -> Result<()> {
    let api = AnkiClient::new(&cfg.endpoint, cfg.request_timeout())?;
    let snapshot = build_snapshot(&api).await?;

    let cards = if snapshot.remaining == 1 { "card" } else { "cards" };

    println!();
    println!("  {}", "📚 Anki Study Progress".cyan().bold());
    println!();
    println!(
        "  {} {} left today",
        snapshot.remaining.to_string().bold(),
        cards
    );
    println!(
        "  {} studied today",
        format_duration(snapshot.studied_secs).bold()
    );
    println!(
        "  {}",
        format!("Updated {}", snapshot.captured_at.format("%H:%M")).dimmed()
    );
    println!();

    Ok(())
}
