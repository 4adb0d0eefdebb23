// config.rs — Safe TOML config loading with XDG-compliant directory resolution.
// Interactive setup wizard for first-run. No manual file editing required.

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use directories::ProjectDirs;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Application configuration persisted to disk.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8765".into()
}

fn default_refresh_secs() -> u64 {
    120
}

fn default_timeout_secs() -> u64 {
    6
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            refresh_secs: default_refresh_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Refresh interval choices offered by the wizard, in seconds.
const REFRESH_CHOICES: &[(&str, u64)] = &[
    ("30 seconds", 30),
    ("1 minute", 60),
    ("2 minutes (default)", 120),
    ("5 minutes", 300),
];

// ── Paths ──────────────────────────────────────────────────

/// Resolve the config directory path.
/// Linux:   ~/.config/ankistat/
/// macOS:   ~/Library/Application Support/ankistat/
/// Windows: %APPDATA%\ankistat\
fn config_dir() -> Result<PathBuf> {
    let proj = ProjectDirs::from("", "", "ankistat")
        .context("Cannot determine home directory for config")?;
    Ok(proj.config_dir().to_path_buf())
}

/// Full path to config.toml.
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ── Load ───────────────────────────────────────────────────

/// Load configuration from disk.
/// If the file doesn't exist, run the interactive wizard.
pub fn load() -> Result<Config> {
    let path = config_path()?;

    if !path.exists() {
        eprintln!();
        eprintln!("  No config found. Starting first-time setup...");
        eprintln!();
        return interactive_setup(&path);
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config at {}", path.display()))?;

    let cfg: Config = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config at {}", path.display()))?;

    if cfg.endpoint.trim().is_empty() {
        eprintln!();
        eprintln!("  Endpoint not set. Re-running setup...");
        eprintln!();
        return interactive_setup(&path);
    }

    debug!(path = %path.display(), "Config loaded");
    Ok(cfg)
}

// ── Interactive Setup Wizard ───────────────────────────────

/// Run the interactive first-time setup. Prompts for the AnkiConnect
/// endpoint and refresh cadence in the terminal.
/// Called automatically on first run, or explicitly via `ankistat setup`.
pub fn interactive_setup(path: &PathBuf) -> Result<Config> {
    println!();
    println!(
        "{}",
        "╔══════════════════════════════════════════════╗"
            .cyan()
            .bold()
    );
    println!(
        "{}",
        "║        ankistat — First Time Setup           ║"
            .cyan()
            .bold()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════════╝"
            .cyan()
            .bold()
    );
    println!();
    println!("  ankistat talks to Anki through the AnkiConnect add-on.");
    println!(
        "  Install it from: {}",
        "https://ankiweb.net/shared/info/2055492159".underline()
    );
    println!();

    let theme = ColorfulTheme::default();

    // ── Step 1: Endpoint ───────────────────────────────────
    let endpoint: String = Input::with_theme(&theme)
        .with_prompt("🔌 AnkiConnect endpoint")
        .default(default_endpoint())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Endpoint cannot be empty")
            } else if !input.starts_with("http://") && !input.starts_with("https://") {
                Err("Endpoint must start with http:// or https://")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    // ── Step 2: Verify with a real call ────────────────────
    verify_endpoint_spinner(&endpoint)?;

    // ── Step 3: Refresh cadence ────────────────────────────
    let labels: Vec<&str> = REFRESH_CHOICES.iter().map(|(label, _)| *label).collect();
    let refresh_idx = Select::with_theme(&theme)
        .with_prompt("⏱  Refresh interval")
        .default(2)
        .items(&labels)
        .interact()?;
    let refresh_secs = REFRESH_CHOICES[refresh_idx].1;

    let cfg = Config {
        endpoint,
        refresh_secs,
        timeout_secs: default_timeout_secs(),
    };

    save(&cfg, path)?;

    println!();
    println!(
        "  {} Config saved to {}",
        "✔".green().bold(),
        path.display()
    );
    println!(
        "  {} Re-run anytime with: {}",
        "✔".green().bold(),
        "ankistat setup".bold()
    );
    println!();

    Ok(cfg)
}

/// Verify the endpoint by issuing a lightweight `deckNames` call.
/// Shows a spinner while the request is in flight.
fn verify_endpoint_spinner(endpoint: &str) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .expect("invalid spinner template"),
    );
    spinner.set_message("Checking AnkiConnect...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let result = verify_endpoint(endpoint);

    match &result {
        Ok(()) => {
            spinner
                .finish_with_message(format!("{}", "✔ AnkiConnect is reachable!".green().bold()));
        }
        Err(e) => {
            spinner.finish_with_message(format!("{} {}", "✘".red().bold(), e));
        }
    }

    result
}

/// Endpoint verification — one `deckNames` round-trip.
///
/// Runs on its own thread: the blocking reqwest client must not be driven
/// from a tokio worker (the wizard can be reached from async `main`).
fn verify_endpoint(endpoint: &str) -> Result<()> {
    let endpoint = endpoint.to_string();
    match std::thread::spawn(move || verify_endpoint_sync(&endpoint)).join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Endpoint verification thread panicked"),
    }
}

/// Synchronous endpoint verification — one `deckNames` round-trip.
fn verify_endpoint_sync(endpoint: &str) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(6))
        .build()
        .context("Failed to build HTTP client for verification")?;

    let response = client
        .post(endpoint)
        .json(&serde_json::json!({ "action": "deckNames", "version": 6 }))
        .send()
        .context("Cannot reach AnkiConnect — is Anki running with the add-on installed?")?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!(
            "Unexpected response from AnkiConnect (HTTP {}). Check the add-on configuration.",
            status
        )
    }
}

// ── Save / Update ──────────────────────────────────────────

/// Persist config to disk.
fn save(cfg: &Config, path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create config directory {}", parent.display()))?;
    }

    let content = toml::to_string_pretty(cfg).context("Failed to serialize config")?;

    fs::write(path, &content)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    info!(path = %path.display(), "Config saved");
    Ok(())
}

/// Update just the endpoint in an existing config.
pub fn set_endpoint(endpoint: &str) -> Result<()> {
    let path = config_path()?;
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config at {}", path.display()))?
    } else {
        Config::default()
    };

    cfg.endpoint = endpoint.to_string();
    save(&cfg, &path)?;
    println!("  {} Endpoint updated.", "✔".green().bold());
    Ok(())
}
