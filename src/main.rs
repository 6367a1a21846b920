// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! EcoClass: scan sessions with a login gate and simulated classification
//!
//! Command-line front end. `shell` behaves like the single-page app; the other
//! subcommands run one action against the persisted session.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use ecoclass::classifier::SimulatedClassifier;
use ecoclass::config::AppConfig;
use ecoclass::history::ScanEntry;
use ecoclass::pipeline::{pick_image, Upload};
use ecoclass::stats::StatsRecord;
use ecoclass::store::SqliteStore;
use ecoclass::{EcoClass, EcoClassError};

/// EcoClass CLI - image scans with simulated classification
#[derive(Parser, Debug)]
#[command(name = "ecoclass")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version = "1.0.0")]
#[command(about = "Scan images with a simulated classifier and keep running stats", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "ecoclass.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in with a demo account
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,
    },

    /// Log out (statistics are kept)
    Logout {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the logged-in user
    Whoami,

    /// Upload and analyze one or more images
    Scan {
        /// Image files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Skip the simulated analysis delay
        #[arg(long)]
        no_delay: bool,
    },

    /// Show scan statistics
    Stats {
        /// Zero the counters
        #[arg(long)]
        reset: bool,
    },

    /// Interactive session (login, upload, analyze, history, logout)
    Shell {
        /// Skip the simulated analysis delay
        #[arg(long)]
        no_delay: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Write a default configuration
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "ecoclass.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;
    let json = cli.format == "json";

    match cli.command {
        Some(Commands::Login { username, password }) => run_login(&config, &username, &password, json),
        Some(Commands::Logout { yes }) => run_logout(&config, yes),
        Some(Commands::Whoami) => run_whoami(&config, json),
        Some(Commands::Scan { paths, no_delay }) => run_scan(&config, paths, no_delay, json).await,
        Some(Commands::Stats { reset }) => run_stats(&config, reset, json),
        Some(Commands::Shell { no_delay }) => run_shell(&config, no_delay).await,
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        None => run_shell(&config, false).await,
    }
}

/// Open the controller, optionally without the simulated delay
fn open_app(config: &AppConfig, no_delay: bool) -> anyhow::Result<EcoClass> {
    if !no_delay {
        return Ok(EcoClass::open(config)?);
    }

    let store = SqliteStore::open(&config.store.path)
        .with_context(|| format!("opening store {}", config.store.path))?;
    let classifier = SimulatedClassifier::from_config(&config.classifier)?.with_delay(Duration::ZERO);
    Ok(EcoClass::with_parts(config, Arc::new(store), Arc::new(classifier)))
}

/// Restore the persisted session or explain how to log in
fn require_session(app: &EcoClass) -> anyhow::Result<String> {
    match app.restore()? {
        Some(session) => Ok(session.username),
        None => Err(EcoClassError::NotLoggedIn).context("run `ecoclass login` first"),
    }
}

fn run_login(config: &AppConfig, username: &str, password: &str, json: bool) -> anyhow::Result<()> {
    let app = EcoClass::open(config)?;
    match app.login(username, password) {
        Ok(session) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                println!("Halo, {}!", session.username);
                display_stats(&app.stats());
            }
            Ok(())
        }
        Err(e @ EcoClassError::Auth(_)) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_logout(config: &AppConfig, yes: bool) -> anyhow::Result<()> {
    let app = EcoClass::open(config)?;
    if app.restore()?.is_none() {
        println!("Not logged in");
        return Ok(());
    }

    if !yes && !confirm(app.logout_prompt())? {
        println!("Logout cancelled");
        return Ok(());
    }

    app.logout()?;
    println!("Logged out");
    Ok(())
}

fn run_whoami(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let app = EcoClass::open(config)?;
    let session = app.restore()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        match session {
            Some(s) => println!("{}", s.username),
            None => println!("Not logged in"),
        }
    }
    Ok(())
}

async fn run_scan(config: &AppConfig, paths: Vec<PathBuf>, no_delay: bool, json: bool) -> anyhow::Result<()> {
    let app = open_app(config, no_delay)?;
    let username = require_session(&app)?;
    debug!("Scanning {} files as {}", paths.len(), username);

    for path in &paths {
        let upload = read_upload(path, config.upload.max_bytes)?;
        if let Err(e) = app.upload(upload) {
            eprintln!("{}: {}", path.display(), e.user_message());
            continue;
        }

        if !json {
            println!("Menganalisis {}...", path.display());
        }
        let entry = app.analyze().await?;
        if !json {
            display_entry(&entry);
        }
    }

    let history = app.history();
    if json {
        let output = serde_json::json!({
            "results": history,
            "stats": app.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        if !history.is_empty() {
            println!("\nAnalyzed {} files", history.len());
        }
        display_stats(&app.stats());
    }

    Ok(())
}

fn run_stats(config: &AppConfig, reset: bool, json: bool) -> anyhow::Result<()> {
    let app = EcoClass::open(config)?;
    let record = if reset { app.reset_stats()? } else { app.reload_stats() };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        display_stats(&record);
        if let Some(at) = record.last_updated {
            println!("  Last updated: {}", at.format("%Y-%m-%d %H:%M"));
        }
    }
    Ok(())
}

const SHELL_HELP: &str = "\
Commands:
  login <username> <password>
  upload <path> [<path>...]   first image among the paths is used
  analyze
  history
  stats
  whoami
  logout
  help
  quit";

/// Interactive page: one control flow, history lives until logout or exit
async fn run_shell(config: &AppConfig, no_delay: bool) -> anyhow::Result<()> {
    let app = open_app(config, no_delay)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match app.restore()? {
        Some(session) => {
            println!("Halo, {}!", session.username);
            display_stats(&app.stats());
        }
        None => println!("Please log in (type `help` for commands)"),
    }

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();

        match command {
            "login" => match args.as_slice() {
                [username, password] => match app.login(username, password) {
                    Ok(session) => {
                        println!("Halo, {}!", session.username);
                        display_stats(&app.stats());
                    }
                    Err(e) => println!("{}", e.user_message()),
                },
                _ => println!("usage: login <username> <password>"),
            },
            "upload" => {
                if args.is_empty() {
                    println!("usage: upload <path> [<path>...]");
                    continue;
                }
                let mut uploads = Vec::new();
                for arg in &args {
                    match read_upload(Path::new(arg), config.upload.max_bytes) {
                        Ok(upload) => uploads.push(upload),
                        Err(e) => println!("{:#}", e),
                    }
                }
                let Some(upload) = pick_image(uploads, &config.upload) else {
                    println!("{}", ecoclass::error::INVALID_IMAGE_HINT);
                    continue;
                };
                match app.upload(upload) {
                    Ok(preview) => {
                        let dims = preview
                            .dimensions
                            .map(|(w, h)| format!(", {}x{}", w, h))
                            .unwrap_or_default();
                        println!("Ready: {} ({} KiB{}) - type `analyze`", preview.name, preview.size / 1024, dims);
                    }
                    Err(e) => println!("{}", e.user_message()),
                }
            }
            "analyze" => {
                println!("Menganalisis...");
                match app.analyze().await {
                    Ok(entry) => {
                        display_entry(&entry);
                        display_stats(&app.stats());
                    }
                    Err(e) => println!("{}", e.user_message()),
                }
            }
            "history" => {
                let history = app.history();
                if history.is_empty() {
                    println!("No results yet");
                }
                for entry in &history {
                    display_entry(entry);
                }
            }
            "stats" => display_stats(&app.stats()),
            "whoami" => match app.current_user() {
                Some(s) => println!("{}", s.username),
                None => println!("Not logged in"),
            },
            "logout" => {
                if !app.is_logged_in() {
                    println!("Not logged in");
                    continue;
                }
                println!("{} [y/N]", app.logout_prompt());
                let answer = lines.next_line().await?.unwrap_or_default();
                if is_yes(&answer) {
                    println!("{}", logout_message(&app));
                }
            }
            "help" => println!("{}", SHELL_HELP),
            "quit" | "exit" => break,
            other => println!("Unknown command '{}' (type `help`)", other),
        }
    }

    info!("Session closed");
    Ok(())
}

/// Log out and describe the outcome; store failures keep the shell running
fn logout_message(app: &EcoClass) -> String {
    match app.logout() {
        Ok(()) => "Logged out".to_string(),
        Err(e) => e.user_message(),
    }
}

fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Store: {}", config.store.path);
            println!("  Accounts: {}", config.auth.users.len());
            println!("  Catalog entries: {}", config.classifier.catalog.len());
            println!("  Analysis delay: {} ms", config.classifier.delay_ms);
        }
    }
    Ok(())
}

fn run_init(dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("ecoclass.json");

    if config_path.exists() && !force {
        return Err(EcoClassError::Config(
            "ecoclass.json already exists. Use --force to overwrite".to_string(),
        )
        .into());
    }

    std::fs::create_dir_all(&target)?;
    let mut config = AppConfig::default();
    config.store.path = target.join("ecoclass.db").to_string_lossy().to_string();
    config.save(&config_path)?;

    println!("EcoClass initialized in {:?}", target);
    println!("\nNext steps:");
    println!("  1. ecoclass login -u admin -p admin123");
    println!("  2. ecoclass scan photo.jpg");
    Ok(())
}

fn read_upload(path: &Path, max_bytes: u64) -> anyhow::Result<Upload> {
    Upload::from_path(path, max_bytes).with_context(|| format!("cannot read {}", path.display()))
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes" | "ya")
}

fn display_entry(entry: &ScanEntry) {
    let result = &entry.result;
    let icon = match result.status {
        ecoclass::classifier::ScanStatus::Safe => "✔",
        ecoclass::classifier::ScanStatus::Warning => "⚠",
        ecoclass::classifier::ScanStatus::Danger => "✖",
    };
    println!(
        "  {} {} [{}] {}  Keyakinan AI: {}%  ({})",
        icon,
        result.label,
        result.status,
        confidence_bar(result.confidence),
        result.confidence,
        entry.file_name
    );
}

fn confidence_bar(confidence: u8) -> String {
    let filled = usize::from(confidence.min(100)) / 10;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

fn display_stats(record: &StatsRecord) {
    println!(
        "  Total scans: {}  Safe: {}  Warning: {}",
        record.total_scans, record.safe_count, record.warning_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecoclass::store::KeyValueStore;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["ecoclass"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_login_command() {
        let cli = Cli::try_parse_from(["ecoclass", "login", "-u", "admin", "-p", "admin123"]).unwrap();
        match cli.command {
            Some(Commands::Login { username, password }) => {
                assert_eq!(username, "admin");
                assert_eq!(password, "admin123");
            }
            _ => panic!("Expected Login command"),
        }
    }

    #[test]
    fn test_cli_scan_command() {
        let cli = Cli::try_parse_from(["ecoclass", "scan", "/tmp/a.jpg", "/tmp/b.png", "--no-delay"]).unwrap();
        match cli.command {
            Some(Commands::Scan { paths, no_delay }) => {
                assert!(no_delay);
                assert_eq!(paths, vec![PathBuf::from("/tmp/a.jpg"), PathBuf::from("/tmp/b.png")]);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_cli_scan_needs_paths() {
        assert!(Cli::try_parse_from(["ecoclass", "scan"]).is_err());
    }

    #[test]
    fn test_confidence_bar() {
        assert_eq!(confidence_bar(95), "█████████░");
        assert_eq!(confidence_bar(0), "░░░░░░░░░░");
        assert_eq!(confidence_bar(100), "██████████");
    }

    struct ReadOnlyStore(ecoclass::store::MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> ecoclass::Result<Option<String>> {
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> ecoclass::Result<()> {
            self.0.set(key, value)
        }

        fn remove(&self, _key: &str) -> ecoclass::Result<()> {
            Err(EcoClassError::Store("storage unavailable".to_string()))
        }
    }

    #[test]
    fn test_logout_store_failure_is_reported() {
        let config = AppConfig::default();
        let classifier = SimulatedClassifier::from_config(&config.classifier).unwrap();
        let app = EcoClass::with_parts(
            &config,
            Arc::new(ReadOnlyStore(ecoclass::store::MemoryStore::new())),
            Arc::new(classifier),
        );
        app.login("admin", "admin123").unwrap();

        assert_eq!(logout_message(&app), "Store error: storage unavailable");
        assert!(app.is_logged_in());
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" Ya "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }
}
