//! Precis CLI - Summarise webpages with Gemini
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use precis::clipboard::{CopyButton, CopyOutcome, SystemClipboard};
use precis::fetch::{self, Page};
use precis::surface::{Surface, TerminalSurface};
use precis::{
    Config, Controller, CredentialStore, ExtractedContent, GeminiClient, LocalPageHost,
    PageHost, SledCredentialStore, StaticCredentialStore, SummaryStyle,
};

#[derive(Parser)]
#[command(name = "precis")]
#[command(author, version, about = "Summarise the readable content of a webpage", long_about = None)]
struct Cli {
    /// Path to a config file (defaults to precis.toml in cwd or ~/.config/precis)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise a webpage by URL or saved HTML file
    Summarise {
        /// URL to summarise
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        url: Option<String>,
        /// Summarise a local HTML file instead of a URL
        #[arg(long)]
        file: Option<PathBuf>,
        /// brief, detailed, bullet-points or concise
        #[arg(short, long)]
        style: Option<String>,
        /// Show raw extracted text instead of summary
        #[arg(long)]
        raw: bool,
        /// Copy the result to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Store the Gemini API key
    SetKey,
    /// Remove the stored Gemini API key
    ClearKey,
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Summarise {
            url,
            file,
            style,
            raw,
            copy,
        } => {
            let page = match (url, file) {
                (_, Some(path)) => fetch::load_file(&path)?,
                (Some(url), None) => {
                    eprintln!("{} {}", "Fetching:".bold(), url);
                    fetch::fetch_page(&url, config.fetch_timeout()).await?
                }
                (None, None) => anyhow::bail!("either a URL or --file is required"),
            };

            if raw {
                return print_raw(&config, page).await;
            }

            let style = style
                .as_deref()
                .map(SummaryStyle::from_name)
                .unwrap_or_else(|| config.default_style());
            summarise(&config, page, style, copy).await
        }
        Commands::SetKey => {
            let key = dialoguer::Password::new()
                .with_prompt("Gemini API key")
                .interact()?;
            let store = SledCredentialStore::open(credentials_path(&config))?;
            store.set_api_key(&key)?;
            println!("{}", "API key saved.".green());
            Ok(ExitCode::SUCCESS)
        }
        Commands::ClearKey => {
            let store = SledCredentialStore::open(credentials_path(&config))?;
            if store.clear()? {
                println!("{}", "API key removed.".green());
            } else {
                println!("No API key was stored.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "precis", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "precis=debug" } else { "precis=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn credentials_path(config: &Config) -> PathBuf {
    config.storage.path.join("credentials")
}

fn credential_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    match &config.api.gemini_key {
        Some(key) => Ok(Arc::new(StaticCredentialStore::new(Some(key.clone())))),
        None => {
            let store = SledCredentialStore::open(credentials_path(config))
                .context("failed to open credential store")?;
            Ok(Arc::new(store))
        }
    }
}

/// Show what the extractor sees without calling the model
async fn print_raw(config: &Config, page: Page) -> anyhow::Result<ExitCode> {
    let host = LocalPageHost::new(config.bridge_timeout());
    let tab = host.open_tab(page.url, page.html);
    host.inject_extractor(tab).await?;

    let title = page.title.unwrap_or_else(|| "No title".to_string());
    println!("\n=== {} ===\n", title);
    match host.request_content(tab).await? {
        ExtractedContent::Text { text } => {
            println!("{}", text);
            println!("\n--- Extracted {} characters ---", text.chars().count());
            Ok(ExitCode::SUCCESS)
        }
        ExtractedContent::Failed { error, .. } => {
            eprintln!("{}", error.yellow());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn summarise(
    config: &Config,
    page: Page,
    style: SummaryStyle,
    copy: bool,
) -> anyhow::Result<ExitCode> {
    let host = Arc::new(LocalPageHost::new(config.bridge_timeout()));
    host.open_tab(page.url, page.html);

    if let Some(title) = &page.title {
        println!("=== {} ===", title.bold());
    }

    let surface = Arc::new(TerminalSurface::new());
    let controller = Controller::new(
        host,
        credential_store(config)?,
        Arc::new(GeminiClient::from_config(config)?),
        surface.clone(),
    );

    if controller.on_summarize_clicked(Some(style)).await.is_err() {
        return Ok(ExitCode::FAILURE);
    }

    if copy {
        let button = CopyButton::default();
        match button.click(&surface.visible_text(), &SystemClipboard) {
            CopyOutcome::Copied => eprintln!("{} {}", button.label().green(), "Copied"),
            CopyOutcome::Failed => eprintln!("{}", button.label().red()),
            CopyOutcome::Skipped => {}
        }
    }

    Ok(ExitCode::SUCCESS)
}
