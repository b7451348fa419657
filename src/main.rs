use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

use authcheck_lib::api::{self, Checker};

#[derive(Parser)]
#[command(name = "authcheck")]
#[command(about = "AI-text detection, paraphrasing and plagiarism checks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate how likely the text is AI-generated and highlight suspect sentences
    Detect {
        /// Input file (reads stdin if not provided)
        file: Option<PathBuf>,

        /// Ask for the single `aiSentences` list instead of confidence tiers
        #[arg(long)]
        legacy: bool,

        /// Also write the highlighted markup to this file
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// Rewrite the text to sound more natural
    Paraphrase {
        /// Input file (reads stdin if not provided)
        file: Option<PathBuf>,

        /// default, formal, casual or simple
        #[arg(short, long)]
        style: Option<String>,
    },

    /// Check the text against a plagiarism service (simulated when none is configured)
    Plagiarism {
        /// Input file (reads stdin if not provided)
        file: Option<PathBuf>,
    },

    /// Highlight a saved detection response offline
    Render {
        /// Saved detection response (raw upstream JSON or the parsed result)
        #[arg(short, long)]
        result: PathBuf,

        /// Text the response refers to (reads stdin if not provided)
        file: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the current configuration with API keys masked
    Show,
    /// Store an API key (gemini or plagiarism)
    SetKey { provider: String, key: String },
    /// Remove a stored API key
    DeleteKey { provider: String },
    /// Override a provider's base URL
    SetUrl { provider: String, url: String },
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn checker() -> Result<Checker> {
    let config = api::get_config().map_err(|e| anyhow!(e))?;
    Checker::from_config(config).map_err(|e| anyhow!(e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    authcheck_lib::init_logging();

    match cli.command {
        Commands::Detect { file, legacy, html } => {
            let text = read_input(file.as_ref())?;
            let tiered = if legacy { Some(false) } else { None };
            let report = checker()?
                .detect_text(&text, tiered)
                .await
                .map_err(|e| anyhow!(e))?;
            if let Some(path) = html {
                std::fs::write(&path, &report.highlighted_html)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            print_json(&report)?;
        }
        Commands::Paraphrase { file, style } => {
            let text = read_input(file.as_ref())?;
            let result = checker()?
                .paraphrase_text(&text, style.as_deref())
                .await
                .map_err(|e| anyhow!(e))?;
            print_json(&result)?;
        }
        Commands::Plagiarism { file } => {
            let text = read_input(file.as_ref())?;
            let report = checker()?
                .check_plagiarism(&text)
                .await
                .map_err(|e| anyhow!(e))?;
            print_json(&report)?;
        }
        Commands::Render { result, file } => {
            let saved = std::fs::read_to_string(&result)
                .with_context(|| format!("Failed to read {}", result.display()))?;
            let response: serde_json::Value =
                serde_json::from_str(&saved).context("Saved result is not valid JSON")?;
            let text = read_input(file.as_ref())?;
            let report = api::render_saved(&text, &response).map_err(|e| anyhow!(e))?;
            print_json(&report)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = api::get_config().map_err(|e| anyhow!(e))?;
                print_json(&api::redacted(&config))?;
            }
            ConfigAction::SetKey { provider, key } => {
                api::store_api_key(&provider, &key).map_err(|e| anyhow!(e))?;
                eprintln!("Stored API key for {}", provider);
            }
            ConfigAction::DeleteKey { provider } => {
                api::delete_api_key(&provider).map_err(|e| anyhow!(e))?;
                eprintln!("Deleted API key for {}", provider);
            }
            ConfigAction::SetUrl { provider, url } => {
                api::set_provider_url(&provider, &url).map_err(|e| anyhow!(e))?;
                eprintln!("Set {} base URL to {}", provider, url);
            }
        },
    }

    Ok(())
}
