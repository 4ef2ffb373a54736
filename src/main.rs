//! # PDF Chat CLI (`pdfchat`)
//!
//! Thin shell over [`pdf_chat::Pipeline`].
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfchat models` | List installed Ollama models |
//! | `pdfchat status` | Current model, availability and index size |
//! | `pdfchat ingest <FILE>...` | Add documents to the index |
//! | `pdfchat ask "<question>"` | One-shot answer |
//! | `pdfchat chat` | Interactive session on stdin |
//!
//! Logs go to stderr; `RUST_LOG` overrides the default `warn` filter and
//! `--verbose` switches to `debug`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pdf_chat::config::{self, Config};
use pdf_chat::Pipeline;

const DEFAULT_CONFIG: &str = "./pdfchat.toml";
const NO_MODELS_MESSAGE: &str =
    "No Ollama models found. Please install models with 'ollama pull <model_name>'";

/// Chat with your PDF documents using a local language model.
#[derive(Parser)]
#[command(name = "pdfchat", version, about)]
struct Cli {
    /// Path to configuration file (TOML). Defaults to `./pdfchat.toml`;
    /// built-in defaults apply when that file does not exist.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List models installed in the local inference backend.
    Models,

    /// Show the selected model, whether it is installed, and the index size.
    Status {
        /// Model to report on instead of the configured default.
        #[arg(long)]
        model: Option<String>,
    },

    /// Add one or more documents (PDF, DOCX or text) to the index.
    Ingest {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a single question from the indexed documents.
    Ask {
        question: String,

        /// Installed model to answer with.
        #[arg(long)]
        model: Option<String>,
    },

    /// Interactive question-answering session.
    ///
    /// Lines starting with `/` are commands: `/model NAME`, `/ingest PATH`,
    /// `/clear`, `/models`, `/status`, `/quit`.
    Chat {
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cfg = load_config(cli.config.as_deref())?;
    let mut pipeline = Pipeline::from_config(&cfg)?;

    match cli.command {
        Commands::Models => {
            let models = pipeline.list_available_models().await;
            if models.is_empty() {
                bail!(NO_MODELS_MESSAGE);
            }
            for name in models {
                println!("{}", name);
            }
        }
        Commands::Status { model } => {
            if let Some(name) = model {
                choose_model(&mut pipeline, &name).await?;
            }
            print_status(&mut pipeline).await?;
        }
        Commands::Ingest { files } => {
            for file in &files {
                ingest_file(&mut pipeline, file).await?;
            }
        }
        Commands::Ask { question, model } => {
            if let Some(name) = model {
                choose_model(&mut pipeline, &name).await?;
            }
            let answer = pipeline.ask(&question).await?;
            println!("{}", answer);
        }
        Commands::Chat { model } => {
            if let Some(name) = model {
                choose_model(&mut pipeline, &name).await?;
            }
            run_chat(&mut pipeline).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let cfg = match path {
        Some(path) => config::load_config(path)?,
        None => config::load_config_or_default(Path::new(DEFAULT_CONFIG))?,
    };
    Ok(cfg)
}

async fn choose_model(pipeline: &mut Pipeline, name: &str) -> anyhow::Result<()> {
    if pipeline.select_model(name).await {
        return Ok(());
    }
    let available = pipeline.list_available_models().await;
    if available.is_empty() {
        bail!(NO_MODELS_MESSAGE);
    }
    bail!(
        "Model '{}' is not installed. Available models: {}",
        name,
        available.join(", ")
    )
}

async fn ingest_file(pipeline: &mut Pipeline, file: &Path) -> anyhow::Result<()> {
    let report = pipeline
        .ingest(file)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.source.clone());
    println!(
        "Ingested {} in {:.2} seconds",
        name,
        report.elapsed.as_secs_f64()
    );
    if report.chunks == 0 {
        eprintln!("Warning: no text could be extracted from {}", name);
    }
    Ok(())
}

async fn print_status(pipeline: &mut Pipeline) -> anyhow::Result<()> {
    let status = pipeline.model_status().await;
    if status.name.is_empty() {
        println!("Model: (none selected)");
    } else {
        let marker = if status.available {
            "available"
        } else {
            "not installed"
        };
        println!("Model: {} ({})", status.name, marker);
    }
    match pipeline.indexed_chunks().await? {
        Some(n) => println!(
            "Index: {} chunks in {}",
            n,
            pipeline.storage_dir().display()
        ),
        None => println!("Index: empty ({})", pipeline.storage_dir().display()),
    }
    Ok(())
}

async fn run_chat(pipeline: &mut Pipeline) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(command) = line.strip_prefix('/') else {
            match pipeline.ask(line).await {
                Ok(answer) => println!("{}", answer),
                Err(e) => eprintln!("Error: {}", e),
            }
            continue;
        };

        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };
        let result = match name {
            "quit" | "exit" => break,
            "model" if !arg.is_empty() => choose_model(pipeline, arg)
                .await
                .map(|_| println!("Now using {}", arg)),
            "ingest" if !arg.is_empty() => ingest_file(pipeline, Path::new(arg)).await,
            "clear" => {
                pipeline.clear().await;
                println!("Cleared.");
                Ok(())
            }
            "models" => {
                let models = pipeline.list_available_models().await;
                if models.is_empty() {
                    println!("{}", NO_MODELS_MESSAGE);
                }
                for m in models {
                    println!("{}", m);
                }
                Ok(())
            }
            "status" => print_status(pipeline).await,
            _ => {
                println!("Commands: /model NAME, /ingest PATH, /clear, /models, /status, /quit");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {:#}", e);
        }
    }

    Ok(())
}
