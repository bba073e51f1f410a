//! md2pdf - command-line driver for the md2pdf studio session
//!
//! Entry point for the application. Handles CLI argument parsing, logging
//! initialization, and runs one of the session commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use md2pdf_studio::config::Config;
use md2pdf_studio::file_handler::{FileWatcher, WatcherConfig};
use md2pdf_studio::markdown::style::StyleOptions;
use md2pdf_studio::utils::path::expand_tilde;
use md2pdf_studio::{App, ExportMode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long to wait for grammar downloads before giving up on them
const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "md2pdf", version, about = "Markdown preview, highlighting and PDF export", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, env = "MD2PDF_CONFIG")]
    config: Option<PathBuf>,

    /// Style options as JSON with camelCase option names
    #[arg(long)]
    style: Option<PathBuf>,

    /// Treat a URL input as a studio page location and load its `url` parameter
    #[arg(long, global = true)]
    from_location: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the preview host document
    Render {
        /// Markdown file or URL
        input: String,
        /// Output HTML file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print editor highlight marks for fenced code
    Marks {
        /// Markdown file or URL
        input: String,
    },
    /// Render a PDF through the render API
    Export {
        /// Markdown file or URL
        input: String,
        /// Output PDF file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Send the rendered preview document instead of the Markdown source
        #[arg(long)]
        snapshot: bool,
        /// Render API base URL
        #[arg(long, env = "MD2PDF_API_BASE")]
        api_base: Option<String>,
    },
    /// Re-render the preview whenever the file changes
    Watch {
        /// Markdown file
        input: PathBuf,
        /// Output HTML file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load_from(&expand_tilde(path))?,
        None => Config::load()?,
    };
    let style = match &cli.style {
        Some(path) => StyleOptions::load_from(&expand_tilde(path))?,
        None => StyleOptions::default(),
    };

    match cli.command {
        Commands::Render { input, output } => {
            let mut app = App::new(config, style)?;
            load_input(&mut app, &input, cli.from_location).await?;
            app.settle(SETTLE_TIMEOUT).await;
            write_or_print(output.as_deref(), app.preview_document())?;
        }
        Commands::Marks { input } => {
            let mut app = App::new(config, style)?;
            load_input(&mut app, &input, cli.from_location).await?;
            app.settle(SETTLE_TIMEOUT).await;
            for region in app.decorator().regions() {
                println!(
                    "region lines {}..{} grammar {}",
                    region.open_line,
                    region.close_line.unwrap_or(region.content.end),
                    region.grammar_id.as_deref().unwrap_or("-")
                );
            }
            for mark in app.marks() {
                println!("{}:{}-{} {}", mark.line, mark.start, mark.end, mark.class);
            }
        }
        Commands::Export {
            input,
            output,
            snapshot,
            api_base,
        } => {
            if let Some(api_base) = api_base {
                config.export.api_base = api_base;
            }
            let output = output.unwrap_or_else(|| PathBuf::from(&config.export.file_name));
            let mut app = App::new(config, style)?;
            load_input(&mut app, &input, cli.from_location).await?;
            app.settle(SETTLE_TIMEOUT).await;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupted, cancelling export");
                    on_interrupt.cancel();
                }
            });

            let mode = if snapshot {
                ExportMode::Snapshot
            } else {
                ExportMode::Source
            };
            let artifact = app
                .export_pdf(mode, &cancel)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            artifact
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            log::info!("Saved {} ({} bytes)", output.display(), artifact.bytes.len());
        }
        Commands::Watch { input, output } => {
            let input = expand_tilde(&input);
            let mut app = App::new(config, style)?;
            app.import_file(&input).await?;
            app.settle(SETTLE_TIMEOUT).await;
            write_or_print(Some(&output), app.preview_document())?;

            let mut watcher = FileWatcher::new(&input, WatcherConfig::default())?;
            log::info!("Watching {} (Ctrl+C to stop)", input.display());
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                }
                if app.pump_grammar_events() {
                    write_or_print(Some(&output), app.preview_document())?;
                }
                if !watcher.poll() {
                    continue;
                }
                match app.import_file(&input).await {
                    Ok(()) => write_or_print(Some(&output), app.preview_document())?,
                    Err(e) => log::error!("{}", e.user_message()),
                }
            }
        }
    }

    Ok(())
}

/// Initialize the logging system
fn init_logging() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info,md2pdf_studio=debug"),
    )
    .format_timestamp_millis()
    .init();
}

/// Load a file path, an http(s) URL or a page location into the session
async fn load_input(app: &mut App, input: &str, from_location: bool) -> Result<()> {
    if from_location {
        app.import_location(input)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))
    } else if input.starts_with("http://") || input.starts_with("https://") {
        app.import_url(input)
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))
    } else {
        app.import_file(expand_tilde(Path::new(input)))
            .await
            .map_err(|e| anyhow::anyhow!(e.user_message()))
    }
}

fn write_or_print(output: Option<&Path>, document: &str) -> Result<()> {
    match output {
        Some(path) => std::fs::write(path, document)
            .with_context(|| format!("writing {}", path.display())),
        None => {
            println!("{}", document);
            Ok(())
        }
    }
}
