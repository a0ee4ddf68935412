//! Reify CLI - resolve and lint reify documents

use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;

use reify::{Document, FixSuggestion, Registry, ReifyError};

#[derive(Parser)]
#[command(name = "reify")]
#[command(about = "Reify - materialize documents with forward references")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a document and print the materialized JSON
    Resolve {
        /// Path to the .reify.yaml document
        file: String,

        /// Override the document's deadline
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Print the resolution event log to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Parse and lint a document without resolving it
    Validate {
        /// Path to the .reify.yaml document
        file: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Resolve {
            file,
            deadline_ms,
            trace,
        } => resolve_document(&file, deadline_ms, trace).await,
        Commands::Validate { file } => validate_document(&file).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn resolve_document(
    file: &str,
    deadline_override: Option<u64>,
    trace: bool,
) -> Result<(), ReifyError> {
    let document = Document::load(file).await?;

    let mut resolver = document.resolver()?;
    if let Some(ms) = deadline_override {
        let options = resolver
            .options()
            .clone()
            .with_deadline(Duration::from_millis(ms));
        resolver = resolver.with_options(options);
    }

    let registry = Registry::new();
    let events = registry.events().clone();
    let outcome = resolver.resolve_in(document.into_root(), registry).await;

    if trace {
        eprintln!("{}", "Events:".cyan().bold());
        eprintln!("{}", serde_json::to_string_pretty(&events.to_json())?);
    }

    let resolution = outcome?;
    println!("{}", serde_json::to_string_pretty(&resolution.value)?);
    eprintln!(
        "{} {} entities registered in {}ms",
        "✓".green(),
        resolution.registered.len(),
        resolution.elapsed.as_millis()
    );

    Ok(())
}

async fn validate_document(file: &str) -> Result<(), ReifyError> {
    let document = Document::load(file).await?;
    // Catches invalid tags under `types:`
    document.resolver()?;

    let issues = document.lint();
    for issue in &issues {
        let label = if issue.is_error() {
            "error:".red().bold()
        } else {
            "warning:".yellow().bold()
        };
        eprintln!("  {} {}", label, issue);
    }

    let errors = issues.iter().filter(|i| i.is_error()).count();
    if errors > 0 {
        return Err(ReifyError::InvalidDocument {
            reason: format!("{errors} lint error(s) in '{file}'"),
        });
    }

    println!("{} Document '{}' is valid", "✓".green(), file);
    println!("  Types: {}", document.types.len());
    println!("  Nodes: {}", document.root.node_count());
    println!("  Warnings: {}", issues.len());

    Ok(())
}
