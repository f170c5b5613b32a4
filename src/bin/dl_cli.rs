//! Directory-group rule CLI
//!
//! Runs the parse / propose / apply pipeline against the demo directory.
//!
//! # Usage
//!
//! ```bash
//! # Parse text into intent and slots
//! dl_cli parse "add contractors ending soon to MSG_Production_East"
//!
//! # Propose (and optionally apply) a rule
//! dl_cli propose "add everyone in Houston HQ" --group Corporate_IT --apply --actor ops
//!
//! # Validate an expression
//! dl_cli validate 'employmentType == "Contractor" and tenureDays <= 30'
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use dl_intent::changes::DEFAULT_AUDIT_LIMIT;
use dl_intent::nlp::{assemble_from_directory, GazetteerSlotTagger, KeywordIntentClassifier};
use dl_intent::rules::SAVED_FILTERS;
use dl_intent::{
    ChangeService, DirectoryStore, DlConfig, InMemoryDirectoryStore, IntentSlotParser,
    ProposeRequest, SynonymSeed, SynonymTable,
};

#[derive(Parser)]
#[command(name = "dl_cli")]
#[command(version = "0.1.0")]
#[command(about = "Natural-language directory group rules against the demo directory")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse text into intent, slots and tokens
    Parse {
        /// Operator text
        text: String,
    },

    /// Parse text and propose the resulting rule
    Propose {
        /// Operator text
        text: String,

        /// Target group name or id (overrides any group found in the text)
        #[arg(long, short)]
        group: Option<String>,

        /// Apply the diff right after proposing it
        #[arg(long)]
        apply: bool,

        /// Actor recorded in the audit log
        #[arg(long, default_value = "dl_cli")]
        actor: String,
    },

    /// Compile an expression and preview its matches
    Validate {
        /// Rule expression
        expression: String,
    },

    /// Show the audit log
    Audit {
        /// Maximum number of entries
        #[arg(long, default_value_t = DEFAULT_AUDIT_LIMIT)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse { text } => cmd_parse(&text, cli.format).await,
        Commands::Propose {
            text,
            group,
            apply,
            actor,
        } => cmd_propose(&text, group.as_deref(), apply, &actor, cli.format, cli.quiet).await,
        Commands::Validate { expression } => cmd_validate(&expression, cli.format).await,
        Commands::Audit { limit } => cmd_audit(limit, cli.format).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", serde_json::json!({ "error": format!("{e:#}") }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// SETUP
// =============================================================================

struct Pipeline {
    parser: IntentSlotParser,
    service: ChangeService,
}

async fn pipeline() -> anyhow::Result<Pipeline> {
    let config = DlConfig::from_env();
    let seed = match &config.synonyms_path {
        Some(path) => SynonymSeed::load(path)?,
        None => SynonymSeed::builtin()?,
    };

    let store = Arc::new(InMemoryDirectoryStore::demo());
    let table = if config.dynamic_synonyms {
        assemble_from_directory(store.as_ref(), &seed).await
    } else {
        SynonymTable::from_seed(&seed)
    };

    let groups = store
        .list_groups()
        .await
        .context("failed to list directory groups")?;
    let tagger = GazetteerSlotTagger::from_vocabulary(
        groups.iter().map(|group| group.name.as_str()),
        &table,
        SAVED_FILTERS.iter().map(|filter| filter.name),
    );

    let parser = IntentSlotParser::new(Arc::new(KeywordIntentClassifier), Arc::new(tagger), table)
        .with_manager_context(config.manager_context_phrases.clone());
    let service = ChangeService::new(store, config);
    Ok(Pipeline { parser, service })
}

fn print_output<T: Serialize>(heading: &str, value: &T, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(value)?),
        OutputFormat::Pretty => {
            println!("{} {}", "OK".green(), heading);
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

async fn cmd_parse(text: &str, format: OutputFormat) -> anyhow::Result<()> {
    let Pipeline { parser, .. } = pipeline().await?;
    let parsed = parser.parse(text)?;
    print_output("parsed", &parsed, format)
}

async fn cmd_propose(
    text: &str,
    group: Option<&str>,
    apply: bool,
    actor: &str,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let Pipeline { parser, service } = pipeline().await?;
    let parsed = parser.parse(text)?;
    if !quiet && format == OutputFormat::Pretty {
        println!(
            "{} intent {} ({:.2})",
            "->".cyan(),
            parsed.intent.bold(),
            parsed.confidence
        );
    }

    let request = ProposeRequest::from_parse(&parsed, group)?;
    let proposal = service.propose(&request).await?;

    if !apply {
        return print_output("proposed", &proposal, format);
    }

    let applied = service.apply(&proposal.id, actor).await?;
    print_output(
        "applied",
        &serde_json::json!({ "proposal": proposal, "apply": applied }),
        format,
    )
}

async fn cmd_validate(expression: &str, format: OutputFormat) -> anyhow::Result<()> {
    let Pipeline { service, .. } = pipeline().await?;
    let validation = service.validate_expression(expression).await?;
    print_output("valid", &validation, format)
}

async fn cmd_audit(limit: usize, format: OutputFormat) -> anyhow::Result<()> {
    let Pipeline { service, .. } = pipeline().await?;
    let entries = service.audit_log(limit).await?;
    print_output("audit", &entries, format)
}
