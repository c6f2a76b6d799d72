//! docmaint - Generate and review API documentation for Python modules
//!
//! Indexes a Python repository's top-level functions, then documents a module
//! by retrieving related code, drafting Markdown with an LLM and scoring the
//! drafts with an LLM judge.

use anyhow::Result;
use clap::Parser;
use docmaint::cli::{
    config_command, ingest, llm_client, load_config, print_hits_text, print_ingest_text,
    print_json, print_run_text, run, search, Cli, Commands, OutputFormat, RunOutput,
};
use docmaint::pipeline::EvaluationSummary;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Ingest(args) => {
            let config = load_config(&cli.config)?;
            let report = ingest(&config, args.repo.as_deref()).await?;

            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text => print_ingest_text(&report),
            }
        }

        Commands::Run(args) => {
            let config = load_config(&cli.config)?;
            let llm = llm_client(&config);
            let state = run(&config, llm, &args.module_path, args.query.as_deref()).await?;

            match cli.format {
                OutputFormat::Json => print_json(&RunOutput {
                    state: &state,
                    summary: EvaluationSummary::from_records(state.evaluations.values()),
                })?,
                OutputFormat::Text => print_run_text(&state),
            }
        }

        Commands::Search(args) => {
            let config = load_config(&cli.config)?;
            let hits = search(&config, &args.query, args.top_k).await?;

            match cli.format {
                OutputFormat::Json => print_json(&hits)?,
                OutputFormat::Text => print_hits_text(&hits),
            }
        }

        Commands::Config(args) => {
            config_command(&cli.config, args.show, args.init, args.force)?;
        }
    }

    Ok(())
}
