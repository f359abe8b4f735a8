//! Cyphergen CLI - translate GraphQL requests into Cypher from the shell.
//!
//! Requests are given as resolve trees in JSON, the schema as a schema model
//! document. Useful for inspecting what the translator produces without
//! running a GraphQL server.

mod commands;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use commands::RequestArgs;

/// GraphQL to Cypher translator.
#[derive(Parser)]
#[command(name = "cyphergen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Suppress output and info messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Output format options.
#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table format (default for TTY)
    #[default]
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Translate a request into Cypher and parameters
    Translate {
        #[command(flatten)]
        request: RequestArgs,

        /// Treat the request as a `@cypher` field on the Query type
        #[arg(long)]
        top_level_cypher: bool,
    },

    /// Print the Query AST of a request
    Explain {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// List entities and the root fields they expose
    Schema {
        /// Path to the schema model (JSON)
        schema: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so that stdout carries only the translation
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(std::io::stderr)
            .init();
    } else if !cli.quiet {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(std::io::stderr)
            .init();
    }

    let result = match cli.command {
        Commands::Translate {
            request,
            top_level_cypher,
        } => commands::translate::run(&request, top_level_cypher, cli.format, cli.quiet),
        Commands::Explain { request } => commands::explain::run(&request, cli.format, cli.quiet),
        Commands::Schema { schema } => commands::schema::run(&schema, cli.format, cli.quiet),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
