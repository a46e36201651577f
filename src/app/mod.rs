use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use std::path::PathBuf;

use qsfilter::dsl::{parse_criteria, tokenize};
use qsfilter::filter::{matches, to_json};
use qsfilter::{AnyProperty, FilterCache, Settings, string_to_sort};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (YAML)
    #[arg(short, long, env = "QSFILTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the token stream of a query string
    Tokens { text: String },

    /// Print the parsed criteria
    Ast { text: String },

    /// Compile a filter; with --document, also evaluate it
    Filter {
        text: String,

        /// JSON document to evaluate the filter against
        #[arg(short, long)]
        document: Option<PathBuf>,
    },

    /// Compile a sort expression; pass `--` before texts starting with `-`
    Sort {
        #[arg(allow_hyphen_values = true)]
        text: String,
    },
}

pub fn run(cli: &Cli, settings: &Settings) -> Result<Value> {
    match &cli.command {
        Command::Tokens { text } => Ok(serde_json::to_value(tokenize(text))?),
        Command::Ast { text } => {
            let criteria = parse_criteria(text).context("Parser: Failed to parse criteria")?;
            Ok(serde_json::to_value(criteria)?)
        }
        Command::Filter { text, document } => {
            let cache = FilterCache::from_settings(&settings.cache);
            let node = cache
                .compile::<AnyProperty>(text)
                .context("Compiler: Failed to compile filter")?;
            let filter = to_json(&node);
            match document {
                None => Ok(filter),
                Some(path) => {
                    let raw = std::fs::read_to_string(path)
                        .with_context(|| format!("IO: Failed to read {}", path.display()))?;
                    let document: Value = serde_json::from_str(&raw)
                        .with_context(|| format!("IO: Invalid JSON in {}", path.display()))?;
                    let matched = matches(&node, &document);
                    tracing::info!("Document {} matched: {}", path.display(), matched);
                    Ok(json!({ "filter": filter, "matches": matched }))
                }
            }
        }
        Command::Sort { text } => {
            let node = string_to_sort::<AnyProperty>(text).context("Parser: Failed to parse sort")?;
            Ok(serde_json::to_value(node)?)
        }
    }
}
