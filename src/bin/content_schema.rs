//! Content Schema CLI
//!
//! Validates and transforms content documents against a schema, and
//! inspects loaded schemas.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use content_schema::config::OutputFormat;
use content_schema::transform::Resolvers;
use content_schema::{
    parse_json, parse_yaml, Diagnostics, EngineConfig, SchemaHandle, SchemaSet, Transformer, Validator,
    ValueTree,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "content-schema")]
#[command(about = "Validate and transform content documents against a schema")]
struct Cli {
    /// Config file (defaults to content-schema.toml lookup)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate content files or directories
    Validate {
        /// Schema file
        schema: PathBuf,
        /// Content files (.json, .yml, .yaml) or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Transform one content file with pass-through collaborators
    Transform {
        /// Schema file
        schema: PathBuf,
        /// Content file
        file: PathBuf,
    },

    /// Show a schema's addresses, checksum and ref cycles
    Inspect {
        /// Schema file
        schema: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match EngineConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command, &config) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the run passed
fn run(command: Commands, config: &EngineConfig) -> anyhow::Result<bool> {
    let schemas = SchemaSet::new();
    if let Some(dir) = config.schema_dir() {
        let count = schemas
            .load_directory(&dir)
            .with_context(|| format!("Failed to load schemas from {}", dir.display()))?;
        info!(dir = %dir.display(), count, "Registered schema directory");
    }

    match command {
        Commands::Validate { schema, paths, json } => {
            let document = schemas
                .load_file(&schema)
                .with_context(|| format!("Failed to load schema {}", schema.display()))?;
            let root = SchemaHandle::root(&document);
            let validator = Validator::new(&schemas).with_reference_time(config.reference_time());

            let mut diagnostics = Diagnostics::new();
            let mut files = 0;
            for file in content_files(&paths) {
                let tree = read_content(&file)?;
                diagnostics.extend(validator.validate(&root, &tree)?);
                files += 1;
            }
            info!(files, diagnostics = diagnostics.len(), "Validation finished");

            if let Some(max) = config.validation.max_errors {
                diagnostics.truncate(max);
            }

            if json {
                println!("{}", to_json(&diagnostics.all(), config.output.format)?);
            } else if diagnostics.is_empty() {
                println!("✅ {} file(s) valid", files);
            } else {
                print!("{}", diagnostics.format_all());
            }
            Ok(!diagnostics.has_errors())
        }

        Commands::Transform { schema, file } => {
            let document = schemas
                .load_file(&schema)
                .with_context(|| format!("Failed to load schema {}", schema.display()))?;
            let transformer = Transformer::new(&schemas, Resolvers::passthrough());

            let tree = read_content(&file)?;
            let output = transformer.transform(&SchemaHandle::root(&document), tree)?;

            println!("{}", to_json(&output.tree.root, config.output.format)?);
            let diagnostics = Diagnostics::from(output.errors);
            if !diagnostics.is_empty() {
                eprint!("{}", diagnostics.format_all());
            }
            Ok(!diagnostics.has_errors())
        }

        Commands::Inspect { schema } => {
            let document = schemas
                .load_file(&schema)
                .with_context(|| format!("Failed to load schema {}", schema.display()))?;

            println!("📄 {}", document.address());
            println!("   checksum: {}", document.checksum());
            println!("   nodes:    {}", document.node_count());
            println!();
            println!("Addresses:");
            for address in document.addresses() {
                println!("  {}", address);
            }

            if !document.ref_cycles().is_empty() {
                println!();
                println!("⚠️  $ref cycles (resolve to the false schema):");
                for cycle in document.ref_cycles() {
                    println!("  └─ {}", cycle.join(" -> "));
                }
            }
            Ok(true)
        }
    }
}

/// Expand directories into the content files below them
fn content_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_content_file(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn is_content_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yml" | "yaml")
    )
}

fn read_content(path: &Path) -> anyhow::Result<ValueTree> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path.display().to_string();
    let tree = match path.extension().and_then(|e| e.to_str()) {
        Some("yml" | "yaml") => parse_yaml(&name, &text)?,
        _ => parse_json(&name, &text)?,
    };
    Ok(tree)
}

fn to_json<T: serde::Serialize>(value: &T, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Pretty => serde_json::to_string_pretty(value)?,
        OutputFormat::Compact => serde_json::to_string(value)?,
    })
}
