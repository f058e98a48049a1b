use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sbxml::math::{evaluate_with_diagnostics, read_math, Environment};
use sbxml::{parse_document_with, ProgramInfo, ReaderConfig, WriterConfig};

#[derive(Debug, Parser)]
#[command(
    name = "sbxml",
    version,
    about = "Reformat SBML-style XML and evaluate MathML"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse an XML document and write it back out
    Format {
        /// Input file (defaults to stdin)
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,
        /// Output file (defaults to stdout)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
        /// Write without indentation
        #[arg(long)]
        compact: bool,
        /// Emit an XML declaration
        #[arg(long)]
        declaration: bool,
        /// Program name for the "Created by" comment
        #[arg(long, value_name = "NAME")]
        program: Option<String>,
        /// Program version for the "Created by" comment
        #[arg(long, value_name = "VERSION", requires = "program")]
        program_version: Option<String>,
        /// Maximum element nesting depth (0 for unlimited)
        #[arg(long, default_value_t = 128)]
        max_depth: u16,
    },
    /// Evaluate a MathML expression
    Eval {
        /// MathML file (defaults to stdin)
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,
        /// Variable binding, repeatable
        #[arg(short, long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let args = Args::parse();
    match args.command {
        Command::Format {
            input,
            output,
            compact,
            declaration,
            program,
            program_version,
            max_depth,
        } => {
            let text = read_input(&input)?;
            let config = ReaderConfig {
                max_depth,
                ..ReaderConfig::default()
            };
            let doc = parse_document_with(&text, config).context("failed to parse XML")?;

            let mut writer = WriterConfig::default().with_indent(!compact);
            if declaration {
                let encoding = doc.encoding.clone().unwrap_or_else(|| "UTF-8".to_string());
                writer = writer.with_declaration(encoding);
            }
            if let Some(name) = program {
                writer = writer.with_program(ProgramInfo::new(name, program_version.unwrap_or_default()));
            }

            let formatted = doc.to_xml_string(writer);
            write_output(&output, formatted.as_bytes())
        }
        Command::Eval { input, vars } => {
            let text = read_input(&input)?;
            let doc = parse_document_with(&text, ReaderConfig::default())
                .context("failed to parse MathML")?;
            let expr = read_math(&doc.root).context("unsupported MathML")?;

            let mut env = Environment::new();
            for (name, value) in vars {
                env.set(name, value);
            }
            let result = evaluate_with_diagnostics(&expr, &mut env, None);
            for name in &result.undeclared {
                warn!("undeclared identifier {name} evaluates to NaN");
            }
            info!(nodes = expr.node_count(), "expression evaluated");

            write_output(&None, format!("{}\n", result.value).as_bytes())
        }
    }
}

fn parse_binding(raw: &str) -> Result<(String, f64)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got {raw:?}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("empty variable name in {raw:?}");
    }
    let value = value
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid number for {name}: {value:?}"))?;
    Ok((name.to_string(), value))
}

fn read_input(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input file {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            if buffer.trim().is_empty() {
                bail!("no input provided on stdin");
            }
            Ok(buffer)
        }
    }
}

fn write_output(path: &Option<PathBuf>, data: &[u8]) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, data)
            .with_context(|| format!("failed to write output file {}", path.display())),
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(data).context("failed to write stdout")?;
            Ok(())
        }
    }
}
