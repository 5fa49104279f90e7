use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gdheader::{parse_header, Config, Dialect};

/// Print the declarations of an engine header as JSON.
#[derive(Parser)]
#[command(name = "dump")]
struct Cli {
    /// Header to read; stdin when absent or '-'
    header: Option<PathBuf>,

    /// JSON pipeline configuration; flags below are applied on top of it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    dialect: Option<Dialect>,

    /// Treat the header as included from C++
    #[arg(long)]
    cplusplus: bool,

    /// Define a name before evaluation
    #[arg(short = 'D', value_name = "NAME")]
    define: Vec<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => { Config::default() }
    };
    if let Some(dialect) = cli.dialect { config.dialect = dialect; }
    config.cplusplus |= cli.cplusplus;
    config.defines.extend(cli.define);

    let (name, source) = match cli.header {
        Some(ref path) if path.as_os_str() != "-" => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            (path.display().to_string(), source)
        }
        _ => {
            let mut source = String::default();
            io::stdin().read_to_string(&mut source).context("reading stdin")?;
            ("<stdin>".to_string(), source)
        }
    };

    let header = parse_header(&source, &config).map_err(|error| anyhow!("{}:{}", name, error))?;
    info!(header = %name, declarations = header.exprs.len(), "parsed");

    println!("{}", header.to_json()?);
    Ok(())
}
