//! Offline companion for the cypherkit crate.

#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cypherkit::query::ParamStyle;
use cypherkit::{find_query, AdapterConfig};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "cypherkit",
    version,
    about = "Render criteria into Cypher and inspect connection settings",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print the query and parameters a find would send")]
    Render {
        #[arg(long, help = "Node label to match")]
        label: Option<String>,
        #[arg(
            long,
            value_name = "FILE",
            default_value = "-",
            help = "Criteria JSON file, or - for stdin"
        )]
        criteria: String,
        #[arg(long, value_enum, default_value_t = StyleArg::Braces, help = "Placeholder syntax")]
        style: StyleArg,
    },
    #[command(about = "Print the resolved endpoint of a configured connection")]
    Endpoint {
        #[arg(long, env = "CYPHERKIT_CONFIG", help = "Config file path")]
        config: Option<PathBuf>,
        #[arg(long, default_value = "default", help = "Connection identity")]
        connection: String,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StyleArg {
    Braces,
    Dollar,
}

impl From<StyleArg> for ParamStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Braces => ParamStyle::Braces,
            StyleArg::Dollar => ParamStyle::Dollar,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CYPHERKIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Render {
            label,
            criteria,
            style,
        } => {
            let raw = read_criteria(&criteria)?;
            let built = find_query(label.as_deref(), &raw, style.into())?;
            match cli.format {
                OutputFormat::Text => {
                    println!("{}", built.query);
                    println!("--");
                    println!("{}", serde_json::to_string_pretty(&built.params)?);
                }
                OutputFormat::Json => {
                    let out = json!({ "query": built.query, "params": built.params });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
        Command::Endpoint { config, connection } => {
            let config = AdapterConfig::load(config)?;
            let settings = config.connection(&connection)?;
            match cli.format {
                OutputFormat::Text => println!("{}", settings.endpoint()),
                OutputFormat::Json => {
                    let out = json!({
                        "connection": connection,
                        "endpoint": settings.endpoint(),
                        "debug": settings.debug,
                    });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                }
            }
        }
    }
    Ok(())
}

fn read_criteria(source: &str) -> Result<Value, Box<dyn Error>> {
    let text = if source == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(source)?
    };
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}
