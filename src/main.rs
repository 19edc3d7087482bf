use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use erdview::bounds::{compute_domain_bounds, compute_schema_bounds};
use erdview::config::DiagramConfig;
use erdview::highlight::compute_highlighted_columns;
use erdview::schema::SchemaDefinition;
use erdview::state::ColumnSelection;
use erdview::topology::{ColumnRef, SchemaTopology};
use std::collections::BTreeSet;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "erdview", version, about = "Inspect and lay out ER diagrams from JSON schema definitions")]
struct Args {
    /// Diagram config (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resolved tables and relationships
    Topology { schema: PathBuf },
    /// Compute the layered layout
    Layout {
        schema: PathBuf,
        /// Table to leave out of the layout (repeatable)
        #[arg(long = "hide", value_name = "TABLE")]
        hidden: Vec<String>,
    },
    /// Show which columns a key selection highlights
    Highlight {
        schema: PathBuf,
        #[arg(long)]
        table: String,
        #[arg(long)]
        column: String,
        /// Selection kind; inferred from the column when omitted
        #[arg(long, value_enum)]
        kind: Option<SelectionKind>,
    },
    /// Print padded group bounds over the default layout
    Bounds {
        schema: PathBuf,
        #[arg(long, value_enum, default_value_t = Grouping::Schema)]
        by: Grouping,
        #[arg(long = "hide", value_name = "TABLE")]
        hidden: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SelectionKind {
    Pk,
    Fk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Grouping {
    Schema,
    Domain,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_topology(path: &Path) -> Result<SchemaTopology, Box<dyn Error>> {
    let schema = SchemaDefinition::load(path)?;
    let topology = SchemaTopology::build(&schema);
    info!(
        path = %path.display(),
        tables = topology.tables().len(),
        relationships = topology.relationships().len(),
        "Loaded schema"
    );
    Ok(topology)
}

fn selection_for(
    topology: &SchemaTopology,
    table: &str,
    column: &str,
    kind: Option<SelectionKind>,
) -> Result<ColumnSelection, Box<dyn Error>> {
    let target = ColumnRef::new(table, column);
    let Some(resolved) = topology.column(&target) else {
        return Err(format!("Unknown column: {}", target).into());
    };
    let kind = kind.unwrap_or(if resolved.is_primary_key {
        SelectionKind::Pk
    } else {
        SelectionKind::Fk
    });
    Ok(match kind {
        SelectionKind::Pk => ColumnSelection::primary_key(table, column),
        SelectionKind::Fk => ColumnSelection::foreign_key(table, column),
    })
}

fn run(args: &Args) -> Result<String, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => DiagramConfig::load(path)?,
        None => DiagramConfig::default(),
    };

    let output = match &args.command {
        Command::Topology { schema } => {
            let topology = load_topology(schema)?;
            serde_json::to_string_pretty(&topology)?
        }
        Command::Layout { schema, hidden } => {
            let topology = load_topology(schema)?;
            let hidden: BTreeSet<String> = hidden.iter().cloned().collect();
            let layout = config.layout.layout(&topology, &hidden);
            if !layout.broken_edges.is_empty() {
                info!(count = layout.broken_edges.len(), "Layout has back edges");
            }
            serde_json::to_string_pretty(&layout)?
        }
        Command::Highlight {
            schema,
            table,
            column,
            kind,
        } => {
            let topology = load_topology(schema)?;
            let selection = selection_for(&topology, table, column, *kind)?;
            let highlighted =
                compute_highlighted_columns(Some(&selection), topology.relationships());
            serde_json::to_string_pretty(&highlighted)?
        }
        Command::Bounds { schema, by, hidden } => {
            let topology = load_topology(schema)?;
            let hidden: BTreeSet<String> = hidden.iter().cloned().collect();
            let layout = config.layout.layout(&topology, &hidden);
            let bounds = match by {
                Grouping::Schema => {
                    compute_schema_bounds(&topology, &layout.positions, &hidden, config.bounds_padding)
                }
                Grouping::Domain => {
                    compute_domain_bounds(&topology, &layout.positions, &hidden, config.bounds_padding)
                }
            };
            serde_json::to_string_pretty(&bounds)?
        }
    };

    Ok(output)
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let output = match run(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &output) {
                eprintln!("Failed to write {}: {}", path.display(), e);
                process::exit(1);
            }
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{}", output),
    }
}
