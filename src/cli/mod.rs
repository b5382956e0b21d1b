//! CLI command definitions and handlers

mod classes;
mod node;
mod paths;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use heapscope::config::HeapscopeConfig;
use heapscope::snapshot::{HeapSnapshot, Node, RawSnapshot};

/// Heapscope - query heap snapshots from the command line
#[derive(Parser, Debug)]
#[command(name = "heapscope")]
#[command(
    version,
    about = "Query heap snapshots: class histograms, retainers, and retaining paths",
    after_help = "\
Examples:
  heapscope heap.json summary                  Counts, total size, top classes
  heapscope heap.json classes --sort self      Class histogram by self size
  heapscope heap.json node 42 --sort retained  A node and its outgoing edges
  heapscope heap.json retainers 42             Who points at node 42
  heapscope heap.json paths 42 --max 5         Why node 42 is still alive
  heapscope heap.json --format json summary    JSON output for scripting"
)]
pub struct Cli {
    /// Heap snapshot file (JSON)
    pub snapshot: PathBuf,

    /// Output format: text or json (default from config, else text)
    #[arg(long, short = 'f', global = true, value_parser = ["text", "json"])]
    pub format: Option<String>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Config file to use instead of ./heapscope.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Node and edge counts, total size, and the largest classes
    Summary,

    /// Class histogram
    Classes {
        /// Sort key: count, self, retained
        #[arg(long, default_value = "retained", value_parser = ["count", "self", "retained"])]
        sort: String,

        /// Number of classes to show (default from config, else 20; 0 = all)
        #[arg(long)]
        top: Option<usize>,

        /// Also list member node ids, ordered by id
        #[arg(long)]
        members: bool,
    },

    /// Show a node and its outgoing edges
    Node {
        /// Node id
        id: u32,

        /// Edge order: name, self, retained, id
        #[arg(long, default_value = "name", value_parser = ["name", "self", "retained", "id"])]
        sort: String,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },

    /// List the edges retaining a node
    Retainers {
        /// Node id
        id: u32,
    },

    /// Find retaining paths from a root child down to a node
    Paths {
        /// Node id
        id: u32,

        /// Maximum number of paths (default from config, else 10)
        #[arg(long)]
        max: Option<usize>,

        /// Walk through hidden edges and nodes
        #[arg(long)]
        show_hidden: bool,
    },

    /// Check whether a node id exists
    HasId {
        /// Node id
        id: u32,
    },
}

/// Output mode shared by all commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    Text,
    Json,
}

impl Format {
    fn parse(value: &str) -> Self {
        match value {
            "json" => Format::Json,
            _ => Format::Text,
        }
    }
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = HeapscopeConfig::load(cli.config.as_deref(), &cwd);
    let format = Format::parse(cli.format.as_deref().unwrap_or(config.format()));

    let snapshot = load_snapshot(&cli.snapshot)?;

    match cli.command {
        Commands::Summary => classes::summary(&snapshot, &cli.snapshot, config.top(), format),
        Commands::Classes { sort, top, members } => {
            classes::run(&snapshot, &sort, top.unwrap_or(config.top()), members, format)
        }
        Commands::Node { id, sort, desc } => node::show(&snapshot, id, &sort, desc, format),
        Commands::Retainers { id } => node::retainers(&snapshot, id, format),
        Commands::Paths {
            id,
            max,
            show_hidden,
        } => {
            let mut options = config.path_finder_options();
            options.show_hidden |= show_hidden;
            paths::run(
                &snapshot,
                id,
                max.unwrap_or(config.max_paths()),
                options,
                format,
            )
        }
        Commands::HasId { id } => node::has_id(&snapshot, id, format),
    }
}

fn load_snapshot(path: &Path) -> Result<HeapSnapshot> {
    let raw = RawSnapshot::from_path(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    HeapSnapshot::new(raw).with_context(|| format!("Invalid snapshot {}", path.display()))
}

fn find_node(snapshot: &HeapSnapshot, id: u32) -> Result<Node<'_>> {
    snapshot
        .node_by_id(id)
        .with_context(|| format!("No node with id {}", id))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths_command() {
        let cli = Cli::try_parse_from([
            "heapscope",
            "heap.json",
            "paths",
            "42",
            "--max",
            "3",
            "--show-hidden",
        ])
        .unwrap();
        assert_eq!(cli.snapshot, PathBuf::from("heap.json"));
        match cli.command {
            Commands::Paths {
                id,
                max,
                show_hidden,
            } => {
                assert_eq!(id, 42);
                assert_eq!(max, Some(3));
                assert!(show_hidden);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["heapscope", "heap.json", "summary", "--format", "json"]).unwrap();
        assert_eq!(cli.format.as_deref(), Some("json"));
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_rejects_unknown_sort_key() {
        let result =
            Cli::try_parse_from(["heapscope", "heap.json", "classes", "--sort", "weight"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("json"), Format::Json);
        assert_eq!(Format::parse("text"), Format::Text);
        assert_eq!(Format::parse("yaml"), Format::Text);
    }
}
