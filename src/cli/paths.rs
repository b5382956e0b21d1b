//! Paths command - retaining paths via the resumable path finder

use anyhow::Result;
use console::style;
use serde::Serialize;
use tracing::debug;

use heapscope::snapshot::{
    node_to_string, HeapSnapshot, PathFinder, PathFinderOptions, PathSearch, RetainingPath,
};

use super::{find_node, print_json, Format};

#[derive(Debug, Serialize)]
struct PathsReport {
    id: u32,
    paths: Vec<RetainingPath>,
    exhausted: bool,
}

/// Drive the finder until `max` paths are found or the search is exhausted.
fn collect_paths(finder: &mut PathFinder<'_>, max: usize) -> (Vec<RetainingPath>, bool) {
    let mut paths = Vec::new();
    let mut suspensions = 0usize;
    while paths.len() < max {
        match finder.find_next() {
            PathSearch::Found(path) => paths.push(path),
            PathSearch::Suspended => {
                suspensions += 1;
                debug!(
                    "Path search suspended ({} so far, depth {})",
                    suspensions,
                    finder.max_length()
                );
            }
            PathSearch::Exhausted => return (paths, true),
        }
    }
    (paths, false)
}

/// Run the paths command
pub fn run(
    snapshot: &HeapSnapshot,
    id: u32,
    max: usize,
    options: PathFinderOptions,
    format: Format,
) -> Result<()> {
    let node = find_node(snapshot, id)?;
    let mut finder = PathFinder::new(snapshot, &node, options);
    let (paths, exhausted) = collect_paths(&mut finder, max);

    match format {
        Format::Json => print_json(&PathsReport {
            id,
            paths,
            exhausted,
        }),
        Format::Text => {
            println!(
                "\nRetaining paths of {}\n",
                style(node_to_string(&node)).cyan()
            );
            if paths.is_empty() {
                println!("  {}", style("No retaining path found").dim());
            }
            for path in &paths {
                println!("  {:>3}  {}", style(path.len).dim(), path.path);
            }
            Ok(())
        }
    }
}
