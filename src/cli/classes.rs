//! Summary and classes commands - class histogram output

use anyhow::Result;
use console::style;
use serde::Serialize;
use std::path::Path;

use heapscope::snapshot::{Aggregate, HeapSnapshot};

use super::{print_json, Format};

#[derive(Debug, Serialize)]
struct ClassRow<'a> {
    class: &'a str,
    #[serde(flatten)]
    aggregate: &'a Aggregate,
    #[serde(skip_serializing_if = "Option::is_none")]
    member_ids: Option<Vec<u32>>,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    snapshot: String,
    nodes: usize,
    edges: usize,
    total_size: u32,
    classes: Vec<ClassRow<'a>>,
}

/// Classes ordered by `sort` (descending), ties broken by class name.
fn sorted_classes<'a>(snapshot: &'a HeapSnapshot, sort: &str, with_members: bool) -> Vec<ClassRow<'a>> {
    let aggregates = snapshot.aggregates(with_members);
    let mut rows: Vec<ClassRow<'a>> = aggregates
        .iter()
        .map(|(class, aggregate)| ClassRow {
            class: class.as_str(),
            aggregate,
            member_ids: None,
        })
        .collect();

    rows.sort_by(|a, b| {
        let key = |row: &ClassRow<'_>| match sort {
            "count" => row.aggregate.count as u64,
            "self" => row.aggregate.self_size,
            _ => row.aggregate.max_retained as u64,
        };
        key(b).cmp(&key(a)).then_with(|| a.class.cmp(b.class))
    });

    if with_members {
        for row in &mut rows {
            row.member_ids = row.aggregate.node_offsets().map(|offsets| {
                offsets
                    .iter()
                    .map(|&offset| snapshot.node_at(offset).id())
                    .collect()
            });
        }
    }
    rows
}

fn truncate<T>(rows: &mut Vec<T>, top: usize) {
    if top > 0 {
        rows.truncate(top);
    }
}

fn print_table(rows: &[ClassRow<'_>]) {
    println!(
        "  {:<40} {:>10} {:>14} {:>14}",
        style("Class").bold(),
        style("Count").bold(),
        style("Self size").bold(),
        style("Max retained").bold()
    );
    for row in rows {
        println!(
            "  {:<40} {:>10} {:>14} {:>14}",
            style(row.class).cyan(),
            row.aggregate.count,
            row.aggregate.self_size,
            row.aggregate.max_retained
        );
        if let Some(ids) = &row.member_ids {
            let ids: Vec<String> = ids.iter().map(|id| format!("@{}", id)).collect();
            println!("      {}", style(ids.join(" ")).dim());
        }
    }
}

/// Run the summary command
pub fn summary(snapshot: &HeapSnapshot, path: &Path, top: usize, format: Format) -> Result<()> {
    let mut classes = sorted_classes(snapshot, "retained", false);
    truncate(&mut classes, top);

    match format {
        Format::Json => print_json(&Summary {
            snapshot: path.display().to_string(),
            nodes: snapshot.node_count(),
            edges: snapshot.edge_count(),
            total_size: snapshot.total_size(),
            classes,
        }),
        Format::Text => {
            println!("\nHeap snapshot {}\n", style(path.display()).cyan());
            println!("  Nodes:      {}", style(snapshot.node_count()).cyan());
            println!("  Edges:      {}", style(snapshot.edge_count()).cyan());
            println!("  Total size: {}", style(snapshot.total_size()).cyan());
            println!();
            print_table(&classes);
            Ok(())
        }
    }
}

/// Run the classes command
pub fn run(
    snapshot: &HeapSnapshot,
    sort: &str,
    top: usize,
    members: bool,
    format: Format,
) -> Result<()> {
    let mut classes = sorted_classes(snapshot, sort, members);
    truncate(&mut classes, top);

    match format {
        Format::Json => print_json(&classes),
        Format::Text => {
            print_table(&classes);
            Ok(())
        }
    }
}
