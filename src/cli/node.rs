//! Node, retainers and has-id commands

use anyhow::Result;
use console::style;
use serde::Serialize;

use heapscope::snapshot::{
    node_to_string, Comparator, Cursor, EdgeSortKey, HeapSnapshot, NodeField,
};

use super::{find_node, print_json, Format};

#[derive(Debug, Serialize)]
struct NodeInfo {
    id: u32,
    name: String,
    class_name: String,
    node_type: String,
    self_size: u32,
    retained_size: u32,
    dominator_id: u32,
    edges: Vec<EdgeRow>,
}

#[derive(Debug, Serialize)]
struct EdgeRow {
    edge: String,
    edge_type: String,
    node_id: u32,
    node_name: String,
    self_size: u32,
    retained_size: u32,
}

#[derive(Debug, Serialize)]
struct RetainerRow {
    retainer_id: u32,
    retainer_name: String,
    edge: String,
    edge_type: String,
    #[serde(skip)]
    label: String,
}

fn edge_comparator(sort: &str, desc: bool) -> Comparator<EdgeSortKey> {
    let ascending = !desc;
    match sort {
        "self" => Comparator::new(
            EdgeSortKey::Node(NodeField::SelfSize),
            ascending,
            EdgeSortKey::EdgeName,
            true,
        ),
        "retained" => Comparator::new(
            EdgeSortKey::Node(NodeField::RetainedSize),
            ascending,
            EdgeSortKey::EdgeName,
            true,
        ),
        "id" => Comparator::new(
            EdgeSortKey::Node(NodeField::Id),
            ascending,
            EdgeSortKey::EdgeName,
            true,
        ),
        _ => Comparator::new(
            EdgeSortKey::EdgeName,
            ascending,
            EdgeSortKey::Node(NodeField::Id),
            true,
        ),
    }
}

/// Run the node command
pub fn show(snapshot: &HeapSnapshot, id: u32, sort: &str, desc: bool, format: Format) -> Result<()> {
    let node = find_node(snapshot, id)?;

    let mut edges = Vec::new();
    let mut provider = snapshot.edges_provider(&node, None);
    provider.sort(&edge_comparator(sort, desc));
    provider.first();
    while provider.has_next() {
        let edge = provider.item();
        let target = edge.node();
        edges.push(EdgeRow {
            edge: edge.to_string(),
            edge_type: edge.edge_type().to_string(),
            node_id: target.id(),
            node_name: target.name().to_string(),
            self_size: target.self_size(),
            retained_size: target.retained_size(),
        });
        provider.next();
    }

    let info = NodeInfo {
        id: node.id(),
        name: node.name().to_string(),
        class_name: node.class_name().into_owned(),
        node_type: node.node_type().to_string(),
        self_size: node.self_size(),
        retained_size: node.retained_size(),
        dominator_id: node.dominator().id(),
        edges,
    };

    match format {
        Format::Json => print_json(&info),
        Format::Text => {
            println!(
                "\n{} {}\n",
                style(node_to_string(&node)).cyan().bold(),
                style(format!("({})", info.class_name)).dim()
            );
            println!("  Type:          {}", info.node_type);
            println!("  Self size:     {}", info.self_size);
            println!("  Retained size: {}", info.retained_size);
            println!("  Dominator:     @{}", info.dominator_id);
            println!();
            if info.edges.is_empty() {
                println!("  {}", style("No outgoing edges").dim());
            }
            for row in &info.edges {
                println!(
                    "  {:<32} {} {}@{} {}",
                    row.edge,
                    style("->").dim(),
                    row.node_name,
                    row.node_id,
                    style(format!("[{} / {}]", row.self_size, row.retained_size)).dim()
                );
            }
            Ok(())
        }
    }
}

/// Run the retainers command
pub fn retainers(snapshot: &HeapSnapshot, id: u32, format: Format) -> Result<()> {
    let node = find_node(snapshot, id)?;

    let mut rows = Vec::new();
    let mut iter = node.retainers();
    while iter.has_next() {
        let retainer = iter.item();
        rows.push(RetainerRow {
            retainer_id: retainer.node().id(),
            retainer_name: retainer.node().name().to_string(),
            edge: retainer.to_string(),
            edge_type: retainer.edge_type().to_string(),
            label: node_to_string(retainer.node()),
        });
        iter.next();
    }

    match format {
        Format::Json => print_json(&rows),
        Format::Text => {
            println!(
                "\n{} retainers of {}\n",
                style(rows.len()).cyan(),
                style(node_to_string(&node)).cyan()
            );
            for row in &rows {
                println!(
                    "  {}{} {}",
                    row.label,
                    row.edge,
                    style(format!("({})", row.edge_type)).dim()
                );
            }
            Ok(())
        }
    }
}

/// Run the has-id command
pub fn has_id(snapshot: &HeapSnapshot, id: u32, format: Format) -> Result<()> {
    let present = snapshot.has_id(id);
    match format {
        Format::Json => print_json(&serde_json::json!({ "id": id, "present": present })),
        Format::Text => {
            if present {
                println!("{} node @{} exists", style("[OK]").green(), id);
            } else {
                println!("{} no node @{}", style("[--]").dim(), id);
            }
            Ok(())
        }
    }
}
