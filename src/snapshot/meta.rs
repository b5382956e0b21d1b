//! Snapshot schema and the field layout resolved from it
//!
//! The first record of every snapshot describes how the rest of the buffer is
//! laid out: the ordered field names of a node record, the ordered field names
//! of an edge record (nested under the node's `children` field), and the type
//! vocabularies used by both `type` fields. [`Layout::resolve`] turns that
//! description into fixed offsets once, so views can read fields by plain
//! index arithmetic.

use serde::{Deserialize, Serialize};

use super::error::{SnapshotError, SnapshotResult};

/// Offset of the synthetic schema record in the buffer.
pub const META_NODE_OFFSET: u32 = 0;

/// Offset of the root node. The root immediately follows the schema slot.
pub const ROOT_NODE_OFFSET: u32 = 1;

/// Name of the edge type appended to the vocabulary at load time.
pub const INVISIBLE_EDGE_TYPE: &str = "invisible";

/// Record schema: ordered field names plus per-field type descriptions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub fields: Vec<String>,
    #[serde(default)]
    pub types: Vec<FieldType>,
}

/// Type description of a single schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldType {
    /// Symbolic vocabulary; the stored integer indexes into it
    Enum(Vec<String>),
    /// Scalar kind such as `"string"`, `"number"` or `"node"`
    Scalar(String),
    /// Nested record layout (edges, under the node's `children` field)
    Record(SnapshotMeta),
}

pub(crate) const NODE_TYPES: [&str; 9] = [
    "hidden", "array", "string", "object", "code", "closure", "regexp", "number", "native",
];

pub(crate) const EDGE_TYPES: [&str; 6] = [
    "context", "element", "property", "internal", "hidden", "shortcut",
];

impl SnapshotMeta {
    /// The schema written by the profiler for this snapshot format.
    pub fn standard() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let scalar = |s: &str| FieldType::Scalar(s.to_string());

        let edges = SnapshotMeta {
            fields: names(&["type", "name_or_index", "to_node"]),
            types: vec![
                FieldType::Enum(names(&EDGE_TYPES)),
                scalar("string_or_number"),
                scalar("node"),
            ],
        };

        SnapshotMeta {
            fields: names(&[
                "type",
                "name",
                "id",
                "self_size",
                "retained_size",
                "dominator",
                "children_count",
                "children",
            ]),
            types: vec![
                FieldType::Enum(names(&NODE_TYPES)),
                scalar("string"),
                scalar("number"),
                scalar("number"),
                scalar("number"),
                scalar("number"),
                scalar("number"),
                FieldType::Record(edges),
            ],
        }
    }
}

/// Field offsets and type codes resolved from a [`SnapshotMeta`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub(crate) node_type_offset: u32,
    pub(crate) node_name_offset: u32,
    pub(crate) node_id_offset: u32,
    pub(crate) node_instances_count_offset: u32,
    pub(crate) node_self_size_offset: u32,
    pub(crate) node_retained_size_offset: u32,
    pub(crate) dominator_offset: u32,
    pub(crate) edges_count_offset: u32,
    pub(crate) first_edge_offset: u32,

    pub(crate) node_types: Vec<String>,
    pub(crate) node_hidden_type: Option<u32>,

    pub(crate) edge_fields_count: u32,
    pub(crate) edge_type_offset: u32,
    pub(crate) edge_name_offset: u32,
    pub(crate) edge_to_node_offset: u32,

    pub(crate) edge_types: Vec<String>,
    pub(crate) edge_element_type: Option<u32>,
    pub(crate) edge_hidden_type: Option<u32>,
    pub(crate) edge_internal_type: Option<u32>,
    pub(crate) edge_shortcut_type: Option<u32>,
    pub(crate) edge_invisible_type: u32,
}

impl Layout {
    /// Resolve offsets and type codes. Any missing field is fatal.
    pub fn resolve(meta: &SnapshotMeta) -> SnapshotResult<Self> {
        let node_type_offset = field_offset(&meta.fields, "node", "type")?;
        let node_name_offset = field_offset(&meta.fields, "node", "name")?;
        let node_id_offset = field_offset(&meta.fields, "node", "id")?;
        let node_self_size_offset = field_offset(&meta.fields, "node", "self_size")?;
        let node_retained_size_offset = field_offset(&meta.fields, "node", "retained_size")?;
        let dominator_offset = field_offset(&meta.fields, "node", "dominator")?;
        let edges_count_offset = field_offset(&meta.fields, "node", "children_count")?;
        let first_edge_offset = field_offset(&meta.fields, "node", "children")?;

        let node_types = match meta.types.get(node_type_offset as usize) {
            Some(FieldType::Enum(types)) => types.clone(),
            _ => {
                return Err(SnapshotError::MissingTypes {
                    record: "node",
                    field: "type",
                })
            }
        };
        let node_hidden_type = type_code(&node_types, "hidden");

        let edges_meta = match meta.types.get(first_edge_offset as usize) {
            Some(FieldType::Record(edges)) => edges,
            _ => return Err(SnapshotError::MissingEdgeSchema),
        };
        let edge_fields_count = edges_meta.fields.len() as u32;
        let edge_type_offset = field_offset(&edges_meta.fields, "edge", "type")?;
        let edge_name_offset = field_offset(&edges_meta.fields, "edge", "name_or_index")?;
        let edge_to_node_offset = field_offset(&edges_meta.fields, "edge", "to_node")?;

        let mut edge_types = match edges_meta.types.get(edge_type_offset as usize) {
            Some(FieldType::Enum(types)) => types.clone(),
            _ => {
                return Err(SnapshotError::MissingTypes {
                    record: "edge",
                    field: "type",
                })
            }
        };
        let edge_element_type = type_code(&edge_types, "element");
        let edge_hidden_type = type_code(&edge_types, "hidden");
        let edge_internal_type = type_code(&edge_types, "internal");
        let edge_shortcut_type = type_code(&edge_types, "shortcut");
        let edge_invisible_type = edge_types.len() as u32;
        edge_types.push(INVISIBLE_EDGE_TYPE.to_string());

        Ok(Self {
            node_type_offset,
            node_name_offset,
            node_id_offset,
            // Aliases the id slot; kept as the profiler format defines it.
            node_instances_count_offset: node_id_offset,
            node_self_size_offset,
            node_retained_size_offset,
            dominator_offset,
            edges_count_offset,
            first_edge_offset,
            node_types,
            node_hidden_type,
            edge_fields_count,
            edge_type_offset,
            edge_name_offset,
            edge_to_node_offset,
            edge_types,
            edge_element_type,
            edge_hidden_type,
            edge_internal_type,
            edge_shortcut_type,
            edge_invisible_type,
        })
    }

    /// Symbolic node type vocabulary
    pub fn node_types(&self) -> &[String] {
        &self.node_types
    }

    /// Symbolic edge type vocabulary, including the synthesized `invisible`
    pub fn edge_types(&self) -> &[String] {
        &self.edge_types
    }

    /// Number of fields in one edge record
    pub fn edge_fields_count(&self) -> u32 {
        self.edge_fields_count
    }

    /// Size of a node header, i.e. the offset of its first edge
    pub fn node_header_len(&self) -> u32 {
        self.first_edge_offset
    }

    pub fn node_type_code(&self, name: &str) -> Option<u32> {
        type_code(&self.node_types, name)
    }

    pub fn edge_type_code(&self, name: &str) -> Option<u32> {
        type_code(&self.edge_types, name)
    }
}

fn field_offset(fields: &[String], record: &'static str, field: &'static str) -> SnapshotResult<u32> {
    fields
        .iter()
        .position(|f| f == field)
        .map(|pos| pos as u32)
        .ok_or(SnapshotError::MissingField { record, field })
}

fn type_code(types: &[String], name: &str) -> Option<u32> {
    types.iter().position(|t| t == name).map(|pos| pos as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout() {
        let layout = Layout::resolve(&SnapshotMeta::standard()).unwrap();

        assert_eq!(layout.node_type_offset, 0);
        assert_eq!(layout.node_name_offset, 1);
        assert_eq!(layout.node_id_offset, 2);
        assert_eq!(layout.first_edge_offset, 7);
        assert_eq!(layout.node_header_len(), 7);
        assert_eq!(layout.edge_fields_count(), 3);
        assert_eq!(layout.edge_to_node_offset, 2);
        assert_eq!(layout.node_hidden_type, Some(0));
        assert_eq!(layout.edge_shortcut_type, Some(5));
    }

    #[test]
    fn test_invisible_type_is_appended() {
        let layout = Layout::resolve(&SnapshotMeta::standard()).unwrap();

        assert_eq!(layout.edge_invisible_type, 6);
        assert_eq!(layout.edge_types().len(), 7);
        assert_eq!(layout.edge_types()[6], "invisible");
        assert_eq!(layout.edge_type_code("invisible"), Some(6));
    }

    #[test]
    fn test_instances_count_aliases_id() {
        let layout = Layout::resolve(&SnapshotMeta::standard()).unwrap();
        assert_eq!(layout.node_instances_count_offset, layout.node_id_offset);
    }

    #[test]
    fn test_missing_node_field_is_fatal() {
        let mut meta = SnapshotMeta::standard();
        meta.fields.retain(|f| f != "retained_size");

        let err = Layout::resolve(&meta).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::MissingField {
                record: "node",
                field: "retained_size"
            }
        ));
    }

    #[test]
    fn test_missing_edge_field_is_fatal() {
        let mut meta = SnapshotMeta::standard();
        if let Some(FieldType::Record(edges)) = meta.types.last_mut() {
            edges.fields[2] = "target".to_string();
        }

        let err = Layout::resolve(&meta).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::MissingField {
                record: "edge",
                field: "to_node"
            }
        ));
    }

    #[test]
    fn test_missing_edge_schema() {
        let mut meta = SnapshotMeta::standard();
        meta.types.pop();

        let err = Layout::resolve(&meta).unwrap_err();
        assert!(matches!(err, SnapshotError::MissingEdgeSchema));
    }

    #[test]
    fn test_schema_parses_from_json() {
        let json = r#"{
            "fields": ["type", "name", "id", "self_size", "retained_size", "dominator", "children_count", "children"],
            "types": [
                ["hidden", "array", "string", "object", "code", "closure", "regexp", "number", "native"],
                "string", "number", "number", "number", "number", "number",
                {
                    "fields": ["type", "name_or_index", "to_node"],
                    "types": [["context", "element", "property", "internal", "hidden", "shortcut"], "string_or_number", "node"]
                }
            ]
        }"#;

        let meta: SnapshotMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta, SnapshotMeta::standard());
    }
}
