//! JSON snapshot loading
//!
//! The document's `nodes` array starts with the schema object and continues
//! with plain integers. It is read with a streaming visitor straight into a
//! `Vec<u32>`; slot 0 keeps a placeholder for the schema so that node offsets
//! written by the profiler index the buffer unchanged.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Instant;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::info;

use super::error::SnapshotResult;
use super::meta::SnapshotMeta;
use super::RawSnapshot;

#[derive(Deserialize)]
struct Document {
    nodes: NodesArray,
    #[serde(default)]
    strings: Vec<String>,
}

struct NodesArray {
    meta: SnapshotMeta,
    values: Vec<u32>,
}

impl<'de> Deserialize<'de> for NodesArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(NodesVisitor)
    }
}

struct NodesVisitor;

impl<'de> Visitor<'de> for NodesVisitor {
    type Value = NodesArray;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a schema object followed by unsigned integers")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<NodesArray, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let meta: SnapshotMeta = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;

        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0) + 1);
        values.push(0);
        while let Some(value) = seq.next_element::<u32>()? {
            values.push(value);
        }
        Ok(NodesArray { meta, values })
    }
}

impl Document {
    fn into_raw(self) -> RawSnapshot {
        RawSnapshot {
            meta: self.nodes.meta,
            nodes: self.nodes.values,
            strings: self.strings,
        }
    }
}

impl RawSnapshot {
    pub fn from_json_str(json: &str) -> SnapshotResult<Self> {
        let document: Document = serde_json::from_str(json)?;
        Ok(document.into_raw())
    }

    pub fn from_reader<R: Read>(reader: R) -> SnapshotResult<Self> {
        let document: Document = serde_json::from_reader(BufReader::new(reader))?;
        Ok(document.into_raw())
    }

    pub fn from_path(path: &Path) -> SnapshotResult<Self> {
        let started = Instant::now();
        let file = File::open(path)?;
        let raw = Self::from_reader(file)?;
        info!(
            "Loaded {}: {} buffer values, {} strings in {:?}",
            path.display(),
            raw.nodes.len(),
            raw.strings.len(),
            started.elapsed()
        );
        Ok(raw)
    }
}
