//! Best-effort snapshots of a context
//!
//! A snapshot walks a context's items and records each name with its value
//! and presentation metadata. Values that cannot be persisted (builtin
//! functions and modules) are skipped and reported in
//! [`Snapshot::skipped`]. Restoring always produces a fresh leaf context;
//! pipeline stages are never persisted.

use crate::config::SnapshotConfig;
use crate::context::{Context, NumericContext};
use crate::error::SnapshotError;
use crate::item::{ContextItem, ItemMeta};
use crate::value::{Array, Scalar, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum StoredValue {
    None,
    Scalar(Scalar),
    Array(Array),
    Sequence(Vec<StoredValue>),
    Context(Vec<StoredEntry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredEntry {
    name: String,
    value: StoredValue,
    meta: ItemMeta,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    entries: Vec<StoredEntry>,
}

/// An entry left out of a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Dotted path of the entry
    pub name: String,
    /// Kind of the value that could not be stored
    pub kind: &'static str,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    bytes: Vec<u8>,
    skipped: Vec<Skipped>,
}

impl Snapshot {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            skipped: Vec::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn skipped(&self) -> &[Skipped] {
        &self.skipped
    }

    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Restore into a fresh leaf
    pub fn restore(&self) -> Result<Arc<NumericContext>, SnapshotError> {
        restore(&self.bytes)
    }
}

/// Snapshot `context` with the default settings
pub fn snapshot(context: &dyn Context) -> Result<Snapshot, SnapshotError> {
    snapshot_with(context, &SnapshotConfig::default())
}

pub fn snapshot_with(
    context: &dyn Context,
    config: &SnapshotConfig,
) -> Result<Snapshot, SnapshotError> {
    let mut skipped = Vec::new();
    let entries = store_items(context, "", &mut skipped)?;
    if config.strict {
        if let Some(first) = skipped.first() {
            return Err(SnapshotError::Encode(format!(
                "'{}' holds a {} which cannot be stored",
                first.name, first.kind
            )));
        }
    }
    let file = SnapshotFile {
        version: FORMAT_VERSION,
        entries,
    };
    let bytes = bincode::serialize(&file)
        .map_err(|e| SnapshotError::Encode(format!("Failed to serialize snapshot: {}", e)))?;
    debug!(
        entries = file.entries.len(),
        skipped = skipped.len(),
        bytes = bytes.len(),
        "snapshot encoded"
    );
    Ok(Snapshot { bytes, skipped })
}

fn store_items(
    context: &dyn Context,
    prefix: &str,
    skipped: &mut Vec<Skipped>,
) -> Result<Vec<StoredEntry>, SnapshotError> {
    let mut entries = Vec::new();
    for item in context.context_items() {
        let path = format!("{}{}", prefix, item.name());
        let value = item.data(context)?;
        match store_value(&value, &path, skipped)? {
            Some(value) => entries.push(StoredEntry {
                name: item.name().to_string(),
                value,
                meta: item.meta.clone(),
            }),
            None => {
                debug!(name = %path, kind = value.kind(), "skipping entry that cannot be stored");
                skipped.push(Skipped {
                    name: path,
                    kind: value.kind(),
                });
            }
        }
    }
    Ok(entries)
}

fn store_value(
    value: &Value,
    path: &str,
    skipped: &mut Vec<Skipped>,
) -> Result<Option<StoredValue>, SnapshotError> {
    Ok(match value {
        Value::None => Some(StoredValue::None),
        Value::Scalar(s) => Some(StoredValue::Scalar(s.clone())),
        Value::Array(a) => Some(StoredValue::Array(a.as_ref().clone())),
        Value::Sequence(items) => {
            let mut stored = Vec::with_capacity(items.len());
            for item in items {
                // a sequence is stored whole or not at all
                let mut nested = Vec::new();
                match store_value(item, path, &mut nested)? {
                    Some(value) if nested.is_empty() => stored.push(value),
                    _ => return Ok(None),
                }
            }
            Some(StoredValue::Sequence(stored))
        }
        Value::Context(nested) => Some(StoredValue::Context(store_items(
            nested.as_ref(),
            &format!("{}.", path),
            skipped,
        )?)),
        Value::Function(_) | Value::Module(_) => None,
    })
}

/// Decode `bytes` into a fresh leaf
pub fn restore(bytes: &[u8]) -> Result<Arc<NumericContext>, SnapshotError> {
    let leaf = Arc::new(NumericContext::new());
    restore_into(bytes, leaf.as_ref())?;
    Ok(leaf)
}

/// Decode `bytes` into an existing context with one coalesced event
pub fn restore_into(bytes: &[u8], context: &dyn Context) -> Result<(), SnapshotError> {
    let file: SnapshotFile = bincode::deserialize(bytes)
        .map_err(|e| SnapshotError::Decode(format!("Failed to deserialize snapshot: {}", e)))?;
    if file.version != FORMAT_VERSION {
        return Err(SnapshotError::Version {
            expected: FORMAT_VERSION,
            found: file.version,
        });
    }
    populate(context, file.entries)
}

fn populate(context: &dyn Context, entries: Vec<StoredEntry>) -> Result<(), SnapshotError> {
    let _deferred = context.events().deferring();
    let mut metas = Vec::with_capacity(entries.len());
    let mut values = Vec::with_capacity(entries.len());
    for entry in entries {
        values.push((entry.name.clone(), load_value(entry.value)?));
        metas.push((entry.name, entry.meta));
    }
    context.update(values)?;
    for (name, meta) in metas {
        context.define_item(ContextItem::new(name).with_meta(meta))?;
    }
    Ok(())
}

fn load_value(value: StoredValue) -> Result<Value, SnapshotError> {
    Ok(match value {
        StoredValue::None => Value::None,
        StoredValue::Scalar(s) => Value::Scalar(s),
        StoredValue::Array(a) => Value::array(a),
        StoredValue::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(load_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        StoredValue::Context(entries) => {
            let nested = Arc::new(NumericContext::new());
            populate(nested.as_ref(), entries)?;
            Value::Context(nested)
        }
    })
}

/// Read a snapshot file into a fresh leaf
pub fn load(path: &Path) -> Result<Arc<NumericContext>, SnapshotError> {
    let bytes = std::fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "snapshot read");
    restore(&bytes)
}
