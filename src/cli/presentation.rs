//! CLI presentation: text and json formatters for contexts and blocks.

use crate::block::Block;
use crate::context::Context;
use crate::error::CliError;
use crate::snapshot::Skipped;
use crate::value::{Scalar, Value};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;

const MAX_CELL: usize = 60;

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_CELL {
        return text;
    }
    let mut cut: String = text.chars().take(MAX_CELL - 3).collect();
    cut.push_str("...");
    cut
}

fn value_len(value: &Value) -> String {
    match value {
        Value::Array(a) => a.len().to_string(),
        Value::Sequence(items) => items.len().to_string(),
        Value::Context(c) => c.len().to_string(),
        _ => "-".to_string(),
    }
}

/// One row per item: name, label, kind, dtype, length and value
pub fn format_context_text(context: &dyn Context) -> Result<String, CliError> {
    let items = context.context_items();
    if items.is_empty() {
        return Ok("(empty context)".dimmed().to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Label", "Kind", "DType", "Len", "Value"]);
    for item in &items {
        let value = item.data(context)?;
        let dtype = value
            .dtype()
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            item.name().to_string(),
            item.display_label().to_string(),
            value.kind().to_string(),
            dtype,
            value_len(&value),
            truncate(value.to_string()),
        ]);
    }
    Ok(table.to_string())
}

fn scalar_json(scalar: &Scalar) -> serde_json::Value {
    match scalar {
        Scalar::Bool(b) => json!(b),
        Scalar::Int(i) => json!(i),
        // non-finite floats become null
        Scalar::Float(f) => serde_json::Value::from(*f),
        Scalar::Complex(c) => json!(c.to_string()),
        Scalar::Str(s) => json!(s),
    }
}

fn value_json(value: &Value) -> serde_json::Value {
    match value {
        Value::None => serde_json::Value::Null,
        Value::Scalar(s) => scalar_json(s),
        Value::Array(a) => serde_json::Value::Array(a.scalars().map(|s| scalar_json(&s)).collect()),
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(value_json).collect()),
        Value::Context(c) => {
            let mut object = serde_json::Map::new();
            for name in c.names() {
                if let Ok(nested) = c.get(&name) {
                    object.insert(name, value_json(&nested));
                }
            }
            serde_json::Value::Object(object)
        }
        Value::Function(_) | Value::Module(_) => json!(value.to_string()),
    }
}

pub fn format_context_json(context: &dyn Context) -> Result<String, CliError> {
    let mut entries = Vec::new();
    for item in context.context_items() {
        let value = item.data(context)?;
        entries.push(json!({
            "name": item.name(),
            "label": item.meta.label,
            "groups": item.meta.groups,
            "kind": value.kind(),
            "dtype": value.dtype().map(|d| d.to_string()),
            "value": value_json(&value),
        }));
    }
    serde_json::to_string_pretty(&json!({ "len": context.len(), "items": entries }))
        .map_err(|e| CliError::Render(e.to_string()))
}

/// Inputs and outputs of a block
pub fn format_block_summary(block: &Block) -> String {
    let join = |names: std::collections::BTreeSet<String>| {
        if names.is_empty() {
            "(none)".to_string()
        } else {
            names.into_iter().collect::<Vec<_>>().join(", ")
        }
    };
    format!(
        "{} {}\n{} {}\n{} {}",
        "statements:".bold(),
        block.statements().len(),
        "inputs:".bold(),
        join(block.inputs()),
        "outputs:".bold(),
        join(block.outputs()),
    )
}

pub fn format_skipped(skipped: &[Skipped]) -> String {
    skipped
        .iter()
        .map(|s| format!("{} {} ({})", "skipped".yellow(), s.name, s.kind))
        .collect::<Vec<_>>()
        .join("\n")
}
