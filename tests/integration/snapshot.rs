//! Integration tests for snapshots of leaves, pipelines and block results

use numctx::block::Block;
use numctx::config::SnapshotConfig;
use numctx::context::{Context, ContextRef, NumericContext};
use numctx::error::SnapshotError;
use numctx::filter::NaNFilter;
use numctx::item::ContextItem;
use numctx::pipeline::Pipeline;
use numctx::snapshot::{self, Snapshot};
use numctx::value::Value;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn block_results_survive_a_file_round_trip() {
    let leaf: ContextRef = Arc::new(NumericContext::new());
    Block::from_source("import numpy as np\nx = np.linspace(0, 1, 5)\nn = len(x)\nname = 'sweep'")
        .unwrap()
        .execute(leaf.as_ref())
        .unwrap();
    leaf.define_item(ContextItem::new("x").with_label("Position").with_group("axes"))
        .unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sweep.nctx");
    let snap = snapshot::snapshot(leaf.as_ref()).unwrap();
    assert_eq!(snap.skipped().len(), 1);
    assert_eq!(snap.skipped()[0].name, "np");
    snap.save(&path).unwrap();

    let restored = snapshot::load(&path).unwrap();
    assert_eq!(restored.names(), vec!["x", "n", "name"]);
    assert_eq!(restored.get("x").unwrap(), leaf.get("x").unwrap());
    assert_eq!(restored.get("n").unwrap(), Value::from(5i64));
    assert_eq!(restored.item("x").unwrap().display_label(), "Position");
}

#[test]
fn snapshot_of_a_view_stores_visible_rows() {
    let leaf: ContextRef = Arc::new(NumericContext::new());
    leaf.set("t", Value::from(vec![1.0, f64::NAN, 3.0])).unwrap();
    let pipeline = Pipeline::new(leaf).reduce(Arc::new(NaNFilter::new()));

    let restored = snapshot::snapshot(pipeline.output().as_ref())
        .unwrap()
        .restore()
        .unwrap();
    assert_eq!(restored.get("t").unwrap(), Value::from(vec![1.0, 3.0]));
    assert_eq!(restored.len(), 2);
}

#[test]
fn strict_mode_refuses_unstorable_values() {
    let leaf = NumericContext::new();
    Block::from_source("from numpy import sqrt\nx = sqrt(4.0)")
        .unwrap()
        .execute(&leaf)
        .unwrap();
    let result = snapshot::snapshot_with(&leaf, &SnapshotConfig { strict: true });
    assert!(matches!(result, Err(SnapshotError::Encode(_))));
}

#[test]
fn truncated_bytes_fail_to_decode() {
    let leaf = NumericContext::new();
    leaf.set("a", Value::from(vec![1i64, 2, 3])).unwrap();
    let bytes = snapshot::snapshot(&leaf).unwrap().into_bytes();
    let truncated = Snapshot::from_bytes(bytes[..bytes.len() / 2].to_vec());
    assert!(matches!(truncated.restore(), Err(SnapshotError::Decode(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        snapshot::load(&dir.path().join("absent.nctx")),
        Err(SnapshotError::Io(_))
    ));
}
