//! Integration tests for multi-stage pipelines

use crate::integration::test_utils::record_events;
use numctx::block::Block;
use numctx::context::{Context, ContextRef, NumericContext};
use numctx::error::ContextError;
use numctx::event::ContextModified;
use numctx::filter::{
    AggregateFilter, AggregateRule, ExpressionFilter, Filter, IndexFilter, NaNFilter, SortFilter,
    SortMode,
};
use numctx::pipeline::{
    CachedContext, ExtensionContext, Pipeline, ReductionContext, SelectionContext,
};
use numctx::item::ContextItem;
use numctx::value::{Scalar, Value};
use std::sync::Arc;

fn leaf() -> ContextRef {
    let leaf: ContextRef = Arc::new(NumericContext::new());
    leaf.set("t", Value::from(vec![4.0, f64::NAN, 2.0, 3.0, 1.0]))
        .unwrap();
    leaf.set("id", Value::from(vec![0i64, 1, 2, 3, 4])).unwrap();
    leaf
}

#[test]
fn reduce_then_sort_exposes_ordered_finite_rows() {
    let leaf = leaf();
    let sort = Arc::new(SortFilter::new("t", SortMode::Asc).unwrap());
    let pipeline = Pipeline::new(leaf.clone())
        .reduce(Arc::new(NaNFilter::new()))
        .sort(sort.clone());
    let view = pipeline.output();

    assert_eq!(view.names(), leaf.names());
    assert_eq!(view.len(), 4);
    assert_eq!(view.get("id").unwrap(), Value::from(vec![4i64, 2, 3, 0]));

    let seen = record_events(&view);
    sort.set_mode(SortMode::Desc);
    assert_eq!(view.get("id").unwrap(), Value::from(vec![0i64, 3, 2, 4]));
    assert_eq!(*seen.lock(), vec![ContextModified::reset()]);
}

#[test]
fn writes_through_a_reduction_land_in_the_leaf() {
    let leaf = leaf();
    let view = ReductionContext::new(leaf.clone(), Arc::new(NaNFilter::new()));
    view.set("id", Value::from(vec![10i64, 12, 13, 14])).unwrap();
    assert_eq!(
        leaf.get("id").unwrap(),
        Value::from(vec![10i64, 1, 12, 13, 14])
    );
}

#[test]
fn new_names_written_through_a_reduction_take_the_item_sentinel() {
    let leaf = leaf();
    leaf.define_item(ContextItem::new("score").with_sentinel(Scalar::Float(-1.0)))
        .unwrap();
    let view = ReductionContext::new(leaf.clone(), Arc::new(NaNFilter::new()));
    view.set("score", Value::from(vec![0.5, 0.25, 0.75, 1.0])).unwrap();
    assert_eq!(
        leaf.get("score").unwrap(),
        Value::from(vec![0.5, -1.0, 0.25, 0.75, 1.0])
    );
}

#[test]
fn upstream_changes_reach_the_end_of_the_chain() {
    let leaf = leaf();
    let pipeline = Pipeline::new(leaf.clone())
        .reduce(Arc::new(IndexFilter::new(vec![0, 2])))
        .cached()
        .terminate();
    let view = pipeline.output();
    let seen = record_events(&view);

    assert_eq!(view.get("id").unwrap(), Value::from(vec![0i64, 2]));
    leaf.set("id", Value::from(vec![5i64, 6, 7, 8, 9])).unwrap();
    assert_eq!(view.get("id").unwrap(), Value::from(vec![5i64, 7]));
    assert_eq!(*seen.lock(), vec![ContextModified::modified("id")]);
}

#[test]
fn failing_filter_exposes_everything() {
    let leaf = leaf();
    let view = ReductionContext::new(
        leaf.clone(),
        Arc::new(ExpressionFilter::new("missing > 0").unwrap()),
    );
    assert_eq!(view.len(), 5);
    assert_eq!(view.get("id").unwrap(), leaf.get("id").unwrap());
}

#[test]
fn disabled_filter_exposes_everything_until_enabled() {
    let leaf = leaf();
    let filter = Arc::new(IndexFilter::new(vec![1]));
    filter.set_enabled(false);
    let view = ReductionContext::new(leaf, filter.clone());
    assert_eq!(view.len(), 5);

    let seen = record_events(&(view.clone() as ContextRef));
    filter.set_enabled(true);
    assert_eq!(view.len(), 1);
    assert_eq!(*seen.lock(), vec![ContextModified::reset()]);
}

#[test]
fn aggregate_filter_drives_a_view() {
    let leaf = leaf();
    let low: Arc<dyn Filter> = Arc::new(ExpressionFilter::new("id < 2").unwrap());
    let high = Arc::new(ExpressionFilter::new("id > 3").unwrap());
    let any = AggregateFilter::new(AggregateRule::Any, vec![low, high.clone() as Arc<dyn Filter>]);
    let view = ReductionContext::new(leaf, any.clone());
    assert_eq!(view.get("id").unwrap(), Value::from(vec![0i64, 1, 4]));

    high.set_source("id > 2").unwrap();
    assert_eq!(view.get("id").unwrap(), Value::from(vec![0i64, 1, 3, 4]));

    any.set_rule(AggregateRule::All);
    assert_eq!(view.len(), 0);
}

#[test]
fn selection_masks_stack_over_a_filtered_base() {
    let leaf = leaf();
    let selection = SelectionContext::with_filter(
        leaf,
        Arc::new(ExpressionFilter::new("id >= 1").unwrap()),
    );
    assert_eq!(selection.len(), 4);
    selection.push_mask(&[true, false, true, false]).unwrap();
    assert_eq!(selection.get("id").unwrap(), Value::from(vec![1i64, 3]));
    assert!(matches!(
        selection.push_mask(&[true]),
        Err(ContextError::InvalidMask { expected: 2, found: 1 })
    ));
    selection.pop_mask().unwrap();
    assert_eq!(selection.len(), 4);
    assert_eq!(selection.pop_mask(), Err(ContextError::MaskUnderflow));
}

#[test]
fn block_runs_against_a_reduced_view() {
    let leaf = leaf();
    let view: ContextRef = ReductionContext::new(leaf.clone(), Arc::new(NaNFilter::new()));
    Block::from_source("double = id * 2")
        .unwrap()
        .execute(view.as_ref())
        .unwrap();
    assert_eq!(view.get("double").unwrap(), Value::from(vec![0i64, 4, 6, 8]));
    assert_eq!(
        leaf.get("double").unwrap(),
        Value::from(vec![0i64, 0, 4, 6, 8])
    );
}

#[test]
fn cache_is_invalidated_by_upstream_writes() {
    let leaf = leaf();
    let cached = CachedContext::new(leaf.clone());
    assert_eq!(cached.get("id").unwrap(), leaf.get("id").unwrap());
    assert!(cached.is_cached("id"));
    leaf.set("id", Value::from(vec![9i64, 9, 9, 9, 9])).unwrap();
    assert!(!cached.is_cached("id"));
    assert_eq!(cached.get("id").unwrap(), Value::from(vec![9i64, 9, 9, 9, 9]));
}

#[test]
fn extension_keeps_private_columns_aligned() {
    let leaf = leaf();
    let extension = ExtensionContext::new(leaf.clone());
    extension
        .set("flag", Value::from(vec![1i64, 0, 1, 0, 1]))
        .unwrap();
    assert!(!leaf.contains("flag"));
    assert!(matches!(
        extension.set("bad", Value::from(vec![1i64, 2])),
        Err(ContextError::LengthMismatch { .. })
    ));

    leaf.set("id", Value::from(vec![0i64, 1, 2, 3, 4, 5, 6])).unwrap();
    assert_eq!(leaf.len(), 7);
    assert_eq!(extension.len(), 7);
    assert_eq!(
        extension.get("flag").unwrap(),
        Value::from(vec![1i64, 0, 1, 0, 1, 0, 0])
    );
}

#[test]
fn dropping_a_stage_unsubscribes_it() {
    let leaf = leaf();
    let filter = Arc::new(NaNFilter::new());
    let view = ReductionContext::new(leaf.clone(), filter.clone());
    assert_eq!(leaf.events().listener_count(), 1);
    assert_eq!(filter.modified().listener_count(), 1);
    drop(view);
    assert_eq!(leaf.events().listener_count(), 0);
    assert_eq!(filter.modified().listener_count(), 0);
}

#[test]
fn terminal_handle_swaps_pipelines() {
    let first = leaf();
    let second: ContextRef = Arc::new(NumericContext::new());
    second.set("other", Value::from(vec![1i64])).unwrap();

    let pipeline = Pipeline::new(first).terminate();
    let terminal = pipeline.terminal().unwrap().clone();
    terminal.set_upstream(second);
    assert_eq!(pipeline.output().names(), vec!["other"]);
}
