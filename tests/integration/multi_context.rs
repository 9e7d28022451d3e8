//! Integration tests for MultiContext routing and event forwarding

use crate::integration::test_utils::record_events;
use numctx::block::Block;
use numctx::context::{Context, ContextRef, MultiContext, NumericContext};
use numctx::error::ContextError;
use numctx::event::ContextModified;
use numctx::pipeline::ReductionContext;
use numctx::filter::IndexFilter;
use numctx::value::Value;
use std::sync::Arc;

fn children() -> (ContextRef, ContextRef) {
    (
        Arc::new(NumericContext::arrays_only()),
        Arc::new(NumericContext::new()),
    )
}

#[test]
fn moving_a_name_between_children_posts_one_event() {
    let (arrays, general) = children();
    let multi: ContextRef = MultiContext::new(vec![arrays.clone(), general]);
    multi.set("a", Value::from(vec![1i64, 2, 3])).unwrap();

    let seen = record_events(&multi);
    multi.set("a", Value::from(1i64)).unwrap();
    assert_eq!(*seen.lock(), vec![ContextModified::changed("a")]);
    assert!(!arrays.contains("a"));
}

#[test]
fn nothing_accepts_is_rejected() {
    let multi = MultiContext::new(vec![
        Arc::new(NumericContext::arrays_only()) as ContextRef,
        Arc::new(NumericContext::arrays_only()) as ContextRef,
    ]);
    assert!(matches!(
        multi.set("s", Value::from("text")),
        Err(ContextError::Rejected { .. })
    ));
    assert!(!multi.contains("s"));
}

#[test]
fn names_are_the_ordered_union() {
    let (arrays, general) = children();
    arrays.set("x", Value::from(vec![1.0, 2.0])).unwrap();
    general.set("label", Value::from("run")).unwrap();
    general.set("x", Value::from(3i64)).unwrap();
    let multi = MultiContext::new(vec![arrays, general]);

    assert_eq!(multi.names(), vec!["x", "label"]);
    assert_eq!(multi.get("x").unwrap(), Value::from(vec![1.0, 2.0]));
    assert_eq!(multi.len(), 2);
}

#[test]
fn child_events_reach_multi_listeners() {
    let (arrays, general) = children();
    let multi: ContextRef = MultiContext::new(vec![arrays.clone(), general]);
    let seen = record_events(&multi);
    arrays.set("x", Value::from(vec![1i64])).unwrap();
    assert_eq!(*seen.lock(), vec![ContextModified::added("x")]);
}

#[test]
fn multi_context_feeds_a_pipeline() {
    let (arrays, general) = children();
    let multi: ContextRef = MultiContext::new(vec![arrays, general]);
    Block::from_source("x = arange(4)\nscale = 2")
        .unwrap()
        .execute(multi.as_ref())
        .unwrap();

    let view = ReductionContext::new(multi.clone(), Arc::new(IndexFilter::new(vec![1, 3])));
    assert_eq!(view.get("x").unwrap(), Value::from(vec![1i64, 3]));
    assert_eq!(view.get("scale").unwrap(), Value::from(2i64));
}
