//! End-to-end scenarios over leaf contexts, blocks, multi contexts and filters

use crate::integration::test_utils::record_events;
use numctx::block::Block;
use numctx::context::{Context, ContextRef, MultiContext, NumericContext};
use numctx::filter::{Filter, PolygonFilter};
use numctx::value::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

fn leaf() -> ContextRef {
    Arc::new(NumericContext::new())
}

fn run(context: &ContextRef, source: &str) {
    Block::from_source(source)
        .unwrap()
        .execute(context.as_ref())
        .unwrap();
}

#[test]
fn basic_assignment_posts_one_added_event() {
    let ctx = leaf();
    let seen = record_events(&ctx);
    run(&ctx, "from numpy import array; x = array((1,2,3))");

    assert_eq!(ctx.get("x").unwrap(), Value::from(vec![1i64, 2, 3]));
    assert_eq!(ctx.len(), 3);
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].added, vec!["x"]);
    assert!(seen[0].modified.is_empty());
}

#[test]
fn reassignment_posts_added_then_modified() {
    let ctx = leaf();
    let seen = record_events(&ctx);
    run(
        &ctx,
        "from numpy import array; x = array((2,3,4)); x = array((1,2,3))",
    );

    assert_eq!(ctx.get("x").unwrap(), Value::from(vec![1i64, 2, 3]));
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].added, vec!["x"]);
    assert_eq!(seen[0].modified, vec!["x"]);
    assert!(seen[0].removed.is_empty());
}

#[test]
fn reassignment_across_blocks_posts_two_events() {
    let ctx = leaf();
    let seen = record_events(&ctx);
    run(&ctx, "x = array((2,3,4))");
    run(&ctx, "x = array((1,2,3))");

    let seen = seen.lock();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].added, vec!["x"]);
    assert_eq!(seen[1].modified, vec!["x"]);
}

#[test]
fn masked_scalar_assignment() {
    let ctx = leaf();
    run(&ctx, "x = array((1,2,3))");
    run(&ctx, "push_mask(x == 2); x = 0; pop_mask()");
    assert_eq!(ctx.get("x").unwrap(), Value::from(vec![1i64, 0, 3]));
}

#[test]
fn masked_new_names_get_default_fill() {
    let ctx = leaf();
    run(&ctx, "samples = arange(5)");
    run(
        &ctx,
        "push_mask(samples < 2); x = 3; y = 'a'; pop_mask()\n\
         push_mask((2 <= samples) & (samples < 4)); x = 5; pop_mask()",
    );
    assert_eq!(ctx.get("x").unwrap(), Value::from(vec![3i64, 3, 5, 5, 0]));
    assert_eq!(
        ctx.get("y").unwrap(),
        Value::from(vec!["a", "a", "", "", ""])
    );
}

#[test]
fn restriction_by_output() {
    let block = Block::from_source("c = add(a,b); d = mul(c,16)").unwrap();
    let restricted = block.restrict(&[], &["d"]).unwrap();
    let expected: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
    assert_eq!(restricted.inputs(), expected);

    let ctx = leaf();
    ctx.set("a", Value::from(1i64)).unwrap();
    ctx.set("b", Value::from(2i64)).unwrap();
    restricted.execute(ctx.as_ref()).unwrap();
    assert_eq!(ctx.get("c").unwrap(), Value::from(3i64));
    assert_eq!(ctx.get("d").unwrap(), Value::from(48i64));
}

#[test]
fn multi_context_routes_by_acceptance() {
    let arrays: ContextRef = Arc::new(NumericContext::arrays_only());
    let general: ContextRef = Arc::new(NumericContext::new());
    let multi = MultiContext::new(vec![arrays.clone(), general.clone()]);

    multi.set("a", Value::from(vec![1i64, 2, 3])).unwrap();
    assert!(arrays.contains("a"));
    assert!(!general.contains("a"));

    multi.set("a", Value::from(1i64)).unwrap();
    assert!(!arrays.contains("a"));
    assert_eq!(general.get("a").unwrap(), Value::from(1i64));
    assert_eq!(multi.get("a").unwrap(), Value::from(1i64));
}

#[test]
fn polygon_filter_on_rectangle() {
    let ctx = leaf();
    run(&ctx, "a = arange(1000); c = arange(1000)");
    let polygon = PolygonFilter::new(
        vec![vec![(0.0, 100.0), (1000.0, 100.0), (1000.0, 300.0), (0.0, 300.0)]],
        "a",
        "c",
    )
    .unwrap();

    let result = polygon.evaluate(ctx.as_ref()).unwrap().unwrap();
    assert_eq!(result.as_mask().unwrap().len(), 1000);
    assert_eq!(result.indices(), (101..=300).collect::<Vec<_>>());
}
