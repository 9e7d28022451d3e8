//! Property-based tests for context, filter, event and block invariants

use numctx::block::Block;
use numctx::context::{Context, ContextRef, NumericContext};
use numctx::event::{ContextEvents, ContextModified};
use numctx::filter::{Filter, MaskFilter, SortFilter, SortMode};
use numctx::pipeline::ReductionContext;
use numctx::value::Value;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

const NAMES: [&str; 3] = ["a", "b", "c"];

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    WriteArray,
    WriteScalar,
    Delete,
    Reset,
}

fn op_strategy() -> impl Strategy<Value = (Op, usize)> {
    (0usize..7, 0usize..NAMES.len()).prop_map(|(kind, name)| {
        let op = match kind {
            0..=2 => Op::WriteArray,
            3 => Op::WriteScalar,
            4 | 5 => Op::Delete,
            _ => Op::Reset,
        };
        (op, name)
    })
}

/// Events a leaf would post for `ops`, given which names exist up front
fn simulate(initial: &[bool], ops: &[(Op, usize)]) -> Vec<(ContextModified, Option<usize>)> {
    let mut present = initial.to_vec();
    let mut events = Vec::new();
    for &(op, name) in ops {
        let label = NAMES[name];
        match op {
            Op::WriteArray => {
                let event = if present[name] {
                    ContextModified::modified(label)
                } else {
                    ContextModified::added(label)
                };
                present[name] = true;
                events.push((event, Some(name)));
            }
            // scalars only replace existing names, so existence is carried
            // by added and removed alone
            Op::WriteScalar if present[name] => {
                events.push((ContextModified::changed(label), Some(name)));
            }
            Op::WriteScalar => {}
            Op::Delete if present[name] => {
                present[name] = false;
                events.push((ContextModified::removed(label), Some(name)));
            }
            Op::Delete => {}
            Op::Reset => events.push((ContextModified::reset(), None)),
        }
    }
    events
}

/// Per-field name sets expected after coalescing, built from existence
/// before and after the window and the events since each name's last removal
fn expected_fields(
    initial: &[bool],
    events: &[(ContextModified, Option<usize>)],
) -> [BTreeSet<String>; 4] {
    let mut fields: [BTreeSet<String>; 4] = Default::default();
    for (index, label) in NAMES.iter().enumerate() {
        let own: Vec<&ContextModified> = events
            .iter()
            .filter(|(_, name)| *name == Some(index))
            .map(|(event, _)| event)
            .collect();
        if own.is_empty() {
            continue;
        }
        let last_removal = own.iter().rposition(|e| !e.removed.is_empty());
        let tail = match last_removal {
            Some(at) => &own[at + 1..],
            None => &own[..],
        };
        let before = initial[index];
        let after = own.last().map_or(before, |e| e.removed.is_empty());
        let in_tail = |pick: fn(&ContextModified) -> bool| tail.iter().any(|e| pick(e));

        let added = in_tail(|e| !e.added.is_empty());
        let modified = in_tail(|e| !e.modified.is_empty());
        if added && !before {
            fields[0].insert(label.to_string());
        }
        if modified || (before && last_removal.is_some() && added) {
            fields[1].insert(label.to_string());
        }
        if before && !after {
            fields[2].insert(label.to_string());
        }
        if in_tail(|e| !e.changed.is_empty()) {
            fields[3].insert(label.to_string());
        }
    }
    fields
}

fn fields_of(event: &ContextModified) -> [BTreeSet<String>; 4] {
    let set = |names: &[String]| names.iter().cloned().collect::<BTreeSet<_>>();
    [
        set(&event.added),
        set(&event.modified),
        set(&event.removed),
        set(&event.changed),
    ]
}

/// Stored arrays always share the context length
#[test]
fn test_array_lengths_follow_context_length() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let op = (0usize..NAMES.len(), prop::collection::vec(-50i64..50, 1..8), any::<bool>());

    runner
        .run(&prop::collection::vec(op, 1..20), |ops| {
            let ctx = NumericContext::new();
            for (name, values, delete) in ops {
                let name = NAMES[name];
                if delete && ctx.contains(name) {
                    ctx.delete(name).unwrap();
                } else {
                    ctx.set(name, Value::from(values)).unwrap();
                }
                for stored in ctx.names() {
                    if let Some(array) = ctx.get(&stored).unwrap().as_array() {
                        prop_assert_eq!(array.len(), ctx.len());
                    }
                }
            }
            Ok(())
        })
        .unwrap();
}

proptest! {
    /// A reduced view equals upstream values indexed by the filter mask
    #[test]
    fn test_reduction_matches_mask(
        rows in prop::collection::vec((-100i64..100, any::<bool>()), 1..40)
    ) {
        let values: Vec<i64> = rows.iter().map(|(v, _)| *v).collect();
        let mask: Vec<bool> = rows.iter().map(|(_, m)| *m).collect();
        let leaf: ContextRef = Arc::new(NumericContext::new());
        leaf.set("v", Value::from(values.clone())).unwrap();

        let view = ReductionContext::new(leaf.clone(), Arc::new(MaskFilter::new(mask.clone())));
        let expected: Vec<i64> = values
            .iter()
            .zip(&mask)
            .filter(|(_, keep)| **keep)
            .map(|(v, _)| *v)
            .collect();
        prop_assert_eq!(view.len(), expected.len());
        prop_assert_eq!(view.get("v").unwrap(), Value::from(expected));
        prop_assert_eq!(view.names(), leaf.names());
    }

    /// Sort permutations order by key and keep ties in input order
    #[test]
    fn test_sort_is_ordered_and_stable(
        keys in prop::collection::vec(-5i64..5, 1..40),
        descending in any::<bool>()
    ) {
        let ctx = NumericContext::new();
        ctx.set("k", Value::from(keys.clone())).unwrap();
        let mode = if descending { SortMode::Desc } else { SortMode::Asc };
        let order = SortFilter::new("k", mode)
            .unwrap()
            .evaluate(&ctx)
            .unwrap()
            .unwrap()
            .indices();

        prop_assert_eq!(order.len(), keys.len());
        for pair in order.windows(2) {
            let (a, b) = (keys[pair[0]], keys[pair[1]]);
            if descending {
                prop_assert!(a >= b);
            } else {
                prop_assert!(a <= b);
            }
            if a == b {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }

    /// k nested deferrals deliver exactly one event with the netted union
    /// of every deferred field
    #[test]
    fn test_deferred_events_coalesce(
        initial in prop::collection::vec(any::<bool>(), NAMES.len()),
        ops in prop::collection::vec(op_strategy(), 1..16),
        depth in 0usize..4
    ) {
        let events = simulate(&initial, &ops);
        let channel = ContextEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        channel.subscribe(move |e| sink.lock().push(e.clone()));

        for _ in 0..depth {
            channel.defer();
        }
        for (event, _) in &events {
            channel.post(event.clone());
        }
        for _ in 0..depth {
            channel.flush();
        }

        let seen = seen.lock();
        let posted: Vec<ContextModified> = events.iter().map(|(e, _)| e.clone()).collect();
        if depth == 0 {
            prop_assert_eq!(&*seen, &posted);
        } else if posted.iter().any(|e| e.reset) {
            prop_assert_eq!(&*seen, &vec![ContextModified::reset()]);
        } else {
            let expected = expected_fields(&initial, &events);
            if expected.iter().all(BTreeSet::is_empty) {
                prop_assert!(seen.is_empty());
            } else {
                prop_assert_eq!(seen.len(), 1);
                prop_assert!(!seen[0].reset);
                prop_assert_eq!(fields_of(&seen[0]), expected);
                for name in &seen[0].removed {
                    prop_assert!(!seen[0].added.contains(name));
                    prop_assert!(!seen[0].modified.contains(name));
                }
            }
        }
    }

    /// Restricting to one output keeps a subset of inputs and the same result
    #[test]
    fn test_restriction_preserves_output(
        steps in prop::collection::vec((0usize..12, 0usize..12, 1i64..5), 1..8)
    ) {
        // v{i+4} depends on two earlier names
        let mut lines = Vec::new();
        for (i, (lhs, rhs, k)) in steps.iter().enumerate() {
            let available = i + 4;
            lines.push(format!(
                "v{} = v{} * {} + v{}",
                available,
                lhs % available,
                k,
                rhs % available
            ));
        }
        let source = lines.join("\n");
        let block = Block::from_source(&source).unwrap();
        let output = format!("v{}", steps.len() + 3);
        let restricted = block.restrict(&[], &[output.as_str()]).unwrap();
        prop_assert!(restricted.inputs().is_subset(&block.inputs()));

        let seed = |ctx: &NumericContext| {
            for i in 0..4 {
                ctx.set(&format!("v{}", i), Value::from(vec![i as i64, 1, 2])).unwrap();
            }
        };
        let full = NumericContext::new();
        seed(&full);
        block.execute(&full).unwrap();

        let partial = NumericContext::new();
        seed(&partial);
        block.execute(&partial).unwrap();
        partial.delete(&output).unwrap();
        restricted.execute(&partial).unwrap();

        prop_assert_eq!(partial.get(&output).unwrap(), full.get(&output).unwrap());
    }
}
