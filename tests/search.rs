// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! SPIN end-to-end: templates, relations, quantifiers, return types,
//! pagination, and the failure contract.

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fabric::{Api, FabricError, ReturnType, SearchOpts, SearchOutput};

fn results(api: &Api, template: &str) -> Vec<Vec<u32>> {
    match api
        .s
        .search(template, ReturnType::Results, &SearchOpts::default())
        .unwrap()
    {
        SearchOutput::Results { tuples, .. } => tuples,
        other => panic!("expected results, got {:?}", other),
    }
}

fn count(api: &Api, template: &str) -> u64 {
    match api
        .s
        .search(template, ReturnType::Count, &SearchOpts::default())
        .unwrap()
    {
        SearchOutput::Count(n) => n,
        other => panic!("expected count, got {:?}", other),
    }
}

fn as_set(tuples: Vec<Vec<u32>>) -> BTreeSet<Vec<u32>> {
    tuples.into_iter().collect()
}

#[test]
fn lexical_count_is_stable() {
    let (_dir, _fabric, api) = common::open_fixture();
    assert_eq!(count(&api, "word sp=verb vt=perf"), 2);
    // Idempotence: the same query on an unchanged corpus.
    assert_eq!(count(&api, "word sp=verb vt=perf"), 2);
}

#[test]
fn structural_search_binds_embedded_tuples() {
    let (_dir, fabric, api) = common::open_fixture();
    let tuples = results(
        &api,
        "clause\n  phrase function=Pred\n    word sp=verb\n",
    );
    assert_eq!(
        as_set(tuples.clone()),
        as_set(vec![
            vec![19, 24, 3],
            vec![20, 26, 5],
            vec![21, 28, 7],
            vec![22, 30, 9],
        ])
    );
    // Every binding respects the embedding chain.
    let api2 = fabric.load(&fabric::FeatureSpec::Lazy).unwrap();
    for tuple in tuples {
        let (clause, phrase, word) = (tuple[0], tuple[1], tuple[2]);
        assert!(api2.l.down(clause, None).unwrap().contains(&phrase));
        assert!(api2.l.down(phrase, None).unwrap().contains(&word));
    }
}

#[test]
fn value_alternatives_and_negation() {
    let (_dir, _fabric, api) = common::open_fixture();
    assert_eq!(count(&api, "word vt=perf|impf"), 4);
    assert_eq!(count(&api, "word sp=verb vt!=perf"), 2);
    assert_eq!(count(&api, "word vt*"), 4);
    assert_eq!(count(&api, "word vt?"), 8);
    // Unknown values match nothing; that is not an error.
    assert_eq!(count(&api, "word sp=vrb"), 0);
}

#[test]
fn regex_predicates_fall_back_to_scalar() {
    let (_dir, _fabric, api) = common::open_fixture();
    let tuples = results(&api, "word lex~^A\n");
    assert_eq!(tuples, vec![vec![9]]); // AMR
    assert_eq!(count(&api, "word lex~R"), 3); // BRA, RXP, AMR
}

#[test]
fn adjacency_relation() {
    let (_dir, _fabric, api) = common::open_fixture();
    let tuples = results(&api, "clause\n  phrase function=Pred\n  <: phrase function=Subj\n");
    assert_eq!(
        as_set(tuples),
        as_set(vec![vec![19, 24, 25], vec![20, 26, 27], vec![22, 30, 31]])
    );
}

#[test]
fn slot_ordering_relation() {
    let (_dir, _fabric, api) = common::open_fixture();
    let tuples = results(&api, "verse\n<< verse\n");
    assert_eq!(
        as_set(tuples),
        as_set(vec![vec![16, 17], vec![16, 18], vec![17, 18]])
    );
}

#[test]
fn boundary_sharing_relations() {
    let (_dir, _fabric, api) = common::open_fixture();
    let tuples = results(&api, "verse\n=: clause\n");
    assert_eq!(
        as_set(tuples),
        as_set(vec![vec![16, 19], vec![17, 20], vec![18, 22]])
    );

    // Exactly the same slot set, any type on the right.
    let tuples = results(&api, "verse\n== .\n");
    assert_eq!(
        as_set(tuples),
        as_set(vec![vec![16, 19], vec![18, 15], vec![18, 22]])
    );
}

#[test]
fn without_quantifier() {
    let (_dir, _fabric, api) = common::open_fixture();
    let tuples = results(&api, "clause\n  /without/\n    word vt=impf\n  /-/\n");
    assert_eq!(as_set(tuples), as_set(vec![vec![19], vec![22]]));
}

#[test]
fn with_or_quantifier() {
    let (_dir, _fabric, api) = common::open_fixture();
    let tuples = results(
        &api,
        "phrase\n  /with/\n    word sp=art\n  /or/\n    word sp=advb\n  /-/\n",
    );
    assert_eq!(as_set(tuples), as_set(vec![vec![30], vec![31]]));
}

#[test]
fn where_have_quantifier() {
    let (_dir, _fabric, api) = common::open_fixture();
    // Clauses where every phrase binding coexists with an impf verb.
    let tuples = results(
        &api,
        "clause\n  /where/\n    phrase\n  /have/\n    word vt=impf\n  /-/\n",
    );
    assert_eq!(as_set(tuples), as_set(vec![vec![20], vec![21]]));
}

#[test]
fn statistics_histograms_sum_to_total() {
    let (_dir, _fabric, api) = common::open_fixture();
    let opts = SearchOpts {
        aggregate_features: vec!["vt".into(), "vs".into()],
        top_n: Some(5),
        ..SearchOpts::default()
    };
    let out = api
        .s
        .search("word sp=verb", ReturnType::Statistics, &opts)
        .unwrap();
    let stats = match out {
        SearchOutput::Statistics(stats) => stats,
        other => panic!("expected statistics, got {:?}", other),
    };
    assert_eq!(stats.total, 4);
    for feature in ["vt", "vs"] {
        let counts = &stats.features[feature];
        let sum: u64 = counts.iter().map(|(_, c)| c).sum();
        assert_eq!(sum, stats.total, "{} histogram", feature);
    }
    assert_eq!(stats.features["vt"].len(), 2); // perf, impf
}

#[test]
fn passages_return_type_resolves_sections() {
    let (_dir, _fabric, api) = common::open_fixture();
    let out = api
        .s
        .search("verse\n  word vt=impf\n", ReturnType::Passages, &SearchOpts::default())
        .unwrap();
    let passages = match out {
        SearchOutput::Passages(p) => p,
        other => panic!("expected passages, got {:?}", other),
    };
    let refs: Vec<String> = passages.iter().map(|p| p.section.to_string()).collect();
    assert_eq!(refs, vec!["Genesis 1:2"]);
    assert_eq!(passages[0].text, "was earth moved waters ");
}

#[test]
fn pagination_preserves_global_order() {
    let (_dir, _fabric, api) = common::open_fixture();
    let opts = SearchOpts {
        limit: Some(3),
        ..SearchOpts::default()
    };
    let out = api.s.search("word", ReturnType::Results, &opts).unwrap();
    let (tuples, total, cursor) = match out {
        SearchOutput::Results {
            tuples,
            total,
            cursor,
        } => (tuples, total, cursor),
        other => panic!("expected results, got {:?}", other),
    };
    assert_eq!(total, 12);
    assert_eq!(tuples, vec![vec![1], vec![2], vec![3]]);

    let cursor = cursor.expect("more results behind a cursor");
    let page = api.s.search_continue(cursor, Some(3), 2).unwrap();
    assert_eq!(page.tuples, vec![vec![4], vec![5]]);
    assert!(page.has_more);

    let tail = api.s.search_continue(cursor, Some(10), 10).unwrap();
    assert_eq!(tail.tuples, vec![vec![11], vec![12]]);
    assert!(!tail.has_more);
}

#[test]
fn plan_equivalence_across_formulations() {
    let (_dir, _fabric, api) = common::open_fixture();
    let forward = results(&api, "clause\n  word sp=verb\n");
    let backward = results(&api, "word sp=verb\n]] clause\n");

    let forward: BTreeSet<(u32, u32)> = forward.into_iter().map(|t| (t[0], t[1])).collect();
    let backward: BTreeSet<(u32, u32)> = backward.into_iter().map(|t| (t[1], t[0])).collect();
    assert_eq!(forward, backward);
}

#[test]
fn unknown_names_fail_before_planning() {
    let (_dir, _fabric, api) = common::open_fixture();
    let err = api
        .s
        .search("word pos=verb", ReturnType::Count, &SearchOpts::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FabricError::UnknownName {
            kind: fabric::NameKind::Feature,
            ..
        }
    ));

    let err = api
        .s
        .search("token", ReturnType::Count, &SearchOpts::default())
        .unwrap_err();
    assert!(matches!(
        err,
        FabricError::UnknownName {
            kind: fabric::NameKind::Type,
            ..
        }
    ));
}

#[test]
fn parse_errors_carry_position() {
    let (_dir, _fabric, api) = common::open_fixture();
    let err = api
        .s
        .search("clause\n  ??bad\n", ReturnType::Count, &SearchOpts::default())
        .unwrap_err();
    match err {
        FabricError::TemplateParse { line, .. } => assert_eq!(line, 2),
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn empty_result_is_not_an_error() {
    let (_dir, _fabric, api) = common::open_fixture();
    assert_eq!(count(&api, "word sp=verb vt=perf vs=impossible"), 0);
    let tuples = results(&api, "word sp=verb vt=perf vs=impossible");
    assert!(tuples.is_empty());
}

#[test]
fn cancel_flag_stops_the_query() {
    let (_dir, _fabric, api) = common::open_fixture();
    let cancel = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);
    let opts = SearchOpts {
        cancel: Some(Arc::clone(&cancel)),
        ..SearchOpts::default()
    };
    let err = api
        .s
        .search("word", ReturnType::Count, &opts)
        .unwrap_err();
    assert!(matches!(err, FabricError::Cancelled));
}

#[test]
fn exhausted_budget_times_out() {
    let (_dir, _fabric, api) = common::open_fixture();
    let opts = SearchOpts {
        budget: Some(Duration::ZERO),
        ..SearchOpts::default()
    };
    let err = api
        .s
        .search("word", ReturnType::Count, &opts)
        .unwrap_err();
    assert!(matches!(err, FabricError::Timeout { .. }));
}
