// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Shared fixture: a 31-node corpus shaped like a scripture corpus, with
//! books/chapters/verses/clauses/phrases/words, realistic features, and a
//! couple of edges.
//!
//! Layout (slots are words 1-12):
//!
//! ```text
//! book 13 ─ chapters 14 (slots 1-8), 15 (slots 9-12)
//! verses  16 (1-4), 17 (5-8), 18 (9-12)
//! clauses 19 (1-4), 20 (5-6), 21 (7-8), 22 (9-12)
//! phrases 23 (1-2), 24 (3), 25 (4), 26 (5), 27 (6),
//!         28 (7), 29 (8), 30 (9-10), 31 (11-12)
//! ```

// Not every test binary touches every helper.
#![allow(dead_code)]

use std::collections::BTreeMap;

use tempfile::TempDir;

use fabric::{
    compile, Api, EdgeFeatureData, Fabric, FeatureSpec, NodeFeatureData, RawCorpus,
    SectionConfig, TypeDecl, Value, ValueKind,
};

pub const BOOK: u32 = 13;
pub const CHAPTER_1: u32 = 14;
pub const CHAPTER_2: u32 = 15;
pub const VERSE_1_1: u32 = 16;
pub const VERSE_1_2: u32 = 17;
pub const VERSE_2_1: u32 = 18;
pub const CLAUSES: [u32; 4] = [19, 20, 21, 22];

/// Words: (form, trailer, part of speech, tense, stem, lexeme)
const WORDS: [(&str, &str, &str, Option<&str>, Option<&str>, Option<&str>); 12] = [
    ("In", " ", "prep", None, None, None),
    ("beginning", " ", "subs", None, None, None),
    ("created", " ", "verb", Some("perf"), Some("qal"), Some("BRA")),
    ("God", " ", "subs", None, None, None),
    ("was", " ", "verb", Some("impf"), Some("qal"), Some("HJH")),
    ("earth", " ", "subs", None, None, None),
    ("moved", " ", "verb", Some("impf"), Some("piel"), Some("RXP")),
    ("waters", " ", "subs", None, None, None),
    ("said", " ", "verb", Some("perf"), Some("piel"), Some("AMR")),
    ("then", " ", "advb", None, None, None),
    ("the", " ", "art", None, None, None),
    ("man", "", "subs", None, None, None),
];

const PHRASE_FUNCTIONS: [(u32, &str); 9] = [
    (23, "Adju"),
    (24, "Pred"),
    (25, "Subj"),
    (26, "Pred"),
    (27, "Subj"),
    (28, "Pred"),
    (29, "Objc"),
    (30, "Pred"),
    (31, "Subj"),
];

pub fn corpus() -> RawCorpus {
    let types = vec![
        TypeDecl { name: "book".into(), level: 0, slot: false },
        TypeDecl { name: "chapter".into(), level: 1, slot: false },
        TypeDecl { name: "verse".into(), level: 2, slot: false },
        TypeDecl { name: "clause".into(), level: 3, slot: false },
        TypeDecl { name: "phrase".into(), level: 4, slot: false },
        TypeDecl { name: "word".into(), level: 5, slot: true },
    ];

    let mut otype = vec![5u16; 12];
    otype.push(0); // book 13
    otype.extend([1, 1]); // chapters 14-15
    otype.extend([2, 2, 2]); // verses 16-18
    otype.extend([3, 3, 3, 3]); // clauses 19-22
    otype.extend([4; 9]); // phrases 23-31

    let oslots: Vec<Vec<u32>> = vec![
        (1..=12).collect(), // book 13
        (1..=8).collect(),  // chapter 14
        (9..=12).collect(), // chapter 15
        (1..=4).collect(),  // verse 16
        (5..=8).collect(),  // verse 17
        (9..=12).collect(), // verse 18
        (1..=4).collect(),  // clause 19
        vec![5, 6],         // clause 20
        vec![7, 8],         // clause 21
        (9..=12).collect(), // clause 22
        vec![1, 2],         // phrase 23
        vec![3],            // phrase 24
        vec![4],            // phrase 25
        vec![5],            // phrase 26
        vec![6],            // phrase 27
        vec![7],            // phrase 28
        vec![8],            // phrase 29
        vec![9, 10],        // phrase 30
        vec![11, 12],       // phrase 31
    ];

    let mut node_features: BTreeMap<String, NodeFeatureData> = BTreeMap::new();

    let str_feature = |cells: Vec<(u32, &str)>| {
        NodeFeatureData::Str(cells.into_iter().map(|(n, v)| (n, v.to_string())).collect())
    };

    node_features.insert(
        "g_word_utf8".into(),
        str_feature(
            WORDS
                .iter()
                .enumerate()
                .map(|(i, w)| (i as u32 + 1, w.0))
                .collect(),
        ),
    );
    node_features.insert(
        "trailer_utf8".into(),
        str_feature(
            WORDS
                .iter()
                .enumerate()
                .map(|(i, w)| (i as u32 + 1, w.1))
                .collect(),
        ),
    );
    node_features.insert(
        "sp".into(),
        str_feature(
            WORDS
                .iter()
                .enumerate()
                .map(|(i, w)| (i as u32 + 1, w.2))
                .collect(),
        ),
    );
    node_features.insert(
        "vt".into(),
        str_feature(
            WORDS
                .iter()
                .enumerate()
                .filter_map(|(i, w)| w.3.map(|v| (i as u32 + 1, v)))
                .collect(),
        ),
    );
    node_features.insert(
        "vs".into(),
        str_feature(
            WORDS
                .iter()
                .enumerate()
                .filter_map(|(i, w)| w.4.map(|v| (i as u32 + 1, v)))
                .collect(),
        ),
    );
    node_features.insert(
        "lex".into(),
        str_feature(
            WORDS
                .iter()
                .enumerate()
                .filter_map(|(i, w)| w.5.map(|v| (i as u32 + 1, v)))
                .collect(),
        ),
    );
    node_features.insert(
        "function".into(),
        str_feature(PHRASE_FUNCTIONS.to_vec()),
    );
    node_features.insert(
        "typ".into(),
        str_feature(vec![(19, "xQtl"), (20, "xYqt"), (21, "xYqt"), (22, "xQtl")]),
    );
    node_features.insert("book".into(), str_feature(vec![(BOOK, "Genesis")]));
    node_features.insert(
        "chapter".into(),
        NodeFeatureData::Int(BTreeMap::from([(CHAPTER_1, 1), (CHAPTER_2, 2)])),
    );
    node_features.insert(
        "verse".into(),
        NodeFeatureData::Int(BTreeMap::from([
            (VERSE_1_1, 1),
            (VERSE_1_2, 2),
            (VERSE_2_1, 1),
        ])),
    );

    let mut edge_features: BTreeMap<String, EdgeFeatureData> = BTreeMap::new();
    edge_features.insert(
        "mother".into(),
        EdgeFeatureData {
            value_kind: None,
            edges: vec![(20, 19, None), (21, 20, None), (22, 19, None)],
        },
    );
    edge_features.insert(
        "crossref".into(),
        EdgeFeatureData {
            value_kind: Some(ValueKind::Int),
            edges: vec![
                (VERSE_1_1, VERSE_2_1, Some(Value::Int(75))),
                (VERSE_2_1, VERSE_1_1, Some(Value::Int(75))),
                // Dangling reference, as subset corpora produce.
                (VERSE_1_2, 999_999, None),
            ],
        },
    );

    RawCorpus {
        name: "minibhsa".into(),
        types,
        otype,
        oslots,
        node_features,
        edge_features,
        formats: BTreeMap::from([
            (
                "text-orig-full".to_string(),
                "{g_word_utf8}{trailer_utf8}".to_string(),
            ),
            ("lex-orig".to_string(), "{lex/g_word_utf8} ".to_string()),
        ]),
        default_format: "text-orig-full".into(),
        sections: SectionConfig {
            types: vec!["book".into(), "chapter".into(), "verse".into()],
            features: vec!["book".into(), "chapter".into(), "verse".into()],
        },
    }
}

/// Compile the fixture into a tempdir and open it.
pub fn open_fixture() -> (TempDir, Fabric, Api) {
    let dir = TempDir::new().expect("tempdir");
    compile(&corpus(), dir.path(), 1).expect("compile fixture");
    let fabric = Fabric::open(dir.path(), None).expect("open fixture");
    let api = fabric.load(&FeatureSpec::Lazy).expect("load fixture");
    (dir, fabric, api)
}

/// The canonical order of the fixture, worked out by hand from the key
/// `(first slot, -span, type level, node)`.
pub const EXPECTED_ORDER: [u32; 31] = [
    13, 14, 16, 19, 23, 1, 2, 24, 3, 25, 4, 17, 20, 26, 5, 27, 6, 21, 28, 7, 29, 8, 15, 18, 22,
    30, 9, 10, 31, 11, 12,
];
