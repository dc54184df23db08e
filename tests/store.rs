// Copyright 2026-present the Context-Fabric developers
// SPDX-License-Identifier: Apache-2.0

//! Store lifecycle: compile, open, verify, and the loud-failure contract.

mod common;

use std::collections::BTreeMap;

use tempfile::TempDir;

use fabric::{compile, Fabric, FabricError, FeatureSpec};

#[test]
fn compile_then_open_roundtrip() {
    let (_dir, fabric, _api) = common::open_fixture();
    let meta = fabric.meta();
    assert_eq!(meta.name, "minibhsa");
    assert_eq!(meta.node_count, 31);
    assert_eq!(meta.slot_count, 12);
    assert_eq!(meta.types.len(), 6);
    assert_eq!(fabric.version(), 1);
    fabric.verify().expect("fresh store verifies clean");
}

#[test]
fn recompile_is_byte_identical() {
    let corpus = common::corpus();
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let out_a = compile(&corpus, dir_a.path(), 1).unwrap();
    let out_b = compile(&corpus, dir_b.path(), 1).unwrap();

    let mut files: Vec<_> = walk(&out_a);
    files.sort();
    assert!(!files.is_empty());
    for rel in files {
        let a = std::fs::read(out_a.join(&rel)).unwrap();
        let b = std::fs::read(out_b.join(&rel)).unwrap();
        assert_eq!(a, b, "{} differs between identical compiles", rel);
    }
}

fn walk(root: &std::path::Path) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(
                    path.strip_prefix(root)
                        .unwrap()
                        .to_string_lossy()
                        .into_owned(),
                );
            }
        }
    }
    out
}

#[test]
fn latest_version_is_picked() {
    let dir = TempDir::new().unwrap();
    let corpus = common::corpus();
    compile(&corpus, dir.path(), 1).unwrap();
    compile(&corpus, dir.path(), 3).unwrap();
    let fabric = Fabric::open(dir.path(), None).unwrap();
    assert_eq!(fabric.version(), 3);
    let fabric = Fabric::open(dir.path(), Some(1)).unwrap();
    assert_eq!(fabric.version(), 1);
}

#[test]
fn flipped_byte_fails_verification() {
    let dir = TempDir::new().unwrap();
    let out = compile(&common::corpus(), dir.path(), 1).unwrap();

    let target = out.join("warp").join("order.bin");
    let mut bytes = std::fs::read(&target).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x01;
    std::fs::write(&target, &bytes).unwrap();

    // Structure may still parse, but verification must report the flip.
    match Fabric::open(dir.path(), None) {
        Ok(fabric) => {
            assert!(matches!(
                fabric.verify(),
                Err(FabricError::CorruptStore { .. })
            ));
        }
        Err(e) => assert!(matches!(
            e,
            FabricError::CorruptStore { .. } | FabricError::ArrayOutOfRange { .. }
        )),
    }
}

#[test]
fn truncated_warp_fails_open() {
    let dir = TempDir::new().unwrap();
    let out = compile(&common::corpus(), dir.path(), 1).unwrap();

    let target = out.join("warp").join("levUp.csr");
    let bytes = std::fs::read(&target).unwrap();
    std::fs::write(&target, &bytes[..bytes.len() - 5]).unwrap();

    assert!(Fabric::open(dir.path(), None).is_err());
}

#[test]
fn missing_feature_file_is_loud() {
    let dir = TempDir::new().unwrap();
    let out = compile(&common::corpus(), dir.path(), 1).unwrap();
    std::fs::remove_file(out.join("features").join("sp.bin")).unwrap();

    let fabric = Fabric::open(dir.path(), None).unwrap();
    let err = fabric
        .load(&FeatureSpec::Names(vec!["sp".into()]))
        .unwrap_err();
    assert!(matches!(err, FabricError::MissingFeature { .. }));
}

#[test]
fn unknown_feature_in_spec_is_rejected() {
    let (_dir, fabric, _api) = common::open_fixture();
    let err = fabric
        .load(&FeatureSpec::Names(vec!["no_such_thing".into()]))
        .unwrap_err();
    assert!(matches!(err, FabricError::UnknownFeature { .. }));
}

#[test]
fn load_all_materializes_every_feature() {
    let (_dir, fabric, _api) = common::open_fixture();
    let api = fabric.load(&FeatureSpec::All).unwrap();
    for name in fabric.meta().features.keys() {
        // Edge features live under E, node features under F.
        assert!(api.f(name).is_ok() || api.e(name).is_ok(), "{}", name);
    }
}

#[test]
fn invalid_oslots_rejected_at_compile() {
    let mut corpus = common::corpus();
    // Clause 19's slot list loses its ordering.
    corpus.oslots[6] = vec![4, 2];
    let dir = TempDir::new().unwrap();
    assert!(compile(&corpus, dir.path(), 1).is_err());
}

#[test]
fn scattered_type_blocks_rejected_at_compile() {
    let mut corpus = common::corpus();
    // A phrase in the middle of the clause block.
    corpus.otype[20] = 4;
    let dir = TempDir::new().unwrap();
    assert!(compile(&corpus, dir.path(), 1).is_err());
}

#[test]
fn empty_corpus_rejected() {
    let mut corpus = common::corpus();
    corpus.otype.clear();
    corpus.oslots.clear();
    corpus.node_features = BTreeMap::new();
    corpus.edge_features = BTreeMap::new();
    let dir = TempDir::new().unwrap();
    assert!(compile(&corpus, dir.path(), 1).is_err());
}
