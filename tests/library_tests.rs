// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

mod common;

use std::collections::HashMap;
use std::sync::LazyLock;

use common::*;
use omfx::{parse_library, Dictionary, FileVariant, OmfError};
use serde_json::{self};

static DICT_EXPECTATIONS: LazyLock<HashMap<String, u16>> = LazyLock::new(|| {
    serde_json::from_str(
        r#"{
        "ALPHA_SYM": 1,
        "BETA_SYM": 2
    }"#,
    )
    .expect("expectations")
});

fn alpha_module() -> Vec<u8> {
    let mut out = theadr("alpha.c");
    out.extend_from_slice(&pubdef16_absolute("ALPHA_SYM", 0x0010));
    out.extend_from_slice(&modend());
    out
}

fn beta_module() -> Vec<u8> {
    let mut out = theadr("beta.c");
    out.extend_from_slice(&pubdef16_absolute("BETA_SYM", 0x0020));
    out.extend_from_slice(&modend());
    out
}

fn two_module_library() -> Vec<u8> {
    let symbols: Vec<(Vec<u8>, u16)> = DICT_EXPECTATIONS
        .iter()
        .map(|(name, page)| (name.clone().into_bytes(), *page))
        .collect();
    let dictionary = Dictionary::build(&symbols).expect("dictionary");
    build_library(
        64,
        &[alpha_module(), beta_module()],
        Some(&dictionary),
        None,
    )
}

#[test]
fn test_library_parse_and_round_trip() {
    let bytes = two_module_library();
    let library = parse_library(&bytes).expect("parse");

    assert_eq!(library.page_size, 64);
    assert!(!library.case_sensitive());
    assert_eq!(library.members.len(), 2);
    assert!(library.warnings.is_empty());

    let alpha = library.members[0].module.as_ref().expect("alpha");
    let beta = library.members[1].module.as_ref().expect("beta");
    assert_eq!(alpha.name().as_deref(), Some("alpha.c"));
    assert_eq!(beta.name().as_deref(), Some("beta.c"));
    assert_eq!(library.module_variant(), Some(FileVariant::TisOmf86));

    // Every member starts on a page boundary, with a THEADR right at
    // the page's first byte.
    for member in &library.members {
        assert_eq!(bytes[member.page as usize * 64], 0x80);
    }
    assert_eq!(library.members[0].page, 1);
    assert_eq!(library.members[1].page, 2);

    let dumped = library.dump().expect("dump");
    assert_eq!(dumped, bytes, "library dump must be byte-exact");
}

#[test]
fn test_dictionary_lookup_through_library() {
    let bytes = two_module_library();
    let library = parse_library(&bytes).expect("parse");

    for (name, page) in DICT_EXPECTATIONS.iter() {
        assert_eq!(
            library.lookup(name.as_bytes()).expect("lookup"),
            Some(*page),
            "{name}"
        );
        // The hash folds case, and the library is case-insensitive.
        assert_eq!(
            library
                .lookup(name.to_lowercase().as_bytes())
                .expect("lookup"),
            Some(*page)
        );
    }
    assert_eq!(library.lookup(b"MISSING").expect("lookup"), None);

    // The page number leads back to the defining member.
    let page = library.lookup(b"BETA_SYM").expect("lookup").expect("page");
    let member = library.member_at_page(page).expect("member");
    let module = member.module.as_ref().expect("module");
    assert_eq!(module.name().as_deref(), Some("beta.c"));
}

#[test]
fn test_mixed_variant_library_fails() {
    let mut easy = theadr("easy.c");
    easy.extend_from_slice(&easy_omf_marker());
    easy.extend_from_slice(&modend());

    let bytes = build_library(64, &[easy, simple_module("plain.c")], None, None);
    let err = parse_library(&bytes).expect_err("must fail");
    assert_eq!(
        err,
        OmfError::MixedVariantLibrary {
            expected: FileVariant::EasyOmf386,
            found: FileVariant::TisOmf86,
            module: 2,
        }
    );
}

#[test]
fn test_bad_member_does_not_poison_the_rest() {
    // The middle module references a segment that was never defined.
    let mut broken = theadr("bad.c");
    broken.extend_from_slice(&record(0x90, &[0x00, 0x01, 0x01, 0x58, 0x10, 0x00, 0x00]));
    broken.extend_from_slice(&modend());

    let bytes = build_library(
        64,
        &[simple_module("ok1.c"), broken, simple_module("ok2.c")],
        None,
        None,
    );
    let library = parse_library(&bytes).expect("parse");
    assert_eq!(library.members.len(), 3);
    assert!(library.members[0].module.is_ok());
    assert!(matches!(
        library.members[1].module,
        Err(OmfError::DanglingIndex { .. })
    ));
    assert!(library.members[2].module.is_ok());
}

#[test]
fn test_extended_dictionary_round_trip() {
    let symbols = vec![(b"ALPHA_SYM".to_vec(), 1u16)];
    let dictionary = Dictionary::build(&symbols).expect("dictionary");

    // F2, length, module count 1, two entries, two payload bytes.
    let mut extended = vec![0xF2];
    let entries: &[(u16, u16)] = &[(1, 10), (0, 0)];
    let length = 2 + 4 * entries.len() + 2;
    extended.extend_from_slice(&(length as u16).to_le_bytes());
    extended.extend_from_slice(&1u16.to_le_bytes());
    for (page, deps) in entries {
        extended.extend_from_slice(&page.to_le_bytes());
        extended.extend_from_slice(&deps.to_le_bytes());
    }
    extended.extend_from_slice(&[0xAA, 0xBB]);

    let bytes = build_library(64, &[alpha_module()], Some(&dictionary), Some(&extended));
    let library = parse_library(&bytes).expect("parse");

    let ext = library.extended.as_ref().expect("extended dictionary");
    assert_eq!(ext.module_count(), 1);
    assert_eq!(ext.entries[0].page, 1);
    assert_eq!(ext.entries[0].deps_offset, 10);
    assert_eq!(ext.payload, vec![0xAA, 0xBB]);

    assert_eq!(library.dump().expect("dump"), bytes);
}

#[test]
fn test_nonprime_block_count_warns() {
    let symbols = vec![(b"ALPHA_SYM".to_vec(), 1u16)];
    let dictionary = Dictionary::build(&symbols).expect("dictionary");
    let mut bytes = build_library(64, &[alpha_module()], Some(&dictionary), None);
    // Patch the header's block count to a non-prime; keep one real
    // block so entries still parse.
    bytes[7] = 1;
    bytes[8] = 0;

    let library = parse_library(&bytes).expect("parse");
    assert!(library
        .warnings
        .iter()
        .any(|w| matches!(w, omfx::Warning::CorruptDictionary(_))));
}

#[test]
fn test_truncated_library_fails() {
    let bytes = two_module_library();
    assert!(matches!(
        parse_library(&bytes[..100]),
        Err(OmfError::Truncated(_))
    ));
}
