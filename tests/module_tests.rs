// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

mod common;

use common::*;
use omfx::fixup::{FixupSubrecord, ResolvedFrame, ResolvedTarget};
use omfx::records::{CommunalKind, SegmentAlignment, SegmentCombination};
use omfx::{
    dump_module, parse_module, FileVariant, IndexKind, OmfError, RecordBody, Warning,
};

fn round_trip(bytes: &[u8]) -> omfx::Module {
    let module = parse_module(bytes, None).expect("parse");
    assert_eq!(dump_module(&module), bytes, "dump must be byte-exact");
    let again = parse_module(&dump_module(&module), None).expect("reparse");
    assert_eq!(again, module, "parse(dump(parse(x))) must equal parse(x)");
    module
}

#[test]
fn test_minimal_module() {
    // THEADR "hello.c", MODEND.
    let bytes = [
        0x80, 0x09, 0x00, 0x07, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x2E, 0x63, 0xCB, 0x8A, 0x04, 0x00,
        0x00, 0x00, 0x00, 0x72,
    ];
    let module = round_trip(&bytes);
    assert_eq!(module.variant, FileVariant::TisOmf86);
    assert_eq!(module.records.len(), 2);
    assert_eq!(module.name().as_deref(), Some("hello.c"));
    assert!(module.warnings.is_empty());

    let RecordBody::ModEnd(modend) = &module.records[1].body else {
        panic!("expected MODEND");
    };
    assert!(!modend.is_main());
    assert!(!modend.has_start());
}

#[test]
fn test_pubdef_with_explicit_frame() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&[
        0x90, 0x0E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x41, 0x4C, 0x50, 0x48, 0x41, 0x34, 0x12,
        0x00, 0xB1,
    ]);
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    assert!(module.warnings.is_empty());
    let RecordBody::PubDef(pubdef) = &module.records[1].body else {
        panic!("expected PUBDEF");
    };
    assert_eq!(pubdef.base_group.value(), 0);
    assert_eq!(pubdef.base_segment.value(), 0);
    assert_eq!(pubdef.base_frame, Some(0));
    assert_eq!(pubdef.publics.len(), 1);
    assert_eq!(pubdef.publics[0].name.as_bytes(), b"ALPHA");
    assert_eq!(pubdef.publics[0].offset, 0x1234);
    assert_eq!(pubdef.publics[0].type_index.value(), 0);
}

#[test]
fn test_segdef_byte_aligned_public() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&lnames(&["OVL", "CODE", "X3", "X4", "X5", "X6", "_TEXT"]));
    bytes.extend_from_slice(&[0x98, 0x07, 0x00, 0x28, 0x11, 0x00, 0x07, 0x02, 0x01, 0x1E]);
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    assert!(module.warnings.is_empty());
    let RecordBody::SegDef(segdef) = &module.records[2].body else {
        panic!("expected SEGDEF");
    };
    assert_eq!(segdef.alignment, SegmentAlignment::Byte);
    assert_eq!(segdef.combination, SegmentCombination::Public);
    assert!(!segdef.big);
    assert!(!segdef.use32);
    assert_eq!(segdef.length, 0x0011);
    assert_eq!(segdef.segment_name.value(), 7);
    assert_eq!(segdef.class_name.value(), 2);
    assert_eq!(segdef.overlay_name.value(), 1);
    assert_eq!(
        module.tables.name(segdef.segment_name).map(|n| n.as_bytes()),
        Some(&b"_TEXT"[..])
    );
    assert_eq!(
        module.tables.name(segdef.class_name).map(|n| n.as_bytes()),
        Some(&b"CODE"[..])
    );
}

#[test]
fn test_fixupp_thread_resolution() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&lnames(&["_TEXT", "CODE"]));
    for _ in 0..3 {
        bytes.extend_from_slice(&segdef16(0x28, 0x20, 1, 2, 0));
    }
    bytes.extend_from_slice(&ledata16(1, 0x0000, &[0x90; 8]));
    // THREAD: frame thread 0 = F0 (SEGDEF), index 3.
    // FIXUP: M=1, Location=1, data offset 0x005, frame from thread 0,
    // target T0 segment 1, displacement 0x0010.
    bytes.extend_from_slice(&record(
        0x9C,
        &[0x40, 0x03, 0xC4, 0x05, 0x80, 0x01, 0x10, 0x00],
    ));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    assert!(module.warnings.is_empty());

    let RecordBody::Fixupp(fixupp) = &module.records[6].body else {
        panic!("expected FIXUPP");
    };
    // The fixup is anchored to the LEDATA record.
    assert_eq!(fixupp.anchor, Some(5));

    let FixupSubrecord::Fixup(fixup) = &fixupp.subrecords[1] else {
        panic!("expected a FIXUP subrecord");
    };
    assert!(fixup.segment_relative);
    assert_eq!(fixup.data_offset, 0x005);
    assert_eq!(
        fixup.resolved_frame,
        Some(ResolvedFrame::Segment(3u16.try_into().expect("index")))
    );
    assert_eq!(
        fixup.resolved_target,
        Some(ResolvedTarget::Segment(1u16.try_into().expect("index")))
    );
    assert_eq!(fixup.displacement, Some(0x0010));
}

#[test]
fn test_easy_omf_detection_and_widths() {
    let mut bytes = theadr("hello.c");
    bytes.extend_from_slice(&easy_omf_marker());
    bytes.extend_from_slice(&lnames(&["CODE"]));
    // A 16-bit SEGDEF type byte still carries a 32-bit length under
    // Easy OMF-386.
    let mut segdef_body = vec![0x28];
    segdef_body.extend_from_slice(&0x0011_2233u32.to_le_bytes());
    segdef_body.extend_from_slice(&[0x01, 0x00, 0x00]);
    bytes.extend_from_slice(&record(0x98, &segdef_body));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    assert_eq!(module.variant, FileVariant::EasyOmf386);
    let RecordBody::SegDef(segdef) = &module.records[3].body else {
        panic!("expected SEGDEF");
    };
    assert_eq!(segdef.length, 0x0011_2233);
}

#[test]
fn test_bad_checksum_is_a_warning() {
    let mut bytes = theadr("a.c");
    let mut broken = lnames(&["CODE"]);
    *broken.last_mut().expect("checksum byte") ^= 0xFF;
    bytes.extend_from_slice(&broken);
    bytes.extend_from_slice(&modend());

    let module = parse_module(&bytes, None).expect("parse succeeds despite the checksum");
    assert_eq!(module.warnings.len(), 1);
    assert!(matches!(
        module.warnings[0],
        Warning::BadChecksum { rec_type: 0x96, .. }
    ));
    // The stored (wrong) checksum is reproduced verbatim.
    assert_eq!(dump_module(&module), bytes);
}

#[test]
fn test_dangling_segment_index_is_fatal() {
    let mut bytes = theadr("a.c");
    // PUBDEF against segment 1 with no SEGDEF in sight.
    let body = [0x00, 0x01, 0x01, 0x58, 0x10, 0x00, 0x00];
    bytes.extend_from_slice(&record(0x90, &body));
    bytes.extend_from_slice(&modend());

    let err = parse_module(&bytes, None).expect_err("must fail");
    assert_eq!(
        err,
        OmfError::DanglingIndex {
            kind: IndexKind::Segment,
            value: 1,
            max: 0
        }
    );
}

#[test]
fn test_fixup_without_data_record_is_fatal() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&record(0x9C, &[0xC4, 0x05, 0x44, 0x00]));
    bytes.extend_from_slice(&modend());

    assert!(matches!(
        parse_module(&bytes, None),
        Err(OmfError::MalformedFixupp { .. })
    ));
}

#[test]
fn test_thread_only_fixupp_is_fine_anywhere() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&lnames(&["_TEXT", "CODE"]));
    bytes.extend_from_slice(&segdef16(0x28, 0x20, 1, 2, 0));
    bytes.extend_from_slice(&record(0x9C, &[0x40, 0x01]));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    let RecordBody::Fixupp(fixupp) = &module.records[3].body else {
        panic!("expected FIXUPP");
    };
    assert!(!fixupp.has_fixups());
    assert_eq!(fixupp.anchor, None);
}

#[test]
fn test_first_record_must_be_a_header() {
    let bytes = lnames(&["CODE"]);
    assert!(matches!(
        parse_module(&bytes, None),
        Err(OmfError::UnexpectedRecordType { rec_type: 0x96, .. })
    ));
}

#[test]
fn test_module_without_modend_is_truncated() {
    let bytes = theadr("a.c");
    assert!(matches!(
        parse_module(&bytes, None),
        Err(OmfError::Truncated(_))
    ));
}

#[test]
fn test_obsolete_record_preserved_opaquely() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&record(0x8E, &[0x00, 0x7B, 0x01, 0x02]));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    let RecordBody::Obsolete(opaque) = &module.records[1].body else {
        panic!("expected an obsolete record");
    };
    assert_eq!(opaque.data, vec![0x00, 0x7B, 0x01, 0x02]);
}

#[test]
fn test_comdef_populates_extern_table() {
    let mut bytes = theadr("a.c");
    let mut body = Vec::new();
    body.push(4);
    body.extend_from_slice(b"_buf");
    body.push(0x00); // type index
    body.push(0x62); // NEAR
    body.push(0x40); // 64 bytes
    bytes.extend_from_slice(&record(0xB0, &body));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    assert_eq!(module.tables.externs.len(), 1);
    assert_eq!(module.tables.externs[0].as_bytes(), b"_buf");
    let RecordBody::ComDef(comdef) = &module.records[1].body else {
        panic!("expected COMDEF");
    };
    assert_eq!(comdef.communals[0].kind, CommunalKind::Near { size: 0x40 });
}

#[test]
fn test_lidata32_repeat_width() {
    let mut bytes = theadr("a.c");
    bytes.extend_from_slice(&lnames(&["_DATA", "DATA"]));
    bytes.extend_from_slice(&segdef16(0x48, 0x100, 1, 2, 0));
    // LIDATA32: segment 1, offset u32 0, one leaf block with a 32-bit
    // repeat count.
    let mut body = vec![0x01];
    body.extend_from_slice(&0u32.to_le_bytes());
    body.extend_from_slice(&4u32.to_le_bytes()); // repeat
    body.extend_from_slice(&0u16.to_le_bytes()); // leaf
    body.push(2);
    body.extend_from_slice(b"OK");
    bytes.extend_from_slice(&record(0xA3, &body));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    let RecordBody::LiData(lidata) = &module.records[3].body else {
        panic!("expected LIDATA");
    };
    assert_eq!(lidata.expanded_size(), 8);
}

#[test]
fn test_wkext_and_linker_directive_comments() {
    let mut bytes = theadr("a.c");
    let mut extdef_body = Vec::new();
    for name in ["_a", "_b"] {
        extdef_body.push(name.len() as u8);
        extdef_body.extend_from_slice(name.as_bytes());
        extdef_body.push(0x00);
    }
    bytes.extend_from_slice(&record(0x8C, &extdef_body));
    bytes.extend_from_slice(&coment(0x80, 0xA8, &[0x01, 0x02]));
    bytes.extend_from_slice(&coment(0x00, 0xFE, b"LGRAPH"));
    bytes.extend_from_slice(&modend());

    let module = round_trip(&bytes);
    assert!(module.warnings.is_empty());
    assert_eq!(module.tables.externs.len(), 2);
}

#[test]
fn test_trailing_garbage_after_modend_is_rejected() {
    let mut bytes = simple_module("a.c");
    bytes.push(0x42);
    assert!(matches!(
        parse_module(&bytes, None),
        Err(OmfError::UnexpectedRecordType { rec_type: 0x42, .. })
    ));
}

#[test]
fn test_trailing_zero_padding_after_modend_is_ignored() {
    let mut bytes = simple_module("a.c");
    bytes.extend_from_slice(&[0u8; 13]);
    assert!(parse_module(&bytes, None).is_ok());
}
