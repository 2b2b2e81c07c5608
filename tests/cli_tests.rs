// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

mod common;

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use assert_cmd::cargo;
use assert_cmd::prelude::*;
use predicates::prelude::*;

use common::*;
use omfx::Dictionary;

#[inline]
fn omfx_cmd() -> Command {
    Command::new(cargo::cargo_bin!("omfx"))
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("omfx-cli-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

fn write_sample_module(dir: &PathBuf) -> PathBuf {
    let mut bytes = theadr("hello.c");
    bytes.extend_from_slice(&lnames(&["_TEXT", "CODE"]));
    bytes.extend_from_slice(&segdef16(0x28, 0x20, 1, 2, 0));
    bytes.extend_from_slice(&ledata16(1, 0x0000, &[0xB8, 0x00, 0x4C, 0xCD, 0x21]));
    bytes.extend_from_slice(&modend());
    let path = dir.join("HELLO.OBJ");
    fs::write(&path, &bytes).expect("write obj");
    path
}

fn write_sample_library(dir: &PathBuf) -> PathBuf {
    let mut module = theadr("alpha.c");
    module.extend_from_slice(&pubdef16_absolute("ALPHA_SYM", 0x0010));
    module.extend_from_slice(&modend());
    let dictionary = Dictionary::build(&[(b"ALPHA_SYM".to_vec(), 1)]).expect("dictionary");
    let bytes = build_library(64, &[module], Some(&dictionary), None);
    let path = dir.join("SAMPLE.LIB");
    fs::write(&path, &bytes).expect("write lib");
    path
}

#[test]
fn test_no_arguments_prints_help() {
    omfx_cmd()
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains("info"));
}

#[test]
fn test_info_module() {
    let dir = scratch_dir("info-module");
    let obj = write_sample_module(&dir);

    omfx_cmd()
        .arg(&obj)
        .assert()
        .success()
        .stdout(predicate::str::contains("Module : hello.c"))
        .stdout(predicate::str::contains("THEADR"))
        .stdout(predicate::str::contains("SEGDEF"))
        .stdout(predicate::str::contains("LEDATA"))
        .stdout(predicate::str::contains("MODEND"));
}

#[test]
fn test_info_module_with_data_dump() {
    let dir = scratch_dir("info-data");
    let obj = write_sample_module(&dir);

    omfx_cmd()
        .arg("info")
        .arg(&obj)
        .arg("--data")
        .assert()
        .success()
        .stdout(predicate::str::contains("0000: b8 00 4c cd 21"));
}

#[test]
fn test_info_library() {
    let dir = scratch_dir("info-library");
    let lib = write_sample_library(&dir);

    omfx_cmd()
        .arg(&lib)
        .assert()
        .success()
        .stdout(predicate::str::contains("Library : page size 64"))
        .stdout(predicate::str::contains("alpha.c"))
        .stdout(predicate::str::contains("Dictionary : 2 block(s), 1 symbol(s)"));
}

#[test]
fn test_check_clean_module() {
    let dir = scratch_dir("check-clean");
    let obj = write_sample_module(&dir);

    omfx_cmd()
        .arg("check")
        .arg(&obj)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn test_check_bad_checksum_warns_but_passes() {
    let dir = scratch_dir("check-warn");
    let mut bytes = theadr("warn.c");
    let mut broken = lnames(&["CODE"]);
    *broken.last_mut().expect("checksum") ^= 0xFF;
    bytes.extend_from_slice(&broken);
    bytes.extend_from_slice(&modend());
    let path = dir.join("WARN.OBJ");
    fs::write(&path, &bytes).expect("write obj");

    omfx_cmd()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("OK"))
        .stderr(predicate::str::contains("bad checksum"));
}

#[test]
fn test_check_corrupt_module_fails() {
    let dir = scratch_dir("check-fail");
    let path = dir.join("BAD.OBJ");
    // A THEADR frame cut short.
    fs::write(&path, [0x80, 0x09, 0x00, 0x07]).expect("write obj");

    omfx_cmd()
        .arg("check")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("truncated"));
}

#[test]
fn test_dict_lists_symbols() {
    let dir = scratch_dir("dict");
    let lib = write_sample_library(&dir);

    omfx_cmd()
        .arg("dict")
        .arg(&lib)
        .assert()
        .success()
        .stdout(predicate::str::contains("'ALPHA_SYM' -> page 1"));
}

#[test]
fn test_split_extracts_members() {
    let dir = scratch_dir("split");
    let lib = write_sample_library(&dir);

    omfx_cmd()
        .arg("split")
        .arg(&lib)
        .current_dir(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Extracted object file ALPHA.OBJ"));

    let extracted = dir.join("ALPHA.OBJ");
    let module = omfx::io::read_module(&extracted).expect("extracted module parses");
    assert_eq!(module.name().as_deref(), Some("alpha.c"));
}
