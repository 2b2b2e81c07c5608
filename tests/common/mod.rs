// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! Shared builders for synthetic OMF byte streams.

#![allow(dead_code)]

use omfx::record_checksum;

/// Frame a record with a freshly computed checksum.
pub fn record(rec_type: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![rec_type];
    out.extend_from_slice(&((body.len() + 1) as u16).to_le_bytes());
    out.extend_from_slice(body);
    out.push(record_checksum(rec_type, body));
    out
}

pub fn theadr(name: &str) -> Vec<u8> {
    let mut body = vec![name.len() as u8];
    body.extend_from_slice(name.as_bytes());
    record(0x80, &body)
}

pub fn modend() -> Vec<u8> {
    record(0x8A, &[0x00])
}

pub fn coment(flags: u8, class: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![flags, class];
    body.extend_from_slice(payload);
    record(0x88, &body)
}

pub fn easy_omf_marker() -> Vec<u8> {
    coment(0x80, 0xAA, b"80386")
}

pub fn lnames(names: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    for name in names {
        body.push(name.len() as u8);
        body.extend_from_slice(name.as_bytes());
    }
    record(0x96, &body)
}

/// A 16-bit SEGDEF with one-byte name indices.
pub fn segdef16(acbp: u8, length: u16, name: u8, class: u8, overlay: u8) -> Vec<u8> {
    let mut body = vec![acbp];
    body.extend_from_slice(&length.to_le_bytes());
    body.extend_from_slice(&[name, class, overlay]);
    record(0x98, &body)
}

/// A 16-bit LEDATA with a one-byte segment index.
pub fn ledata16(segment: u8, offset: u16, data: &[u8]) -> Vec<u8> {
    let mut body = vec![segment];
    body.extend_from_slice(&offset.to_le_bytes());
    body.extend_from_slice(data);
    record(0xA0, &body)
}

/// A 16-bit absolute PUBDEF: group 0, segment 0, frame 0.
pub fn pubdef16_absolute(name: &str, offset: u16) -> Vec<u8> {
    let mut body = vec![0x00, 0x00, 0x00, 0x00];
    body.push(name.len() as u8);
    body.extend_from_slice(name.as_bytes());
    body.extend_from_slice(&offset.to_le_bytes());
    body.push(0x00);
    record(0x90, &body)
}

/// A minimal well-formed module.
pub fn simple_module(name: &str) -> Vec<u8> {
    let mut out = theadr(name);
    out.extend_from_slice(&modend());
    out
}

/// Assemble a library: header page, members on page boundaries, end
/// marker padding to a 512-byte boundary, dictionary blocks, and an
/// optional raw extended dictionary.
pub fn build_library(
    page_size: usize,
    modules: &[Vec<u8>],
    dictionary: Option<&omfx::Dictionary>,
    extended: Option<&[u8]>,
) -> Vec<u8> {
    let nblocks = dictionary.map(|d| d.blocks.len()).unwrap_or(0) as u16;

    let mut out = vec![0xF0];
    out.extend_from_slice(&((page_size - 3) as u16).to_le_bytes());
    out.extend_from_slice(&[0u8; 4]); // dictionary offset, patched below
    out.extend_from_slice(&nblocks.to_le_bytes());
    out.push(0x00); // flags
    out.resize(page_size, 0);

    for module in modules {
        let target = out.len().next_multiple_of(page_size);
        out.resize(target, 0);
        out.extend_from_slice(module);
    }

    let after_marker = out.len() + 3;
    let padding = (512 - after_marker % 512) % 512;
    out.push(0xF1);
    out.extend_from_slice(&(padding as u16).to_le_bytes());
    out.resize(out.len() + padding, 0);

    let dict_offset = out.len() as u32;
    out[3..7].copy_from_slice(&dict_offset.to_le_bytes());
    if let Some(dictionary) = dictionary {
        out.extend_from_slice(&dictionary.to_bytes());
    }
    if let Some(extended) = extended {
        out.extend_from_slice(extended);
    }
    out
}
