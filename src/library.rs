// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! Library container handling.
//!
//! A LIB file is a 0xF0 header record whose length fixes the page size,
//! zero or more page-aligned object modules, a 0xF1 end marker padding
//! to a 512-byte boundary, the hashed symbol dictionary, and an
//! optional 0xF2 extended dictionary.
//!
//! The dictionary is a two-level open-addressed hash: 37 buckets per
//! 512-byte block, a prime number of blocks, and twin delta values for
//! probing buckets within a block and stepping between blocks. The
//! hash, the probe order, and the rule that a block is flagged full the
//! moment an entry fails to fit are reproduced exactly; Microsoft's
//! librarian and linker both depend on the identical visitation order.

use std::fmt;

use crate::{
    detect_variant, dump_module, parse_module_at, put_u16, put_u32, read_frame, record_type,
    skip_module, FileVariant, Module, OmfError, Warning,
};

/// Dictionary blocks are always 512 bytes.
const BLOCK_SIZE: usize = 512;
/// Buckets per dictionary block.
const BUCKETS: usize = 37;
/// First entry slot: buckets plus the free-space byte, in half-words.
const FIRST_SLOT: u8 = 19;

/// Legal dictionary block counts, in growth order.
const BLOCK_PRIMES: &[u16] = &[
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
    97, 101, 103, 107, 109, 113, 127, 131, 137, 139, 149, 151, 157, 163, 167, 173, 179, 181, 191,
    193, 197, 199, 211, 223, 227, 229, 233, 239, 241, 251,
];

/// Decoded 0xF0 library header. The record length itself fixes the page
/// size (`length + 3`); trailing padding is preserved because some
/// producers leave garbage there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibHeader {
    pub dict_offset: u32,
    pub dict_blocks: u16,
    pub flags: u8,
    pub padding: Vec<u8>,
}

impl LibHeader {
    pub fn case_sensitive(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

pub(crate) fn encode_lib_header(header: &LibHeader, out: &mut Vec<u8>) {
    put_u32(out, header.dict_offset);
    put_u16(out, header.dict_blocks);
    out.push(header.flags);
    out.extend_from_slice(&header.padding);
}

/// One member of a library: the page it starts on and the parse result.
/// A failed member keeps its error so the rest of the library stays
/// usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub page: u32,
    pub module: Result<Module, OmfError>,
}

/// A parsed library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    pub page_size: u32,
    pub header: LibHeader,
    /// Body of the 0xF1 end marker (all padding).
    pub end_padding: Vec<u8>,
    pub members: Vec<Member>,
    pub dictionary: Option<Dictionary>,
    pub extended: Option<ExtendedDictionary>,
    pub warnings: Vec<Warning>,
}

impl Library {
    pub fn parse(data: &[u8]) -> Result<Library, OmfError> {
        parse_library(data)
    }

    pub fn dump(&self) -> Result<Vec<u8>, OmfError> {
        dump_library(self)
    }

    pub fn case_sensitive(&self) -> bool {
        self.header.case_sensitive()
    }

    /// The variant shared by every member module, when any parsed.
    pub fn module_variant(&self) -> Option<FileVariant> {
        self.members
            .iter()
            .find_map(|m| m.module.as_ref().ok().map(|module| module.variant))
    }

    /// Look a public symbol up in the dictionary, honoring the header's
    /// case flag. Returns the page number of the defining module.
    pub fn lookup(&self, name: &[u8]) -> Result<Option<u16>, OmfError> {
        match &self.dictionary {
            Some(dictionary) => dictionary.lookup(name, self.case_sensitive()),
            None => Ok(None),
        }
    }

    /// The member starting at the given page, if any.
    pub fn member_at_page(&self, page: u16) -> Option<&Member> {
        self.members.iter().find(|m| m.page == u32::from(page))
    }
}

/// Parse a library from a byte slice.
pub fn parse_library(data: &[u8]) -> Result<Library, OmfError> {
    let FileVariant::Library(page_size) = detect_variant(data)? else {
        return Err(OmfError::InvalidLibraryHeader(
            "first record is not a library header".into(),
        ));
    };

    let header_frame = read_frame(data, 0)?
        .ok_or_else(|| OmfError::Truncated("library header".into()))?;
    let contents = header_frame.contents;
    if contents.len() < 7 {
        return Err(OmfError::InvalidLibraryHeader(
            "header too short for dictionary fields".into(),
        ));
    }
    let header = LibHeader {
        dict_offset: u32::from_le_bytes([contents[0], contents[1], contents[2], contents[3]]),
        dict_blocks: u16::from_le_bytes([contents[4], contents[5]]),
        flags: contents[6],
        padding: contents[7..].to_vec(),
    };

    let mut warnings = Vec::new();
    let mut members = Vec::new();
    let mut module_variant: Option<FileVariant> = None;
    let mut pos = page_size as usize;

    let end_padding = loop {
        while pos < data.len() && data[pos] == 0 {
            pos += 1;
        }
        if pos >= data.len() {
            return Err(OmfError::Truncated("library end marker".into()));
        }
        if data[pos] == record_type::LIBEND {
            // The end marker's length may legally be zero, so it is
            // framed by hand.
            if pos + 3 > data.len() {
                return Err(OmfError::Truncated("library end marker".into()));
            }
            let length = usize::from(u16::from_le_bytes([data[pos + 1], data[pos + 2]]));
            if pos + 3 + length > data.len() {
                return Err(OmfError::Truncated("library end marker".into()));
            }
            break data[pos + 3..pos + 3 + length].to_vec();
        }

        if pos % page_size as usize != 0 {
            warnings.push(Warning::MisalignedModule { offset: pos });
        }
        let page = (pos / page_size as usize) as u32;
        let slice = &data[pos..];
        let parsed = detect_variant(slice).and_then(|variant| {
            if let FileVariant::Library(_) = variant {
                return Err(OmfError::UnexpectedRecordType {
                    rec_type: record_type::LIBHDR,
                    state: "nested library header where a module was expected",
                });
            }
            if let Some(expected) = module_variant {
                if expected != variant {
                    return Err(OmfError::MixedVariantLibrary {
                        expected,
                        found: variant,
                        module: members.len() + 1,
                    });
                }
            } else {
                module_variant = Some(variant);
            }
            parse_module_at(slice, variant)
        });
        match parsed {
            Ok((module, end)) => {
                members.push(Member {
                    page,
                    module: Ok(module),
                });
                pos += end;
            }
            Err(err @ OmfError::MixedVariantLibrary { .. }) => return Err(err),
            Err(err) => {
                // Keep the failure and resynchronize on MODEND so the
                // remaining members still parse.
                let end = skip_module(slice, 0)?;
                members.push(Member {
                    page,
                    module: Err(err),
                });
                pos += end;
            }
        }
    };

    let dictionary = if header.dict_offset != 0 && header.dict_blocks != 0 {
        if !BLOCK_PRIMES.contains(&header.dict_blocks) {
            warnings.push(Warning::CorruptDictionary(format!(
                "block count {} is not a prime in [2, 251]",
                header.dict_blocks
            )));
        }
        parse_dictionary(
            data,
            header.dict_offset as usize,
            header.dict_blocks,
            &mut warnings,
        )
    } else {
        None
    };

    let ext_offset = header.dict_offset as usize + usize::from(header.dict_blocks) * BLOCK_SIZE;
    let extended = if dictionary.is_some() {
        parse_extended_dictionary(data, ext_offset, &mut warnings)?
    } else {
        None
    };

    Ok(Library {
        page_size,
        header,
        end_padding,
        members,
        dictionary,
        extended,
        warnings,
    })
}

/// Render a library back to bytes. Fails if any member failed to parse.
pub fn dump_library(library: &Library) -> Result<Vec<u8>, OmfError> {
    let page_size = library.page_size as usize;
    let mut out = Vec::new();

    out.push(record_type::LIBHDR);
    put_u16(&mut out, (page_size - 3) as u16);
    encode_lib_header(&library.header, &mut out);
    if out.len() < page_size {
        out.resize(page_size, 0);
    }

    for member in &library.members {
        let module = member.module.as_ref().map_err(Clone::clone)?;
        let target = member.page as usize * page_size;
        if target < out.len() {
            return Err(OmfError::InvalidLibraryHeader(format!(
                "module page {} overlaps the previous member",
                member.page
            )));
        }
        out.resize(target, 0);
        out.extend_from_slice(&dump_module(module));
    }

    out.push(record_type::LIBEND);
    put_u16(&mut out, library.end_padding.len() as u16);
    out.extend_from_slice(&library.end_padding);

    if let Some(dictionary) = &library.dictionary {
        let dict_offset = library.header.dict_offset as usize;
        if out.len() < dict_offset {
            out.resize(dict_offset, 0);
        }
        dictionary.encode(&mut out);
        if let Some(extended) = &library.extended {
            extended.encode(&mut out);
        }
    }

    Ok(out)
}

/// One dictionary entry: its bucket, the half-word slot its bytes
/// occupy, the symbol, and the page of the defining module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub bucket: u8,
    pub slot: u8,
    pub name: Vec<u8>,
    pub page: u16,
}

/// One 512-byte dictionary block: 37 bucket slots, a free-space byte
/// (in half-words; 0xFF flags the block full), and the entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryBlock {
    pub free: u8,
    pub entries: Vec<DictionaryEntry>,
}

impl DictionaryBlock {
    fn new() -> DictionaryBlock {
        DictionaryBlock {
            free: FIRST_SLOT,
            entries: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.free == 0xFF
    }

    fn entry_at_bucket(&self, bucket: u8) -> Option<&DictionaryEntry> {
        self.entries.iter().find(|e| e.bucket == bucket)
    }
}

/// The library symbol dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    pub blocks: Vec<DictionaryBlock>,
}

/// Hash state for one symbol: start positions and probe deltas for the
/// block and bucket levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DictHash {
    pub block: usize,
    pub block_delta: usize,
    pub bucket: usize,
    pub bucket_delta: usize,
}

/// The Microsoft LIB symbol hash: two 16-bit accumulators fed from the
/// front of the name and two from the back, every byte ORed with 0x20.
pub(crate) fn dict_hash(name: &[u8], nblocks: usize) -> DictHash {
    let mut block_x: u16 = (name.len() as u16) | 0x20;
    let mut block_d: u16 = 0;
    let mut bucket_x: u16 = 0;
    let mut bucket_d: u16 = block_x;

    let mut front = 0usize;
    let mut back = name.len();
    while back > front {
        back -= 1;
        let c = u16::from(name[back] | 0x20);
        bucket_x = bucket_x.rotate_right(2) ^ c;
        block_d = block_d.rotate_left(2) ^ c;
        if back == front {
            break;
        }
        let c = u16::from(name[front] | 0x20);
        front += 1;
        block_x = block_x.rotate_left(2) ^ c;
        bucket_d = bucket_d.rotate_right(2) ^ c;
    }

    DictHash {
        block: usize::from(block_x) % nblocks,
        block_delta: (usize::from(block_d) % nblocks).max(1),
        bucket: usize::from(bucket_x) % BUCKETS,
        bucket_delta: (usize::from(bucket_d) % BUCKETS).max(1),
    }
}

/// Bytes an entry occupies: count byte, name, page number, padded to a
/// half-word boundary.
fn entry_size(name: &[u8]) -> usize {
    let raw = 1 + name.len() + 2;
    raw + (raw & 1)
}

fn names_equal(a: &[u8], b: &[u8], case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

impl Dictionary {
    /// An empty dictionary with the given number of blocks. The count
    /// must be one of the legal primes.
    pub fn new(blocks: u16) -> Result<Dictionary, OmfError> {
        if !BLOCK_PRIMES.contains(&blocks) {
            return Err(OmfError::CorruptDictionary(format!(
                "block count {blocks} is not a prime in [2, 251]"
            )));
        }
        Ok(Dictionary {
            blocks: (0..blocks).map(|_| DictionaryBlock::new()).collect(),
        })
    }

    /// Build a dictionary sized for the given symbols, growing to the
    /// next legal prime whenever insertion overflows.
    pub fn build(symbols: &[(Vec<u8>, u16)]) -> Result<Dictionary, OmfError> {
        let bytes: usize = symbols.iter().map(|(name, _)| entry_size(name)).sum();
        let minimum = (bytes / (BLOCK_SIZE - BUCKETS - 1) + 1) as u16;

        'grow: for &blocks in BLOCK_PRIMES.iter().filter(|&&p| p >= minimum) {
            let mut dictionary = Dictionary::new(blocks)?;
            for (name, page) in symbols {
                if !dictionary.insert(name, *page)? {
                    continue 'grow;
                }
            }
            return Ok(dictionary);
        }
        Err(OmfError::CorruptDictionary(format!(
            "{} symbols do not fit the largest dictionary",
            symbols.len()
        )))
    }

    /// Look up a symbol, returning the page number of its module.
    ///
    /// The probe discipline is load-bearing: an empty bucket in a
    /// not-full block ends the search; a full block sends it on to the
    /// next block with the block delta.
    pub fn lookup(&self, name: &[u8], case_sensitive: bool) -> Result<Option<u16>, OmfError> {
        let nblocks = self.blocks.len();
        if u16::try_from(nblocks)
            .map(|n| !BLOCK_PRIMES.contains(&n))
            .unwrap_or(true)
        {
            return Err(OmfError::CorruptDictionary(format!(
                "block count {nblocks} is not a prime in [2, 251]"
            )));
        }

        let hash = dict_hash(name, nblocks);
        let mut block_index = hash.block;
        for _ in 0..nblocks {
            let block = &self.blocks[block_index];
            let mut bucket = hash.bucket;
            for _ in 0..BUCKETS {
                match block.entry_at_bucket(bucket as u8) {
                    Some(entry) => {
                        if names_equal(&entry.name, name, case_sensitive) {
                            return Ok(Some(entry.page));
                        }
                    }
                    None => {
                        if !block.is_full() {
                            return Ok(None);
                        }
                        // A full block may have spilled this symbol
                        // into a later one.
                        break;
                    }
                }
                bucket = (bucket + hash.bucket_delta) % BUCKETS;
            }
            block_index = (block_index + hash.block_delta) % nblocks;
        }
        Ok(None)
    }

    /// Insert a symbol. Returns `false` when no block can take it (the
    /// caller rebuilds with more blocks). A block that cannot hold the
    /// entry bytes is flagged full even if a shorter symbol would still
    /// fit; re-insertion during a library build depends on that.
    pub fn insert(&mut self, name: &[u8], page: u16) -> Result<bool, OmfError> {
        let nblocks = self.blocks.len();
        if nblocks == 0 {
            return Ok(false);
        }
        let hash = dict_hash(name, nblocks);
        let size = entry_size(name);

        let mut block_index = hash.block;
        for _ in 0..nblocks {
            let block = &mut self.blocks[block_index];
            if !block.is_full() {
                let mut bucket = hash.bucket;
                let mut empty = None;
                for _ in 0..BUCKETS {
                    if block.entry_at_bucket(bucket as u8).is_none() {
                        empty = Some(bucket as u8);
                        break;
                    }
                    bucket = (bucket + hash.bucket_delta) % BUCKETS;
                }
                if let Some(bucket) = empty {
                    let offset = usize::from(block.free) * 2;
                    if offset + size <= BLOCK_SIZE {
                        let slot = block.free;
                        block.entries.push(DictionaryEntry {
                            bucket,
                            slot,
                            name: name.to_vec(),
                            page,
                        });
                        let next = usize::from(block.free) + size / 2;
                        block.free = if next >= 0xFF { 0xFF } else { next as u8 };
                        return Ok(true);
                    }
                    block.free = 0xFF;
                }
            }
            block_index = (block_index + hash.block_delta) % nblocks;
        }
        Ok(false)
    }

    /// The raw block bytes, `512 * blocks` long.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.blocks.len() * BLOCK_SIZE);
        self.encode(&mut out);
        out
    }

    /// Append the encoded blocks to `out`.
    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        for block in &self.blocks {
            let start = out.len();
            out.resize(start + BLOCK_SIZE, 0);
            let bytes = &mut out[start..start + BLOCK_SIZE];
            bytes[BUCKETS] = block.free;
            for entry in &block.entries {
                bytes[usize::from(entry.bucket)] = entry.slot;
                let offset = usize::from(entry.slot) * 2;
                bytes[offset] = entry.name.len() as u8;
                bytes[offset + 1..offset + 1 + entry.name.len()].copy_from_slice(&entry.name);
                let page_offset = offset + 1 + entry.name.len();
                bytes[page_offset..page_offset + 2].copy_from_slice(&entry.page.to_le_bytes());
            }
        }
    }
}

fn parse_dictionary(
    data: &[u8],
    offset: usize,
    block_count: u16,
    warnings: &mut Vec<Warning>,
) -> Option<Dictionary> {
    let mut blocks = Vec::with_capacity(usize::from(block_count));

    for block_number in 0..usize::from(block_count) {
        let start = offset + block_number * BLOCK_SIZE;
        let Some(bytes) = data.get(start..start + BLOCK_SIZE) else {
            warnings.push(Warning::CorruptDictionary(format!(
                "file ends inside dictionary block {block_number}"
            )));
            break;
        };

        let mut block = DictionaryBlock {
            free: bytes[BUCKETS],
            entries: Vec::new(),
        };
        for bucket in 0..BUCKETS {
            let slot = bytes[bucket];
            if slot == 0 {
                continue;
            }
            let entry_offset = usize::from(slot) * 2;
            if entry_offset < (BUCKETS + 1) || entry_offset >= BLOCK_SIZE {
                warnings.push(Warning::CorruptDictionary(format!(
                    "block {block_number} bucket {bucket} points outside the block"
                )));
                continue;
            }
            let name_len = usize::from(bytes[entry_offset]);
            if name_len == 0 || entry_offset + 1 + name_len + 2 > BLOCK_SIZE {
                warnings.push(Warning::CorruptDictionary(format!(
                    "block {block_number} bucket {bucket} entry overruns the block"
                )));
                continue;
            }
            let name = bytes[entry_offset + 1..entry_offset + 1 + name_len].to_vec();
            let page_offset = entry_offset + 1 + name_len;
            let page = u16::from_le_bytes([bytes[page_offset], bytes[page_offset + 1]]);
            block.entries.push(DictionaryEntry {
                bucket: bucket as u8,
                slot,
                name,
                page,
            });
        }
        blocks.push(block);
    }

    if blocks.is_empty() {
        None
    } else {
        Some(Dictionary { blocks })
    }
}

/// One extended-dictionary entry: a module's page and the offset of its
/// dependency list, relative to the start of the extended dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedEntry {
    pub page: u16,
    pub deps_offset: u16,
}

/// The optional 0xF2 extended dictionary. The dependency payload past
/// the entry table is preserved uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedDictionary {
    /// `module_count + 1` entries; the final one is the terminator.
    pub entries: Vec<ExtendedEntry>,
    pub payload: Vec<u8>,
}

impl ExtendedDictionary {
    pub fn module_count(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(record_type::LIBEXT);
        let length = 2 + 4 * self.entries.len() + self.payload.len();
        put_u16(out, length as u16);
        put_u16(out, self.module_count() as u16);
        for entry in &self.entries {
            put_u16(out, entry.page);
            put_u16(out, entry.deps_offset);
        }
        out.extend_from_slice(&self.payload);
    }
}

fn parse_extended_dictionary(
    data: &[u8],
    offset: usize,
    warnings: &mut Vec<Warning>,
) -> Result<Option<ExtendedDictionary>, OmfError> {
    if offset >= data.len() || data[offset] != record_type::LIBEXT {
        return Ok(None);
    }
    if offset + 3 > data.len() {
        return Err(OmfError::Truncated("extended dictionary header".into()));
    }
    let length = usize::from(u16::from_le_bytes([data[offset + 1], data[offset + 2]]));
    let Some(body) = data.get(offset + 3..offset + 3 + length) else {
        return Err(OmfError::Truncated("extended dictionary".into()));
    };
    if body.len() < 2 {
        warnings.push(Warning::CorruptDictionary(
            "extended dictionary too short for a module count".into(),
        ));
        return Ok(None);
    }

    let module_count = usize::from(u16::from_le_bytes([body[0], body[1]]));
    let table_len = (module_count + 1) * 4;
    if 2 + table_len > body.len() {
        warnings.push(Warning::CorruptDictionary(
            "extended dictionary entry table overruns the record".into(),
        ));
        return Ok(None);
    }

    let mut entries = Vec::with_capacity(module_count + 1);
    for chunk in body[2..2 + table_len].chunks_exact(4) {
        entries.push(ExtendedEntry {
            page: u16::from_le_bytes([chunk[0], chunk[1]]),
            deps_offset: u16::from_le_bytes([chunk[2], chunk[3]]),
        });
    }

    Ok(Some(ExtendedDictionary {
        entries,
        payload: body[2 + table_len..].to_vec(),
    }))
}

impl fmt::Display for Library {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        crate::display::DisplayWithOptions::fmt_with_options(
            self,
            f,
            &crate::display::Options::default(),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_hash_single_character() {
        let hash = dict_hash(b"A", 7);
        assert_eq!(hash.block, 5);
        assert_eq!(hash.block_delta, 6);
        assert_eq!(hash.bucket, 23);
        assert_eq!(hash.bucket_delta, 33);
    }

    #[test]
    fn test_hash_two_characters_delta_floor() {
        // block_d for "AB" is 0x62 = 98, and 98 % 7 == 0, so the delta
        // clamps to 1.
        let hash = dict_hash(b"AB", 7);
        assert_eq!(hash.block, 2);
        assert_eq!(hash.block_delta, 1);
        assert_eq!(hash.bucket, 24);
        assert_eq!(hash.bucket_delta, 17);
    }

    #[test]
    fn test_hash_case_folding() {
        assert_eq!(dict_hash(b"strcpy", 37), dict_hash(b"STRCPY", 37));
    }

    #[test]
    fn test_insert_then_lookup() {
        let names: Vec<Vec<u8>> = (0..80)
            .map(|i| format!("_symbol{i}").into_bytes())
            .collect();
        let mut dictionary = Dictionary::new(3).expect("dictionary");
        let mut inserted = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if dictionary.insert(name, (i + 1) as u16).expect("insert") {
                inserted.push((name.clone(), (i + 1) as u16));
            }
        }
        assert!(!inserted.is_empty());
        for (name, page) in &inserted {
            assert_eq!(
                dictionary.lookup(name, false).expect("lookup"),
                Some(*page),
                "{}",
                String::from_utf8_lossy(name)
            );
        }
        assert_eq!(dictionary.lookup(b"_absent", false).expect("lookup"), None);
    }

    #[test]
    fn test_build_grows_to_fit() {
        let symbols: Vec<(Vec<u8>, u16)> = (0..400)
            .map(|i| (format!("PublicSymbolWithALongName{i}").into_bytes(), i as u16))
            .collect();
        let dictionary = Dictionary::build(&symbols).expect("build");
        assert!(BLOCK_PRIMES.contains(&(dictionary.blocks.len() as u16)));
        for (name, page) in &symbols {
            assert_eq!(dictionary.lookup(name, false).expect("lookup"), Some(*page));
        }
    }

    #[test]
    fn test_case_sensitive_lookup() {
        let mut dictionary = Dictionary::new(2).expect("dictionary");
        assert!(dictionary.insert(b"Symbol", 4).expect("insert"));
        // The hash folds case either way; only the final comparison
        // differs.
        assert_eq!(dictionary.lookup(b"SYMBOL", false).expect("l"), Some(4));
        assert_eq!(dictionary.lookup(b"SYMBOL", true).expect("l"), None);
        assert_eq!(dictionary.lookup(b"Symbol", true).expect("l"), Some(4));
    }

    #[test]
    fn test_full_block_spills_to_next() {
        let mut dictionary = Dictionary::new(2).expect("dictionary");
        // A block takes (512 - 38) / 2 = 237 half-words; entries of 16
        // half-words each fill one after ~15 inserts.
        let mut stored = Vec::new();
        for i in 0..60 {
            let name = format!("spill_test_symbol_number_{i:03}").into_bytes();
            if dictionary.insert(&name, i).expect("insert") {
                stored.push((name, i));
            }
        }
        let full_blocks = dictionary.blocks.iter().filter(|b| b.is_full()).count();
        assert!(full_blocks >= 1, "expected at least one full block");
        for (name, page) in &stored {
            assert_eq!(dictionary.lookup(name, false).expect("lookup"), Some(*page));
        }
    }

    #[test]
    fn test_dictionary_encode_parse_round_trip() {
        let mut dictionary = Dictionary::new(2).expect("dictionary");
        for (name, page) in [(&b"alpha"[..], 1u16), (&b"beta"[..], 2), (&b"gamma"[..], 3)] {
            assert!(dictionary.insert(name, page).expect("insert"));
        }
        let mut bytes = Vec::new();
        dictionary.encode(&mut bytes);
        assert_eq!(bytes.len(), 2 * BLOCK_SIZE);

        let mut warnings = Vec::new();
        let parsed = parse_dictionary(&bytes, 0, 2, &mut warnings).expect("dictionary");
        assert!(warnings.is_empty());
        assert_eq!(parsed.lookup(b"beta", false).expect("lookup"), Some(2));

        let mut again = Vec::new();
        parsed.encode(&mut again);
        assert_eq!(bytes, again);
    }

    #[test]
    fn test_lookup_rejects_nonprime_block_count() {
        let dictionary = Dictionary {
            blocks: (0..4).map(|_| DictionaryBlock::new()).collect(),
        };
        assert!(matches!(
            dictionary.lookup(b"x", false),
            Err(OmfError::CorruptDictionary(_))
        ));
    }

    #[test]
    fn test_extended_dictionary_round_trip() {
        let extended = ExtendedDictionary {
            entries: vec![
                ExtendedEntry {
                    page: 1,
                    deps_offset: 11,
                },
                ExtendedEntry {
                    page: 3,
                    deps_offset: 15,
                },
                ExtendedEntry {
                    page: 0,
                    deps_offset: 0,
                },
            ],
            payload: vec![0xAB, 0xCD],
        };
        let mut bytes = Vec::new();
        extended.encode(&mut bytes);

        let mut warnings = Vec::new();
        let parsed = parse_extended_dictionary(&bytes, 0, &mut warnings)
            .expect("parse")
            .expect("present");
        assert!(warnings.is_empty());
        assert_eq!(parsed, extended);
        assert_eq!(parsed.module_count(), 2);
    }
}
