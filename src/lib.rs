// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! TIS OMF Object Module and Library Parser
//!
//! This crate provides parsing and manipulation capabilities for the
//! Relocatable Object Module Format (OMF) used by 8086/80286/80386 object
//! files and static libraries, per the TIS OMF 1.1 specification plus the
//! recognized vendor extensions (Microsoft, Watcom, PharLap Easy OMF-386,
//! IBM, Borland, Intel).
//!
//! # Overview
//!
//! OMF was the object format of the DOS era, produced by MASM, TASM,
//! Watcom C, Borland C++, and many others. Two kinds of files share the
//! encoding:
//!
//! - **OBJ files**: a single module, a sequence of typed records
//! - **LIB files**: page-aligned modules plus a hashed symbol dictionary
//!
//! # Quick Start
//!
//! Reading an object module:
//!
//! ```no_run
//! use std::path::Path;
//! use omfx::io;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let module = io::read_module(Path::new("HELLO.OBJ"))?;
//!
//!     println!("Module: {}", module.name().unwrap_or_default());
//!     for record in &module.records {
//!         println!("{}", record);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Reading either a LIB or OBJ file:
//!
//! ```no_run
//! use std::path::Path;
//! use omfx::io;
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let lib_or_obj = io::read(Path::new("GRAPH.LIB"))?;
//!     println!("{}", lib_or_obj);
//!     Ok(())
//! }
//! ```
//!
//! # File Format Details
//!
//! ## Record framing
//!
//! Every record is framed the same way:
//!
//! | Offset | Type    | Description                               |
//! |--------|---------|-------------------------------------------|
//! | 0      | `u8`    | Record type (LSB selects 16/32-bit form)  |
//! | 1      | `u16`   | Record length (body plus checksum byte)   |
//! | 3      | `[u8]`  | Record body                               |
//! | 3+n    | `u8`    | Checksum (sum of all bytes is 0 mod 256)  |
//!
//! Many real-world producers write a zero checksum instead of computing
//! one; both forms are accepted.
//!
//! ## LIB format
//!
//! | Offset   | Type       | Description                             |
//! |----------|------------|-----------------------------------------|
//! | 0        | `0xF0` rec | Library header; page size = length + 3  |
//! | page * n | `[Record]` | Modules, each starting on a page        |
//! | ...      | `0xF1` rec | End marker, pads to a 512-byte boundary |
//! | dict     | blocks     | Two-level hashed symbol dictionary      |
//! | ...      | `0xF2` rec | Optional extended dictionary            |
//!
//! # Variants
//!
//! The same record stream is interpreted differently by dialect: PharLap
//! Easy OMF-386 widens every offset field to 32 bits and narrows LIDATA
//! repeat counts back to 16, so the dialect is detected up front (see
//! [`detect_variant`]) and applied uniformly while parsing.

use std::fmt;

use binrw::io::{Read, Seek};
use binrw::{BinRead, BinReaderExt, BinResult, Endian};
use thiserror::Error;

use crate::coment::Coment;
use crate::fixup::{Fixupp, ThreadState};
use crate::records::{
    AliasList, BakPat, ComDat, ComdatExterns, CommunalNames, ExternNames, GrpDef, LeData, LiData,
    LineNumbers, LineSymbols, ModEnd, ModuleHeader, NameList, NbkPat, Opaque, PublicNames, SegDef,
    VendExt, VerNum,
};

pub mod coment;
pub mod display;
pub mod fixup;
pub mod io;
pub mod library;
pub mod records;

pub use library::{dump_library, parse_library, Dictionary, Library, Member};

/// OMF record type identifiers.
pub mod record_type {
    /// Translator Header Record
    pub const THEADR: u8 = 0x80;
    /// Library Module Header Record
    pub const LHEADR: u8 = 0x82;
    /// Comment Record
    pub const COMENT: u8 = 0x88;
    /// Module End Record
    pub const MODEND: u8 = 0x8A;
    /// Module End Record (32-bit)
    pub const MODEND32: u8 = 0x8B;
    /// External Names Definition Record
    pub const EXTDEF: u8 = 0x8C;
    /// Public Names Definition Record
    pub const PUBDEF: u8 = 0x90;
    /// Public Names Definition Record (32-bit)
    pub const PUBDEF32: u8 = 0x91;
    /// Line Numbers Record
    pub const LINNUM: u8 = 0x94;
    /// Line Numbers Record (32-bit)
    pub const LINNUM32: u8 = 0x95;
    /// List of Names Record
    pub const LNAMES: u8 = 0x96;
    /// Segment Definition Record
    pub const SEGDEF: u8 = 0x98;
    /// Segment Definition Record (32-bit)
    pub const SEGDEF32: u8 = 0x99;
    /// Group Definition Record
    pub const GRPDEF: u8 = 0x9A;
    /// Fixup Record
    pub const FIXUPP: u8 = 0x9C;
    /// Fixup Record (32-bit)
    pub const FIXUPP32: u8 = 0x9D;
    /// Logical Enumerated Data Record
    pub const LEDATA: u8 = 0xA0;
    /// Logical Enumerated Data Record (32-bit)
    pub const LEDATA32: u8 = 0xA1;
    /// Logical Iterated Data Record
    pub const LIDATA: u8 = 0xA2;
    /// Logical Iterated Data Record (32-bit)
    pub const LIDATA32: u8 = 0xA3;
    /// Communal Names Definition Record
    pub const COMDEF: u8 = 0xB0;
    /// Backpatch Record
    pub const BAKPAT: u8 = 0xB2;
    /// Backpatch Record (32-bit)
    pub const BAKPAT32: u8 = 0xB3;
    /// Local External Names Definition Record
    pub const LEXTDEF: u8 = 0xB4;
    /// Local External Names Definition Record (32-bit)
    pub const LEXTDEF32: u8 = 0xB5;
    /// Local Public Names Definition Record
    pub const LPUBDEF: u8 = 0xB6;
    /// Local Public Names Definition Record (32-bit)
    pub const LPUBDEF32: u8 = 0xB7;
    /// Local Communal Names Definition Record
    pub const LCOMDEF: u8 = 0xB8;
    /// COMDAT External Names Definition Record
    pub const CEXTDEF: u8 = 0xBC;
    /// Initialized Communal Data Record
    pub const COMDAT: u8 = 0xC2;
    /// Initialized Communal Data Record (32-bit)
    pub const COMDAT32: u8 = 0xC3;
    /// Symbol Line Numbers Record
    pub const LINSYM: u8 = 0xC4;
    /// Symbol Line Numbers Record (32-bit)
    pub const LINSYM32: u8 = 0xC5;
    /// Alias Definition Record
    pub const ALIAS: u8 = 0xC6;
    /// Named Backpatch Record
    pub const NBKPAT: u8 = 0xC8;
    /// Named Backpatch Record (32-bit)
    pub const NBKPAT32: u8 = 0xC9;
    /// Local Logical Names Definition Record
    pub const LLNAMES: u8 = 0xCA;
    /// OMF Version Number Record
    pub const VERNUM: u8 = 0xCC;
    /// Vendor-specific OMF Extension Record
    pub const VENDEXT: u8 = 0xCE;
    /// Library Header Record
    pub const LIBHDR: u8 = 0xF0;
    /// Library End Record
    pub const LIBEND: u8 = 0xF1;
    /// Extended Dictionary Record
    pub const LIBEXT: u8 = 0xF2;

    /// Obsolete record types recognized by type byte only. Their bodies
    /// are preserved verbatim rather than interpreted.
    pub const OBSOLETE: &[u8] = &[
        0x6E, // RHEADR
        0x70, // REGINT
        0x72, // REDATA
        0x74, // RIDATA
        0x76, // OVLDEF
        0x78, // ENDREC
        0x7A, // BLKDEF
        0x7C, // BLKEND
        0x7E, // DEBSYM
        0x84, // PEDATA
        0x86, // PIDATA
        0x8E, // TYPDEF
        0x92, // LOCSYM
        0xA4, // LIBHED (obsolete Intel library)
        0xA6, // LIBNAM
        0xA8, // LIBLOC
        0xAA, // LIBDIC
    ];

    /// Human-readable name for a record type byte.
    pub fn name(rec_type: u8) -> &'static str {
        match rec_type {
            THEADR => "THEADR",
            LHEADR => "LHEADR",
            COMENT => "COMENT",
            MODEND => "MODEND",
            MODEND32 => "MODEND32",
            EXTDEF => "EXTDEF",
            PUBDEF => "PUBDEF",
            PUBDEF32 => "PUBDEF32",
            LINNUM => "LINNUM",
            LINNUM32 => "LINNUM32",
            LNAMES => "LNAMES",
            SEGDEF => "SEGDEF",
            SEGDEF32 => "SEGDEF32",
            GRPDEF => "GRPDEF",
            FIXUPP => "FIXUPP",
            FIXUPP32 => "FIXUPP32",
            LEDATA => "LEDATA",
            LEDATA32 => "LEDATA32",
            LIDATA => "LIDATA",
            LIDATA32 => "LIDATA32",
            COMDEF => "COMDEF",
            BAKPAT => "BAKPAT",
            BAKPAT32 => "BAKPAT32",
            LEXTDEF => "LEXTDEF",
            LEXTDEF32 => "LEXTDEF32",
            LPUBDEF => "LPUBDEF",
            LPUBDEF32 => "LPUBDEF32",
            LCOMDEF => "LCOMDEF",
            CEXTDEF => "CEXTDEF",
            COMDAT => "COMDAT",
            COMDAT32 => "COMDAT32",
            LINSYM => "LINSYM",
            LINSYM32 => "LINSYM32",
            ALIAS => "ALIAS",
            NBKPAT => "NBKPAT",
            NBKPAT32 => "NBKPAT32",
            LLNAMES => "LLNAMES",
            VERNUM => "VERNUM",
            VENDEXT => "VENDEXT",
            LIBHDR => "LIBHDR",
            LIBEND => "LIBEND",
            LIBEXT => "LIBEXT",
            0x6E => "RHEADR",
            0x70 => "REGINT",
            0x72 => "REDATA",
            0x74 => "RIDATA",
            0x76 => "OVLDEF",
            0x78 => "ENDREC",
            0x7A => "BLKDEF",
            0x7C => "BLKEND",
            0x7E => "DEBSYM",
            0x84 => "PEDATA",
            0x86 => "PIDATA",
            0x8E => "TYPDEF",
            0x92 => "LOCSYM",
            0xA4 => "LIBHED",
            0xA6 => "LIBNAM",
            0xA8 => "LIBLOC",
            0xAA => "LIBDIC",
            _ => "UNKNOWN",
        }
    }
}

/// The dialect a file is encoded in, detected once per file and applied
/// uniformly while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileVariant {
    /// Baseline TIS OMF-86/286/386.
    TisOmf86,
    /// PharLap Easy OMF-386: 32-bit offsets everywhere, 16-bit LIDATA
    /// repeat counts, an extra SEGDEF access byte, reassigned Location
    /// codes 5 and 6.
    EasyOmf386,
    /// TIS OMF carrying Microsoft symbol-and-type debug records.
    OmfWithMsExt,
    /// A library container with the given page size.
    Library(u32),
}

impl FileVariant {
    /// Width of offset/length/displacement fields for a record whose
    /// type byte has the given LSB.
    pub(crate) fn offset_width(self, is32: bool) -> Width {
        match (self, is32) {
            (FileVariant::EasyOmf386, _) => Width::Dword,
            (_, true) => Width::Dword,
            (_, false) => Width::Word,
        }
    }

    /// Width of LIDATA repeat-count fields. PharLap kept these 16-bit
    /// even in 32-bit records.
    pub(crate) fn repeat_width(self, is32: bool) -> Width {
        match (self, is32) {
            (FileVariant::EasyOmf386, _) => Width::Word,
            (_, true) => Width::Dword,
            (_, false) => Width::Word,
        }
    }

    pub(crate) fn has_segdef_access_byte(self) -> bool {
        matches!(self, FileVariant::EasyOmf386)
    }
}

impl fmt::Display for FileVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::TisOmf86 => write!(f, "TIS OMF-86"),
            Self::EasyOmf386 => write!(f, "PharLap Easy OMF-386"),
            Self::OmfWithMsExt => write!(f, "OMF with Microsoft extensions"),
            Self::Library(page) => write!(f, "library (page size {page})"),
        }
    }
}

/// Field width selector for the 16/32-bit dual record forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Width {
    Word,
    Dword,
}

pub(crate) fn read_scalar<R: Read + Seek>(reader: &mut R, width: Width) -> BinResult<u32> {
    match width {
        Width::Word => Ok(u32::from(reader.read_le::<u16>()?)),
        Width::Dword => reader.read_le::<u32>(),
    }
}

pub(crate) fn put_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_scalar(out: &mut Vec<u8>, width: Width, value: u32) {
    match width {
        Width::Word => put_u16(out, value as u16),
        Width::Dword => put_u32(out, value),
    }
}

/// An OMF index field: one byte on the wire when below 0x80, otherwise
/// two. Zero means "not specified". Values never exceed 0x7FFF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index(u16);

impl Index {
    /// The "not specified" sentinel.
    pub const NONE: Index = Index(0);

    pub fn value(self) -> u16 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn from_raw(value: u16) -> Index {
        Index(value & 0x7FFF)
    }

    pub(crate) fn encode(self, out: &mut Vec<u8>) {
        if self.0 < 0x80 {
            out.push(self.0 as u8);
        } else {
            out.push(0x80 | (self.0 >> 8) as u8);
            out.push(self.0 as u8);
        }
    }
}

impl TryFrom<u16> for Index {
    type Error = OmfError;

    fn try_from(value: u16) -> Result<Self, OmfError> {
        if value > 0x7FFF {
            Err(OmfError::IndexOverflow(value))
        } else {
            Ok(Index(value))
        }
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl BinRead for Index {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let b0 = u8::read_options(reader, endian, ())?;
        if b0 & 0x80 == 0 {
            Ok(Index(u16::from(b0)))
        } else {
            // Bit 7 of the first byte is the length flag; masking it
            // off keeps the value inside [0, 0x7FFF].
            let b1 = u8::read_options(reader, endian, ())?;
            Ok(Index::from_raw((u16::from(b0) << 8) | u16::from(b1)))
        }
    }
}

/// A length-prefixed name: one count byte followed by that many bytes.
/// A zero count is legal and distinct from "absent". The bytes are never
/// interpreted; the character set is the producer's business.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Name(Vec<u8>);

impl Name {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Name {
        let mut bytes = bytes.into();
        bytes.truncate(u8::MAX.into());
        Name(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.0.len() as u8);
        out.extend_from_slice(&self.0);
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        String::from_utf8_lossy(&self.0).fmt(f)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Name {
        Name::new(s.as_bytes().to_vec())
    }
}

impl BinRead for Name {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: Self::Args<'_>,
    ) -> BinResult<Self> {
        let count = u8::read_options(reader, endian, ())?;
        let mut bytes = vec![0u8; usize::from(count)];
        reader.read_exact(&mut bytes)?;
        Ok(Name(bytes))
    }
}

/// Compute the checksum byte for a record so the sum of all record
/// bytes, checksum included, is 0 modulo 256.
pub fn record_checksum(rec_type: u8, body: &[u8]) -> u8 {
    let length = (body.len() + 1) as u16;
    let mut sum = rec_type
        .wrapping_add(length as u8)
        .wrapping_add((length >> 8) as u8);
    for &b in body {
        sum = sum.wrapping_add(b);
    }
    sum.wrapping_neg()
}

/// Verify the checksum of a complete framed record.
///
/// Some producers write 0 rather than computing the checksum; that is
/// accepted as valid.
pub fn verify_checksum(record: &[u8]) -> bool {
    let checksum = record.last().copied().unwrap_or(0);
    checksum == 0 || record.iter().copied().fold(0u8, u8::wrapping_add) == 0
}

/// The table a dangling index was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Name,
    Segment,
    Group,
    Extern,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Segment => write!(f, "segment"),
            Self::Group => write!(f, "group"),
            Self::Extern => write!(f, "external"),
        }
    }
}

/// Fatal parse errors. Anything recoverable is a [`Warning`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OmfError {
    #[error("input truncated while reading {0}")]
    Truncated(String),

    #[error("unexpected record type {rec_type:#04x}: {state}")]
    UnexpectedRecordType { rec_type: u8, state: &'static str },

    #[error("index value {0:#x} exceeds the OMF maximum of 0x7FFF")]
    IndexOverflow(u16),

    #[error("malformed FIXUPP subrecord at offset {offset:#x}")]
    MalformedFixupp { offset: usize },

    #[error("{kind} index {value} out of range (table has {max} entries)")]
    DanglingIndex {
        kind: IndexKind,
        value: u16,
        max: usize,
    },

    #[error("library mixes variants: module {module} is {found}, earlier modules are {expected}")]
    MixedVariantLibrary {
        expected: FileVariant,
        found: FileVariant,
        module: usize,
    },

    #[error("invalid library header: {0}")]
    InvalidLibraryHeader(String),

    #[error("corrupt library dictionary: {0}")]
    CorruptDictionary(String),
}

/// Recoverable diagnostics collected alongside the parsed output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error("record type {rec_type:#04x} at offset {offset:#x} has a bad checksum")]
    BadChecksum { rec_type: u8, offset: usize },

    #[error("record type {rec_type:#04x} length {length} exceeds the 1024-byte limit")]
    OversizedRecord { rec_type: u8, length: u16 },

    #[error("unknown subtype {subtype:#04x} in comment class {class:#04x}; bytes preserved")]
    UnknownCommentSubtype { class: u8, subtype: u8 },

    #[error("unsupported group component type {tag:#04x}; preserved")]
    UnsupportedGroupComponent { tag: u8 },

    #[error("reserved bits nonzero in record type {rec_type:#04x}")]
    ReservedBitsNonzero { rec_type: u8 },

    #[error("{count} undecoded trailing byte(s) in record type {rec_type:#04x}")]
    TrailingBytes { rec_type: u8, count: usize },

    #[error("FIXUP references undefined thread {number} (frame thread: {is_frame})")]
    UndefinedThread { is_frame: bool, number: u8 },

    #[error("corrupt library dictionary: {0}")]
    CorruptDictionary(String),

    #[error("library module at offset {offset:#x} does not start on a page boundary")]
    MisalignedModule { offset: usize },
}

/// The four module-scoped ordered tables, 1-indexed, append-only,
/// populated in file order by the defining records. Index 0 means "not
/// present", matching the wire sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tables {
    /// LNAMES/LLNAMES entries.
    pub names: Vec<Name>,
    /// One entry per SEGDEF, in definition order.
    pub segments: Vec<SegmentEntry>,
    /// GRPDEF name indices, in definition order.
    pub groups: Vec<Index>,
    /// External names from EXTDEF, COMDEF, LEXTDEF, LCOMDEF, and
    /// CEXTDEF, in file order.
    pub externs: Vec<Name>,
}

/// Summary of one logical segment for cross-record index resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    pub name: Index,
    pub class: Index,
}

impl Tables {
    /// Resolve a 1-based name index.
    pub fn name(&self, index: Index) -> Option<&Name> {
        self.names.get(usize::from(index.value()).checked_sub(1)?)
    }

    /// Resolve a 1-based segment index to its name.
    pub fn segment_name(&self, index: Index) -> Option<&Name> {
        let entry = self
            .segments
            .get(usize::from(index.value()).checked_sub(1)?)?;
        self.name(entry.name)
    }

    /// Resolve a 1-based group index to its name.
    pub fn group_name(&self, index: Index) -> Option<&Name> {
        let name = self.groups.get(usize::from(index.value()).checked_sub(1)?)?;
        self.name(*name)
    }

    /// Resolve a 1-based external-name index.
    pub fn extern_name(&self, index: Index) -> Option<&Name> {
        self.externs.get(usize::from(index.value()).checked_sub(1)?)
    }

    /// Enforce that a reference resolves to an already-defined entry.
    /// Zero is "not specified" and always passes.
    pub(crate) fn check(&self, kind: IndexKind, index: Index) -> Result<(), OmfError> {
        let max = match kind {
            IndexKind::Name => self.names.len(),
            IndexKind::Segment => self.segments.len(),
            IndexKind::Group => self.groups.len(),
            IndexKind::Extern => self.externs.len(),
        };
        if index.is_none() || usize::from(index.value()) <= max {
            Ok(())
        } else {
            Err(OmfError::DanglingIndex {
                kind,
                value: index.value(),
                max,
            })
        }
    }
}

/// One fully decoded record plus the envelope facts needed for
/// byte-exact reproduction: the exact type byte, the original length,
/// and the raw stored checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub rec_type: u8,
    /// Original record length field (body plus checksum byte).
    pub length: u16,
    /// The checksum byte as stored; re-emitted verbatim on dump.
    pub checksum: u8,
    pub body: RecordBody,
}

impl Record {
    /// Whether the record type byte's LSB selects the 32-bit form.
    pub fn is_32bit(&self) -> bool {
        self.rec_type & 1 != 0
    }

    pub fn type_name(&self) -> &'static str {
        record_type::name(self.rec_type)
    }

    /// Build a record with a freshly computed, valid checksum.
    pub fn with_checksum(rec_type: u8, body: RecordBody, variant: FileVariant) -> Record {
        let encoded = records::encode_body(rec_type, &body, variant);
        let checksum = record_checksum(rec_type, &encoded);
        Record {
            rec_type,
            length: (encoded.len() + 1) as u16,
            checksum,
            body,
        }
    }

    /// Append the framed record to `out`.
    pub(crate) fn encode(&self, variant: FileVariant, out: &mut Vec<u8>) {
        let body = records::encode_body(self.rec_type, &self.body, variant);
        out.push(self.rec_type);
        put_u16(out, (body.len() + 1) as u16);
        out.extend_from_slice(&body);
        out.push(self.checksum);
    }
}

/// Tagged union over every record kind. The 16- and 32-bit dual forms
/// share a variant; the envelope's type byte keeps them apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordBody {
    /// THEADR (0x80)
    Theadr(ModuleHeader),
    /// LHEADR (0x82)
    Lheadr(ModuleHeader),
    /// COMENT (0x88)
    Coment(Coment),
    /// MODEND (0x8A/0x8B)
    ModEnd(ModEnd),
    /// EXTDEF (0x8C)
    ExtDef(ExternNames),
    /// PUBDEF (0x90/0x91)
    PubDef(PublicNames),
    /// LINNUM (0x94/0x95)
    LinNum(LineNumbers),
    /// LNAMES (0x96)
    LNames(NameList),
    /// SEGDEF (0x98/0x99)
    SegDef(SegDef),
    /// GRPDEF (0x9A)
    GrpDef(GrpDef),
    /// FIXUPP (0x9C/0x9D)
    Fixupp(Fixupp),
    /// LEDATA (0xA0/0xA1)
    LeData(LeData),
    /// LIDATA (0xA2/0xA3)
    LiData(LiData),
    /// COMDEF (0xB0)
    ComDef(CommunalNames),
    /// BAKPAT (0xB2/0xB3)
    BakPat(BakPat),
    /// LEXTDEF (0xB4/0xB5)
    LExtDef(ExternNames),
    /// LPUBDEF (0xB6/0xB7)
    LPubDef(PublicNames),
    /// LCOMDEF (0xB8)
    LComDef(CommunalNames),
    /// CEXTDEF (0xBC)
    CExtDef(ComdatExterns),
    /// COMDAT (0xC2/0xC3)
    ComDat(ComDat),
    /// LINSYM (0xC4/0xC5)
    LinSym(LineSymbols),
    /// ALIAS (0xC6)
    Alias(AliasList),
    /// NBKPAT (0xC8/0xC9)
    NbkPat(NbkPat),
    /// LLNAMES (0xCA)
    LlNames(NameList),
    /// VERNUM (0xCC)
    VerNum(VerNum),
    /// VENDEXT (0xCE)
    VendExt(VendExt),
    /// An obsolete record type, preserved verbatim.
    Obsolete(Opaque),
    /// An unrecognized record type, preserved verbatim.
    Unknown(Opaque),
}

/// A parsed object module: the record sequence from THEADR/LHEADR to
/// MODEND, the four frozen tables, and any recoverable diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub variant: FileVariant,
    pub records: Vec<Record>,
    pub tables: Tables,
    pub warnings: Vec<Warning>,
}

impl Module {
    /// Parse a single module from a byte slice, detecting the variant.
    pub fn parse(data: &[u8]) -> Result<Module, OmfError> {
        parse_module(data, None)
    }

    /// Render the module back to bytes. Byte-exact for well-formed
    /// input; canonical otherwise.
    pub fn dump(&self) -> Vec<u8> {
        dump_module(self)
    }

    /// The THEADR/LHEADR module name.
    pub fn name(&self) -> Option<String> {
        self.records.iter().find_map(|r| match &r.body {
            RecordBody::Theadr(h) | RecordBody::Lheadr(h) => Some(h.name.to_string()),
            _ => None,
        })
    }

    /// Names this module makes visible to a librarian: PUBDEF publics,
    /// COMDEF communals, ALIAS aliases, and COMDAT symbols.
    pub fn public_names(&self) -> Vec<Name> {
        let mut names = Vec::new();
        for record in &self.records {
            match &record.body {
                RecordBody::PubDef(p) => {
                    names.extend(p.publics.iter().map(|s| s.name.clone()));
                }
                RecordBody::ComDef(c) => {
                    names.extend(c.communals.iter().map(|c| c.name.clone()));
                }
                RecordBody::Alias(a) => {
                    names.extend(a.aliases.iter().map(|a| a.alias.clone()));
                }
                RecordBody::ComDat(c) => {
                    if !c.is_continuation() {
                        if let Some(name) = self.tables.name(c.name) {
                            names.push(name.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        names
    }
}

/// One framed record: type, declared length, and the raw contents
/// (checksum byte included for checksummed record types).
pub(crate) struct Frame<'a> {
    pub offset: usize,
    pub rec_type: u8,
    pub length: u16,
    pub contents: &'a [u8],
    pub end: usize,
}

pub(crate) fn read_frame(data: &[u8], pos: usize) -> Result<Option<Frame<'_>>, OmfError> {
    if pos >= data.len() {
        return Ok(None);
    }
    if pos + 3 > data.len() {
        return Err(OmfError::Truncated(format!(
            "record header at offset {pos:#x}"
        )));
    }
    let rec_type = data[pos];
    let length = u16::from_le_bytes([data[pos + 1], data[pos + 2]]);
    if length == 0 {
        return Err(OmfError::Truncated(format!(
            "zero-length record at offset {pos:#x}"
        )));
    }
    let end = pos + 3 + usize::from(length);
    if end > data.len() {
        return Err(OmfError::Truncated(format!(
            "{} record at offset {pos:#x}",
            record_type::name(rec_type)
        )));
    }
    Ok(Some(Frame {
        offset: pos,
        rec_type,
        length,
        contents: &data[pos + 3..end],
        end,
    }))
}

/// Record types allowed to exceed the 1024-byte limit.
fn may_exceed_limit(rec_type: u8) -> bool {
    matches!(
        rec_type,
        record_type::LEDATA
            | record_type::LEDATA32
            | record_type::LIDATA
            | record_type::LIDATA32
            | record_type::COMDAT
            | record_type::COMDAT32
            | record_type::LIBHDR
            | record_type::LIBEND
    )
}

/// Pre-scan the leading records of a file and decide its dialect
/// without decoding record bodies.
///
/// Detection rules, applied in order:
///
/// 1. a first byte of 0xF0 means a library; the page size is the
///    header record length plus 3 and must be a power of two in
///    `[16, 32768]`
/// 2. THEADR/LHEADR followed immediately by a COMENT of class 0xAA
///    with payload `"80386"` means PharLap Easy OMF-386
/// 3. any COMENT of class 0xA1 before the Link Pass Separator means
///    Microsoft symbol-and-type extensions
/// 4. otherwise baseline TIS OMF-86
pub fn detect_variant(data: &[u8]) -> Result<FileVariant, OmfError> {
    let first = read_frame(data, 0)?.ok_or_else(|| OmfError::Truncated("empty input".into()))?;

    if first.rec_type == record_type::LIBHDR {
        let page_size = u32::from(first.length) + 3;
        if !page_size.is_power_of_two() || !(16..=32768).contains(&page_size) {
            return Err(OmfError::InvalidLibraryHeader(format!(
                "page size {page_size} is not a power of two in [16, 32768]"
            )));
        }
        return Ok(FileVariant::Library(page_size));
    }

    if first.rec_type != record_type::THEADR && first.rec_type != record_type::LHEADR {
        return Err(OmfError::UnexpectedRecordType {
            rec_type: first.rec_type,
            state: "expected THEADR, LHEADR, or a library header as the first record",
        });
    }

    let mut pos = first.end;
    let mut second = true;
    while let Some(frame) = read_frame(data, pos)? {
        if frame.rec_type == record_type::COMENT && frame.contents.len() >= 3 {
            let class = frame.contents[1];
            let payload = &frame.contents[2..frame.contents.len() - 1];
            if second && class == coment::class::EASY_OMF && payload == b"80386" {
                return Ok(FileVariant::EasyOmf386);
            }
            if class == coment::class::DEBUG_INFO {
                return Ok(FileVariant::OmfWithMsExt);
            }
            if class == coment::class::LINK_PASS {
                break;
            }
        }
        if frame.rec_type == record_type::MODEND || frame.rec_type == record_type::MODEND32 {
            break;
        }
        second = false;
        pos = frame.end;
    }

    Ok(FileVariant::TisOmf86)
}

/// Parse one object module from a byte slice.
///
/// With no `variant` hint the dialect is detected first
/// ([`detect_variant`]); library members pass the variant detected for
/// their module down through the hint.
pub fn parse_module(data: &[u8], variant: Option<FileVariant>) -> Result<Module, OmfError> {
    let variant = match variant {
        Some(v) => v,
        None => detect_variant(data)?,
    };
    if let FileVariant::Library(_) = variant {
        return Err(OmfError::UnexpectedRecordType {
            rec_type: record_type::LIBHDR,
            state: "parse_module cannot parse a library; use parse_library",
        });
    }
    let (module, end) = parse_module_at(data, variant)?;
    if data[end..].iter().any(|&b| b != 0) {
        return Err(OmfError::UnexpectedRecordType {
            rec_type: data[end..].iter().copied().find(|&b| b != 0).unwrap_or(0),
            state: "trailing data after MODEND",
        });
    }
    Ok(module)
}

/// Render a module back to bytes, the exact inverse of
/// [`parse_module`] for well-formed input.
pub fn dump_module(module: &Module) -> Vec<u8> {
    let mut out = Vec::new();
    for record in &module.records {
        record.encode(module.variant, &mut out);
    }
    out
}

/// Parse records from the start of `data` through MODEND. Returns the
/// module and the offset one past its final record.
pub(crate) fn parse_module_at(
    data: &[u8],
    variant: FileVariant,
) -> Result<(Module, usize), OmfError> {
    let mut records: Vec<Record> = Vec::new();
    let mut tables = Tables::default();
    let mut warnings = Vec::new();
    let mut threads = ThreadState::default();
    // Index of the most recent LEDATA/LIDATA/COMDAT record, the
    // implicit anchor for FIXUPP subrecords.
    let mut anchor: Option<usize> = None;
    let mut pos = 0;

    loop {
        let frame = read_frame(data, pos)?
            .ok_or_else(|| OmfError::Truncated("module ended without MODEND".into()))?;

        if records.is_empty()
            && frame.rec_type != record_type::THEADR
            && frame.rec_type != record_type::LHEADR
        {
            return Err(OmfError::UnexpectedRecordType {
                rec_type: frame.rec_type,
                state: "a module must begin with THEADR or LHEADR",
            });
        }

        if !verify_checksum(&data[frame.offset..frame.end]) {
            warnings.push(Warning::BadChecksum {
                rec_type: frame.rec_type,
                offset: frame.offset,
            });
        }
        if frame.length > 1024 && !may_exceed_limit(frame.rec_type) {
            warnings.push(Warning::OversizedRecord {
                rec_type: frame.rec_type,
                length: frame.length,
            });
        }

        let body_bytes = &frame.contents[..frame.contents.len() - 1];
        let checksum = frame.contents[frame.contents.len() - 1];

        let mut body = records::decode_body(
            frame.rec_type,
            body_bytes,
            variant,
            &tables,
            &mut threads,
            &mut warnings,
            frame.offset,
        )?;

        if let RecordBody::Fixupp(ref mut fixupp) = body {
            if fixupp.has_fixups() && anchor.is_none() {
                return Err(OmfError::MalformedFixupp {
                    offset: frame.offset,
                });
            }
            fixupp.anchor = anchor;
        }

        records::absorb_record(&body, &mut tables)?;

        if matches!(
            body,
            RecordBody::LeData(_) | RecordBody::LiData(_) | RecordBody::ComDat(_)
        ) {
            anchor = Some(records.len());
        }

        let done = matches!(body, RecordBody::ModEnd(_));
        records.push(Record {
            rec_type: frame.rec_type,
            length: frame.length,
            checksum,
            body,
        });
        pos = frame.end;
        if done {
            break;
        }
    }

    Ok((
        Module {
            variant,
            records,
            tables,
            warnings,
        },
        pos,
    ))
}

/// Walk record frames from `start` through MODEND without decoding,
/// returning the offset one past the module. Used to resynchronize a
/// library walk when a member fails to parse.
pub(crate) fn skip_module(data: &[u8], start: usize) -> Result<usize, OmfError> {
    let mut pos = start;
    loop {
        let frame = read_frame(data, pos)?
            .ok_or_else(|| OmfError::Truncated("module ended without MODEND".into()))?;
        pos = frame.end;
        if frame.rec_type == record_type::MODEND || frame.rec_type == record_type::MODEND32 {
            return Ok(pos);
        }
    }
}

#[cfg(test)]
mod test {
    use binrw::io::Cursor;

    use super::*;

    #[test]
    fn test_index_round_trip_full_domain() {
        for value in 0u16..=0x7FFF {
            let mut out = Vec::new();
            Index(value).encode(&mut out);
            if value < 0x80 {
                assert_eq!(out.len(), 1, "{value:#x} must use the single-byte form");
            } else {
                assert_eq!(out.len(), 2, "{value:#x} must use the two-byte form");
            }
            let mut cur = Cursor::new(&out);
            let back: Index = cur.read_le().expect("index");
            assert_eq!(back.value(), value);
        }
    }

    #[test]
    fn test_index_overflow() {
        assert!(Index::try_from(0x7FFF).is_ok());
        assert_eq!(Index::try_from(0x8000), Err(OmfError::IndexOverflow(0x8000)));
    }

    #[test]
    fn test_index_reserved_bit_masked() {
        // Bit 7 of the first byte only flags the two-byte form; the
        // worst-case encoding still lands inside [0, 0x7FFF].
        let mut cur = Cursor::new([0xFFu8, 0xFF]);
        let idx: Index = cur.read_le().expect("index");
        assert_eq!(idx.value(), 0x7FFF);
    }

    #[test]
    fn test_name_round_trip() {
        for name in [&b""[..], &b"X"[..], &b"_TEXT"[..], &[0xFF, 0x00, 0x80][..]] {
            let mut out = Vec::new();
            Name::new(name.to_vec()).encode(&mut out);
            assert_eq!(out[0] as usize, name.len());
            let mut cur = Cursor::new(&out);
            let back: Name = cur.read_le().expect("name");
            assert_eq!(back.as_bytes(), name);
        }
    }

    #[test]
    fn test_checksum_closure() {
        let body = b"\x07hello.c";
        let checksum = record_checksum(0x80, body);
        let mut record = vec![0x80, (body.len() + 1) as u8, 0];
        record.extend_from_slice(body);
        record.push(checksum);
        assert_eq!(record.iter().copied().fold(0u8, u8::wrapping_add), 0);
        assert!(verify_checksum(&record));
    }

    #[test]
    fn test_zero_checksum_accepted() {
        let record = [0x80u8, 0x02, 0x00, 0x41, 0x00];
        assert!(verify_checksum(&record));
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let record = [0x80u8, 0x02, 0x00, 0x41, 0x01];
        assert!(!verify_checksum(&record));
    }

    #[test]
    fn test_detect_plain_module() {
        // THEADR "hello.c" with a valid checksum.
        let data = [
            0x80, 0x09, 0x00, 0x07, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x2E, 0x63, 0xCB,
        ];
        assert_eq!(detect_variant(&data).expect("detect"), FileVariant::TisOmf86);
    }

    #[test]
    fn test_detect_easy_omf() {
        let mut data = vec![
            0x80, 0x09, 0x00, 0x07, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x2E, 0x63, 0xCB,
        ];
        // COMENT class 0xAA, payload "80386".
        let body = [0x80, 0xAA, 0x38, 0x30, 0x33, 0x38, 0x36];
        data.push(0x88);
        data.extend_from_slice(&((body.len() + 1) as u16).to_le_bytes());
        data.extend_from_slice(&body);
        data.push(record_checksum(0x88, &body));
        assert_eq!(
            detect_variant(&data).expect("detect"),
            FileVariant::EasyOmf386
        );
    }

    #[test]
    fn test_detect_library_page_size() {
        // LIBHDR with length 13 -> page size 16.
        let mut data = vec![0xF0, 0x0D, 0x00];
        data.extend_from_slice(&[0u8; 13]);
        assert_eq!(
            detect_variant(&data).expect("detect"),
            FileVariant::Library(16)
        );
    }

    #[test]
    fn test_detect_library_bad_page_size() {
        let mut data = vec![0xF0, 0x0C, 0x00];
        data.extend_from_slice(&[0u8; 12]);
        assert!(matches!(
            detect_variant(&data),
            Err(OmfError::InvalidLibraryHeader(_))
        ));
    }

    #[test]
    fn test_first_record_must_be_header() {
        // An LNAMES record first is not a module.
        let data = [0x96, 0x01, 0x00, 0x69];
        assert!(matches!(
            detect_variant(&data),
            Err(OmfError::UnexpectedRecordType { rec_type: 0x96, .. })
        ));
    }

    #[test]
    fn test_frame_truncated() {
        let data = [0x80, 0x09, 0x00, 0x07];
        assert!(matches!(read_frame(&data, 0), Err(OmfError::Truncated(_))));
    }
}
