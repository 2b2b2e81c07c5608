// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! Record body codecs.
//!
//! One bidirectional codec per record type. Decoders consume exactly the
//! record body (checksum already stripped); encoders are the inverse and
//! reproduce conforming input byte for byte. Width-dependent fields obey
//! the record type byte's LSB as filtered through the file variant.

use binrw::io::{Cursor, Read};
use binrw::{BinRead, BinReaderExt};

use crate::coment;
use crate::fixup::{self, ThreadState};
use crate::{
    put_scalar, put_u16, put_u32, read_scalar, record_type, FileVariant, Index, IndexKind, Name,
    OmfError, RecordBody, SegmentEntry, Tables, Warning, Width,
};

/// Iterated data blocks deeper than this are rejected rather than
/// recursed into.
const MAX_ITERATED_DEPTH: u32 = 64;

fn trunc(what: &'static str) -> impl Fn(binrw::Error) -> OmfError {
    move |_| OmfError::Truncated(format!("{what} record body"))
}

fn remaining(cur: &Cursor<&[u8]>) -> usize {
    cur.get_ref().len().saturating_sub(cur.position() as usize)
}

/// THEADR/LHEADR body: a single length-prefixed module name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleHeader {
    pub name: Name,
}

/// LNAMES/LLNAMES body: names to exhaustion, each appending one entry
/// to the module name table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameList {
    pub names: Vec<Name>,
}

/// One EXTDEF/LEXTDEF entry.
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct ExternEntry {
    pub name: Name,
    pub type_index: Index,
}

/// EXTDEF/LEXTDEF body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternNames {
    pub externals: Vec<ExternEntry>,
}

/// One CEXTDEF entry. The name is an LNAMES index, not a literal.
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct ComdatExternEntry {
    pub name: Index,
    pub type_index: Index,
}

/// CEXTDEF body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComdatExterns {
    pub externals: Vec<ComdatExternEntry>,
}

/// One public symbol in a PUBDEF/LPUBDEF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Public {
    pub name: Name,
    pub offset: u32,
    pub type_index: Index,
}

/// PUBDEF/LPUBDEF body. The base frame is on the wire only when the
/// base segment index is zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicNames {
    pub base_group: Index,
    pub base_segment: Index,
    pub base_frame: Option<u16>,
    pub publics: Vec<Public>,
}

/// One line-number entry. A line number of zero marks the end of a
/// function in Microsoft debug output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub line: u16,
    pub offset: u32,
}

impl LineEntry {
    pub fn is_end_of_function(&self) -> bool {
        self.line == 0
    }
}

/// LINNUM body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumbers {
    pub base_group: Index,
    pub base_segment: Index,
    pub entries: Vec<LineEntry>,
}

/// LINSYM body: line numbers attached to a COMDAT symbol by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSymbols {
    pub flags: u8,
    pub name: Index,
    pub entries: Vec<LineEntry>,
}

impl LineSymbols {
    pub fn is_continuation(&self) -> bool {
        self.flags & 0x01 != 0
    }
}

/// SEGDEF alignment, the A field of the ACBP byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentAlignment {
    /// Absolute segment; a frame number and offset follow.
    Absolute,
    Byte,
    Word,
    Paragraph,
    /// 256-byte page (4K under IBM LINK386).
    Page,
    Dword,
    /// Load-time locatable under old Intel tools, 4K page under IBM.
    Page4K,
    Undefined,
}

impl SegmentAlignment {
    pub(crate) fn from_raw(value: u8) -> SegmentAlignment {
        match value & 0x07 {
            0 => Self::Absolute,
            1 => Self::Byte,
            2 => Self::Word,
            3 => Self::Paragraph,
            4 => Self::Page,
            5 => Self::Dword,
            6 => Self::Page4K,
            _ => Self::Undefined,
        }
    }

    pub(crate) fn to_raw(self) -> u8 {
        match self {
            Self::Absolute => 0,
            Self::Byte => 1,
            Self::Word => 2,
            Self::Paragraph => 3,
            Self::Page => 4,
            Self::Dword => 5,
            Self::Page4K => 6,
            Self::Undefined => 7,
        }
    }
}

/// SEGDEF combination, the C field of the ACBP byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentCombination {
    Private,
    /// Reserved by TIS; Common under old Intel tools.
    Reserved1,
    Public,
    Reserved3,
    /// Treated the same as Public by linkers.
    Public4,
    Stack,
    Common,
    /// Treated the same as Public by linkers.
    Public7,
}

impl SegmentCombination {
    pub(crate) fn from_raw(value: u8) -> SegmentCombination {
        match value & 0x07 {
            0 => Self::Private,
            1 => Self::Reserved1,
            2 => Self::Public,
            3 => Self::Reserved3,
            4 => Self::Public4,
            5 => Self::Stack,
            6 => Self::Common,
            _ => Self::Public7,
        }
    }

    pub(crate) fn to_raw(self) -> u8 {
        match self {
            Self::Private => 0,
            Self::Reserved1 => 1,
            Self::Public => 2,
            Self::Reserved3 => 3,
            Self::Public4 => 4,
            Self::Stack => 5,
            Self::Common => 6,
            Self::Public7 => 7,
        }
    }
}

/// Frame number and offset of an absolute SEGDEF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteFrame {
    pub frame: u16,
    pub offset: u8,
}

/// SEGDEF body. `length` is the raw wire value; when the Big bit is set
/// the wire value is zero and [`SegDef::effective_length`] reports the
/// 64 KiB / 4 GiB meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegDef {
    pub alignment: SegmentAlignment,
    pub combination: SegmentCombination,
    pub big: bool,
    pub use32: bool,
    pub frame: Option<AbsoluteFrame>,
    pub length: u32,
    pub segment_name: Index,
    pub class_name: Index,
    pub overlay_name: Index,
    /// PharLap Easy OMF-386 access attribute byte, when present.
    pub access: Option<u8>,
}

impl SegDef {
    /// Decoded segment length: the Big bit with a zero wire length means
    /// exactly 64 KiB for the 16-bit form and 4 GiB for the 32-bit one.
    pub fn effective_length(&self, is32: bool) -> u64 {
        if self.big && self.length == 0 {
            if is32 {
                1 << 32
            } else {
                1 << 16
            }
        } else {
            u64::from(self.length)
        }
    }

    /// The PharLap attribute byte's U bit, authoritative for Use16/Use32
    /// when present.
    pub fn pharlap_use32(&self) -> Option<bool> {
        self.access.map(|a| a & 0x04 != 0)
    }
}

/// One GRPDEF component. Only segment indices (tag 0xFF) are in common
/// use; the other tags are decoded and preserved but reported as
/// unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupComponent {
    /// Tag 0xFF: a segment index.
    Segment(Index),
    /// Tag 0xFE: an external index.
    External(Index),
    /// Tag 0xFD: segment name, class name, and overlay name indices.
    SegmentNames {
        segment: Index,
        class: Index,
        overlay: Index,
    },
    /// Tag 0xFB: load-time-locatable data.
    Ltl {
        ltl_data: u8,
        max_length: u16,
        group_length: u16,
    },
    /// Tag 0xFA: an absolute frame and offset.
    Absolute { frame: u16, offset: u8 },
    /// Any other tag; the rest of the record is preserved untouched.
    Unknown { tag: u8, rest: Vec<u8> },
}

/// GRPDEF body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrpDef {
    pub name: Index,
    pub components: Vec<GroupComponent>,
}

/// LEDATA body: raw bytes destined for a segment at an offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeData {
    pub segment: Index,
    pub offset: u32,
    pub data: Vec<u8>,
}

/// The payload of one iterated data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratedContent {
    /// A leaf: literal bytes, repeated.
    Leaf(Vec<u8>),
    /// Nested blocks, each repeated.
    Nested(Vec<IteratedBlock>),
}

/// One LIDATA iterated data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratedBlock {
    pub repeat: u32,
    pub content: IteratedContent,
}

impl IteratedBlock {
    /// The number of bytes this block expands to.
    pub fn expanded_size(&self) -> u64 {
        let inner: u64 = match &self.content {
            IteratedContent::Leaf(data) => data.len() as u64,
            IteratedContent::Nested(blocks) => blocks.iter().map(IteratedBlock::expanded_size).sum(),
        };
        u64::from(self.repeat) * inner
    }

    /// Expand the block into literal bytes.
    pub fn expand(&self, out: &mut Vec<u8>) {
        for _ in 0..self.repeat {
            match &self.content {
                IteratedContent::Leaf(data) => out.extend_from_slice(data),
                IteratedContent::Nested(blocks) => {
                    for block in blocks {
                        block.expand(out);
                    }
                }
            }
        }
    }
}

/// LIDATA body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiData {
    pub segment: Index,
    pub offset: u32,
    pub blocks: Vec<IteratedBlock>,
}

impl LiData {
    /// Total bytes the record expands to.
    pub fn expanded_size(&self) -> u64 {
        self.blocks.iter().map(IteratedBlock::expanded_size).sum()
    }
}

/// The storage shape of a COMDEF entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommunalKind {
    /// 0x61: FAR data, allocated as `elements * element_size`.
    Far { elements: u32, element_size: u32 },
    /// 0x62: NEAR data of the given byte size.
    Near { size: u32 },
    /// 0x01..=0x5F: Borland communal in the given segment.
    Borland { segment: u8, length: u32 },
    /// Anything else, with the length field that followed it.
    Other { data_type: u8, length: u32 },
}

/// One COMDEF/LCOMDEF entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Communal {
    pub name: Name,
    pub type_index: Index,
    pub kind: CommunalKind,
}

impl Communal {
    /// The communal size in bytes the linker must reserve.
    pub fn size(&self) -> u64 {
        match &self.kind {
            CommunalKind::Far {
                elements,
                element_size,
            } => u64::from(*elements) * u64::from(*element_size),
            CommunalKind::Near { size } => u64::from(*size),
            CommunalKind::Borland { length, .. } | CommunalKind::Other { length, .. } => {
                u64::from(*length)
            }
        }
    }
}

/// COMDEF/LCOMDEF body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommunalNames {
    pub communals: Vec<Communal>,
}

/// BAKPAT body: patches to apply to a segment after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakPat {
    pub segment: Index,
    /// 0 = byte, 1 = word, 2 = dword (dword needs the 32-bit form).
    pub location: u8,
    pub patches: Vec<(u32, u32)>,
}

/// NBKPAT body: patches addressed by COMDAT symbol name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NbkPat {
    pub location: u8,
    pub name: Index,
    pub patches: Vec<(u32, u32)>,
}

/// COMDAT selection criteria, the high nibble of the attributes byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComdatSelection {
    NoMatch,
    PickAny,
    SameSize,
    ExactMatch,
    Unknown(u8),
}

/// COMDAT allocation type, the low nibble of the attributes byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComdatAllocation {
    Explicit,
    FarCode,
    FarData,
    Code32,
    Data32,
    Unknown(u8),
}

/// Base group/segment (and frame, when both are zero) of an
/// explicitly-allocated COMDAT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComdatBase {
    pub group: Index,
    pub segment: Index,
    pub frame: Option<u16>,
}

/// COMDAT record data, enumerated or iterated per the flags byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComdatData {
    Enumerated(Vec<u8>),
    Iterated(Vec<IteratedBlock>),
}

/// COMDAT body. Continuation records append to the previous COMDAT of
/// the same name; this crate keeps each record separate and leaves the
/// append to consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComDat {
    pub flags: u8,
    pub attributes: u8,
    pub align: u8,
    pub offset: u32,
    pub type_index: Index,
    pub base: Option<ComdatBase>,
    /// The symbol, as an LNAMES index.
    pub name: Index,
    pub data: ComdatData,
}

impl ComDat {
    pub fn is_continuation(&self) -> bool {
        self.flags & 0x01 != 0
    }

    pub fn is_iterated(&self) -> bool {
        self.flags & 0x02 != 0
    }

    pub fn is_local(&self) -> bool {
        self.flags & 0x04 != 0
    }

    pub fn is_data_in_code(&self) -> bool {
        self.flags & 0x08 != 0
    }

    pub fn selection(&self) -> ComdatSelection {
        match (self.attributes >> 4) & 0x0F {
            0 => ComdatSelection::NoMatch,
            1 => ComdatSelection::PickAny,
            2 => ComdatSelection::SameSize,
            3 => ComdatSelection::ExactMatch,
            v => ComdatSelection::Unknown(v),
        }
    }

    pub fn allocation(&self) -> ComdatAllocation {
        match self.attributes & 0x0F {
            0 => ComdatAllocation::Explicit,
            1 => ComdatAllocation::FarCode,
            2 => ComdatAllocation::FarData,
            3 => ComdatAllocation::Code32,
            4 => ComdatAllocation::Data32,
            v => ComdatAllocation::Unknown(v),
        }
    }
}

/// One ALIAS entry.
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct AliasEntry {
    pub alias: Name,
    pub substitute: Name,
}

/// ALIAS body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasList {
    pub aliases: Vec<AliasEntry>,
}

/// VERNUM body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerNum {
    pub version: Name,
}

/// VENDEXT body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendExt {
    pub vendor: u16,
    pub data: Vec<u8>,
}

/// MODEND start address, shaped like a FIXUP target specifier with
/// explicit frame and target methods only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartAddress {
    /// Frame method, 3 bits.
    pub frame_method: u8,
    /// Target method, the low 2 bits.
    pub target_method: u8,
    /// P bit: displacement omitted when set.
    pub p_bit: bool,
    /// Present for frame methods F0..F2.
    pub frame_datum: Option<Index>,
    pub target_datum: Index,
    /// Present when the P bit is clear.
    pub displacement: Option<u32>,
}

/// MODEND body. Trailing padding bytes written by some linkers are
/// preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModEnd {
    pub module_type: u8,
    pub start: Option<StartAddress>,
    pub padding: Vec<u8>,
}

impl ModEnd {
    pub fn is_main(&self) -> bool {
        self.module_type & 0x80 != 0
    }

    pub fn has_start(&self) -> bool {
        self.module_type & 0x40 != 0
    }

    pub fn is_relocatable(&self) -> bool {
        self.module_type & 0x01 != 0
    }
}

/// An uninterpreted record body, preserved byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    pub data: Vec<u8>,
}

/// Decode one record body. `body` excludes the checksum byte.
#[allow(clippy::too_many_arguments)]
pub(crate) fn decode_body(
    rec_type: u8,
    body: &[u8],
    variant: FileVariant,
    tables: &Tables,
    threads: &mut ThreadState,
    warnings: &mut Vec<Warning>,
    offset: usize,
) -> Result<RecordBody, OmfError> {
    use record_type as rt;
    let is32 = rec_type & 1 != 0;
    let width = variant.offset_width(is32);

    Ok(match rec_type {
        rt::THEADR => RecordBody::Theadr(decode_module_header(rec_type, body, warnings)?),
        rt::LHEADR => RecordBody::Lheadr(decode_module_header(rec_type, body, warnings)?),
        rt::COMENT => RecordBody::Coment(coment::decode_coment(body, warnings)?),
        rt::MODEND | rt::MODEND32 => RecordBody::ModEnd(decode_modend(body, width, warnings)?),
        rt::EXTDEF => RecordBody::ExtDef(decode_externs(body)?),
        rt::LEXTDEF | rt::LEXTDEF32 => RecordBody::LExtDef(decode_externs(body)?),
        rt::CEXTDEF => RecordBody::CExtDef(decode_comdat_externs(body)?),
        rt::PUBDEF | rt::PUBDEF32 => RecordBody::PubDef(decode_publics(body, width)?),
        rt::LPUBDEF | rt::LPUBDEF32 => RecordBody::LPubDef(decode_publics(body, width)?),
        rt::LINNUM | rt::LINNUM32 => {
            RecordBody::LinNum(decode_linnum(rec_type, body, width, warnings)?)
        }
        rt::LNAMES => RecordBody::LNames(decode_names(body)?),
        rt::LLNAMES => RecordBody::LlNames(decode_names(body)?),
        rt::SEGDEF | rt::SEGDEF32 => {
            RecordBody::SegDef(decode_segdef(rec_type, body, width, variant, warnings)?)
        }
        rt::GRPDEF => RecordBody::GrpDef(decode_grpdef(body, warnings)?),
        rt::FIXUPP | rt::FIXUPP32 => RecordBody::Fixupp(fixup::decode_fixupp(
            body, width, tables, threads, warnings, offset,
        )?),
        rt::LEDATA | rt::LEDATA32 => RecordBody::LeData(decode_ledata(body, width)?),
        rt::LIDATA | rt::LIDATA32 => {
            RecordBody::LiData(decode_lidata(body, width, variant.repeat_width(is32))?)
        }
        rt::COMDEF => RecordBody::ComDef(decode_communals(body)?),
        rt::LCOMDEF => RecordBody::LComDef(decode_communals(body)?),
        rt::BAKPAT | rt::BAKPAT32 => RecordBody::BakPat(decode_bakpat(body, width)?),
        rt::NBKPAT | rt::NBKPAT32 => RecordBody::NbkPat(decode_nbkpat(body, width)?),
        rt::COMDAT | rt::COMDAT32 => {
            RecordBody::ComDat(decode_comdat(body, width, variant.repeat_width(is32))?)
        }
        rt::LINSYM | rt::LINSYM32 => RecordBody::LinSym(decode_linsym(body, width)?),
        rt::ALIAS => RecordBody::Alias(decode_aliases(body)?),
        rt::VERNUM => RecordBody::VerNum(decode_vernum(rec_type, body, warnings)?),
        rt::VENDEXT => RecordBody::VendExt(decode_vendext(body)?),
        rt::LIBHDR | rt::LIBEND => {
            return Err(OmfError::UnexpectedRecordType {
                rec_type,
                state: "library control record inside a module",
            })
        }
        t if rt::OBSOLETE.contains(&t) => RecordBody::Obsolete(Opaque {
            data: body.to_vec(),
        }),
        _ => RecordBody::Unknown(Opaque {
            data: body.to_vec(),
        }),
    })
}

/// Encode one record body (checksum byte excluded).
pub(crate) fn encode_body(rec_type: u8, body: &RecordBody, variant: FileVariant) -> Vec<u8> {
    let is32 = rec_type & 1 != 0;
    let width = variant.offset_width(is32);
    let repeat_width = variant.repeat_width(is32);
    let mut out = Vec::new();

    match body {
        RecordBody::Theadr(h) | RecordBody::Lheadr(h) => h.name.encode(&mut out),
        RecordBody::Coment(c) => coment::encode_coment(c, &mut out),
        RecordBody::ModEnd(m) => encode_modend(m, width, &mut out),
        RecordBody::ExtDef(e) | RecordBody::LExtDef(e) => {
            for entry in &e.externals {
                entry.name.encode(&mut out);
                entry.type_index.encode(&mut out);
            }
        }
        RecordBody::CExtDef(c) => {
            for entry in &c.externals {
                entry.name.encode(&mut out);
                entry.type_index.encode(&mut out);
            }
        }
        RecordBody::PubDef(p) | RecordBody::LPubDef(p) => {
            p.base_group.encode(&mut out);
            p.base_segment.encode(&mut out);
            if let Some(frame) = p.base_frame {
                put_u16(&mut out, frame);
            }
            for public in &p.publics {
                public.name.encode(&mut out);
                put_scalar(&mut out, width, public.offset);
                public.type_index.encode(&mut out);
            }
        }
        RecordBody::LinNum(l) => {
            l.base_group.encode(&mut out);
            l.base_segment.encode(&mut out);
            for entry in &l.entries {
                put_u16(&mut out, entry.line);
                put_scalar(&mut out, width, entry.offset);
            }
        }
        RecordBody::LNames(n) | RecordBody::LlNames(n) => {
            for name in &n.names {
                name.encode(&mut out);
            }
        }
        RecordBody::SegDef(s) => encode_segdef(s, width, &mut out),
        RecordBody::GrpDef(g) => encode_grpdef(g, &mut out),
        RecordBody::Fixupp(f) => fixup::encode_fixupp(f, width, &mut out),
        RecordBody::LeData(d) => {
            d.segment.encode(&mut out);
            put_scalar(&mut out, width, d.offset);
            out.extend_from_slice(&d.data);
        }
        RecordBody::LiData(d) => {
            d.segment.encode(&mut out);
            put_scalar(&mut out, width, d.offset);
            for block in &d.blocks {
                encode_iterated_block(block, repeat_width, &mut out);
            }
        }
        RecordBody::ComDef(c) | RecordBody::LComDef(c) => {
            for communal in &c.communals {
                communal.name.encode(&mut out);
                communal.type_index.encode(&mut out);
                match &communal.kind {
                    CommunalKind::Far {
                        elements,
                        element_size,
                    } => {
                        out.push(0x61);
                        put_communal_length(&mut out, *elements);
                        put_communal_length(&mut out, *element_size);
                    }
                    CommunalKind::Near { size } => {
                        out.push(0x62);
                        put_communal_length(&mut out, *size);
                    }
                    CommunalKind::Borland { segment, length } => {
                        out.push(*segment);
                        put_communal_length(&mut out, *length);
                    }
                    CommunalKind::Other { data_type, length } => {
                        out.push(*data_type);
                        put_communal_length(&mut out, *length);
                    }
                }
            }
        }
        RecordBody::BakPat(b) => {
            b.segment.encode(&mut out);
            out.push(b.location);
            for (offset, value) in &b.patches {
                put_scalar(&mut out, width, *offset);
                put_scalar(&mut out, width, *value);
            }
        }
        RecordBody::NbkPat(n) => {
            out.push(n.location);
            n.name.encode(&mut out);
            for (offset, value) in &n.patches {
                put_scalar(&mut out, width, *offset);
                put_scalar(&mut out, width, *value);
            }
        }
        RecordBody::ComDat(c) => {
            out.push(c.flags);
            out.push(c.attributes);
            out.push(c.align);
            put_scalar(&mut out, width, c.offset);
            c.type_index.encode(&mut out);
            if let Some(base) = &c.base {
                base.group.encode(&mut out);
                base.segment.encode(&mut out);
                if let Some(frame) = base.frame {
                    put_u16(&mut out, frame);
                }
            }
            c.name.encode(&mut out);
            match &c.data {
                ComdatData::Enumerated(data) => out.extend_from_slice(data),
                ComdatData::Iterated(blocks) => {
                    for block in blocks {
                        encode_iterated_block(block, repeat_width, &mut out);
                    }
                }
            }
        }
        RecordBody::LinSym(l) => {
            out.push(l.flags);
            l.name.encode(&mut out);
            for entry in &l.entries {
                put_u16(&mut out, entry.line);
                put_scalar(&mut out, width, entry.offset);
            }
        }
        RecordBody::Alias(a) => {
            for entry in &a.aliases {
                entry.alias.encode(&mut out);
                entry.substitute.encode(&mut out);
            }
        }
        RecordBody::VerNum(v) => v.version.encode(&mut out),
        RecordBody::VendExt(v) => {
            put_u16(&mut out, v.vendor);
            out.extend_from_slice(&v.data);
        }
        RecordBody::Obsolete(o) | RecordBody::Unknown(o) => out.extend_from_slice(&o.data),
    }

    out
}

/// Apply a decoded record to the module tables, enforcing that every
/// reference resolves to an entry defined by an earlier record.
pub(crate) fn absorb_record(body: &RecordBody, tables: &mut Tables) -> Result<(), OmfError> {
    match body {
        RecordBody::LNames(list) | RecordBody::LlNames(list) => {
            tables.names.extend(list.names.iter().cloned());
        }
        RecordBody::SegDef(seg) => {
            tables.check(IndexKind::Name, seg.segment_name)?;
            tables.check(IndexKind::Name, seg.class_name)?;
            tables.check(IndexKind::Name, seg.overlay_name)?;
            tables.segments.push(SegmentEntry {
                name: seg.segment_name,
                class: seg.class_name,
            });
        }
        RecordBody::GrpDef(grp) => {
            tables.check(IndexKind::Name, grp.name)?;
            for component in &grp.components {
                match component {
                    GroupComponent::Segment(idx) => tables.check(IndexKind::Segment, *idx)?,
                    GroupComponent::External(idx) => tables.check(IndexKind::Extern, *idx)?,
                    _ => {}
                }
            }
            tables.groups.push(grp.name);
        }
        RecordBody::ExtDef(e) | RecordBody::LExtDef(e) => {
            tables
                .externs
                .extend(e.externals.iter().map(|x| x.name.clone()));
        }
        RecordBody::ComDef(c) | RecordBody::LComDef(c) => {
            tables
                .externs
                .extend(c.communals.iter().map(|x| x.name.clone()));
        }
        RecordBody::CExtDef(c) => {
            for entry in &c.externals {
                tables.check(IndexKind::Name, entry.name)?;
                let name = tables.name(entry.name).cloned().unwrap_or_default();
                tables.externs.push(name);
            }
        }
        RecordBody::PubDef(p) | RecordBody::LPubDef(p) => {
            tables.check(IndexKind::Group, p.base_group)?;
            tables.check(IndexKind::Segment, p.base_segment)?;
        }
        RecordBody::LinNum(l) => {
            tables.check(IndexKind::Group, l.base_group)?;
            tables.check(IndexKind::Segment, l.base_segment)?;
        }
        RecordBody::LeData(d) => tables.check(IndexKind::Segment, d.segment)?,
        RecordBody::LiData(d) => tables.check(IndexKind::Segment, d.segment)?,
        RecordBody::ComDat(c) => {
            tables.check(IndexKind::Name, c.name)?;
            if let Some(base) = &c.base {
                tables.check(IndexKind::Group, base.group)?;
                tables.check(IndexKind::Segment, base.segment)?;
            }
        }
        RecordBody::LinSym(l) => tables.check(IndexKind::Name, l.name)?,
        RecordBody::NbkPat(n) => tables.check(IndexKind::Name, n.name)?,
        RecordBody::BakPat(b) => tables.check(IndexKind::Segment, b.segment)?,
        RecordBody::ModEnd(m) => {
            if let Some(start) = &m.start {
                if let Some(datum) = start.frame_datum {
                    match start.frame_method {
                        0 => tables.check(IndexKind::Segment, datum)?,
                        1 => tables.check(IndexKind::Group, datum)?,
                        2 => tables.check(IndexKind::Extern, datum)?,
                        _ => {}
                    }
                }
                match start.target_method {
                    0 => tables.check(IndexKind::Segment, start.target_datum)?,
                    1 => tables.check(IndexKind::Group, start.target_datum)?,
                    2 => tables.check(IndexKind::Extern, start.target_datum)?,
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn decode_module_header(
    rec_type: u8,
    body: &[u8],
    warnings: &mut Vec<Warning>,
) -> Result<ModuleHeader, OmfError> {
    let mut cur = Cursor::new(body);
    let name: Name = cur.read_le().map_err(trunc("THEADR"))?;
    warn_trailing(rec_type, &cur, warnings);
    Ok(ModuleHeader { name })
}

fn decode_names(body: &[u8]) -> Result<NameList, OmfError> {
    let mut cur = Cursor::new(body);
    let mut names = Vec::new();
    while remaining(&cur) > 0 {
        names.push(cur.read_le::<Name>().map_err(trunc("LNAMES"))?);
    }
    Ok(NameList { names })
}

fn decode_externs(body: &[u8]) -> Result<ExternNames, OmfError> {
    let mut cur = Cursor::new(body);
    let mut externals = Vec::new();
    while remaining(&cur) > 0 {
        externals.push(cur.read_le::<ExternEntry>().map_err(trunc("EXTDEF"))?);
    }
    Ok(ExternNames { externals })
}

fn decode_comdat_externs(body: &[u8]) -> Result<ComdatExterns, OmfError> {
    let mut cur = Cursor::new(body);
    let mut externals = Vec::new();
    while remaining(&cur) > 0 {
        externals.push(
            cur.read_le::<ComdatExternEntry>()
                .map_err(trunc("CEXTDEF"))?,
        );
    }
    Ok(ComdatExterns { externals })
}

fn decode_publics(body: &[u8], width: Width) -> Result<PublicNames, OmfError> {
    let mut cur = Cursor::new(body);
    let base_group: Index = cur.read_le().map_err(trunc("PUBDEF"))?;
    let base_segment: Index = cur.read_le().map_err(trunc("PUBDEF"))?;
    let base_frame = if base_segment.is_none() {
        Some(cur.read_le::<u16>().map_err(trunc("PUBDEF"))?)
    } else {
        None
    };

    let mut publics = Vec::new();
    while remaining(&cur) > 0 {
        let name: Name = cur.read_le().map_err(trunc("PUBDEF"))?;
        let offset = read_scalar(&mut cur, width).map_err(trunc("PUBDEF"))?;
        let type_index: Index = cur.read_le().map_err(trunc("PUBDEF"))?;
        publics.push(Public {
            name,
            offset,
            type_index,
        });
    }

    Ok(PublicNames {
        base_group,
        base_segment,
        base_frame,
        publics,
    })
}

fn decode_linnum(
    rec_type: u8,
    body: &[u8],
    width: Width,
    warnings: &mut Vec<Warning>,
) -> Result<LineNumbers, OmfError> {
    let mut cur = Cursor::new(body);
    let base_group: Index = cur.read_le().map_err(trunc("LINNUM"))?;
    let base_segment: Index = cur.read_le().map_err(trunc("LINNUM"))?;

    let entry_size = match width {
        Width::Word => 4,
        Width::Dword => 6,
    };
    let mut entries = Vec::new();
    while remaining(&cur) >= entry_size {
        let line = cur.read_le::<u16>().map_err(trunc("LINNUM"))?;
        let offset = read_scalar(&mut cur, width).map_err(trunc("LINNUM"))?;
        entries.push(LineEntry { line, offset });
    }
    // Some tools pad LINNUM records; tolerate but report.
    warn_trailing(rec_type, &cur, warnings);

    Ok(LineNumbers {
        base_group,
        base_segment,
        entries,
    })
}

fn decode_segdef(
    rec_type: u8,
    body: &[u8],
    width: Width,
    variant: FileVariant,
    warnings: &mut Vec<Warning>,
) -> Result<SegDef, OmfError> {
    let mut cur = Cursor::new(body);
    let acbp = cur.read_le::<u8>().map_err(trunc("SEGDEF"))?;

    let alignment = SegmentAlignment::from_raw(acbp >> 5);
    let combination = SegmentCombination::from_raw(acbp >> 2);
    let big = acbp & 0x02 != 0;
    let use32 = acbp & 0x01 != 0;

    let frame = if alignment == SegmentAlignment::Absolute {
        let frame = cur.read_le::<u16>().map_err(trunc("SEGDEF"))?;
        let offset = cur.read_le::<u8>().map_err(trunc("SEGDEF"))?;
        Some(AbsoluteFrame { frame, offset })
    } else {
        None
    };

    let length = read_scalar(&mut cur, width).map_err(trunc("SEGDEF"))?;
    let segment_name: Index = cur.read_le().map_err(trunc("SEGDEF"))?;
    let class_name: Index = cur.read_le().map_err(trunc("SEGDEF"))?;
    let overlay_name: Index = cur.read_le().map_err(trunc("SEGDEF"))?;

    // PharLap writes an access attribute byte after the overlay name;
    // a padding zero is indistinguishable and treated as one.
    let access = if variant.has_segdef_access_byte() && remaining(&cur) > 0 {
        Some(cur.read_le::<u8>().map_err(trunc("SEGDEF"))?)
    } else {
        None
    };
    warn_trailing(rec_type, &cur, warnings);

    Ok(SegDef {
        alignment,
        combination,
        big,
        use32,
        frame,
        length,
        segment_name,
        class_name,
        overlay_name,
        access,
    })
}

fn encode_segdef(s: &SegDef, width: Width, out: &mut Vec<u8>) {
    let acbp = (s.alignment.to_raw() << 5)
        | (s.combination.to_raw() << 2)
        | (u8::from(s.big) << 1)
        | u8::from(s.use32);
    out.push(acbp);
    if let Some(frame) = &s.frame {
        put_u16(out, frame.frame);
        out.push(frame.offset);
    }
    put_scalar(out, width, s.length);
    s.segment_name.encode(out);
    s.class_name.encode(out);
    s.overlay_name.encode(out);
    if let Some(access) = s.access {
        out.push(access);
    }
}

fn decode_grpdef(body: &[u8], warnings: &mut Vec<Warning>) -> Result<GrpDef, OmfError> {
    let mut cur = Cursor::new(body);
    let name: Index = cur.read_le().map_err(trunc("GRPDEF"))?;

    let mut components = Vec::new();
    while remaining(&cur) > 0 {
        let tag = cur.read_le::<u8>().map_err(trunc("GRPDEF"))?;
        let component = match tag {
            0xFF => GroupComponent::Segment(cur.read_le().map_err(trunc("GRPDEF"))?),
            0xFE => {
                warnings.push(Warning::UnsupportedGroupComponent { tag });
                GroupComponent::External(cur.read_le().map_err(trunc("GRPDEF"))?)
            }
            0xFD => {
                warnings.push(Warning::UnsupportedGroupComponent { tag });
                GroupComponent::SegmentNames {
                    segment: cur.read_le().map_err(trunc("GRPDEF"))?,
                    class: cur.read_le().map_err(trunc("GRPDEF"))?,
                    overlay: cur.read_le().map_err(trunc("GRPDEF"))?,
                }
            }
            0xFB => {
                warnings.push(Warning::UnsupportedGroupComponent { tag });
                GroupComponent::Ltl {
                    ltl_data: cur.read_le().map_err(trunc("GRPDEF"))?,
                    max_length: cur.read_le().map_err(trunc("GRPDEF"))?,
                    group_length: cur.read_le().map_err(trunc("GRPDEF"))?,
                }
            }
            0xFA => {
                warnings.push(Warning::UnsupportedGroupComponent { tag });
                GroupComponent::Absolute {
                    frame: cur.read_le().map_err(trunc("GRPDEF"))?,
                    offset: cur.read_le().map_err(trunc("GRPDEF"))?,
                }
            }
            _ => {
                warnings.push(Warning::UnsupportedGroupComponent { tag });
                let rest = body[cur.position() as usize..].to_vec();
                components.push(GroupComponent::Unknown { tag, rest });
                break;
            }
        };
        components.push(component);
    }

    Ok(GrpDef { name, components })
}

fn encode_grpdef(g: &GrpDef, out: &mut Vec<u8>) {
    g.name.encode(out);
    for component in &g.components {
        match component {
            GroupComponent::Segment(idx) => {
                out.push(0xFF);
                idx.encode(out);
            }
            GroupComponent::External(idx) => {
                out.push(0xFE);
                idx.encode(out);
            }
            GroupComponent::SegmentNames {
                segment,
                class,
                overlay,
            } => {
                out.push(0xFD);
                segment.encode(out);
                class.encode(out);
                overlay.encode(out);
            }
            GroupComponent::Ltl {
                ltl_data,
                max_length,
                group_length,
            } => {
                out.push(0xFB);
                out.push(*ltl_data);
                put_u16(out, *max_length);
                put_u16(out, *group_length);
            }
            GroupComponent::Absolute { frame, offset } => {
                out.push(0xFA);
                put_u16(out, *frame);
                out.push(*offset);
            }
            GroupComponent::Unknown { tag, rest } => {
                out.push(*tag);
                out.extend_from_slice(rest);
            }
        }
    }
}

fn decode_ledata(body: &[u8], width: Width) -> Result<LeData, OmfError> {
    let mut cur = Cursor::new(body);
    let segment: Index = cur.read_le().map_err(trunc("LEDATA"))?;
    let offset = read_scalar(&mut cur, width).map_err(trunc("LEDATA"))?;
    let data = body[cur.position() as usize..].to_vec();
    Ok(LeData {
        segment,
        offset,
        data,
    })
}

fn decode_lidata(body: &[u8], width: Width, repeat_width: Width) -> Result<LiData, OmfError> {
    let mut cur = Cursor::new(body);
    let segment: Index = cur.read_le().map_err(trunc("LIDATA"))?;
    let offset = read_scalar(&mut cur, width).map_err(trunc("LIDATA"))?;

    let mut blocks = Vec::new();
    while remaining(&cur) > 0 {
        blocks.push(decode_iterated_block(&mut cur, repeat_width, 0)?);
    }

    Ok(LiData {
        segment,
        offset,
        blocks,
    })
}

pub(crate) fn decode_iterated_block(
    cur: &mut Cursor<&[u8]>,
    repeat_width: Width,
    depth: u32,
) -> Result<IteratedBlock, OmfError> {
    if depth > MAX_ITERATED_DEPTH {
        return Err(OmfError::Truncated(format!(
            "iterated data nested deeper than {MAX_ITERATED_DEPTH} levels"
        )));
    }
    let repeat = read_scalar(cur, repeat_width).map_err(trunc("LIDATA"))?;
    let block_count = cur.read_le::<u16>().map_err(trunc("LIDATA"))?;
    let content = if block_count == 0 {
        let len = cur.read_le::<u8>().map_err(trunc("LIDATA"))?;
        let mut data = vec![0u8; usize::from(len)];
        cur.read_exact(&mut data)
            .map_err(|_| OmfError::Truncated("LIDATA record body".into()))?;
        IteratedContent::Leaf(data)
    } else {
        let mut blocks = Vec::with_capacity(usize::from(block_count));
        for _ in 0..block_count {
            blocks.push(decode_iterated_block(cur, repeat_width, depth + 1)?);
        }
        IteratedContent::Nested(blocks)
    };
    Ok(IteratedBlock { repeat, content })
}

pub(crate) fn encode_iterated_block(block: &IteratedBlock, repeat_width: Width, out: &mut Vec<u8>) {
    put_scalar(out, repeat_width, block.repeat);
    match &block.content {
        IteratedContent::Leaf(data) => {
            put_u16(out, 0);
            out.push(data.len() as u8);
            out.extend_from_slice(data);
        }
        IteratedContent::Nested(blocks) => {
            put_u16(out, blocks.len() as u16);
            for nested in blocks {
                encode_iterated_block(nested, repeat_width, out);
            }
        }
    }
}

/// COMDEF communal length: one byte up to 0x80, then 0x81/0x84/0x88
/// prefixed little-endian values of 2, 3, and 4 bytes.
pub(crate) fn read_communal_length(cur: &mut Cursor<&[u8]>) -> Result<u32, OmfError> {
    let b0 = cur.read_le::<u8>().map_err(trunc("COMDEF"))?;
    Ok(match b0 {
        0x81 => u32::from(cur.read_le::<u16>().map_err(trunc("COMDEF"))?),
        0x84 => {
            let lo = cur.read_le::<u16>().map_err(trunc("COMDEF"))?;
            let hi = cur.read_le::<u8>().map_err(trunc("COMDEF"))?;
            (u32::from(hi) << 16) | u32::from(lo)
        }
        0x88 => cur.read_le::<u32>().map_err(trunc("COMDEF"))?,
        b => u32::from(b),
    })
}

pub(crate) fn put_communal_length(out: &mut Vec<u8>, value: u32) {
    if value <= 0x80 {
        out.push(value as u8);
    } else if value <= 0xFFFF {
        out.push(0x81);
        put_u16(out, value as u16);
    } else if value <= 0x00FF_FFFF {
        out.push(0x84);
        put_u16(out, value as u16);
        out.push((value >> 16) as u8);
    } else {
        out.push(0x88);
        put_u32(out, value);
    }
}

fn decode_communals(body: &[u8]) -> Result<CommunalNames, OmfError> {
    let mut cur = Cursor::new(body);
    let mut communals = Vec::new();
    while remaining(&cur) > 0 {
        let name: Name = cur.read_le().map_err(trunc("COMDEF"))?;
        let type_index: Index = cur.read_le().map_err(trunc("COMDEF"))?;
        let data_type = cur.read_le::<u8>().map_err(trunc("COMDEF"))?;
        let kind = match data_type {
            0x61 => {
                let elements = read_communal_length(&mut cur)?;
                let element_size = read_communal_length(&mut cur)?;
                CommunalKind::Far {
                    elements,
                    element_size,
                }
            }
            0x62 => CommunalKind::Near {
                size: read_communal_length(&mut cur)?,
            },
            seg @ 0x01..=0x5F => CommunalKind::Borland {
                segment: seg,
                length: read_communal_length(&mut cur)?,
            },
            other => CommunalKind::Other {
                data_type: other,
                length: read_communal_length(&mut cur)?,
            },
        };
        communals.push(Communal {
            name,
            type_index,
            kind,
        });
    }
    Ok(CommunalNames { communals })
}

fn decode_bakpat(body: &[u8], width: Width) -> Result<BakPat, OmfError> {
    let mut cur = Cursor::new(body);
    let segment: Index = cur.read_le().map_err(trunc("BAKPAT"))?;
    let location = cur.read_le::<u8>().map_err(trunc("BAKPAT"))?;
    let mut patches = Vec::new();
    while remaining(&cur) > 0 {
        let offset = read_scalar(&mut cur, width).map_err(trunc("BAKPAT"))?;
        let value = read_scalar(&mut cur, width).map_err(trunc("BAKPAT"))?;
        patches.push((offset, value));
    }
    Ok(BakPat {
        segment,
        location,
        patches,
    })
}

fn decode_nbkpat(body: &[u8], width: Width) -> Result<NbkPat, OmfError> {
    let mut cur = Cursor::new(body);
    let location = cur.read_le::<u8>().map_err(trunc("NBKPAT"))?;
    let name: Index = cur.read_le().map_err(trunc("NBKPAT"))?;
    let mut patches = Vec::new();
    while remaining(&cur) > 0 {
        let offset = read_scalar(&mut cur, width).map_err(trunc("NBKPAT"))?;
        let value = read_scalar(&mut cur, width).map_err(trunc("NBKPAT"))?;
        patches.push((offset, value));
    }
    Ok(NbkPat {
        location,
        name,
        patches,
    })
}

fn decode_comdat(body: &[u8], width: Width, repeat_width: Width) -> Result<ComDat, OmfError> {
    let mut cur = Cursor::new(body);
    let flags = cur.read_le::<u8>().map_err(trunc("COMDAT"))?;
    let attributes = cur.read_le::<u8>().map_err(trunc("COMDAT"))?;
    let align = cur.read_le::<u8>().map_err(trunc("COMDAT"))?;
    let offset = read_scalar(&mut cur, width).map_err(trunc("COMDAT"))?;
    let type_index: Index = cur.read_le().map_err(trunc("COMDAT"))?;

    // The public base triple is present only for explicit allocation,
    // and the frame only when both base indices are zero.
    let base = if attributes & 0x0F == 0 {
        let group: Index = cur.read_le().map_err(trunc("COMDAT"))?;
        let segment: Index = cur.read_le().map_err(trunc("COMDAT"))?;
        let frame = if group.is_none() && segment.is_none() {
            Some(cur.read_le::<u16>().map_err(trunc("COMDAT"))?)
        } else {
            None
        };
        Some(ComdatBase {
            group,
            segment,
            frame,
        })
    } else {
        None
    };

    let name: Index = cur.read_le().map_err(trunc("COMDAT"))?;

    let data = if flags & 0x02 != 0 {
        let mut blocks = Vec::new();
        while remaining(&cur) > 0 {
            blocks.push(decode_iterated_block(&mut cur, repeat_width, 0)?);
        }
        ComdatData::Iterated(blocks)
    } else {
        ComdatData::Enumerated(body[cur.position() as usize..].to_vec())
    };

    Ok(ComDat {
        flags,
        attributes,
        align,
        offset,
        type_index,
        base,
        name,
        data,
    })
}

fn decode_linsym(body: &[u8], width: Width) -> Result<LineSymbols, OmfError> {
    let mut cur = Cursor::new(body);
    let flags = cur.read_le::<u8>().map_err(trunc("LINSYM"))?;
    let name: Index = cur.read_le().map_err(trunc("LINSYM"))?;
    let mut entries = Vec::new();
    while remaining(&cur) > 0 {
        let line = cur.read_le::<u16>().map_err(trunc("LINSYM"))?;
        let offset = read_scalar(&mut cur, width).map_err(trunc("LINSYM"))?;
        entries.push(LineEntry { line, offset });
    }
    Ok(LineSymbols {
        flags,
        name,
        entries,
    })
}

fn decode_aliases(body: &[u8]) -> Result<AliasList, OmfError> {
    let mut cur = Cursor::new(body);
    let mut aliases = Vec::new();
    while remaining(&cur) > 0 {
        aliases.push(cur.read_le::<AliasEntry>().map_err(trunc("ALIAS"))?);
    }
    Ok(AliasList { aliases })
}

fn decode_vernum(
    rec_type: u8,
    body: &[u8],
    warnings: &mut Vec<Warning>,
) -> Result<VerNum, OmfError> {
    let mut cur = Cursor::new(body);
    let version: Name = cur.read_le().map_err(trunc("VERNUM"))?;
    warn_trailing(rec_type, &cur, warnings);
    Ok(VerNum { version })
}

fn decode_vendext(body: &[u8]) -> Result<VendExt, OmfError> {
    let mut cur = Cursor::new(body);
    let vendor = cur.read_le::<u16>().map_err(trunc("VENDEXT"))?;
    let data = body[cur.position() as usize..].to_vec();
    Ok(VendExt { vendor, data })
}

fn decode_modend(
    body: &[u8],
    width: Width,
    warnings: &mut Vec<Warning>,
) -> Result<ModEnd, OmfError> {
    let mut cur = Cursor::new(body);
    let module_type = cur.read_le::<u8>().map_err(trunc("MODEND"))?;

    let start = if module_type & 0x40 != 0 {
        let end_data = cur.read_le::<u8>().map_err(trunc("MODEND"))?;
        // Thread references are not valid in MODEND; the F and T bits
        // must be clear.
        if end_data & 0x88 != 0 {
            warnings.push(Warning::ReservedBitsNonzero {
                rec_type: record_type::MODEND,
            });
        }
        let frame_method = (end_data >> 4) & 0x07;
        let p_bit = end_data & 0x04 != 0;
        let target_method = end_data & 0x03;

        let frame_datum = if frame_method < 3 {
            Some(cur.read_le::<Index>().map_err(trunc("MODEND"))?)
        } else {
            None
        };
        let target_datum: Index = cur.read_le().map_err(trunc("MODEND"))?;
        let displacement = if p_bit {
            None
        } else {
            Some(read_scalar(&mut cur, width).map_err(trunc("MODEND"))?)
        };

        Some(StartAddress {
            frame_method,
            target_method,
            p_bit,
            frame_datum,
            target_datum,
            displacement,
        })
    } else {
        None
    };

    // MS LINK pads MODEND with zeros; keep the bytes for round-trip.
    let padding = body[cur.position() as usize..].to_vec();

    Ok(ModEnd {
        module_type,
        start,
        padding,
    })
}

fn encode_modend(m: &ModEnd, width: Width, out: &mut Vec<u8>) {
    out.push(m.module_type);
    if let Some(start) = &m.start {
        let end_data =
            (start.frame_method << 4) | (u8::from(start.p_bit) << 2) | (start.target_method & 0x03);
        out.push(end_data);
        if let Some(datum) = start.frame_datum {
            datum.encode(out);
        }
        start.target_datum.encode(out);
        if let Some(displacement) = start.displacement {
            put_scalar(out, width, displacement);
        }
    }
    out.extend_from_slice(&m.padding);
}

fn warn_trailing(rec_type: u8, cur: &Cursor<&[u8]>, warnings: &mut Vec<Warning>) {
    let count = remaining(cur);
    if count > 0 {
        warnings.push(Warning::TrailingBytes { rec_type, count });
    }
}
