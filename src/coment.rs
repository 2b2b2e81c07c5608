// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! COMENT record codecs.
//!
//! A COMENT body is a flags byte, a class byte, and a class-specific
//! payload running to the end of the record. Text-bearing classes keep
//! their bytes uninterpreted (plenty of producers wrote OEM code
//! pages); structured classes decode fully. Unrecognized classes and
//! subtypes are preserved verbatim so the dumper can reproduce them.

use binrw::io::Cursor;
use binrw::BinReaderExt;

use crate::{put_u16, Index, Name, OmfError, Warning};

/// COMENT class bytes.
pub mod class {
    /// Translator identification (compiler/assembler name).
    pub const TRANSLATOR: u8 = 0x00;
    /// Intel copyright string.
    pub const COPYRIGHT: u8 = 0x01;
    /// Library specifier (obsolete predecessor of 0x9F).
    pub const LIB_SPEC: u8 = 0x81;
    /// Watcom processor and memory model string.
    pub const PROC_MODEL: u8 = 0x9B;
    /// MS-DOS version (obsolete).
    pub const DOS_VERSION: u8 = 0x9C;
    /// Memory model (text).
    pub const MEMORY_MODEL: u8 = 0x9D;
    /// DOSSEG segment-ordering request.
    pub const DOSSEG: u8 = 0x9E;
    /// Default library search name.
    pub const DEFAULT_LIBRARY: u8 = 0x9F;
    /// OMF extensions; the first payload byte selects a subtype.
    pub const OMF_EXTENSION: u8 = 0xA0;
    /// Microsoft debug-information style and version.
    pub const DEBUG_INFO: u8 = 0xA1;
    /// Link Pass Separator.
    pub const LINK_PASS: u8 = 0xA2;
    /// LIBMOD: module name within a library.
    pub const LIBMOD: u8 = 0xA3;
    /// EXESTR: text appended to the executable.
    pub const EXESTR: u8 = 0xA4;
    /// INCERR: marks the object unlinkable after an incremental error.
    pub const INCERR: u8 = 0xA6;
    /// NOPAD: segments that must not be padded.
    pub const NOPAD: u8 = 0xA7;
    /// WKEXT: weak extern pairs.
    pub const WKEXT: u8 = 0xA8;
    /// LZEXT: lazy extern pairs.
    pub const LZEXT: u8 = 0xA9;
    /// Easy OMF-386 marker, payload "80386".
    pub const EASY_OMF: u8 = 0xAA;
    /// Borland comment family, 0xDA through 0xDF.
    pub const BORLAND_FIRST: u8 = 0xDA;
    pub const BORLAND_LAST: u8 = 0xDF;
    /// Borland dependency record.
    pub const DEPENDENCY: u8 = 0xE9;
    /// Watcom disassembler directive.
    pub const DISASM_DIRECTIVE: u8 = 0xFD;
    /// Watcom/Microsoft linker directive.
    pub const LINKER_DIRECTIVE: u8 = 0xFE;
    /// QuickC command line.
    pub const COMMAND_LINE: u8 = 0xFF;
}

/// Human-readable name for a comment class byte.
pub fn class_name(cls: u8) -> &'static str {
    match cls {
        class::TRANSLATOR => "translator",
        class::COPYRIGHT => "copyright",
        class::LIB_SPEC => "library specifier",
        class::PROC_MODEL => "processor/model",
        class::DOS_VERSION => "MS-DOS version",
        class::MEMORY_MODEL => "memory model",
        class::DOSSEG => "DOSSEG",
        class::DEFAULT_LIBRARY => "default library",
        class::OMF_EXTENSION => "OMF extension",
        class::DEBUG_INFO => "debug info",
        class::LINK_PASS => "link pass separator",
        class::LIBMOD => "LIBMOD",
        class::EXESTR => "EXESTR",
        class::INCERR => "INCERR",
        class::NOPAD => "NOPAD",
        class::WKEXT => "WKEXT",
        class::LZEXT => "LZEXT",
        class::EASY_OMF => "Easy OMF-386",
        class::BORLAND_FIRST..=class::BORLAND_LAST => "Borland",
        class::DEPENDENCY => "dependency",
        class::DISASM_DIRECTIVE => "disassembler directive",
        class::LINKER_DIRECTIVE => "linker directive",
        class::COMMAND_LINE => "command line",
        _ => "unknown",
    }
}

/// A COMENT record: flags, class, and the decoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coment {
    /// Raw flags byte; bits 5..0 are reserved and preserved.
    pub flags: u8,
    pub class: u8,
    pub payload: ComentPayload,
}

impl Coment {
    /// NP bit: the comment may not be purged.
    pub fn no_purge(&self) -> bool {
        self.flags & 0x80 != 0
    }

    /// NL bit: the comment may not be listed.
    pub fn no_list(&self) -> bool {
        self.flags & 0x40 != 0
    }
}

/// One weak/lazy extern pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternPair {
    pub weak: Index,
    pub default: Index,
}

/// Class-specific COMENT payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComentPayload {
    /// 0x00: translator name.
    Translator(Vec<u8>),
    /// 0x01: Intel copyright.
    Copyright(Vec<u8>),
    /// 0x81: obsolete library specifier.
    LibSpec(Vec<u8>),
    /// 0x9B: Watcom processor/model string.
    ProcModel(Vec<u8>),
    /// 0x9C: MS-DOS version.
    DosVersion(Vec<u8>),
    /// 0x9D: memory model.
    MemoryModel(Vec<u8>),
    /// 0x9E: DOSSEG request; no payload.
    DosSeg,
    /// 0x9F: default library search name. Preserved verbatim,
    /// whitespace included; producers disagree on trailing padding.
    DefaultLibrary(Vec<u8>),
    /// 0xA0: OMF extension subrecord.
    Extension(OmfExtension),
    /// 0xA1: debug-information style and version.
    DebugInfo(Vec<u8>),
    /// 0xA2: link pass separator; `01` marks the start of pass-2
    /// records.
    LinkPass(Vec<u8>),
    /// 0xA3: module name within a library.
    LibMod(Vec<u8>),
    /// 0xA4: text for the executable.
    ExeStr(Vec<u8>),
    /// 0xA6: incremental-compilation error marker; no payload.
    IncErr,
    /// 0xA7: segment indices that must not be padded.
    NoPad(Vec<Index>),
    /// 0xA8: weak extern pairs.
    WkExt(Vec<ExternPair>),
    /// 0xA9: lazy extern pairs.
    LzExt(Vec<ExternPair>),
    /// 0xAA: Easy OMF-386 marker.
    EasyOmf(Vec<u8>),
    /// 0xDA..0xDF: Borland comment text.
    Borland(Vec<u8>),
    /// 0xE9: Borland dependency record.
    Dependency(Vec<u8>),
    /// 0xFD: Watcom disassembler directive.
    DisasmDirective(DisasmDirective),
    /// 0xFE: Watcom/Microsoft linker directive.
    LinkerDirective(LinkerDirective),
    /// 0xFF: QuickC command line.
    CommandLine(Vec<u8>),
    /// Any other class, or a structured class that failed to decode:
    /// bytes preserved untouched.
    Unknown(Vec<u8>),
}

impl ComentPayload {
    /// True for an 0xA2 separator announcing pass-2 records.
    pub fn is_pass_two_separator(&self) -> bool {
        matches!(self, ComentPayload::LinkPass(data) if data.first() == Some(&1))
    }
}

/// 0xA0 extension subrecords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmfExtension {
    /// 01: import definition.
    ImpDef(ImpDef),
    /// 02: export definition.
    ExpDef(ExpDef),
    /// 03: incremental compilation deltas.
    IncDef(IncDef),
    /// 04: protected-memory library marker.
    ProtectedLib(Vec<u8>),
    /// 05: Microsoft linker directive flags.
    LnkDir(LnkDir),
    /// 06: big-endian object marker.
    BigEndian(Vec<u8>),
    /// 07: precompiled-types marker.
    PreComp(Vec<u8>),
    /// Any other subtype, preserved.
    Unknown { subtype: u8, data: Vec<u8> },
}

/// What an import resolves to inside its module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEntry {
    Ordinal(u16),
    /// A zero-length name means "same as the internal name".
    Name(Name),
}

/// IMPDEF: a symbol imported from another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpDef {
    pub internal_name: Name,
    pub module_name: Name,
    pub entry: ImportEntry,
}

impl ImpDef {
    pub fn by_ordinal(&self) -> bool {
        matches!(self.entry, ImportEntry::Ordinal(_))
    }
}

/// EXPDEF: a symbol exported from this module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpDef {
    pub flags: u8,
    pub exported_name: Name,
    pub internal_name: Name,
    /// Present when the ordinal bit of `flags` is set.
    pub ordinal: Option<u16>,
}

impl ExpDef {
    pub fn by_ordinal(&self) -> bool {
        self.flags & 0x80 != 0
    }

    pub fn resident(&self) -> bool {
        self.flags & 0x40 != 0
    }

    pub fn no_data(&self) -> bool {
        self.flags & 0x20 != 0
    }

    pub fn parameter_count(&self) -> u8 {
        self.flags & 0x1F
    }
}

/// INCDEF: extern and line-number index deltas for incremental
/// compilation. Padding bytes are preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncDef {
    pub extdef_delta: i16,
    pub linnum_delta: i16,
    pub padding: Vec<u8>,
}

/// LNKDIR: Microsoft C7 linker directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LnkDir {
    pub flags: u8,
    pub pcode_version: u8,
    pub cv_version: u8,
}

impl LnkDir {
    pub fn new_exe(&self) -> bool {
        self.flags & 0x01 != 0
    }

    pub fn omit_publics(&self) -> bool {
        self.flags & 0x02 != 0
    }

    pub fn run_mpc(&self) -> bool {
        self.flags & 0x04 != 0
    }
}

/// 0xFD: a Watcom disassembler directive marking a scan region.
/// Subtype `'s'` uses 16-bit offsets, `'S'` 32-bit ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisasmDirective {
    pub kind: u8,
    pub segment: Index,
    /// LNAMES index, present when the segment index is zero.
    pub name: Option<Index>,
    pub start: u32,
    pub end: u32,
}

/// 0xFE: a linker directive selected by its leading subtype byte.
/// Payload bytes are preserved uninterpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerDirective {
    pub directive: u8,
    pub data: Vec<u8>,
}

/// The directives Watcom's tools emit under class 0xFE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    SourceLanguage,
    DefaultLibrary,
    OptimizeFarCalls,
    OptimizeUnsafe,
    VirtualFunctionTable,
    VirtualFunctionPure,
    VirtualFunctionReference,
    PackData,
    FlatAddressing,
    ObjectTimestamp,
    Unknown(u8),
}

impl LinkerDirective {
    pub fn kind(&self) -> DirectiveKind {
        match self.directive {
            b'D' => DirectiveKind::SourceLanguage,
            b'L' => DirectiveKind::DefaultLibrary,
            b'O' => DirectiveKind::OptimizeFarCalls,
            b'U' => DirectiveKind::OptimizeUnsafe,
            b'V' => DirectiveKind::VirtualFunctionTable,
            b'P' => DirectiveKind::VirtualFunctionPure,
            b'R' => DirectiveKind::VirtualFunctionReference,
            b'7' => DirectiveKind::PackData,
            b'F' => DirectiveKind::FlatAddressing,
            b'T' => DirectiveKind::ObjectTimestamp,
            other => DirectiveKind::Unknown(other),
        }
    }
}

pub(crate) fn decode_coment(body: &[u8], warnings: &mut Vec<Warning>) -> Result<Coment, OmfError> {
    if body.len() < 2 {
        return Err(OmfError::Truncated("COMENT record body".into()));
    }
    let flags = body[0];
    let cls = body[1];
    let text = &body[2..];

    let payload = match cls {
        class::TRANSLATOR => ComentPayload::Translator(text.to_vec()),
        class::COPYRIGHT => ComentPayload::Copyright(text.to_vec()),
        class::LIB_SPEC => ComentPayload::LibSpec(text.to_vec()),
        class::PROC_MODEL => ComentPayload::ProcModel(text.to_vec()),
        class::DOS_VERSION => ComentPayload::DosVersion(text.to_vec()),
        class::MEMORY_MODEL => ComentPayload::MemoryModel(text.to_vec()),
        class::DOSSEG if text.is_empty() => ComentPayload::DosSeg,
        class::DEFAULT_LIBRARY => ComentPayload::DefaultLibrary(text.to_vec()),
        class::OMF_EXTENSION => decode_extension(text, warnings),
        class::DEBUG_INFO => ComentPayload::DebugInfo(text.to_vec()),
        class::LINK_PASS => ComentPayload::LinkPass(text.to_vec()),
        class::LIBMOD => ComentPayload::LibMod(text.to_vec()),
        class::EXESTR => ComentPayload::ExeStr(text.to_vec()),
        class::INCERR if text.is_empty() => ComentPayload::IncErr,
        class::NOPAD => match decode_index_list(text) {
            Some(indices) => ComentPayload::NoPad(indices),
            None => ComentPayload::Unknown(text.to_vec()),
        },
        class::WKEXT => match decode_extern_pairs(text) {
            Some(pairs) => ComentPayload::WkExt(pairs),
            None => ComentPayload::Unknown(text.to_vec()),
        },
        class::LZEXT => match decode_extern_pairs(text) {
            Some(pairs) => ComentPayload::LzExt(pairs),
            None => ComentPayload::Unknown(text.to_vec()),
        },
        class::EASY_OMF => ComentPayload::EasyOmf(text.to_vec()),
        class::BORLAND_FIRST..=class::BORLAND_LAST => ComentPayload::Borland(text.to_vec()),
        class::DEPENDENCY => ComentPayload::Dependency(text.to_vec()),
        class::DISASM_DIRECTIVE => match decode_disasm(text) {
            Some(directive) => ComentPayload::DisasmDirective(directive),
            None => {
                warnings.push(Warning::UnknownCommentSubtype {
                    class: cls,
                    subtype: text.first().copied().unwrap_or(0),
                });
                ComentPayload::Unknown(text.to_vec())
            }
        },
        class::LINKER_DIRECTIVE => match text.split_first() {
            Some((&directive, data)) => {
                let parsed = LinkerDirective {
                    directive,
                    data: data.to_vec(),
                };
                if matches!(parsed.kind(), DirectiveKind::Unknown(_)) {
                    warnings.push(Warning::UnknownCommentSubtype {
                        class: cls,
                        subtype: directive,
                    });
                }
                ComentPayload::LinkerDirective(parsed)
            }
            None => ComentPayload::Unknown(Vec::new()),
        },
        class::COMMAND_LINE => ComentPayload::CommandLine(text.to_vec()),
        _ => ComentPayload::Unknown(text.to_vec()),
    };

    Ok(Coment {
        flags,
        class: cls,
        payload,
    })
}

fn decode_extension(text: &[u8], warnings: &mut Vec<Warning>) -> ComentPayload {
    let Some((&subtype, rest)) = text.split_first() else {
        warnings.push(Warning::UnknownCommentSubtype {
            class: class::OMF_EXTENSION,
            subtype: 0,
        });
        return ComentPayload::Unknown(Vec::new());
    };

    let decoded = match subtype {
        0x01 => decode_impdef(rest).map(OmfExtension::ImpDef),
        0x02 => decode_expdef(rest).map(OmfExtension::ExpDef),
        0x03 => decode_incdef(rest).map(OmfExtension::IncDef),
        0x04 => Some(OmfExtension::ProtectedLib(rest.to_vec())),
        0x05 => decode_lnkdir(rest).map(OmfExtension::LnkDir),
        0x06 => Some(OmfExtension::BigEndian(rest.to_vec())),
        0x07 => Some(OmfExtension::PreComp(rest.to_vec())),
        _ => None,
    };

    match decoded {
        Some(extension) => ComentPayload::Extension(extension),
        None => {
            warnings.push(Warning::UnknownCommentSubtype {
                class: class::OMF_EXTENSION,
                subtype,
            });
            ComentPayload::Extension(OmfExtension::Unknown {
                subtype,
                data: rest.to_vec(),
            })
        }
    }
}

fn decode_impdef(data: &[u8]) -> Option<ImpDef> {
    let mut cur = Cursor::new(data);
    let ord_flag = cur.read_le::<u8>().ok()?;
    let internal_name: Name = cur.read_le().ok()?;
    let module_name: Name = cur.read_le().ok()?;
    let entry = if ord_flag != 0 {
        ImportEntry::Ordinal(cur.read_le::<u16>().ok()?)
    } else {
        ImportEntry::Name(cur.read_le().ok()?)
    };
    if (cur.position() as usize) != data.len() {
        return None;
    }
    Some(ImpDef {
        internal_name,
        module_name,
        entry,
    })
}

fn decode_expdef(data: &[u8]) -> Option<ExpDef> {
    let mut cur = Cursor::new(data);
    let flags = cur.read_le::<u8>().ok()?;
    let exported_name: Name = cur.read_le().ok()?;
    let internal_name: Name = cur.read_le().ok()?;
    let ordinal = if flags & 0x80 != 0 {
        Some(cur.read_le::<u16>().ok()?)
    } else {
        None
    };
    if (cur.position() as usize) != data.len() {
        return None;
    }
    Some(ExpDef {
        flags,
        exported_name,
        internal_name,
        ordinal,
    })
}

fn decode_incdef(data: &[u8]) -> Option<IncDef> {
    if data.len() < 4 {
        return None;
    }
    Some(IncDef {
        extdef_delta: i16::from_le_bytes([data[0], data[1]]),
        linnum_delta: i16::from_le_bytes([data[2], data[3]]),
        padding: data[4..].to_vec(),
    })
}

fn decode_lnkdir(data: &[u8]) -> Option<LnkDir> {
    if data.len() != 3 {
        return None;
    }
    Some(LnkDir {
        flags: data[0],
        pcode_version: data[1],
        cv_version: data[2],
    })
}

fn decode_index_list(data: &[u8]) -> Option<Vec<Index>> {
    let mut cur = Cursor::new(data);
    let mut indices = Vec::new();
    while (cur.position() as usize) < data.len() {
        indices.push(cur.read_le::<Index>().ok()?);
    }
    Some(indices)
}

fn decode_extern_pairs(data: &[u8]) -> Option<Vec<ExternPair>> {
    let mut cur = Cursor::new(data);
    let mut pairs = Vec::new();
    while (cur.position() as usize) < data.len() {
        let weak: Index = cur.read_le().ok()?;
        let default: Index = cur.read_le().ok()?;
        pairs.push(ExternPair { weak, default });
    }
    Some(pairs)
}

fn decode_disasm(data: &[u8]) -> Option<DisasmDirective> {
    let mut cur = Cursor::new(data);
    let kind = cur.read_le::<u8>().ok()?;
    if kind != b's' && kind != b'S' {
        return None;
    }
    let segment: Index = cur.read_le().ok()?;
    let name = if segment.is_none() {
        Some(cur.read_le::<Index>().ok()?)
    } else {
        None
    };
    let (start, end) = if kind == b'S' {
        (cur.read_le::<u32>().ok()?, cur.read_le::<u32>().ok()?)
    } else {
        (
            u32::from(cur.read_le::<u16>().ok()?),
            u32::from(cur.read_le::<u16>().ok()?),
        )
    };
    if (cur.position() as usize) != data.len() {
        return None;
    }
    Some(DisasmDirective {
        kind,
        segment,
        name,
        start,
        end,
    })
}

fn encode_extension(extension: &OmfExtension, out: &mut Vec<u8>) {
    match extension {
        OmfExtension::ImpDef(impdef) => {
            out.push(0x01);
            match &impdef.entry {
                ImportEntry::Ordinal(ordinal) => {
                    out.push(0x01);
                    impdef.internal_name.encode(out);
                    impdef.module_name.encode(out);
                    put_u16(out, *ordinal);
                }
                ImportEntry::Name(name) => {
                    out.push(0x00);
                    impdef.internal_name.encode(out);
                    impdef.module_name.encode(out);
                    name.encode(out);
                }
            }
        }
        OmfExtension::ExpDef(expdef) => {
            out.push(0x02);
            out.push(expdef.flags);
            expdef.exported_name.encode(out);
            expdef.internal_name.encode(out);
            if let Some(ordinal) = expdef.ordinal {
                put_u16(out, ordinal);
            }
        }
        OmfExtension::IncDef(incdef) => {
            out.push(0x03);
            out.extend_from_slice(&incdef.extdef_delta.to_le_bytes());
            out.extend_from_slice(&incdef.linnum_delta.to_le_bytes());
            out.extend_from_slice(&incdef.padding);
        }
        OmfExtension::ProtectedLib(data) => {
            out.push(0x04);
            out.extend_from_slice(data);
        }
        OmfExtension::LnkDir(lnkdir) => {
            out.push(0x05);
            out.push(lnkdir.flags);
            out.push(lnkdir.pcode_version);
            out.push(lnkdir.cv_version);
        }
        OmfExtension::BigEndian(data) => {
            out.push(0x06);
            out.extend_from_slice(data);
        }
        OmfExtension::PreComp(data) => {
            out.push(0x07);
            out.extend_from_slice(data);
        }
        OmfExtension::Unknown { subtype, data } => {
            out.push(*subtype);
            out.extend_from_slice(data);
        }
    }
}

pub(crate) fn encode_coment(coment: &Coment, out: &mut Vec<u8>) {
    out.push(coment.flags);
    out.push(coment.class);
    match &coment.payload {
        ComentPayload::Translator(data)
        | ComentPayload::Copyright(data)
        | ComentPayload::LibSpec(data)
        | ComentPayload::ProcModel(data)
        | ComentPayload::DosVersion(data)
        | ComentPayload::MemoryModel(data)
        | ComentPayload::DefaultLibrary(data)
        | ComentPayload::DebugInfo(data)
        | ComentPayload::LinkPass(data)
        | ComentPayload::LibMod(data)
        | ComentPayload::ExeStr(data)
        | ComentPayload::EasyOmf(data)
        | ComentPayload::Borland(data)
        | ComentPayload::Dependency(data)
        | ComentPayload::CommandLine(data)
        | ComentPayload::Unknown(data) => out.extend_from_slice(data),
        ComentPayload::DosSeg | ComentPayload::IncErr => {}
        ComentPayload::Extension(extension) => encode_extension(extension, out),
        ComentPayload::NoPad(indices) => {
            for index in indices {
                index.encode(out);
            }
        }
        ComentPayload::WkExt(pairs) | ComentPayload::LzExt(pairs) => {
            for pair in pairs {
                pair.weak.encode(out);
                pair.default.encode(out);
            }
        }
        ComentPayload::DisasmDirective(directive) => {
            out.push(directive.kind);
            directive.segment.encode(out);
            if let Some(name) = directive.name {
                name.encode(out);
            }
            if directive.kind == b'S' {
                crate::put_u32(out, directive.start);
                crate::put_u32(out, directive.end);
            } else {
                put_u16(out, directive.start as u16);
                put_u16(out, directive.end as u16);
            }
        }
        ComentPayload::LinkerDirective(directive) => {
            out.push(directive.directive);
            out.extend_from_slice(&directive.data);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(body: &[u8]) -> (Coment, Vec<Warning>) {
        let mut warnings = Vec::new();
        let coment = decode_coment(body, &mut warnings).expect("coment");
        (coment, warnings)
    }

    fn round_trip(body: &[u8]) -> Coment {
        let (coment, _) = decode(body);
        let mut out = Vec::new();
        encode_coment(&coment, &mut out);
        assert_eq!(out, body);
        coment
    }

    #[test]
    fn test_translator() {
        let coment = round_trip(b"\x00\x00Watcom C v11");
        assert_eq!(coment.payload, ComentPayload::Translator(b"Watcom C v11".to_vec()));
        assert!(!coment.no_purge());
    }

    #[test]
    fn test_easy_omf_marker() {
        let coment = round_trip(b"\x80\xAA80386");
        assert!(coment.no_purge());
        assert_eq!(coment.payload, ComentPayload::EasyOmf(b"80386".to_vec()));
    }

    #[test]
    fn test_link_pass_separator() {
        let coment = round_trip(&[0x40, 0xA2, 0x01]);
        assert!(coment.payload.is_pass_two_separator());
    }

    #[test]
    fn test_wkext_pairs() {
        let (coment, warnings) = decode(&[0x00, 0xA8, 0x01, 0x02, 0x82, 0x10, 0x03]);
        assert!(warnings.is_empty());
        let ComentPayload::WkExt(pairs) = &coment.payload else {
            panic!("expected WKEXT");
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].weak.value(), 1);
        assert_eq!(pairs[0].default.value(), 2);
        assert_eq!(pairs[1].weak.value(), 0x210);
        assert_eq!(pairs[1].default.value(), 3);
        round_trip(&[0x00, 0xA8, 0x01, 0x02, 0x82, 0x10, 0x03]);
    }

    #[test]
    fn test_impdef_by_name() {
        // ord_flag 0, internal "DOSOPEN", module "DOSCALLS", entry "".
        let mut body = vec![0x00, 0xA0, 0x01, 0x00];
        body.push(7);
        body.extend_from_slice(b"DOSOPEN");
        body.push(8);
        body.extend_from_slice(b"DOSCALLS");
        body.push(0);
        let coment = round_trip(&body);
        let ComentPayload::Extension(OmfExtension::ImpDef(impdef)) = &coment.payload else {
            panic!("expected IMPDEF");
        };
        assert!(!impdef.by_ordinal());
        assert_eq!(impdef.internal_name.as_bytes(), b"DOSOPEN");
        assert_eq!(impdef.module_name.as_bytes(), b"DOSCALLS");
        assert_eq!(impdef.entry, ImportEntry::Name(Name::new(Vec::new())));
    }

    #[test]
    fn test_impdef_by_ordinal() {
        let mut body = vec![0x00, 0xA0, 0x01, 0x01];
        body.push(3);
        body.extend_from_slice(b"FOO");
        body.push(3);
        body.extend_from_slice(b"BAR");
        body.extend_from_slice(&42u16.to_le_bytes());
        let coment = round_trip(&body);
        let ComentPayload::Extension(OmfExtension::ImpDef(impdef)) = &coment.payload else {
            panic!("expected IMPDEF");
        };
        assert_eq!(impdef.entry, ImportEntry::Ordinal(42));
    }

    #[test]
    fn test_unknown_extension_subtype_preserved() {
        let (coment, warnings) = decode(&[0x00, 0xA0, 0x7E, 0xDE, 0xAD]);
        assert_eq!(
            warnings,
            vec![Warning::UnknownCommentSubtype {
                class: 0xA0,
                subtype: 0x7E
            }]
        );
        assert_eq!(
            coment.payload,
            ComentPayload::Extension(OmfExtension::Unknown {
                subtype: 0x7E,
                data: vec![0xDE, 0xAD]
            })
        );
        round_trip(&[0x00, 0xA0, 0x7E, 0xDE, 0xAD]);
    }

    #[test]
    fn test_watcom_disasm_directive() {
        // 's': segment 1, start 0x10, end 0x20.
        let body = [0x00, 0xFD, b's', 0x01, 0x10, 0x00, 0x20, 0x00];
        let coment = round_trip(&body);
        let ComentPayload::DisasmDirective(directive) = &coment.payload else {
            panic!("expected disasm directive");
        };
        assert_eq!(directive.segment.value(), 1);
        assert_eq!(directive.name, None);
        assert_eq!((directive.start, directive.end), (0x10, 0x20));
    }

    #[test]
    fn test_linker_directive_kinds() {
        let body = [0x00, 0xFE, b'L', 0x01, b'G', b'R', b'A', b'P', b'H'];
        let coment = round_trip(&body);
        let ComentPayload::LinkerDirective(directive) = &coment.payload else {
            panic!("expected linker directive");
        };
        assert_eq!(directive.kind(), DirectiveKind::DefaultLibrary);
    }

    #[test]
    fn test_unknown_class_preserved() {
        let body = [0x00, 0xC7, 0x01, 0x02, 0x03];
        let coment = round_trip(&body);
        assert_eq!(coment.payload, ComentPayload::Unknown(vec![1, 2, 3]));
    }

    #[test]
    fn test_dosseg() {
        let coment = round_trip(&[0x80, 0x9E]);
        assert_eq!(coment.payload, ComentPayload::DosSeg);
    }
}
