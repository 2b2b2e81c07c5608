// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

//! FIXUPP record engine.
//!
//! A FIXUPP body is a sequence of THREAD and FIXUP subrecords. THREAD
//! state (four frame slots, four target slots) persists across all
//! FIXUPP records of a module until redefined, so the decoder threads a
//! [`ThreadState`] through the whole parse and resolves thread
//! references at the moment each FIXUP is decoded.
//!
//! The two Locat bytes are packed in the opposite of the usual OMF
//! little-endian convention: the first (lower-address) byte carries the
//! high bits. That layout is reproduced exactly; see [`decode_locat`]
//! and [`encode_locat`].

use binrw::io::Cursor;
use binrw::BinReaderExt;

use crate::{
    put_scalar, read_scalar, record_type, FileVariant, Index, IndexKind, OmfError, Tables, Warning,
    Width,
};

/// Per-module THREAD state: four frame threads and four target threads,
/// numbered by the Thred field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadState {
    pub frame: [Option<ThreadDef>; 4],
    pub target: [Option<ThreadDef>; 4],
}

impl ThreadState {
    fn set(&mut self, is_frame: bool, number: u8, def: ThreadDef) {
        let slot = usize::from(number & 0x03);
        if is_frame {
            self.frame[slot] = Some(def);
        } else {
            self.target[slot] = Some(def);
        }
    }
}

/// One recorded THREAD definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadDef {
    /// The 3-bit method field.
    pub method: u8,
    /// The index datum; meaningful for methods 0 through 2.
    pub datum: Index,
}

/// FIXUPP body: the subrecord sequence plus the index of the
/// LEDATA/LIDATA/COMDAT record the fixups patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixupp {
    pub subrecords: Vec<FixupSubrecord>,
    /// Position of the data-bearing anchor record in
    /// [`Module::records`](crate::Module::records); `None` for records
    /// containing only THREAD definitions.
    pub anchor: Option<usize>,
}

impl Fixupp {
    pub fn has_fixups(&self) -> bool {
        self.subrecords
            .iter()
            .any(|s| matches!(s, FixupSubrecord::Fixup(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixupSubrecord {
    Thread(Thread),
    Fixup(Fixup),
}

/// A THREAD subrecord: `0 D 0 Method:3 Thred:2`, with an index datum
/// for methods 0 through 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thread {
    /// D bit: set for a FRAME thread, clear for a TARGET thread.
    pub is_frame: bool,
    /// Thread slot, 0 through 3.
    pub number: u8,
    /// The 3-bit method field.
    pub method: u8,
    /// Index datum, present for methods 0 through 2.
    pub datum: Option<Index>,
}

/// The wire form of a FIXUP frame specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef {
    /// F = 1: use the given frame thread.
    Thread(u8),
    /// F0: the frame of a segment.
    Segment(Index),
    /// F1: the frame of a group.
    Group(Index),
    /// F2: the frame of an external's eventual location.
    External(Index),
    /// F3: an explicit frame number. Invalid per TIS; carries no datum.
    FrameNumber,
    /// F4: the frame of the data record being fixed up.
    Location,
    /// F5: the frame of the target.
    Target,
    /// F6/F7: undefined methods, preserved.
    Undefined(u8),
}

/// The wire form of a FIXUP target specification. The P bit is kept
/// separately on [`Fixup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef {
    /// T = 1: use the given target thread.
    Thread(u8),
    /// T0/T4: an offset within a segment.
    Segment(Index),
    /// T1/T5: an offset within a group.
    Group(Index),
    /// T2/T6: an offset past an external.
    External(Index),
    /// T3/T7: undefined per TIS; the datum is preserved.
    FrameNumber(Index),
}

/// A frame specification with any thread reference resolved to the
/// thread's recorded method and datum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedFrame {
    Segment(Index),
    Group(Index),
    External(Index),
    FrameNumber,
    Location,
    Target,
    Undefined(u8),
}

/// A target specification with any thread reference resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    Segment(Index),
    Group(Index),
    External(Index),
    FrameNumber(Index),
}

/// What a fixup patches, after applying the variant's Location map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixupLocation {
    /// Low-order byte.
    LowByte,
    /// 16-bit offset.
    Offset16,
    /// 16-bit selector.
    Base,
    /// 16:16 far pointer.
    Pointer32,
    /// High-order byte.
    HighByte,
    /// 16-bit loader-resolved offset.
    LoaderOffset16,
    /// 32-bit offset.
    Offset32,
    /// 16:32 far pointer.
    Pointer48,
    /// 32-bit loader-resolved offset.
    LoaderOffset32,
    /// Anything else, raw.
    Unknown(u8),
}

/// A FIXUP subrecord, wire-lossless: the raw location code, the 10-bit
/// data record offset, frame and target specifications, the P bit, and
/// the displacement when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    /// M bit: segment-relative when set, self-relative when clear.
    pub segment_relative: bool,
    /// Raw 4-bit location code; interpret with
    /// [`Fixup::location_kind`].
    pub location: u8,
    /// Offset into the anchor data record, 10 bits.
    pub data_offset: u16,
    pub frame: FrameRef,
    pub target: TargetRef,
    /// P bit: target displacement omitted (and zero) when set.
    pub p_bit: bool,
    pub displacement: Option<u32>,
    /// Frame resolved against the thread state in force when this
    /// fixup was decoded. `None` when the referenced thread was
    /// undefined.
    pub resolved_frame: Option<ResolvedFrame>,
    /// Target resolved the same way.
    pub resolved_target: Option<ResolvedTarget>,
}

impl Fixup {
    /// The location code interpreted per variant. PharLap Easy OMF-386
    /// reassigned code 5 to a 32-bit offset and 6 to a 16:32 pointer.
    pub fn location_kind(&self, variant: FileVariant) -> FixupLocation {
        let pharlap = matches!(variant, FileVariant::EasyOmf386);
        match (self.location, pharlap) {
            (0, _) => FixupLocation::LowByte,
            (1, _) => FixupLocation::Offset16,
            (2, _) => FixupLocation::Base,
            (3, _) => FixupLocation::Pointer32,
            (4, _) => FixupLocation::HighByte,
            (5, false) => FixupLocation::LoaderOffset16,
            (5, true) => FixupLocation::Offset32,
            (6, true) => FixupLocation::Pointer48,
            (9, _) => FixupLocation::Offset32,
            (11, _) => FixupLocation::Pointer48,
            (13, _) => FixupLocation::LoaderOffset32,
            (code, _) => FixupLocation::Unknown(code),
        }
    }
}

/// Split the two Locat bytes into (M, location, data record offset).
/// The first byte holds the high bits: `1 M Location:4 offset_hi:2`.
pub(crate) fn decode_locat(first: u8, second: u8) -> (bool, u8, u16) {
    let segment_relative = first & 0x40 != 0;
    let location = (first >> 2) & 0x0F;
    let data_offset = (u16::from(first & 0x03) << 8) | u16::from(second);
    (segment_relative, location, data_offset)
}

pub(crate) fn encode_locat(segment_relative: bool, location: u8, data_offset: u16) -> [u8; 2] {
    let first = 0x80
        | (u8::from(segment_relative) << 6)
        | ((location & 0x0F) << 2)
        | ((data_offset >> 8) as u8 & 0x03);
    [first, data_offset as u8]
}

fn thread_kind(method: u8) -> IndexKind {
    match method {
        0 => IndexKind::Segment,
        1 => IndexKind::Group,
        _ => IndexKind::Extern,
    }
}

fn resolve_thread_frame(def: ThreadDef) -> ResolvedFrame {
    match def.method {
        0 => ResolvedFrame::Segment(def.datum),
        1 => ResolvedFrame::Group(def.datum),
        2 => ResolvedFrame::External(def.datum),
        3 => ResolvedFrame::FrameNumber,
        4 => ResolvedFrame::Location,
        5 => ResolvedFrame::Target,
        m => ResolvedFrame::Undefined(m),
    }
}

fn resolve_thread_target(def: ThreadDef) -> ResolvedTarget {
    match def.method & 0x03 {
        0 => ResolvedTarget::Segment(def.datum),
        1 => ResolvedTarget::Group(def.datum),
        2 => ResolvedTarget::External(def.datum),
        _ => ResolvedTarget::FrameNumber(def.datum),
    }
}

/// Decode a FIXUPP body. Thread definitions mutate `threads` in place;
/// every index datum is validated against the tables at the moment it
/// is read, so invariant ordering holds even when a thread is redefined
/// mid-record.
pub(crate) fn decode_fixupp(
    body: &[u8],
    width: Width,
    tables: &Tables,
    threads: &mut ThreadState,
    warnings: &mut Vec<Warning>,
    record_offset: usize,
) -> Result<Fixupp, OmfError> {
    let mut cur = Cursor::new(body);
    let mut subrecords = Vec::new();

    while (cur.position() as usize) < body.len() {
        let subrecord_offset = record_offset + 3 + cur.position() as usize;
        let malformed = |_: binrw::Error| OmfError::MalformedFixupp {
            offset: subrecord_offset,
        };

        let first = cur.read_le::<u8>().map_err(malformed)?;
        if first & 0x80 == 0 {
            // THREAD subrecord: 0 D 0 Method:3 Thred:2.
            if first & 0x20 != 0 {
                warnings.push(Warning::ReservedBitsNonzero {
                    rec_type: record_type::FIXUPP,
                });
            }
            let is_frame = first & 0x40 != 0;
            let method = (first >> 2) & 0x07;
            let number = first & 0x03;
            let datum = if method < 3 {
                let datum: Index = cur.read_le().map_err(malformed)?;
                tables.check(thread_kind(method), datum)?;
                Some(datum)
            } else {
                None
            };
            threads.set(
                is_frame,
                number,
                ThreadDef {
                    method,
                    datum: datum.unwrap_or(Index::NONE),
                },
            );
            subrecords.push(FixupSubrecord::Thread(Thread {
                is_frame,
                number,
                method,
                datum,
            }));
            continue;
        }

        // FIXUP subrecord.
        let second = cur.read_le::<u8>().map_err(malformed)?;
        let (segment_relative, location, data_offset) = decode_locat(first, second);

        let fix_data = cur.read_le::<u8>().map_err(malformed)?;
        let f_bit = fix_data & 0x80 != 0;
        let frame_field = (fix_data >> 4) & 0x07;
        let t_bit = fix_data & 0x08 != 0;
        let p_bit = fix_data & 0x04 != 0;
        let targt = fix_data & 0x03;

        let (frame, resolved_frame) = if f_bit {
            let number = frame_field & 0x03;
            let def = threads.frame[usize::from(number)];
            if def.is_none() {
                warnings.push(Warning::UndefinedThread {
                    is_frame: true,
                    number,
                });
            }
            (FrameRef::Thread(number), def.map(resolve_thread_frame))
        } else {
            let frame = match frame_field {
                0 => {
                    let datum: Index = cur.read_le().map_err(malformed)?;
                    tables.check(IndexKind::Segment, datum)?;
                    FrameRef::Segment(datum)
                }
                1 => {
                    let datum: Index = cur.read_le().map_err(malformed)?;
                    tables.check(IndexKind::Group, datum)?;
                    FrameRef::Group(datum)
                }
                2 => {
                    let datum: Index = cur.read_le().map_err(malformed)?;
                    tables.check(IndexKind::Extern, datum)?;
                    FrameRef::External(datum)
                }
                3 => FrameRef::FrameNumber,
                4 => FrameRef::Location,
                5 => FrameRef::Target,
                m => {
                    warnings.push(Warning::ReservedBitsNonzero {
                        rec_type: record_type::FIXUPP,
                    });
                    FrameRef::Undefined(m)
                }
            };
            let resolved = match frame {
                FrameRef::Segment(i) => ResolvedFrame::Segment(i),
                FrameRef::Group(i) => ResolvedFrame::Group(i),
                FrameRef::External(i) => ResolvedFrame::External(i),
                FrameRef::FrameNumber => ResolvedFrame::FrameNumber,
                FrameRef::Location => ResolvedFrame::Location,
                FrameRef::Target => ResolvedFrame::Target,
                FrameRef::Undefined(m) => ResolvedFrame::Undefined(m),
                FrameRef::Thread(_) => unreachable!("explicit frame"),
            };
            (frame, Some(resolved))
        };

        // The displacement is present when the resolved target method,
        // P bit included, lands in {0, 1, 2}.
        let (target, resolved_target, target_low2) = if t_bit {
            let number = targt;
            let def = threads.target[usize::from(number)];
            if def.is_none() {
                warnings.push(Warning::UndefinedThread {
                    is_frame: false,
                    number,
                });
            }
            let low2 = def.map(|d| d.method & 0x03).unwrap_or(0);
            (
                TargetRef::Thread(number),
                def.map(resolve_thread_target),
                low2,
            )
        } else {
            let datum: Index = cur.read_le().map_err(malformed)?;
            let target = match targt {
                0 => {
                    tables.check(IndexKind::Segment, datum)?;
                    TargetRef::Segment(datum)
                }
                1 => {
                    tables.check(IndexKind::Group, datum)?;
                    TargetRef::Group(datum)
                }
                2 => {
                    tables.check(IndexKind::Extern, datum)?;
                    TargetRef::External(datum)
                }
                _ => TargetRef::FrameNumber(datum),
            };
            let resolved = match target {
                TargetRef::Segment(i) => ResolvedTarget::Segment(i),
                TargetRef::Group(i) => ResolvedTarget::Group(i),
                TargetRef::External(i) => ResolvedTarget::External(i),
                TargetRef::FrameNumber(i) => ResolvedTarget::FrameNumber(i),
                TargetRef::Thread(_) => unreachable!("explicit target"),
            };
            (target, Some(resolved), targt)
        };

        let displacement = if !p_bit && target_low2 != 3 {
            Some(read_scalar(&mut cur, width).map_err(malformed)?)
        } else {
            None
        };

        subrecords.push(FixupSubrecord::Fixup(Fixup {
            segment_relative,
            location,
            data_offset,
            frame,
            target,
            p_bit,
            displacement,
            resolved_frame,
            resolved_target,
        }));
    }

    Ok(Fixupp {
        subrecords,
        anchor: None,
    })
}

pub(crate) fn encode_fixupp(fixupp: &Fixupp, width: Width, out: &mut Vec<u8>) {
    for subrecord in &fixupp.subrecords {
        match subrecord {
            FixupSubrecord::Thread(thread) => {
                let byte = (u8::from(thread.is_frame) << 6)
                    | ((thread.method & 0x07) << 2)
                    | (thread.number & 0x03);
                out.push(byte);
                if let Some(datum) = thread.datum {
                    datum.encode(out);
                }
            }
            FixupSubrecord::Fixup(fixup) => {
                out.extend_from_slice(&encode_locat(
                    fixup.segment_relative,
                    fixup.location,
                    fixup.data_offset,
                ));

                let (f_bit, frame_bits) = match fixup.frame {
                    FrameRef::Thread(n) => (0x80, n & 0x03),
                    FrameRef::Segment(_) => (0, 0),
                    FrameRef::Group(_) => (0, 1),
                    FrameRef::External(_) => (0, 2),
                    FrameRef::FrameNumber => (0, 3),
                    FrameRef::Location => (0, 4),
                    FrameRef::Target => (0, 5),
                    FrameRef::Undefined(m) => (0, m & 0x07),
                };
                let (t_bit, targt) = match fixup.target {
                    TargetRef::Thread(n) => (0x08, n & 0x03),
                    TargetRef::Segment(_) => (0, 0),
                    TargetRef::Group(_) => (0, 1),
                    TargetRef::External(_) => (0, 2),
                    TargetRef::FrameNumber(_) => (0, 3),
                };
                let fix_data =
                    f_bit | (frame_bits << 4) | t_bit | (u8::from(fixup.p_bit) << 2) | targt;
                out.push(fix_data);

                match fixup.frame {
                    FrameRef::Segment(i) | FrameRef::Group(i) | FrameRef::External(i) => {
                        i.encode(out);
                    }
                    _ => {}
                }
                match fixup.target {
                    TargetRef::Segment(i)
                    | TargetRef::Group(i)
                    | TargetRef::External(i)
                    | TargetRef::FrameNumber(i) => {
                        i.encode(out);
                    }
                    TargetRef::Thread(_) => {}
                }
                if let Some(displacement) = fixup.displacement {
                    put_scalar(out, width, displacement);
                }
            }
        }
    }
}
