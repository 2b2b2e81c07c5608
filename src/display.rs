// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

use std::default::Default;
use std::fmt::{Display, Formatter, Result};

use crate::coment::{self, ComentPayload};
use crate::fixup::FixupSubrecord;
use crate::records::ComdatData;
use crate::{Library, Module, Record, RecordBody};

/// Options for displaying [`Module`] and [`Library`] data.
#[derive(Default)]
pub struct Options {
    /// Emit hex dumps of LEDATA/COMDAT payloads.
    pub show_data: bool,

    /// Whether or not to recurse into each member of a [`Library`].
    pub recursive: bool,
}

/// Display something with options.
pub trait DisplayWithOptions: Display {
    fn fmt_with_options(&self, f: &mut Formatter<'_>, _options: &Options) -> Result {
        self.fmt(f)
    }
}

pub struct OmfDisplayable<'a, P: DisplayWithOptions> {
    p: &'a P,
    options: Options,
}

impl<'a, P> OmfDisplayable<'a, P>
where
    P: DisplayWithOptions,
{
    pub fn wrap(p: &'a P, options: Options) -> OmfDisplayable<'a, P> {
        Self { p, options }
    }
}

impl<P> Display for OmfDisplayable<'_, P>
where
    P: DisplayWithOptions,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.p.fmt_with_options(f, &self.options)
    }
}

fn hex_dump(f: &mut Formatter<'_>, data: &[u8]) -> Result {
    for (i, chunk) in data.chunks(16).enumerate() {
        write!(f, "    {:04x}:", i * 16)?;
        for byte in chunk {
            write!(f, " {:02x}", byte)?;
        }
        writeln!(f)?;
    }
    Ok(())
}

impl Display for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.fmt_with_options(f, &Options::default())
    }
}

impl DisplayWithOptions for Record {
    fn fmt_with_options(&self, f: &mut Formatter<'_>, options: &Options) -> Result {
        write!(f, "{:<9}", self.type_name())?;
        match &self.body {
            RecordBody::Theadr(h) | RecordBody::Lheadr(h) => {
                write!(f, " name '{}'", h.name)
            }
            RecordBody::Coment(c) => {
                write!(
                    f,
                    " class {:#04x} ({})",
                    c.class,
                    coment::class_name(c.class)
                )?;
                match &c.payload {
                    ComentPayload::Translator(text)
                    | ComentPayload::MemoryModel(text)
                    | ComentPayload::DefaultLibrary(text)
                    | ComentPayload::LibMod(text)
                    | ComentPayload::ExeStr(text)
                    | ComentPayload::EasyOmf(text) => {
                        write!(f, " \"{}\"", String::from_utf8_lossy(text))
                    }
                    ComentPayload::LinkPass(_) if c.payload.is_pass_two_separator() => {
                        write!(f, " [start of pass 2]")
                    }
                    ComentPayload::WkExt(pairs) | ComentPayload::LzExt(pairs) => {
                        write!(f, " {} pair(s)", pairs.len())
                    }
                    _ => Ok(()),
                }
            }
            RecordBody::ModEnd(m) => {
                write!(
                    f,
                    " main={} start={}",
                    if m.is_main() { "yes" } else { "no" },
                    if m.has_start() { "yes" } else { "no" }
                )
            }
            RecordBody::ExtDef(e) | RecordBody::LExtDef(e) => {
                write!(f, " {} external(s):", e.externals.len())?;
                for entry in &e.externals {
                    write!(f, " '{}'", entry.name)?;
                }
                Ok(())
            }
            RecordBody::CExtDef(c) => write!(f, " {} COMDAT external(s)", c.externals.len()),
            RecordBody::PubDef(p) | RecordBody::LPubDef(p) => {
                write!(
                    f,
                    " group {} segment {}",
                    p.base_group.value(),
                    p.base_segment.value()
                )?;
                if let Some(frame) = p.base_frame {
                    write!(f, " frame {frame:04x}")?;
                }
                for public in &p.publics {
                    write!(f, " '{}'@{:x}", public.name, public.offset)?;
                }
                Ok(())
            }
            RecordBody::LinNum(l) => {
                write!(
                    f,
                    " segment {} with {} line(s)",
                    l.base_segment.value(),
                    l.entries.len()
                )
            }
            RecordBody::LNames(n) | RecordBody::LlNames(n) => {
                for name in &n.names {
                    write!(f, " '{name}'")?;
                }
                Ok(())
            }
            RecordBody::SegDef(s) => {
                write!(
                    f,
                    " {:?}/{:?} length {:#x} name {} class {}",
                    s.alignment,
                    s.combination,
                    s.effective_length(self.is_32bit()),
                    s.segment_name.value(),
                    s.class_name.value()
                )
            }
            RecordBody::GrpDef(g) => {
                write!(
                    f,
                    " name {} with {} component(s)",
                    g.name.value(),
                    g.components.len()
                )
            }
            RecordBody::Fixupp(x) => {
                let threads = x
                    .subrecords
                    .iter()
                    .filter(|s| matches!(s, FixupSubrecord::Thread(_)))
                    .count();
                write!(
                    f,
                    " {} thread(s), {} fixup(s)",
                    threads,
                    x.subrecords.len() - threads
                )
            }
            RecordBody::LeData(d) => {
                write!(
                    f,
                    " segment {} offset {:#x}, {} byte(s)",
                    d.segment.value(),
                    d.offset,
                    d.data.len()
                )?;
                if options.show_data && !d.data.is_empty() {
                    writeln!(f)?;
                    hex_dump(f, &d.data)?;
                }
                Ok(())
            }
            RecordBody::LiData(d) => {
                write!(
                    f,
                    " segment {} offset {:#x}, expands to {} byte(s)",
                    d.segment.value(),
                    d.offset,
                    d.expanded_size()
                )
            }
            RecordBody::ComDef(c) | RecordBody::LComDef(c) => {
                write!(f, " {} communal(s):", c.communals.len())?;
                for communal in &c.communals {
                    write!(f, " '{}'[{}]", communal.name, communal.size())?;
                }
                Ok(())
            }
            RecordBody::BakPat(b) => {
                write!(
                    f,
                    " segment {} with {} patch(es)",
                    b.segment.value(),
                    b.patches.len()
                )
            }
            RecordBody::NbkPat(n) => {
                write!(
                    f,
                    " name {} with {} patch(es)",
                    n.name.value(),
                    n.patches.len()
                )
            }
            RecordBody::ComDat(c) => {
                write!(
                    f,
                    " name {} {:?}/{:?} offset {:#x}",
                    c.name.value(),
                    c.selection(),
                    c.allocation(),
                    c.offset
                )?;
                if c.is_continuation() {
                    write!(f, " [continuation]")?;
                }
                if let ComdatData::Enumerated(data) = &c.data {
                    write!(f, ", {} byte(s)", data.len())?;
                    if options.show_data && !data.is_empty() {
                        writeln!(f)?;
                        hex_dump(f, data)?;
                    }
                }
                Ok(())
            }
            RecordBody::LinSym(l) => {
                write!(
                    f,
                    " name {} with {} line(s)",
                    l.name.value(),
                    l.entries.len()
                )
            }
            RecordBody::Alias(a) => {
                for entry in &a.aliases {
                    write!(f, " '{}'->'{}'", entry.alias, entry.substitute)?;
                }
                Ok(())
            }
            RecordBody::VerNum(v) => write!(f, " version '{}'", v.version),
            RecordBody::VendExt(v) => {
                write!(f, " vendor {} with {} byte(s)", v.vendor, v.data.len())
            }
            RecordBody::Obsolete(o) => write!(f, " (obsolete) {} byte(s)", o.data.len()),
            RecordBody::Unknown(o) => {
                write!(f, " ({:#04x}) {} byte(s)", self.rec_type, o.data.len())
            }
        }
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.fmt_with_options(f, &Options::default())
    }
}

impl DisplayWithOptions for Module {
    fn fmt_with_options(&self, f: &mut Formatter<'_>, options: &Options) -> Result {
        writeln!(f, "Module : {} ({})", self.name().unwrap_or_default(), self.variant)?;
        for record in &self.records {
            record.fmt_with_options(f, options)?;
            writeln!(f)?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

impl DisplayWithOptions for Library {
    fn fmt_with_options(&self, f: &mut Formatter<'_>, options: &Options) -> Result {
        writeln!(
            f,
            "Library : page size {}, {} module(s){}",
            self.page_size,
            self.members.len(),
            if self.case_sensitive() {
                ", case sensitive"
            } else {
                ""
            }
        )?;
        for member in &self.members {
            match &member.module {
                Ok(module) => {
                    if options.recursive {
                        writeln!(f, "--- page {} ---", member.page)?;
                        module.fmt_with_options(f, options)?;
                    } else {
                        writeln!(
                            f,
                            "  page {:<5} {}",
                            member.page,
                            module.name().unwrap_or_default()
                        )?;
                    }
                }
                Err(err) => writeln!(f, "  page {:<5} <error: {err}>", member.page)?,
            }
        }
        if let Some(dictionary) = &self.dictionary {
            let symbols: usize = dictionary.blocks.iter().map(|b| b.entries.len()).sum();
            writeln!(
                f,
                "Dictionary : {} block(s), {} symbol(s)",
                dictionary.blocks.len(),
                symbols
            )?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}
