// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

use std::fmt::{Debug, Display, Formatter};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Result};

use crate::{display, parse_library, parse_module, record_type, Library, Module};

#[derive(Debug)]
pub enum Type {
    Module(Module),
    Library(Library),
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Self::Module(module) => module as &dyn Display,
            Self::Library(library) => library as &dyn Display,
        }
        .fmt(f)
    }
}

impl display::DisplayWithOptions for Type {
    fn fmt_with_options(&self, f: &mut Formatter, options: &display::Options) -> std::fmt::Result {
        match self {
            Self::Module(module) => module as &dyn display::DisplayWithOptions,
            Self::Library(library) => library as &dyn display::DisplayWithOptions,
        }
        .fmt_with_options(f, options)
    }
}

pub fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    if !Path::exists(path) {
        bail!(format!("File not found: {}", path.display()));
    }

    Ok(std::fs::read(path)?)
}

/// Reads an OMF library or object module. If the file cannot be found
/// or does not contain valid data an error will be returned.
pub fn read(lib_or_obj_path: &Path) -> Result<Type> {
    let bytes = read_bytes(lib_or_obj_path)?;

    if bytes.is_empty() {
        bail!("File is empty");
    }

    match bytes[0] {
        record_type::LIBHDR => Ok(Type::Library(parse_library(&bytes)?)),
        record_type::THEADR | record_type::LHEADR => {
            Ok(Type::Module(parse_module(&bytes, None)?))
        }
        other => bail!(format!("Unrecognized first record type {other:#04x}")),
    }
}

/// Reads an OMF object module. If the file cannot be found or does not
/// contain valid data an error will be returned.
pub fn read_module(obj_path: &Path) -> Result<Module> {
    let bytes = read_bytes(obj_path)?;
    Ok(parse_module(&bytes, None)?)
}

/// Reads an OMF library. If the file cannot be found or does not
/// contain valid data an error will be returned.
pub fn read_library(lib_path: &Path) -> Result<Library> {
    let bytes = read_bytes(lib_path)?;
    Ok(parse_library(&bytes)?)
}

/// Writes an OMF object module. If the file cannot be written an error
/// will be returned.
pub fn write_module(module: &Module, file: &mut File) -> Result<()> {
    file.write_all(&module.dump())?;
    Ok(())
}

/// Writes an OMF library. If the file cannot be written an error will
/// be returned.
pub fn write_library(library: &Library, file: &mut File) -> Result<()> {
    file.write_all(&library.dump()?)?;
    Ok(())
}
