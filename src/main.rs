// SPDX-FileCopyrightText: © 2025 TTKB, LLC
// SPDX-License-Identifier: BSD-3-CLAUSE

use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use omfx::display::{OmfDisplayable, Options};
use omfx::io::{self, read, read_library};

/// Inspect, check, and extract OMF object modules and libraries.
#[derive(Debug, Parser)]
#[clap(name = env!("CARGO_CRATE_NAME"), version)]
#[command(version, about, long_about = None)]
pub struct App {
    #[arg(required = false)]
    lib_or_obj: Option<PathBuf>,

    #[clap(subcommand)]
    command: Option<CLICommand>,
}

#[derive(Debug, Subcommand)]
enum CLICommand {
    /// prints information about the file
    Info {
        /// an OMF LIB or OBJ file
        #[arg(required = true)]
        lib_or_obj: PathBuf,

        /// show hex dumps of data records
        #[clap(short, long)]
        data: bool,

        /// list the records of every library member
        #[clap(short, long)]
        recursive: bool,
    },

    /// validates a file; exits non-zero on any fatal error
    Check {
        /// an OMF LIB or OBJ file
        #[arg(required = true)]
        lib_or_obj: PathBuf,
    },

    /// splits a library into its member OBJ files
    Split {
        /// the library to split
        #[arg(required = true)]
        lib: PathBuf,
    },

    /// lists the symbols in a library dictionary
    Dict {
        /// the library to read
        #[arg(required = true)]
        lib: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let args = App::parse();

    match args.command {
        Some(command) => match command {
            CLICommand::Info {
                lib_or_obj,
                data,
                recursive,
            } => info(lib_or_obj, data, recursive)?,
            CLICommand::Check { lib_or_obj } => return check(lib_or_obj),
            CLICommand::Split { lib } => split(lib)?,
            CLICommand::Dict { lib } => dict(lib)?,
        },
        None => match args.lib_or_obj {
            Some(lib_or_obj) => info(lib_or_obj, false, false)?,
            None => {
                let help = App::command().render_help();
                eprintln!("{}", help);
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}

fn info(lib_or_obj: PathBuf, data: bool, recursive: bool) -> Result<()> {
    let parsed = read(&lib_or_obj)?;
    let options = Options {
        show_data: data,
        recursive,
    };
    println!("{}", OmfDisplayable::wrap(&parsed, options));
    Ok(())
}

fn check(lib_or_obj: PathBuf) -> Result<ExitCode> {
    let parsed = match read(&lib_or_obj) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{}: {err}", lib_or_obj.display());
            return Ok(ExitCode::FAILURE);
        }
    };

    let warnings = match &parsed {
        io::Type::Module(module) => module.warnings.clone(),
        io::Type::Library(library) => {
            // A failed member is fatal for the file as a whole.
            for member in &library.members {
                if let Err(err) = &member.module {
                    eprintln!("{}: page {}: {err}", lib_or_obj.display(), member.page);
                    return Ok(ExitCode::FAILURE);
                }
            }
            let mut warnings = library.warnings.clone();
            for member in &library.members {
                if let Ok(module) = &member.module {
                    warnings.extend(module.warnings.iter().cloned());
                }
            }
            warnings
        }
    };

    for warning in &warnings {
        eprintln!("{}: warning: {warning}", lib_or_obj.display());
    }
    println!("{}: OK", lib_or_obj.display());
    Ok(ExitCode::SUCCESS)
}

fn split(lib_path: PathBuf) -> Result<()> {
    let library = read_library(&lib_path)?;
    for member in library.members.iter() {
        let module = match &member.module {
            Ok(module) => module,
            Err(err) => {
                eprintln!("skipping page {}: {err}", member.page);
                continue;
            }
        };
        let name = module
            .name()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| format!("PAGE{}", member.page));
        let stem = name
            .rsplit(['/', '\\'])
            .next()
            .and_then(|base| base.split('.').next())
            .unwrap_or("MODULE")
            .to_uppercase();
        let object_filename = format!("{stem}.OBJ");
        let mut file = File::create(&object_filename)?;
        io::write_module(module, &mut file)?;

        println!("Extracted object file {}", object_filename);
    }
    Ok(())
}

fn dict(lib_path: PathBuf) -> Result<()> {
    let library = read_library(&lib_path)?;
    let Some(dictionary) = &library.dictionary else {
        println!("no dictionary present");
        return Ok(());
    };

    for (block_number, block) in dictionary.blocks.iter().enumerate() {
        for entry in &block.entries {
            println!(
                "[{}:{:02}] '{}' -> page {}",
                block_number,
                entry.bucket,
                String::from_utf8_lossy(&entry.name),
                entry.page
            );
        }
    }
    Ok(())
}
