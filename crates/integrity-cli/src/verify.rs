//! # integrity verify
//!
//! Checks each named file against its own name. Exits 2 on the first
//! corrupt file.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use console::style;
use integrity_core::{verify_file, Verification};

pub fn cmd_verify(files: &[PathBuf]) -> Result<ExitCode> {
    for file in files {
        let verdict = verify_file(file)
            .with_context(|| format!("Failed to verify {}", file.display()))?;

        match verdict {
            Verification::Valid => {
                println!("File {} validates {}!", file.display(), style("[OK]").green());
            }
            Verification::Corrupt(corruption) => {
                println!("{corruption}");
                println!("File {} corrupt {}!", file.display(), style("[ERROR]").red().bold());
                return Ok(ExitCode::from(2));
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
