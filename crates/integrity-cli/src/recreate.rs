//! # integrity recreate
//!
//! Regenerates a file from the seed and size decoded out of its name.
//! The result lands next to any existing file under a `.n` suffix.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use integrity_config::{log_cli_debug, Config};
use integrity_core::{is_directory, Materializer, SizePolicy, Statvfs};

#[derive(Args, Debug)]
pub struct RecreateArgs {
    /// Directory to create the file in
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// Content seed from the file name
    #[arg(allow_hyphen_values = true)]
    seed: i64,

    /// Size in bytes from the file name
    size: u64,
}

pub fn cmd_recreate(config: &Config, args: RecreateArgs) -> Result<ExitCode> {
    if !is_directory(&args.directory) {
        println!("{} is not a directory!", args.directory.display());
        return Ok(ExitCode::from(1));
    }

    log_cli_debug!("Recreating file", seed = args.seed, size = args.size);

    let mut materializer = Materializer::new(Statvfs, SizePolicy::from(&config.fill));
    match materializer.materialize(&args.directory, Some(args.seed), Some(args.size))? {
        Some(created) => {
            println!("File recreated as {}", created.path.display());
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!(
                "No free name left for seed {} size {} in {}",
                args.seed,
                args.size,
                args.directory.display()
            );
            Ok(ExitCode::from(1))
        }
    }
}
