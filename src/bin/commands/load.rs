use anyhow::{anyhow, Result};
use clap::Args;
use erdb::DbConnection;
use std::path::PathBuf;

/// Arguments for the Load command
#[derive(Args)]
pub struct LoadArgs {
    /// Script of semicolon-terminated statements
    #[clap(name = "SCRIPT")]
    pub script: PathBuf,
}

pub fn run(db: &DbConnection, args: LoadArgs) -> Result<()> {
    let LoadArgs { script } = args;
    let count = db
        .script_update(&script)
        .map_err(|e| anyhow!("Failed to load {}: {}", script.display(), e))?;
    println!("{} statements executed from {}", count, script.display());
    Ok(())
}
