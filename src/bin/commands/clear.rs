use anyhow::Result;
use clap::Args;
use erdb::DbConnection;

/// Arguments for the Clear command
#[derive(Args)]
pub struct ClearArgs {
    /// Do not ask for confirmation
    #[clap(short, long)]
    pub yes: bool,
}

pub fn run(db: &DbConnection, args: ClearArgs) -> Result<()> {
    if !args.yes {
        eprintln!(
            "This drops every table in {}. Re-run with --yes to confirm.",
            db.location()
        );
        return Ok(());
    }
    let count = db.clear_tables()?;
    println!("{} tables dropped", count);
    Ok(())
}
