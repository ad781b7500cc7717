use anyhow::Result;
use clap::Args;
use erdb::DbConnection;
use itertools::Itertools;

/// Arguments for the Describe command
#[derive(Args)]
pub struct DescribeArgs {
    /// Table name (case-insensitive)
    #[clap()]
    pub table: String,

    /// Output the table descriptor as JSON
    #[clap(long)]
    pub json: bool,
}

pub fn run(db: &DbConnection, args: DescribeArgs) -> Result<()> {
    let DescribeArgs { table, json } = args;
    let table = db.get_table(&table)?;

    if json {
        println!("{}", serde_json::to_string_pretty(table.as_ref())?);
        return Ok(());
    }

    println!("Table {}", table.name());
    println!("Primary key: {}", table.primary_key().unwrap_or("(none)"));
    if let Some(placement) = table.placement() {
        println!("Diagram position: row {}, column {}", placement.row, placement.column);
    }
    for field in table.fields() {
        let line = [
            field.name.as_str(),
            field.logical_type.name(),
            if field.nullable { "null" } else { "not null" },
            field.comment.as_deref().unwrap_or(""),
        ]
        .iter()
        .join("\t");
        println!("  {}", line.trim_end());
    }
    for (neighbor, link) in table.links().sorted_by_key(|(name, _)| *name) {
        println!(
            "  link {}: {} = {}.{}",
            neighbor, link.local_column, neighbor, link.other_column
        );
    }
    Ok(())
}
