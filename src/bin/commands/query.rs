use anyhow::{anyhow, Result};
use clap::Args;
use erdb::database::query::path::parse_path;
use erdb::{DbConnection, Query};
use itertools::Itertools;

use super::write_line;

/// Arguments for the Query command
#[derive(Args)]
pub struct QueryArgs {
    /// Table path, e.g. "Genome Feature" or "Genome < Contig"
    #[clap(name = "PATH")]
    pub path: String,

    /// Select every field of a table in the path (repeatable)
    #[clap(long = "all", value_name = "TABLE")]
    pub all: Vec<String>,

    /// Select one field as TABLE.FIELD (repeatable)
    #[clap(short, long = "field", value_name = "TABLE.FIELD")]
    pub fields: Vec<String>,

    /// Sort by a field, TABLE.FIELD (repeatable)
    #[clap(short, long = "order", value_name = "TABLE.FIELD")]
    pub order: Vec<String>,

    /// Output each record as a JSON object
    #[clap(long)]
    pub json: bool,
}

pub fn run(db: &DbConnection, args: QueryArgs) -> Result<()> {
    let QueryArgs {
        path,
        mut all,
        fields,
        order,
        json,
    } = args;

    let mut query = Query::new(db, &path)?;
    if all.is_empty() && fields.is_empty() {
        // default to every field of the first table
        let first = parse_path(&path)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No tables found in path \"{}\"", path))?;
        all.push(first.spec);
    }
    for alias in &all {
        query.select_all(alias)?;
    }
    for spec in &fields {
        let (alias, field) = spec
            .split_once('.')
            .ok_or_else(|| anyhow!("Field \"{}\" must be written as TABLE.FIELD", spec))?;
        query.select(alias, &[field])?;
    }
    for spec in &order {
        query.order_by(spec)?;
    }

    let specs: Vec<String> = query.field_specs().map(str::to_string).collect();
    let mut stdout = std::io::stdout().lock();
    if !json && !write_line(&mut stdout, &specs.iter().join("\t"))? {
        return Ok(());
    }
    for record in query.iter()? {
        let record = record?;
        let line = if json {
            record.to_json().to_string()
        } else {
            let values = specs
                .iter()
                .map(|spec| record.get_report_string(spec))
                .collect::<erdb::Result<Vec<_>>>()?;
            values.iter().join("\t")
        };
        if !write_line(&mut stdout, &line)? {
            break;
        }
    }
    Ok(())
}
