//! Join path parsing
//!
//! A path names the tables of a query in join order. Tables separated by
//! whitespace are inner-joined, `<` makes a left outer join, and `&` moves the
//! join anchor back to a table already in the path without emitting a join.
//! Trailing digits on a table name form an alias, so `Genome1 Feature2 Genome3`
//! joins the Genome table twice.

use crate::error::{ErdbError, Result};
use regex::Regex;
use std::sync::OnceLock;

const FIRST_TABLE_PATTERN: &str = r"[^\s<>&]+";
const JOINED_TABLE_PATTERN: &str = r"(\s+|\s*[<&]\s*)([^\s<&]+)";

/// Compiled path patterns, built on first use
static FIRST_TABLE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
static JOINED_TABLE: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

fn pattern(
    cell: &'static OnceLock<std::result::Result<Regex, regex::Error>>,
    source: &str,
) -> Result<&'static Regex> {
    cell.get_or_init(|| Regex::new(source))
        .as_ref()
        .map_err(|e| ErdbError::schema(format!("Invalid path pattern: {}", e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    /// Re-anchor on an existing alias
    Reset,
}

impl JoinKind {
    fn from_delim(delim: &str) -> JoinKind {
        match delim {
            "<" => JoinKind::LeftOuter,
            "&" => JoinKind::Reset,
            _ => JoinKind::Inner,
        }
    }

    /// Join keyword with surrounding spaces (empty for a reset)
    pub fn sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => " INNER JOIN ",
            JoinKind::LeftOuter => " LEFT OUTER JOIN ",
            JoinKind::Reset => "",
        }
    }
}

/// One table reference in a path. The first step has no join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub join: Option<JoinKind>,
    pub spec: String,
}

/// Split a path into table references.
pub fn parse_path(path: &str) -> Result<Vec<PathStep>> {
    let first_table = pattern(&FIRST_TABLE, FIRST_TABLE_PATTERN)?;
    let joined_table = pattern(&JOINED_TABLE, JOINED_TABLE_PATTERN)?;

    let first = first_table
        .find(path)
        .ok_or_else(|| ErdbError::schema(format!("No tables found in path \"{}\".", path)))?;
    let mut steps = vec![PathStep {
        join: None,
        spec: first.as_str().to_string(),
    }];
    for caps in joined_table.captures_iter(&path[first.end()..]) {
        let delim = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        let spec = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        steps.push(PathStep {
            join: Some(JoinKind::from_delim(delim)),
            spec: spec.to_string(),
        });
    }
    Ok(steps)
}

/// Strip the alias suffix from a table spec to get the table name.
pub fn table_name(spec: &str) -> Result<&str> {
    let name = spec.trim_end_matches(|c: char| c.is_ascii_digit());
    if name.is_empty() {
        return Err(ErdbError::schema(
            "Invalid numeric table name specified in table path.",
        ));
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(steps: &[PathStep]) -> Vec<(Option<JoinKind>, &str)> {
        steps.iter().map(|s| (s.join, s.spec.as_str())).collect()
    }

    #[test]
    fn test_parse_path() {
        let steps = parse_path("  Genome1 Feature2").unwrap();
        assert_eq!(
            specs(&steps),
            vec![(None, "Genome1"), (Some(JoinKind::Inner), "Feature2")]
        );

        let steps = parse_path("Genome < Contig & Genome   Feature<FeatureToGroup").unwrap();
        assert_eq!(
            specs(&steps),
            vec![
                (None, "Genome"),
                (Some(JoinKind::LeftOuter), "Contig"),
                (Some(JoinKind::Reset), "Genome"),
                (Some(JoinKind::Inner), "Feature"),
                (Some(JoinKind::LeftOuter), "FeatureToGroup"),
            ]
        );

        assert!(parse_path("   ").unwrap_err().is_schema());
    }

    #[test]
    fn test_patterns_compiled_once() {
        let first = pattern(&FIRST_TABLE, FIRST_TABLE_PATTERN).unwrap() as *const Regex;
        parse_path("Genome Feature").unwrap();
        let again = pattern(&FIRST_TABLE, FIRST_TABLE_PATTERN).unwrap() as *const Regex;
        assert_eq!(first, again);

        // repeated parses keep giving the same answer
        for _ in 0..3 {
            let steps = parse_path("Genome<Contig").unwrap();
            assert_eq!(
                specs(&steps),
                vec![(None, "Genome"), (Some(JoinKind::LeftOuter), "Contig")]
            );
        }
    }

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("Genome12").unwrap(), "Genome");
        assert_eq!(table_name("Feature").unwrap(), "Feature");
        assert!(table_name("123").unwrap_err().is_schema());
    }
}
