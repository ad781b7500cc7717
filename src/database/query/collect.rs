//! Collectors that drain a result sequence keyed by one field.
//!
//! Keys are the report text of the key field, so a null key becomes "".

use crate::database::record::Record;
use crate::error::Result;
use std::collections::{HashMap, HashSet};

/// Map each record by the text of `key_spec`. Later records replace earlier
/// ones with the same key.
pub fn collect_map<I>(records: I, key_spec: &str) -> Result<HashMap<String, Record>>
where
    I: IntoIterator<Item = Result<Record>>,
{
    let mut map = HashMap::new();
    for record in records {
        let record = record?;
        map.insert(record.get_report_string(key_spec)?, record);
    }
    Ok(map)
}

/// The distinct text values of `key_spec`.
pub fn collect_set<I>(records: I, key_spec: &str) -> Result<HashSet<String>>
where
    I: IntoIterator<Item = Result<Record>>,
{
    records
        .into_iter()
        .map(|record| record?.get_report_string(key_spec))
        .collect()
}

/// Parallel form of [`collect_set`] over buffered records.
#[cfg(feature = "parallel")]
pub fn par_collect_set<I>(records: I, key_spec: &str) -> Result<HashSet<String>>
where
    I: rayon::iter::ParallelIterator<Item = Record>,
{
    use rayon::iter::ParallelIterator;

    records
        .map(|record| record.get_report_string(key_spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::query::Query;
    use crate::database::test_fixtures::fixture_db;

    #[test]
    fn test_collect_map() {
        let db = fixture_db();
        let mut query = Query::new(&db, "Feature").unwrap();
        query.select("Feature", &["fig_id", "seq_no"]).unwrap();
        let map = collect_map(query.iter().unwrap(), "Feature.fig_id").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["fig|83333.1.peg.3"].get_int("Feature.seq_no").unwrap(), 3);
    }

    #[test]
    fn test_collect_set() {
        let db = fixture_db();
        let mut query = Query::new(&db, "Feature FeatureToGroup").unwrap();
        query
            .select("Feature", &["genome_id"])
            .unwrap()
            .select("FeatureToGroup", &["group_id"])
            .unwrap();
        let groups = collect_set(query.iter().unwrap(), "FeatureToGroup.group_id").unwrap();
        assert_eq!(groups.len(), 1);
        assert!(groups.contains("PF00001"));
        let err = collect_set(query.iter().unwrap(), "Feature.missing").unwrap_err();
        assert!(err.is_schema());
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_par_collect_set() {
        let db = fixture_db();
        let mut query = Query::new(&db, "Genome").unwrap();
        query.select("Genome", &["genome_id"]).unwrap();
        let records = query.iter().unwrap().into_par_iter().unwrap();
        let ids = par_collect_set(records, "Genome.genome_id").unwrap();
        assert_eq!(ids.len(), 2);
    }
}
