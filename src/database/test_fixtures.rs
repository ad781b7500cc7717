//! Shared test database: genomes, their contigs and features, and a keyless
//! feature-to-group table.

use crate::database::DbConnection;

pub const GENOME_FEATURE_SCHEMA: &str = "
CREATE TABLE Genome (genome_id TEXT PRIMARY KEY, genome_name TEXT, domain VARCHAR(20), complete INTEGER);
CREATE TABLE Contig (contig_id TEXT PRIMARY KEY, genome_id TEXT NOT NULL REFERENCES Genome, len INTEGER);
CREATE TABLE Feature (fig_id TEXT PRIMARY KEY, genome_id TEXT REFERENCES Genome, seq_no INT, location TEXT, gc DOUBLE, profile BLOB, created DOUBLE);
CREATE TABLE FeatureToGroup (fig_id TEXT NOT NULL REFERENCES Feature, group_id TEXT NOT NULL);
";

const SAMPLE_DATA: &str = "
INSERT INTO Genome (genome_id, genome_name, domain, complete) VALUES ('83333.1', 'Escherichia coli K-12', 'Bacteria', 1);
INSERT INTO Genome (genome_id, genome_name, domain, complete) VALUES ('511145.12', 'Escherichia coli MG1655', NULL, 0);
INSERT INTO Contig (contig_id, genome_id, len) VALUES ('NC_000913', '83333.1', 4641652);
INSERT INTO Feature (fig_id, genome_id, seq_no) VALUES ('fig|83333.1.peg.2', '83333.1', 2);
INSERT INTO Feature (fig_id, genome_id, seq_no) VALUES ('fig|83333.1.peg.1', '83333.1', 1);
INSERT INTO Feature (fig_id, genome_id, seq_no) VALUES ('fig|83333.1.peg.3', '83333.1', 3);
INSERT INTO FeatureToGroup (fig_id, group_id) VALUES ('fig|83333.1.peg.1', 'PF00001');
INSERT INTO FeatureToGroup (fig_id, group_id) VALUES ('fig|83333.1.peg.3', 'PF00001');
";

/// In-memory database with the Genome/Feature schema and no rows.
pub fn empty_fixture_db() -> DbConnection {
    let db = DbConnection::open_in_memory().unwrap();
    db.script_update_str(GENOME_FEATURE_SCHEMA).unwrap();
    db
}

/// In-memory database with the Genome/Feature schema and a few rows.
pub fn fixture_db() -> DbConnection {
    let db = empty_fixture_db();
    db.script_update_str(SAMPLE_DATA).unwrap();
    db
}
