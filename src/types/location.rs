//! Contig locations
//!
//! A location is a stretch of a contig on one strand. Locations are stored as a
//! fixed-width string so that SQLite's text ordering matches positional ordering:
//! 31 characters of space-padded contig ID, a colon, a 10-digit left position,
//! the strand character, and a 9-digit length.

use crate::error::{ErdbError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Width of the padded contig ID in the encoded form
const CONTIG_WIDTH: usize = 31;
const LEFT_WIDTH: usize = 10;
const LENGTH_WIDTH: usize = 9;
const MAX_LEFT: i64 = 9_999_999_999;
const MAX_LENGTH: i64 = 999_999_999;

/// Length of an encoded location string
pub const LOCATION_ENCODED_LEN: usize = CONTIG_WIDTH + 1 + LEFT_WIDTH + 1 + LENGTH_WIDTH;

/// A region of a contig. Field order gives the derived ordering:
/// contig, then left position, then strand, then length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Location {
    contig: String,
    left: i64,
    strand: char,
    length: i64,
}

impl Default for Location {
    fn default() -> Self {
        Location {
            contig: String::new(),
            left: 0,
            strand: '+',
            length: 0,
        }
    }
}

impl Location {
    /// Create a location from its 1-based left position, strand, and length.
    pub fn new(contig: &str, left: i64, strand: char, length: i64) -> Result<Self> {
        if strand != '+' && strand != '-' {
            return Err(ErdbError::type_mismatch(format!(
                "Invalid strand '{}' in location on {}.",
                strand, contig
            )));
        }
        if left < 0 || length < 0 {
            return Err(ErdbError::type_mismatch(format!(
                "Negative position in location on {}.",
                contig
            )));
        }
        Ok(Location {
            contig: contig.to_string(),
            left,
            strand,
            length,
        })
    }

    /// Create a location from its left and right positions (both inclusive).
    pub fn from_bounds(contig: &str, strand: char, left: i64, right: i64) -> Result<Self> {
        Self::new(contig, left, strand, right - left + 1)
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn left(&self) -> i64 {
        self.left
    }

    pub fn right(&self) -> i64 {
        self.left + self.length - 1
    }

    pub fn strand(&self) -> char {
        self.strand
    }

    pub fn length(&self) -> i64 {
        self.length
    }

    /// First base of the location in transcription order
    pub fn begin(&self) -> i64 {
        if self.strand == '+' {
            self.left
        } else {
            self.right()
        }
    }

    /// Encode the location as a fixed-width sortable string.
    pub fn encode(&self) -> Result<String> {
        if self.contig.chars().count() > CONTIG_WIDTH || self.contig.contains(':') {
            return Err(ErdbError::type_mismatch(format!(
                "Contig ID \"{}\" cannot be stored in a location field.",
                self.contig
            )));
        }
        if self.left > MAX_LEFT || self.length > MAX_LENGTH {
            return Err(ErdbError::type_mismatch(format!(
                "Location {} is too large to store.",
                self
            )));
        }
        Ok(format!(
            "{:<cw$}:{:0lw$}{}{:0nw$}",
            self.contig,
            self.left,
            self.strand,
            self.length,
            cw = CONTIG_WIDTH,
            lw = LEFT_WIDTH,
            nw = LENGTH_WIDTH
        ))
    }

    /// Decode a string produced by [`Location::encode`].
    pub fn decode(encoded: &str) -> Result<Self> {
        let invalid = || {
            ErdbError::type_mismatch(format!("Invalid encoded location \"{}\".", encoded))
        };
        let (contig, rest) = encoded.rsplit_once(':').ok_or_else(invalid)?;
        if rest.len() != LEFT_WIDTH + 1 + LENGTH_WIDTH || !rest.is_ascii() {
            return Err(invalid());
        }
        let left: i64 = rest[..LEFT_WIDTH].parse().map_err(|_| invalid())?;
        let strand = rest[LEFT_WIDTH..]
            .chars()
            .next()
            .ok_or_else(invalid)?;
        let length: i64 = rest[LEFT_WIDTH + 1..].parse().map_err(|_| invalid())?;
        Self::new(contig.trim_end(), left, strand, length)
    }
}

/// SEED location notation: `contig_begin+length` or `contig_begin-length`.
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}{}{}",
            self.contig,
            self.begin(),
            self.strand,
            self.length
        )
    }
}

impl FromStr for Location {
    type Err = ErdbError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ErdbError::type_mismatch(format!("Invalid location string \"{}\".", s));
        let (contig, tail) = s.rsplit_once('_').ok_or_else(invalid)?;
        let pos = tail.find(['+', '-']).ok_or_else(invalid)?;
        let begin: i64 = tail[..pos].parse().map_err(|_| invalid())?;
        let strand = if tail[pos..].starts_with('+') { '+' } else { '-' };
        let length: i64 = tail[pos + 1..].parse().map_err(|_| invalid())?;
        let left = if strand == '+' {
            begin
        } else {
            begin - length + 1
        };
        Location::new(contig, left, strand, length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let loc = Location::from_bounds("NC_000913", '-', 100, 249).unwrap();
        let encoded = loc.encode().unwrap();
        assert_eq!(encoded.len(), LOCATION_ENCODED_LEN);
        assert_eq!(encoded[..31].trim_end(), "NC_000913");
        assert!(encoded.ends_with(":0000000100-000000150"));
        assert_eq!(Location::decode(&encoded).unwrap(), loc);
    }

    #[test]
    fn test_seed_strings() {
        let loc: Location = "NC_000913_249-150".parse().unwrap();
        assert_eq!(loc.contig(), "NC_000913");
        assert_eq!(loc.left(), 100);
        assert_eq!(loc.right(), 249);
        assert_eq!(loc.to_string(), "NC_000913_249-150");

        let plus: Location = "contig1_10+20".parse().unwrap();
        assert_eq!(plus.left(), 10);
        assert_eq!(plus.right(), 29);
        assert!("nonsense".parse::<Location>().is_err());
    }

    #[test]
    fn test_encoded_order_matches_positional_order() {
        let mut locs = vec![
            Location::new("b", 5, '+', 10).unwrap(),
            Location::new("a", 100, '+', 3).unwrap(),
            Location::new("a", 20, '-', 3).unwrap(),
            Location::new("a", 20, '+', 30).unwrap(),
            Location::new("a", 20, '+', 4).unwrap(),
            Location::new("ab", 1, '+', 1).unwrap(),
            Location::new("a1", 1, '+', 1).unwrap(),
        ];
        let mut encoded: Vec<String> = locs.iter().map(|l| l.encode().unwrap()).collect();
        locs.sort();
        encoded.sort();
        let decoded: Vec<Location> = encoded
            .iter()
            .map(|e| Location::decode(e).unwrap())
            .collect();
        assert_eq!(decoded, locs);
    }

    #[test]
    fn test_invalid_locations() {
        assert!(Location::new("c", 1, '*', 1).is_err());
        let long = "x".repeat(40);
        assert!(Location::new(&long, 1, '+', 1).unwrap().encode().is_err());
        assert!(Location::decode("garbage").is_err());
    }
}
