//! Lazy result sequences

use crate::database::record::{Record, RecordLayout};
use crate::error::Result;
use rusqlite::Rows;
use std::sync::Arc;
use tracing::debug;

/// Single-pass sequence of query records.
///
/// Each call to `next` pulls one row from the cursor. The cursor is released
/// when the rows run out, when an error occurs, or on [`Records::close`].
pub struct Records<'q> {
    rows: Option<Rows<'q>>,
    layout: Arc<RecordLayout>,
    fetched: usize,
}

impl<'q> Records<'q> {
    pub(crate) fn new(rows: Rows<'q>, layout: Arc<RecordLayout>) -> Self {
        Records {
            rows: Some(rows),
            layout,
            fetched: 0,
        }
    }

    /// Layout shared by every record in the sequence
    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// Release the cursor without reading the remaining rows.
    pub fn close(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.rows.take().is_some() {
            debug!("result set closed after {} records", self.fetched);
        }
    }

    /// Buffer the remaining rows and fan them out to rayon's thread pool.
    #[cfg(feature = "parallel")]
    pub fn into_par_iter(self) -> Result<rayon::vec::IntoIter<Record>> {
        use rayon::iter::IntoParallelIterator;
        let buffered: Vec<Record> = self.collect::<Result<_>>()?;
        Ok(buffered.into_par_iter())
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let rows = self.rows.as_mut()?;
        let result = match rows.next() {
            Ok(Some(row)) => Some(self.layout.read(row)),
            Ok(None) => None,
            Err(e) => Some(Err(e.into())),
        };
        match result {
            Some(Ok(record)) => {
                self.fetched += 1;
                Some(Ok(record))
            }
            Some(Err(e)) => {
                self.finish();
                Some(Err(e))
            }
            None => {
                self.finish();
                None
            }
        }
    }
}
