//! Statement text builder
//!
//! Accumulates SQL text with dialect-aware identifier quoting, delimited-list
//! helpers, and a running count of parameter marks.

use crate::database::core::Dialect;
use std::fmt;

pub struct SqlBuffer<'a> {
    dialect: &'a dyn Dialect,
    text: String,
    delim: String,
    /// True until the first item of the current list has been appended
    first: bool,
    marks: usize,
}

impl<'a> SqlBuffer<'a> {
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            text: String::new(),
            delim: ", ".to_string(),
            first: true,
            marks: 0,
        }
    }

    pub fn append(&mut self, text: &str) -> &mut Self {
        self.text.push_str(text);
        self
    }

    /// Append a quoted identifier.
    pub fn quote(&mut self, name: &str) -> &mut Self {
        let quoted = self.dialect.quote(name);
        self.text.push_str(&quoted);
        self
    }

    /// Append a qualified `table.field` name with both parts quoted.
    pub fn quote_qualified(&mut self, table: &str, field: &str) -> &mut Self {
        self.quote(table).append(".").quote(field)
    }

    /// Append a field spec (`table.field` or bare `field`), quoting each part.
    pub fn quote_spec(&mut self, spec: &str) -> &mut Self {
        match spec.split_once('.') {
            Some((table, field)) => self.quote_qualified(table, field),
            None => self.quote(spec),
        }
    }

    /// Append text followed by a quoted identifier.
    pub fn start(&mut self, text: &str, name: &str) -> &mut Self {
        self.append(text).quote(name)
    }

    /// Begin a delimited list.
    pub fn start_list(&mut self, delim: &str) -> &mut Self {
        self.delim = delim.to_string();
        self.first = true;
        self
    }

    /// Append the list delimiter, except before the first item.
    pub fn append_delim(&mut self) -> &mut Self {
        if self.first {
            self.first = false;
        } else {
            let delim = std::mem::take(&mut self.delim);
            self.text.push_str(&delim);
            self.delim = delim;
        }
        self
    }

    /// Append one parameter mark.
    pub fn append_mark(&mut self) -> &mut Self {
        self.marks += 1;
        self.append("?")
    }

    /// Append `n` comma-separated parameter marks.
    pub fn add_mark_list(&mut self, n: usize) -> &mut Self {
        self.start_list(", ");
        for _ in 0..n {
            self.append_delim().append_mark();
        }
        self
    }

    /// Append a comma-separated list of quoted field names.
    pub fn add_fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.start_list(", ");
        for field in fields {
            self.append_delim().quote(field.as_ref());
        }
        self
    }

    /// Number of parameter marks appended so far
    pub fn mark_count(&self) -> usize {
        self.marks
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.first = true;
        self.marks = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl fmt::Display for SqlBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
