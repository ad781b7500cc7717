//! Table metadata
//!
//! A [`Table`] describes one database table: its fields in column order, its
//! single-column primary key (if any), its placement on the diagram, and the
//! links to every neighbor table it shares a foreign key with. Tables are built
//! from the catalog and cached by the connection.

use crate::database::core::{Catalog, Dialect, Placement, SchemaManager};
use crate::database::sql_buffer::SqlBuffer;
use crate::error::{ErdbError, Result};
use crate::types::LogicalType;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
    pub comment: Option<String>,
}

/// Join equality between a table and one neighbor, seen from the owning table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    /// Column in the owning table
    pub local_column: String,
    /// Column in the neighbor table
    pub other_column: String,
}

impl Link {
    /// Append `[source].[local] = [target].[other]` using the two aliases.
    pub fn store(&self, buffer: &mut SqlBuffer<'_>, source: &str, target: &str) {
        buffer
            .quote_qualified(source, &self.local_column)
            .append(" = ")
            .quote_qualified(target, &self.other_column);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Table {
    name: String,
    fields: Vec<Field>,
    #[serde(skip)]
    field_index: HashMap<String, usize>,
    primary_key: Option<String>,
    /// Keyed by lower-cased neighbor name
    links: HashMap<String, Link>,
    placement: Option<Placement>,
}

impl Table {
    /// Load a table from the catalog. Returns `None` if the table has no columns,
    /// which is how a missing table looks to the catalog.
    pub fn load(conn: &Connection, dialect: &dyn Dialect, name: &str) -> Result<Option<Table>> {
        let catalog = Catalog::new(conn);
        let columns = catalog.columns(name)?;
        if columns.is_empty() {
            return Ok(None);
        }
        let schema = SchemaManager::new(conn);
        let overrides = schema.field_overrides(name)?;

        let mut fields = Vec::with_capacity(columns.len());
        for column in columns {
            let native = dialect.parse_type(&column.declared_type);
            let (logical_type, comment) = match overrides.get(&column.name.to_lowercase()) {
                Some(custom) => {
                    let logical_type = LogicalType::parse_custom(&custom.type_name)?;
                    if !logical_type.overrides(native) {
                        return Err(ErdbError::type_mismatch(format!(
                            "Custom type {} for field {}.{} is incompatible with its native type {}.",
                            logical_type, name, column.name, column.declared_type
                        )));
                    }
                    (logical_type, custom.description.clone())
                }
                None => (native, None),
            };
            fields.push(Field {
                name: column.name,
                logical_type,
                nullable: column.nullable,
                comment,
            });
        }

        let keys = catalog.primary_keys(name)?;
        let primary_key = match keys.as_slice() {
            [key] => Some(key.clone()),
            _ => None,
        };

        let mut links: HashMap<String, Link> = HashMap::new();
        let imported = catalog
            .imported_keys(name)?
            .into_iter()
            .map(|k| (k.key_seq, k.pk_table, k.fk_column, k.pk_column));
        let exported = catalog
            .exported_keys(name)?
            .into_iter()
            .map(|k| (k.key_seq, k.fk_table, k.pk_column, k.fk_column));
        for (key_seq, neighbor, local_column, other_column) in imported.chain(exported) {
            if key_seq != 1 {
                return Err(ErdbError::schema(format!(
                    "Multi-column key between {} and {} is not supported.",
                    name, neighbor
                )));
            }
            let link = Link {
                local_column,
                other_column,
            };
            let key = neighbor.to_lowercase();
            match links.get(&key) {
                Some(existing) if *existing != link => warn!(
                    "table {} has more than one key relationship with {}; using {}",
                    name, neighbor, existing.local_column
                ),
                Some(_) => {}
                None => {
                    links.insert(key, link);
                }
            }
        }

        let placement = schema.placement(name)?;
        let table = Table::new(name, fields, primary_key, links, placement);
        info!(
            "loaded table {}: {} fields, {} links, primary key {}",
            table.name,
            table.fields.len(),
            table.links.len(),
            table.primary_key.as_deref().unwrap_or("(none)")
        );
        Ok(Some(table))
    }

    fn new(
        name: &str,
        fields: Vec<Field>,
        primary_key: Option<String>,
        links: HashMap<String, Link>,
        placement: Option<Placement>,
    ) -> Self {
        let field_index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.to_lowercase(), i))
            .collect();
        Table {
            name: name.to_string(),
            fields,
            field_index,
            primary_key,
            links,
            placement,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in column order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Look up a field by name, case-insensitively.
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.field_index
            .get(&name.to_lowercase())
            .map(|&i| &self.fields[i])
    }

    pub fn get_field(&self, name: &str) -> Result<&Field> {
        self.find_field(name).ok_or_else(|| {
            ErdbError::schema(format!(
                "Field {} not found in table {}.",
                name, self.name
            ))
        })
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.primary_key.as_deref()
    }

    /// Primary key name, or a Schema error naming the operation that needed it.
    pub fn require_primary_key(&self, operation: &str) -> Result<&str> {
        self.primary_key()
            .ok_or_else(|| ErdbError::no_primary_key(operation, &self.name))
    }

    /// Link to a neighbor table, looked up case-insensitively.
    pub fn link(&self, neighbor: &str) -> Option<&Link> {
        self.links.get(&neighbor.to_lowercase())
    }

    /// Neighbor names (lower-cased) with their links
    pub fn links(&self) -> impl Iterator<Item = (&str, &Link)> {
        self.links.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }
}
