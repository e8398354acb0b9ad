//! Effective field counting against the service's field cap.
//!
//! The counting rules mirror how the service meters schemas, so they are a
//! compatibility contract:
//!
//! - array: `1 + number of item properties`
//! - object (table): `rows + columns + 2`, with columns taken from the first row
//! - signature (dialect B only): 0, the field is dropped during conversion
//!
//! Definition columns are counted as declared, signature columns included,
//! so a source count never falls below the count of its converted schema.
//! - anything else: 1

use tracing::{info, warn};

use crate::dialect::{DefinitionsSchema, FlatField, FlatSchema, SchemaDialect};
use crate::error::{Result, SchemaError};

/// Maximum effective field count a schema may declare.
pub const MAX_FIELD_COUNT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCount {
    pub count: usize,
    pub valid: bool,
}

impl FieldCount {
    fn of(count: usize) -> Self {
        Self {
            count,
            valid: count <= MAX_FIELD_COUNT,
        }
    }
}

pub fn count_fields(schema: &SchemaDialect) -> Result<FieldCount> {
    let count = match schema {
        SchemaDialect::Flat(flat) => count_flat(flat)?,
        SchemaDialect::Definitions(defs) => count_definitions(defs)?,
    };
    if count.valid {
        info!(count = count.count, "Validated field count");
    }
    Ok(count)
}

/// Count and fail with `FieldCountExceeded` when over the cap.
pub fn validate_field_count(schema: &SchemaDialect) -> Result<usize> {
    let FieldCount { count, valid } = count_fields(schema)?;
    if !valid {
        return Err(SchemaError::FieldCountExceeded {
            count,
            max: MAX_FIELD_COUNT,
        });
    }
    Ok(count)
}

fn count_flat(schema: &FlatSchema) -> Result<FieldCount> {
    let entries = schema.field_schema.len();
    if entries > MAX_FIELD_COUNT {
        return Ok(FieldCount::of(entries));
    }

    let mut total = 0;
    for (name, field) in schema.field_schema.iter() {
        total += match field.field_type.as_str() {
            "array" => {
                let items = field
                    .items
                    .as_deref()
                    .ok_or_else(|| SchemaError::malformed(name, "array field has no items"))?;
                1 + items.property_count()
            }
            "object" => {
                let (rows, columns) = flat_table_shape(name, field)?;
                rows + columns + 2
            }
            _ => 1,
        };
    }
    Ok(FieldCount::of(total))
}

/// Rows and first-row columns of a dialect A table.
fn flat_table_shape(name: &str, field: &FlatField) -> Result<(usize, usize)> {
    let rows = field
        .properties
        .as_ref()
        .filter(|rows| !rows.is_empty())
        .ok_or_else(|| SchemaError::malformed(name, "object field has no rows"))?;
    let (_, first_row) = rows
        .first()
        .ok_or_else(|| SchemaError::malformed(name, "object field has no rows"))?;
    let columns = first_row.property_count();

    // Rows are assumed to share the first row's columns.
    if rows.values().any(|row| row.property_count() != columns) {
        warn!(field = name, columns, "Table rows differ in column count; counting the first row");
    }
    Ok((rows.len(), columns))
}

fn count_definitions(schema: &DefinitionsSchema) -> Result<FieldCount> {
    let mut total = 0;
    for field in &schema.fields {
        let key = field.field_key.as_str();
        total += match field.field_type.as_str() {
            "array" => {
                let item_type = field
                    .item_type
                    .as_deref()
                    .ok_or_else(|| SchemaError::malformed(key, "array field has no itemType"))?;
                1 + schema.resolve(key, item_type)?.fields.len()
            }
            "object" => {
                let rows = field.rows();
                let first_row = rows
                    .first()
                    .ok_or_else(|| SchemaError::malformed(key, "object field has no rows"))?;
                let columns = schema.resolve(key, &first_row.field_type)?.fields.len();
                rows.len() + columns + 2
            }
            "signature" => 0,
            _ => 1,
        };
    }
    Ok(FieldCount::of(total))
}
