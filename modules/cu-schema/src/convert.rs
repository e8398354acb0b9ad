//! Field type conversion from either dialect into the flat (`fieldSchema`)
//! dialect the analyzer API accepts.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialect::{DefinitionField, DefinitionsSchema, FlatField, FlatSchema, SchemaDialect};
use crate::error::{Result, SchemaError};
use crate::field_map::FieldMap;

/// Nesting limit for definition references; guards against cycles.
const MAX_DEPTH: usize = 8;

const DEFAULT_METHOD: &str = "extract";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedField {
    /// Source path, `Parent/child` for nested fields.
    pub path: String,
    pub field_type: String,
}

/// A schema in the flat dialect plus the bookkeeping needed to re-key labels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConvertedSchema {
    pub schema: FlatSchema,
    /// Top-level source key to target key. Dropped fields are absent.
    pub field_keys: BTreeMap<String, String>,
    pub dropped: Vec<DroppedField>,
}

impl ConvertedSchema {
    pub fn target_key(&self, source: &str) -> Option<&str> {
        self.field_keys.get(source).map(String::as_str)
    }

    pub fn is_dropped(&self, source: &str) -> bool {
        self.dropped.iter().any(|d| d.path == source)
    }
}

pub trait FieldTypeConverter {
    fn convert(&self, schema: &SchemaDialect) -> Result<ConvertedSchema>;
}

/// Source type name to target type name. Loaded from JSON so the table can
/// follow API versions without a rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeMappingTable {
    pub types: BTreeMap<String, String>,
    /// Target type for source types missing from `types`. `None` rejects them.
    #[serde(default)]
    pub fallback: Option<String>,
    /// Source types removed from the converted schema.
    #[serde(default)]
    pub dropped: BTreeSet<String>,
}

impl Default for TypeMappingTable {
    fn default() -> Self {
        let types = [
            ("string", "string"),
            ("number", "number"),
            ("integer", "integer"),
            ("date", "date"),
            ("time", "time"),
            ("boolean", "boolean"),
            ("selectionMark", "boolean"),
            ("countryRegion", "string"),
            ("currency", "number"),
            ("phoneNumber", "string"),
            ("address", "string"),
        ]
        .into_iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect();

        Self {
            types,
            fallback: None,
            dropped: BTreeSet::from(["signature".to_string()]),
        }
    }
}

/// Result of looking a source type up in the table.
enum Mapped<'a> {
    Type(&'a str),
    Drop,
}

impl TypeMappingTable {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| SchemaError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_json(&bytes)
    }

    fn lookup<'a>(&'a self, field: &str, source_type: &str) -> Result<Mapped<'a>> {
        if self.dropped.contains(source_type) {
            return Ok(Mapped::Drop);
        }
        self.types
            .get(source_type)
            .or(self.fallback.as_ref())
            .map(|t| Mapped::Type(t.as_str()))
            .ok_or_else(|| SchemaError::UnsupportedType {
                field: field.to_string(),
                field_type: source_type.to_string(),
            })
    }

    fn is_primitive(&self, source_type: &str) -> bool {
        self.types.contains_key(source_type)
    }
}

/// Table-driven converter. Structural types (`array`, `object`) are rebuilt,
/// everything else goes through the mapping table.
#[derive(Debug, Clone, Default)]
pub struct TableConverter {
    table: TypeMappingTable,
}

impl TableConverter {
    pub fn new(table: TypeMappingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TypeMappingTable {
        &self.table
    }
}

impl FieldTypeConverter for TableConverter {
    fn convert(&self, schema: &SchemaDialect) -> Result<ConvertedSchema> {
        let mut out = ConvertedSchema::default();
        match schema {
            SchemaDialect::Flat(flat) => {
                out.schema.extra = flat.extra.clone();
                for (key, field) in flat.field_schema.iter() {
                    if let Some(converted) = self.flat_field(key, field, 0, &mut out.dropped)? {
                        out.insert_top_level(key, converted);
                    }
                }
            }
            SchemaDialect::Definitions(defs) => {
                for field in &defs.fields {
                    if let Some(converted) = self.definition_field(defs, field, "", 0, &mut out.dropped)? {
                        out.insert_top_level(&field.field_key, converted.with_method(DEFAULT_METHOD));
                    }
                }
            }
        }

        if !out.dropped.is_empty() {
            let paths: Vec<&str> = out.dropped.iter().map(|d| d.path.as_str()).collect();
            warn!(?paths, "Dropped fields with no counterpart in the target schema");
        }
        debug!(fields = out.schema.field_schema.len(), "Converted field schema");
        Ok(out)
    }
}

impl TableConverter {
    fn flat_field(
        &self,
        path: &str,
        field: &FlatField,
        depth: usize,
        dropped: &mut Vec<DroppedField>,
    ) -> Result<Option<FlatField>> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::malformed(path, "nesting too deep"));
        }
        let mut converted = field.clone();
        match field.field_type.as_str() {
            "array" => {
                let items = field
                    .items
                    .as_deref()
                    .ok_or_else(|| SchemaError::malformed(path, "array field has no items"))?;
                match self.flat_field(&format!("{path}/items"), items, depth + 1, dropped)? {
                    Some(items) => converted.items = Some(Box::new(items)),
                    None => {
                        // No items left, so the array itself goes too.
                        dropped.push(DroppedField {
                            path: path.to_string(),
                            field_type: field.field_type.clone(),
                        });
                        return Ok(None);
                    }
                }
            }
            "object" => {
                let mut properties = FieldMap::new();
                for (key, child) in field.properties.iter().flat_map(|p| p.iter()) {
                    let child_path = format!("{path}/{key}");
                    if let Some(child) = self.flat_field(&child_path, child, depth + 1, dropped)? {
                        properties.insert(key, child);
                    }
                }
                if field.properties.is_some() {
                    converted.properties = Some(properties);
                }
            }
            source_type => match self.table.lookup(path, source_type)? {
                Mapped::Type(target) => converted.field_type = target.to_string(),
                Mapped::Drop => {
                    dropped.push(DroppedField {
                        path: path.to_string(),
                        field_type: source_type.to_string(),
                    });
                    return Ok(None);
                }
            },
        }
        Ok(Some(converted))
    }

    fn definition_field(
        &self,
        defs: &DefinitionsSchema,
        field: &DefinitionField,
        parent: &str,
        depth: usize,
        dropped: &mut Vec<DroppedField>,
    ) -> Result<Option<FlatField>> {
        let path = if parent.is_empty() {
            field.field_key.clone()
        } else {
            format!("{parent}/{}", field.field_key)
        };
        if depth > MAX_DEPTH {
            return Err(SchemaError::malformed(&path, "nesting too deep"));
        }

        let converted = match field.field_type.as_str() {
            "array" => {
                let item_type = field
                    .item_type
                    .as_deref()
                    .ok_or_else(|| SchemaError::malformed(&path, "array field has no itemType"))?;
                let items = if self.table.is_primitive(item_type) && !defs.definitions.contains_key(item_type) {
                    match self.table.lookup(&path, item_type)? {
                        Mapped::Type(target) => FlatField::primitive(target),
                        Mapped::Drop => {
                            dropped.push(DroppedField {
                                path,
                                field_type: format!("array<{item_type}>"),
                            });
                            return Ok(None);
                        }
                    }
                } else {
                    let definition = defs.resolve(&path, item_type)?;
                    FlatField::object(self.columns(defs, &definition.fields, &path, depth, dropped)?)
                };
                FlatField::array(items)
            }
            "object" => {
                let rows = field.rows();
                if rows.is_empty() {
                    return Err(SchemaError::malformed(&path, "object field has no rows"));
                }
                let mut row_map = FieldMap::new();
                for row in rows {
                    let row_path = format!("{path}/{}", row.field_key);
                    let definition = defs.resolve(&path, &row.field_type)?;
                    let columns = self.columns(defs, &definition.fields, &row_path, depth, dropped)?;
                    row_map.insert(row.field_key.clone(), FlatField::object(columns));
                }
                FlatField::object(row_map)
            }
            source_type => match self.table.lookup(&path, source_type)? {
                Mapped::Type(target) => FlatField::primitive(target),
                Mapped::Drop => {
                    dropped.push(DroppedField {
                        path,
                        field_type: source_type.to_string(),
                    });
                    return Ok(None);
                }
            },
        };
        Ok(Some(converted))
    }

    fn columns(
        &self,
        defs: &DefinitionsSchema,
        fields: &[DefinitionField],
        parent: &str,
        depth: usize,
        dropped: &mut Vec<DroppedField>,
    ) -> Result<FieldMap<FlatField>> {
        let mut columns = FieldMap::new();
        for column in fields {
            if let Some(converted) = self.definition_field(defs, column, parent, depth + 1, dropped)? {
                columns.insert(column.field_key.clone(), converted);
            }
        }
        Ok(columns)
    }
}

impl ConvertedSchema {
    fn insert_top_level(&mut self, source: &str, field: FlatField) {
        let target = unique_key(&sanitize_key(source), &self.schema.field_schema);
        if target != source {
            debug!(source, target, "Renamed field key");
        }
        self.field_keys.insert(source.to_string(), target.clone());
        self.schema.field_schema.insert(target, field);
    }
}

/// Replace characters the analyzer API rejects in field names.
pub fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn unique_key<T>(candidate: &str, taken: &FieldMap<T>) -> String {
    if !taken.contains_key(candidate) {
        return candidate.to_string();
    }
    (2..)
        .map(|n| format!("{candidate}_{n}"))
        .find(|k| !taken.contains_key(k))
        .unwrap_or_else(|| candidate.to_string())
}
