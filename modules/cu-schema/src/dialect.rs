use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::field_map::FieldMap;

/// Source dataset generation. Decides which dialect `fields.json` is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiVersion {
    /// Generative custom extraction; dialect A.
    CustomGen,
    /// 3.1/4.0 GA custom neural; dialect B.
    CustomNeural,
}

impl DiVersion {
    pub const ALL: [DiVersion; 2] = [DiVersion::CustomGen, DiVersion::CustomNeural];

    pub fn as_str(self) -> &'static str {
        match self {
            DiVersion::CustomGen => "CustomGen",
            DiVersion::CustomNeural => "CustomNeural",
        }
    }
}

impl fmt::Display for DiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        DiVersion::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SchemaError::UnknownVersion(s.to_string()))
    }
}

// --- Dialect A ---

/// Dialect A: `{"fieldSchema": {name: {type, items, properties}}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatSchema {
    pub field_schema: FieldMap<FlatField>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatField {
    #[serde(rename = "type", default)]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FlatField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<FieldMap<FlatField>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlatField {
    pub fn primitive(field_type: impl Into<String>) -> Self {
        Self {
            field_type: field_type.into(),
            ..Default::default()
        }
    }

    pub fn object(properties: FieldMap<FlatField>) -> Self {
        Self {
            field_type: "object".to_string(),
            properties: Some(properties),
            ..Default::default()
        }
    }

    pub fn array(items: FlatField) -> Self {
        Self {
            field_type: "array".to_string(),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property_count(&self) -> usize {
        self.properties.as_ref().map_or(0, FieldMap::len)
    }
}

impl FlatSchema {
    /// The `fieldSchema` object of an analyzer template built from this schema.
    pub fn to_analyzer_field_schema(&self, name: &str, description: &str) -> Result<Value> {
        Ok(serde_json::json!({
            "name": name,
            "description": description,
            "fields": serde_json::to_value(&self.field_schema)?,
        }))
    }
}

// --- Dialect B ---

/// Dialect B: a field list plus a side table of named item/row shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefinitionsSchema {
    #[serde(default)]
    pub fields: Vec<DefinitionField>,
    #[serde(default)]
    pub definitions: BTreeMap<String, Definition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionField {
    pub field_key: String,
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    /// Row entries of a fixed table (`object`); `null` elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<DefinitionField>>,
}

impl DefinitionField {
    pub fn rows(&self) -> &[DefinitionField] {
        self.fields.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_key: Option<String>,
    #[serde(default)]
    pub field_type: String,
    #[serde(default)]
    pub fields: Vec<DefinitionField>,
}

impl DefinitionsSchema {
    pub fn resolve(&self, field: &str, definition: &str) -> Result<&Definition> {
        self.definitions
            .get(definition)
            .ok_or_else(|| SchemaError::UnresolvedDefinition {
                field: field.to_string(),
                definition: definition.to_string(),
            })
    }
}

// --- Discrimination ---

/// A `fields.json` document in one of the two dialects, decided once at
/// parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDialect {
    Flat(FlatSchema),
    Definitions(DefinitionsSchema),
}

impl SchemaDialect {
    /// Parse using the dialect implied by the dataset's DI version.
    pub fn parse(version: DiVersion, bytes: &[u8]) -> Result<Self> {
        match version {
            DiVersion::CustomGen => Ok(SchemaDialect::Flat(serde_json::from_slice(bytes)?)),
            DiVersion::CustomNeural => {
                Ok(SchemaDialect::Definitions(serde_json::from_slice(bytes)?))
            }
        }
    }

    /// Pick the dialect from the document's top-level keys.
    pub fn detect(value: Value) -> Result<Self> {
        let is_flat = value.get("fieldSchema").is_some();
        let is_definitions = value.get("fields").is_some_and(Value::is_array);
        match (is_flat, is_definitions) {
            (true, false) => Ok(SchemaDialect::Flat(serde_json::from_value(value)?)),
            (false, true) => Ok(SchemaDialect::Definitions(serde_json::from_value(value)?)),
            (true, true) => Err(SchemaError::UnknownDialect(
                "document has both 'fieldSchema' and a 'fields' list".into(),
            )),
            (false, false) => Err(SchemaError::UnknownDialect(
                "expected 'fieldSchema' or a 'fields' list".into(),
            )),
        }
    }

    pub fn version(&self) -> DiVersion {
        match self {
            SchemaDialect::Flat(_) => DiVersion::CustomGen,
            SchemaDialect::Definitions(_) => DiVersion::CustomNeural,
        }
    }
}
