use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::field_map::FieldMap;

/// A field a caller asked for by name; every attribute is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestedField {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

/// Build an analyzer `fieldSchema` body (`{"fields": {...}}`) from requested
/// fields, filling in defaults for anything left out.
pub fn generate_field_schema(request: &FieldMap<RequestedField>) -> Value {
    let fields: Map<String, Value> = request
        .iter()
        .map(|(name, requested)| (name.to_string(), generate_field(name, requested)))
        .collect();
    json!({ "fields": fields })
}

fn generate_field(name: &str, requested: &RequestedField) -> Value {
    let field_type = requested.field_type.as_deref().unwrap_or("string");
    let mut entry = json!({
        "type": field_type,
        "method": requested.method.as_deref().unwrap_or("generate"),
        "description": requested
            .description
            .clone()
            .unwrap_or_else(|| format!("Field for {name}")),
    });

    match field_type {
        "array" => {
            entry["items"] = requested
                .items
                .clone()
                .unwrap_or_else(|| json!({ "type": "string" }));
        }
        "object" => {
            entry["properties"] = requested.properties.clone().unwrap_or_else(|| json!({}));
        }
        _ => {}
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_attributes() {
        let request: FieldMap<RequestedField> = serde_json::from_value(json!({
            "CompanyName": {},
            "Tags": {"type": "array"},
            "Address": {"type": "object"}
        }))
        .unwrap();

        let schema = generate_field_schema(&request);
        assert_eq!(
            schema,
            json!({"fields": {
                "CompanyName": {"type": "string", "method": "generate", "description": "Field for CompanyName"},
                "Tags": {"type": "array", "method": "generate", "description": "Field for Tags", "items": {"type": "string"}},
                "Address": {"type": "object", "method": "generate", "description": "Field for Address", "properties": {}}
            }})
        );
    }

    #[test]
    fn explicit_attributes_win() {
        let request: FieldMap<RequestedField> = serde_json::from_value(json!({
            "Sentiment": {"type": "array", "method": "classify", "description": "Per-turn sentiment", "items": {"type": "string", "enum": ["pos", "neg"]}},
            "Count": {"type": "integer", "items": {"type": "string"}}
        }))
        .unwrap();

        let schema = generate_field_schema(&request);
        assert_eq!(schema["fields"]["Sentiment"]["method"], "classify");
        assert_eq!(schema["fields"]["Sentiment"]["items"]["enum"], json!(["pos", "neg"]));
        // items only apply to arrays
        assert!(schema["fields"]["Count"].get("items").is_none());
    }

    #[test]
    fn field_order_is_preserved() {
        let request: FieldMap<RequestedField> =
            serde_json::from_str(r#"{"Zeta": {}, "Alpha": {}}"#).unwrap();
        let schema = generate_field_schema(&request);
        let keys: Vec<&String> = schema["fields"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["Zeta", "Alpha"]);
    }
}
