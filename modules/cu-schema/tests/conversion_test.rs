use cu_schema::*;
use serde_json::json;

const BUNDLED_TABLE: &[u8] = include_bytes!("../data/type_mapping.json");

#[test]
fn bundled_table_matches_the_builtin_default() {
    let table = TypeMappingTable::from_json(BUNDLED_TABLE).unwrap();
    assert_eq!(table, TypeMappingTable::default());
}

#[test]
fn neural_dataset_validates_converts_and_relabels() {
    let fields = json!({
        "fields": [
            {"fieldKey": "Invoice Id", "fieldType": "string", "fieldFormat": "not-specified"},
            {"fieldKey": "Customer Signature", "fieldType": "signature", "fieldFormat": "not-specified"},
            {"fieldKey": "Items", "fieldType": "array", "itemType": "Items_object"}
        ],
        "definitions": {
            "Items_object": {"fieldKey": "Items_object", "fieldType": "object", "fields": [
                {"fieldKey": "Description", "fieldType": "string"},
                {"fieldKey": "Amount", "fieldType": "currency"}
            ]}
        }
    });
    let schema = SchemaDialect::parse(DiVersion::CustomNeural, fields.to_string().as_bytes()).unwrap();

    assert_eq!(validate_field_count(&schema).unwrap(), 4);

    let converted = TableConverter::default().convert(&schema).unwrap();
    assert_eq!(converted.dropped.len(), 1);
    assert_eq!(converted.dropped[0].path, "Customer Signature");

    let analyzer_schema = converted
        .schema
        .to_analyzer_field_schema("neural-invoices", "Migrated invoices")
        .unwrap();
    assert_eq!(analyzer_schema["name"], "neural-invoices");
    assert_eq!(analyzer_schema["fields"]["Invoice_Id"]["type"], "string");
    assert!(analyzer_schema["fields"].get("Customer_Signature").is_none());

    let labels = LabelDocument::from_slice(
        json!({
            "document": "invoice-1.pdf",
            "labels": [
                {"label": "Invoice Id", "value": [{"page": 1, "text": "INV-1"}]},
                {"label": "Customer Signature", "value": [{"page": 2, "text": ""}]},
                {"label": "Items/0/Amount", "value": [{"page": 1, "text": "12.50"}]}
            ]
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap();

    let outcome = relabel(&labels, &converted);
    let kept: Vec<&str> = outcome.document.labels.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(kept, vec!["Invoice_Id", "Items/0/Amount"]);
    assert_eq!(outcome.dropped, vec!["Customer Signature".to_string()]);
    assert!(outcome.unknown.is_empty());
}

#[test]
fn oversized_generative_schema_is_rejected() {
    let fields: serde_json::Map<String, serde_json::Value> = (0..101)
        .map(|i| (format!("F{i}"), json!({"type": "string", "method": "extract"})))
        .collect();
    let schema = SchemaDialect::detect(json!({ "fieldSchema": fields })).unwrap();

    let err = validate_field_count(&schema).unwrap_err();
    assert_eq!(err.to_string(), "Too many fields: 101 exceeds the maximum of 100");
}
