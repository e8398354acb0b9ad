//! Field schemas for analyzer creation: the two source dialects, the
//! effective field count the service enforces, conversion into the flat
//! dialect, label re-keying and ad-hoc schema generation.

pub mod convert;
pub mod count;
pub mod dialect;
pub mod error;
pub mod field_map;
pub mod generate;
pub mod labels;

pub use convert::{
    sanitize_key, ConvertedSchema, DroppedField, FieldTypeConverter, TableConverter,
    TypeMappingTable,
};
pub use count::{count_fields, validate_field_count, FieldCount, MAX_FIELD_COUNT};
pub use dialect::{
    Definition, DefinitionField, DefinitionsSchema, DiVersion, FlatField, FlatSchema,
    SchemaDialect,
};
pub use error::{Result, SchemaError};
pub use field_map::FieldMap;
pub use generate::{generate_field_schema, RequestedField};
pub use labels::{relabel, Label, LabelDocument, RelabelOutcome};
