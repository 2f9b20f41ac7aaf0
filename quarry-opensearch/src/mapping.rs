//! Index schema (mapping) model.

use crate::error::{Result, SearchError};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field mapping configuration of an index.
///
/// Properties are kept ordered by name so the same schema always serializes to the same body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    /// Field definitions.
    pub properties: BTreeMap<String, MappingField>,
    /// Dynamic mapping setting (`true`, `false`, `strict`, `runtime`).
    pub dynamic: Option<String>,
    /// Any other top-level mapping keys (`_source`, `dynamic_templates`, ...).
    pub options: BTreeMap<String, Value>,
}

impl Mapping {
    /// Create a new mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, field: MappingField) -> Self {
        self.properties.insert(name.into(), field);
        self
    }

    /// Set dynamic mapping.
    pub fn dynamic(mut self, dynamic: impl Into<String>) -> Self {
        self.dynamic = Some(dynamic.into());
        self
    }

    /// Look up a top-level field.
    pub fn get(&self, name: &str) -> Option<&MappingField> {
        self.properties.get(name)
    }

    /// Whether the mapping defines no fields.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Render the mapping as the engine expects it under `mappings`.
    pub fn to_json(&self) -> Value {
        let mut mapping = Map::new();

        for (key, value) in &self.options {
            mapping.insert(key.clone(), value.clone());
        }
        if let Some(dynamic) = &self.dynamic {
            mapping.insert("dynamic".to_string(), json!(dynamic));
        }

        mapping.insert("properties".to_string(), properties_to_json(&self.properties));

        Value::Object(mapping)
    }

    /// Parse a mapping document such as `{"properties": {...}}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| SearchError::validation("Mapping must be a JSON object"))?;

        let mut mapping = Mapping::new();

        for (key, value) in object {
            match key.as_str() {
                "properties" => mapping.properties = properties_from_json(value)?,
                "dynamic" => mapping.dynamic = Some(scalar_string(value)),
                _ => {
                    mapping.options.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(mapping)
    }
}

impl FromStr for Mapping {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| SearchError::validation(format!("Malformed mapping document: {}", e)))?;
        Self::from_json(&value)
    }
}

/// Field mapping definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingField {
    /// Field type.
    pub field_type: FieldType,
    /// Analyzer.
    pub analyzer: Option<String>,
    /// Search analyzer.
    pub search_analyzer: Option<String>,
    /// Whether to index the field.
    pub index: Option<bool>,
    /// Whether text fields keep term-frequency data for aggregation and sorting.
    pub fielddata: Option<bool>,
    /// Date format.
    pub format: Option<String>,
    /// Whether to store the field.
    pub store: Option<bool>,
    /// Null value.
    pub null_value: Option<Value>,
    /// Nested properties (for object/nested types).
    pub properties: Option<BTreeMap<String, MappingField>>,
    /// Options without a dedicated setter (`fields`, `ignore_above`, ...).
    pub options: BTreeMap<String, Value>,
}

impl MappingField {
    /// Create a field of the given type.
    pub fn of_type(field_type: FieldType) -> Self {
        Self {
            field_type,
            analyzer: None,
            search_analyzer: None,
            index: None,
            fielddata: None,
            format: None,
            store: None,
            null_value: None,
            properties: None,
            options: BTreeMap::new(),
        }
    }

    /// Create a new text field.
    pub fn text() -> Self {
        Self::of_type(FieldType::Text)
    }

    /// Create a new keyword field.
    pub fn keyword() -> Self {
        Self::of_type(FieldType::Keyword)
    }

    /// Create a new integer field.
    pub fn integer() -> Self {
        Self::of_type(FieldType::Integer)
    }

    /// Create a new long field.
    pub fn long() -> Self {
        Self::of_type(FieldType::Long)
    }

    /// Create a new float field.
    pub fn float() -> Self {
        Self::of_type(FieldType::Float)
    }

    /// Create a new double field.
    pub fn double() -> Self {
        Self::of_type(FieldType::Double)
    }

    /// Create a new boolean field.
    pub fn boolean() -> Self {
        Self::of_type(FieldType::Boolean)
    }

    /// Create a new date field.
    pub fn date() -> Self {
        Self::of_type(FieldType::Date)
    }

    /// Create a new object field.
    pub fn object() -> Self {
        Self::of_type(FieldType::Object)
    }

    /// Create a new nested field.
    pub fn nested() -> Self {
        Self::of_type(FieldType::Nested)
    }

    /// Set analyzer.
    pub fn analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer = Some(analyzer.into());
        self
    }

    /// Set search analyzer.
    pub fn search_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.search_analyzer = Some(analyzer.into());
        self
    }

    /// Set whether the field is indexed.
    pub fn index(mut self, index: bool) -> Self {
        self.index = Some(index);
        self
    }

    /// Enable or disable fielddata.
    pub fn fielddata(mut self, fielddata: bool) -> Self {
        self.fielddata = Some(fielddata);
        self
    }

    /// Set date format.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set whether the field is stored.
    pub fn store(mut self, store: bool) -> Self {
        self.store = Some(store);
        self
    }

    /// Set null value.
    pub fn null_value(mut self, value: Value) -> Self {
        self.null_value = Some(value);
        self
    }

    /// Set an arbitrary option.
    pub fn option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Add nested property.
    pub fn property(mut self, name: impl Into<String>, field: MappingField) -> Self {
        self.properties
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), field);
        self
    }

    /// Look up a sub-field.
    pub fn get(&self, name: &str) -> Option<&MappingField> {
        self.properties.as_ref()?.get(name)
    }

    fn to_json(&self) -> Value {
        let mut field = Map::new();

        for (key, value) in &self.options {
            field.insert(key.clone(), value.clone());
        }

        // Objects with sub-properties are implicit; the engine omits their type.
        let implicit_object = self.field_type == FieldType::Object && self.properties.is_some();
        if !implicit_object {
            field.insert("type".to_string(), json!(self.field_type.as_str()));
        }

        if let Some(analyzer) = &self.analyzer {
            field.insert("analyzer".to_string(), json!(analyzer));
        }
        if let Some(search_analyzer) = &self.search_analyzer {
            field.insert("search_analyzer".to_string(), json!(search_analyzer));
        }
        if let Some(index) = self.index {
            field.insert("index".to_string(), json!(index));
        }
        if let Some(fielddata) = self.fielddata {
            field.insert("fielddata".to_string(), json!(fielddata));
        }
        if let Some(format) = &self.format {
            field.insert("format".to_string(), json!(format));
        }
        if let Some(store) = self.store {
            field.insert("store".to_string(), json!(store));
        }
        if let Some(null_value) = &self.null_value {
            field.insert("null_value".to_string(), null_value.clone());
        }
        if let Some(properties) = &self.properties {
            field.insert("properties".to_string(), properties_to_json(properties));
        }

        Value::Object(field)
    }

    fn from_json(name: &str, value: &Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            SearchError::validation(format!("Mapping for field '{}' must be a JSON object", name))
        })?;

        let field_type = match object.get("type") {
            Some(Value::String(t)) => t.parse()?,
            Some(_) => {
                return Err(SearchError::validation(format!(
                    "Type of field '{}' must be a string",
                    name
                )));
            }
            None if object.contains_key("properties") => FieldType::Object,
            None => {
                return Err(SearchError::validation(format!(
                    "Field '{}' has neither a type nor properties",
                    name
                )));
            }
        };

        let mut field = MappingField::of_type(field_type);

        for (key, value) in object {
            match key.as_str() {
                "type" => {}
                "analyzer" => field.analyzer = Some(scalar_string(value)),
                "search_analyzer" => field.search_analyzer = Some(scalar_string(value)),
                "index" => field.index = Some(flag(name, key, value)?),
                "fielddata" => field.fielddata = Some(flag(name, key, value)?),
                "format" => field.format = Some(scalar_string(value)),
                "store" => field.store = Some(flag(name, key, value)?),
                "null_value" => field.null_value = Some(value.clone()),
                "properties" => field.properties = Some(properties_from_json(value)?),
                _ => {
                    field.options.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(field)
    }
}

fn properties_to_json(properties: &BTreeMap<String, MappingField>) -> Value {
    let mut props = Map::new();
    for (name, field) in properties {
        props.insert(name.clone(), field.to_json());
    }
    Value::Object(props)
}

fn properties_from_json(value: &Value) -> Result<BTreeMap<String, MappingField>> {
    let object = value
        .as_object()
        .ok_or_else(|| SearchError::validation("Mapping properties must be a JSON object"))?;

    object
        .iter()
        .map(|(name, field)| Ok((name.clone(), MappingField::from_json(name, field)?)))
        .collect()
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// The engine echoes booleans back as strings in some versions.
fn flag(field: &str, key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        _ => Err(SearchError::validation(format!(
            "Option '{}' of field '{}' must be a boolean",
            key, field
        ))),
    }
}

/// Field types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Full-text searchable field.
    Text,
    /// Exact match keyword field.
    Keyword,
    /// 64-bit integer.
    Long,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    Short,
    /// 8-bit integer.
    Byte,
    /// Double precision float.
    Double,
    /// Single precision float.
    Float,
    /// Half precision float.
    HalfFloat,
    /// Float backed by a long and a scaling factor.
    ScaledFloat,
    /// Boolean.
    Boolean,
    /// Date.
    Date,
    /// Binary data.
    Binary,
    /// Integer range.
    IntegerRange,
    /// Float range.
    FloatRange,
    /// Long range.
    LongRange,
    /// Double range.
    DoubleRange,
    /// Date range.
    DateRange,
    /// IP address.
    Ip,
    /// Completion suggester.
    Completion,
    /// Geo point.
    GeoPoint,
    /// Geo shape.
    GeoShape,
    /// Token count.
    TokenCount,
    /// Nested object, indexed as separate hidden documents.
    Nested,
    /// Object.
    Object,
    /// Flattened.
    Flattened,
    /// Search-as-you-type.
    SearchAsYouType,
    /// Any type without a dedicated variant, kept verbatim.
    Other(String),
}

impl FieldType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Text => "text",
            FieldType::Keyword => "keyword",
            FieldType::Long => "long",
            FieldType::Integer => "integer",
            FieldType::Short => "short",
            FieldType::Byte => "byte",
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::HalfFloat => "half_float",
            FieldType::ScaledFloat => "scaled_float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Binary => "binary",
            FieldType::IntegerRange => "integer_range",
            FieldType::FloatRange => "float_range",
            FieldType::LongRange => "long_range",
            FieldType::DoubleRange => "double_range",
            FieldType::DateRange => "date_range",
            FieldType::Ip => "ip",
            FieldType::Completion => "completion",
            FieldType::GeoPoint => "geo_point",
            FieldType::GeoShape => "geo_shape",
            FieldType::TokenCount => "token_count",
            FieldType::Nested => "nested",
            FieldType::Object => "object",
            FieldType::Flattened => "flattened",
            FieldType::SearchAsYouType => "search_as_you_type",
            FieldType::Other(name) => name,
        }
    }
}

impl FromStr for FieldType {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(SearchError::validation("Field type cannot be empty"));
        }

        Ok(match s {
            "text" => FieldType::Text,
            "keyword" => FieldType::Keyword,
            "long" => FieldType::Long,
            "integer" => FieldType::Integer,
            "short" => FieldType::Short,
            "byte" => FieldType::Byte,
            "double" => FieldType::Double,
            "float" => FieldType::Float,
            "half_float" => FieldType::HalfFloat,
            "scaled_float" => FieldType::ScaledFloat,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "binary" => FieldType::Binary,
            "integer_range" => FieldType::IntegerRange,
            "float_range" => FieldType::FloatRange,
            "long_range" => FieldType::LongRange,
            "double_range" => FieldType::DoubleRange,
            "date_range" => FieldType::DateRange,
            "ip" => FieldType::Ip,
            "completion" => FieldType::Completion,
            "geo_point" => FieldType::GeoPoint,
            "geo_shape" => FieldType::GeoShape,
            "token_count" => FieldType::TokenCount,
            "nested" => FieldType::Nested,
            "object" => FieldType::Object,
            "flattened" => FieldType::Flattened,
            "search_as_you_type" => FieldType::SearchAsYouType,
            other => FieldType::Other(other.to_string()),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_mapping() -> Mapping {
        Mapping::new()
            .field("id", MappingField::long())
            .field(
                "user",
                MappingField::nested()
                    .property("first", MappingField::keyword())
                    .property("last", MappingField::keyword())
                    .property("id", MappingField::long()),
            )
            .field("group", MappingField::text().fielddata(true))
    }

    #[test]
    fn test_mapping_to_json() {
        let json = user_mapping().to_json();

        assert_eq!(json["properties"]["id"]["type"], "long");
        assert_eq!(json["properties"]["user"]["type"], "nested");
        assert_eq!(json["properties"]["user"]["properties"]["first"]["type"], "keyword");
        assert_eq!(json["properties"]["group"]["fielddata"], true);
    }

    #[test]
    fn test_structured_and_document_forms_agree() {
        let document = r#"{
          "properties": {
            "id": { "type": "long" },
            "user": {
              "type": "nested",
              "properties": {
                "last": { "type": "keyword" },
                "id": { "type": "long" },
                "first": { "type": "keyword" }
              }
            },
            "group": { "fielddata": true, "type": "text" }
          }
        }"#;

        let parsed: Mapping = document.parse().unwrap();
        assert_eq!(parsed, user_mapping());
        assert_eq!(parsed.to_json(), user_mapping().to_json());
    }

    #[test]
    fn test_from_json_keeps_unknown_options_and_types() {
        let value = json!({
            "_source": { "enabled": true },
            "properties": {
                "name": {
                    "type": "text",
                    "fields": { "raw": { "type": "keyword", "ignore_above": 256 } }
                },
                "price": { "type": "scaled_float", "scaling_factor": 100 },
                "shape": { "type": "shape" },
                "address": { "properties": { "city": { "type": "keyword" } } }
            }
        });

        let mapping = Mapping::from_json(&value).unwrap();

        assert_eq!(mapping.get("price").unwrap().field_type, FieldType::ScaledFloat);
        assert_eq!(
            mapping.get("shape").unwrap().field_type,
            FieldType::Other("shape".to_string())
        );
        assert_eq!(mapping.get("address").unwrap().field_type, FieldType::Object);
        assert_eq!(
            mapping.get("address").unwrap().get("city").unwrap().field_type,
            FieldType::Keyword
        );
        assert_eq!(mapping.to_json(), value);
    }

    #[test]
    fn test_malformed_documents_are_rejected() {
        assert!(matches!("{ not json".parse::<Mapping>(), Err(SearchError::Validation(_))));
        assert!(matches!("[]".parse::<Mapping>(), Err(SearchError::Validation(_))));
        assert!(matches!(
            r#"{"properties": {"a": {"index": true}}}"#.parse::<Mapping>(),
            Err(SearchError::Validation(_))
        ));
        assert!(matches!(
            r#"{"properties": {"a": {"type": "text", "fielddata": 3}}}"#.parse::<Mapping>(),
            Err(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_field_options() {
        let field = MappingField::date()
            .format("yyyy-MM-dd")
            .index(false)
            .store(true)
            .null_value(json!("1970-01-01"));

        let json = field.to_json();
        assert_eq!(json["type"], "date");
        assert_eq!(json["format"], "yyyy-MM-dd");
        assert_eq!(json["index"], false);
        assert_eq!(json["store"], true);
        assert_eq!(json["null_value"], "1970-01-01");
    }
}
