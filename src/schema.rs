//! Item field sets and payload validation.
//!
//! An [`ItemSchema`] lists the user-supplied fields an item carries. The
//! server-owned fields (`id`, `createdAt`, `updatedAt`) are never part of a
//! schema and are dropped from payloads.

use std::str::FromStr;

use anyhow::anyhow;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// A payload that does not satisfy the item schema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} is a required field")]
    MissingField { field: String },
    #[error("{field} must not be empty")]
    EmptyField { field: String },
    #[error("{field} must be a {expected}")]
    WrongType { field: String, expected: &'static str },
    #[error("{field} must not be negative")]
    Negative { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
}

impl FieldKind {
    fn describe(self) -> &'static str {
        match self {
            FieldKind::Text => "string",
            FieldKind::Number => "number",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Only meaningful for [`FieldKind::Number`]
    pub non_negative: bool,
    /// Stored when an optional field is omitted on create
    pub default: Option<JsonValue>,
}

impl FieldSpec {
    pub fn required(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            non_negative: false,
            default: None,
        }
    }

    pub fn optional(name: &str, kind: FieldKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn non_negative(mut self) -> Self {
        self.non_negative = true;
        self
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    fn check(&self, value: &JsonValue) -> Result<(), ValidationError> {
        match self.kind {
            FieldKind::Text => {
                let text = value.as_str().ok_or_else(|| self.wrong_type())?;
                if self.required && text.trim().is_empty() {
                    return Err(ValidationError::EmptyField {
                        field: self.name.clone(),
                    });
                }
            }
            FieldKind::Number => {
                let number = value.as_f64().ok_or_else(|| self.wrong_type())?;
                if self.non_negative && number < 0.0 {
                    return Err(ValidationError::Negative {
                        field: self.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn wrong_type(&self) -> ValidationError {
        ValidationError::WrongType {
            field: self.name.clone(),
            expected: self.kind.describe(),
        }
    }

    fn missing(&self) -> ValidationError {
        ValidationError::MissingField {
            field: self.name.clone(),
        }
    }
}

/// The configurable field set of an item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSchema {
    name: String,
    fields: Vec<FieldSpec>,
}

impl ItemSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// `name` only
    pub fn basic() -> Self {
        Self::new("basic", vec![FieldSpec::required("name", FieldKind::Text)])
    }

    /// `name`, non-negative `price`, optional `description` (defaults to "")
    pub fn priced() -> Self {
        Self::new(
            "priced",
            vec![
                FieldSpec::required("name", FieldKind::Text),
                FieldSpec::required("price", FieldKind::Number).non_negative(),
                FieldSpec::optional("description", FieldKind::Text)
                    .with_default(JsonValue::String(String::new())),
            ],
        )
    }

    /// `name`, optional `description`, required `category`
    pub fn catalog() -> Self {
        Self::new(
            "catalog",
            vec![
                FieldSpec::required("name", FieldKind::Text),
                FieldSpec::optional("description", FieldKind::Text),
                FieldSpec::required("category", FieldKind::Text),
            ],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validates a creation payload and returns only the schema's fields
    ///
    /// Omitted optional fields take their default when one is declared.
    /// Unknown keys are ignored.
    pub fn validate_new(
        &self,
        payload: &Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>, ValidationError> {
        let mut fields = Map::new();
        for spec in &self.fields {
            match payload.get(&spec.name) {
                Some(value) if !value.is_null() => {
                    spec.check(value)?;
                    fields.insert(spec.name.clone(), value.clone());
                }
                _ if spec.required => return Err(spec.missing()),
                _ => {
                    if let Some(default) = &spec.default {
                        fields.insert(spec.name.clone(), default.clone());
                    }
                }
            }
        }
        Ok(fields)
    }

    /// Checks the type and range of every non-null field supplied in `patch`
    ///
    /// Needs no stored item, so it can run before the store is consulted.
    pub fn check_patch(&self, patch: &Map<String, JsonValue>) -> Result<(), ValidationError> {
        for spec in &self.fields {
            if let Some(value) = patch.get(&spec.name).filter(|value| !value.is_null()) {
                spec.check(value)?;
            }
        }
        Ok(())
    }

    /// Overlays the supplied fields of `patch` onto `existing`
    ///
    /// Omitted fields keep their current value. An explicit `null` clears an
    /// optional field back to its default and is rejected for a required one.
    pub fn merge(
        &self,
        existing: &Map<String, JsonValue>,
        patch: &Map<String, JsonValue>,
    ) -> Result<Map<String, JsonValue>, ValidationError> {
        let mut merged = existing.clone();
        for spec in &self.fields {
            match patch.get(&spec.name) {
                None => {}
                Some(JsonValue::Null) if spec.required => return Err(spec.missing()),
                Some(JsonValue::Null) => match &spec.default {
                    Some(default) => {
                        merged.insert(spec.name.clone(), default.clone());
                    }
                    None => {
                        merged.remove(&spec.name);
                    }
                },
                Some(value) => {
                    spec.check(value)?;
                    merged.insert(spec.name.clone(), value.clone());
                }
            }
            if spec.required && !merged.contains_key(&spec.name) {
                return Err(spec.missing());
            }
        }
        Ok(merged)
    }
}

impl FromStr for ItemSchema {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "basic" => Ok(ItemSchema::basic()),
            "priced" => Ok(ItemSchema::priced()),
            "catalog" => Ok(ItemSchema::catalog()),
            other => Err(anyhow!(
                "expected one of: basic, priced, catalog, got '{}'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => panic!("expected a JSON object"),
        }
    }

    #[test]
    fn test_basic_requires_name() {
        let schema = ItemSchema::basic();
        let err = schema.validate_new(&object(json!({}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "name".to_string() });
        assert_eq!(err.to_string(), "name is a required field");
    }

    #[test]
    fn test_blank_name_rejected() {
        let schema = ItemSchema::basic();
        let err = schema.validate_new(&object(json!({"name": "   "}))).unwrap_err();
        assert_eq!(err, ValidationError::EmptyField { field: "name".to_string() });
    }

    #[test]
    fn test_null_required_field_is_missing() {
        let schema = ItemSchema::basic();
        let err = schema.validate_new(&object(json!({"name": null}))).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { .. }));
    }

    #[test]
    fn test_priced_applies_description_default() {
        let schema = ItemSchema::priced();
        let fields = schema
            .validate_new(&object(json!({"name": "Widget", "price": 9.99})))
            .unwrap();
        assert_eq!(JsonValue::Object(fields), json!({"name": "Widget", "price": 9.99, "description": ""}));
    }

    #[test]
    fn test_priced_rejects_negative_price() {
        let schema = ItemSchema::priced();
        let err = schema
            .validate_new(&object(json!({"name": "Widget", "price": -1})))
            .unwrap_err();
        assert_eq!(err, ValidationError::Negative { field: "price".to_string() });
    }

    #[test]
    fn test_priced_rejects_string_price() {
        let schema = ItemSchema::priced();
        let err = schema
            .validate_new(&object(json!({"name": "Widget", "price": "cheap"})))
            .unwrap_err();
        assert_eq!(err.to_string(), "price must be a number");
    }

    #[test]
    fn test_zero_price_allowed() {
        let schema = ItemSchema::priced();
        assert!(schema.validate_new(&object(json!({"name": "Free", "price": 0}))).is_ok());
    }

    #[test]
    fn test_unknown_and_server_fields_dropped() {
        let schema = ItemSchema::catalog();
        let fields = schema
            .validate_new(&object(json!({
                "id": "forged",
                "createdAt": "2020-01-01T00:00:00Z",
                "name": "Lamp",
                "category": "lighting",
                "colour": "red"
            })))
            .unwrap();
        assert_eq!(JsonValue::Object(fields), json!({"name": "Lamp", "category": "lighting"}));
    }

    #[test]
    fn test_catalog_requires_category() {
        let schema = ItemSchema::catalog();
        let err = schema.validate_new(&object(json!({"name": "Lamp"}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "category".to_string() });
    }

    #[test]
    fn test_merge_preserves_unspecified_fields() {
        let schema = ItemSchema::priced();
        let existing = object(json!({"name": "x", "price": 5, "description": "d"}));
        let merged = schema.merge(&existing, &object(json!({"price": 7}))).unwrap();
        assert_eq!(JsonValue::Object(merged), json!({"name": "x", "price": 7, "description": "d"}));
    }

    #[test]
    fn test_merge_validates_supplied_fields() {
        let schema = ItemSchema::priced();
        let existing = object(json!({"name": "x", "price": 5}));
        let err = schema.merge(&existing, &object(json!({"name": ""}))).unwrap_err();
        assert_eq!(err, ValidationError::EmptyField { field: "name".to_string() });
    }

    #[test]
    fn test_merge_null_clears_optional_field() {
        let schema = ItemSchema::catalog();
        let existing = object(json!({"name": "Lamp", "description": "bright", "category": "lighting"}));
        let merged = schema.merge(&existing, &object(json!({"description": null}))).unwrap();
        assert_eq!(JsonValue::Object(merged), json!({"name": "Lamp", "category": "lighting"}));
    }

    #[test]
    fn test_merge_null_resets_to_default() {
        let schema = ItemSchema::priced();
        let existing = object(json!({"name": "x", "price": 5, "description": "d"}));
        let merged = schema.merge(&existing, &object(json!({"description": null}))).unwrap();
        assert_eq!(merged.get("description"), Some(&json!("")));
    }

    #[test]
    fn test_merge_null_required_rejected() {
        let schema = ItemSchema::priced();
        let existing = object(json!({"name": "x", "price": 5}));
        let err = schema.merge(&existing, &object(json!({"price": null}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingField { field: "price".to_string() });
    }

    #[test]
    fn test_merge_ignores_unknown_fields() {
        let schema = ItemSchema::basic();
        let existing = object(json!({"name": "x"}));
        let merged = schema.merge(&existing, &object(json!({"id": "other", "extra": 1}))).unwrap();
        assert_eq!(JsonValue::Object(merged), json!({"name": "x"}));
    }

    #[test]
    fn test_parse_presets() {
        assert_eq!("basic".parse::<ItemSchema>().unwrap(), ItemSchema::basic());
        assert_eq!("priced".parse::<ItemSchema>().unwrap(), ItemSchema::priced());
        assert_eq!("catalog".parse::<ItemSchema>().unwrap(), ItemSchema::catalog());
        assert!("other".parse::<ItemSchema>().is_err());
    }

    #[test]
    fn test_check_patch_needs_no_stored_item() {
        let schema = ItemSchema::priced();
        assert!(schema.check_patch(&object(json!({"price": 3}))).is_ok());
        assert!(schema.check_patch(&object(json!({"price": null, "extra": -1}))).is_ok());
        assert_eq!(
            schema.check_patch(&object(json!({"price": -3}))),
            Err(ValidationError::Negative { field: "price".to_string() })
        );
        assert_eq!(
            schema.check_patch(&object(json!({"name": 7}))),
            Err(ValidationError::WrongType { field: "name".to_string(), expected: "string" })
        );
    }
}
