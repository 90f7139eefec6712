//! Content Validation
//!
//! Walks a [`ValueTree`] against a schema and collects [`ContentError`]s.
//! Content problems never abort the walk; only schema problems (a `$ref`
//! that cannot be resolved) are returned as `Err`.
//!
//! Errors are tagged with the property they concern. An error raised for a
//! property's value is presented through the `overwriteErrors` table of the
//! enclosing object schema; object-level errors (`required`, `either`, ...)
//! go through the object schema's own table.

pub mod format;

use chrono::{DateTime, Utc};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::diagnostics::{ContentError, ErrorCode};
use crate::document::{pointer_push, ValueKind, ValueTree};
use crate::error::Result;
use crate::schema::{
    AdditionalProperties, DocumentLoader, ErrorOverrides, Resolver, SchemaHandle, SchemaNode,
};

/// Validates content documents against loaded schemas
#[derive(Clone, Copy)]
pub struct Validator<'a> {
    resolver: Resolver<'a>,
    now: DateTime<Utc>,
}

impl<'a> Validator<'a> {
    pub fn new(loader: &'a dyn DocumentLoader) -> Self {
        Self {
            resolver: Resolver::new(loader),
            now: Utc::now(),
        }
    }

    /// Fix the "now" that relative date windows are measured from
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn validate(&self, schema: &SchemaHandle, tree: &ValueTree) -> Result<Vec<ContentError>> {
        let mut walk = Walk {
            validator: self,
            tree,
            errors: Vec::new(),
        };
        walk.node(schema, &tree.root, "", Scope::default())?;

        debug!(file = %tree.file, errors = walk.errors.len(), "Validated document");
        Ok(walk.errors)
    }
}

/// Property tag and override table applied to errors raised for a value
#[derive(Clone, Copy, Default)]
struct Scope<'s> {
    property: Option<&'s str>,
    overrides: Option<&'s ErrorOverrides>,
}

impl<'s> Scope<'s> {
    fn tagged(property: &'s str, overrides: &'s ErrorOverrides) -> Self {
        Self {
            property: Some(property),
            overrides: Some(overrides),
        }
    }
}

struct Walk<'v, 'a> {
    validator: &'v Validator<'a>,
    tree: &'v ValueTree,
    errors: Vec<ContentError>,
}

impl<'v, 'a> Walk<'v, 'a> {
    fn emit(&mut self, scope: Scope<'_>, code: ErrorCode, message: String, pointer: &str) {
        let mut error = ContentError::new(code, message, self.tree.location(pointer));
        if let Some(property) = scope.property {
            error = error.with_property(property);
        }
        if let Some(overrides) = scope.overrides {
            overrides.apply(&mut error);
        }
        self.errors.push(error);
    }

    fn node(&mut self, schema: &SchemaHandle, value: &Value, pointer: &str, scope: Scope<'_>) -> Result<()> {
        let resolved = self.validator.resolver.resolve(schema)?;
        let node = resolved.node();

        match node.boolean {
            Some(true) => return Ok(()),
            Some(false) => {
                self.emit(
                    scope,
                    ErrorCode::BooleanSchemaFailed,
                    "Value is not allowed here".to_string(),
                    pointer,
                );
                return Ok(());
            }
            None => {}
        }

        let kind = ValueKind::of(value);
        if let Some(types) = &node.types {
            if !types.accepts(kind) {
                self.emit(
                    scope,
                    ErrorCode::UnexpectedType,
                    format!("Expected type '{}' but got '{}'", types, kind),
                    pointer,
                );
                return Ok(());
            }
        }

        if let Some(replacement) = &node.replaced_by {
            let name = scope.property.unwrap_or("value");
            self.emit(
                scope,
                ErrorCode::AttributeDeprecated,
                format!("Deprecated attribute: '{}', use '{}' instead", name, replacement),
                pointer,
            );
        }

        if let Some(expected) = &node.const_value {
            if !json_equal(expected, value) {
                self.emit(
                    scope,
                    ErrorCode::InvalidValue,
                    format!("Invalid value '{}': expected '{}'", display(value), display(expected)),
                    pointer,
                );
            }
        }
        if let Some(allowed) = &node.enum_values {
            if !allowed.iter().any(|candidate| json_equal(candidate, value)) {
                let allowed: Vec<String> = allowed.iter().map(|v| format!("'{}'", display(v))).collect();
                self.emit(
                    scope,
                    ErrorCode::InvalidValue,
                    format!("Invalid value '{}': expected one of {}", display(value), allowed.join(", ")),
                    pointer,
                );
            }
        }

        match value {
            Value::String(text) => self.string(node, text, pointer, scope),
            Value::Number(number) => self.number(node, number, pointer, scope),
            Value::Array(items) => self.array(&resolved, items, pointer, scope)?,
            Value::Object(map) => self.object(&resolved, map, pointer, scope)?,
            Value::Null | Value::Bool(_) => {}
        }
        Ok(())
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    fn string(&mut self, node: &SchemaNode, text: &str, pointer: &str, scope: Scope<'_>) {
        let length = text.chars().count();
        if let Some(min) = node.min_length.filter(|min| length < *min) {
            self.emit(
                scope,
                ErrorCode::StringLengthInvalid,
                format!("String '{}' is too short: minimum length is {}", text, min),
                pointer,
            );
        }
        if let Some(max) = node.max_length.filter(|max| length > *max) {
            self.emit(
                scope,
                ErrorCode::StringLengthInvalid,
                format!("String '{}' is too long: maximum length is {}", text, max),
                pointer,
            );
        }

        if let Some(pattern) = node.pattern.as_ref().filter(|p| !p.is_match(text)) {
            self.emit(
                scope,
                ErrorCode::PatternMismatch,
                format!("String '{}' does not match pattern '{}'", text, pattern.as_str()),
                pointer,
            );
        }

        if node.format.as_deref() == Some("date-time") && !format::is_date_time(text) {
            self.emit(
                scope,
                ErrorCode::FormatInvalid,
                format!("String '{}' is not a valid date-time", text),
                pointer,
            );
        }

        let Some(date_format) = &node.date_format else {
            return;
        };
        let Some(date) = format::parse_date(text, date_format) else {
            self.emit(
                scope,
                ErrorCode::DateFormatInvalid,
                format!("Date '{}' does not match format '{}'", text, date_format),
                pointer,
            );
            return;
        };

        let now = self.validator.now;
        // a bound past chrono's range leaves that side of the window open
        let too_early = node
            .relative_min_date
            .and_then(|min| now.checked_add_signed(min))
            .is_some_and(|min| date < min);
        let too_late = node
            .relative_max_date
            .and_then(|max| now.checked_add_signed(max))
            .is_some_and(|max| date > max);
        if too_early || too_late {
            self.emit(
                scope,
                ErrorCode::DateOutOfRange,
                format!("Date '{}' is outside the allowed range", text),
                pointer,
            );
        }
    }

    fn number(&mut self, node: &SchemaNode, number: &Number, pointer: &str, scope: Scope<'_>) {
        let Some(n) = number.as_f64() else { return };

        let violation = if node.minimum.is_some_and(|min| n < min) {
            node.minimum.map(|min| format!("Value {} is less than minimum {}", n, min))
        } else if node.exclusive_minimum.is_some_and(|min| n <= min) {
            node.exclusive_minimum
                .map(|min| format!("Value {} must be greater than {}", n, min))
        } else if node.maximum.is_some_and(|max| n > max) {
            node.maximum.map(|max| format!("Value {} is greater than maximum {}", n, max))
        } else if node.exclusive_maximum.is_some_and(|max| n >= max) {
            node.exclusive_maximum
                .map(|max| format!("Value {} must be less than {}", n, max))
        } else {
            None
        };

        if let Some(message) = violation {
            self.emit(scope, ErrorCode::NumberInvalid, message, pointer);
        }
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    fn array(&mut self, schema: &SchemaHandle, items: &[Value], pointer: &str, scope: Scope<'_>) -> Result<()> {
        let node = schema.node();

        if let Some(item_schema) = node.items {
            let item_schema = schema.sibling(item_schema);
            for (index, item) in items.iter().enumerate() {
                let item_pointer = pointer_push(pointer, &index.to_string());
                self.node(&item_schema, item, &item_pointer, scope)?;
            }
        }

        if let Some(min) = node.min_items.filter(|min| items.len() < *min) {
            self.emit(
                scope,
                ErrorCode::ArrayLengthInvalid,
                format!("Array has {} items: minimum is {}", items.len(), min),
                pointer,
            );
        }
        if let Some(max) = node.max_items.filter(|max| items.len() > *max) {
            self.emit(
                scope,
                ErrorCode::ArrayLengthInvalid,
                format!("Array has {} items: maximum is {}", items.len(), max),
                pointer,
            );
        }

        if node.unique_items {
            let duplicate = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| json_equal(a, b)));
            if duplicate {
                self.emit(
                    scope,
                    ErrorCode::ArrayNotUnique,
                    "Array items must be unique".to_string(),
                    pointer,
                );
            }
        }
        Ok(())
    }

    // =========================================================================
    // Objects
    // =========================================================================

    fn object(
        &mut self,
        schema: &SchemaHandle,
        map: &Map<String, Value>,
        pointer: &str,
        scope: Scope<'_>,
    ) -> Result<()> {
        let node = schema.node();
        let own = &node.overwrite_errors;

        if let Some(min) = node.min_properties.filter(|min| map.len() < *min) {
            self.emit(
                scope,
                ErrorCode::PropertyCountInvalid,
                format!("Object has {} properties: minimum is {}", map.len(), min),
                pointer,
            );
        }
        if let Some(max) = node.max_properties.filter(|max| map.len() > *max) {
            self.emit(
                scope,
                ErrorCode::PropertyCountInvalid,
                format!("Object has {} properties: maximum is {}", map.len(), max),
                pointer,
            );
        }

        if let Some(names) = node.property_names {
            let names = schema.sibling(names);
            for key in map.keys() {
                let key_value = Value::String(key.clone());
                self.node(&names, &key_value, &pointer_push(pointer, key), Scope::tagged(key, own))?;
            }
        }

        for name in &node.required {
            if !map.contains_key(name) {
                self.emit(
                    Scope::tagged(name, own),
                    ErrorCode::MissingAttribute,
                    format!("Missing required attribute: '{}'", name),
                    pointer,
                );
            }
        }

        for (key, co_names) in &node.dependencies {
            if !map.contains_key(key) {
                continue;
            }
            for co_name in co_names.iter().filter(|n| !map.contains_key(n.as_str())) {
                self.emit(
                    Scope::tagged(key, own),
                    ErrorCode::MissingPairedAttribute,
                    format!("Missing attribute '{}': required when '{}' is present", co_name, key),
                    pointer,
                );
            }
        }

        for group in &node.either {
            if !group.iter().any(|name| map.contains_key(name)) {
                self.emit(
                    Scope::tagged(&group[0], own),
                    ErrorCode::MissingEitherAttribute,
                    format!("At least one of {} is required", quoted(group)),
                    pointer,
                );
            }
        }

        for group in &node.precludes {
            if group.iter().filter(|name| map.contains_key(name.as_str())).count() > 1 {
                self.emit(
                    Scope::tagged(&group[0], own),
                    ErrorCode::PrecludedAttributes,
                    format!("Only one of {} may be present", quoted(group)),
                    pointer,
                );
            }
        }

        for rule in &node.enum_dependencies {
            let triggered = map
                .get(&rule.controlling)
                .is_some_and(|value| rule.is_triggered_by(value));
            if !triggered {
                continue;
            }
            match map.get(&rule.dependent) {
                None => self.emit(
                    Scope::tagged(&rule.dependent, own),
                    ErrorCode::MissingPairedAttribute,
                    format!(
                        "Missing attribute '{}': required when '{}' is '{}'",
                        rule.dependent, rule.controlling, rule.controlling_value
                    ),
                    pointer,
                ),
                Some(value) if !rule.allowed.iter().any(|allowed| json_equal(allowed, value)) => self.emit(
                    Scope::tagged(&rule.dependent, own),
                    ErrorCode::InvalidPairedAttribute,
                    format!(
                        "Invalid value '{}' for '{}' when '{}' is '{}'",
                        display(value),
                        rule.dependent,
                        rule.controlling,
                        rule.controlling_value
                    ),
                    &pointer_push(pointer, &rule.dependent),
                ),
                Some(_) => {}
            }
        }

        for (key, child) in map {
            let child_pointer = pointer_push(pointer, key);
            let child_scope = Scope::tagged(key, own);
            let matched = node.matched_schemas(key);

            if matched.is_empty() {
                match node.additional_properties {
                    AdditionalProperties::Allowed => {}
                    AdditionalProperties::Denied => self.emit(
                        child_scope,
                        ErrorCode::UnknownField,
                        format!("Could not find member '{}'", key),
                        &child_pointer,
                    ),
                    AdditionalProperties::Typed(id) => {
                        self.node(&schema.sibling(id), child, &child_pointer, child_scope)?
                    }
                }
                continue;
            }

            for id in matched {
                self.node(&schema.sibling(id), child, &child_pointer, child_scope)?;
            }
        }
        Ok(())
    }
}

/// Deep structural equality; numbers compare by value so `1 == 1.0`
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_equal(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| json_equal(a, b)))
        }
        _ => a == b,
    }
}

/// Integers compare exactly; floats fall back to `f64`
fn number_equal(x: &Number, y: &Number) -> bool {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
        return x == y;
    }
    if x.is_f64() || y.is_f64() {
        return x.as_f64() == y.as_f64();
    }
    // one negative i64 and one u64 above i64::MAX
    false
}

/// Strings without their JSON quotes, everything else as JSON text
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{}'", name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::schema::{NoDocuments, SchemaDocument};
    use chrono::TimeZone;
    use serde_json::json;

    fn check(schema: Value, value: Value) -> Vec<ContentError> {
        let document = SchemaDocument::load(&schema.to_string()).unwrap();
        let tree = ValueTree::new("doc.json", value);
        Validator::new(&NoDocuments)
            .validate(&SchemaHandle::root(&document), &tree)
            .unwrap()
    }

    fn codes(errors: &[ContentError]) -> Vec<&str> {
        errors.iter().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn test_type_mismatch_short_circuits() {
        let errors = check(json!({"type": "string", "minLength": 5, "enum": ["x"]}), json!(3));
        assert_eq!(codes(&errors), ["UnexpectedType"]);
        assert_eq!(errors[0].message, "Expected type 'string' but got 'integer'");
    }

    #[test]
    fn test_integer_and_number() {
        assert!(check(json!({"type": "integer"}), json!(1.0)).is_empty());
        assert_eq!(codes(&check(json!({"type": "integer"}), json!(1.5))), ["UnexpectedType"]);
        assert!(check(json!({"type": "number"}), json!(3)).is_empty());
        assert!(check(json!({"type": ["string", "null"]}), json!(null)).is_empty());
    }

    #[test]
    fn test_enum_and_const() {
        assert!(check(json!({"enum": [1, "a"]}), json!(1.0)).is_empty());
        assert_eq!(codes(&check(json!({"enum": [1, "a"]}), json!("b"))), ["InvalidValue"]);
        assert_eq!(codes(&check(json!({"const": {"a": [1]}}), json!({"a": [2]}))), ["InvalidValue"]);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let schema = json!({"uniqueItems": true});
        assert!(check(schema.clone(), json!([u64::MAX, u64::MAX - 1])).is_empty());
        assert_eq!(codes(&check(schema, json!([u64::MAX, u64::MAX]))), ["ArrayNotUnique"]);

        assert_eq!(
            codes(&check(json!({"enum": [9007199254740993_i64]}), json!(9007199254740992_i64))),
            ["InvalidValue"]
        );
        assert!(check(json!({"const": -3}), json!(-3.0)).is_empty());
    }

    #[test]
    fn test_string_length_counts_codepoints() {
        let schema = json!({"type": "string", "maxLength": 2});
        assert!(check(schema.clone(), json!("😀😀")).is_empty());
        assert_eq!(codes(&check(schema, json!("😀😀😀"))), ["StringLengthInvalid"]);
    }

    #[test]
    fn test_pattern_and_format() {
        let errors = check(json!({"pattern": "^[a-z]+$", "format": "date-time"}), json!("ABC"));
        assert_eq!(codes(&errors), ["PatternMismatch", "FormatInvalid"]);
    }

    #[test]
    fn test_date_window() {
        let schema = json!({
            "dateFormat": "yyyy-MM-dd",
            "relativeMinDate": "-30.00:00:00",
            "relativeMaxDate": "00:00:00"
        });
        let document = SchemaDocument::load(&schema.to_string()).unwrap();
        let validator = Validator::new(&NoDocuments)
            .with_reference_time(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let run = |value: &str| {
            let tree = ValueTree::new("doc.json", json!(value));
            validator.validate(&SchemaHandle::root(&document), &tree).unwrap()
        };

        assert!(run("2024-05-20").is_empty());
        assert_eq!(codes(&run("2024-01-01")), ["DateOutOfRange"]);
        assert_eq!(codes(&run("2024-07-01")), ["DateOutOfRange"]);
        assert_eq!(codes(&run("June 1st")), ["DateFormatInvalid"]);
        assert_eq!(run("2024-01-01")[0].severity, Severity::Warning);
    }

    #[test]
    fn test_date_window_beyond_calendar_is_open() {
        let late = json!({"dateFormat": "yyyy-MM-dd", "relativeMaxDate": "4000000000"});
        assert!(check(late, json!("2024-01-01")).is_empty());

        let early = json!({"dateFormat": "yyyy-MM-dd", "relativeMinDate": "-4000000000"});
        assert!(check(early, json!("1900-01-01")).is_empty());
    }

    #[test]
    fn test_number_bounds() {
        let schema = json!({"minimum": 1, "exclusiveMaximum": 10});
        assert!(check(schema.clone(), json!(1)).is_empty());
        assert_eq!(codes(&check(schema.clone(), json!(0))), ["NumberInvalid"]);
        assert_eq!(codes(&check(schema, json!(10))), ["NumberInvalid"]);
    }

    #[test]
    fn test_array_checks() {
        let schema = json!({
            "type": "array",
            "items": {"type": "integer"},
            "maxItems": 2,
            "uniqueItems": true
        });
        assert!(check(schema.clone(), json!([1, 2])).is_empty());

        let errors = check(schema, json!([1, "x", 1.0]));
        assert_eq!(codes(&errors), ["UnexpectedType", "ArrayLengthInvalid", "ArrayNotUnique"]);
    }

    #[test]
    fn test_unique_items_deep_equality() {
        let schema = json!({"uniqueItems": true});
        assert_eq!(
            codes(&check(schema.clone(), json!([{"a": [1]}, {"a": [1]}]))),
            ["ArrayNotUnique"]
        );
        assert!(check(schema, json!([{"a": [1]}, {"a": [2]}])).is_empty());
    }

    #[test]
    fn test_required_tagged_by_name() {
        let schema = json!({"type": "object", "required": ["a"]});
        let errors = check(schema.clone(), json!({}));
        assert_eq!(codes(&errors), ["MissingAttribute"]);
        assert_eq!(errors[0].property.as_deref(), Some("a"));
        assert!(check(schema, json!({"a": 1})).is_empty());
    }

    #[test]
    fn test_either_groups() {
        let schema = json!({"either": [["a", "b"]]});
        let errors = check(schema.clone(), json!({}));
        assert_eq!(codes(&errors), ["MissingEitherAttribute"]);
        assert_eq!(errors[0].property.as_deref(), Some("a"));

        for value in [json!({"a": 1}), json!({"b": 1}), json!({"a": 1, "b": 1})] {
            assert!(check(schema.clone(), value).is_empty());
        }
    }

    #[test]
    fn test_precludes_groups() {
        let schema = json!({"precludes": [["a", "b"]]});
        let errors = check(schema.clone(), json!({"a": 1, "b": 1}));
        assert_eq!(codes(&errors), ["PrecludedAttributes"]);
        assert_eq!(errors[0].property.as_deref(), Some("a"));
        assert!(check(schema, json!({"a": 1})).is_empty());
    }

    #[test]
    fn test_dependencies_one_error_per_missing_co_name() {
        let schema = json!({"dependencies": {"a": ["b", "c"]}});
        let errors = check(schema.clone(), json!({"a": 1}));
        assert_eq!(codes(&errors), ["MissingPairedAttribute", "MissingPairedAttribute"]);
        assert!(errors.iter().all(|e| e.property.as_deref() == Some("a")));
        assert!(check(schema, json!({"b": 1})).is_empty());
    }

    #[test]
    fn test_enum_dependencies() {
        let schema = json!({
            "enumDependencies": { "product": { "azure": { "service": ["vm", "storage"] } } }
        });
        assert!(check(schema.clone(), json!({"product": "azure", "service": "vm"})).is_empty());
        assert!(check(schema.clone(), json!({"product": "aws"})).is_empty());

        let errors = check(schema.clone(), json!({"product": "azure", "service": "lambda"}));
        assert_eq!(codes(&errors), ["InvalidPairedAttribute"]);
        assert_eq!(errors[0].property.as_deref(), Some("service"));

        let errors = check(schema, json!({"product": "azure"}));
        assert_eq!(codes(&errors), ["MissingPairedAttribute"]);
    }

    #[test]
    fn test_additional_properties_denied() {
        let schema = json!({"type": "object", "properties": {"a": {}}, "additionalProperties": false});
        let errors = check(schema, json!({"a": 1, "b": 2}));
        assert_eq!(codes(&errors), ["UnknownField"]);
        assert_eq!(errors[0].property.as_deref(), Some("b"));
        assert!(errors[0].message.contains("'b'"));
    }

    #[test]
    fn test_additional_properties_typed_and_patterns() {
        let schema = json!({
            "patternProperties": {"^x-": {"type": "string"}},
            "additionalProperties": {"type": "integer"}
        });
        assert!(check(schema.clone(), json!({"x-a": "s", "n": 1})).is_empty());
        let errors = check(schema, json!({"x-a": 1, "n": "s"}));
        assert_eq!(codes(&errors), ["UnexpectedType", "UnexpectedType"]);
    }

    #[test]
    fn test_property_count_and_names() {
        let schema = json!({"maxProperties": 1, "propertyNames": {"pattern": "^[a-z]+$"}});
        let errors = check(schema, json!({"a": 1, "B": 2}));
        assert_eq!(codes(&errors), ["PropertyCountInvalid", "PatternMismatch"]);
        assert_eq!(errors[1].property.as_deref(), Some("B"));
    }

    #[test]
    fn test_deprecated_property_warns() {
        let schema = json!({"properties": {"old": {"replacedBy": "new"}}});
        let errors = check(schema, json!({"old": 1}));
        assert_eq!(codes(&errors), ["AttributeDeprecated"]);
        assert_eq!(errors[0].severity, Severity::Warning);
        assert_eq!(errors[0].message, "Deprecated attribute: 'old', use 'new' instead");
    }

    #[test]
    fn test_false_schema() {
        let schema = json!({"properties": {"never": false}});
        assert_eq!(codes(&check(schema, json!({"never": 1}))), ["BooleanSchemaFailed"]);
    }

    #[test]
    fn test_cyclic_ref_matches_nothing() {
        let schema = json!({
            "properties": {"a": {"$ref": "#/definitions/b"}},
            "definitions": {
                "b": {"$ref": "#/definitions/c"},
                "c": {"$ref": "#/definitions/b"}
            }
        });
        assert_eq!(codes(&check(schema, json!({"a": 1}))), ["BooleanSchemaFailed"]);
    }

    #[test]
    fn test_recursive_schema() {
        let schema = json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "children": {"type": "array", "items": {"$ref": "#"}}
            }
        });
        let value = json!({"name": "a", "children": [{"name": "b", "children": [{"name": 3}]}]});
        let errors = check(schema, value);
        assert_eq!(codes(&errors), ["UnexpectedType"]);
        assert_eq!(errors[0].property.as_deref(), Some("name"));
    }

    #[test]
    fn test_override_applies_to_tagged_code_only() {
        let schema = json!({
            "type": "object",
            "required": ["a"],
            "properties": {"b": {"type": "string"}},
            "overwriteErrors": {
                "a": {"MissingAttribute": {"severity": "warning", "message": "custom"}},
                "b": {"MissingAttribute": {"severity": "info"}}
            }
        });
        let errors = check(schema, json!({"b": 1}));
        assert_eq!(errors.len(), 2);

        assert_eq!(errors[0].code, "MissingAttribute");
        assert_eq!(errors[0].severity, Severity::Warning);
        assert_eq!(errors[0].message, "custom");

        assert_eq!(errors[1].code, "UnexpectedType");
        assert_eq!(errors[1].severity, Severity::Error);
    }

    #[test]
    fn test_override_leaves_other_codes_on_same_property() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "dependencies": {"a": ["c"]},
            "overwriteErrors": {
                "a": {"MissingAttribute": {"severity": "info", "message": "custom"}}
            }
        });
        let errors = check(schema, json!({"a": 1}));
        assert_eq!(codes(&errors), ["MissingPairedAttribute", "UnexpectedType"]);

        assert!(errors.iter().all(|e| e.property.as_deref() == Some("a")));
        assert!(errors.iter().all(|e| e.severity == Severity::Error));
        assert_eq!(
            errors[0].message,
            "Missing attribute 'c': required when 'a' is present"
        );
        assert_eq!(errors[1].message, "Expected type 'string' but got 'integer'");
    }

    #[test]
    fn test_override_rewrites_code() {
        let schema = json!({
            "properties": {"n": {"type": "integer"}},
            "overwriteErrors": {"n": {"UnexpectedType": {"code": "BadCount"}}}
        });
        let errors = check(schema, json!({"n": "x"}));
        assert_eq!(codes(&errors), ["BadCount"]);
        assert_eq!(errors[0].severity, Severity::Error);
    }

    #[test]
    fn test_errors_carry_locations() {
        let document = SchemaDocument::load(r#"{"properties": {"a": {"type": "string"}}}"#).unwrap();
        let tree = crate::document::parse_json("doc.json", "{\n  \"a\": 1\n}").unwrap();
        let errors = Validator::new(&NoDocuments)
            .validate(&SchemaHandle::root(&document), &tree)
            .unwrap();
        assert_eq!((errors[0].location.line, errors[0].location.column), (2, 8));
        assert_eq!(errors[0].location.file, "doc.json");
    }
}
