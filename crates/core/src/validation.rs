//! Schema checks applied to a bundle before it is written.

use serde_json::Value;

use crate::bundle::Bundle;
use crate::error::ValidationError;
use crate::scope::Scope;

fn is_flat(value: &Value) -> bool {
    match value {
        Value::Object(_) => false,
        Value::Array(items) => items
            .iter()
            .all(|v| !matches!(v, Value::Array(_) | Value::Object(_))),
        _ => true,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn check_data(bundle: &Bundle, err: &mut ValidationError) {
    for key in bundle.entity_type.mandatory_keys() {
        match bundle.data.get(*key) {
            Some(v) if !is_blank(v) => {}
            _ => err.push(*key, "is required"),
        }
    }
    for (key, value) in &bundle.data {
        if !is_flat(value) {
            err.push(key.as_str(), "must be a scalar or a flat list");
        }
    }
}

/// Validate a bundle and its description sub-bundles for placement in
/// `scope`. All problems are collected into one error.
pub fn validate(bundle: &Bundle, scope: &Scope) -> Result<(), ValidationError> {
    let mut err = ValidationError::new(bundle.entity_type, bundle.id.clone());

    if let Err(placement) = scope.check_accepts(bundle.entity_type, bundle.id.as_deref()) {
        err.errors.extend(placement.errors);
    }
    check_data(bundle, &mut err);

    for (label, child) in bundle.dependents() {
        if Some(child.entity_type) != bundle.entity_type.description_type() {
            err.push(label, format!("unexpected {} sub-bundle", child.entity_type));
            continue;
        }
        let mut child_err = ValidationError::new(child.entity_type, child.id.clone());
        check_data(child, &mut child_err);
        for (field, message) in child_err.errors {
            err.push(format!("{label}/{field}"), message);
        }
    }

    err.into_result()
}
