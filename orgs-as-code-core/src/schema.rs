//! Declaration schema validation.
//!
//! The schema is embedded at build time and compiled once by
//! [`SchemaValidator::new`]; the compiled validator is shared (`Arc`) for the
//! lifetime of the process.

use jsonschema::{Draft, Validator};
use serde_json::Value;

/// Published declaration schema (JSON Schema draft 2020-12).
pub const ORGFILE_SCHEMA: &str = include_str!("../schemas/new-orgfile-schema.json");

/// Public location of the schema, injected into rewritten declaration files.
pub const ORGFILE_SCHEMA_URL: &str =
    "https://raw.githubusercontent.com/Optum/orgs-as-code/main/source/src/schemas/new-orgfile-schema.json";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("embedded schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("embedded schema failed to compile: {0}")]
    Compile(String),
}

/// Outcome of validating one declaration object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaValidation {
    pub valid: bool,
    /// Engine error descriptions in the engine's natural order. Empty when valid.
    pub messages: Vec<String>,
}

/// Compiled declaration schema.
pub struct SchemaValidator {
    validator: Validator,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator").finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile the embedded declaration schema.
    pub fn new() -> Result<Self, SchemaError> {
        let schema: Value = serde_json::from_str(ORGFILE_SCHEMA)?;
        Self::from_schema(&schema)
    }

    /// Compile an arbitrary draft 2020-12 schema with format assertions enabled.
    pub fn from_schema(schema: &Value) -> Result<Self, SchemaError> {
        let validator = jsonschema::options()
            .with_draft(Draft::Draft202012)
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    pub fn validate(&self, declaration: &Value) -> SchemaValidation {
        let messages: Vec<String> = self
            .validator
            .iter_errors(declaration)
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();

        SchemaValidation {
            valid: messages.is_empty(),
            messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::new().expect("embedded schema compiles")
    }

    #[test]
    fn minimal_declaration_is_valid() {
        let result = validator().validate(&json!({
            "name": "acme-sandbox",
            "owners": [{ "identityName": "alice" }],
            "sponsor": { "billingEmail": "x@y.com" }
        }));
        assert!(result.valid);
        assert!(result.messages.is_empty());
    }

    #[test]
    fn confirmed_declaration_with_stamp_is_valid() {
        let result = validator().validate(&json!({
            "$schema": ORGFILE_SCHEMA_URL,
            "name": "acme-sandbox",
            "owners": [{ "identityName": "alice" }, { "identityName": "alice" }],
            "sponsor": { "billingEmail": "x@y.com" },
            "existingOrg": { "id": "O_kgDOABCDEF" }
        }));
        assert!(result.valid, "{:?}", result.messages);
    }

    #[test]
    fn missing_sponsor_and_bad_owner_are_reported() {
        let result = validator().validate(&json!({
            "name": "acme-sandbox",
            "owners": [{ "login": "alice" }]
        }));
        assert!(!result.valid);
        assert!(result.messages.len() >= 2, "{:?}", result.messages);
        assert!(result.messages.iter().any(|m| m.contains("sponsor")));
    }

    #[test]
    fn invalid_billing_email_fails_format() {
        let result = validator().validate(&json!({
            "name": "acme-sandbox",
            "owners": [{ "identityName": "alice" }],
            "sponsor": { "billingEmail": "not-an-email" }
        }));
        assert!(!result.valid);
    }

    #[test]
    fn non_object_input_is_invalid_not_fatal() {
        let result = validator().validate(&json!(["name", "owners"]));
        assert!(!result.valid);
        assert!(!result.messages.is_empty());
    }
}
