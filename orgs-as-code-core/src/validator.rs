//! Configuration validator.
//!
//! Runs the per-declaration check pipeline over a batch:
//!
//! ```text
//! batch:  duplicate names? ── yes ──▶ single batch-level failure
//!            │ no
//!            ▼
//! each:   schema ── fail ──▶ verdict (everything else not-run)
//!            │ pass
//!            ▼
//!         prefix policy ──▶ uniqueness ──▶ custom hook (optional)
//! ```
//!
//! Declarations are validated concurrently and collected back in input order.
//! A prefix-list fetch failure or a directory query failure ends validation of
//! that declaration with a declaration-level failure rather than a verdict.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;

use crate::declaration::Declaration;
use crate::directory::OrgDirectory;
use crate::response::{Failure, Response};
use crate::schema::SchemaValidator;
use crate::verdict::{BatchValidation, CheckKind, CheckOutcome, DeclarationValidation, Verdict};

const SCHEMA_GATE_MESSAGE: &str = "All other checks will be skipped as orgfile is not valid.";

/// Source of the accepted organization-name prefixes.
#[async_trait]
pub trait PrefixSource: Send + Sync {
    async fn accepted_prefixes(&self) -> Response<Vec<String>>;
}

/// Fixed prefix list, typically from the repository settings.
#[derive(Debug, Clone, Default)]
pub struct StaticPrefixes(pub Vec<String>);

#[async_trait]
impl PrefixSource for StaticPrefixes {
    async fn accepted_prefixes(&self) -> Response<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Policy hook filling the `ValidCustomCheck` slot.
#[async_trait]
pub trait CustomCheck: Send + Sync {
    async fn check(&self, declaration: &Declaration) -> CheckOutcome;
}

pub struct ConfigurationValidator {
    schema: Arc<SchemaValidator>,
    directory: Arc<dyn OrgDirectory>,
    prefixes: Arc<dyn PrefixSource>,
    custom_check: Option<Arc<dyn CustomCheck>>,
}

impl ConfigurationValidator {
    pub fn new(
        schema: Arc<SchemaValidator>,
        directory: Arc<dyn OrgDirectory>,
        prefixes: Arc<dyn PrefixSource>,
    ) -> Self {
        Self {
            schema,
            directory,
            prefixes,
            custom_check: None,
        }
    }

    pub fn with_custom_check(mut self, check: Arc<dyn CustomCheck>) -> Self {
        self.custom_check = Some(check);
        self
    }

    /// Validate a batch of declarations.
    pub async fn validate_configurations(&self, declarations: &[Declaration]) -> BatchValidation {
        tracing::debug!(count = declarations.len(), "validating declaration batch");

        if has_duplicate_names(declarations) {
            let names: Vec<String> = declarations.iter().map(display_name).collect();
            let formatted = names
                .iter()
                .map(|n| format!("`{}`", n))
                .collect::<Vec<_>>()
                .join(", ");
            tracing::info!(names = %formatted, "batch contains duplicate organization names");
            return BatchValidation::DuplicateNames {
                message: format!("Org files in list contain duplicate names: {}", formatted),
                names,
            };
        }

        let results = join_all(declarations.iter().map(|d| self.validate_declaration(d))).await;
        BatchValidation::Declarations { results }
    }

    async fn validate_declaration(&self, declaration: &Declaration) -> DeclarationValidation {
        let outcome = self.run_checks(declaration).await;
        if let Err(failure) = &outcome {
            tracing::warn!(
                path = %declaration.path,
                reason = %failure,
                detail = failure.detail.as_deref().unwrap_or(""),
                "declaration validation could not complete"
            );
        }
        DeclarationValidation {
            path: declaration.path.clone(),
            source_url: declaration.source_url.clone(),
            outcome,
        }
    }

    async fn run_checks(&self, declaration: &Declaration) -> Response<Verdict> {
        let mut verdict = Verdict::new();

        let schema = self.schema.validate(&declaration.document);
        if !schema.valid {
            let mut messages = schema.messages;
            messages.push(SCHEMA_GATE_MESSAGE.to_string());
            verdict.set(CheckKind::ValidSchema, CheckOutcome::Failed(messages));
            tracing::debug!(path = %declaration.path, "schema check failed");
            return Ok(verdict);
        }
        verdict.set(CheckKind::ValidSchema, CheckOutcome::Passed);

        // The schema guarantees a string name from here on.
        let name = declaration.name().unwrap_or_default();

        let prefixes = self.prefixes.accepted_prefixes().await.map_err(|e| {
            Failure::new("Unable to fetch acceptable prefix list.").with_detail(e)
        })?;
        tracing::debug!(prefixes = ?prefixes, "accepted prefixes");
        verdict.set(CheckKind::AppropriatePrefix, prefix_check(name, &prefixes));

        let availability = self.directory.name_exists(name).await.map_err(|e| {
            let detail = e.detail.clone().unwrap_or_else(|| e.message.clone());
            Failure::new("Unable to query existing organization names.").with_detail(detail)
        })?;
        tracing::debug!(name = %name, taken = availability.taken, "uniqueness check");
        verdict.set(
            CheckKind::UniqueName,
            if availability.taken {
                CheckOutcome::failed(format!("Organization Name `{}` already in use.", name))
            } else {
                CheckOutcome::Passed
            },
        );

        if let Some(custom) = &self.custom_check {
            verdict.set(CheckKind::ValidCustomCheck, custom.check(declaration).await);
        }

        Ok(verdict)
    }
}

/// Prefix policy: pass when the list is empty or `name` starts with any entry.
pub fn prefix_check(name: &str, prefixes: &[String]) -> CheckOutcome {
    let Some(first) = prefixes.first() else {
        return CheckOutcome::Passed;
    };
    if prefixes.iter().any(|p| name.starts_with(p.as_str())) {
        return CheckOutcome::Passed;
    }

    let listing = prefixes
        .iter()
        .map(|p| format!("* {}", p))
        .collect::<Vec<_>>()
        .join("\n");
    CheckOutcome::Failed(vec![
        format!(
            "`name` must be prefixed with an acceptable value (e.g. `{}{}`)",
            first, name
        ),
        format!("Appropriate Prefixes:\n{}", listing),
    ])
}

fn display_name(declaration: &Declaration) -> String {
    declaration.name().unwrap_or("<unnamed>").to_string()
}

/// Declarations without a string name count as sharing the same (absent) name.
fn has_duplicate_names(declarations: &[Declaration]) -> bool {
    let mut seen = HashSet::new();
    declarations.iter().any(|d| !seen.insert(d.name()))
}
