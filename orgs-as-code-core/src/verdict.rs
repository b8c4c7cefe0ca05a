//! Structured validation results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::response::Response;

/// Kinds of check run against a declaration, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckKind {
    ValidSchema,
    AppropriatePrefix,
    UniqueName,
    ValidCustomCheck,
    ValidSponsorCodeType,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::ValidSchema,
        CheckKind::AppropriatePrefix,
        CheckKind::UniqueName,
        CheckKind::ValidCustomCheck,
        CheckKind::ValidSponsorCodeType,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CheckKind::ValidSchema => "ValidSchema",
            CheckKind::AppropriatePrefix => "AppropriatePrefix",
            CheckKind::UniqueName => "UniqueName",
            CheckKind::ValidCustomCheck => "ValidCustomCheck",
            CheckKind::ValidSponsorCodeType => "ValidSponsorCodeType",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state result of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "messages", rename_all = "snake_case")]
pub enum CheckOutcome {
    Passed,
    Failed(Vec<String>),
    NotRun,
}

impl CheckOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        CheckOutcome::Failed(vec![message.into()])
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CheckOutcome::Failed(_))
    }
}

/// Outcome of every check kind for one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    checks: BTreeMap<CheckKind, CheckOutcome>,
}

impl Default for Verdict {
    fn default() -> Self {
        Self {
            checks: CheckKind::ALL
                .iter()
                .map(|kind| (*kind, CheckOutcome::NotRun))
                .collect(),
        }
    }
}

impl Verdict {
    /// Every check not-run.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: CheckKind, outcome: CheckOutcome) {
        self.checks.insert(kind, outcome);
    }

    pub fn get(&self, kind: CheckKind) -> &CheckOutcome {
        static NOT_RUN: CheckOutcome = CheckOutcome::NotRun;
        self.checks.get(&kind).unwrap_or(&NOT_RUN)
    }

    /// Checks in report order.
    pub fn iter(&self) -> impl Iterator<Item = (CheckKind, &CheckOutcome)> {
        self.checks.iter().map(|(kind, outcome)| (*kind, outcome))
    }

    /// No check failed. Not-run checks count as passing.
    pub fn has_no_failures(&self) -> bool {
        !self.checks.values().any(CheckOutcome::is_failed)
    }
}

/// Result for one declaration: a verdict, or a failure meaning validation
/// itself could not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationValidation {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub outcome: Response<Verdict>,
}

/// Result of validating one submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchValidation {
    /// One entry per declaration, in submission order.
    Declarations { results: Vec<DeclarationValidation> },
    /// Two or more declarations share a name; nothing was validated.
    DuplicateNames { names: Vec<String>, message: String },
}

impl BatchValidation {
    pub fn results(&self) -> &[DeclarationValidation] {
        match self {
            BatchValidation::Declarations { results } => results,
            BatchValidation::DuplicateNames { .. } => &[],
        }
    }
}
