//! Maps validation results to the markdown report shown on the check run.

use crate::verdict::{BatchValidation, CheckOutcome, DeclarationValidation, Verdict};

const SECTION_BREAK: &str = "---\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub overall_passed: bool,
    pub text: String,
}

/// Overall status of a batch: passes when ANY declaration has a verdict
/// without failed checks. Not "all": this is the status users see today.
pub fn batch_passes(results: &[DeclarationValidation]) -> bool {
    results.iter().any(|r| match &r.outcome {
        Ok(verdict) => verdict.has_no_failures(),
        Err(_) => false,
    })
}

pub fn to_report(batch: &BatchValidation) -> ValidationReport {
    match batch {
        BatchValidation::DuplicateNames { message, .. } => {
            let mut text = String::from("## Invalid\n");
            push_failed_to_run(&mut text, message);
            ValidationReport {
                overall_passed: false,
                text,
            }
        }
        BatchValidation::Declarations { results } => {
            let mut text = String::new();
            for result in results {
                push_declaration(&mut text, result);
            }
            ValidationReport {
                overall_passed: batch_passes(results),
                text,
            }
        }
    }
}

fn push_declaration(text: &mut String, result: &DeclarationValidation) {
    match &result.source_url {
        Some(url) => text.push_str(&format!("## [{}]({})\n", result.path, url)),
        None => text.push_str(&format!("## {}\n", result.path)),
    }

    match &result.outcome {
        Err(failure) => push_failed_to_run(text, &failure.message),
        Ok(verdict) => push_verdict(text, verdict),
    }
}

fn push_failed_to_run(text: &mut String, message: &str) {
    text.push_str("Check failed to run\n\n");
    text.push_str(&format!("Message: {}\n", message));
    text.push_str(SECTION_BREAK);
}

fn push_verdict(text: &mut String, verdict: &Verdict) {
    if verdict.has_no_failures() {
        text.push_str("Overall Status: ✔ (passed or skipped)\n\n");
    } else {
        text.push_str("Overall Status: ❌ (failed)\n\n");
    }

    for (kind, outcome) in verdict.iter() {
        text.push_str(&format!("### Check: `{}`\n", kind));
        text.push_str(&format!("{}\n\n", status_text(outcome)));
        if let CheckOutcome::Failed(messages) = outcome {
            text.push_str(&messages.join("\n"));
        }
        text.push('\n');
    }

    text.push_str(SECTION_BREAK);
}

fn status_text(outcome: &CheckOutcome) -> &'static str {
    match outcome {
        CheckOutcome::Passed => "✔ (passed)",
        CheckOutcome::Failed(_) => "❌ (failed)",
        CheckOutcome::NotRun => "🟨 (skipped or to-be-added)",
    }
}
