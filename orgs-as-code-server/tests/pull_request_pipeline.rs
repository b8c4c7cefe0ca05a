//! Pull-request pipeline: validation check runs.

mod helpers;

use helpers::*;
use orgs_as_code_core::MemoryGitDatabase;
use orgs_as_code_server::events::PullRequestEvent;
use orgs_as_code_server::host::{CheckConclusion, FileStatus};
use orgs_as_code_server::pipeline::{handle_pull_request, PullRequestOutcome};

const SANDBOX: &str = "organizations/acme-sandbox/new-orgfile.json";

fn event(full_name: &str, action: &str) -> PullRequestEvent {
    serde_json::from_value(pull_request_payload(full_name, action, 42, "head-sha"))
        .expect("pull request payload")
}

fn opened() -> PullRequestEvent {
    event(FULL_NAME, "opened")
}

fn harness(settings: &str, files: &[(&str, &str)]) -> Harness {
    let host = FakeHost::new().with_settings(settings);
    for (path, content) in files {
        host.put_file(path, content);
    }
    host.set_pr_files(42, files.iter().map(|(path, _)| added(path)).collect());
    Harness::new(host, MemoryGitDatabase::new(), FakeDirectory::new())
}

#[tokio::test]
async fn valid_declaration_passes() {
    let sandbox = orgfile_json("acme-sandbox", &["alice"]);
    let h = harness("requiredOrganizationPrefixes: [acme-]\n", &[(SANDBOX, &sandbox)]);

    let outcome = handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    match outcome {
        PullRequestOutcome::Validated {
            conclusion,
            report,
            fetch_failures,
        } => {
            assert_eq!(conclusion, CheckConclusion::Success);
            assert!(report.overall_passed);
            assert!(fetch_failures.is_empty());
        }
        other => panic!("expected validation, got {:?}", other),
    }

    let runs = h.host.check_runs();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.name, "orgs-as-code");
    assert_eq!(run.head_sha, "head-sha");
    assert_eq!(run.conclusion, CheckConclusion::Success);
    assert_eq!(run.output.title, "success");
    assert_eq!(run.output.summary, "Scan results are as follows:");
    let text = run.output.text.as_deref().expect("report text");
    assert!(text.starts_with(&format!(
        "## [{}](https://ghe.example.com/{}/blob/head/{})",
        SANDBOX, FULL_NAME, SANDBOX
    )));
    assert!(text.contains("Overall Status: ✔ (passed or skipped)"));
}

#[tokio::test]
async fn wrong_prefix_fails_the_check() {
    let sandbox = orgfile_json("acme-sandbox", &["alice"]);
    let h = harness("requiredOrganizationPrefixes: [corp-]\n", &[(SANDBOX, &sandbox)]);

    handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    let run = &h.host.check_runs()[0];
    assert_eq!(run.conclusion, CheckConclusion::Failure);
    assert_eq!(run.output.title, "failure");
    let text = run.output.text.as_deref().unwrap_or_default();
    assert!(text.contains("`corp-acme-sandbox`"));
    assert!(text.contains("### Check: `UniqueName`\n✔ (passed)"));
}

#[tokio::test]
async fn taken_name_fails_the_check() {
    let sandbox = orgfile_json("acme-sandbox", &["alice"]);
    let h = harness("", &[(SANDBOX, &sandbox)]);
    h.directory.take("acme-sandbox");

    handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    let run = &h.host.check_runs()[0];
    assert_eq!(run.conclusion, CheckConclusion::Failure);
    assert!(run
        .output
        .text
        .as_deref()
        .unwrap_or_default()
        .contains("Organization Name `acme-sandbox` already in use."));
}

#[tokio::test]
async fn duplicate_names_fail_as_a_batch() {
    let dup = orgfile_json("dup-org", &["alice"]);
    let h = harness(
        "",
        &[
            ("organizations/dup-a/new-orgfile.json", &dup),
            ("organizations/dup-b/new-orgfile.json", &dup),
        ],
    );

    handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    let run = &h.host.check_runs()[0];
    assert_eq!(run.conclusion, CheckConclusion::Failure);
    let text = run.output.text.as_deref().unwrap_or_default();
    assert!(text.starts_with("## Invalid\n"));
    assert!(text.contains("`dup-org`, `dup-org`"));
}

#[tokio::test]
async fn untouched_declarations_skip_the_check() {
    let h = harness("", &[("README.md", "# docs")]);
    h.host.set_pr_files(
        42,
        vec![
            added("README.md"),
            changed("organizations/old/orgfile.json", FileStatus::Removed),
        ],
    );

    let outcome = handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    assert!(matches!(outcome, PullRequestOutcome::NoDeclarations));
    let run = &h.host.check_runs()[0];
    assert_eq!(run.conclusion, CheckConclusion::Skipped);
    assert_eq!(run.output.title, "No orgfiles found!");
    assert!(run.output.text.is_some());
}

#[tokio::test]
async fn missing_settings_skip_the_check() {
    let host = FakeHost::new();
    host.set_pr_files(42, vec![added(SANDBOX)]);
    let h = Harness::new(host, MemoryGitDatabase::new(), FakeDirectory::new());

    let outcome = handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    assert!(matches!(outcome, PullRequestOutcome::ConfigurationUnavailable));
    let run = &h.host.check_runs()[0];
    assert_eq!(run.conclusion, CheckConclusion::Skipped);
    assert_eq!(run.output.title, "Unable to load configuration");
}

#[tokio::test]
async fn unfetchable_files_are_reported_separately() {
    let sandbox = orgfile_json("acme-sandbox", &["alice"]);
    let h = harness("", &[(SANDBOX, &sandbox)]);
    let broken = "organizations/broken/orgfile.yml";
    h.host.put_file(broken, "name: [unterminated");
    let missing = "organizations/missing/orgfile.json";
    h.host
        .set_pr_files(42, vec![added(SANDBOX), added(broken), added(missing)]);

    let outcome = handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    match outcome {
        PullRequestOutcome::Validated { fetch_failures, .. } => {
            assert_eq!(fetch_failures, vec![broken.to_string(), missing.to_string()]);
        }
        other => panic!("expected validation, got {:?}", other),
    }
    let runs = h.host.check_runs();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].output.title, "Failed to fetch org file(s)");
    assert_eq!(runs[0].conclusion, CheckConclusion::Failure);
    assert!(runs[0].output.summary.contains(missing));
    // The fetchable file is still validated.
    assert_eq!(runs[1].conclusion, CheckConclusion::Success);
}

#[tokio::test]
async fn other_repositories_are_ignored() {
    let sandbox = orgfile_json("acme-sandbox", &["alice"]);
    let h = harness("", &[(SANDBOX, &sandbox)]);

    let outcome = handle_pull_request(&h.ctx, &event("acme/unrelated", "opened"))
        .await
        .expect("pipeline runs");

    assert!(matches!(outcome, PullRequestOutcome::Ignored));
    assert!(h.host.check_runs().is_empty());
}

#[tokio::test]
async fn closed_pull_requests_are_ignored() {
    let sandbox = orgfile_json("acme-sandbox", &["alice"]);
    let h = harness("", &[(SANDBOX, &sandbox)]);

    let outcome = handle_pull_request(&h.ctx, &event(FULL_NAME, "closed"))
        .await
        .expect("pipeline runs");

    assert!(matches!(outcome, PullRequestOutcome::Ignored));
    assert!(h.host.check_runs().is_empty());
}

#[tokio::test]
async fn bulk_pull_request_report_fits_the_check_run() {
    let host = FakeHost::new().with_settings("");
    let paths: Vec<String> = (0..400)
        .map(|i| format!("organizations/acme-bulk-{:03}/new-orgfile.json", i))
        .collect();
    for (i, path) in paths.iter().enumerate() {
        host.put_file(path, &orgfile_json(&format!("acme-bulk-{:03}", i), &["alice"]));
    }
    host.set_pr_files(42, paths.iter().map(|p| added(p)).collect());
    let h = Harness::new(host, MemoryGitDatabase::new(), FakeDirectory::new());

    let outcome = handle_pull_request(&h.ctx, &opened()).await.expect("pipeline runs");

    match outcome {
        PullRequestOutcome::Validated { report, .. } => {
            assert!(report.text.chars().count() > 65_535);
        }
        other => panic!("expected validation, got {:?}", other),
    }
    let runs = h.host.check_runs();
    assert_eq!(runs.len(), 1);
    let text = runs[0].output.text.as_deref().expect("report text");
    assert!(text.chars().count() <= 65_535);
    assert!(text.ends_with("_Report truncated: too many org files to show in full._\n"));
    assert_eq!(runs[0].conclusion, CheckConclusion::Success);
}
