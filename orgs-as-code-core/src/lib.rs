//! orgs-as-code core
//!
//! Validation and provisioning pipeline for an organization-as-code
//! repository. Declarations under `organizations/<slug>/` are checked against
//! the published schema, the naming policy and the directory service on pull
//! requests, and turned into real organizations on merge.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  declaration + codec   (paths, JSON/YAML, stamping)        │
//! └────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌───────────────────────────────┐  ┌──────────────────────────┐
//! │  ConfigurationValidator       │  │  directory::OrgDirectory │
//! │  schema → prefix → uniqueness │─▶│  (GraphQL / cloud)       │
//! └───────────────────────────────┘  └──────────────────────────┘
//!                 │
//!                 ▼
//! ┌───────────────────────────────┐  ┌──────────────────────────┐
//! │  report::to_report            │  │  rewrite (GitDatabase)   │
//! │  verdicts → markdown          │  │  new → confirmed file    │
//! └───────────────────────────────┘  └──────────────────────────┘
//! ```
//!
//! The crate does no I/O of its own except through the [`git::GitDatabase`]
//! and [`directory::OrgDirectory`] ports.

pub mod codec;
pub mod declaration;
pub mod directory;
pub mod git;
pub mod memory;
pub mod report;
pub mod response;
pub mod rewrite;
pub mod schema;
pub mod settings;
pub mod validator;
pub mod verdict;

pub use declaration::{Declaration, DeclarationPath, FileFormat, Lifecycle, OrgDeclaration};
pub use directory::{build_directory, DirectoryKind, NameAvailability, NewOrganization, OrgDirectory};
pub use git::{GitDatabase, HostError, RepoId};
pub use memory::MemoryGitDatabase;
pub use report::{to_report, ValidationReport};
pub use response::{Failure, Response};
pub use rewrite::{replace_new_declaration, RewriteError, RewriteOutcome, RewriteRequest};
pub use schema::SchemaValidator;
pub use settings::OrgsAsCodeSettings;
pub use validator::{ConfigurationValidator, CustomCheck, PrefixSource, StaticPrefixes};
pub use verdict::{BatchValidation, CheckKind, CheckOutcome, DeclarationValidation, Verdict};
