//! orgs-as-code webhook server.
//!
//! Receives deliveries from the hosting platform and runs one of two
//! pipelines against the governance repository:
//!
//! - **push** to the main branch: provisions organizations for merged
//!   `new-orgfile.*` declarations and confirms them in place;
//! - **pull request** opened/synchronized: validates touched declarations and
//!   reports a check run.

pub mod config;
pub mod error;
pub mod events;
pub mod github;
pub mod host;
pub mod pipeline;
pub mod router;
pub mod signature;
