//! Organization declaration files.
//!
//! A declaration lives at `organizations/<slug>/new-orgfile.<ext>` before the
//! organization exists and at `organizations/<slug>/orgfile.<ext>` after the
//! bot has created it. The document itself is kept as an order-preserving
//! JSON value so validation sees exactly what the author wrote and
//! re-serialization keeps the author's key order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{self, CodecError};

/// Top-level folder holding all declarations.
pub const ORGANIZATIONS_FOLDER: &str = "organizations";

/// Stamp key written after creation.
pub const EXISTING_ORG_KEY: &str = "existingOrg";

const NEW_STEM: &str = "new-orgfile";
const CONFIRMED_STEM: &str = "orgfile";

/// Serialization format, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Yml,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Yml => "yml",
        }
    }

    /// Format of a path, from its final extension (case-insensitive).
    pub fn from_path(path: &str) -> Option<Self> {
        let (_, ext) = path.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "yml" => Some(FileFormat::Yml),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Lifecycle form of a declaration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Pre-creation, `new-orgfile.*`.
    New,
    /// Post-creation, `orgfile.*`.
    Confirmed,
}

/// A classified declaration path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationPath {
    /// Path as it appears in the repository.
    pub path: String,
    /// `organizations/<slug>`, in the repository's own casing.
    pub folder: String,
    pub slug: String,
    pub lifecycle: Lifecycle,
    pub format: FileFormat,
}

impl DeclarationPath {
    /// Classify a repository path. Matching is case-insensitive on both the
    /// folder prefix and the file name; anything else yields `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let lowered = path.to_ascii_lowercase();
        if !lowered.starts_with(ORGANIZATIONS_FOLDER) {
            return None;
        }

        let (lifecycle, format) = if lowered.ends_with("new-orgfile.json") {
            (Lifecycle::New, FileFormat::Json)
        } else if lowered.ends_with("new-orgfile.yml") {
            (Lifecycle::New, FileFormat::Yml)
        } else if lowered.ends_with("orgfile.json") {
            (Lifecycle::Confirmed, FileFormat::Json)
        } else if lowered.ends_with("orgfile.yml") {
            (Lifecycle::Confirmed, FileFormat::Yml)
        } else {
            return None;
        };

        let rest = path
            .get(ORGANIZATIONS_FOLDER.len()..)?
            .strip_prefix('/')?;
        let (slug, _) = rest.split_once('/')?;
        if slug.is_empty() {
            return None;
        }

        Some(Self {
            path: path.to_string(),
            folder: format!("{}/{}", &path[..ORGANIZATIONS_FOLDER.len()], slug),
            slug: slug.to_string(),
            lifecycle,
            format,
        })
    }

    /// Prefix shared by every "new" file of this declaration.
    pub fn new_prefix(&self) -> String {
        format!("{}/{}", self.folder, NEW_STEM)
    }

    /// Path of the confirmed file that replaces the "new" one.
    pub fn confirmed_path(&self) -> String {
        format!("{}/{}.{}", self.folder, CONFIRMED_STEM, self.format)
    }
}

/// Whether a changed file is a "new" declaration (push trigger filter).
pub fn is_new_declaration(path: &str) -> bool {
    DeclarationPath::parse(path).is_some_and(|p| p.lifecycle == Lifecycle::New)
}

/// Whether a changed file is any declaration (pull-request trigger filter).
pub fn is_declaration(path: &str) -> bool {
    DeclarationPath::parse(path).is_some()
}

/// A parsed declaration document plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Repository path of the file.
    pub path: String,
    /// Browse URL, used to link report sections.
    pub source_url: Option<String>,
    pub document: Value,
}

impl Declaration {
    pub fn new(path: impl Into<String>, document: Value) -> Self {
        Self {
            path: path.into(),
            source_url: None,
            document,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Parse file contents according to the path's extension.
    pub fn parse(path: &str, contents: &str) -> Result<Self, CodecError> {
        let format =
            FileFormat::from_path(path).ok_or_else(|| CodecError::UnsupportedExtension {
                path: path.to_string(),
            })?;
        let document = codec::parse(format, contents)?;
        Ok(Self::new(path, document))
    }

    /// The `name` field, when present and a string.
    pub fn name(&self) -> Option<&str> {
        self.document.get("name").and_then(Value::as_str)
    }

    /// Typed view; only meaningful once the schema check has passed.
    pub fn to_org(&self) -> Result<OrgDeclaration, CodecError> {
        serde_json::from_value(self.document.clone()).map_err(|e| CodecError::Shape {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Record the identifier of the created organization.
    pub fn stamp_existing_org(&mut self, id: &str) -> Result<(), CodecError> {
        let map = self.object_mut()?;
        let mut stamp = Map::new();
        stamp.insert("id".to_string(), Value::String(id.to_string()));
        map.insert(EXISTING_ORG_KEY.to_string(), Value::Object(stamp));
        Ok(())
    }

    fn object_mut(&mut self) -> Result<&mut Map<String, Value>, CodecError> {
        let path = self.path.clone();
        self.document.as_object_mut().ok_or(CodecError::Shape {
            path,
            reason: "declaration is not an object".to_string(),
        })
    }
}

/// Typed organization declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgDeclaration {
    pub name: String,
    pub owners: Vec<Owner>,
    pub sponsor: Sponsor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_org: Option<ExistingOrg>,
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

impl OrgDeclaration {
    /// Declared owners followed by `always_added`, first occurrence wins.
    pub fn admin_logins(&self, always_added: &[String]) -> Vec<String> {
        let mut logins: Vec<String> = Vec::new();
        let declared = self.owners.iter().map(|o| o.identity_name.as_str());
        for login in declared.chain(always_added.iter().map(String::as_str)) {
            if !logins.iter().any(|l| l == login) {
                logins.push(login.to_string());
            }
        }
        logins
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub identity_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsor {
    pub billing_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingOrg {
    pub id: String,
}
