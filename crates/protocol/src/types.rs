//! Wire value types exchanged with the analysis service.
//!
//! Request option types are plain data; their wire form is assembled by the
//! builders in [`crate::payloads`]. Response types deserialize straight from
//! the executor's JSON body.

use std::collections::BTreeMap;

use serde::{de::Error as _, Deserialize, Serialize};
use serde_json::Value;

use crate::{BundleHash, DraftToken};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// One login attempt: the draft token and the URL the user must open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "draftToken")]
    pub draft_token: DraftToken,
    #[serde(rename = "loginURL")]
    pub login_url: String,
}

/// Body returned by the verify-callback endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiTokenResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub api: Option<String>,
}

// ---------------------------------------------------------------------------
// Bundles
// ---------------------------------------------------------------------------

/// A server-side bundle and the files it still needs content for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBundle {
    pub bundle_hash: BundleHash,
    #[serde(default)]
    pub missing_files: Vec<String>,
}

impl RemoteBundle {
    /// Returns `true` once the server has content for every file.
    pub fn is_complete(&self) -> bool {
        self.missing_files.is_empty()
    }
}

/// Descriptor of one file in a bundle.
///
/// Bundles are first created from hashes alone; content is only sent for the
/// paths the server reports missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BundleFile {
    Hash(String),
    Content { hash: String, content: String },
}

impl BundleFile {
    /// The content hash, whichever form the descriptor takes.
    pub fn hash(&self) -> &str {
        match self {
            BundleFile::Hash(hash) => hash,
            BundleFile::Content { hash, .. } => hash,
        }
    }
}

/// Relative path → descriptor. Ordered so encoded payloads are deterministic.
pub type BundleFiles = BTreeMap<String, BundleFile>;

/// File names and extensions the service can analyse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedFiles {
    #[serde(default)]
    pub config_files: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl SupportedFiles {
    /// Returns `true` if a file with this name should be bundled.
    pub fn accepts(&self, file_name: &str) -> bool {
        self.config_files.iter().any(|c| c == file_name)
            || self
                .extensions
                .iter()
                .any(|ext| file_name.len() > ext.len() && file_name.ends_with(ext.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Analysis and report polling
// ---------------------------------------------------------------------------

/// Job status reported by analysis and report polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStatus {
    Waiting,
    Fetching,
    Analyzing,
    Done,
    Failed,
    Complete,
}

/// Response of every poll target (`getAnalysis`, `getReport`, `getScmReport`).
#[derive(Debug, Clone, PartialEq)]
pub enum PollResponse {
    /// Still running; `status` is never `Failed` or `Complete`.
    InProgress { status: AnalysisStatus, progress: f64 },
    /// The job failed server-side.
    Failed,
    /// The final payload, exactly as the server sent it.
    Complete(Value),
}

/// Response of `getAnalysis`.
pub type AnalysisResponse = PollResponse;

/// Response of `getReport` and `getScmReport`.
pub type ReportResponse = PollResponse;

impl PollResponse {
    /// Interprets a poll body by its `status` field.
    pub fn from_body(body: Value) -> Result<Self, serde_json::Error> {
        let status = body
            .get("status")
            .cloned()
            .ok_or_else(|| serde_json::Error::custom("poll response has no status"))?;
        let status: AnalysisStatus = serde_json::from_value(status)?;

        Ok(match status {
            AnalysisStatus::Failed => PollResponse::Failed,
            AnalysisStatus::Complete => PollResponse::Complete(body),
            in_progress => {
                let progress = body.get("progress").and_then(Value::as_f64).unwrap_or(0.0);
                PollResponse::InProgress {
                    status: in_progress,
                    progress: progress.clamp(0.0, 1.0),
                }
            }
        })
    }

    pub fn status(&self) -> AnalysisStatus {
        match self {
            PollResponse::InProgress { status, .. } => *status,
            PollResponse::Failed => AnalysisStatus::Failed,
            PollResponse::Complete(_) => AnalysisStatus::Complete,
        }
    }

    /// `true` for `Failed` and `Complete`; `Done` still precedes the payload.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollResponse::Failed | PollResponse::Complete(_))
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Options shared by analysis and report requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Minimum severity to report (1 = low .. 3 = high).
    pub severity: Option<u8>,
    pub prioritized: Option<bool>,
    pub legacy: Option<bool>,
    /// Restrict results to these paths; empty means the whole bundle.
    pub limit_to_files: Vec<String>,
    pub shard: Option<String>,
}

/// Who triggered the analysis and for which project; forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub flow: String,
    pub initiator: Initiator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_public_id: Option<String>,
    pub project: ProjectContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Initiator {
    Ide,
    Cli,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    pub name: String,
    pub public_id: String,
    #[serde(rename = "type")]
    pub project_type: String,
}

/// Identity of a file-based report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub project_name: String,
    pub target_name: Option<String>,
    pub target_ref: Option<String>,
    pub remote_repo_url: Option<String>,
}

/// Identity of an SCM-based report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScmReportOptions {
    pub project_id: String,
    pub commit_id: String,
}

/// Body returned by `initReport`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReportResponse {
    pub report_id: String,
}

/// Body returned by `initScmReport`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitScmReportResponse {
    pub test_id: String,
}
