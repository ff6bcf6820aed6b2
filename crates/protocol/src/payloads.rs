//! Request body builders.
//!
//! Each builder takes the full option set and writes the wire payload one
//! field at a time. Optional fields are omitted, never sent as `null`.

use serde_json::{json, Map, Value};

use crate::{AnalysisContext, AnalysisOptions, BundleFiles, BundleHash, DraftToken, ReportOptions, ScmReportOptions};

/// `{token}` for the verify-callback endpoint.
pub fn check_session_body(draft_token: &DraftToken) -> Value {
    json!({ "token": draft_token.to_string() })
}

/// Bundle creation payload: the file map itself.
pub fn create_bundle_body(files: &BundleFiles) -> Result<Value, serde_json::Error> {
    serde_json::to_value(files)
}

/// Bundle extension payload: `{files, removedFiles}`. `removedFiles` is
/// omitted when there is nothing to remove.
///
/// `removed_files` is expected to be disjoint from the keys of `files`; the
/// server's behaviour for overlapping paths is unspecified and not checked
/// here.
pub fn extend_bundle_body(files: &BundleFiles, removed_files: &[String]) -> Result<Value, serde_json::Error> {
    let mut body = Map::new();
    body.insert("files".into(), serde_json::to_value(files)?);
    if !removed_files.is_empty() {
        body.insert("removedFiles".into(), json!(removed_files));
    }
    Ok(Value::Object(body))
}

/// The `key` object identifying which bundle (and files) to analyse.
pub fn analysis_key(bundle_hash: &BundleHash, options: &AnalysisOptions) -> Value {
    let mut key = Map::new();
    key.insert("type".into(), json!("file"));
    key.insert("hash".into(), json!(bundle_hash.as_str()));
    key.insert("limitToFiles".into(), json!(options.limit_to_files));
    if let Some(shard) = options.shard.as_deref().filter(|s| !s.is_empty()) {
        key.insert("shard".into(), json!(shard));
    }
    Value::Object(key)
}

/// `POST /analysis` body.
pub fn analysis_body(
    bundle_hash: &BundleHash,
    options: &AnalysisOptions,
    analysis_context: Option<&AnalysisContext>,
) -> Value {
    let mut body = Map::new();
    body.insert("key".into(), analysis_key(bundle_hash, options));
    insert_pass_through(&mut body, options, analysis_context, true);
    Value::Object(body)
}

/// `POST /report` body.
pub fn report_body(
    bundle_hash: &BundleHash,
    report: &ReportOptions,
    options: &AnalysisOptions,
    analysis_context: Option<&AnalysisContext>,
) -> Value {
    let mut workflow = Map::new();
    workflow.insert("projectName".into(), json!(report.project_name));
    if let Some(target_name) = &report.target_name {
        workflow.insert("targetName".into(), json!(target_name));
    }
    if let Some(target_ref) = &report.target_ref {
        workflow.insert("targetRef".into(), json!(target_ref));
    }
    if let Some(remote_repo_url) = &report.remote_repo_url {
        workflow.insert("remoteRepoUrl".into(), json!(remote_repo_url));
    }

    let mut body = Map::new();
    body.insert("workflowData".into(), Value::Object(workflow));
    body.insert("key".into(), analysis_key(bundle_hash, options));
    insert_pass_through(&mut body, options, analysis_context, true);
    Value::Object(body)
}

/// `POST /test` body. SCM reports do not forward `legacy`.
pub fn scm_report_body(
    scm: &ScmReportOptions,
    options: &AnalysisOptions,
    analysis_context: Option<&AnalysisContext>,
) -> Value {
    let mut body = Map::new();
    body.insert(
        "workflowData".into(),
        json!({ "projectId": scm.project_id, "commitHash": scm.commit_id }),
    );
    insert_pass_through(&mut body, options, analysis_context, false);
    Value::Object(body)
}

fn insert_pass_through(
    body: &mut Map<String, Value>,
    options: &AnalysisOptions,
    analysis_context: Option<&AnalysisContext>,
    with_legacy: bool,
) {
    if let Some(severity) = options.severity {
        body.insert("severity".into(), json!(severity));
    }
    if let Some(prioritized) = options.prioritized {
        body.insert("prioritized".into(), json!(prioritized));
    }
    if with_legacy {
        if let Some(legacy) = options.legacy {
            body.insert("legacy".into(), json!(legacy));
        }
    }
    if let Some(context) = analysis_context {
        body.insert("analysisContext".into(), json!(context));
    }
}
