//! Connection context shared by every authenticated call.

use crate::{Headers, OrgName, Source};

/// Request id header name.
pub const REQUEST_ID_HEADER: &str = "khulnasoft-request-id";

/// Org name header name.
pub const ORG_NAME_HEADER: &str = "khulnasoft-org-name";

/// Endpoint, credentials and client identity for one session.
///
/// Built once with the `with_*` methods, then only read. It is `Send + Sync`
/// and is passed by reference to any number of concurrent calls.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    base_url: String,
    session_token: String,
    source: Source,
    request_id: Option<String>,
    org: Option<OrgName>,
    extra_headers: Vec<(String, String)>,
}

impl ConnectionContext {
    /// Creates a context with the mandatory fields.
    pub fn new(base_url: impl Into<String>, session_token: impl Into<String>, source: Source) -> Self {
        Self {
            base_url: base_url.into(),
            session_token: session_token.into(),
            source,
            request_id: None,
            org: None,
            extra_headers: Vec::new(),
        }
    }

    /// Sets the request id forwarded in [`REQUEST_ID_HEADER`].
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Scopes requests to `org`.
    pub fn with_org(mut self, org: OrgName) -> Self {
        self.org = Some(org);
        self
    }

    /// Adds a caller-supplied header. Extra headers are applied after the
    /// common ones and may override them.
    pub fn with_extra_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn org(&self) -> Option<&OrgName> {
        self.org.as_ref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Headers sent with every authenticated call.
    ///
    /// Order of application: `Authorization`, `source`, request id, org name,
    /// then extra headers.
    pub fn common_headers(&self) -> Headers {
        let mut headers = Headers::new();
        self.apply_common_headers(&mut headers);
        headers
    }

    /// Applies [`Self::common_headers`] on top of `headers`.
    ///
    /// Used when a call has its own content headers that the common set must
    /// win over.
    pub fn apply_common_headers(&self, headers: &mut Headers) {
        headers.insert("Authorization", self.session_token.clone());
        headers.insert("source", self.source.as_str());
        if let Some(request_id) = &self.request_id {
            headers.insert(REQUEST_ID_HEADER, request_id.clone());
        }
        if let Some(org) = &self.org {
            headers.insert(ORG_NAME_HEADER, org.as_str());
        }
        for (name, value) in &self.extra_headers {
            headers.insert(name, value.clone());
        }
    }
}

// Keeps the session token out of logs.
impl std::fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("base_url", &self.base_url)
            .field("session_token", &"<redacted>")
            .field("source", &self.source)
            .field("request_id", &self.request_id)
            .field("org", &self.org)
            .field("extra_headers", &self.extra_headers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ConnectionContext {
        ConnectionContext::new("https://deeproxy.test", "token-1", Source::new("cli").unwrap())
    }

    #[test]
    fn minimal_context_sends_auth_and_source() {
        let headers = context().common_headers();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("Authorization"), Some("token-1"));
        assert_eq!(headers.get("source"), Some("cli"));
    }

    #[test]
    fn optional_headers_are_added_when_present() {
        let headers = context()
            .with_request_id("req-9")
            .with_org(OrgName::new("acme").unwrap())
            .common_headers();
        assert_eq!(headers.get(REQUEST_ID_HEADER), Some("req-9"));
        assert_eq!(headers.get(ORG_NAME_HEADER), Some("acme"));
    }

    #[test]
    fn extra_headers_are_applied_last() {
        let headers = context()
            .with_extra_header("Authorization", "override")
            .with_extra_header("x-trace", "1")
            .common_headers();
        assert_eq!(headers.get("authorization"), Some("override"));
        assert_eq!(headers.get("x-trace"), Some("1"));
    }

    #[test]
    fn debug_output_redacts_the_token() {
        let rendered = format!("{:?}", context());
        assert!(!rendered.contains("token-1"));
    }
}
