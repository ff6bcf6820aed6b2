//! Request URL construction.
//!
//! Service endpoints are relative to the configured base URL. Hosts whose name
//! starts with `api.` are API gateways: they serve the code endpoints under an
//! org-scoped prefix and refuse requests without one.
//!
//! Construction failures surface as [`UrlError`] and become local 400 errors in
//! the clients; nothing here touches the network.

use url::Url;

use crate::{DraftToken, Source, UrlError};

/// Org segment used for endpoints that are not org-scoped (`/filters`) when
/// they still have to pass through a gateway.
pub const PLACEHOLDER_ORG: &str = "00000000-0000-0000-0000-000000000000";

/// Builds the absolute URL for `path` (which must start with `/`).
///
/// `org`, when given, must be a valid org segment even for hosts that do not
/// route by org, because it is also sent as a header.
pub fn service_url(base_url: &str, path: &str, org: Option<&str>) -> Result<String, UrlError> {
    let parsed = Url::parse(base_url).map_err(|e| UrlError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(UrlError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    let host = parsed.host_str().unwrap_or_default().to_string();

    if let Some(org) = org {
        if !is_valid_org(org) {
            return Err(UrlError::InvalidOrg { host });
        }
    }

    let base = base_url.trim_end_matches('/');
    if routes_to_gateway(&host) {
        let org = org.ok_or(UrlError::InvalidOrg { host })?;
        return Ok(format!("{base}/hidden/orgs/{org}/code{path}"));
    }
    Ok(format!("{base}{path}"))
}

/// Validates a path parameter such as a bundle hash or poll id.
pub fn path_segment(segment: &str) -> Result<&str, UrlError> {
    let valid = !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'));
    if valid {
        Ok(segment)
    } else {
        Err(UrlError::InvalidPathSegment {
            segment: segment.to_string(),
        })
    }
}

/// Endpoint that exchanges a draft token for an API token.
pub fn verify_callback_url(auth_host: &str) -> String {
    format!("{}/api/verify/callback", auth_host.trim_end_matches('/'))
}

/// Browser URL the user opens to confirm a login.
pub fn login_url(auth_host: &str, draft_token: &DraftToken, source: &Source) -> String {
    format!(
        "{auth_host}/login?token={draft_token}&utm_medium={source}&utm_source={source}&utm_campaign={source}&docker=false"
    )
}

fn routes_to_gateway(host: &str) -> bool {
    host.starts_with("api.")
}

fn is_valid_org(org: &str) -> bool {
    !org.is_empty()
        && org
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
