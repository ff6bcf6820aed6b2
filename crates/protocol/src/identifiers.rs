//! Newtype identifiers exchanged with the analysis service.
//!
//! Every server-assigned or client-generated handle is a distinct newtype so a
//! [`BundleHash`] can never be passed where a [`ReportId`] is expected, even
//! though both are strings on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Server-assigned identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Content-derived identifier of a remote bundle, assigned by the server.
    ///
    /// Every `extendBundle` call yields a new hash; the previous one is only a
    /// parent reference afterwards.
    BundleHash
}

string_id! {
    /// Identifies a file-based report job returned by `initReport`.
    ReportId
}

string_id! {
    /// Identifies an SCM-based test job returned by `initScmReport`.
    TestId
}

string_id! {
    /// Handle polled through `getReport` / `getScmReport`.
    ///
    /// Either a [`ReportId`] or a [`TestId`] converted for polling.
    PollId
}

impl From<ReportId> for PollId {
    fn from(id: ReportId) -> Self {
        Self(id.0)
    }
}

impl From<TestId> for PollId {
    fn from(id: TestId) -> Self {
        Self(id.0)
    }
}

// ---------------------------------------------------------------------------
// Client-supplied identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// Organisation name or id used for gateway routing and the org header.
    OrgName
}

string_id! {
    /// Client identity reported in the `source` header and login UTM parameters
    /// (e.g. `"cli"`, `"vscode"`).
    Source
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Correlation key for one login attempt.
///
/// Generated locally by `startSession` and exchanged for an API token once the
/// user confirms the login in the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftToken(Uuid);

impl DraftToken {
    /// Generates a new random (v4) draft token.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a [`DraftToken`] from an existing UUID (e.g. restored from disk).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for DraftToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(BundleHash::new("").is_none());
        assert_eq!(BundleHash::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn poll_ids_come_from_report_and_test_ids() {
        let report = ReportId::new("r-1").unwrap();
        let test = TestId::new("t-1").unwrap();
        assert_eq!(PollId::from(report).as_str(), "r-1");
        assert_eq!(PollId::from(test).as_str(), "t-1");
    }

    #[test]
    fn draft_tokens_serialize_as_plain_strings() {
        let token = DraftToken::new_random();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", token));
        assert_ne!(token, DraftToken::new_random());
    }
}
