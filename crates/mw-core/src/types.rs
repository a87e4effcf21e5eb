//! Core type definitions with validation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A time window whose end does not come after its start.
    #[error("window end ({end}) must be after window start ({start})")]
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Generates a validated string ID newtype with common trait implementations.
macro_rules! define_string_id {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID after validation.
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                Ok(Self(id))
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_string_id!(
    /// A validated participant label.
    ///
    /// Labels must be non-empty strings. They are the display identity of a
    /// participant (typically an email address) and the key under which
    /// conflicts are attributed.
    ParticipantLabel, "participant label"
);

define_string_id!(
    /// A validated calendar identifier as issued by the remote event source.
    CalendarId, "calendar ID"
);

/// An opaque credential for the remote event source.
///
/// The engine never inspects the credential; it is handed verbatim to the
/// event source with each call. The secret is excluded from `Debug` output
/// and carries no serde implementations so it cannot leak through logs or
/// serialized requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Creates a new credential after validation.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential is empty or whitespace-only.
    pub fn new(secret: impl Into<String>) -> Result<Self, ValidationError> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(ValidationError::Empty { field: "credential" });
        }
        Ok(Self(secret))
    }

    /// Returns the underlying secret for use in an authorization header.
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"[REDACTED]").finish()
    }
}

/// A participant in a scheduling request: a display label plus the opaque
/// credential used to read their calendars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    label: ParticipantLabel,
    credential: Credential,
}

impl Participant {
    pub fn new(label: ParticipantLabel, credential: Credential) -> Self {
        Self { label, credential }
    }

    pub fn label(&self) -> &ParticipantLabel {
        &self.label
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

/// A half-open time window `[start, end)`.
///
/// Invariant: `start < end`, enforced at construction and during
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeWindow")]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Unvalidated wire shape for [`TimeWindow`]; deserialization funnels
/// through [`TimeWindow::new`].
#[derive(Deserialize)]
struct RawTimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawTimeWindow> for TimeWindow {
    type Error = ValidationError;

    fn try_from(raw: RawTimeWindow) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl TimeWindow {
    /// Creates a window after validating `start < end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EmptyWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns true if the half-open span `[start, end)` overlaps this window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, 0, 0)
            .single()
            .expect("valid test timestamp")
    }

    #[test]
    fn participant_label_rejects_empty() {
        assert!(ParticipantLabel::new("").is_err());
        assert!(ParticipantLabel::new("alice@example.com").is_ok());
    }

    #[test]
    fn calendar_id_serde_roundtrip() {
        let id = CalendarId::new("primary").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"primary\"");
        let parsed: CalendarId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn participant_label_serde_rejects_empty() {
        let result: Result<ParticipantLabel, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn credential_rejects_blank() {
        assert!(Credential::new("").is_err());
        assert!(Credential::new("   ").is_err());
        assert!(Credential::new("ya29.token").is_ok());
    }

    #[test]
    fn credential_debug_redacts_secret() {
        let credential = Credential::new("super-secret-token").unwrap();
        let debug = format!("{credential:?}");
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn participant_debug_redacts_credential() {
        let participant = Participant::new(
            ParticipantLabel::new("alice@example.com").unwrap(),
            Credential::new("super-secret-token").unwrap(),
        );
        let debug = format!("{participant:?}");
        assert!(!debug.contains("super-secret-token"));
    }

    #[test]
    fn time_window_rejects_inverted_bounds() {
        assert!(TimeWindow::new(ts(10), ts(9)).is_err());
        assert!(TimeWindow::new(ts(10), ts(10)).is_err());
        assert!(TimeWindow::new(ts(9), ts(10)).is_ok());
    }

    #[test]
    fn time_window_serde_rejects_inverted_bounds() {
        let json = r#"{"start":"2025-06-02T12:00:00Z","end":"2025-06-02T09:00:00Z"}"#;
        let result: Result<TimeWindow, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let json = r#"{"start":"2025-06-02T09:00:00Z","end":"2025-06-02T12:00:00Z"}"#;
        let window: TimeWindow = serde_json::from_str(json).unwrap();
        assert_eq!(window, TimeWindow::new(ts(9), ts(12)).unwrap());
    }

    #[test]
    fn time_window_overlap_is_half_open() {
        let window = TimeWindow::new(ts(9), ts(12)).unwrap();
        assert!(window.overlaps(ts(11), ts(13)));
        assert!(window.overlaps(ts(8), ts(10)));
        // Touching at either boundary does not overlap.
        assert!(!window.overlaps(ts(12), ts(13)));
        assert!(!window.overlaps(ts(8), ts(9)));
    }
}
