//! Newtype identifiers.
//!
//! Every value that names something on the BReact API is a distinct newtype
//! wrapping a `String`. This prevents accidentally passing — for example — an
//! [`AccessToken`] where a [`ProcessId`] is expected even though both travel
//! as plain strings on the wire.
//!
//! All string identifiers reject the empty string, both at construction and
//! when deserialised from a response body.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display,
// TryFrom<String> (used by serde), From<Self> for String.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
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

        impl TryFrom<String> for $name {
            type Error = EmptyIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(EmptyIdentifier(stringify!($name)))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

/// Returned when an identifier is built from an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} must not be empty")]
pub struct EmptyIdentifier(pub &'static str);

// ---------------------------------------------------------------------------
// Identifiers — String-backed
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a remote service (e.g. `"summarizer"`, `"text_analyzer"`).
    ///
    /// Service IDs are stable keys assigned by the backend and returned by the
    /// services listing endpoint.
    ServiceId
}

string_id! {
    /// A callable operation within a service (e.g. `"summarize"`).
    EndpointName
}

string_id! {
    /// The access token issued alongside a [`ProcessId`] at submission time.
    ///
    /// Only the token issued for a given process may be used to poll it.
    AccessToken
}

/// Identifies one asynchronous job created by a submission call.
///
/// The backend may send the ID as a JSON string or a JSON integer; both are
/// normalised to the string form, so `42` and `"42"` produce equal IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ProcessId(String);

impl ProcessId {
    /// Creates a new process ID, returning `None` if the value is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.is_empty() { None } else { Some(Self(v)) }
    }

    /// Returns the process ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<ProcessId> for String {
    fn from(id: ProcessId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for ProcessId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s,
            Raw::Number(n) => n.to_string(),
        };
        ProcessId::new(text).ok_or_else(|| serde::de::Error::custom(EmptyIdentifier("ProcessId")))
    }
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single submit-then-poll execution inside this client.
///
/// Generated fresh for every execution and recorded on its tracing span so the
/// submission and every poll that follows can be correlated in the logs. It is
/// never sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    /// Generates a new random execution identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
