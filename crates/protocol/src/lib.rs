//! Domain types for the BReact client.
//!
//! This crate contains every identifier, wire type, and error type used by
//! the client, plus the [`Transport`] port that the orchestration layer calls
//! through. Infrastructure crates implement [`Transport`]; they never add
//! protocol rules.
//!
//! ## Architectural Layer
//!
//! **Domain + port definitions.** This crate has no I/O dependencies; `url` is used
//! only to parse and encode.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ServiceId`, `ProcessId`, etc.) |
//! | [`types`] | Wire types (`ServiceDefinition`, `ProcessHandle`, `ServiceResponse`, etc.) |
//! | [`errors`] | The [`BReactError`] taxonomy |
//! | [`paths`] | API path composition |
//! | [`transport`] | The [`Transport`] port trait and request shape |

pub mod errors;
pub mod identifiers;
pub mod paths;
pub mod transport;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{BReactError, ErrorCategory};
pub use identifiers::{AccessToken, EmptyIdentifier, EndpointName, ExecutionId, ProcessId, ServiceId};
pub use paths::{ApiPath, ApiPaths, ACCESS_TOKEN_PARAM};
pub use transport::{HttpMethod, TimeoutClass, Transport, TransportRequest};
pub use types::{
    ProcessHandle, ProcessInfo, ResponseStatus, ResultStatus, ServiceDefinition, ServiceResponse,
    ServiceResult,
};
