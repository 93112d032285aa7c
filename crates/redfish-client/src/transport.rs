//! # Transport Interface
//!
//! The navigation engine does not speak HTTP itself. It drives a
//! [`Transport`] collaborator that performs validated requests and owns the
//! authentication credential. Production implementations wrap an HTTP stack;
//! tests use [`crate::mock::MockTransport`].
//!
//! The transport is assumed to sit behind the document-normalization layer,
//! which has already repaired cross-document references, removed ambiguous
//! polymorphic alternatives and surfaced the `Location` header of
//! asynchronous-operation acceptance responses into the payload.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;
use crate::routes::RouteMatch;

/// Field name carrying a resource's own locator.
pub const ODATA_ID: &str = "@odata.id";
/// Field name carrying a resource's declared type annotation.
pub const ODATA_TYPE: &str = "@odata.type";

/// Mutating HTTP method selected for [`Transport::mutate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Patch,
    Delete,
}

/// The authentication credential shared by every request on a transport.
///
/// Swapping the credential is only safe inside the session-bootstrap
/// critical section; see [`crate::client::Client::session_lock`].
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    Basic { username: String, password: String },
    SessionToken(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::None => write!(f, "None"),
            Credential::Basic { username, .. } => write!(f, "Basic({username})"),
            Credential::SessionToken(_) => write!(f, "SessionToken"),
        }
    }
}

/// One message of a structured error envelope's extended info.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtendedInfo {
    #[serde(rename = "MessageId", default)]
    pub message_id: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// The service's structured error body.
///
/// Carried inside [`Error::RemoteFault`] so callers can inspect the code and
/// the per-message extended info.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "code", default)]
    pub code: String,
    #[serde(rename = "message", default)]
    pub message: String,
    #[serde(rename = "@Message.ExtendedInfo", default)]
    pub extended_info: Vec<ExtendedInfo>,
}

impl ErrorEnvelope {
    /// Extracts the envelope from a response payload shaped
    /// `{"error": {...}}`, if present.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let body = payload.get("error")?;
        serde_json::from_value(body.clone()).ok()
    }
}

impl std::fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        for info in &self.extended_info {
            write!(f, "; {} {}", info.message_id, info.message)?;
        }
        Ok(())
    }
}

/// The request-issuing collaborator.
///
/// All methods return the parsed response payload; transient network or 5xx
/// conditions surface as [`Error::TransientIo`]. Structured error envelopes
/// are returned as ordinary payloads — the [`crate::client::Client`] facade
/// is responsible for detecting them.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// GET a resource by its locator.
    async fn fetch(&self, identifier: &str) -> Result<Value, Error>;

    /// PATCH or DELETE a resource.
    ///
    /// `context` carries the caller's current view of the resource so the
    /// response-normalization layer can rebuild a full payload from an
    /// intentionally empty success body.
    async fn mutate(
        &self,
        identifier: &str,
        method: Method,
        payload: Option<Value>,
        context: Option<&Value>,
    ) -> Result<Value, Error>;

    /// POST to an action target resolved as `template` with `parameters`.
    async fn invoke_action(
        &self,
        template: &str,
        parameters: &HashMap<String, String>,
        payload: Value,
    ) -> Result<Value, Error>;

    /// Resolves a concrete URL against the service's path templates.
    ///
    /// Independent of the dispatch registry's own route table; this is the
    /// transport's knowledge of the description document.
    fn route_of(&self, url: &str) -> Option<RouteMatch>;

    /// Swaps the shared authentication credential.
    fn set_credential(&self, credential: Credential);
}
