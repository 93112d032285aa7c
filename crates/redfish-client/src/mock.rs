//! # Mock Transport & Testing Guide
//!
//! [`MockTransport`] implements the same [`Transport`] interface as a
//! production HTTP stack but serves scripted payloads entirely in memory.
//! It lets tests exercise navigation, dispatch and job monitoring
//! deterministically, without a live service.
//!
//! ## Scripting
//!
//! - [`MockTransport::serve`] — a steady payload returned for every fetch
//!   of an identifier.
//! - [`MockTransport::serve_sequence`] — one payload per fetch in order;
//!   the last repeats. This is how a synthetic job "makes progress".
//! - [`MockTransport::fail_fetch`] — injects N transient I/O failures
//!   before the scripted payload is served again.
//! - [`MockTransport::route`] — registers a URL template so `route_of`
//!   and action binding resolve.
//!
//! ## Inspection
//!
//! Every request is recorded: [`MockTransport::fetches`] (ordered
//! identifiers), [`MockTransport::mutations`] and [`MockTransport::posts`].
//! Fetching an identifier that was never scripted panics — like an
//! unexpected message in a test double, it means the test script and the
//! code under test disagree.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;
use crate::routes::{RouteMatch, RouteTable};
use crate::transport::{Credential, Method, Transport};

/// A recorded PATCH/DELETE.
#[derive(Debug, Clone)]
pub struct RecordedMutation {
    pub identifier: String,
    pub method: Method,
    pub payload: Option<Value>,
}

/// A recorded action POST.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub template: String,
    pub url: String,
    pub parameters: HashMap<String, String>,
    pub payload: Value,
}

struct Served {
    values: Vec<Value>,
    cursor: usize,
}

#[derive(Default)]
struct MockState {
    served: HashMap<String, Served>,
    failures: HashMap<String, usize>,
    fetches: Vec<String>,
    mutations: Vec<RecordedMutation>,
    posts: Vec<RecordedPost>,
    routes: RouteTable<()>,
    credential: Option<Credential>,
}

/// In-memory scripted transport for tests.
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Serves `value` for every fetch of `identifier`.
    pub fn serve(&self, identifier: impl Into<String>, value: Value) {
        self.serve_sequence(identifier, vec![value]);
    }

    /// Serves the payloads one per fetch, the last one repeating.
    pub fn serve_sequence(&self, identifier: impl Into<String>, values: Vec<Value>) {
        assert!(!values.is_empty(), "serve_sequence needs at least one payload");
        let mut state = self.lock();
        state
            .served
            .insert(identifier.into(), Served { values, cursor: 0 });
    }

    /// Makes the next `times` fetches of `identifier` fail transiently.
    pub fn fail_fetch(&self, identifier: impl Into<String>, times: usize) {
        let mut state = self.lock();
        state.failures.insert(identifier.into(), times);
    }

    /// Registers a URL template for `route_of` resolution.
    pub fn route(&self, template: &str) {
        let mut state = self.lock();
        state.routes.connect(template, ());
    }

    /// Identifiers fetched so far, in request order.
    pub fn fetches(&self) -> Vec<String> {
        self.lock().fetches.clone()
    }

    /// How many times `identifier` was fetched.
    pub fn fetch_count(&self, identifier: &str) -> usize {
        self.lock()
            .fetches
            .iter()
            .filter(|id| id.as_str() == identifier)
            .count()
    }

    pub fn mutations(&self) -> Vec<RecordedMutation> {
        self.lock().mutations.clone()
    }

    pub fn posts(&self) -> Vec<RecordedPost> {
        self.lock().posts.clone()
    }

    /// The credential most recently installed, if any.
    pub fn credential(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    fn next_payload(state: &mut MockState, identifier: &str) -> Result<Value, Error> {
        if let Some(remaining) = state.failures.get_mut(identifier) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::TransientIo(format!("injected failure for {identifier}")));
            }
        }
        let served = state
            .served
            .get_mut(identifier)
            .unwrap_or_else(|| panic!("MockTransport: no payload scripted for {identifier}"));
        let index = served.cursor.min(served.values.len() - 1);
        served.cursor += 1;
        Ok(served.values[index].clone())
    }

    fn substitute(template: &str, parameters: &HashMap<String, String>) -> String {
        let mut url = template.to_string();
        for (name, value) in parameters {
            url = url.replace(&format!("{{{name}}}"), value);
        }
        url
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, identifier: &str) -> Result<Value, Error> {
        let mut state = self.lock();
        state.fetches.push(identifier.to_string());
        Self::next_payload(&mut state, identifier)
    }

    async fn mutate(
        &self,
        identifier: &str,
        method: Method,
        payload: Option<Value>,
        context: Option<&Value>,
    ) -> Result<Value, Error> {
        let mut state = self.lock();
        state.mutations.push(RecordedMutation {
            identifier: identifier.to_string(),
            method,
            payload: payload.clone(),
        });
        // A PATCH answers with the caller's view merged with the patch
        // body, standing in for the response-normalization collaborator
        // rebuilding a full payload from an empty success response.
        let base = context.cloned().or_else(|| {
            state
                .served
                .get(identifier)
                .and_then(|s| s.values.last().cloned())
        });
        match (base, payload) {
            (Some(Value::Object(mut base)), Some(Value::Object(patch))) => {
                for (k, v) in patch {
                    base.insert(k, v);
                }
                Ok(Value::Object(base))
            }
            (Some(base), _) => Ok(base),
            (None, payload) => Ok(payload.unwrap_or(Value::Null)),
        }
    }

    async fn invoke_action(
        &self,
        template: &str,
        parameters: &HashMap<String, String>,
        payload: Value,
    ) -> Result<Value, Error> {
        let url = Self::substitute(template, parameters);
        let mut state = self.lock();
        state.posts.push(RecordedPost {
            template: template.to_string(),
            url: url.clone(),
            parameters: parameters.clone(),
            payload,
        });
        if state.served.contains_key(url.as_str()) {
            Self::next_payload(&mut state, &url)
        } else {
            Ok(Value::Null)
        }
    }

    fn route_of(&self, url: &str) -> Option<RouteMatch> {
        self.lock().routes.matches(url).map(|(m, ())| m)
    }

    fn set_credential(&self, credential: Credential) {
        self.lock().credential = Some(credential);
    }
}
