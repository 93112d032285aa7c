//! # Client Facade
//!
//! The [`Client`] binds a [`Transport`] to a [`CompositeDispatch`] and is
//! the handle every resource proxy carries back to the service. It is cheap
//! to clone and can be shared across tasks.
//!
//! Every response passing through the facade is checked for the protocol's
//! structured error envelope; an envelope surfaces as
//! [`Error::RemoteFault`] instead of a payload.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::registry::CompositeDispatch;
use crate::resource::ResourceRoot;
use crate::transport::{ErrorEnvelope, Method, Transport};

/// Locator of the service's root resource.
pub const SERVICE_ROOT_ID: &str = "/redfish/v1";

struct ClientInner {
    transport: Arc<dyn Transport>,
    dispatch: CompositeDispatch,
    // Guards the session-bootstrap credential swap: while held, no other
    // request may be started through this client.
    session_lock: tokio::sync::Mutex<()>,
}

/// Shared handle over the transport and the dispatch tables.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, dispatch: CompositeDispatch) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                dispatch,
                session_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub fn dispatch(&self) -> &CompositeDispatch {
        &self.inner.dispatch
    }

    /// The credential-swap critical section.
    ///
    /// Session bootstrap exchanges a credential for a token on the shared
    /// transport; holding this guard keeps every other flow from issuing
    /// requests mid-swap.
    pub async fn session_lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.session_lock.lock().await
    }

    /// GET a resource payload.
    pub async fn get(&self, identifier: &str) -> Result<Value, Error> {
        debug!(identifier, "get");
        let payload = self.transport().fetch(identifier).await?;
        Self::reject_envelope(payload)
    }

    /// PATCH a resource, attaching the caller's current view as request
    /// context for response normalization.
    pub async fn patch(
        &self,
        identifier: &str,
        payload: Value,
        context: Option<&Value>,
    ) -> Result<Value, Error> {
        debug!(identifier, "patch");
        let response = self
            .transport()
            .mutate(identifier, Method::Patch, Some(payload), context)
            .await?;
        Self::reject_envelope(response)
    }

    /// DELETE a resource.
    pub async fn delete(&self, identifier: &str, context: Option<&Value>) -> Result<Value, Error> {
        debug!(identifier, "delete");
        let response = self
            .transport()
            .mutate(identifier, Method::Delete, None, context)
            .await?;
        Self::reject_envelope(response)
    }

    /// POST to an action target.
    pub async fn post(
        &self,
        template: &str,
        parameters: &HashMap<String, String>,
        payload: Value,
    ) -> Result<Value, Error> {
        debug!(template, "post");
        let response = self
            .transport()
            .invoke_action(template, parameters, payload)
            .await?;
        Self::reject_envelope(response)
    }

    /// Fetches the service root.
    pub async fn service_root(&self) -> Result<ResourceRoot, Error> {
        ResourceRoot::fetch(self, SERVICE_ROOT_ID).await
    }

    fn reject_envelope(payload: Value) -> Result<Value, Error> {
        match ErrorEnvelope::from_payload(&payload) {
            Some(envelope) => Err(Error::RemoteFault(envelope)),
            None => Ok(payload),
        }
    }
}
