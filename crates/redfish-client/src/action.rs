//! # Action Invocation
//!
//! Operations a resource advertises under its `Actions` object. The
//! [`ActionSet`] is a capability value a resource handle exposes instead of
//! inheriting invocation behavior; indexing it by descriptor name binds an
//! [`Action`] that can be invoked with a payload.
//!
//! Binding resolves the descriptor's `target` twice: through the
//! transport's route knowledge (for the canonical template and the bound
//! path parameters) and through the dispatch tables (for a vendor handler
//! whose payload hook may reshape a simplified caller payload into the
//! protocol's nested wire form).

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::client::Client;
use crate::error::Error;
use crate::registry::HandlerRef;
use crate::resource::ResourceRoot;

/// View over a resource's `Actions` object.
pub struct ActionSet<'r> {
    root: &'r ResourceRoot,
    value: &'r Value,
}

impl<'r> ActionSet<'r> {
    pub(crate) fn new(root: &'r ResourceRoot, value: &'r Value) -> Self {
        Self { root, value }
    }

    /// The vendor sub-object (`Actions.Oem`), when present.
    pub fn oem(&self) -> Option<ActionSet<'r>> {
        let oem = self.value.get("Oem")?;
        oem.is_object().then(|| ActionSet {
            root: self.root,
            value: oem,
        })
    }

    /// Names of the descriptors in this set, vendor sub-object excluded.
    pub fn names(&self) -> Vec<&str> {
        self.value
            .as_object()
            .map(|map| map.keys().map(String::as_str).filter(|k| *k != "Oem").collect())
            .unwrap_or_default()
    }

    /// Binds the named action descriptor to an invoker.
    pub fn get(&self, name: &str) -> Result<Action, Error> {
        let descriptor = self
            .value
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("no action {name}")))?;
        let target = descriptor
            .get("target")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::NotFound(format!("action {name} has no target")))?;

        let client = self.root.client();
        let route = client
            .transport()
            .route_of(target)
            .ok_or_else(|| Error::NotFound(format!("no route for {target}")))?;
        let handler = client.dispatch().class_from_route(target);
        debug!(
            name,
            target,
            template = %route.template,
            handler = handler.as_ref().map(|h| h.name()),
            "bound action"
        );

        Ok(Action {
            client: client.clone(),
            target: target.to_string(),
            template: route.template,
            parameters: route.parameters,
            title: descriptor
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string),
            descriptor: descriptor.clone(),
            handler,
        })
    }
}

/// A bound operation descriptor. Immutable once constructed.
pub struct Action {
    client: Client,
    target: String,
    template: String,
    parameters: HashMap<String, String>,
    title: Option<String>,
    descriptor: Value,
    handler: Option<HandlerRef>,
}

impl Action {
    /// The concrete target URL.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The canonical route template the target matched.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Route-derived path parameters.
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// The raw descriptor, including any vendor extra fields such as
    /// allowable-value lists.
    pub fn descriptor(&self) -> &Value {
        &self.descriptor
    }

    /// POSTs `payload` to the bound target.
    pub async fn invoke(&self, payload: Value) -> Result<Value, Error> {
        self.invoke_with(payload, HashMap::new()).await
    }

    /// POSTs `payload`, merging `extra_parameters` with the route-derived
    /// ones. Route-derived values win on conflict. A vendor handler bound
    /// to the target route may reshape the payload first.
    pub async fn invoke_with(
        &self,
        payload: Value,
        extra_parameters: HashMap<String, String>,
    ) -> Result<Value, Error> {
        let mut parameters = extra_parameters;
        for (k, v) in &self.parameters {
            parameters.insert(k.clone(), v.clone());
        }
        let payload = match &self.handler {
            Some(handler) => handler.prepare_action_payload(payload)?,
            None => payload,
        };
        self.client.post(&self.template, &parameters, payload).await
    }
}
