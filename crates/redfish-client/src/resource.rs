//! # Resource Graph
//!
//! Lazy typed wrappers over fetched or embedded JSON values.
//!
//! A [`ResourceRoot`] is a top-level fetched resource: it owns the raw
//! payload, the [`Client`] handle used for `patch`/`delete`/`refresh`, and
//! any eager sub-resources its handler attached after the fetch. Nested
//! values are reached through [`ResourceProxy::resolve`], which consults the
//! dispatch tables and hands back a [`Resolved`] union the caller pattern
//! matches on — there is no attribute-miss fallthrough.
//!
//! # Architecture Note
//! Proxies borrow their owning root. The relative path they carry is always
//! relative to that root, never absolute, and a proxy never outlives the
//! payload it points into. `refresh()` takes `&mut self`, so the borrow
//! checker enforces the "no concurrent refresh" contract for free.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::action::ActionSet;
use crate::client::Client;
use crate::error::Error;
use crate::odata::join_path;
use crate::registry::{generic_handler, HandlerRef};
use crate::transport::{ODATA_ID, ODATA_TYPE};

/// Outcome of resolving one field of a resource payload.
pub enum Resolved<'r> {
    /// Scalars pass through unchanged.
    Scalar(&'r Value),
    /// A nested object wrapped for further navigation. Carries the
    /// dispatched handler, or the generic one when no registry entry
    /// matched.
    Resource(ResourceProxy<'r>),
    /// Arrays and other structured values without resource semantics.
    Raw(&'r Value),
}

impl<'r> Resolved<'r> {
    /// The nested proxy, or `NotFound` when the field resolved to a scalar
    /// or raw value.
    pub fn into_resource(self, field: &str) -> Result<ResourceProxy<'r>, Error> {
        match self {
            Resolved::Resource(proxy) => Ok(proxy),
            _ => Err(Error::NotFound(format!("{field} is not a resource"))),
        }
    }

    pub fn as_value(&self) -> &'r Value {
        match self {
            Resolved::Scalar(v) | Resolved::Raw(v) => v,
            Resolved::Resource(proxy) => proxy.value(),
        }
    }
}

/// A lazy typed view over a nested value of a fetched resource.
#[derive(Clone)]
pub struct ResourceProxy<'r> {
    root: &'r ResourceRoot,
    path: String,
    value: &'r Value,
    handler: HandlerRef,
}

impl<'r> ResourceProxy<'r> {
    pub fn root(&self) -> &'r ResourceRoot {
        self.root
    }

    /// Path of this value relative to the owning root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn value(&self) -> &'r Value {
        self.value
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    /// Resolves one field of the wrapped payload.
    ///
    /// Scalars are returned unchanged. A structured value is looked up in
    /// the dispatch tables under its own declared type, or — because
    /// embedded sub-objects frequently omit their own annotation — under
    /// the owning root's type with the field appended to the current path.
    pub fn resolve(&self, field: &str) -> Result<Resolved<'r>, Error> {
        let value = self
            .value
            .get(field)
            .ok_or_else(|| Error::NotFound(format!("{} has no field {field}", self.path)))?;

        if !value.is_object() && !value.is_array() {
            return Ok(Resolved::Scalar(value));
        }

        let own_type = value.get(ODATA_TYPE).and_then(Value::as_str);
        let context = match own_type {
            // A value declaring its own type is its own dispatch context.
            Some(annotation) => Some((annotation.to_string(), "/".to_string())),
            None => self
                .root
                .declared_type()
                .map(|annotation| (annotation.to_string(), join_path(&self.path, field))),
        };

        let (handler, path) = match context {
            Some((annotation, path)) => {
                let hit = self
                    .root
                    .client()
                    .dispatch()
                    .class_from_resource_type(&annotation, &path)?;
                debug!(
                    %annotation,
                    %path,
                    handler = hit.as_ref().map(|h| h.name()),
                    "resolve"
                );
                (hit, path)
            }
            None => (None, join_path(&self.path, field)),
        };

        match handler {
            Some(handler) => Ok(Resolved::Resource(ResourceProxy {
                root: self.root,
                path,
                value,
                handler,
            })),
            // Objects stay navigable under the generic handler; arrays have
            // no resource semantics and pass through raw.
            None if value.is_object() => Ok(Resolved::Resource(ResourceProxy {
                root: self.root,
                path,
                value,
                handler: generic_handler(),
            })),
            None => Ok(Resolved::Raw(value)),
        }
    }

    /// The `Actions` capability of this value, when present.
    pub fn actions(&self) -> Option<ActionSet<'r>> {
        let actions = self.value.get("Actions")?;
        actions
            .is_object()
            .then(|| ActionSet::new(self.root, actions))
    }
}

/// A top-level fetched resource.
#[derive(Clone)]
pub struct ResourceRoot {
    client: Client,
    handler: HandlerRef,
    value: Value,
    eager: HashMap<String, ResourceRoot>,
}

impl ResourceRoot {
    /// Async factory: fetches `identifier` and dispatches a handler for it.
    ///
    /// A handler is resolved independently by the payload's declared type
    /// (at the root path) and by the identifier's route. If both resolve
    /// and disagree the fetch fails with [`Error::InconsistentDispatch`];
    /// otherwise the type-based result is preferred, then the route-based
    /// one, then the generic fallback. The selected handler's post-fetch
    /// hook runs before the root is returned.
    pub async fn fetch(client: &Client, identifier: &str) -> Result<Self, Error> {
        let value = client.get(identifier).await?;
        let mut root = Self::dispatch(client, identifier, value)?;
        let handler = root.handler.clone();
        handler.on_fetched(&mut root).await?;
        Ok(root)
    }

    /// Wraps an already-fetched payload, dispatching by declared type only.
    ///
    /// No post-fetch hook runs; this is for payloads obtained out of band,
    /// e.g. a session created by POST.
    pub fn from_value(client: &Client, value: Value) -> Result<Self, Error> {
        let handler = match value.get(ODATA_TYPE).and_then(Value::as_str) {
            Some(annotation) => client
                .dispatch()
                .class_from_resource_type(annotation, "/")?
                .unwrap_or_else(generic_handler),
            None => generic_handler(),
        };
        Ok(Self {
            client: client.clone(),
            handler,
            value,
            eager: HashMap::new(),
        })
    }

    fn dispatch(client: &Client, identifier: &str, value: Value) -> Result<Self, Error> {
        let by_type = match value.get(ODATA_TYPE).and_then(Value::as_str) {
            Some(annotation) => client.dispatch().class_from_resource_type(annotation, "/")?,
            None => None,
        };
        let by_route = client.dispatch().class_from_route(identifier);
        let handler = match (by_type, by_route) {
            (Some(type_based), Some(route_based)) => {
                if !std::sync::Arc::ptr_eq(&type_based, &route_based) {
                    return Err(Error::InconsistentDispatch {
                        type_based: type_based.name(),
                        route_based: route_based.name(),
                    });
                }
                type_based
            }
            (Some(type_based), None) => type_based,
            (None, Some(route_based)) => route_based,
            (None, None) => generic_handler(),
        };
        debug!(identifier, handler = handler.name(), "fetched");
        Ok(Self {
            client: client.clone(),
            handler,
            value,
            eager: HashMap::new(),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The resource's own locator.
    pub fn identifier(&self) -> Result<&str, Error> {
        self.value
            .get(ODATA_ID)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::NotFound(format!("{ODATA_ID} missing from payload")))
    }

    /// The resource's declared type annotation.
    pub fn declared_type(&self) -> Option<&str> {
        self.value.get(ODATA_TYPE).and_then(Value::as_str)
    }

    /// The locator a link field points at.
    pub fn link(&self, field: &str) -> Result<String, Error> {
        self.value
            .get(field)
            .and_then(|v| v.get(ODATA_ID))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("no link at {field}")))
    }

    /// This root viewed as a proxy at the root path.
    pub fn as_proxy(&self) -> ResourceProxy<'_> {
        ResourceProxy {
            root: self,
            path: "/".to_string(),
            value: &self.value,
            handler: self.handler.clone(),
        }
    }

    /// Resolves one field; see [`ResourceProxy::resolve`].
    pub fn resolve(&self, field: &str) -> Result<Resolved<'_>, Error> {
        self.as_proxy().resolve(field)
    }

    /// The `Actions` capability, when the payload carries one.
    pub fn actions(&self) -> Option<ActionSet<'_>> {
        self.as_proxy().actions()
    }

    /// The vendor (`Actions/Oem`) capability, when present.
    pub fn oem_actions(&self) -> Option<ActionSet<'_>> {
        self.actions().and_then(|actions| actions.oem())
    }

    /// An eager sub-resource attached by the post-fetch hook.
    pub fn eager(&self, name: &str) -> Option<&ResourceRoot> {
        self.eager.get(name)
    }

    /// Attaches an eager sub-resource. Called from post-fetch hooks.
    pub fn attach_eager(&mut self, name: impl Into<String>, resource: ResourceRoot) {
        self.eager.insert(name.into(), resource);
    }

    /// PATCH this resource, passing the current payload as request context
    /// so the normalization layer can rebuild a full body from an empty
    /// success response.
    pub async fn patch(&self, payload: Value) -> Result<Value, Error> {
        let identifier = self.identifier()?.to_string();
        self.client.patch(&identifier, payload, Some(&self.value)).await
    }

    /// DELETE this resource.
    pub async fn delete(&self) -> Result<Value, Error> {
        let identifier = self.identifier()?.to_string();
        self.client.delete(&identifier, Some(&self.value)).await
    }

    /// Re-fetches the payload and replaces the backing value wholesale.
    ///
    /// Eager sub-resources are left untouched; the post-fetch hook does not
    /// run again.
    pub async fn refresh(&mut self) -> Result<(), Error> {
        let identifier = self.identifier()?.to_string();
        self.value = self.client.get(&identifier).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ResourceRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceRoot")
            .field("handler", &self.handler.name())
            .field("identifier", &self.value.get(ODATA_ID))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::registry::{CompositeDispatch, Handler, RegistryBuilder};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    struct Marker {
        name: &'static str,
        detours: &'static [&'static str],
    }

    #[async_trait]
    impl Handler for Marker {
        fn name(&self) -> &'static str {
            self.name
        }
        fn detours(&self) -> &'static [&'static str] {
            self.detours
        }
    }

    fn client_with(handlers: Vec<HandlerRef>) -> (Client, Arc<MockTransport>) {
        let defaults = RegistryBuilder::new()
            .register_all(handlers)
            .build()
            .unwrap();
        let transport = Arc::new(MockTransport::new());
        let client = Client::new(transport.clone(), CompositeDispatch::defaults_only(defaults));
        (client, transport)
    }

    #[tokio::test]
    async fn scalars_pass_through() {
        let (client, transport) = client_with(vec![]);
        transport.serve(
            "/redfish/v1/Managers/1",
            json!({"@odata.id": "/redfish/v1/Managers/1", "Name": "bmc", "Slots": 4}),
        );
        let root = ResourceRoot::fetch(&client, "/redfish/v1/Managers/1").await.unwrap();
        match root.resolve("Name").unwrap() {
            Resolved::Scalar(v) => assert_eq!(v, "bmc"),
            _ => panic!("expected scalar"),
        }
        match root.resolve("Slots").unwrap() {
            Resolved::Scalar(v) => assert_eq!(v.as_u64(), Some(4)),
            _ => panic!("expected scalar"),
        }
    }

    #[tokio::test]
    async fn embedded_objects_inherit_the_root_type_context() {
        let (client, transport) = client_with(vec![
            Arc::new(Marker {
                name: "Manager",
                detours: &["#Manager..Manager"],
            }),
            Arc::new(Marker {
                name: "ManagerActions",
                detours: &["#Manager..Manager/Actions"],
            }),
        ]);
        transport.serve(
            "/redfish/v1/Managers/1",
            json!({
                "@odata.id": "/redfish/v1/Managers/1",
                "@odata.type": "#Manager.v1_5_0.Manager",
                "Actions": {"#Manager.Reset": {"target": "/redfish/v1/Managers/1/Actions/Manager.Reset"}}
            }),
        );
        let root = ResourceRoot::fetch(&client, "/redfish/v1/Managers/1").await.unwrap();
        assert_eq!(root.handler().name(), "Manager");

        // "Actions" has no annotation of its own: the owning root's type and
        // the extended path select the registered handler.
        let proxy = root.resolve("Actions").unwrap().into_resource("Actions").unwrap();
        assert_eq!(proxy.handler().name(), "ManagerActions");
        assert_eq!(proxy.path(), "/Actions");
    }

    #[tokio::test]
    async fn own_annotation_resets_the_dispatch_context() {
        let (client, transport) = client_with(vec![Arc::new(Marker {
            name: "Thermal",
            detours: &["#Thermal..Thermal"],
        })]);
        transport.serve(
            "/redfish/v1/Chassis/1",
            json!({
                "@odata.id": "/redfish/v1/Chassis/1",
                "@odata.type": "#Chassis.v1_2_0.Chassis",
                "Thermal": {
                    "@odata.id": "/redfish/v1/Chassis/1/Thermal",
                    "@odata.type": "#Thermal.v1_1_0.Thermal"
                }
            }),
        );
        let root = ResourceRoot::fetch(&client, "/redfish/v1/Chassis/1").await.unwrap();
        let proxy = root.resolve("Thermal").unwrap().into_resource("Thermal").unwrap();
        assert_eq!(proxy.handler().name(), "Thermal");
        assert_eq!(proxy.path(), "/");
    }

    #[tokio::test]
    async fn unmatched_objects_stay_navigable_and_arrays_pass_raw() {
        let (client, transport) = client_with(vec![]);
        transport.serve(
            "/redfish/v1/Systems/1",
            json!({
                "@odata.id": "/redfish/v1/Systems/1",
                "@odata.type": "#ComputerSystem.v1_10_0.ComputerSystem",
                "Boot": {"BootSourceOverrideTarget": "Pxe"},
                "HostingRoles": ["ApplicationServer"]
            }),
        );
        let root = ResourceRoot::fetch(&client, "/redfish/v1/Systems/1").await.unwrap();

        let boot = root.resolve("Boot").unwrap().into_resource("Boot").unwrap();
        assert_eq!(boot.handler().name(), "Resource");
        match boot.resolve("BootSourceOverrideTarget").unwrap() {
            Resolved::Scalar(v) => assert_eq!(v, "Pxe"),
            _ => panic!("expected scalar"),
        }

        match root.resolve("HostingRoles").unwrap() {
            Resolved::Raw(v) => assert!(v.is_array()),
            _ => panic!("expected raw"),
        }
    }

    #[tokio::test]
    async fn type_and_route_disagreement_fails() {
        let (client, transport) = client_with(vec![
            Arc::new(Marker {
                name: "ByType",
                detours: &["#Manager..Manager"],
            }),
            Arc::new(Marker {
                name: "ByRoute",
                detours: &["/redfish/v1/Managers/{ManagerId}"],
            }),
        ]);
        transport.serve(
            "/redfish/v1/Managers/1",
            json!({
                "@odata.id": "/redfish/v1/Managers/1",
                "@odata.type": "#Manager.v1_5_0.Manager"
            }),
        );
        let result = ResourceRoot::fetch(&client, "/redfish/v1/Managers/1").await;
        assert!(matches!(result, Err(Error::InconsistentDispatch { .. })));
    }

    #[tokio::test]
    async fn agreeing_type_and_route_dispatch_succeeds() {
        let marker: HandlerRef = Arc::new(Marker {
            name: "Manager",
            detours: &["#Manager..Manager", "/redfish/v1/Managers/{ManagerId}"],
        });
        let (client, transport) = client_with(vec![marker]);
        transport.serve(
            "/redfish/v1/Managers/1",
            json!({
                "@odata.id": "/redfish/v1/Managers/1",
                "@odata.type": "#Manager.v1_5_0.Manager"
            }),
        );
        let root = ResourceRoot::fetch(&client, "/redfish/v1/Managers/1").await.unwrap();
        assert_eq!(root.handler().name(), "Manager");
    }

    #[tokio::test]
    async fn refresh_replaces_the_backing_value() {
        let (client, transport) = client_with(vec![]);
        transport.serve_sequence(
            "/redfish/v1/Systems/1",
            vec![
                json!({"@odata.id": "/redfish/v1/Systems/1", "PowerState": "Off"}),
                json!({"@odata.id": "/redfish/v1/Systems/1", "PowerState": "On"}),
            ],
        );
        let mut root = ResourceRoot::fetch(&client, "/redfish/v1/Systems/1").await.unwrap();
        assert_eq!(root.value()["PowerState"], "Off");
        root.refresh().await.unwrap();
        assert_eq!(root.value()["PowerState"], "On");
    }

    #[tokio::test]
    async fn remote_fault_carries_the_envelope() {
        let (client, transport) = client_with(vec![]);
        transport.serve(
            "/redfish/v1/Broken",
            json!({"error": {"code": "Base.1.0.GeneralError", "message": "no"}}),
        );
        let result = ResourceRoot::fetch(&client, "/redfish/v1/Broken").await;
        match result {
            Err(Error::RemoteFault(envelope)) => assert_eq!(envelope.code, "Base.1.0.GeneralError"),
            _ => panic!("expected remote fault"),
        }
    }
}
