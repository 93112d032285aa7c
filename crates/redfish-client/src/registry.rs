//! # Dispatch Registry
//!
//! Maps dispatch keys to handlers. A handler declares keys of two kinds:
//!
//! - type-context keys — `"#Resource[.Version].Term[/relative-path]"`,
//!   indexed as `(type key, relative path)`;
//! - route keys — URL templates, indexed through a [`RouteTable`].
//!
//! Registries are built once at startup by a [`RegistryBuilder`] from a
//! static list of handlers and are immutable afterwards; there is no global
//! registration state and no import-order dependence. The
//! [`CompositeDispatch`] layers a vendor registry over the protocol
//! defaults, and the vendor always wins for an identical key.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::odata::{split_detour, TypeKey};
use crate::resource::ResourceRoot;
use crate::routes::RouteTable;

/// Shared reference to a registered handler.
pub type HandlerRef = Arc<dyn Handler>;

/// A named behavior bundle selected by dispatch.
///
/// # Architecture Note
/// The original protocol clients model this as a class hierarchy: a
/// subclass both *claims* dispatch keys and *overrides* behavior. Here the
/// two concerns are a single trait object: the registry stores `Arc<dyn
/// Handler>` values, and the navigation engine calls the virtual hooks on
/// whichever handler the two-key lookup selected. Vendors ship their own
/// handler set in a second registry instead of subclassing.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Stable display name, also used to detect dispatch disagreement.
    fn name(&self) -> &'static str;

    /// The dispatch keys this handler claims.
    fn detours(&self) -> &'static [&'static str];

    /// Post-fetch hook invoked on a freshly fetched root.
    ///
    /// Vendor overrides chase additional links here, e.g. locating the
    /// singleton management controller among a collection, and attach the
    /// result as an eager sub-resource.
    async fn on_fetched(&self, root: &mut ResourceRoot) -> Result<(), Error> {
        let _ = root;
        Ok(())
    }

    /// Reshapes a caller-facing action payload into the wire shape.
    ///
    /// Invoked by [`crate::action::Action`] when this handler was selected
    /// for the action's target route. The default is the identity.
    fn prepare_action_payload(&self, payload: Value) -> Result<Value, Error> {
        Ok(payload)
    }
}

/// The fallback handler for resources no registry entry matches.
pub struct GenericResource;

#[async_trait]
impl Handler for GenericResource {
    fn name(&self) -> &'static str {
        "Resource"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Returns the process-wide generic fallback handler.
pub fn generic_handler() -> HandlerRef {
    static GENERIC: OnceLock<HandlerRef> = OnceLock::new();
    GENERIC.get_or_init(|| Arc::new(GenericResource)).clone()
}

/// Collects handlers and produces one immutable [`DispatchRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: Vec<HandlerRef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, handler: HandlerRef) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn register_all(mut self, handlers: impl IntoIterator<Item = HandlerRef>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Parses every declared key and builds the registry.
    ///
    /// Fails with [`Error::MalformedTypeAnnotation`] on a bad type-context
    /// key; this is a startup configuration error, never retried.
    pub fn build(self) -> Result<DispatchRegistry, Error> {
        let mut by_type: HashMap<String, HashMap<String, HandlerRef>> = HashMap::new();
        let mut routes = RouteTable::new();
        for handler in self.handlers {
            for key in handler.detours().iter().copied() {
                if key.starts_with('#') {
                    let (annotation, path) = split_detour(key);
                    let type_key = TypeKey::parse(annotation)?.versioned();
                    let paths = by_type.entry(type_key).or_default();
                    if paths.contains_key(path) {
                        debug!(key, handler = handler.name(), "duplicate dispatch key ignored");
                        continue;
                    }
                    paths.insert(path.to_string(), handler.clone());
                } else {
                    routes.connect(key, handler.clone());
                }
            }
        }
        Ok(DispatchRegistry { by_type, routes })
    }
}

/// An immutable two-key dispatch table for one source of truth (vendor or
/// protocol default).
pub struct DispatchRegistry {
    by_type: HashMap<String, HashMap<String, HandlerRef>>,
    routes: RouteTable<HandlerRef>,
}

impl DispatchRegistry {
    /// An empty registry; useful as the vendor side when no overrides exist.
    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
            routes: RouteTable::new(),
        }
    }

    /// Looks up a handler for a declared type at a relative path.
    ///
    /// Tries the versioned key first, then the unversioned one; within a
    /// key, the first registered entry wins.
    pub fn class_from_resource_type(
        &self,
        annotation: &str,
        path: &str,
    ) -> Result<Option<HandlerRef>, Error> {
        let key = TypeKey::parse(annotation)?;
        for type_key in [key.versioned(), key.unversioned()] {
            if let Some(paths) = self.by_type.get(&type_key) {
                if let Some(handler) = paths.get(path) {
                    return Ok(Some(handler.clone()));
                }
            }
        }
        Ok(None)
    }

    /// The full per-path mapping registered for a type. Introspection only.
    pub fn classes_for_type(
        &self,
        annotation: &str,
    ) -> Result<Option<HashMap<String, HandlerRef>>, Error> {
        let key = TypeKey::parse(annotation)?;
        for type_key in [key.versioned(), key.unversioned()] {
            if let Some(paths) = self.by_type.get(&type_key) {
                return Ok(Some(paths.clone()));
            }
        }
        Ok(None)
    }

    /// Looks up a handler by the resource's URL.
    pub fn class_from_route(&self, url: &str) -> Option<HandlerRef> {
        self.routes.matches(url).map(|(_, handler)| handler.clone())
    }
}

/// Vendor registry layered over the protocol defaults.
///
/// Lookups consult the vendor registry in full first; a vendor entry for a
/// key always hides the default entry for that same key. There is no
/// merging and no fallthrough once the vendor has any entry for the exact
/// key.
pub struct CompositeDispatch {
    vendor: DispatchRegistry,
    defaults: DispatchRegistry,
}

impl CompositeDispatch {
    pub fn new(vendor: DispatchRegistry, defaults: DispatchRegistry) -> Self {
        Self { vendor, defaults }
    }

    /// Defaults only, with an empty vendor layer.
    pub fn defaults_only(defaults: DispatchRegistry) -> Self {
        Self {
            vendor: DispatchRegistry::empty(),
            defaults,
        }
    }

    pub fn class_from_resource_type(
        &self,
        annotation: &str,
        path: &str,
    ) -> Result<Option<HandlerRef>, Error> {
        if let Some(handler) = self.vendor.class_from_resource_type(annotation, path)? {
            return Ok(Some(handler));
        }
        self.defaults.class_from_resource_type(annotation, path)
    }

    /// Merged per-path introspection map; vendor entries win per key.
    pub fn classes_for_type(
        &self,
        annotation: &str,
    ) -> Result<Option<HashMap<String, HandlerRef>>, Error> {
        let defaults = self.defaults.classes_for_type(annotation)?;
        let vendor = self.vendor.classes_for_type(annotation)?;
        match (vendor, defaults) {
            (None, None) => Ok(None),
            (vendor, defaults) => {
                let mut merged = defaults.unwrap_or_default();
                merged.extend(vendor.unwrap_or_default());
                Ok(Some(merged))
            }
        }
    }

    pub fn class_from_route(&self, url: &str) -> Option<HandlerRef> {
        self.vendor
            .class_from_route(url)
            .or_else(|| self.defaults.class_from_route(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Keyed {
        name: &'static str,
        detours: &'static [&'static str],
    }

    #[async_trait]
    impl Handler for Keyed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn detours(&self) -> &'static [&'static str] {
            self.detours
        }
    }

    fn handler(name: &'static str, detours: &'static [&'static str]) -> HandlerRef {
        Arc::new(Keyed { name, detours })
    }

    #[test]
    fn versioned_key_is_preferred() {
        let registry = RegistryBuilder::new()
            .register(handler("A", &["#Foo.1_0.Foo"]))
            .register(handler("B", &["#Foo..Foo"]))
            .build()
            .unwrap();

        let hit = registry
            .class_from_resource_type("#Foo.1_0.Foo", "/")
            .unwrap()
            .unwrap();
        assert_eq!(hit.name(), "A");

        // An unregistered version falls back to the unversioned key.
        let hit = registry
            .class_from_resource_type("#Foo.2_0.Foo", "/")
            .unwrap()
            .unwrap();
        assert_eq!(hit.name(), "B");
    }

    #[test]
    fn path_is_part_of_the_key() {
        let registry = RegistryBuilder::new()
            .register(handler("Actions", &["#Manager..Manager/Actions"]))
            .build()
            .unwrap();

        let hit = registry
            .class_from_resource_type("#Manager.v1_5_0.Manager", "/Actions")
            .unwrap()
            .unwrap();
        assert_eq!(hit.name(), "Actions");
        assert!(registry
            .class_from_resource_type("#Manager.v1_5_0.Manager", "/")
            .unwrap()
            .is_none());
    }

    #[test]
    fn route_keys_dispatch_by_url() {
        let registry = RegistryBuilder::new()
            .register(handler(
                "DellAttributes",
                &["/redfish/v1/Managers/{ManagerId}/Oem/Dell/DellAttributes/{DellAttributesId}"],
            ))
            .build()
            .unwrap();

        let hit = registry
            .class_from_route("/redfish/v1/Managers/iDRAC.Embedded.1/Oem/Dell/DellAttributes/System.Embedded.1")
            .unwrap();
        assert_eq!(hit.name(), "DellAttributes");
        assert!(registry.class_from_route("/redfish/v1/Managers").is_none());
    }

    #[test]
    fn malformed_key_fails_the_build() {
        let result = RegistryBuilder::new()
            .register(handler("Broken", &["#NoTerm"]))
            .build();
        assert!(matches!(result, Err(Error::MalformedTypeAnnotation(_))));
    }

    #[test]
    fn vendor_shadows_default_for_identical_key() {
        let vendor = RegistryBuilder::new()
            .register(handler("VendorManager", &["#Manager..Manager"]))
            .build()
            .unwrap();
        let defaults = RegistryBuilder::new()
            .register(handler("Manager", &["#Manager..Manager"]))
            .register(handler("Chassis", &["#Chassis..Chassis"]))
            .build()
            .unwrap();
        let dispatch = CompositeDispatch::new(vendor, defaults);

        let hit = dispatch
            .class_from_resource_type("#Manager.v1_5_0.Manager", "/")
            .unwrap()
            .unwrap();
        assert_eq!(hit.name(), "VendorManager");

        // Keys without a vendor entry fall through to the defaults.
        let hit = dispatch
            .class_from_resource_type("#Chassis.v1_2_0.Chassis", "/")
            .unwrap()
            .unwrap();
        assert_eq!(hit.name(), "Chassis");
    }

    #[test]
    fn introspection_merges_with_vendor_precedence() {
        let vendor = RegistryBuilder::new()
            .register(handler("VendorActions", &["#Manager..Manager/Actions"]))
            .build()
            .unwrap();
        let defaults = RegistryBuilder::new()
            .register(handler("Manager", &["#Manager..Manager"]))
            .register(handler("Actions", &["#Manager..Manager/Actions"]))
            .build()
            .unwrap();
        let dispatch = CompositeDispatch::new(vendor, defaults);

        let map = dispatch
            .classes_for_type("#Manager..Manager")
            .unwrap()
            .unwrap();
        assert_eq!(map["/"].name(), "Manager");
        assert_eq!(map["/Actions"].name(), "VendorActions");
    }
}
