//! Dell OEM handlers and payload shaping.
//!
//! The iDRAC exposes its extensions on routes the standard never names
//! (`.../Oem/Dell/...`, `EID_674_Manager.*` action targets) and under the
//! `Actions/Oem` sub-object of standard resources. The handlers here claim
//! those keys in the vendor registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use redfish_client::collection::ResourceKind;
use redfish_client::error::Error;
use redfish_client::registry::{DispatchRegistry, Handler, RegistryBuilder};
use redfish_client::resource::ResourceRoot;

/// Builds the Dell vendor dispatch registry.
pub fn dell_registry() -> Result<DispatchRegistry, Error> {
    RegistryBuilder::new()
        .register_all([
            Arc::new(DellAttributesHandler) as _,
            Arc::new(Eid674Handler) as _,
            Arc::new(DellUpdateServiceHandler) as _,
            Arc::new(DellTelemetryServiceHandler) as _,
            Arc::new(DellManagerHandler) as _,
            Arc::new(ManagerActionsOemHandler) as _,
        ])
        .build()
}

/// Shadows the default `Actions/Oem` marker on managers so Dell action
/// descriptors dispatch into this package.
pub struct ManagerActionsOemHandler;

#[async_trait]
impl Handler for ManagerActionsOemHandler {
    fn name(&self) -> &'static str {
        "DellManagerActionsOem"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["#Manager..Manager/Actions/Oem"]
    }
}

pub struct DellAttributesHandler;

#[async_trait]
impl Handler for DellAttributesHandler {
    fn name(&self) -> &'static str {
        "DellAttributes"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["/redfish/v1/Managers/{ManagerId}/Oem/Dell/DellAttributes/{DellAttributesId}"]
    }
}

/// The iDRAC attribute store: one flat `Attributes` object keyed
/// `Group.Instance.Name`.
#[derive(Clone)]
pub struct DellAttributes(ResourceRoot);

#[async_trait]
impl ResourceKind for DellAttributes {
    fn from_root(root: ResourceRoot) -> Self {
        Self(root)
    }

    fn root(&self) -> &ResourceRoot {
        &self.0
    }
}

impl DellAttributes {
    /// Reads one attribute, e.g. `attribute("NTPConfigGroup.1.NTP1")`.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.0.value().get("Attributes")?.get(name)
    }

    /// PATCHes a set of attribute values.
    pub async fn set_attributes(&self, attributes: Value) -> Result<Value, Error> {
        self.0.patch(json!({ "Attributes": attributes })).await
    }
}

/// The `EID_674_Manager` system-configuration actions.
///
/// Callers hand these actions a flat parameter set; the wire format wants
/// the share location nested under `ShareParameters`. The payload hook
/// performs that flattening-in-reverse so the caller-facing surface stays
/// simple.
pub struct Eid674Handler;

#[async_trait]
impl Handler for Eid674Handler {
    fn name(&self) -> &'static str {
        "EID_674_Manager"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/Managers/{ManagerId}/Actions/Oem/EID_674_Manager.ExportSystemConfiguration",
            "/redfish/v1/Managers/{ManagerId}/Actions/Oem/EID_674_Manager.ImportSystemConfiguration",
            "/redfish/v1/Managers/{ManagerId}/Actions/Oem/EID_674_Manager.ImportSystemConfigurationPreview",
        ]
    }

    fn prepare_action_payload(&self, payload: Value) -> Result<Value, Error> {
        nest_share_parameters(payload)
    }
}

pub struct DellUpdateServiceHandler;

#[async_trait]
impl Handler for DellUpdateServiceHandler {
    fn name(&self) -> &'static str {
        "DellUpdateService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["/redfish/v1/UpdateService/Actions/Oem/DellUpdateService.Install"]
    }
}

pub struct DellTelemetryServiceHandler;

#[async_trait]
impl Handler for DellTelemetryServiceHandler {
    fn name(&self) -> &'static str {
        "DellTelemetryService"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["/redfish/v1/UpdateService/Actions/Oem/DellTelemetryService.SubmitMetricValue"]
    }
}

pub struct DellManagerHandler;

#[async_trait]
impl Handler for DellManagerHandler {
    fn name(&self) -> &'static str {
        "DellManager"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "/redfish/v1/Managers/{ManagerId}/Actions/Oem/DellManager.ResetToDefaults",
            "/redfish/v1/Managers/{ManagerId}/Actions/Oem/DellManager.SetCustomDefaults",
        ]
    }
}

/// Keys of the simplified caller payload that fold into `ShareParameters`.
const SHARE_KEYS: &[(&str, &str)] = &[
    ("filename", "FileName"),
    ("ip", "IPAddress"),
    ("share_name", "ShareName"),
    ("share_type", "ShareType"),
    ("username", "Username"),
    ("password", "Password"),
];

/// Reshapes a flat `{format, use, target, filename, ...}` payload into the
/// nested wire form. Payloads already carrying `ShareParameters` (or not
/// shaped as an object) pass through untouched.
fn nest_share_parameters(payload: Value) -> Result<Value, Error> {
    let flat = match payload {
        Value::Object(flat) => flat,
        other => return Ok(other),
    };
    if flat.contains_key("ShareParameters") {
        return Ok(Value::Object(flat));
    }

    let mut wire = Map::new();
    let mut share = Map::new();
    for (key, value) in flat {
        match key.as_str() {
            "format" => {
                let fmt = value.as_str().map(str::to_uppercase);
                wire.insert(
                    "ExportFormat".to_string(),
                    fmt.map_or(value, Value::String),
                );
            }
            "use" => {
                wire.insert("ExportUse".to_string(), value);
            }
            "target" => {
                // The wire form wants a list of targets.
                let targets = match value {
                    Value::Array(items) => Value::Array(items),
                    single => Value::Array(vec![single]),
                };
                share.insert("Target".to_string(), targets);
            }
            _ => match SHARE_KEYS.iter().find(|(simple, _)| *simple == key) {
                Some((_, wire_key)) => {
                    share.insert((*wire_key).to_string(), value);
                }
                None => {
                    wire.insert(key, value);
                }
            },
        }
    }
    if !share.is_empty() {
        wire.insert("ShareParameters".to_string(), Value::Object(share));
    }
    debug!(?wire, "shaped share parameters");
    Ok(Value::Object(wire))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_export_payload_is_nested() {
        let shaped = nest_share_parameters(json!({
            "format": "xml",
            "use": "Default",
            "target": "ALL",
            "filename": "config.xml",
            "share_type": "NFS"
        }))
        .unwrap();

        assert_eq!(
            shaped,
            json!({
                "ExportFormat": "XML",
                "ExportUse": "Default",
                "ShareParameters": {
                    "Target": ["ALL"],
                    "FileName": "config.xml",
                    "ShareType": "NFS"
                }
            })
        );
    }

    #[test]
    fn already_nested_payloads_pass_through() {
        let wire = json!({
            "ExportFormat": "JSON",
            "ShareParameters": {"Target": ["IDRAC"]}
        });
        assert_eq!(nest_share_parameters(wire.clone()).unwrap(), wire);
    }

    #[test]
    fn target_lists_are_preserved() {
        let shaped = nest_share_parameters(json!({"target": ["BIOS", "NIC"]})).unwrap();
        assert_eq!(shaped["ShareParameters"]["Target"], json!(["BIOS", "NIC"]));
    }
}
