//! Deferred-settings resources.
//!
//! Some resources (BIOS being the canonical case) stage writes in a
//! companion settings object advertised under `@Redfish.Settings` and apply
//! them on the next reset.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::collection::ResourceKind;
use crate::error::Error;
use crate::registry::Handler;
use crate::resource::ResourceRoot;

/// A resource whose writes go to its staged settings object when one is
/// advertised, and to the resource itself otherwise.
#[derive(Clone)]
pub struct Settings(ResourceRoot);

#[async_trait]
impl ResourceKind for Settings {
    fn from_root(root: ResourceRoot) -> Self {
        Self(root)
    }

    fn root(&self) -> &ResourceRoot {
        &self.0
    }
}

impl Settings {
    /// PATCHes `values` to the staged settings object, falling back to the
    /// resource itself.
    pub async fn apply(&self, values: Value) -> Result<Value, Error> {
        let staged = self
            .0
            .value()
            .get("@Redfish.Settings")
            .and_then(|s| s.get("SettingsObject"))
            .and_then(|o| o.get("@odata.id"))
            .and_then(Value::as_str)
            .map(str::to_string);
        match staged {
            Some(target) => {
                debug!(%target, "patching staged settings object");
                self.0
                    .client()
                    .patch(&target, values, Some(self.0.value()))
                    .await
            }
            None => self.0.patch(values).await,
        }
    }
}

pub struct BiosHandler;

#[async_trait]
impl Handler for BiosHandler {
    fn name(&self) -> &'static str {
        "Bios"
    }

    fn detours(&self) -> &'static [&'static str] {
        &["#Bios..Bios"]
    }
}
