//! # Protocol-Default Entities
//!
//! The handler set and typed wrappers for the standard service resources.
//! [`defaults`] builds the registry a plain (vendor-less) client runs on;
//! vendor packages layer their own registry over it through
//! [`crate::registry::CompositeDispatch`].

pub mod collections;
pub mod service;
pub mod settings;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Error;
use crate::registry::{DispatchRegistry, Handler, RegistryBuilder};

pub use service::{
    AccountService, Chassis, ComputerSystem, EventService, JobService, Manager, ManagerAccount,
    ManagerResetRecovery, ServiceRoot, SessionService, Task, TaskService,
};
pub use settings::Settings;

/// Marks the `Actions` sub-object of the standard service resources.
pub struct ActionsHandler;

#[async_trait]
impl Handler for ActionsHandler {
    fn name(&self) -> &'static str {
        "Actions"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "#CertificateService..CertificateService/Actions",
            "#Chassis..Chassis/Actions",
            "#ComputerSystem..ComputerSystem/Actions",
            "#EventService..EventService/Actions",
            "#Manager..Manager/Actions",
            "#TelemetryService..TelemetryService/Actions",
            "#UpdateService..UpdateService/Actions",
        ]
    }
}

/// Marks the vendor (`Actions/Oem`) sub-object.
pub struct OemActionsHandler;

#[async_trait]
impl Handler for OemActionsHandler {
    fn name(&self) -> &'static str {
        "ActionsOem"
    }

    fn detours(&self) -> &'static [&'static str] {
        &[
            "#CertificateService..CertificateService/Actions/Oem",
            "#EventService..EventService/Actions/Oem",
            "#Manager..Manager/Actions/Oem",
            "#TelemetryService..TelemetryService/Actions/Oem",
            "#UpdateService..UpdateService/Actions/Oem",
        ]
    }
}

/// Builds the protocol-default dispatch registry.
pub fn defaults() -> Result<DispatchRegistry, Error> {
    RegistryBuilder::new()
        .register_all([
            Arc::new(ActionsHandler) as _,
            Arc::new(OemActionsHandler) as _,
            Arc::new(service::ServiceRootHandler) as _,
            Arc::new(service::AccountServiceHandler) as _,
            Arc::new(service::CertificateServiceHandler) as _,
            Arc::new(service::ChassisHandler) as _,
            Arc::new(service::EventServiceHandler) as _,
            Arc::new(service::JobServiceHandler) as _,
            Arc::new(service::ManagerHandler) as _,
            Arc::new(service::SessionServiceHandler) as _,
            Arc::new(service::SystemHandler) as _,
            Arc::new(service::TaskServiceHandler) as _,
            Arc::new(service::TelemetryServiceHandler) as _,
            Arc::new(service::UpdateServiceHandler) as _,
            Arc::new(settings::BiosHandler) as _,
            Arc::new(collections::AccountCollectionHandler) as _,
            Arc::new(collections::ChassisCollectionHandler) as _,
            Arc::new(collections::JobCollectionHandler) as _,
            Arc::new(collections::ManagerCollectionHandler) as _,
            Arc::new(collections::SessionCollectionHandler) as _,
            Arc::new(collections::SystemsCollectionHandler) as _,
            Arc::new(collections::TaskCollectionHandler) as _,
        ])
        .build()
}
