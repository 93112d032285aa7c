//! # Redfish Client
//!
//! A navigational client for Redfish-style device-management services:
//! strongly typed hypermedia resources, extensible by vendors, with
//! long-running server-side jobs that need driving to completion.
//!
//! ## Architecture Overview
//!
//! The crate separates concerns into three layers:
//!
//! 1. **Dispatch Layer** ([`registry`], [`odata`], [`routes`]) — decides
//!    which [`Handler`](registry::Handler) owns a value, by `(type key,
//!    relative path)` or by URL route. A vendor registry layers over the
//!    protocol defaults and always wins for an identical key.
//! 2. **Navigation Layer** ([`resource`], [`collection`], [`action`]) —
//!    lazy typed proxies over fetched payloads. Resolving a field yields an
//!    explicit [`Resolved`](resource::Resolved) union the caller pattern
//!    matches on; collections resolve members one at a time in service
//!    order; actions bind their target through the route table before they
//!    are invoked.
//! 3. **Monitoring Layer** ([`monitor`]) — an explicit state machine that
//!    polls a job collection to completion, recovering from stalls with a
//!    power cycle and bounding everything with one shared deadline.
//!
//! ## Why Two Dispatch Keys?
//!
//! Resources declare a type annotation, but embedded sub-objects often
//! omit theirs; those dispatch under the *owning* resource's type plus a
//! relative path. Independently, vendor packages claim whole URL subtrees
//! (their OEM extensions live on routes the standard never names). The
//! registry supports both, and a fetch cross-checks them: when type-based
//! and route-based resolution disagree, the fetch fails loudly instead of
//! guessing.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use redfish_client::client::Client;
//! use redfish_client::entities::{self, ServiceRoot};
//! use redfish_client::mock::MockTransport;
//! use redfish_client::registry::CompositeDispatch;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), redfish_client::error::Error> {
//! let transport = Arc::new(MockTransport::new());
//! transport.serve("/redfish/v1", serde_json::json!({
//!     "@odata.id": "/redfish/v1",
//!     "@odata.type": "#ServiceRoot.v1_11_0.ServiceRoot"
//! }));
//!
//! let dispatch = CompositeDispatch::defaults_only(entities::defaults()?);
//! let client = Client::new(transport, dispatch);
//! let root = ServiceRoot::fetch(&client).await?;
//! # let _ = root;
//! # Ok(())
//! # }
//! ```
//!
//! A production deployment swaps [`mock::MockTransport`] for an HTTP-backed
//! [`transport::Transport`] implementation and layers a vendor registry
//! (e.g. the `redfish-oem-dell` crate) over the defaults with
//! [`registry::CompositeDispatch::new`].
//!
//! ## Testing
//!
//! [`mock::MockTransport`] scripts payloads per identifier, records every
//! request, and injects transient failures — see the [`mock`] module for
//! the scripting API.

pub mod action;
pub mod client;
pub mod collection;
pub mod entities;
pub mod error;
pub mod mock;
pub mod monitor;
pub mod odata;
pub mod registry;
pub mod resource;
pub mod routes;
pub mod tracing;
pub mod transport;

// Re-export core types for convenience
pub use action::{Action, ActionSet};
pub use client::Client;
pub use collection::{Collection, FaultPolicy, ResourceKind};
pub use error::{Error, TimeoutScope};
pub use monitor::{JobMonitor, JobRecord, MonitorConfig, MonitorOutcome, Recovery};
pub use odata::TypeKey;
pub use registry::{CompositeDispatch, DispatchRegistry, Handler, HandlerRef, RegistryBuilder};
pub use resource::{Resolved, ResourceProxy, ResourceRoot};
pub use transport::{Credential, ErrorEnvelope, Method, Transport};
