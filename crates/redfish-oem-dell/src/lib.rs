//! # Dell iDRAC Vendor Package
//!
//! Dell's OEM extensions to the standard device-management protocol: the
//! handler set that shadows protocol-default dispatch for Dell-specific
//! routes and sub-objects, plus the payload shaping Dell's configuration
//! actions expect.
//!
//! Layer [`dell_registry`] over the protocol defaults:
//!
//! ```rust
//! use redfish_client::registry::CompositeDispatch;
//!
//! # fn main() -> Result<(), redfish_client::Error> {
//! let dispatch = CompositeDispatch::new(
//!     redfish_oem_dell::dell_registry()?,
//!     redfish_client::entities::defaults()?,
//! );
//! # let _ = dispatch;
//! # Ok(())
//! # }
//! ```
//!
//! A Dell entry for a key always hides the default entry for that same
//! key; everything else still dispatches to the defaults.

pub mod oem;

pub use oem::{dell_registry, DellAttributes};
