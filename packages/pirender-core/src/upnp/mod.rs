//! UPnP protocol layer of the renderer.
//!
//! # Module Structure
//!
//! - `services` - UPnP service definitions (URNs, paths)
//! - `soap` - SOAP envelope parsing and response/fault serialization
//! - `ssdp` - Multicast discovery: search replies and presence announcements
//! - `description` - Device description and SCPD documents
//! - `timecode` - `H:MM:SS` conversion used by AVTransport
//! - `utils` - Shared XML helpers

pub mod description;
pub mod services;
pub mod soap;
pub mod ssdp;
pub mod timecode;
pub(crate) mod utils;

pub use services::UpnpService;
pub use ssdp::{DiscoveryEngine, SsdpConfig};
