//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the retrieval service and the port interface it uses
//! to reach the upstream catalog.

/// Port interfaces for external systems.
pub mod ports;

/// Application services.
pub mod services;
