//! # Rustible IOS - Declarative Cisco IOS resource modules
//!
//! Each resource module owns one slice of a device's running configuration
//! (access lists, route maps, VLANs, ...). It reads that slice into
//! structured facts, compares the facts with a desired configuration under
//! a state policy, and emits the smallest ordered list of IOS commands that
//! converges the device.
//!
//! ## Core Concepts
//!
//! - **Facts**: the structured form of configuration text, one tree per resource
//! - **Grammar**: the per-resource tables that parse facts and render commands
//! - **State**: how desired configuration is combined with the device (`merged`,
//!   `replaced`, `overridden`, `deleted`) or used offline (`gathered`, `parsed`,
//!   `rendered`)
//! - **Connections**: the transport that reads configuration and sends commands
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        CLI Interface                          │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │              Module Registry / Resource Modules               │
//! └──────────────────────────────────────────────────────────────┘
//!                               │
//!          ┌────────────────────┼────────────────────┐
//!          ▼                    ▼                    ▼
//! ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐
//! │ Tokenizer and   │  │     Differ      │  │    Renderer     │
//! │ Parser (facts)  │  │  (diff plan)    │  │   (commands)    │
//! └─────────────────┘  └─────────────────┘  └─────────────────┘
//!                               │
//!                               ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Connection (device)                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use rustible_ios::prelude::*;
//! use serde_json::json;
//!
//! let registry = ModuleRegistry::with_builtins();
//! let module = registry.get("ios_vlans").unwrap();
//!
//! let mut params = ModuleParams::new();
//! params.insert("state".into(), json!("rendered"));
//! params.insert("config".into(), json!([{"vlan_id": 10, "name": "users"}]));
//!
//! let output = module.execute(&params, &ModuleContext::new()).unwrap();
//! assert_eq!(output.data["rendered"], json!(["vlan 10", "name users"]));
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::connection::{Connection, ConnectionError, ConnectionResult, OfflineDevice};
    pub use crate::error::{Error, Result};
    pub use crate::modules::network::{ResourceModule, ResourceParams, ResourceState};
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleResult,
    };
    pub use crate::resource::{diff, render, Grammar, Policy, Tree};
}

/// Error types and result aliases.
///
/// The crate-level [`Error`](error::Error) wraps module and connection
/// failures and maps each of them to a process exit code.
pub mod error;

/// Layered configuration: built-in defaults, config files and environment.
pub mod config;

/// Device transports.
pub mod connection;

/// Module trait, registry and the network resource modules.
pub mod modules;

/// The generic engine behind every resource module.
pub mod resource;

pub use error::{Error, Result};

/// Returns the current version of the crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
