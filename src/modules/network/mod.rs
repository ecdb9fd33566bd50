//! Network Resource Modules
//!
//! Declarative resource modules for Cisco IOS devices. Each module describes
//! one slice of the device configuration as structured data and converges
//! the device onto it:
//!
//! - `merged`: add or update what is given, never remove
//! - `replaced`: the given entities replace their existing counterparts
//! - `overridden`: the given configuration becomes the whole configuration
//! - `deleted`: remove what is given, or everything when nothing is
//! - `gathered`: read and parse the device configuration
//! - `parsed`: parse `running_config` text without a device
//! - `rendered`: produce commands for `config` without a device
//!
//! All modules share one engine (see [`crate::resource`]); a module only
//! contributes its grammar and typed model.
//!
//! # Supported Resources
//!
//! - `ios_acls`: IPv4 and IPv6 access lists
//! - `ios_route_maps`: route maps with match and set clauses
//! - `ios_hsrp_interfaces`: HSRP standby groups per interface
//! - `ios_vlans`: VLAN definitions
//! - `ios_l2_interfaces`: switchport settings
//! - `ios_snmp_server`: global SNMP configuration
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +-----------+     +--------+     +----------+
//! |  ResourceModule  |---->|  Parser   |---->| Differ |---->| Renderer |
//! |  (grammar+model) |     | (facts)   |     | (plan) |     | (cmds)   |
//! +------------------+     +-----------+     +--------+     +----------+
//!          |                                                      |
//!          v                                                      v
//!   +-------------+                                      +-----------------+
//!   | Connection  |<-------------------------------------| send_commands   |
//!   +-------------+                                      +-----------------+
//! ```

pub mod common;
pub mod ios_acls;
pub mod ios_hsrp_interfaces;
pub mod ios_l2_interfaces;
pub mod ios_route_maps;
pub mod ios_snmp_server;
pub mod ios_vlans;
pub mod resource;

// Re-export main types for convenience
pub use common::{ResourceParams, ResourceState};
pub use resource::ResourceModule;

use crate::modules::ModuleRegistry;
use std::sync::Arc;

/// Register all network modules with the registry
pub fn register_network_modules(registry: &mut ModuleRegistry) {
    registry.register(Arc::new(ResourceModule::new(
        &ios_acls::GRAMMAR,
        "Manage IPv4 and IPv6 access lists on Cisco IOS",
    )));
    registry.register(Arc::new(ResourceModule::new(
        &ios_route_maps::GRAMMAR,
        "Manage route maps on Cisco IOS",
    )));
    registry.register(Arc::new(ResourceModule::new(
        &ios_hsrp_interfaces::GRAMMAR,
        "Manage HSRP standby groups on Cisco IOS interfaces",
    )));
    registry.register(Arc::new(ResourceModule::new(
        &ios_vlans::GRAMMAR,
        "Manage VLANs on Cisco IOS",
    )));
    registry.register(Arc::new(ResourceModule::new(
        &ios_l2_interfaces::GRAMMAR,
        "Manage switchport settings on Cisco IOS interfaces",
    )));
    registry.register(Arc::new(ResourceModule::new(
        &ios_snmp_server::GRAMMAR,
        "Manage the SNMP server on Cisco IOS",
    )));
}

/// Get a list of all available network module names
pub fn network_module_names() -> Vec<&'static str> {
    vec![
        "ios_acls",
        "ios_hsrp_interfaces",
        "ios_l2_interfaces",
        "ios_route_maps",
        "ios_snmp_server",
        "ios_vlans",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_names() {
        let names = network_module_names();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"ios_acls"));
    }

    #[test]
    fn test_every_name_is_registered() {
        let mut registry = ModuleRegistry::new();
        register_network_modules(&mut registry);
        for name in network_module_names() {
            let module = registry.get(name).unwrap();
            assert_eq!(module.name(), name);
            assert!(!module.description().is_empty());
        }
    }

    #[test]
    fn test_grammars_parse_their_own_rendering() {
        // A rendered configuration read back yields the same facts.
        let cases = [
            (
                &*ios_vlans::GRAMMAR,
                serde_json::json!([{"vlan_id": 10, "name": "ten", "member": {"vni": 5010}}]),
            ),
            (
                &*ios_l2_interfaces::GRAMMAR,
                serde_json::json!([{"name": "Gi0/1", "mode": "trunk",
                    "trunk": {"allowed_vlans": ["10-20", "30"], "native_vlan": 5}}]),
            ),
        ];
        for (grammar, config) in cases {
            let module = ResourceModule::new(grammar, "test");
            let want = module.desired(Some(&config)).unwrap().unwrap();
            let text = module.render_config(&want).unwrap().join("\n");
            assert_eq!(module.parse_facts(&text).unwrap(), want, "{}", grammar.name);
        }
    }
}
