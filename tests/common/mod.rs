//! Shared test utilities and fixtures for the rustible-ios test suite.
//!
//! This module provides:
//! - Device snapshots used across the resource tests
//! - Parameter builders for module runs
//! - A runner that executes a module against an offline device
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use rustible_ios::connection::{Connection, OfflineDevice};
use rustible_ios::modules::network::ResourceModule;
use rustible_ios::modules::{
    Module, ModuleContext, ModuleOutput, ModuleParams, ModuleRegistry, ModuleResult,
};
use serde_json::Value;

// ============================================================================
// Fixtures
// ============================================================================

/// Two IPv4 ACLs and one IPv6 ACL
pub const ACLS_RUNNING: &str = "\
ip access-list standard test_acl
 10 deny 192.0.2.0 0.0.0.255
ip access-list extended 110
 10 deny icmp 192.0.2.0 0.0.0.255 192.0.3.0 0.0.0.255 echo dscp ef ttl eq 10
 20 deny tcp host 198.51.100.1 host 198.51.101.1 eq telnet ack
 30 permit ip any any
ipv6 access-list R1_TRAFFIC
 deny tcp any eq www any eq telnet ack dscp af11 sequence 10
";

/// HSRP group 10 fully configured on Vlan70
pub const HSRP_RUNNING: &str = "\
interface GigabitEthernet0/1
 description uplink
interface Vlan70
 standby version 2
 standby 10 ip 10.0.10.1
 standby 10 ip 10.0.10.2 secondary
 standby 10 timers msec 250 msec 750
 standby 10 priority 110
 standby 10 preempt delay minimum 100 reload 50
 standby 10 authentication md5 key-chain HSRP_KEYS
 standby 10 name GRP10
 standby 10 track 1 decrement 20
";

/// Facts equivalent to [`HSRP_RUNNING`]
pub fn hsrp_facts() -> Value {
    serde_json::json!([{
        "name": "Vlan70",
        "version": 2,
        "standby_groups": [{
            "group_no": 10,
            "ip": [
                {"virtual_ip": "10.0.10.1"},
                {"virtual_ip": "10.0.10.2", "secondary": true}
            ],
            "timers": {"hello_interval": 250, "hold_time": 750, "msec": true},
            "priority": 110,
            "preempt": {"enabled": true, "minimum": 100, "reload": 50},
            "authentication": {"key_chain": "HSRP_KEYS"},
            "name": "GRP10",
            "track": [{"track_no": 1, "decrement": 20}]
        }]
    }])
}

// ============================================================================
// Builders
// ============================================================================

/// Parameters for `state` with an optional `config`
pub fn params(state: &str, config: Option<Value>) -> ModuleParams {
    let mut params = ModuleParams::new();
    params.insert("state".to_string(), Value::String(state.to_string()));
    if let Some(config) = config {
        params.insert("config".to_string(), config);
    }
    params
}

/// Look up a built-in module
pub fn module(name: &str) -> Arc<dyn Module> {
    ModuleRegistry::with_builtins()
        .get(name)
        .unwrap_or_else(|| panic!("module {name} is not registered"))
}

/// The built-in resource module for `grammar`
pub fn resource(grammar: &'static rustible_ios::resource::Grammar) -> ResourceModule {
    ResourceModule::new(grammar, "test")
}

/// Outcome of one module run against an offline device
pub struct Run {
    pub result: ModuleResult<ModuleOutput>,
    pub device: Arc<OfflineDevice>,
}

impl Run {
    pub fn output(&self) -> &ModuleOutput {
        match &self.result {
            Ok(output) => output,
            Err(e) => panic!("module failed: {e}"),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.output().commands()
    }
}

/// Run `name` against a device serving `running`.
pub fn run_against(name: &str, running: &str, params: &ModuleParams, check_mode: bool) -> Run {
    run_on(name, OfflineDevice::new("r1", running), params, check_mode)
}

/// Run `name` against a prepared device.
pub fn run_on(name: &str, device: OfflineDevice, params: &ModuleParams, check_mode: bool) -> Run {
    let device = Arc::new(device);
    let connection: Arc<dyn Connection> = device.clone();
    let context = ModuleContext::new()
        .with_check_mode(check_mode)
        .with_connection(connection);
    let result = module(name).execute(params, &context);
    Run { result, device }
}
