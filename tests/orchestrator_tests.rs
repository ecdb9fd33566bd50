//! Resource module orchestration tests
//!
//! Covers the behavior shared by every resource module:
//! - Validation happens before the device is contacted or changed
//! - Offline states (rendered, parsed) never touch the device
//! - Check mode computes commands without sending them
//! - Transport failures surface as module errors
//! - `after` is the device facts with the plan applied

mod common;

use common::*;
use pretty_assertions::assert_eq;
use rustible_ios::connection::OfflineDevice;
use rustible_ios::modules::network::ResourceState;
use rustible_ios::modules::{Module, ModuleContext, ModuleError};
use serde_json::json;

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_invalid_config_sends_nothing() {
    let config = json!([{"vlan_id": 5000, "name": "too_high"}]);
    let run = run_against("ios_vlans", "vlan 10\n", &params("merged", Some(config)), false);

    assert!(matches!(run.result, Err(ModuleError::InvalidParameter(_))));
    assert_eq!(run.device.send_count(), 0);
    assert!(run.device.queries().is_empty());
}

#[test]
fn test_unknown_field_sends_nothing() {
    let config = json!([{"name": "Vlan70", "standby": 10}]);
    let run = run_against(
        "ios_hsrp_interfaces",
        HSRP_RUNNING,
        &params("replaced", Some(config)),
        false,
    );
    assert!(run.result.is_err());
    assert_eq!(run.device.send_count(), 0);
}

#[test]
fn test_missing_config_is_rejected() {
    for state in ["merged", "replaced", "overridden", "rendered"] {
        let run = run_against("ios_acls", ACLS_RUNNING, &params(state, None), false);
        assert!(
            matches!(run.result, Err(ModuleError::MissingParameter(_))),
            "state {state}"
        );
        assert_eq!(run.device.send_count(), 0);
    }
}

#[test]
fn test_running_config_only_with_parsed() {
    let mut params = params("merged", None);
    params.insert("running_config".to_string(), json!("vlan 10\n"));
    let run = run_against("ios_vlans", "", &params, false);
    assert!(matches!(run.result, Err(ModuleError::InvalidParameter(_))));
}

#[test]
fn test_unknown_state_is_rejected() {
    let module = module("ios_vlans");
    let err = module
        .validate_params(&params("purged", Some(json!([]))))
        .unwrap_err();
    assert!(err.to_string().contains("Invalid state 'purged'"));
}

#[test]
fn test_policy_violation_sends_nothing() {
    let config = json!([{"afi": "ipv4", "acls": [{"name": "test_acl", "acl_type": "extended"}]}]);
    let run = run_against("ios_acls", ACLS_RUNNING, &params("merged", Some(config)), false);

    assert!(matches!(run.result, Err(ModuleError::PolicyViolation(_))));
    assert_eq!(run.device.send_count(), 0);
}

// ============================================================================
// Offline states
// ============================================================================

#[test]
fn test_rendered_needs_no_device() {
    let module = module("ios_vlans");
    let output = module
        .execute(
            &params("rendered", Some(json!([{"vlan_id": 10, "name": "users"}]))),
            &ModuleContext::new(),
        )
        .unwrap();

    assert!(!output.changed);
    assert_eq!(output.data["rendered"], json!(["vlan 10", "name users"]));
    assert!(output.data.get("commands").is_none());
}

#[test]
fn test_parsed_needs_no_device() {
    let module = module("ios_route_maps");
    let mut params = params("parsed", None);
    params.insert(
        "running_config".to_string(),
        json!("route-map rm permit 10\n set tag 5\n"),
    );
    let output = module.execute(&params, &ModuleContext::new()).unwrap();

    assert_eq!(
        output.data["parsed"],
        json!([{"route_map": "rm", "entries": [
            {"action": "permit", "sequence": 10, "set": {"tag": 5}}
        ]}])
    );
}

#[test]
fn test_rendered_and_parsed_leave_device_alone() {
    let rendered = run_against(
        "ios_vlans",
        "vlan 10\n",
        &params("rendered", Some(json!([{"vlan_id": 20}]))),
        false,
    );
    assert!(rendered.result.is_ok());
    assert!(rendered.device.queries().is_empty());
    assert_eq!(rendered.device.send_count(), 0);

    let mut parsed = params("parsed", None);
    parsed.insert("running_config".to_string(), json!("vlan 30\n"));
    let parsed = run_against("ios_vlans", "vlan 10\n", &parsed, false);
    assert_eq!(parsed.output().data["parsed"], json!([{"vlan_id": 30}]));
    assert!(parsed.device.queries().is_empty());
}

#[test]
fn test_gathered_reads_with_show_command() {
    let run = run_against("ios_vlans", "vlan 10\n name ten\n", &params("gathered", None), false);

    assert_eq!(
        run.output().data["gathered"],
        json!([{"vlan_id": 10, "name": "ten"}])
    );
    assert_eq!(
        run.device.queries(),
        vec!["show running-config | section ^vlan".to_string()]
    );
    assert_eq!(run.device.send_count(), 0);
}

#[test]
fn test_mutating_state_without_device_fails() {
    let module = module("ios_vlans");
    let err = module
        .execute(
            &params("merged", Some(json!([{"vlan_id": 10}]))),
            &ModuleContext::new(),
        )
        .unwrap_err();
    assert!(matches!(err, ModuleError::Transport(_)));
}

// ============================================================================
// Check mode and transport
// ============================================================================

#[test]
fn test_check_mode_computes_without_sending() {
    let run = run_against(
        "ios_vlans",
        "vlan 10\n",
        &params("merged", Some(json!([{"vlan_id": 10, "name": "ten"}]))),
        true,
    );

    assert!(run.output().changed);
    assert_eq!(run.commands(), vec!["vlan 10", "name ten"]);
    assert_eq!(run.device.send_count(), 0);
}

#[test]
fn test_check_through_module_trait() {
    let device = std::sync::Arc::new(OfflineDevice::new("r1", "vlan 10\n"));
    let context = ModuleContext::new().with_connection(device.clone());
    let output = module("ios_vlans")
        .check(&params("deleted", None), &context)
        .unwrap();

    assert_eq!(output.commands(), vec!["no vlan 10"]);
    assert_eq!(device.send_count(), 0);
}

#[test]
fn test_send_failure_is_propagated() {
    let device = OfflineDevice::new("r1", "").failing_send("% Invalid input detected");
    let run = run_on(
        "ios_vlans",
        device,
        &params("merged", Some(json!([{"vlan_id": 10}]))),
        false,
    );

    match &run.result {
        Err(ModuleError::Transport(e)) => assert!(e.to_string().contains("Invalid input")),
        other => panic!("expected a transport error, got {other:?}"),
    }
    assert_eq!(run.device.send_count(), 1);
}

#[test]
fn test_no_change_sends_nothing() {
    let run = run_against(
        "ios_vlans",
        "vlan 10\n name ten\n",
        &params("merged", Some(json!([{"vlan_id": 10, "name": "ten"}]))),
        false,
    );
    assert!(!run.output().changed);
    assert_eq!(run.output().msg, "Configuration already matches");
    assert_eq!(run.device.send_count(), 0);
}

// ============================================================================
// After projection
// ============================================================================

#[test]
fn test_after_reflects_plan() {
    let running = "vlan 10\n name ten\n mtu 1500\nvlan 20\n";
    let run = run_against(
        "ios_vlans",
        running,
        &params("replaced", Some(json!([{"vlan_id": 10, "name": "TEN"}]))),
        false,
    );

    assert_eq!(run.commands(), vec!["vlan 10", "no mtu", "name TEN"]);
    assert_eq!(
        run.output().data["after"],
        json!([{"vlan_id": 10, "name": "TEN"}, {"vlan_id": 20}])
    );
    // The device is read once; `after` is not re-queried.
    assert_eq!(run.device.queries().len(), 1);
}

#[test]
fn test_after_matches_reparsed_commands() {
    let module = resource(&rustible_ios::modules::network::ios_route_maps::GRAMMAR);
    let config = json!([{"route_map": "rm", "entries": [
        {"action": "permit", "sequence": 10, "match": {"tag": [30]}, "set": {"local_preference": 200}}
    ]}]);
    let run = run_against("ios_route_maps", "", &params("merged", Some(config)), false);

    let sent = run.device.sent().concat().join("\n");
    let reparsed = module.parse_facts(&sent).unwrap();
    assert_eq!(
        run.output().data["after"],
        module.grammar().unwrap(&reparsed)
    );
}

#[test]
fn test_diff_mode_reports_facts_diff() {
    let device = std::sync::Arc::new(OfflineDevice::new("r1", "vlan 10\n"));
    let context = ModuleContext::new()
        .with_diff_mode(true)
        .with_connection(device.clone());
    let output = module("ios_vlans")
        .execute(&params("merged", Some(json!([{"vlan_id": 20}]))), &context)
        .unwrap();

    let details = output.diff.and_then(|d| d.details).unwrap();
    assert!(details.contains("+- vlan_id: 20"), "{details}");
}

#[test]
fn test_every_state_parses() {
    for state in ResourceState::ALL {
        assert_eq!(state.as_str().parse::<ResourceState>().unwrap(), state);
    }
}
