//! Property-based tests for the resource engine using proptest.
//!
//! Random VLAN and access-list configurations check that:
//! - diffing facts against themselves plans nothing
//! - rendered commands parse back into the configuration they came from
//! - the order of desired entities does not change the resulting commands
//! - `overridden` removes exactly the entities that are not wanted

mod common;

use common::resource;
use proptest::collection::{btree_map, btree_set};
use proptest::prelude::*;
use rustible_ios::modules::network::{ios_acls, ios_vlans};
use rustible_ios::resource::{diff, render, Change, Grammar, NaturalKey, Policy, Tree};
use serde_json::{json, Value};
use std::collections::BTreeSet;

// ============================================================================
// Strategies
// ============================================================================

fn vlan_name() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").unwrap()
}

/// A list of VLANs with unique ids
fn vlans() -> impl Strategy<Value = Vec<Value>> {
    btree_map(
        1u32..4095,
        (
            prop::option::of(vlan_name()),
            prop::option::of(1500u32..9217),
            any::<bool>(),
        ),
        0..8,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(id, (name, mtu, shutdown))| {
                let mut vlan = json!({"vlan_id": id});
                if let Some(name) = name {
                    vlan["name"] = json!(name);
                }
                if let Some(mtu) = mtu {
                    vlan["mtu"] = json!(mtu);
                }
                if shutdown {
                    vlan["shutdown"] = json!(true);
                }
                vlan
            })
            .collect()
    })
}

fn endpoint() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"any": true})),
        (1u8..255).prop_map(|octet| json!({"host": format!("192.0.2.{octet}")})),
        (0u8..255).prop_map(|octet| json!({
            "address": format!("198.51.{octet}.0"),
            "wildcard_bits": "0.0.0.255"
        })),
    ]
}

fn ace() -> impl Strategy<Value = Value> {
    (
        prop_oneof![Just("permit"), Just("deny")],
        prop_oneof![Just("ip"), Just("tcp"), Just("udp")],
        endpoint(),
        endpoint(),
        any::<bool>(),
    )
        .prop_map(|(grant, protocol, source, destination, log)| {
            let mut ace = json!({
                "grant": grant,
                "protocol": protocol,
                "source": source,
                "destination": destination
            });
            if log {
                ace["log"] = json!(true);
            }
            ace
        })
}

/// Numbered extended ACLs with sequenced entries
fn acls() -> impl Strategy<Value = Value> {
    btree_map(100u32..200, btree_map(1u32..50, ace(), 1..5), 1..4).prop_map(|lists| {
        let acls: Vec<Value> = lists
            .into_iter()
            .map(|(number, entries)| {
                let aces: Vec<Value> = entries
                    .into_iter()
                    .map(|(step, mut ace)| {
                        ace["sequence"] = json!(step * 10);
                        ace
                    })
                    .collect();
                json!({"name": number.to_string(), "aces": aces})
            })
            .collect();
        json!([{"afi": "ipv4", "acls": acls}])
    })
}

// ============================================================================
// Helpers
// ============================================================================

fn desired(grammar: &'static Grammar, config: Value) -> Tree {
    resource(grammar).desired(Some(&config)).unwrap().unwrap()
}

fn commands(grammar: &'static Grammar, have: &Tree, want: &Tree, policy: Policy) -> Vec<String> {
    match diff(have, Some(want), &grammar.root, policy).unwrap() {
        Some(plan) => render(grammar, &plan).unwrap(),
        None => Vec::new(),
    }
}

fn vlan_ids(config: &[Value]) -> BTreeSet<u64> {
    config
        .iter()
        .filter_map(|vlan| vlan["vlan_id"].as_u64())
        .collect()
}

/// VLAN ids the plan removes at the top level
fn removed_vlans(have: &Tree, want: &Tree, policy: Policy) -> BTreeSet<u64> {
    let Some(plan) = diff(have, Some(want), &ios_vlans::GRAMMAR.root, policy).unwrap() else {
        return BTreeSet::new();
    };
    let Change::Patch { children, .. } = &plan.change else {
        panic!("root entity is never recreated");
    };
    children
        .get("config")
        .map(|plan| {
            plan.to_remove
                .iter()
                .filter_map(|vlan| vlan.get("vlan_id").and_then(Value::as_u64))
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_vlans_idempotent(config in vlans()) {
        let have = desired(&ios_vlans::GRAMMAR, Value::Array(config));
        for policy in [Policy::Merge, Policy::Replace, Policy::Override] {
            let plan = diff(&have, Some(&have), &ios_vlans::GRAMMAR.root, policy).unwrap();
            prop_assert!(plan.is_none(), "{:?} planned {:?}", policy, plan);
        }
    }

    #[test]
    fn prop_acls_idempotent(config in acls()) {
        let have = desired(&ios_acls::GRAMMAR, config);
        for policy in [Policy::Merge, Policy::Replace, Policy::Override] {
            prop_assert!(diff(&have, Some(&have), &ios_acls::GRAMMAR.root, policy).unwrap().is_none());
        }
    }

    #[test]
    fn prop_vlans_round_trip(config in vlans()) {
        let module = resource(&ios_vlans::GRAMMAR);
        let want = desired(&ios_vlans::GRAMMAR, Value::Array(config));
        let text = module.render_config(&want).unwrap().join("\n");
        let facts = module.parse_facts(&text).unwrap();

        prop_assert!(diff(&facts, Some(&want), &ios_vlans::GRAMMAR.root, Policy::Merge).unwrap().is_none());
        prop_assert_eq!(facts, want);
    }

    #[test]
    fn prop_acls_round_trip(config in acls()) {
        let module = resource(&ios_acls::GRAMMAR);
        let want = desired(&ios_acls::GRAMMAR, config);
        let text = module.render_config(&want).unwrap().join("\n");
        let facts = module.parse_facts(&text).unwrap();

        prop_assert!(diff(&facts, Some(&want), &ios_acls::GRAMMAR.root, Policy::Merge).unwrap().is_none());
    }

    #[test]
    fn prop_key_order_does_not_change_commands(have in vlans(), want in vlans()) {
        let have = desired(&ios_vlans::GRAMMAR, Value::Array(have));
        let reversed: Vec<Value> = want.iter().rev().cloned().collect();
        let forward = desired(&ios_vlans::GRAMMAR, Value::Array(want));
        let backward = desired(&ios_vlans::GRAMMAR, Value::Array(reversed));

        for policy in [Policy::Merge, Policy::Replace, Policy::Override, Policy::Delete] {
            let mut a = commands(&ios_vlans::GRAMMAR, &have, &forward, policy);
            let mut b = commands(&ios_vlans::GRAMMAR, &have, &backward, policy);
            a.sort();
            b.sort();
            prop_assert_eq!(a, b);
        }
    }

    #[test]
    fn prop_overridden_removes_unwanted_keys(have in vlans(), want in vlans()) {
        let expected: BTreeSet<u64> = vlan_ids(&have).difference(&vlan_ids(&want)).copied().collect();
        let kept: BTreeSet<u64> = vlan_ids(&have).intersection(&vlan_ids(&want)).copied().collect();
        let have = desired(&ios_vlans::GRAMMAR, Value::Array(have));
        let want = desired(&ios_vlans::GRAMMAR, Value::Array(want));

        prop_assert_eq!(removed_vlans(&have, &want, Policy::Override), expected);
        prop_assert!(removed_vlans(&have, &want, Policy::Replace).is_subset(&kept));
    }

    #[test]
    fn prop_acl_reordered_entries_plan_the_same(config in acls()) {
        let want = desired(&ios_acls::GRAMMAR, config.clone());
        let mut reversed = config;
        if let Some(acls) = reversed[0]["acls"].as_array_mut() {
            acls.reverse();
            for acl in acls.iter_mut() {
                if let Some(aces) = acl["aces"].as_array_mut() {
                    aces.reverse();
                }
            }
        }
        let reversed = desired(&ios_acls::GRAMMAR, reversed);

        // Entries already present in either order: nothing to do.
        prop_assert!(diff(&want, Some(&reversed), &ios_acls::GRAMMAR.root, Policy::Override).unwrap().is_none());

        let mut a = commands(&ios_acls::GRAMMAR, &Tree::new(), &want, Policy::Merge);
        let mut b = commands(&ios_acls::GRAMMAR, &Tree::new(), &reversed, Policy::Merge);
        a.sort();
        b.sort();
        prop_assert_eq!(a, b);
    }
}

#[test]
fn test_natural_key_ignores_field_order() {
    let a = json!({"vlan_id": 10, "name": "a"});
    let b = json!({"name": "a", "vlan_id": 10});
    assert_eq!(
        NaturalKey::of(a.as_object().unwrap(), &["vlan_id"]),
        NaturalKey::of(b.as_object().unwrap(), &["vlan_id"])
    );
}
