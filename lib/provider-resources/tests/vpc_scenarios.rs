mod common;

use common::{bare_id, Harness};
use provider_api::vpc::AclAction;
use provider_core::PlanAction;
use serde_json::json;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

const VPC: &str = "scaleway_vpc";
const PRIVATE_NETWORK: &str = "scaleway_vpc_private_network";
const ROUTE: &str = "scaleway_vpc_route";
const VPC_ACL: &str = "scaleway_vpc_acl";

#[tokio::test(start_paused = true)]
async fn test_private_network_in_vpc() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "main", "tags": ["prod"] })).await;
    assert_eq!(vpc.value("enable_routing").as_bool(), Some(false));

    let pn = h
        .create(
            PRIVATE_NETWORK,
            json!({
                "name": "backend",
                "vpc_id": vpc.value("id").as_str().expect("id"),
                "ipv4_subnet": [{ "subnet": "192.168.0.0/24" }],
                "ipv6_subnets": [{ "subnet": "fd00:1::/64" }]
            }),
        )
        .await;

    assert_eq!(pn.value("vpc_id"), vpc.value("id"));
    let ipv4 = pn.value("ipv4_subnet").as_items().expect("ipv4")[0]
        .as_block()
        .expect("ipv4 block")
        .clone();
    assert_eq!(ipv4.value("subnet").as_str(), Some("192.168.0.0/24"));
    assert_eq!(ipv4.value("address").as_str(), Some("192.168.0.0"));
    assert_eq!(ipv4.value("subnet_mask").as_str(), Some("255.255.255.0"));
    assert_eq!(ipv4.value("prefix_length").as_int(), Some(24));
    assert_eq!(pn.value("ipv6_subnets").as_items().map(|s| s.len()), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_ipv6_subnets_are_added_and_removed() {
    let h = Harness::new();
    let pn = h
        .create(
            PRIVATE_NETWORK,
            json!({ "name": "backend", "ipv6_subnets": [{ "subnet": "fd00:1::/64" }] }),
        )
        .await;

    let config = h.config(
        PRIVATE_NETWORK,
        json!({ "name": "backend", "ipv6_subnets": [{ "subnet": "fd00:2::/64" }] }),
    );
    let plan = h.plan(PRIVATE_NETWORK, Some(&pn), &config).await;
    assert_eq!(plan.action, PlanAction::Update);

    let result = h.converge(PRIVATE_NETWORK, Some(pn), &config).await;
    assert!(!result.has_errors(), "{:?}", result.diagnostics);

    assert_eq!(h.vpc.calls.matching("add_subnets"), vec!["add_subnets fd00:2::/64".to_string()]);
    assert_eq!(h.vpc.calls.matching("delete_subnets"), vec!["delete_subnets fd00:1::/64".to_string()]);
    let state = result.state.expect("state");
    let stored = h.vpc.private_network(&bare_id(&state)).expect("private network");
    assert!(stored.subnets.iter().any(|s| s.subnet == "fd00:2::/64"));
    assert!(!stored.subnets.iter().any(|s| s.subnet == "fd00:1::/64"));
}

#[tokio::test(start_paused = true)]
async fn test_private_network_delete_retries_while_busy() {
    let h = Harness::new();
    let pn = h.create(PRIVATE_NETWORK, json!({ "name": "attached" })).await;
    let id = bare_id(&pn);
    h.vpc.busy_deletes.store(2, Ordering::SeqCst);

    let result = h.destroy(PRIVATE_NETWORK, pn).await;

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    assert_eq!(h.vpc.calls.count("delete_private_network"), 3);
    assert!(h.vpc.private_network(&id).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_routing_cannot_be_disabled() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "routed", "enable_routing": true })).await;
    assert_eq!(vpc.value("enable_routing").as_bool(), Some(true));

    let config = h.config(VPC, json!({ "name": "routed", "enable_routing": false }));
    let plan = h.plan(VPC, Some(&vpc), &config).await;
    assert!(plan.diagnostics.has_errors());
}

#[tokio::test(start_paused = true)]
async fn test_enabling_routing_later() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "plain" })).await;

    let config = h.config(VPC, json!({ "name": "plain", "enable_routing": true }));
    let result = h.converge(VPC, Some(vpc), &config).await;

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    assert_eq!(h.vpc.calls.count("enable_routing"), 1);
    let vpc = result.state.expect("state");
    assert_eq!(vpc.value("enable_routing").as_bool(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn test_route_to_private_network() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "routed", "enable_routing": true })).await;
    let pn = h
        .create(
            PRIVATE_NETWORK,
            json!({ "name": "edge", "vpc_id": vpc.value("id").as_str().expect("id") }),
        )
        .await;

    let route = h
        .create(
            ROUTE,
            json!({
                "vpc_id": vpc.value("id").as_str().expect("id"),
                "destination": "10.10.0.0/16",
                "nexthop_private_network_id": pn.value("id").as_str().expect("id"),
                "description": "to the edge"
            }),
        )
        .await;

    assert_eq!(route.value("destination").as_str(), Some("10.10.0.0/16"));
    assert_eq!(route.value("nexthop_private_network_id"), pn.value("id"));

    let config = h.config(
        ROUTE,
        json!({
            "vpc_id": vpc.value("id").as_str().expect("id"),
            "destination": "10.10.0.0/16",
            "nexthop_private_network_id": pn.value("id").as_str().expect("id"),
            "description": "to the edge, renamed"
        }),
    );
    let result = h.converge(ROUTE, Some(route), &config).await;
    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    assert_eq!(h.vpc.calls.count("update_route"), 1);
    assert_eq!(
        result.state.expect("state").value("description").as_str(),
        Some("to the edge, renamed")
    );
}

#[tokio::test(start_paused = true)]
async fn test_vpc_acl_round_trip() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "filtered" })).await;
    let vpc_id = vpc.value("id").as_str().expect("id").to_string();

    let acl = h
        .create(
            VPC_ACL,
            json!({
                "vpc_id": vpc_id,
                "default_policy": "drop",
                "rules": [{
                    "protocol": "TCP",
                    "source": "10.0.0.0/8",
                    "src_port_low": 0,
                    "src_port_high": 0,
                    "destination": "0.0.0.0/0",
                    "dst_port_low": 443,
                    "dst_port_high": 443,
                    "action": "accept",
                    "description": "https out"
                }]
            }),
        )
        .await;
    assert_eq!(acl.value("id").as_str(), Some(vpc_id.as_str()));
    assert_eq!(acl.value("default_policy").as_str(), Some("drop"));

    let stored = h.vpc.acl(&bare_id(&vpc), false).expect("acl");
    assert_eq!(stored.default_policy, AclAction::Drop);
    assert_eq!(stored.rules.len(), 1);
    assert_eq!(stored.rules[0].dst_port_low, 443);

    let refreshed = h
        .registry
        .read(VPC_ACL, acl.clone(), CancellationToken::new())
        .await
        .expect("read")
        .state
        .expect("state");
    let config = h.config(
        VPC_ACL,
        json!({
            "vpc_id": vpc_id,
            "default_policy": "drop",
            "rules": [{
                "protocol": "TCP",
                "source": "10.0.0.0/8",
                "destination": "0.0.0.0/0",
                "dst_port_low": 443,
                "dst_port_high": 443,
                "action": "accept",
                "description": "https out"
            }]
        }),
    );
    let plan = h.plan(VPC_ACL, Some(&refreshed), &config).await;
    assert_eq!(plan.action, PlanAction::NoOp, "{:?}", plan.changes);

    let deleted = h.destroy(VPC_ACL, refreshed).await;
    assert!(!deleted.has_errors());
    let cleared = h.vpc.acl(&bare_id(&vpc), false).expect("acl");
    assert!(cleared.rules.is_empty());
    assert_eq!(cleared.default_policy, AclAction::Accept);
}

#[tokio::test(start_paused = true)]
async fn test_acl_port_range_must_be_ordered() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "filtered" })).await;

    let config = h.config(
        VPC_ACL,
        json!({
            "vpc_id": vpc.value("id").as_str().expect("id"),
            "default_policy": "accept",
            "rules": [{
                "source": "0.0.0.0/0",
                "destination": "0.0.0.0/0",
                "dst_port_low": 8080,
                "dst_port_high": 80,
                "action": "drop"
            }]
        }),
    );
    let plan = h.plan(VPC_ACL, None, &config).await;
    assert!(plan.diagnostics.has_errors());
}

#[tokio::test(start_paused = true)]
async fn test_private_network_data_source_by_vpc() {
    let h = Harness::new();
    let vpc = h.create(VPC, json!({ "name": "main" })).await;
    let pn = h
        .create(
            PRIVATE_NETWORK,
            json!({ "name": "backend", "vpc_id": vpc.value("id").as_str().expect("id") }),
        )
        .await;

    let schema = h.registry.data_source_schema(PRIVATE_NETWORK).expect("schema");
    let config = schema
        .decode(&json!({ "name": "backend", "vpc_id": vpc.value("id").as_str().expect("id") }))
        .expect("config");
    let result = h
        .registry
        .read_data_source(PRIVATE_NETWORK, config, CancellationToken::new())
        .await
        .expect("read");

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    assert_eq!(result.state.expect("state").value("id"), pn.value("id"));
}
