mod common;

use common::{bare_id, Harness, MQTT_CA};
use provider_api::iot::HubStatus;
use provider_core::PlanAction;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const HUB: &str = "scaleway_iot_hub";
const DEVICE: &str = "scaleway_iot_device";
const NETWORK: &str = "scaleway_iot_network";
const ROUTE: &str = "scaleway_iot_route";

#[tokio::test(start_paused = true)]
async fn test_hub_created_disabled() {
    let h = Harness::new();

    let hub = h
        .create(HUB, json!({ "name": "quiet", "product_plan": "plan_shared", "enabled": false }))
        .await;

    assert_eq!(hub.value("status").as_str(), Some("disabled"));
    assert_eq!(hub.value("enabled").as_bool(), Some(false));
    assert_eq!(hub.value("events_topic_prefix").as_str(), Some("$SCW/events"));
    assert!(hub.value("mqtt_ca_url").is_zero());
    assert!(hub.value("mqtt_ca").is_zero());

    let calls = h.iot.calls.all();
    let created = calls.iter().position(|c| c.starts_with("create_hub")).expect("create_hub");
    let disabled = calls.iter().position(|c| c.starts_with("disable_hub")).expect("disable_hub");
    assert!(created < disabled);
    assert_eq!(h.iot.calls.count("get_mqtt_ca"), 0);

    let stored = h.iot.hub(&bare_id(&hub)).expect("hub");
    assert_eq!(stored.status, HubStatus::Disabled);
}

#[tokio::test(start_paused = true)]
async fn test_hub_enable_toggle() {
    let h = Harness::new();
    let hub = h
        .create(HUB, json!({ "name": "toggled", "product_plan": "plan_shared", "enabled": false }))
        .await;

    let config = h.config(HUB, json!({ "name": "toggled", "product_plan": "plan_shared", "enabled": true }));
    let plan = h.plan(HUB, Some(&hub), &config).await;
    assert_eq!(plan.action, PlanAction::Update);

    let result = h.converge(HUB, Some(hub), &config).await;
    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    let hub = result.state.expect("state");
    assert_eq!(hub.value("status").as_str(), Some("ready"));
    assert_eq!(hub.value("enabled").as_bool(), Some(true));
    assert_eq!(h.iot.calls.count("enable_hub"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_hub_stuck_disabled_fails_fast() {
    let h = Harness::new();
    let hub = h
        .create(HUB, json!({ "name": "stubborn", "product_plan": "plan_shared", "enabled": false }))
        .await;
    h.iot.ignore_enable.store(true, Ordering::SeqCst);

    let config = h.config(HUB, json!({ "name": "stubborn", "product_plan": "plan_shared", "enabled": true }));
    let started = tokio::time::Instant::now();
    let result = h.converge(HUB, Some(hub), &config).await;

    assert!(result.has_errors());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.detail.contains("settled in status disabled")));
    assert!(started.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_dedicated_hub_fetches_mqtt_ca() {
    let h = Harness::new();

    let hub = h
        .create(
            HUB,
            json!({ "name": "dedicated", "product_plan": "plan_dedicated", "device_auto_provisioning": true }),
        )
        .await;

    assert_eq!(
        hub.value("mqtt_ca_url").as_str(),
        Some("https://iot.s3.nl-ams.scw.cloud/certificates/fr-par/iot-hub-ca.pem")
    );
    assert_eq!(hub.value("mqtt_ca").as_str(), Some(MQTT_CA));
    assert_eq!(hub.value("device_auto_provisioning").as_bool(), Some(true));
    assert!(hub.value("device_autoprovisioning").is_null());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_mqtt_ca_is_a_warning() {
    let h = Harness::new();
    h.iot.mqtt_ca_unavailable.store(true, Ordering::SeqCst);

    let config = h.config(HUB, json!({ "name": "dedicated", "product_plan": "plan_ha" }));
    let result = h.converge(HUB, None, &config).await;

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    assert!(result.diagnostics.warnings().any(|d| d.summary.contains("MQTT CA")));
    let hub = result.state.expect("state");
    assert!(hub.value("mqtt_ca").is_zero());
}

#[tokio::test(start_paused = true)]
async fn test_deprecated_auto_provisioning_alias() {
    let h = Harness::new();

    let hub = h
        .create(
            HUB,
            json!({ "name": "legacy", "product_plan": "plan_shared", "device_autoprovisioning": true }),
        )
        .await;
    assert_eq!(hub.value("device_autoprovisioning").as_bool(), Some(true));
    assert_eq!(hub.value("device_auto_provisioning").as_bool(), Some(true));
    assert!(h.iot.hub(&bare_id(&hub)).expect("hub").enable_device_auto_provisioning);

    let both = h.config(
        HUB,
        json!({
            "name": "legacy",
            "product_plan": "plan_shared",
            "device_autoprovisioning": true,
            "device_auto_provisioning": true
        }),
    );
    let plan = h.plan(HUB, Some(&hub), &both).await;
    assert!(plan.diagnostics.has_errors());
}

#[tokio::test(start_paused = true)]
async fn test_hub_ca_needs_its_challenge() {
    let h = Harness::new();
    let config = h.config(
        HUB,
        json!({ "name": "custom", "product_plan": "plan_shared", "hub_ca": "-----BEGIN CERTIFICATE-----" }),
    );
    let plan = h.plan(HUB, None, &config).await;
    assert!(plan.diagnostics.has_errors());
}

#[tokio::test(start_paused = true)]
async fn test_failed_disable_keeps_partial_hub() {
    let h = Harness::new();
    h.iot.fail_disable.store(true, Ordering::SeqCst);

    let config = h.config(HUB, json!({ "name": "stuck", "product_plan": "plan_shared", "enabled": false }));
    let result = h.converge(HUB, None, &config).await;

    assert!(result.has_errors());
    let state = result.state.expect("partial state");
    let id = bare_id(&state);
    assert!(h.iot.hub(&id).is_some());
    assert_eq!(h.iot.calls.count("delete_hub"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hub_delete_removes_devices() {
    let h = Harness::new();
    let hub = h.create(HUB, json!({ "name": "doomed", "product_plan": "plan_shared" })).await;
    h.create(DEVICE, json!({ "hub_id": hub.value("id").as_str().expect("id"), "name": "sensor" }))
        .await;
    let hub_id = bare_id(&hub);

    let result = h.destroy(HUB, hub).await;

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    assert!(h.iot.hub(&hub_id).is_none());
    assert_eq!(
        h.iot.calls.matching("delete_hub"),
        vec![format!("delete_hub {hub_id} delete_devices=true")]
    );
}

#[tokio::test(start_paused = true)]
async fn test_device_key_survives_refresh() {
    let h = Harness::new();
    let hub = h.create(HUB, json!({ "name": "fleet", "product_plan": "plan_shared" })).await;

    let device = h
        .create(
            DEVICE,
            json!({
                "hub_id": bare_id(&hub),
                "name": "sensor",
                "message_filters": [{
                    "publish": [{ "policy": "reject", "topics": ["forbidden/#"] }]
                }]
            }),
        )
        .await;
    let id = bare_id(&device);
    let certificate = device.value("certificate").as_items().expect("certificate")[0]
        .as_block()
        .expect("certificate block")
        .clone();
    assert_eq!(certificate.value("crt").as_str(), Some(format!("generated-crt-{id}").as_str()));
    assert_eq!(certificate.value("key").as_str(), Some(format!("generated-key-{id}").as_str()));
    assert_eq!(device.value("hub_id"), hub.value("id"));

    let refreshed = h
        .registry
        .read(DEVICE, device, CancellationToken::new())
        .await
        .expect("read")
        .state
        .expect("state");
    let certificate = refreshed.value("certificate").as_items().expect("certificate")[0]
        .as_block()
        .expect("certificate block")
        .clone();
    assert_eq!(certificate.value("key").as_str(), Some(format!("generated-key-{id}").as_str()));

    let filters = refreshed.value("message_filters").as_items().expect("filters")[0]
        .as_block()
        .expect("filters block")
        .clone();
    let publish = filters.value("publish").as_items().expect("publish")[0]
        .as_block()
        .expect("publish block")
        .clone();
    assert_eq!(publish.value("policy").as_str(), Some("reject"));
}

#[tokio::test(start_paused = true)]
async fn test_device_custom_certificate_upload() {
    let h = Harness::new();
    let hub = h.create(HUB, json!({ "name": "fleet", "product_plan": "plan_shared" })).await;
    let device = h
        .create(DEVICE, json!({ "hub_id": hub.value("id").as_str().expect("id"), "name": "sensor" }))
        .await;

    let config = h.config(
        DEVICE,
        json!({
            "hub_id": hub.value("id").as_str().expect("id"),
            "name": "sensor",
            "certificate": [{ "crt": "-----BEGIN CERTIFICATE-----\nmine\n-----END CERTIFICATE-----" }]
        }),
    );
    let result = h.converge(DEVICE, Some(device), &config).await;

    assert!(!result.has_errors(), "{:?}", result.diagnostics);
    let device = result.state.expect("state");
    assert_eq!(h.iot.calls.count("set_device_certificate"), 1);
    assert_eq!(device.value("has_custom_certificate").as_bool(), Some(true));
    assert_eq!(
        h.iot.device_certificate(&bare_id(&device)).as_deref(),
        Some("-----BEGIN CERTIFICATE-----\nmine\n-----END CERTIFICATE-----")
    );
}

#[tokio::test(start_paused = true)]
async fn test_network_keeps_its_secret() {
    let h = Harness::new();
    let hub = h.create(HUB, json!({ "name": "fleet", "product_plan": "plan_shared" })).await;

    let network = h
        .create(
            NETWORK,
            json!({ "hub_id": hub.value("id").as_str().expect("id"), "name": "sigfox", "type": "sigfox" }),
        )
        .await;

    assert_eq!(network.value("secret").as_str(), Some("network-secret"));
    assert_eq!(network.value("type").as_str(), Some("sigfox"));

    let refreshed = h
        .registry
        .read(NETWORK, network, CancellationToken::new())
        .await
        .expect("read")
        .state
        .expect("state");
    assert_eq!(refreshed.value("secret").as_str(), Some("network-secret"));
}

#[tokio::test(start_paused = true)]
async fn test_route_keeps_database_password() {
    let h = Harness::new();
    let hub = h.create(HUB, json!({ "name": "fleet", "product_plan": "plan_shared" })).await;

    let route = h
        .create(
            ROUTE,
            json!({
                "hub_id": hub.value("id").as_str().expect("id"),
                "name": "archive",
                "topic": "sensors/#",
                "database": [{
                    "host": "db.internal",
                    "port": 5432,
                    "dbname": "iot",
                    "username": "writer",
                    "password": "hunter2",
                    "query": "INSERT INTO messages VALUES ($TOPIC, $PAYLOAD)"
                }]
            }),
        )
        .await;

    let database = route.value("database").as_items().expect("database")[0]
        .as_block()
        .expect("database block")
        .clone();
    assert_eq!(database.value("password").as_str(), Some("hunter2"));
    assert_eq!(database.value("port").as_int(), Some(5432));
    assert!(route.value("s3").is_zero());
}
