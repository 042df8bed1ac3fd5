// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Scheduler ticks against devices served over HTTP

use std::sync::Arc;
use std::time::Duration;

use axetune::config::ControllerConfig;
use axetune::controller::{Controller, EnableRequest, Scheduler};
use axetune::device::HttpDevice;
use axetune::tuning::{Action, ProfileName, ProfileTable};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> Arc<HttpDevice> {
    Arc::new(HttpDevice::new(Duration::from_millis(500), Duration::from_millis(500)).unwrap())
}

async fn device_reporting(body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

async fn run_one_tick(controller: &Arc<Controller>) {
    let scheduler = Scheduler::new(Arc::clone(controller));
    for result in futures::future::join_all(scheduler.tick().await).await {
        result.unwrap();
    }
}

#[tokio::test]
async fn test_hot_device_is_throttled_over_http() {
    let server = device_reporting(json!({
        "temp": 69.0,
        "voltage": 5100,
        "coreVoltage": 1200,
        "frequency": "525",
        "power": 16.0,
        "hashRate": 1000.0,
        "ASICModel": "BM1366",
        "asicCount": 1
    }))
    .await;
    Mock::given(method("PATCH"))
        .and(path("/api/system"))
        .and(body_json(json!({"coreVoltage": 1200, "frequency": 515})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let controller = Arc::new(Controller::new(
        client(),
        ProfileTable::default(),
        ControllerConfig::default(),
    ));
    controller
        .enable(EnableRequest::new(server.uri(), ProfileName::Conservative))
        .await;

    run_one_tick(&controller).await;

    let detail = controller.detail(&server.uri()).await.unwrap();
    assert_eq!(detail.last_action, Action::ThermalWarning);
    assert_eq!(detail.limits.current_settings.frequency, 515.0);
    assert_eq!(detail.tuning_log.len(), 1);
}

#[tokio::test]
async fn test_unreachable_device_does_not_block_others() {
    let healthy = device_reporting(json!({
        "temp": 63.0,
        "voltage": 5100,
        "coreVoltage": 1200,
        "frequency": 525,
        "power": 16.0,
        "hashRate": 1000.0
    }))
    .await;

    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system/info"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&broken)
        .await;

    let controller = Arc::new(Controller::new(
        client(),
        ProfileTable::default(),
        ControllerConfig::default(),
    ));
    for uri in [healthy.uri(), broken.uri()] {
        controller
            .enable(EnableRequest::new(uri, ProfileName::Conservative))
            .await;
    }

    run_one_tick(&controller).await;

    let good = controller.detail(&healthy.uri()).await.unwrap();
    assert_eq!(good.tuning_log.len(), 1);
    assert_eq!(good.last_action, Action::Maintain);

    let bad = controller.detail(&broken.uri()).await.unwrap();
    assert!(bad.tuning_log.is_empty());
    assert_eq!(bad.limits.current_settings.frequency, 0.0);
}

#[tokio::test]
async fn test_failed_write_is_not_recorded_as_applied() {
    let server = device_reporting(json!({
        "temp": 69.0,
        "voltage": 5100,
        "coreVoltage": 1200,
        "frequency": 525,
        "ASICModel": "BM1366"
    }))
    .await;
    Mock::given(method("PATCH"))
        .and(path("/api/system"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let controller = Arc::new(Controller::new(
        client(),
        ProfileTable::default(),
        ControllerConfig::default(),
    ));
    controller
        .enable(EnableRequest::new(server.uri(), ProfileName::Conservative))
        .await;

    run_one_tick(&controller).await;

    let detail = controller.detail(&server.uri()).await.unwrap();
    assert_eq!(detail.limits.current_settings.frequency, 525.0);
}
