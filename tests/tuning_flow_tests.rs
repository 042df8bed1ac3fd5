// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! End-to-end control cycles against the in-process mock fleet

use std::sync::Arc;

use axetune::config::ControllerConfig;
use axetune::controller::{run_cycle, Controller, EnableRequest};
use axetune::device::{MockDevice, SettingsPatch, Telemetry};
use axetune::persistence::{PersistHandle, StateStore};
use axetune::tuning::{Action, Ceiling, ChipFamily, DeviceState, Profile, ProfileName, ProfileTable};
use chrono::{Duration, Utc};
use tempfile::TempDir;
use tokio_test::assert_ok;

const ADDR: &str = "192.168.1.40";

/// Cool, clean BM1366 on a 5V rail, sitting at 1200 mV / 550 MHz
fn cool_bm1366() -> Telemetry {
    Telemetry {
        temp: 55.0,
        vr_temp: 50.0,
        input_voltage: 5100.0,
        core_voltage: 1200.0,
        frequency: 550.0,
        power: 15.5,
        hash_rate: 970.0,
        expected_hashrate: 1000.0,
        error_percentage: Some(1.0),
        asic_model: Some("BM1366".to_string()),
        asic_count: 1,
        ..Telemetry::default()
    }
}

fn power_fault() -> Telemetry {
    Telemetry {
        temp: 63.0,
        input_voltage: 5100.0,
        core_voltage: 1250.0,
        frequency: 600.0,
        power: 15.0,
        hash_rate: 1000.0,
        power_fault: Some("Power Fault".to_string()),
        ..Telemetry::default()
    }
}

#[tokio::test]
async fn test_stable_cool_device_steps_up_along_curve() {
    let mock = MockDevice::new().with_telemetry(ADDR, vec![cool_bm1366()]);
    let profile = Profile::conservative();
    let mut state = DeviceState::new(ADDR, ProfileName::Conservative);
    state.stable_cycle_count = 10;

    let outcome = assert_ok!(
        run_cycle(&mock, &mut state, &profile, Duration::seconds(120), Utc::now()).await
    );

    assert_eq!(outcome.rule, "optimization");
    assert_eq!(outcome.decision.action, Action::IncreaseFrequencyWithCurveOffset);
    assert!(outcome.applied);
    assert_eq!(mock.last_write(ADDR), Some(SettingsPatch::new(1206.0, 560.0)));
    assert_eq!(state.chip_family, Some(ChipFamily::BM1366));
    assert_eq!(state.current_frequency, 560.0);
    assert_eq!(state.stable_cycle_count, 0);
}

#[tokio::test]
async fn test_unknown_chip_falls_back_to_fixed_steps() {
    let anonymous = Telemetry {
        asic_model: None,
        asic_count: 0,
        ..cool_bm1366()
    };
    let mock = MockDevice::new().with_telemetry(ADDR, vec![anonymous]);
    let mut state = DeviceState::new(ADDR, ProfileName::Conservative);
    state.stable_cycle_count = 10;

    let outcome = assert_ok!(
        run_cycle(
            &mock,
            &mut state,
            &Profile::conservative(),
            Duration::seconds(120),
            Utc::now()
        )
        .await
    );

    assert!(state.chip_family.is_none());
    assert_eq!(outcome.decision.action, Action::IncreaseFrequency);
    assert_eq!(mock.last_write(ADDR), Some(SettingsPatch::new(1200.0, 560.0)));
}

#[tokio::test]
async fn test_danger_temperature_never_raises_frequency() {
    let hot = Telemetry {
        temp: 74.0,
        ..cool_bm1366()
    };
    let mock = MockDevice::new().with_telemetry(ADDR, vec![hot]);
    let mut state = DeviceState::new(ADDR, ProfileName::Conservative);
    state.stable_cycle_count = 20;

    let outcome = assert_ok!(
        run_cycle(
            &mock,
            &mut state,
            &Profile::conservative(),
            Duration::seconds(120),
            Utc::now()
        )
        .await
    );

    assert_eq!(outcome.rule, "thermal_danger");
    assert!(outcome.decision.frequency < 550.0);
    assert!(state.current_frequency < 550.0);
}

#[tokio::test]
async fn test_repeated_power_fault_learns_ceiling_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(temp_dir.path().join("state.json"));
    let (handle, _writer) =
        PersistHandle::spawn(store.clone(), Vec::new(), std::time::Duration::from_millis(10));

    let mock = MockDevice::new().with_telemetry(ADDR, vec![power_fault()]);
    let controller = Controller::new(
        Arc::new(mock.clone()),
        ProfileTable::default(),
        ControllerConfig::default(),
    )
    .with_persistence(handle);
    controller
        .enable(EnableRequest::new(ADDR, ProfileName::Conservative))
        .await;

    // 600 MHz is over the 575 MHz ceiling; the faulted unit rejects the pull-down,
    // so no adjustment is recorded and every cycle stays due
    mock.set_reject_writes(true);
    for _ in 0..2 {
        let outcome = assert_ok!(controller.run_device_cycle(ADDR).await);
        assert!(!outcome.expect("cycle is due").applied);
    }
    mock.set_reject_writes(false);
    let outcome = assert_ok!(controller.run_device_cycle(ADDR).await);
    assert!(outcome.expect("cycle is due").decision.restart());

    let detail = assert_ok!(controller.detail(ADDR).await);
    assert_eq!(
        detail.limits.adaptive_limits,
        Ceiling {
            max_voltage: 1230.0,
            max_frequency: 570.0
        }
    );
    assert!(detail.limits.is_limited);
    assert_eq!(detail.limits.fault_count, 1);
    assert!(detail.restarting);
    assert_eq!(detail.last_action, Action::CriticalFaultRecovery);
    assert_eq!(mock.restarts(), vec![ADDR.to_string()]);
    // 450 + 10 steps, under the learned 570 MHz
    assert_eq!(mock.last_write(ADDR), Some(SettingsPatch::new(1200.0, 550.0)));

    // Inside the adjust interval nothing else happens
    assert!(assert_ok!(controller.run_device_cycle(ADDR).await).is_none());

    controller.flush().await;
    let saved = store.load().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].fault_history.len(), 1);
    assert_eq!(
        saved[0].adaptive_limits,
        Some(Ceiling {
            max_voltage: 1230.0,
            max_frequency: 570.0
        })
    );
    // Restart bookkeeping is runtime only
    assert!(!saved[0].restarting);
}

#[tokio::test]
async fn test_manual_limits_bound_later_decisions() {
    let mock = MockDevice::new().with_telemetry(ADDR, vec![cool_bm1366()]);
    let controller = Controller::new(
        Arc::new(mock.clone()),
        ProfileTable::default(),
        ControllerConfig::default(),
    );
    controller
        .enable(EnableRequest::new(ADDR, ProfileName::Conservative))
        .await;

    let ceiling = assert_ok!(controller.set_adaptive_limits(ADDR, 1200.0, 540.0).await);
    assert_eq!(
        ceiling,
        Ceiling {
            max_voltage: 1200.0,
            max_frequency: 540.0
        }
    );

    // The device reports 550 MHz, above the new ceiling: it gets pulled down
    assert_ok!(controller.run_device_cycle(ADDR).await);
    let write = mock.last_write(ADDR).expect("ceiling clamp writes");
    assert!(write.frequency <= 540);
    assert!(write.core_voltage <= 1200);
}
