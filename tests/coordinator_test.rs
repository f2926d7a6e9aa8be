//! End-to-end tests for refresh cycles and the integration lifecycle.
//!
//! Each test stands up a mock comma.ai API and drives a real `ApiClient`
//! through the coordinator.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use comma_bridge::api::ApiError;
use comma_bridge::entities::{entities_for, DeviceTracker, SensorEntity, SENSOR_DESCRIPTIONS};
use comma_bridge::integration::{self, SetupError};
use comma_bridge::{ApiClient, Config, Coordinator, UpdateFailed};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn mount_profile(server: &MockServer) {
    mount_json(server, "/v1/me/", json!({"username": "driver", "email": "d@example.com"})).await;
}

fn stats_body(distance: u32) -> Value {
    json!({
        "all": {"distance": distance, "minutes": 50, "routes": 3},
        "week": {"distance": 1, "minutes": 2, "routes": 1}
    })
}

fn coordinator_for(server: &MockServer) -> Coordinator {
    let client = ApiClient::with_base_url(server.uri(), "test-jwt").unwrap();
    Coordinator::new(Arc::new(client), Duration::from_secs(60))
}

mod refresh_cycle {
    use super::*;

    #[tokio::test]
    async fn single_device_scenario() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "abc123", "alias": "Car1"}]),
        )
        .await;
        mount_json(
            &server,
            "/v1.1/devices/abc123/stats",
            json!({"all": {"distance": 100, "minutes": 50, "routes": 3}}),
        )
        .await;

        let coordinator = coordinator_for(&server);
        let snapshot = coordinator.refresh().await.unwrap();

        assert_eq!(snapshot.device_count(), 1);
        let device = snapshot.device("abc123").unwrap();
        assert_eq!(device.alias, "Car1");
        assert_eq!(device.device_type, "unknown");
        let all = device.stats.unwrap().all.unwrap();
        assert!((all.distance - 100.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.profile.username.as_deref(), Some("driver"));
    }

    #[tokio::test]
    async fn keys_match_device_list_exactly() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([
                {"dongle_id": "a1"},
                {"dongle_id": "b2"},
                {"dongle_id": "c3"}
            ]),
        )
        .await;
        for id in ["a1", "b2", "c3"] {
            mount_json(&server, &format!("/v1.1/devices/{id}/stats"), stats_body(10)).await;
        }

        let snapshot = coordinator_for(&server).refresh().await.unwrap();

        let keys: BTreeSet<&str> = snapshot.devices.keys().map(String::as_str).collect();
        assert_eq!(keys, BTreeSet::from(["a1", "b2", "c3"]));
    }

    #[tokio::test]
    async fn stats_404_for_second_device_keeps_both() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "first"}, {"dongle_id": "second"}]),
        )
        .await;
        mount_json(&server, "/v1.1/devices/first/stats", stats_body(5)).await;
        mount_status(&server, "/v1.1/devices/second/stats", 404).await;

        let coordinator = coordinator_for(&server);
        let snapshot = coordinator.refresh().await.unwrap();

        assert_eq!(snapshot.device_count(), 2);
        assert!(snapshot.device("first").unwrap().stats.is_some());
        assert!(snapshot.device("second").unwrap().stats.is_none());
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn stats_server_error_and_garbage_are_isolated() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "broken"}, {"dongle_id": "garbled"}, {"dongle_id": "fine"}]),
        )
        .await;
        mount_status(&server, "/v1.1/devices/broken/stats", 500).await;
        Mock::given(method("GET"))
            .and(path("/v1.1/devices/garbled/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        mount_json(&server, "/v1.1/devices/fine/stats", stats_body(7)).await;

        let snapshot = coordinator_for(&server).refresh().await.unwrap();

        assert!(snapshot.device("broken").unwrap().stats.is_none());
        assert!(snapshot.device("garbled").unwrap().stats.is_none());
        assert!(snapshot.device("fine").unwrap().stats.is_some());
    }

    #[tokio::test]
    async fn missing_fields_get_defaults() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(&server, "/v1/me/devices/", json!([{"dongle_id": "bare"}])).await;
        mount_status(&server, "/v1.1/devices/bare/stats", 404).await;

        let snapshot = coordinator_for(&server).refresh().await.unwrap();
        let device = snapshot.device("bare").unwrap();

        assert_eq!(device.alias, "Unknown");
        assert_eq!(device.device_type, "unknown");
        assert!(!device.is_owner && !device.is_paired && !device.prime);
        assert!(device.last_gps_lat.is_none());
        assert!(device.last_athena_ping.is_none());
    }

    #[tokio::test]
    async fn identical_responses_give_equal_snapshots() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "abc123", "alias": "Car1", "prime": true, "last_gps_lat": 1.5}]),
        )
        .await;
        mount_json(&server, "/v1.1/devices/abc123/stats", stats_body(42)).await;

        let coordinator = coordinator_for(&server);
        let first = coordinator.refresh().await.unwrap();
        let second = coordinator.refresh().await.unwrap();

        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn location_endpoint_is_not_used_for_snapshots() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "abc123", "last_gps_lat": 10.0, "last_gps_lng": 20.0}]),
        )
        .await;
        mount_json(&server, "/v1.1/devices/abc123/stats", stats_body(1)).await;
        Mock::given(method("GET"))
            .and(path("/v1/devices/abc123/location"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lat": 0.0, "lng": 0.0})))
            .expect(0)
            .mount(&server)
            .await;

        let snapshot = coordinator_for(&server).refresh().await.unwrap();

        assert_eq!(snapshot.device("abc123").unwrap().last_gps_lat, Some(10.0));
    }
}

mod cycle_failures {
    use super::*;

    #[tokio::test]
    async fn profile_401_fails_cycle_and_keeps_previous_snapshot() {
        let server = MockServer::start().await;
        mount_json(&server, "/v1/me/devices/", json!([{"dongle_id": "abc123"}])).await;
        mount_json(&server, "/v1.1/devices/abc123/stats", stats_body(1)).await;
        Mock::given(method("GET"))
            .and(path("/v1/me/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "driver"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_status(&server, "/v1/me/", 401).await;

        let coordinator = coordinator_for(&server);
        let first = coordinator.refresh().await.unwrap();
        let err = coordinator.refresh().await.unwrap_err();

        assert!(err.is_authentication());
        assert!(matches!(err, UpdateFailed::Api(ApiError::Authentication)));
        assert!(!coordinator.last_update_success());
        assert_eq!(
            coordinator.last_error().as_deref(),
            Some("Error communicating with API: Invalid JWT token")
        );
        assert!(Arc::ptr_eq(&coordinator.snapshot().unwrap(), &first));
    }

    #[tokio::test]
    async fn device_list_403_fails_cycle() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_status(&server, "/v1/me/devices/", 403).await;

        let coordinator = coordinator_for(&server);
        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err.api_error(), ApiError::Authorization));
        assert!(err.to_string().starts_with("Error communicating with API: "));
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test]
    async fn malformed_device_list_is_unexpected_error() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(&server, "/v1/me/devices/", json!([{"alias": "no id"}])).await;

        let err = coordinator_for(&server).refresh().await.unwrap_err();

        assert!(matches!(err, UpdateFailed::Unexpected(ApiError::InvalidResponse(_))));
        assert!(err.to_string().starts_with("Unexpected error: "));
    }

    #[tokio::test]
    async fn unreachable_api_is_unexpected_error() {
        let client = ApiClient::with_base_url("http://127.0.0.1:59997", "test-jwt").unwrap();
        let coordinator = Coordinator::new(Arc::new(client), Duration::from_secs(60));

        let err = coordinator.refresh().await.unwrap_err();

        assert!(matches!(err, UpdateFailed::Unexpected(ApiError::Transport(_))));
    }

    #[tokio::test]
    async fn recovers_on_next_cycle() {
        let server = MockServer::start().await;
        mount_json(&server, "/v1/me/devices/", json!([])).await;
        Mock::given(method("GET"))
            .and(path("/v1/me/"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_profile(&server).await;

        let coordinator = coordinator_for(&server);
        coordinator.refresh().await.unwrap_err();
        assert!(!coordinator.last_update_success());

        coordinator.refresh().await.unwrap();
        assert!(coordinator.last_update_success());
        assert!(coordinator.last_error().is_none());
    }
}

mod lifecycle {
    use super::*;

    fn entry_for(server: &MockServer) -> Config {
        Config {
            base_url: server.uri(),
            jwt_token: "test-jwt".to_string(),
            username: Some("driver".to_string()),
            update_interval: 3600,
        }
    }

    #[tokio::test]
    async fn setup_primes_snapshot_and_unload_stops() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "abc123", "alias": "Car1", "last_gps_lat": 32.7, "last_gps_lng": -117.1}]),
        )
        .await;
        mount_json(&server, "/v1.1/devices/abc123/stats", stats_body(100)).await;

        let integration = integration::setup_entry(&entry_for(&server)).await.unwrap();

        let coordinator = Arc::clone(integration.coordinator());
        let snapshot = coordinator.snapshot().unwrap();
        assert_eq!(snapshot.device_count(), 1);

        let entities = entities_for(&snapshot);
        assert_eq!(entities.len(), 1);
        assert!(entities[0].tracker.available(&coordinator));
        assert!(entities[0].sensors.iter().all(|s| s.available(&coordinator)));

        integration.unload().await;
    }

    #[tokio::test]
    async fn zero_interval_entry_keeps_refreshing() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(&server, "/v1/me/devices/", json!([])).await;

        let entry = Config {
            update_interval: 0,
            ..entry_for(&server)
        };
        let integration = integration::setup_entry(&entry).await.unwrap();
        let first = integration.coordinator().last_success_at().unwrap();

        tokio::time::sleep(Duration::from_millis(1300)).await;

        let coordinator = Arc::clone(integration.coordinator());
        assert!(coordinator.last_success_at().unwrap() > first);
        integration.unload().await;

        let profile_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == "/v1/me/")
            .count();
        // Setup check, first refresh, one scheduled tick
        assert!(profile_calls >= 3);
    }

    #[tokio::test]
    async fn setup_fails_on_rejected_token() {
        let server = MockServer::start().await;
        mount_status(&server, "/v1/me/", 401).await;

        let err = integration::setup_entry(&entry_for(&server)).await.unwrap_err();

        assert!(matches!(err, SetupError::Authentication(ApiError::Authentication)));
    }

    #[tokio::test]
    async fn setup_not_ready_when_first_refresh_fails() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_status(&server, "/v1/me/devices/", 500).await;

        let err = integration::setup_entry(&entry_for(&server)).await.unwrap_err();

        assert!(matches!(err, SetupError::NotReady(_)));
    }

    #[tokio::test]
    async fn setup_requires_token() {
        let config = Config::default();
        let err = integration::setup_entry(&config).await.unwrap_err();
        assert!(matches!(err, SetupError::MissingToken));
    }
}

mod availability {
    use super::*;

    #[tokio::test]
    async fn tracker_needs_gps_fix() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([
                {"dongle_id": "located", "last_gps_lat": 1.0, "last_gps_lng": 2.0},
                {"dongle_id": "lost", "last_gps_lat": null}
            ]),
        )
        .await;
        mount_status(&server, "/v1.1/devices/located/stats", 404).await;
        mount_status(&server, "/v1.1/devices/lost/stats", 404).await;

        let coordinator = coordinator_for(&server);
        coordinator.refresh().await.unwrap();

        let located = DeviceTracker {
            dongle_id: "located".to_string(),
        };
        let lost = DeviceTracker {
            dongle_id: "lost".to_string(),
        };
        assert!(located.available(&coordinator));
        assert!(!lost.available(&coordinator));
    }

    #[tokio::test]
    async fn failed_cycle_makes_everything_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/me/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"username": "driver"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_status(&server, "/v1/me/", 503).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "abc123", "last_gps_lat": 1.0, "last_gps_lng": 2.0}]),
        )
        .await;
        mount_json(&server, "/v1.1/devices/abc123/stats", stats_body(3)).await;

        let coordinator = coordinator_for(&server);
        coordinator.refresh().await.unwrap();

        let sensor = SensorEntity {
            dongle_id: "abc123".to_string(),
            description: &SENSOR_DESCRIPTIONS[0],
        };
        let tracker = DeviceTracker {
            dongle_id: "abc123".to_string(),
        };
        assert!(sensor.available(&coordinator));
        assert!(tracker.available(&coordinator));

        coordinator.refresh().await.unwrap_err();

        assert!(!sensor.available(&coordinator));
        assert!(!tracker.available(&coordinator));
        // Last good data is still readable
        assert!(coordinator.snapshot().is_some());
    }

    #[tokio::test]
    async fn stats_gap_only_blanks_stats_sensors() {
        let server = MockServer::start().await;
        mount_profile(&server).await;
        mount_json(
            &server,
            "/v1/me/devices/",
            json!([{"dongle_id": "abc123", "device_type": "three"}]),
        )
        .await;
        mount_status(&server, "/v1.1/devices/abc123/stats", 404).await;

        let coordinator = coordinator_for(&server);
        let snapshot = coordinator.refresh().await.unwrap();
        let entities = entities_for(&snapshot);

        for sensor in &entities[0].sensors {
            assert!(sensor.available(&coordinator));
            let value = sensor.native_value(&snapshot);
            match sensor.description.key {
                "device_type" | "is_prime" => assert!(value.is_some()),
                key if key.starts_with("total_") || key.starts_with("week_") => {
                    assert!(value.is_none(), "{key} should be empty");
                }
                _ => {}
            }
        }
    }
}
