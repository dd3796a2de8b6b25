// Integration tests for `FleetClient` using wiremock.
#![allow(clippy::unwrap_used)]

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetsync_api::{Error, FleetClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FleetClient) {
    let server = MockServer::start().await;
    let client = FleetClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, client)
}

// ── Happy-path tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_overview() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_buses": 12,
            "online_buses": 9,
            "average_speed": 31.5,
            "total_passengers": 240,
            "road_conditions": { "dry": 8, "wet": 4 }
        })))
        .mount(&server)
        .await;

    let overview = client.overview().await.unwrap();

    assert_eq!(overview.total_buses, 12);
    assert_eq!(overview.online_buses, 9);
    assert!((overview.average_speed - 31.5).abs() < f64::EPSILON);
    assert_eq!(overview.road_conditions.wet, 4);
}

#[tokio::test]
async fn test_list_buses() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/buses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "buses": [
                {
                    "vehicle_id": "BUS-001",
                    "route_id": "R12",
                    "location_name": "Central Station",
                    "latitude": 6.9271,
                    "longitude": 79.8612,
                    "safe_speed": 40.0,
                    "passenger_count": 23,
                    "road_condition": "Dry",
                    "status": "online",
                    "last_update": "2025-03-01T08:15:30"
                },
                { "vehicle_id": "BUS-002", "status": "offline" }
            ]
        })))
        .mount(&server)
        .await;

    let list = client.list_buses().await.unwrap();

    assert_eq!(list.buses.len(), 2);
    assert_eq!(list.buses[0].vehicle_id.as_deref(), Some("BUS-001"));
    assert_eq!(list.buses[0].passenger_count, Some(23));
    assert!(list.buses[0].last_update.is_some());
    assert_eq!(list.buses[1].status.as_deref(), Some("offline"));
    assert!(list.buses[1].latitude.is_none());
}

#[tokio::test]
async fn test_get_bus() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/buses/BUS-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "vehicle_id": "BUS-001",
            "route_id": "R12",
            "status": "online"
        })))
        .mount(&server)
        .await;

    let bus = client.get_bus("BUS-001").await.unwrap().unwrap();
    assert_eq!(bus.route_id.as_deref(), Some("R12"));
}

#[tokio::test]
async fn test_get_bus_not_found_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/buses/GHOST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "Bus not found"
        })))
        .mount(&server)
        .await;

    let bus = client.get_bus("GHOST").await.unwrap();
    assert!(bus.is_none());
}

#[tokio::test]
async fn test_bus_history_passes_window() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/buses/BUS-001/history"))
        .and(query_param("hours", "6"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                { "timestamp": "2025-03-01T08:10:00", "safe_speed": 42.0, "road_condition": "Wet" },
                { "timestamp": "2025-03-01T08:05:00", "safe_speed": 38.0 }
            ]
        })))
        .mount(&server)
        .await;

    let history = client.bus_history("BUS-001", 6, 2).await.unwrap();

    assert_eq!(history.history.len(), 2);
    assert!(history.history[0].timestamp > history.history[1].timestamp);
    assert_eq!(history.history[0].road_condition.as_deref(), Some("Wet"));
}

#[tokio::test]
async fn test_map_data_routes_statistics_health() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/map-data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "buses": [{ "vehicle_id": "BUS-001", "latitude": 1.0, "longitude": 2.0 }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fleet/routes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "routes": [{ "route_id": "R12", "bus_count": 3, "name": "Harbour loop" }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fleet/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "speed_distribution": [
                { "range": "0-20", "count": 2 },
                { "range": "20-40", "count": 7 }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&server)
        .await;

    assert_eq!(client.map_data().await.unwrap().buses.len(), 1);

    let routes = client.routes().await.unwrap();
    assert_eq!(routes.routes[0].bus_count, Some(3));
    assert_eq!(routes.routes[0].extra["name"], "Harbour loop");

    let stats = client.statistics().await.unwrap();
    assert_eq!(stats.speed_distribution[1].count, 7);

    assert_eq!(client.health().await.unwrap().status, "healthy");
}

// ── Error paths ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_server_error_maps_to_http() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/buses"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "database unavailable"
        })))
        .mount(&server)
        .await;

    let err = client.list_buses().await.unwrap_err();
    match err {
        Error::Http { status, ref message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database unavailable");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_bad_body_maps_to_deserialization() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/fleet/overview"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.overview().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert!(body.contains("oops")),
        other => panic!("expected Deserialization error, got {other:?}"),
    }
}
