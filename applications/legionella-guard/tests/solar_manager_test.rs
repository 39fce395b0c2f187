use legionella_guard::auth::{Credentials, TokenManager};
use legionella_guard::clock::ManualClock;
use legionella_guard::error::AppError;
use legionella_guard::heating::{ChargingMode, HeatingControl, SolarManagerHeatPump};
use legionella_guard::sensor::{SolarManagerSensor, TemperatureSource};
use serde_json::json;
use std::sync::Arc;
use test_helpers::*;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};


async fn server_with_login() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accessToken": "tok-1", "expiresIn": 3600})),
        )
        .mount(&server)
        .await;
    server
}

fn tokens(server: &MockServer) -> Arc<TokenManager> {
    Arc::new(TokenManager::new(
        reqwest::Client::new(),
        server.uri(),
        Credentials {
            email: "me@example.com".into(),
            password: "secret".into(),
        },
        Arc::new(ManualClock::new(fixed_now())),
    ))
}

fn sensor(server: &MockServer) -> SolarManagerSensor {
    SolarManagerSensor::new(
        reqwest::Client::new(),
        tokens(server),
        format!("{}/stream/sensor/abc123", server.uri()),
    )
}

fn heat_pump(server: &MockServer) -> SolarManagerHeatPump {
    SolarManagerHeatPump::new(
        reqwest::Client::new(),
        tokens(server),
        format!("{}/control/heat-pump/hp-1", server.uri()),
    )
}

#[tokio::test]
async fn test_read_temperature() {
    let server = server_with_login().await;
    Mock::given(method("GET"))
        .and(path("/stream/sensor/abc123"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "currentWaterTemp": 58.4, "currentPower": 1200 }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temperature = sensor(&server).read_temperature().await.unwrap();
    assert_eq!(temperature, 58.4);
    server.verify().await;
}

#[tokio::test]
async fn test_read_temperature_non_200() {
    let server = server_with_login().await;
    Mock::given(method("GET"))
        .and(path("/stream/sensor/abc123"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(matches!(
        sensor(&server).read_temperature().await,
        Err(AppError::Status { status: 404, .. })
    ));
}

#[tokio::test]
async fn test_read_temperature_bad_body() {
    let server = server_with_login().await;
    Mock::given(method("GET"))
        .and(path("/stream/sensor/abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    assert!(matches!(
        sensor(&server).read_temperature().await,
        Err(AppError::Decode(_))
    ));
}

#[tokio::test]
async fn test_read_temperature_without_login_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stream/sensor/abc123"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert!(matches!(
        sensor(&server).read_temperature().await,
        Err(AppError::Unauthorized { .. })
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_set_charging_mode_on() {
    let server = server_with_login().await;
    Mock::given(method("PUT"))
        .and(path("/control/heat-pump/hp-1"))
        .and(header("authorization", "Bearer tok-1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"heatPumpChargingMode": 1})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    heat_pump(&server)
        .set_charging_mode(ChargingMode::On)
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_set_charging_mode_off_accepts_204() {
    let server = server_with_login().await;
    Mock::given(method("PUT"))
        .and(path("/control/heat-pump/hp-1"))
        .and(body_json(json!({"heatPumpChargingMode": 2})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    heat_pump(&server)
        .set_charging_mode(ChargingMode::Off)
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_set_charging_mode_failure() {
    let server = server_with_login().await;
    Mock::given(method("PUT"))
        .and(path("/control/heat-pump/hp-1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("device offline"))
        .expect(1)
        .mount(&server)
        .await;

    match heat_pump(&server).set_charging_mode(ChargingMode::On).await {
        Err(AppError::Status { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "device offline");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    server.verify().await;
}
