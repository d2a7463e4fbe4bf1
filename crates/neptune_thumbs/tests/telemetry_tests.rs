use neptune_thumbs::{send_statistics, Settings, PLUGIN_NAME, PLUGIN_VERSION};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn send(settings: Settings) -> bool {
    tokio::task::spawn_blocking(move || send_statistics(&settings))
        .await
        .unwrap()
}

fn enabled(url: String) -> Settings {
    let mut settings = Settings {
        statistics_enabled: true,
        statistics_url: Some(url),
        ..Settings::default()
    };
    settings.ensure_statistics_id();
    settings
}

#[tokio::test(flavor = "multi_thread")]
async fn test_posts_report_json() {
    let mock_server = MockServer::start().await;
    let settings = enabled(format!("{}/stats", mock_server.uri()));
    let id = settings.statistics_id.clone().unwrap();

    Mock::given(method("POST"))
        .and(path("/stats"))
        .and(body_partial_json(serde_json::json!({
            "plugin": PLUGIN_NAME,
            "version": PLUGIN_VERSION,
            "id": id,
            "printer": "elegoo_neptune_3_pro",
            "options": ["time_estimate", "filament_grams_estimate", "layer_height", "model_height"],
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert!(send(settings).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_server_error_is_swallowed() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    assert!(!send(enabled(mock_server.uri())).await);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_server_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let started = std::time::Instant::now();
    assert!(!send(enabled(mock_server.uri())).await);
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disabled_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let settings = Settings {
        statistics_enabled: false,
        ..enabled(mock_server.uri())
    };
    assert!(!send(settings).await);
}
