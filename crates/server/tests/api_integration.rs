//! HTTP API tests over the in-process router with a mock engine.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use mediaforge_core::{engine::EngineError, Config, ServiceConfig};

use common::{fixtures, TestFixture};

// =============================================================================
// Introspection
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["engine"], "mock");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/config").await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    assert_eq!(json["server"]["port"], 8080);
    assert_eq!(json["engine"]["ffmpeg"], "ffmpeg");
    assert!(json["staging"].get("dir").is_none());
}

#[tokio::test]
async fn test_profiles_listed() {
    let fixture = TestFixture::new();

    let response = fixture.get("/api/v1/profiles").await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    for expected in ["toAudio", "toAudio8k", "toPTT", "imageToWebp", "videoToWebp"] {
        assert!(names.contains(&expected), "missing {expected}");
    }
}

#[tokio::test]
async fn test_status_reports_slots() {
    let fixture = TestFixture::with_service_config(ServiceConfig::default().with_max_parallel(3));

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.status, StatusCode::OK);

    let json = response.json();
    assert_eq!(json["max_parallel_conversions"], 3);
    assert_eq!(json["active"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new();
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);

    let text = String::from_utf8(response.body).unwrap();
    assert!(text.contains("mediaforge_http_requests_total"));
    assert!(text.contains("mediaforge_service_active_conversions"));
}

#[tokio::test]
async fn test_unrouted_paths_share_one_metric_label() {
    let fixture = TestFixture::new();

    for i in 0..5 {
        let response = fixture.get(&format!("/random/path/{i}")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    let text = String::from_utf8(fixture.get("/metrics").await.body).unwrap();
    assert!(!text.contains("/random/path"));
    assert!(text.contains("{unmatched}"));
}

// =============================================================================
// Profile conversions
// =============================================================================

#[tokio::test]
async fn test_convert_returns_output_bytes() {
    let fixture = TestFixture::new();
    fixture.engine.set_output(b"ID3 converted".to_vec()).await;

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, b"ID3 converted");
    assert_eq!(response.header("content-type"), Some("audio/mpeg"));
    assert_eq!(response.header("x-source-format"), Some("wav"));
    assert!(response.header("x-conversion-ms").is_some());
    assert_eq!(fixture.residual_files().await, 0);
}

#[tokio::test]
async fn test_convert_passes_extra_args() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio?extra=-b:a%2096k", fixtures::wav())
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let runs = fixture.engine.recorded_invocations().await;
    let args = &runs[0].invocation.args;
    let pos = args.iter().position(|a| a == "96k").unwrap();
    assert_eq!(args[pos - 1], "-b:a");
}

#[tokio::test]
async fn test_unknown_profile_is_404() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/convert/toNothing", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["kind"], "unknown_profile");
    assert_eq!(fixture.engine.invocation_count().await, 0);
}

#[tokio::test]
async fn test_unknown_format_is_415() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio", fixtures::garbage())
        .await;

    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.json()["kind"], "unknown_format");
    assert_eq!(fixture.residual_files().await, 0);
}

#[tokio::test]
async fn test_reserved_flag_is_400() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio?extra=-i%20/etc/passwd", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["kind"], "invalid_options");
    assert_eq!(fixture.engine.invocation_count().await, 0);
}

#[tokio::test]
async fn test_extra_output_path_is_400() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes(
            "/api/v1/convert/videoConvert?extra=-c%20copy%20/tmp/elsewhere.mp4",
            fixtures::mp4(),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["kind"], "invalid_options");
    assert_eq!(fixture.engine.invocation_count().await, 0);
    assert!(!std::path::Path::new("/tmp/elsewhere.mp4").exists());
}

#[tokio::test]
async fn test_timeout_is_capped_at_configured_deadline() {
    let fixture = TestFixture::with_service_config(ServiceConfig::default().with_timeout(2));

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio?timeout_secs=86400", fixtures::wav())
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let runs = fixture.engine.recorded_invocations().await;
    assert_eq!(runs[0].invocation.timeout, Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_engine_failure_is_502_with_diagnostics() {
    let fixture = TestFixture::new();
    fixture
        .engine
        .set_next_error(EngineError::failed(Some(1), "Invalid data found when processing input"))
        .await;

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    let json = response.json();
    assert_eq!(json["kind"], "conversion_failed");
    assert!(json["error"].as_str().unwrap().starts_with("toAudio -> mp3"));
    assert!(json["diagnostics"]
        .as_str()
        .unwrap()
        .contains("Invalid data"));
    assert_eq!(fixture.residual_files().await, 0);
}

#[tokio::test]
async fn test_engine_missing_is_502() {
    let fixture = TestFixture::new();
    fixture
        .engine
        .set_next_error(EngineError::NotFound {
            path: "/usr/bin/ffmpeg".into(),
        })
        .await;

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    assert_eq!(response.json()["kind"], "engine_unavailable");
}

#[tokio::test]
async fn test_deadline_is_504() {
    let fixture = TestFixture::new();
    fixture.engine.set_run_duration(Duration::from_secs(30)).await;

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio?timeout_secs=1", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(response.json()["kind"], "timeout");
    assert_eq!(fixture.residual_files().await, 0);
}

#[tokio::test]
async fn test_body_limit_is_413() {
    let mut config = Config::default();
    config.server.max_body_bytes = 16;
    let fixture = TestFixture::with_config(config);

    let response = fixture
        .post_bytes("/api/v1/convert/toAudio", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(fixture.engine.invocation_count().await, 0);
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_crop_builds_filter() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/crop?width=32&height=16&x=4", fixtures::png())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));

    let runs = fixture.engine.recorded_invocations().await;
    assert!(runs[0]
        .invocation
        .args
        .contains(&"crop=32:16:4:0".to_string()));
}

#[tokio::test]
async fn test_crop_requires_size() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/crop?x=4", fixtures::png())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(fixture.engine.invocation_count().await, 0);
}

#[tokio::test]
async fn test_trim_rejects_negative_start() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/trim?start=-1&end=2", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["kind"], "bad_request");
}

#[tokio::test]
async fn test_trim_rejects_reversed_range() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/trim?start=3&end=1", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["kind"], "invalid_operation");
}

#[tokio::test]
async fn test_container_changes_media_type() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/container/mkv", fixtures::mp4())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("video/x-matroska"));
    assert_eq!(response.header("x-source-format"), Some("mp4"));
}

#[tokio::test]
async fn test_unsupported_container_is_400() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/container/xyz", fixtures::mp4())
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["kind"], "unsupported_container");
}

#[tokio::test]
async fn test_frames_reject_audio() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/frames?rate=2", fixtures::wav())
        .await;

    assert_eq!(response.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(response.json()["kind"], "incompatible_input");
    assert_eq!(fixture.residual_files().await, 0);
}

#[tokio::test]
async fn test_frame_is_png() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/frame?at=1.5", fixtures::mp4())
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));

    let runs = fixture.engine.recorded_invocations().await;
    assert!(runs[0].invocation.args.contains(&"1.500".to_string()));
}

#[tokio::test]
async fn test_waveform_and_reverse() {
    let fixture = TestFixture::new();

    let response = fixture
        .post_bytes("/api/v1/ops/waveform?width=400&height=80", fixtures::wav())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("image/png"));

    let response = fixture
        .post_bytes("/api/v1/ops/reverse", fixtures::wav())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("audio/wav"));

    assert_eq!(fixture.engine.invocation_count().await, 2);
    assert_eq!(fixture.residual_files().await, 0);
}
