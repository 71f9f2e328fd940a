use std::{path::Path, time::Duration};

use dashproxy::{
    dash::address::RepresentationAddress, HttpFetcher, ManifestSession, MemoryOutput, ProxyError,
    RetryPolicy, SessionOptions,
};
use url::Url;
use wiremock::{
    matchers::{method, path, path_regex, query_param},
    Mock, MockServer, ResponseTemplate,
};

use super::{
    init_test_tracing, load_fixture, mount_segment, setup_mock_server, RecordingSleeper,
};
use crate::AssertWrapper;

fn session(
    manifest_url: &str,
    options: SessionOptions,
) -> (
    ManifestSession<HttpFetcher, MemoryOutput, RecordingSleeper>,
    MemoryOutput,
    RecordingSleeper,
) {
    let output = MemoryOutput::new();
    let sleeper = RecordingSleeper::default();
    let session = ManifestSession::with_sleeper(
        Url::parse(manifest_url).unwrap(),
        HttpFetcher::default(),
        output.clone(),
        options,
        sleeper.clone(),
    );
    (session, output, sleeper)
}

/// Serves `first` once, then `second` for every later request.
async fn mount_manifest_sequence(server: &MockServer, first: &str, second: &str) {
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(first))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(second))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_static_mpd_single_cycle() -> anyhow::Result<()> {
    init_test_tracing();
    let body = load_fixture("vod.mpd");
    let (manifest_url, server) = setup_mock_server(&body).await;
    mount_segment(&server, "/v1/init.mp4", "init", 1).await;
    mount_segment(&server, "/v1/00001.m4s", "first", 1).await;
    mount_segment(&server, "/v1/00002.m4s", "second", 1).await;
    mount_segment(&server, "/audio/full.m4a", "audio", 1).await;

    let (mut session, output, sleeper) = session(&manifest_url, SessionOptions::default());
    session.run().await.assert_success();

    assert_eq!(session.refresh_count(), 1);
    assert!(sleeper.sleeps().is_empty());

    // the MPD is written byte for byte
    assert_eq!(output.get("manifest.mpd").assert_success(), body.as_bytes());
    assert_eq!(output.get("v1/init.mp4").assert_success(), "init".as_bytes());
    assert_eq!(output.get("v1/00001.m4s").assert_success(), "first".as_bytes());
    assert_eq!(output.get("v1/00002.m4s").assert_success(), "second".as_bytes());
    assert_eq!(output.get("audio/full.m4a").assert_success(), "audio".as_bytes());
    assert_eq!(output.paths().len(), 5);

    let video = session
        .session(&RepresentationAddress::new(0, 0, 0))
        .assert_success();
    assert_eq!(video.representation_id(), Some("v1"));
    assert!(video.initialization_downloaded());
    assert_eq!(
        video.base_url().map(Url::as_str),
        Some(format!("{}/", server.uri()).as_str())
    );
    assert_eq!(session.sessions().count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_dynamic_mpd_refresh() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let first = load_fixture("live-1.mpd");
    let second = load_fixture("live-2.mpd");
    mount_manifest_sequence(&server, &first, &second).await;

    mount_segment(&server, "/v1/init.mp4", "init", 1).await;
    mount_segment(&server, "/v1/0.m4s", "0", 1).await;
    mount_segment(&server, "/v1/4.m4s", "4", 1).await;
    mount_segment(&server, "/v1/8.m4s", "8", 1).await;

    let (mut session, output, sleeper) = session(
        &format!("{}/manifest.mpd", server.uri()),
        SessionOptions::default(),
    );
    session.run().await.assert_success();

    assert_eq!(session.refresh_count(), 2);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2)]);

    assert_eq!(output.get("manifest.mpd").assert_success(), second.as_bytes());
    // left the window
    output.get("v1/0.m4s").assert_error();
    output.get("v1/4.m4s").assert_success();
    output.get("v1/8.m4s").assert_success();
    output.get("v1/init.mp4").assert_success();
    output.get("manifest.1.mpd").assert_error();

    // expectations on the segment mocks are verified when the server drops
    Ok(())
}

#[tokio::test]
async fn test_retained_segments_and_saved_manifests() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let first = load_fixture("live-1.mpd");
    let second = load_fixture("live-2.mpd");
    mount_manifest_sequence(&server, &first, &second).await;

    mount_segment(&server, "/v1/init.mp4", "init", 1).await;
    mount_segment(&server, "/v1/0.m4s", "0", 1).await;
    mount_segment(&server, "/v1/4.m4s", "4", 1).await;
    mount_segment(&server, "/v1/8.m4s", "8", 1).await;

    let options = SessionOptions {
        save_manifests: true,
        retain_segments: true,
        ..Default::default()
    };
    let (mut session, output, _) = session(&format!("{}/manifest.mpd", server.uri()), options);
    session.run().await.assert_success();

    assert_eq!(output.get("manifest.1.mpd").assert_success(), first.as_bytes());
    assert_eq!(output.get("manifest.2.mpd").assert_success(), second.as_bytes());
    assert_eq!(output.get("manifest.mpd").assert_success(), second.as_bytes());
    output.get("v1/0.m4s").assert_success();

    Ok(())
}

#[tokio::test]
async fn test_min_refresh_interval() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    mount_manifest_sequence(&server, &load_fixture("live-1.mpd"), &load_fixture("live-2.mpd"))
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("segment"))
        .with_priority(10)
        .mount(&server)
        .await;

    let options = SessionOptions {
        min_refresh_interval: Duration::from_secs(5),
        ..Default::default()
    };
    let (mut session, _, sleeper) = session(&format!("{}/manifest.mpd", server.uri()), options);
    session.run().await.assert_success();

    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5)]);
    Ok(())
}

#[tokio::test]
async fn test_manifest_retry() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("vod.mpd")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("segment"))
        .with_priority(10)
        .mount(&server)
        .await;

    let options = SessionOptions {
        retry: RetryPolicy::fixed(Duration::from_secs(3)),
        ..Default::default()
    };
    let (mut session, output, sleeper) =
        session(&format!("{}/manifest.mpd", server.uri()), options);
    session.run().await.assert_success();

    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_secs(3), Duration::from_secs(3)]
    );
    assert_eq!(session.refresh_count(), 1);
    output.get("manifest.mpd").assert_success();

    Ok(())
}

#[tokio::test]
async fn test_invalid_manifest_is_retried() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(load_fixture("vod.mpd")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("segment"))
        .with_priority(10)
        .mount(&server)
        .await;

    let (mut session, _, sleeper) = session(
        &format!("{}/manifest.mpd", server.uri()),
        SessionOptions::default(),
    );
    session.run().await.assert_success();

    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(10)]);
    Ok(())
}

#[tokio::test]
async fn test_manifest_retry_exhausted() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let options = SessionOptions {
        retry: RetryPolicy::fixed(Duration::from_secs(1)).with_max_attempts(Some(3)),
        ..Default::default()
    };
    let (mut session, output, sleeper) =
        session(&format!("{}/manifest.mpd", server.uri()), options);

    let result = session.run().await;
    assert!(matches!(result, Err(ProxyError::ManifestFetch { attempts: 3 })));
    assert_eq!(sleeper.sleeps().len(), 2);
    assert!(output.paths().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_location_and_base_url() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let body = load_fixture("location.mpd").replace("{{SERVER}}", &server.uri());
    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    mount_segment(&server, "/cdn/stream/media/v1/init.mp4", "init", 1).await;
    mount_segment(&server, "/cdn/stream/media/v1/7.m4s", "7", 1).await;

    let (mut session, output, _) = session(
        &format!("{}/manifest.mpd", server.uri()),
        SessionOptions::default(),
    );
    session.run().await.assert_success();

    // the output mirrors the addresses as written in the MPD
    assert_eq!(output.get("v1/7.m4s").assert_success(), "7".as_bytes());
    output.get("v1/init.mp4").assert_success();
    assert!(!output
        .paths()
        .iter()
        .any(|p| p.starts_with(Path::new("cdn"))));

    Ok(())
}

#[tokio::test]
async fn test_failed_segment_does_not_stop_cycle() -> anyhow::Result<()> {
    init_test_tracing();
    let body = load_fixture("vod.mpd");
    let (manifest_url, server) = setup_mock_server(&body).await;
    mount_segment(&server, "/v1/init.mp4", "init", 1).await;
    Mock::given(method("GET"))
        .and(path("/v1/00001.m4s"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    mount_segment(&server, "/v1/00002.m4s", "second", 1).await;
    mount_segment(&server, "/audio/full.m4a", "audio", 1).await;

    let (mut session, output, _) = session(&manifest_url, SessionOptions::default());
    session.run().await.assert_success();

    output.get("v1/00001.m4s").assert_error();
    output.get("v1/00002.m4s").assert_success();
    output.get("manifest.mpd").assert_success();

    Ok(())
}

#[tokio::test]
async fn test_signed_manifest_url() -> anyhow::Result<()> {
    init_test_tracing();
    let body = load_fixture("vod.mpd");
    let (manifest_url, server) = setup_mock_server(&body).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/v1/"))
        .and(query_param("sig", "ab/cd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("segment"))
        .expect(3)
        .mount(&server)
        .await;
    // the single file carries its own query
    mount_segment(&server, "/audio/full.m4a", "audio", 1).await;

    let (mut session, output, _) = session(
        &format!("{manifest_url}?sig=ab/cd"),
        SessionOptions::default(),
    );
    session.run().await.assert_success();

    output.get("v1/init.mp4").assert_success();
    output.get("v1/00001.m4s").assert_success();
    output.get("v1/00002.m4s").assert_success();

    Ok(())
}
