mod session;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use dashproxy::Sleeper;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dashproxy=debug,wiremock=info")
        .with_test_writer()
        .try_init();
}

fn load_fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/dash/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {path}: {e}"))
}

async fn setup_mock_server(body: &str) -> (String, MockServer) {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    (format!("{}/manifest.mpd", mock_server.uri()), mock_server)
}

/// Serve `body` at `segment_path`, expecting exactly `times` requests.
async fn mount_segment(server: &MockServer, segment_path: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(segment_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

/// Returns immediately and remembers what it was asked to wait.
#[derive(Clone, Default)]
struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}
