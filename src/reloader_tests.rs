// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reloader.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ErrorKind;
    use crate::metrics::RELOADS;
    use crate::test_support::{
        self, prometheus_config_map, FakeKube, ManualClock, RecordingTelemetry,
    };
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CONFIGMAP_YAML: &str = "scrape_configs: []\n";

    struct Fixture {
        server: MockServer,
        kube: Arc<FakeKube>,
        clock: Arc<ManualClock>,
        telemetry: Arc<RecordingTelemetry>,
        reloader: Reloader,
    }

    async fn fixture(minimum_reload_time: Duration) -> Fixture {
        let server = MockServer::start().await;
        let kube = Arc::new(FakeKube::new());
        kube.put_config_map(prometheus_config_map(
            "monitoring",
            "prometheus",
            "prometheus.yml",
            CONFIGMAP_YAML,
        ));
        let clock = Arc::new(ManualClock::new());
        let telemetry = Arc::new(RecordingTelemetry::new());

        let reloader = test_support::reloader(
            &server.uri(),
            minimum_reload_time,
            kube.clone(),
            clock.clone(),
            telemetry.clone(),
        );

        Fixture {
            server,
            kube,
            clock,
            telemetry,
            reloader,
        }
    }

    async fn mount_reload(server: &MockServer, status: u16, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/-/reload"))
            .respond_with(ResponseTemplate::new(status))
            .expect(expected)
            .mount(server)
            .await;
    }

    async fn mount_config(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1/status/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[test]
    fn test_endpoint_urls() {
        let base = Url::parse("http://prometheus.monitoring:9090/prom/").expect("valid url");

        assert_eq!(
            endpoint(&base, "/-/reload").expect("joins").as_str(),
            "http://prometheus.monitoring:9090/prom/-/reload"
        );
        assert_eq!(
            endpoint(&base, "/api/v1/status/config").expect("joins").as_str(),
            "http://prometheus.monitoring:9090/prom/api/v1/status/config"
        );
    }

    #[tokio::test]
    async fn test_reload_throttling_window() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 2).await;
        let cancel = CancellationToken::new();

        f.reloader.request_reload();
        assert!(f.reloader.reload(&cancel).await.expect("first reload"));

        f.clock.advance(Duration::from_secs(5));
        f.reloader.request_reload();
        let err = f.reloader.reload(&cancel).await.expect_err("throttled");
        match err {
            Error::ReloadThrottle { remaining } => assert_eq!(remaining, Duration::from_secs(5)),
            other => panic!("expected throttle, got {other:?}"),
        }
        assert!(f.reloader.is_reload_requested());

        f.clock.advance(Duration::from_secs(6));
        assert!(f.reloader.reload(&cancel).await.expect("third reload"));

        assert_eq!(f.telemetry.count(RELOADS, &["success"]), 2);
        assert_eq!(f.telemetry.count(RELOADS, &["throttled"]), 1);
        assert_eq!(f.reloader.last_reload(), Some(f.clock.now()));
    }

    #[tokio::test]
    async fn test_requested_reload_skips_config_comparison() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 1).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/status/config"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&f.server)
            .await;

        f.reloader.request_reload();
        assert!(f
            .reloader
            .reload(&CancellationToken::new())
            .await
            .expect("reload"));
        assert!(!f.reloader.is_reload_requested());
    }

    #[tokio::test]
    async fn test_unchanged_config_is_not_reloaded() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 0).await;
        mount_config(
            &f.server,
            json!({ "status": "success", "data": { "yaml": CONFIGMAP_YAML } }),
        )
        .await;

        let reloaded = f
            .reloader
            .reload(&CancellationToken::new())
            .await
            .expect("comparison succeeds");

        assert!(!reloaded);
        assert_eq!(f.telemetry.count(RELOADS, &["unchanged"]), 1);
        assert_eq!(f.reloader.last_reload(), None);
    }

    #[tokio::test]
    async fn test_stale_config_is_reloaded() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 1).await;
        mount_config(
            &f.server,
            json!({ "status": "success", "data": { "yaml": "global: {}\n" } }),
        )
        .await;

        assert!(f
            .reloader
            .reload(&CancellationToken::new())
            .await
            .expect("reload"));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_request() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 503, 1).await;

        f.reloader.request_reload();
        let err = f
            .reloader
            .reload(&CancellationToken::new())
            .await
            .expect_err("non-200 fails");

        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
        assert!(f.reloader.is_reload_requested());
        assert_eq!(f.reloader.last_reload(), None);
        assert_eq!(f.telemetry.count(RELOADS, &["failed"]), 1);
    }

    #[tokio::test]
    async fn test_unsuccessful_status_is_execution_failed() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 0).await;
        mount_config(&f.server, json!({ "status": "error", "error": "not ready" })).await;

        let err = f
            .reloader
            .reload(&CancellationToken::new())
            .await
            .expect_err("status must be success");
        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }

    #[tokio::test]
    async fn test_missing_config_map_fails_comparison() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 0).await;
        mount_config(
            &f.server,
            json!({ "status": "success", "data": { "yaml": CONFIGMAP_YAML } }),
        )
        .await;
        f.kube.put_config_map(prometheus_config_map(
            "monitoring",
            "prometheus",
            "other.yml",
            CONFIGMAP_YAML,
        ));

        let err = f
            .reloader
            .reload(&CancellationToken::new())
            .await
            .expect_err("key is missing");
        assert_eq!(err.kind(), ErrorKind::ConfigMapKeyNotFound);
    }

    #[tokio::test]
    async fn test_cancelled_before_reload() {
        let f = fixture(Duration::from_secs(10)).await;
        mount_reload(&f.server, 200, 0).await;
        mount_config(
            &f.server,
            json!({ "status": "success", "data": { "yaml": "changed: true\n" } }),
        )
        .await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = f.reloader.reload(&cancel).await.expect_err("cancelled");
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }
}
