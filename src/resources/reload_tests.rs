// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `reload.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ErrorKind;
    use crate::test_support::{
        self, prometheus_config_map, FakeKube, ManualClock, RecordingTelemetry,
    };
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn step(server: &MockServer, clock: Arc<ManualClock>) -> (ReloadResource, Arc<Reloader>) {
        let kube = Arc::new(FakeKube::new());
        kube.put_config_map(prometheus_config_map(
            "monitoring",
            "prometheus",
            "prometheus.yml",
            "scrape_configs: []\n",
        ));
        let reloader = Arc::new(test_support::reloader(
            &server.uri(),
            Duration::from_secs(30),
            kube,
            clock,
            Arc::new(RecordingTelemetry::new()),
        ));
        (ReloadResource::new(reloader.clone()), reloader)
    }

    #[tokio::test]
    async fn test_stale_prometheus_is_reloaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/status/config"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "data": { "yaml": "scrape_configs:\n- job_name: outdated\n" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/-/reload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (resource, reloader) = step(&server, Arc::new(ManualClock::new())).await;
        let outcome = resource
            .run(&CancellationToken::new())
            .await
            .expect("reload succeeds");

        assert_eq!(resource.name(), "reload");
        assert_eq!(outcome, StepOutcome::Done);
        assert!(reloader.last_reload().is_some());
    }

    #[tokio::test]
    async fn test_throttle_becomes_delayed_revisit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/-/reload"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new());
        let (resource, reloader) = step(&server, clock.clone()).await;
        reloader.request_reload();
        resource
            .run(&CancellationToken::new())
            .await
            .expect("first reload");

        clock.advance(Duration::from_secs(12));
        let outcome = resource
            .run(&CancellationToken::new())
            .await
            .expect("throttle is not an error");

        assert_eq!(outcome, StepOutcome::KeepFinalizer(Duration::from_secs(18)));
    }

    #[tokio::test]
    async fn test_prometheus_failure_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/status/config"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (resource, _) = step(&server, Arc::new(ManualClock::new())).await;
        let err = resource
            .run(&CancellationToken::new())
            .await
            .expect_err("prometheus is unavailable");

        assert_eq!(err.kind(), ErrorKind::ExecutionFailed);
    }
}
