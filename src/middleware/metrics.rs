//! Request metrics middleware.
//!
//! Every request except the healthcheck produces a `vulcan.request.total` and
//! a `vulcan.request.duration` event, plus `vulcan.request.failed` for 4xx/5xx
//! answers. The
//! events go to the [`TRACING_TARGET`] target with the tags the dashboards
//! group by: component, action, entity, method and status.

use axum::{
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::info;

/// Tracing target for request metrics.
pub const TRACING_TARGET: &str = "scan_results::metrics";

const HEALTHCHECK_PATH: &str = "/healthcheck";

const GET_REPORT_PATH_PREFIX: &str = "/v1/reports";
const POST_REPORT_PATH_PREFIX: &str = "/v1/report";
const GET_LOG_PATH_PREFIX: &str = "/v1/logs";
const POST_LOG_PATH_PREFIX: &str = "/v1/raw";

const METRIC_TOTAL: &str = "vulcan.request.total";
const METRIC_DURATION: &str = "vulcan.request.duration";
const METRIC_FAILED: &str = "vulcan.request.failed";

const COMPONENT: &str = "results";

/// What a request does, for metric tagging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    PostReport,
    GetReport,
    PostLog,
    GetLog,
    Unknown,
}

impl RequestAction {
    pub fn from_request(method: &Method, path: &str) -> Self {
        if *method == Method::GET {
            if path.starts_with(GET_REPORT_PATH_PREFIX) {
                return Self::GetReport;
            }
            if path.starts_with(GET_LOG_PATH_PREFIX) {
                return Self::GetLog;
            }
        } else if *method == Method::POST {
            if path.starts_with(POST_REPORT_PATH_PREFIX) {
                return Self::PostReport;
            }
            if path.starts_with(POST_LOG_PATH_PREFIX) {
                return Self::PostLog;
            }
        }
        Self::Unknown
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostReport => "PostReport",
            Self::GetReport => "GetReport",
            Self::PostLog => "PostLog",
            Self::GetLog => "GetLog",
            Self::Unknown => "unknown",
        }
    }

    /// Artifact the action works on; empty for unknown actions.
    pub fn entity(self) -> &'static str {
        match self {
            Self::PostReport | Self::GetReport => "report",
            Self::PostLog | Self::GetLog => "log",
            Self::Unknown => "",
        }
    }
}

fn push_metric(
    metric: &'static str,
    value: u64,
    action: RequestAction,
    method: &Method,
    status: StatusCode,
) {
    info!(
        target: TRACING_TARGET,
        metric,
        value,
        component = COMPONENT,
        action = action.as_str(),
        entity = action.entity(),
        method = %method,
        status = status.as_u16(),
        "request metric"
    );
}

pub async fn track_request_metrics(request: Request, next: Next) -> Response {
    if request.uri().path() == HEALTHCHECK_PATH {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let action = RequestAction::from_request(&method, request.uri().path());

    let start_time = Instant::now();
    let response = next.run(request).await;
    let duration_ms = start_time.elapsed().as_millis() as u64;

    let status = response.status();
    let failed = status.is_client_error() || status.is_server_error();

    push_metric(METRIC_TOTAL, 1, action, &method, status);
    push_metric(METRIC_DURATION, duration_ms, action, &method, status);
    if failed {
        push_metric(METRIC_FAILED, 1, action, &method, status);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_requests() {
        let cases = [
            (Method::GET, "/v1/reports/dt=2019-11-16/scan=a/b.json", RequestAction::GetReport),
            (Method::GET, "/v1/logs/dt=2019-11-16/scan=a/b.log", RequestAction::GetLog),
            (Method::POST, "/v1/report", RequestAction::PostReport),
            (Method::POST, "/v1/raw", RequestAction::PostLog),
            (Method::GET, "/v1/report", RequestAction::Unknown),
            (Method::PUT, "/v1/raw", RequestAction::Unknown),
            (Method::GET, "/healthcheck", RequestAction::Unknown),
        ];

        for (method, path, expected) in cases {
            assert_eq!(
                RequestAction::from_request(&method, path),
                expected,
                "{method} {path}"
            );
        }
    }

    #[test]
    fn actions_map_to_entities() {
        assert_eq!(RequestAction::PostReport.entity(), "report");
        assert_eq!(RequestAction::GetLog.entity(), "log");
        assert_eq!(RequestAction::Unknown.as_str(), "unknown");
    }

    use axum::{
        Router,
        middleware::from_fn,
        routing::{get, post},
    };
    use axum_test::TestServer;
    use std::sync::{Arc, Mutex};
    use tracing::{
        Event, Subscriber,
        field::{Field, Visit},
    };
    use tracing_subscriber::{
        layer::{Context, Layer},
        prelude::*,
    };

    /// Records the `metric` field of every event.
    struct MetricNames(Arc<Mutex<Vec<String>>>);

    struct MetricField(Option<String>);

    impl Visit for MetricField {
        fn record_str(&mut self, field: &Field, value: &str) {
            if field.name() == "metric" {
                self.0 = Some(value.to_string());
            }
        }

        fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: Subscriber> Layer<S> for MetricNames {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MetricField(None);
            event.record(&mut visitor);
            if let Some(name) = visitor.0 {
                self.0.lock().unwrap().push(name);
            }
        }
    }

    #[tokio::test]
    async fn emits_dashboard_metric_names() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(MetricNames(names.clone())),
        );

        let app = Router::new()
            .route("/v1/report", post(|| async { StatusCode::BAD_REQUEST }))
            .route("/healthcheck", get(|| async { StatusCode::OK }))
            .layer(from_fn(track_request_metrics));
        let server = TestServer::new(app).unwrap();

        server.get("/healthcheck").await;
        assert!(names.lock().unwrap().is_empty());

        server.post("/v1/report").await;
        assert_eq!(
            *names.lock().unwrap(),
            vec![
                "vulcan.request.total",
                "vulcan.request.duration",
                "vulcan.request.failed"
            ]
        );
    }
}
