// # HTTP Control Surface
//
// Exposes the ControlPlane over HTTP.
//
// ## Routes
//
// All routes live under `/api/v1` and require the `X-API-Key` header.
//
// - `GET /api/v1/interfaces`: list monitored interfaces
// - `POST /api/v1/restart`: restart one interface, body `{"interface": "wg0"}`
//
// ## Status Codes
//
// | outcome | status |
// |---|---|
// | success | 200 |
// | malformed body, empty name, other interface in pinned mode | 400 |
// | missing or wrong API key | 401 |
// | interface not monitored | 404 |
// | restart failed | 500 |

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wg_ddns_core::config::ApiConfig;
use wg_ddns_core::control::{
    ControlError, ControlPlane, InterfacesResponse, RestartRequest, RestartResponse,
};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Time allowed for in-flight requests after shutdown begins
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ApiState {
    control: ControlPlane,
    api_key: Arc<str>,
}

/// Build the API router
pub fn router(control: ControlPlane, api_key: impl Into<String>) -> Router {
    let state = ApiState {
        control,
        api_key: Arc::from(api_key.into()),
    };

    let api = Router::new()
        .route("/interfaces", get(list_interfaces))
        .route("/restart", post(restart_interface))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api)
        .layer(middleware::from_fn(logging_middleware))
}

/// Bind the listener described by `config`
pub async fn bind(config: &ApiConfig) -> std::io::Result<TcpListener> {
    TcpListener::bind(config.bind_addr()).await
}

/// Serve `app` on `listener` until `shutdown` is cancelled
///
/// In-flight requests get [`SHUTDOWN_GRACE_PERIOD`] to finish; connections
/// still open after that are dropped.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!("API server listening on {}", listener.local_addr()?);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    })
    .into_future();
    tokio::pin!(server);

    let result = tokio::select! {
        result = &mut server => result,
        _ = shutdown.cancelled() => {
            match tokio::time::timeout(SHUTDOWN_GRACE_PERIOD, &mut server).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        "API server did not drain within {:?}, closing remaining connections",
                        SHUTDOWN_GRACE_PERIOD
                    );
                    Ok(())
                }
            }
        }
    };

    info!("API server stopped");
    result
}

async fn list_interfaces(State(state): State<ApiState>) -> Json<InterfacesResponse> {
    Json(state.control.list().await)
}

async fn restart_interface(
    State(state): State<ApiState>,
    payload: Result<Json<RestartRequest>, JsonRejection>,
) -> (StatusCode, Json<RestartResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!("Rejected restart request: {}", rejection);
            return failure(ControlError::InvalidRequest);
        }
    };

    match state.control.restart(request).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => failure(e),
    }
}

fn failure(error: ControlError) -> (StatusCode, Json<RestartResponse>) {
    (status_of(&error), Json(RestartResponse::failure(&error)))
}

/// HTTP status for a control error
pub fn status_of(error: &ControlError) -> StatusCode {
    match error {
        ControlError::InvalidRequest | ControlError::NotAllowed { .. } => StatusCode::BAD_REQUEST,
        ControlError::NotFound(_) => StatusCode::NOT_FOUND,
        ControlError::RestartFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn auth_middleware(State(state): State<ApiState>, req: Request, next: Next) -> Response {
    let authorized = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| key == &*state.api_key);

    if !authorized {
        warn!("API authentication failed from {}", client_addr(&req));
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid API key" })),
        )
            .into_response();
    }

    next.run(req).await
}

async fn logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let client = client_addr(&req);

    let response = next.run(req).await;

    info!(
        "API {} {} - {} - {:?} - {}",
        method,
        path,
        response.status().as_u16(),
        start.elapsed(),
        client
    );
    response
}

fn client_addr(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use wg_ddns_core::config::ServiceNaming;
    use wg_ddns_core::registry::{EndpointRegistry, MonitoredEndpoint};
    use wg_ddns_core::restart::RestartCoordinator;
    use wg_ddns_core::traits::{JobHandle, JobMode, JobResult, ServiceManager, UnitStatus};

    const KEY: &str = "test-key";

    #[derive(Clone)]
    struct RecordingManager {
        result: JobResult,
        restarted: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ServiceManager for RecordingManager {
        async fn list_units(&self) -> wg_ddns_core::Result<Vec<UnitStatus>> {
            Ok(Vec::new())
        }

        async fn restart_unit(
            &self,
            unit: &str,
            _mode: JobMode,
        ) -> wg_ddns_core::Result<JobHandle> {
            self.restarted.lock().unwrap().push(unit.to_string());
            Ok(JobHandle::completed(unit, self.result.clone()))
        }

        fn manager_name(&self) -> &'static str {
            "recording"
        }
    }

    fn app(pinned: Option<&str>, result: JobResult) -> (Router, Arc<Mutex<Vec<String>>>) {
        let restarted = Arc::new(Mutex::new(Vec::new()));
        let manager = RecordingManager {
            result,
            restarted: restarted.clone(),
        };
        let registry = EndpointRegistry::from_endpoints(vec![
            MonitoredEndpoint::new(
                "wg0",
                "vpn.example.com:51820",
                "vpn.example.com",
                Some("1.2.3.4".parse().unwrap()),
            ),
            MonitoredEndpoint::new("wg1", "other.example.com:51820", "other.example.com", None),
        ]);
        let coordinator = RestartCoordinator::new(
            Arc::new(manager),
            ServiceNaming::default(),
            Duration::from_secs(5),
        );
        let control = ControlPlane::new(registry, coordinator, pinned.map(str::to_string));
        (router(control, KEY), restarted)
    }

    fn get_interfaces(key: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/v1/interfaces");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_restart(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/v1/restart")
            .header(API_KEY_HEADER, KEY)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_missing_or_wrong_key_is_unauthorized() {
        let (app, _) = app(None, JobResult::Done);

        let response = app.clone().oneshot(get_interfaces(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Invalid API key");

        let response = app.oneshot(get_interfaces(Some("nope"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_interfaces() {
        let (app, _) = app(None, JobResult::Done);

        let response = app.oneshot(get_interfaces(Some(KEY))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["single_interface_mode"], false);
        assert!(body["monitored_interface"].is_null());
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["interfaces"][0]["interface"], "wg0");
        assert_eq!(body["interfaces"][0]["endpoint"], "vpn.example.com:51820");
        assert_eq!(body["interfaces"][0]["last_ip"], "1.2.3.4");
        assert!(body["interfaces"][1]["last_ip"].is_null());
    }

    #[tokio::test]
    async fn test_restart_success() {
        let (app, restarted) = app(None, JobResult::Done);

        let response = app.oneshot(post_restart(r#"{"interface":"wg1"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Interface 'wg1' restarted successfully");
        assert_eq!(*restarted.lock().unwrap(), vec!["wg-quick@wg1.service"]);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (app, restarted) = app(None, JobResult::Done);

        for body in ["not json", "{}", r#"{"interface":""}"#] {
            let response = app.clone().oneshot(post_restart(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            let json = json_body(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["message"], "Invalid request format");
        }
        assert!(restarted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_pinned_mode_rejects_other_interface() {
        let (app, restarted) = app(Some("wg0"), JobResult::Done);

        let response = app.oneshot(post_restart(r#"{"interface":"wg1"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await["message"],
            "Only interface 'wg0' is monitored"
        );
        assert!(restarted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_interface_is_not_found() {
        let (app, _) = app(None, JobResult::Done);

        let response = app.oneshot(post_restart(r#"{"interface":"wg9"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await["message"],
            "Interface 'wg9' not found in monitored interfaces"
        );
    }

    #[tokio::test]
    async fn test_failed_restart_is_server_error() {
        let (app, _) = app(None, JobResult::Failed);

        let response = app.oneshot(post_restart(r#"{"interface":"wg0"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let message = json_body(response).await["message"].as_str().unwrap().to_string();
        assert!(message.starts_with("Failed to restart interface: "));
        assert!(message.ends_with(": failed"));
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let (app, _) = app(None, JobResult::Done);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();

        let server = tokio::spawn(serve(listener, app, token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(10), server).await;
        assert!(result.is_ok(), "server should stop after cancellation");
        result.unwrap().unwrap().unwrap();
    }
}
