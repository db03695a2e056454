//! # HTTP Transport
//!
//! `POST /describe_table` answers with one JSON document. `POST /list_splits`
//! and `POST /read_splits` answer with a stream of frames, one per response.
//! Dropping the body closes the response queue, which cancels the request.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::errors::{ServerError, ServerResult};
use super::frame::encode_frame;
use super::service::ConnectorService;
use crate::api::{
    DescribeTableRequest, DescribeTableResponse, ListSplitsRequest, ListSplitsResponse,
    ReadSplitsRequest, ReadSplitsResponse,
};
use crate::config::ServerConfig;
use crate::observability::{Event, Logger};

/// Content type of framed streaming bodies
pub const FRAMED_CONTENT_TYPE: &str = "application/x-fq-frames";

/// Responses buffered between the service and the socket
const RESPONSE_QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub data_sources: Vec<String>,
}

pub struct HttpServer {
    addr: String,
    router: Router,
}

impl HttpServer {
    pub fn new(config: &ServerConfig, service: Arc<ConnectorService>) -> Self {
        Self {
            addr: config.endpoint.socket_addr(),
            router: build_router(service, &config.cors_origins),
        }
    }

    pub fn socket_addr(&self) -> &str {
        &self.addr
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serves until ctrl-c
    pub async fn start(self) -> ServerResult<()> {
        let addr: SocketAddr = self
            .addr
            .parse()
            .map_err(|_| ServerError::InvalidAddress(self.addr.clone()))?;
        let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
            addr: self.addr.clone(),
            reason: e.to_string(),
        })?;

        Logger::info(Event::Serving.as_str(), &[("addr", self.addr.as_str())]);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;
        Logger::info(Event::ShutdownComplete.as_str(), &[]);
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        Logger::info(Event::ShutdownStart.as_str(), &[("signal", "ctrl_c")]);
    }
}

pub fn build_router(service: Arc<ConnectorService>, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/describe_table", post(describe_table_handler))
        .route("/list_splits", post(list_splits_handler))
        .route("/read_splits", post(read_splits_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(service)
}

async fn health_handler(State(service): State<Arc<ConnectorService>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data_sources: service
            .sources()
            .kinds()
            .iter()
            .map(|k| k.as_str().to_string())
            .collect(),
    };
    (StatusCode::OK, Json(response))
}

async fn metrics_handler(State(service): State<Arc<ConnectorService>>) -> impl IntoResponse {
    (StatusCode::OK, Json(service.metrics().snapshot()))
}

async fn describe_table_handler(
    State(service): State<Arc<ConnectorService>>,
    Json(request): Json<DescribeTableRequest>,
) -> Json<DescribeTableResponse> {
    Json(service.describe_table(request).await)
}

async fn list_splits_handler(
    State(service): State<Arc<ConnectorService>>,
    Json(request): Json<ListSplitsRequest>,
) -> Response {
    let (tx, rx) = mpsc::channel::<ListSplitsResponse>(RESPONSE_QUEUE_CAPACITY);
    tokio::spawn(async move {
        // A closed stream was already logged and counted by the service
        let _ = service.list_splits(request, &tx).await;
    });
    framed_body(rx)
}

async fn read_splits_handler(
    State(service): State<Arc<ConnectorService>>,
    Json(request): Json<ReadSplitsRequest>,
) -> Response {
    let (tx, rx) = mpsc::channel::<ReadSplitsResponse>(RESPONSE_QUEUE_CAPACITY);
    tokio::spawn(async move {
        let _ = service.read_splits(request, &tx).await;
    });
    framed_body(rx)
}

fn framed_body<T>(rx: mpsc::Receiver<T>) -> Response
where
    T: Serialize + Send + 'static,
{
    let frames = stream::unfold(rx, |mut rx| async move {
        let message = rx.recv().await?;
        let frame = encode_frame(&message).map(Bytes::from).map_err(|e| {
            let reason = e.to_string();
            Logger::error(Event::FrameRejected.as_str(), &[("reason", reason.as_str())]);
            io::Error::new(io::ErrorKind::InvalidData, reason)
        });
        Some((frame, rx))
    });

    (
        [(header::CONTENT_TYPE, FRAMED_CONTENT_TYPE)],
        Body::from_stream(frames),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::DataSourceCollection;
    use crate::observability::MetricsRegistry;
    use axum::http::Request;
    use tower::ServiceExt;

    fn router() -> Router {
        let config = ServerConfig::default();
        let service = ConnectorService::new(
            &config,
            DataSourceCollection::new(),
            Arc::new(MetricsRegistry::new()),
        );
        HttpServer::new(&config, Arc::new(service)).router()
    }

    #[test]
    fn test_server_address() {
        let config = ServerConfig::default();
        let service = ConnectorService::new(
            &config,
            DataSourceCollection::new(),
            Arc::new(MetricsRegistry::new()),
        );
        let server = HttpServer::new(&config, Arc::new(service));
        assert_eq!(server.socket_addr(), "0.0.0.0:2130");
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_request_rejected_by_extractor() {
        let response = router()
            .oneshot(
                Request::post("/read_splits")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
