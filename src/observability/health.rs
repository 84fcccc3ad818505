//! Health check HTTP server for container orchestration
//!
//! Serves service status on a separate port so probes never compete with
//! dashboard traffic.

use crate::observability::metrics::{current_timestamp, metrics};
use crate::store::DocumentStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

/// Share of failed uploads above which the upload check reports degraded
const UPLOAD_FAILURE_RATIO_LIMIT: f64 = 0.5;
/// Uploads needed before the failure ratio is considered
const UPLOAD_FAILURE_MIN_SAMPLE: u64 = 5;

/// HTTP health check server
pub struct HealthServer {
    service_name: String,
    port: u16,
    store: Arc<dyn DocumentStore>,
    api_listening: Arc<AtomicBool>,
}

impl HealthServer {
    pub fn new(service_name: impl Into<String>, port: u16, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            service_name: service_name.into(),
            port,
            store,
            api_listening: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark whether the dashboard API listener is accepting connections
    pub fn set_api_listening(&self, listening: bool) {
        self.api_listening.store(listening, Ordering::Relaxed);
    }

    /// Probe routes, exposed separately so they can be exercised without a socket
    pub fn routes(
        self: Arc<Self>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let health_server = self.clone();
        let ready_server = self.clone();

        // GET /health - comprehensive health status
        let health_route = warp::path("health")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let server = health_server.clone();
                async move {
                    let status = server.get_health_status().await;
                    let code = if status.status == "healthy" {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, Infallible>(warp::reply::with_status(warp::reply::json(&status), code))
                }
            });

        // GET /metrics - complete metrics export
        let metrics_route = warp::path("metrics")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| warp::reply::json(&metrics().get_metrics()));

        // GET /ready - readiness probe
        let ready_route = warp::path("ready")
            .and(warp::path::end())
            .and(warp::get())
            .and_then(move || {
                let server = ready_server.clone();
                async move {
                    let ready = server.api_listening.load(Ordering::Relaxed)
                        && server.store.health_check().await.is_ok();
                    let response = ReadinessResponse {
                        ready,
                        timestamp: current_timestamp(),
                    };
                    let code = if ready {
                        StatusCode::OK
                    } else {
                        StatusCode::SERVICE_UNAVAILABLE
                    };
                    Ok::<_, Infallible>(warp::reply::with_status(warp::reply::json(&response), code))
                }
            });

        // GET /live - liveness probe
        let live_route = warp::path("live")
            .and(warp::path::end())
            .and(warp::get())
            .map(|| {
                warp::reply::json(&LivenessResponse {
                    alive: true,
                    timestamp: current_timestamp(),
                })
            });

        // GET / - endpoint index
        let root_route = warp::path::end().and(warp::get()).map(|| {
            let endpoints: BTreeMap<&str, &str> = [
                ("/health", "Overall health status with detailed checks"),
                ("/metrics", "Upload, login and API metrics"),
                ("/ready", "Readiness probe"),
                ("/live", "Liveness probe"),
            ]
            .into_iter()
            .collect();
            warp::reply::json(&ApiDocumentationResponse { endpoints })
        });

        health_route
            .or(metrics_route)
            .or(ready_route)
            .or(live_route)
            .or(root_route)
            .with(warp::cors().allow_any_origin())
    }

    /// Start the HTTP health server
    pub async fn start(self: Arc<Self>, bind_address: &str) -> Result<(), std::net::AddrParseError> {
        let addr: SocketAddr = format!("{bind_address}:{}", self.port).parse()?;
        tracing::info!(%addr, "Starting health server");
        warp::serve(self.routes()).run(addr).await;
        Ok(())
    }

    async fn get_health_status(&self) -> HealthStatus {
        let now = current_timestamp();

        let checks = BTreeMap::from([
            ("store", self.check_store().await),
            ("api", self.check_api()),
            ("uploads", self.check_uploads()),
        ]);

        let overall_healthy = checks.values().all(|check| check.status == "healthy");
        metrics().update_health_status(overall_healthy);

        HealthStatus {
            status: if overall_healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: now,
            service: self.service_name.clone(),
            uptime_seconds: metrics().get_metrics().lifecycle.uptime_seconds,
            checks,
        }
    }

    async fn check_store(&self) -> HealthCheck {
        match self.store.health_check().await {
            Ok(()) => HealthCheck::healthy("Store reachable"),
            Err(e) => HealthCheck::new("unhealthy", format!("Store check failed: {e}")),
        }
    }

    fn check_api(&self) -> HealthCheck {
        if self.api_listening.load(Ordering::Relaxed) {
            HealthCheck::healthy("API listener accepting connections")
        } else {
            HealthCheck::new("unhealthy", "API listener not started")
        }
    }

    fn check_uploads(&self) -> HealthCheck {
        let snapshot = metrics().get_metrics().uploads;
        let last = snapshot.last_upload;
        if snapshot.uploads_received < UPLOAD_FAILURE_MIN_SAMPLE {
            let message = if last == 0 {
                "No uploads processed yet".to_string()
            } else {
                format!("Last upload at {last}")
            };
            return HealthCheck::healthy(message);
        }

        let ratio = snapshot.uploads_failed as f64 / snapshot.uploads_received as f64;
        if ratio > UPLOAD_FAILURE_RATIO_LIMIT {
            HealthCheck::new(
                "degraded",
                format!(
                    "{} of {} uploads failed",
                    snapshot.uploads_failed, snapshot.uploads_received
                ),
            )
        } else {
            HealthCheck::healthy(format!("{} uploads processed", snapshot.uploads_received))
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub message: Option<String>,
    pub last_check: u64,
}

impl HealthCheck {
    pub fn new(status: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: Some(message.into()),
            last_check: current_timestamp(),
        }
    }

    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new("healthy", message)
    }
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: String,
    timestamp: u64,
    service: String,
    uptime_seconds: u64,
    checks: BTreeMap<&'static str, HealthCheck>,
}

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    ready: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: u64,
}

#[derive(Debug, Serialize)]
struct ApiDocumentationResponse {
    endpoints: BTreeMap<&'static str, &'static str>,
}
