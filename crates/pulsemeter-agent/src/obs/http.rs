//! Request instrumentation hook.
//!
//! A request is opened with [`RequestMetrics::on_request_start`] and closed
//! exactly once with [`RequestMetrics::on_request_finish`]. The scoped form,
//! [`RequestGuard`], records an `aborted` request when it is dropped without
//! a status (client hung up, handler future cancelled).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;

use pulsemeter_core::{Counter, Histogram, MetricDescriptor, MetricRegistry, Result};

/// Route label for requests no route matched.
pub const UNMATCHED_ROUTE: &str = "unmatched";
/// Status label for requests that never produced a response.
pub const ABORTED_STATUS: &str = "aborted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Browser,
    Api,
}

impl ClientKind {
    /// A `User-Agent` header marks a browser; anything else is an API client.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if headers.contains_key(header::USER_AGENT) {
            ClientKind::Browser
        } else {
            ClientKind::Api
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ClientKind::Browser => "browser",
            ClientKind::Api => "api",
        }
    }
}

/// Collapse a status code into its class label.
pub fn status_bucket(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

struct InFlight {
    started: Instant,
    client: ClientKind,
}

pub struct RequestMetrics {
    requests: Counter,
    duration: Histogram,
    errors: Counter,
    in_flight: DashMap<u64, InFlight>,
    next_id: AtomicU64,
}

impl RequestMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self> {
        let requests = registry.register_counter(MetricDescriptor::counter(
            "http_requests_total",
            "Total number of HTTP requests",
        ))?;
        let duration = registry.register_histogram(
            MetricDescriptor::histogram("http_request_duration_seconds", "Request duration in seconds")
                .with_unit("seconds"),
        )?;
        let errors = registry.register_counter(MetricDescriptor::counter(
            "http_errors_total",
            "Total number of failed HTTP requests (status >= 400)",
        ))?;
        Ok(Self {
            requests,
            duration,
            errors,
            in_flight: DashMap::new(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn on_request_start(&self, request_id: u64, client: ClientKind) {
        let prev = self.in_flight.insert(
            request_id,
            InFlight {
                started: Instant::now(),
                client,
            },
        );
        if prev.is_some() {
            tracing::warn!(request_id, "request id reused; restarting its clock");
        }
    }

    pub fn on_request_finish(&self, request_id: u64, status: u16, route: &str, method: &str) {
        self.finish(request_id, status_bucket(status), status >= 400, route, method);
    }

    fn finish(&self, request_id: u64, status: &str, is_error: bool, route: &str, method: &str) {
        let Some((_, req)) = self.in_flight.remove(&request_id) else {
            tracing::warn!(request_id, route, "finish for unknown request; ignored");
            return;
        };
        let labels = [
            ("route", route),
            ("method", method),
            ("status", status),
            ("client", req.client.as_str()),
        ];
        self.requests.inc(&labels);
        self.duration.record_duration(req.started.elapsed(), &labels);
        if is_error {
            self.errors.inc(&labels);
        }
    }

    /// Open a request and hand back the guard that closes it.
    pub fn begin(
        self: &Arc<Self>,
        client: ClientKind,
        route: impl Into<String>,
        method: impl Into<String>,
    ) -> RequestGuard {
        let request_id = self.next_request_id();
        self.on_request_start(request_id, client);
        RequestGuard {
            metrics: Arc::clone(self),
            request_id,
            route: route.into(),
            method: method.into(),
            done: false,
        }
    }
}

#[must_use = "dropping the guard records the request as aborted"]
pub struct RequestGuard {
    metrics: Arc<RequestMetrics>,
    request_id: u64,
    route: String,
    method: String,
    done: bool,
}

impl RequestGuard {
    pub fn request_id(&self) -> u64 {
        self.request_id
    }

    pub fn finish(mut self, status: u16) {
        self.done = true;
        self.metrics
            .on_request_finish(self.request_id, status, &self.route, &self.method);
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        if !self.done {
            self.metrics
                .finish(self.request_id, ABORTED_STATUS, true, &self.route, &self.method);
        }
    }
}

/// axum middleware: one guard per request, labeled by the matched route template.
pub async fn track_requests(
    State(metrics): State<Arc<RequestMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_owned());
    let guard = metrics.begin(
        ClientKind::from_headers(req.headers()),
        route,
        req.method().as_str(),
    );

    let response = next.run(req).await;
    guard.finish(response.status().as_u16());
    response
}
