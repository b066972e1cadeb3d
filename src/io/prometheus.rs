//! Prometheus metrics HTTP endpoint
//!
//! Exposes service metrics in Prometheus text format at /metrics, a liveness
//! probe at /health and the tracker status as JSON at /tracker.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS};
use crate::services::tracker::Tracker;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    site: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    avg: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in METRICS_BUCKET_BOUNDS.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{site=\"{site}\",le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let sum = avg * count;
    let _ = writeln!(output, "{name}_sum{{site=\"{site}\"}} {sum}");
    let _ = writeln!(output, "{name}_count{{site=\"{site}\"}} {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, site_id: &str) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(4096);

    write_tracking_metrics(&mut output, site_id, &summary);
    write_reward_metrics(&mut output, site_id, &summary);
    write_oracle_metrics(&mut output, site_id, &summary);

    output
}

fn write_tracking_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "tourguide_users_registered",
        "Users in the directory",
        MetricType::Gauge,
        site,
        summary.users_registered,
    );
    write_metric(
        output,
        "tourguide_tracking_cycles_total",
        "Completed tracking cycles",
        MetricType::Counter,
        site,
        summary.tracking_cycles_total,
    );
    write_metric(
        output,
        "tourguide_last_cycle_duration_ms",
        "Duration of the last tracking cycle",
        MetricType::Gauge,
        site,
        summary.last_cycle_duration_ms,
    );
    write_metric(
        output,
        "tourguide_locations_tracked_total",
        "Locations fetched and appended to a user",
        MetricType::Counter,
        site,
        summary.locations_tracked_total,
    );
    write_metric(
        output,
        "tourguide_tracking_failures_total",
        "Users whose tracking failed within a cycle",
        MetricType::Counter,
        site,
        summary.tracking_failures_total,
    );
    write_histogram(
        output,
        "tourguide_gps_latency_ms",
        "GPS provider latency in milliseconds",
        site,
        &summary.gps_lat_buckets,
        summary.gps_lat_avg_ms,
    );
}

fn write_reward_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "tourguide_reward_computations_total",
        "Per-user reward computations that succeeded",
        MetricType::Counter,
        site,
        summary.reward_computations_total,
    );
    write_metric(
        output,
        "tourguide_reward_failures_total",
        "Per-user reward computations that failed",
        MetricType::Counter,
        site,
        summary.reward_failures_total,
    );
    write_metric(
        output,
        "tourguide_rewards_granted_total",
        "Rewards added to users",
        MetricType::Counter,
        site,
        summary.rewards_granted_total,
    );
    write_metric(
        output,
        "tourguide_duplicate_rewards_rejected_total",
        "Rewards dropped because the user already held one for the attraction",
        MetricType::Counter,
        site,
        summary.duplicate_rewards_rejected_total,
    );
}

fn write_oracle_metrics(output: &mut String, site: &str, summary: &MetricsSummary) {
    write_metric(
        output,
        "tourguide_oracle_calls_total",
        "Reward oracle calls",
        MetricType::Counter,
        site,
        summary.oracle_calls_total,
    );
    write_metric(
        output,
        "tourguide_oracle_failures_total",
        "Reward oracle calls that failed",
        MetricType::Counter,
        site,
        summary.oracle_failures_total,
    );
    write_histogram(
        output,
        "tourguide_oracle_latency_ms",
        "Reward oracle latency in milliseconds",
        site,
        &summary.oracle_lat_buckets,
        summary.oracle_lat_avg_ms,
    );
    write_metric(
        output,
        "tourguide_oracle_latency_p99_ms",
        "99th percentile reward oracle latency",
        MetricType::Gauge,
        site,
        summary.oracle_lat_p99_ms,
    );
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    site_id: Arc<String>,
    tracker: Option<Arc<Tracker>>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &site_id);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        (&Method::GET, "/tracker") => match tracker {
            Some(tracker) => match serde_json::to_string(&tracker.status()) {
                Ok(body) => Ok(json_response(StatusCode::OK, body)),
                Err(e) => {
                    error!(error = %e, "tracker_status_encode_failed");
                    Ok(json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        r#"{"error":"encode_failed"}"#.to_string(),
                    ))
                }
            },
            None => Ok(json_response(
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"error":"tracker_not_configured"}"#.to_string(),
            )),
        },
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    site_id: String,
    tracker: Option<Arc<Tracker>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let site_id = Arc::new(site_id);

    info!(port = %port, site = %site_id, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let site_id = site_id.clone();
                        let tracker = tracker.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let site_id = site_id.clone();
                                let tracker = tracker.clone();
                                async move { handle_request(req, metrics, site_id, tracker).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();

        metrics.record_oracle_call(150, true);
        metrics.record_oracle_call(250, false);
        metrics.record_reward_insert(true);
        metrics.record_tracking_cycle(42);
        metrics.set_users_registered(100);

        let output = format_prometheus_metrics(&metrics, "tourguide");

        assert!(output.contains("tourguide_users_registered{site=\"tourguide\"} 100"));
        assert!(output.contains("tourguide_tracking_cycles_total{site=\"tourguide\"} 1"));
        assert!(output.contains("tourguide_oracle_calls_total{site=\"tourguide\"} 2"));
        assert!(output.contains("tourguide_oracle_failures_total{site=\"tourguide\"} 1"));
        assert!(output.contains("tourguide_rewards_granted_total{site=\"tourguide\"} 1"));
        assert!(output.contains("tourguide_oracle_latency_ms_bucket{site=\"tourguide\",le=\"+Inf\"} 2"));
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let mut buckets = [0u64; METRICS_NUM_BUCKETS];
        buckets[0] = 2;
        buckets[3] = 1;
        let mut output = String::new();
        write_histogram(&mut output, "h", "help", "s", &buckets, 10);

        assert!(output.contains("h_bucket{site=\"s\",le=\"5\"} 2"));
        assert!(output.contains("h_bucket{site=\"s\",le=\"50\"} 3"));
        assert!(output.contains("h_count{site=\"s\"} 3"));
        assert!(output.contains("h_sum{site=\"s\"} 30"));
    }
}
