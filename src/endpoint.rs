/// HTTP endpoint for querying the water level series
///
/// Provides a small REST API for dashboards and external tooling. The
/// query contract lives in `QueryService`; the HTTP binding around it is a
/// thin tiny_http shell.
///
/// Endpoints:
/// - GET /waterlevels?from=MS&to=MS - readings in an inclusive time range
/// - GET /waterlevels/current - latest live-gauge depth
/// - GET /health - service health check

use crate::db::WorkerId;
use crate::model::Reading;
use crate::monitor::LiveGauge;
use crate::store::WaterLevelStore;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Query service
// ---------------------------------------------------------------------------

/// Range-retrieval contract consumed by the HTTP layer.
///
/// Constructed with an explicit store reference and its own worker
/// identity; delegates straight to `WaterLevelStore::get_by_range` and
/// serializes the result. No additional logic belongs here.
pub struct QueryService {
    store: Arc<WaterLevelStore>,
    worker: WorkerId,
    gauge: LiveGauge,
}

impl QueryService {
    pub fn new(store: Arc<WaterLevelStore>, gauge: LiveGauge) -> Self {
        Self {
            store,
            worker: WorkerId::new("endpoint"),
            gauge,
        }
    }

    /// Readings with `from <= timestamp <= to`; absent `from` defaults to
    /// the epoch, absent `to` defaults to now.
    pub fn get_by_date_range(&self, from: Option<i64>, to: Option<i64>) -> Vec<Reading> {
        self.store.get_by_range(&self.worker, from, to)
    }

    /// Latest depth seen by the measurement loop, if any cycle has
    /// completed yet.
    pub fn current_depth(&self) -> Option<f64> {
        self.gauge.latest()
    }
}

// ---------------------------------------------------------------------------
// Query string parsing
// ---------------------------------------------------------------------------

/// Extracts an integer query parameter from a raw query string like
/// `from=1000&to=2000`. Missing and unparseable values both read as absent.
fn query_param(query: &str, name: &str) -> Option<i64> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.parse().ok())
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

/// Starts the HTTP endpoint server on the specified port. Runs until the
/// process exits; intended to be spawned on its own worker thread.
pub fn start_endpoint_server(port: u16, service: QueryService) -> Result<(), String> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| format!("Failed to start HTTP server: {}", e))?;

    println!("[endpoint] listening on http://0.0.0.0:{}", port);
    println!("   GET /waterlevels?from=MS&to=MS - query readings");
    println!("   GET /waterlevels/current - latest depth");
    println!("   GET /health - service health check");

    for request in server.incoming_requests() {
        let url = request.url().to_string();
        let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));

        let response = match path {
            "/health" => handle_health(),
            "/waterlevels" => handle_range_query(&service, query),
            "/waterlevels/current" => handle_current(&service),
            _ => create_response(
                404,
                serde_json::json!({
                    "error": "Not found",
                    "available_endpoints": ["/health", "/waterlevels", "/waterlevels/current"]
                }),
            ),
        };

        if let Err(e) = request.respond(response) {
            eprintln!("[endpoint] failed to send response: {}", e);
        }
    }

    Ok(())
}

fn handle_health() -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    create_response(
        200,
        serde_json::json!({
            "status": "ok",
            "service": "pitmon_service",
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

fn handle_range_query(
    service: &QueryService,
    query: &str,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let from = query_param(query, "from");
    let to = query_param(query, "to");

    let readings = service.get_by_date_range(from, to);
    create_response(200, serde_json::json!(readings))
}

fn handle_current(service: &QueryService) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    create_response(
        200,
        serde_json::json!({ "depth_cm": service.current_depth() }),
    )
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string(&json).unwrap();

    tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code))
        .with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
