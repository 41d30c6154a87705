use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

pub use axum::http::StatusCode as Status;

/// How the `earthquakesJSON` route answers.
#[derive(Clone, Debug)]
pub enum Behavior {
    /// 200 with the catalog filtered to the requested box.
    Earthquakes,
    /// Same as `Earthquakes`, after sleeping.
    Delayed(Duration),
    /// 200 with a body that is not JSON.
    Malformed,
    /// The given status with a geonames-style JSON error body.
    Status(StatusCode),
}

#[derive(Debug)]
pub struct MockState {
    behavior: Behavior,
    hits: AtomicUsize,
}

impl MockState {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            hits: AtomicUsize::new(0),
        }
    }

    /// Number of requests the route has received.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Earthquake {
    pub datetime: String,
    pub depth: f64,
    pub lng: f64,
    pub src: String,
    pub eqid: String,
    pub magnitude: f64,
    pub lat: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EarthquakeList {
    pub earthquakes: Vec<Earthquake>,
}

#[derive(Debug, Deserialize)]
pub struct EarthquakeQuery {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub username: Option<String>,
}

pub type Shared = Arc<MockState>;

pub fn app(state: Shared) -> Router {
    Router::new()
        .route("/earthquakesJSON", get(earthquakes))
        .with_state(state)
}

pub async fn run(listener: TcpListener, state: Shared) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

/// Fixed set of events the server knows about.
pub fn catalog() -> Vec<Earthquake> {
    let quake = |datetime: &str, depth: f64, lng: f64, eqid: &str, magnitude: f64, lat: f64| Earthquake {
        datetime: datetime.to_string(),
        depth,
        lng,
        src: "us".to_string(),
        eqid: eqid.to_string(),
        magnitude,
        lat,
    };
    vec![
        quake("2011-03-11 04:46:23", 24.4, 142.369, "c0001xgp", 8.8, 38.322),
        quake("2023-02-06 01:17:34", 17.9, 37.0143, "us6000jllz", 7.8, 37.2256),
        quake("2003-05-21 18:44:19", 12.0, 3.634, "2003kda9", 6.8, 36.964),
        quake("2010-02-27 06:34:13", 35.0, -72.71, "2010tfan", 8.8, -35.8463),
        quake("2012-04-11 06:38:37", 22.9, 93.0632, "c000905e", 8.6, 2.311),
    ]
}

fn within(quake: &Earthquake, query: &EarthquakeQuery) -> bool {
    let (lng_min, lng_max) = if query.east <= query.west {
        (query.east, query.west)
    } else {
        (query.west, query.east)
    };
    (query.south..=query.north).contains(&quake.lat) && (lng_min..=lng_max).contains(&quake.lng)
}

fn error_body(status: StatusCode, message: &str) -> Response {
    let body = serde_json::json!({ "status": { "message": message, "value": status.as_u16() } });
    (status, Json(body)).into_response()
}

async fn earthquakes(State(state): State<Shared>, Query(query): Query<EarthquakeQuery>) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    debug!(hit, ?query, "earthquakesJSON");

    if query.username.as_deref().map_or(true, str::is_empty) {
        return error_body(
            StatusCode::UNAUTHORIZED,
            "Please add a username to each call in order for geonames to be able to identify the calling application.",
        );
    }

    match &state.behavior {
        Behavior::Earthquakes => {}
        Behavior::Delayed(delay) => tokio::time::sleep(*delay).await,
        Behavior::Malformed => {
            return (StatusCode::OK, [(header::CONTENT_TYPE, "text/html")], "<html>not json</html>").into_response();
        }
        Behavior::Status(status) => return error_body(*status, "simulated failure"),
    }

    let earthquakes = catalog().into_iter().filter(|q| within(q, &query)).collect();
    Json(EarthquakeList { earthquakes }).into_response()
}
