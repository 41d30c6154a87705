//! The fixed earthquake endpoint a coordinator queries.
//!
//! # Design
//! `Endpoint` is plain configuration: it is built once, handed to the
//! coordinator by value and never mutated afterwards. Every field has a serde
//! default so a host can override only what it cares about, e.g.
//! `{"username":"demo"}`.

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://api.geonames.org";
pub const DEFAULT_USERNAME: &str = "aporter";

/// Geographic box the query is restricted to, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            north: 44.1,
            south: -9.9,
            east: -22.4,
            west: 55.2,
        }
    }
}

/// Where and what to fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default = "default_base_url")]
    base_url: String,

    #[serde(default)]
    bounds: BoundingBox,

    #[serde(default = "default_username")]
    username: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, BoundingBox::default(), DEFAULT_USERNAME)
    }
}

impl Endpoint {
    pub fn new(base_url: &str, bounds: BoundingBox, username: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bounds,
            username: username.to_string(),
        }
    }

    /// Parse an endpoint from JSON; absent fields take their defaults.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let mut endpoint: Endpoint = serde_json::from_str(raw)?;
        endpoint.base_url = endpoint.base_url.trim_end_matches('/').to_string();
        debug!(base_url = %endpoint.base_url, "Endpoint::from_json: parsed");
        Ok(endpoint)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Full request URL, query string included.
    pub fn url(&self) -> String {
        let BoundingBox {
            north,
            south,
            east,
            west,
        } = self.bounds;
        format!(
            "{}/earthquakesJSON?north={north}&south={south}&east={east}&west={west}&username={}",
            self.base_url, self.username
        )
    }
}
