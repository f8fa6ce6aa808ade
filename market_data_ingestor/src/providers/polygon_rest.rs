//! Polygon.io REST provider: aggregate bars and the earnings calendar.

pub mod params;
pub mod provider;
pub mod response;

pub use params::{PolygonAggsParams, Sort};
pub use provider::PolygonProvider;

/// Public Polygon endpoint, overridable through `POLYGON_BASE_URL`.
pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
