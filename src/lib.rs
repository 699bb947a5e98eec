//! Geo-referencing engine for swath rasters.
//!
//! Converts between image pixel coordinates and geographic (lat/lon)
//! coordinates using one of several interchangeable strategies:
//!
//! * [`TiePointGeocoding`](geocoding::TiePointGeocoding) — piecewise
//!   polynomial approximation over sparse tie-point grids,
//! * [`GcpGeocoding`](geocoding::GcpGeocoding) — global rational-function
//!   fit over scattered ground control points,
//! * [`PixelSearchGeocoding`](geocoding::PixelSearchGeocoding) — iterative
//!   nearest-neighbor search over per-pixel lat/lon bands.
//!
//! All strategies answer queries through the common
//! [`Geocoding`](geocoding::Geocoding) trait and are safe for concurrent
//! read access once constructed. Out-of-domain queries return the invalid
//! sentinel position, never an error.

pub mod error;
pub mod fitting;
pub mod geocoding;
pub mod position;
pub mod raster;
pub mod rotation;

pub use error::GeocodingError;
pub use geocoding::{Geocoder, Geocoding};
pub use position::{GeoPosition, PixelPosition};
