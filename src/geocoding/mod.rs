//! Geocoding strategies and their common dispatch surface.
//!
//! A geocoding answers `pixel -> geo` and `geo -> pixel` queries for one
//! raster scene. Exactly one strategy is active per scene, selected when
//! the geocoding is constructed; the closed [`Geocoder`] enum keeps the
//! strategies swappable behind one capability-tested interface.

pub mod gcp;
pub mod pixel_search;
pub mod tie_point;

pub use gcp::{GcpGeocoding, GroundControlPoint, Method};
pub use pixel_search::{PixelPositionEstimator, PixelSearchConfig, PixelSearchGeocoding};
pub use tie_point::TiePointGeocoding;

use crate::error::GeocodingError;
use crate::position::{GeoPosition, PixelPosition};
use crate::raster::{SceneGeometry, SubsetRegion};

/// Conversion between pixel and geographic coordinates for one scene.
///
/// Queries never fail with an error: a position outside the geocoding's
/// domain is answered with the invalid sentinel. Implementations are safe
/// for concurrent read access once constructed.
pub trait Geocoding: Send + Sync {
    /// Whether `geo_to_pixel` can produce valid results at all (e.g. a
    /// degenerate fit may lack the inverse direction).
    fn can_get_pixel_pos(&self) -> bool;

    /// Whether `pixel_to_geo` can produce valid results at all.
    fn can_get_geo_pos(&self) -> bool;

    /// Pixel position for a geographic position, or the invalid sentinel.
    fn geo_to_pixel(&self, geo: GeoPosition) -> PixelPosition;

    /// Geographic position for a pixel position, or the invalid sentinel.
    fn pixel_to_geo(&self, pixel: PixelPosition) -> GeoPosition;

    /// Whether the geographic boundary of the scene crosses the 180
    /// degree meridian.
    fn is_crossing_meridian_at_180(&self) -> bool;

    /// Raster dimensions this geocoding is valid for.
    fn scene(&self) -> SceneGeometry;
}

/// The closed set of geocoding strategies.
#[derive(Debug)]
pub enum Geocoder {
    TiePoint(TiePointGeocoding),
    Gcp(GcpGeocoding),
    PixelSearch(PixelSearchGeocoding),
}

impl Geocoder {
    /// Produces an equivalent geocoding for a cropped, sub-sampled scene.
    ///
    /// Tie-point grids are resampled, GCPs are coordinate-shifted and the
    /// fit is rebuilt, pixel-search bands are cropped.
    pub fn transfer(
        &self,
        region: &SubsetRegion,
        step_x: usize,
        step_y: usize,
    ) -> Result<Geocoder, GeocodingError> {
        match self {
            Geocoder::TiePoint(g) => g.transfer(region, step_x, step_y).map(Geocoder::TiePoint),
            Geocoder::Gcp(g) => g.transfer(region, step_x, step_y).map(Geocoder::Gcp),
            Geocoder::PixelSearch(g) => {
                g.transfer(region, step_x, step_y).map(Geocoder::PixelSearch)
            }
        }
    }
}

impl Geocoding for Geocoder {
    fn can_get_pixel_pos(&self) -> bool {
        match self {
            Geocoder::TiePoint(g) => g.can_get_pixel_pos(),
            Geocoder::Gcp(g) => g.can_get_pixel_pos(),
            Geocoder::PixelSearch(g) => g.can_get_pixel_pos(),
        }
    }

    fn can_get_geo_pos(&self) -> bool {
        match self {
            Geocoder::TiePoint(g) => g.can_get_geo_pos(),
            Geocoder::Gcp(g) => g.can_get_geo_pos(),
            Geocoder::PixelSearch(g) => g.can_get_geo_pos(),
        }
    }

    fn geo_to_pixel(&self, geo: GeoPosition) -> PixelPosition {
        match self {
            Geocoder::TiePoint(g) => g.geo_to_pixel(geo),
            Geocoder::Gcp(g) => g.geo_to_pixel(geo),
            Geocoder::PixelSearch(g) => g.geo_to_pixel(geo),
        }
    }

    fn pixel_to_geo(&self, pixel: PixelPosition) -> GeoPosition {
        match self {
            Geocoder::TiePoint(g) => g.pixel_to_geo(pixel),
            Geocoder::Gcp(g) => g.pixel_to_geo(pixel),
            Geocoder::PixelSearch(g) => g.pixel_to_geo(pixel),
        }
    }

    fn is_crossing_meridian_at_180(&self) -> bool {
        match self {
            Geocoder::TiePoint(g) => g.is_crossing_meridian_at_180(),
            Geocoder::Gcp(g) => g.is_crossing_meridian_at_180(),
            Geocoder::PixelSearch(g) => g.is_crossing_meridian_at_180(),
        }
    }

    fn scene(&self) -> SceneGeometry {
        match self {
            Geocoder::TiePoint(g) => g.scene(),
            Geocoder::Gcp(g) => g.scene(),
            Geocoder::PixelSearch(g) => g.scene(),
        }
    }
}
