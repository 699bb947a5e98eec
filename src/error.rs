use thiserror::Error;

/// Construction-time failures of a geocoding strategy.
///
/// Domain invalidity (a query outside the covered swath, an unresolved
/// search, a masked-out target) is never an error: it is signalled through
/// the invalid sentinel on [`GeoPosition`](crate::position::GeoPosition) and
/// [`PixelPosition`](crate::position::PixelPosition).
#[derive(Error, Debug)]
pub enum GeocodingError {
    #[error("Incompatible grids: {0}")]
    GridMismatch(String),

    #[error("Not enough points: {needed} required, {got} given")]
    NotEnoughPoints { needed: usize, got: usize },

    #[error("Invalid raster shape: {0}")]
    Shape(String),

    #[error("Invalid subset region: {0}")]
    InvalidRegion(String),

    #[error("Fit failed: {0}")]
    FitFailed(String),
}
