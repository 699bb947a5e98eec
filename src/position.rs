//! Geographic and pixel position value types plus angle helpers.
//!
//! Both position types use NaN fields as the "invalid" sentinel: an
//! unresolved query is answered with an invalid position rather than an
//! error, since out-of-coverage queries are the expected path during
//! normal use.

/// A geographic position in decimal degrees (WGS-84).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPosition {
    /// The invalid sentinel (NaN lat/lon).
    pub const INVALID: GeoPosition = GeoPosition {
        lat: f64::NAN,
        lon: f64::NAN,
    };

    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// A position is valid when its latitude is in [-90, 90] and its
    /// longitude is finite.
    pub fn is_valid(&self) -> bool {
        self.lat >= -90.0 && self.lat <= 90.0 && self.lon.is_finite()
    }
}

/// An image pixel position, (0, 0) at the upper-left corner of pixel (0, 0).
/// Fractional values address sub-pixel locations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelPosition {
    pub x: f64,
    pub y: f64,
}

impl PixelPosition {
    /// The invalid sentinel (NaN coordinates).
    pub const INVALID: PixelPosition = PixelPosition {
        x: f64::NAN,
        y: f64::NAN,
    };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Latitude normalization: NaN outside [-90, 90], identity otherwise.
pub fn normalize_lat(lat: f64) -> f64 {
    if !(-90.0..=90.0).contains(&lat) {
        return f64::NAN;
    }
    lat
}

/// The smaller absolute difference of two angles in degrees,
/// in the range [0, 180].
pub fn lon_diff(a1: f64, a2: f64) -> f64 {
    let mut d = (a1 - a2).abs();
    if d > 180.0 {
        d = 360.0 - d;
    }
    d
}

/// Bilinear interpolation over a 2x2 neighborhood.
///
/// `wx` and `wy` are the fractional weights toward the second column/row.
pub fn interpolate2d(wx: f64, wy: f64, d00: f64, d10: f64, d01: f64, d11: f64) -> f64 {
    d00 + wx * (d10 - d00) + wy * (d01 - d00) + wx * wy * (d11 + d00 - d01 - d10)
}

/// Bilinear interpolation of longitudes over a 2x2 neighborhood.
///
/// When the neighborhood spans more than 180 degrees of longitude the
/// values straddle the antimeridian; plain interpolation would sweep
/// through the wrong hemisphere. In that case the sine and cosine of the
/// angles are interpolated separately and recombined with atan2.
pub fn interpolate_lon(wx: f64, wy: f64, d00: f64, d10: f64, d01: f64, d11: f64) -> f64 {
    let min = d00.min(d10).min(d01).min(d11);
    let max = d00.max(d10).max(d01).max(d11);
    if max - min > 180.0 {
        let (s00, c00) = d00.to_radians().sin_cos();
        let (s10, c10) = d10.to_radians().sin_cos();
        let (s01, c01) = d01.to_radians().sin_cos();
        let (s11, c11) = d11.to_radians().sin_cos();
        let sin = interpolate2d(wx, wy, s00, s10, s01, s11);
        let cos = interpolate2d(wx, wy, c00, c10, c01, c11);
        sin.atan2(cos).to_degrees()
    } else {
        interpolate2d(wx, wy, d00, d10, d01, d11)
    }
}
