//! Geocoding fitted to scattered ground control points.
//!
//! Both directions are rational-function surfaces fitted over the GCPs in
//! a rotated spherical frame. Rotating the points onto the equator near
//! the prime meridian first keeps the surfaces free of pole and
//! antimeridian distortions regardless of where the scene sits.

use crate::error::GeocodingError;
use crate::fitting::{RationalFunctionFitter, RationalFunctionSurface};
use crate::geocoding::Geocoding;
use crate::position::{GeoPosition, PixelPosition};
use crate::raster::{SceneGeometry, SubsetRegion};
use crate::rotation::SphericalRotator;

/// Reweighting passes applied after the initial linear fit.
const FIT_ITERATIONS: usize = 2;

/// A single ground control point tying a pixel position to a geographic
/// position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundControlPoint {
    pub pixel: PixelPosition,
    pub geo: GeoPosition,
}

impl GroundControlPoint {
    pub fn new(pixel: PixelPosition, geo: GeoPosition) -> Self {
        Self { pixel, geo }
    }
}

/// Surface degree used for both numerator and denominator of the fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Polynomial1,
    Polynomial2,
    Polynomial3,
}

impl Method {
    pub fn degree(self) -> usize {
        match self {
            Method::Polynomial1 => 1,
            Method::Polynomial2 => 2,
            Method::Polynomial3 => 3,
        }
    }

    /// Fewest GCPs that determine a surface of this degree.
    pub fn min_points(self) -> usize {
        let d = self.degree();
        (d + 1) * (d + 2) / 2
    }
}

/// Geocoding interpolated from ground control points.
#[derive(Debug)]
pub struct GcpGeocoding {
    gcps: Vec<GroundControlPoint>,
    method: Method,
    rotator: SphericalRotator,
    /// Forward surfaces map pixel (x, y) to rotated-frame coordinates.
    forward_lat: RationalFunctionSurface,
    forward_lon: RationalFunctionSurface,
    /// Inverse surfaces map rotated-frame (lon, lat) to pixel coordinates.
    inverse_x: RationalFunctionSurface,
    inverse_y: RationalFunctionSurface,
    scene: SceneGeometry,
    crossing: bool,
}

impl GcpGeocoding {
    /// Fits a geocoding of the given degree to the control points.
    ///
    /// Fails when fewer than [`Method::min_points`] GCPs are supplied or
    /// when any GCP carries an invalid position. A poorly conditioned
    /// point layout does not fail; it surfaces as a degenerate fit whose
    /// direction is reported unavailable.
    pub fn new(
        gcps: Vec<GroundControlPoint>,
        method: Method,
        scene: SceneGeometry,
    ) -> Result<Self, GeocodingError> {
        if gcps.len() < method.min_points() {
            return Err(GeocodingError::NotEnoughPoints {
                needed: method.min_points(),
                got: gcps.len(),
            });
        }
        if scene.width == 0 || scene.height == 0 {
            return Err(GeocodingError::Shape("empty scene".into()));
        }
        if let Some(bad) = gcps.iter().find(|g| !g.pixel.is_valid() || !g.geo.is_valid()) {
            return Err(GeocodingError::FitFailed(format!(
                "invalid ground control point at pixel ({}, {})",
                bad.pixel.x, bad.pixel.y
            )));
        }

        let geo_points: Vec<GeoPosition> = gcps.iter().map(|g| g.geo).collect();
        let rotator = SphericalRotator::for_points(&geo_points);

        let mut lons: Vec<f64> = gcps.iter().map(|g| g.geo.lon).collect();
        let mut lats: Vec<f64> = gcps.iter().map(|g| g.geo.lat).collect();
        rotator.transform_slices(&mut lons, &mut lats);
        let xs: Vec<f64> = gcps.iter().map(|g| g.pixel.x).collect();
        let ys: Vec<f64> = gcps.iter().map(|g| g.pixel.y).collect();

        let d = method.degree();
        let fitter = RationalFunctionFitter::new(d, d, FIT_ITERATIONS);
        let forward_lat = fitter.fit(&xs, &ys, &lats)?;
        let forward_lon = fitter.fit(&xs, &ys, &lons)?;
        let inverse_x = fitter.fit(&lons, &lats, &xs)?;
        let inverse_y = fitter.fit(&lons, &lats, &ys)?;
        log::debug!(
            "gcp fit degree {d}: forward rmse ({:.3e}, {:.3e}) deg, inverse rmse ({:.3e}, {:.3e}) px",
            forward_lat.rmse(),
            forward_lon.rmse(),
            inverse_x.rmse(),
            inverse_y.rmse()
        );

        let mut geocoding = Self {
            gcps,
            method,
            rotator,
            forward_lat,
            forward_lon,
            inverse_x,
            inverse_y,
            scene,
            crossing: false,
        };
        geocoding.crossing = geocoding.detect_meridian_crossing();
        Ok(geocoding)
    }

    pub fn gcps(&self) -> &[GroundControlPoint] {
        &self.gcps
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Produces the geocoding for a cropped, sub-sampled scene by
    /// shifting the control points and refitting.
    pub fn transfer(
        &self,
        region: &SubsetRegion,
        step_x: usize,
        step_y: usize,
    ) -> Result<GcpGeocoding, GeocodingError> {
        region.validate(self.scene, step_x, step_y)?;
        let gcps: Vec<GroundControlPoint> = self
            .gcps
            .iter()
            .map(|g| {
                GroundControlPoint::new(
                    PixelPosition::new(
                        (g.pixel.x - region.x as f64) / step_x as f64,
                        (g.pixel.y - region.y as f64) / step_y as f64,
                    ),
                    g.geo,
                )
            })
            .collect();
        let scene = SceneGeometry::new(
            region.width.div_ceil(step_x),
            region.height.div_ceil(step_y),
        );
        GcpGeocoding::new(gcps, self.method, scene)
    }

    /// Scans the raster boundary for a longitude sign flip far from the
    /// prime meridian.
    fn detect_meridian_crossing(&self) -> bool {
        let mut previous: Option<f64> = None;
        for pixel in boundary_pixels(self.scene) {
            let geo = self.pixel_to_geo(pixel);
            if !geo.is_valid() {
                previous = None;
                continue;
            }
            if let Some(prev) = previous {
                if prev * geo.lon < 0.0 && prev.abs() > 90.0 && geo.lon.abs() > 90.0 {
                    return true;
                }
            }
            previous = Some(geo.lon);
        }
        false
    }

    fn forward_usable(&self) -> bool {
        self.forward_lat.rmse().is_finite() && self.forward_lon.rmse().is_finite()
    }

    fn inverse_usable(&self) -> bool {
        self.inverse_x.rmse().is_finite() && self.inverse_y.rmse().is_finite()
    }
}

impl Geocoding for GcpGeocoding {
    fn can_get_pixel_pos(&self) -> bool {
        self.inverse_usable()
    }

    fn can_get_geo_pos(&self) -> bool {
        self.forward_usable()
    }

    fn geo_to_pixel(&self, geo: GeoPosition) -> PixelPosition {
        if !self.inverse_usable() || !geo.is_valid() {
            return PixelPosition::INVALID;
        }
        let rotated = self.rotator.transform(geo);
        let x = self.inverse_x.value(rotated.lon, rotated.lat);
        let y = self.inverse_y.value(rotated.lon, rotated.lat);
        // A GCP sitting exactly on the western or northern raster edge
        // evaluates to 0 plus solver noise; snap such values back on.
        let x = if x.abs() < 1e-8 { 0.0 } else { x };
        let y = if y.abs() < 1e-8 { 0.0 } else { y };
        if x >= 0.0 && x < self.scene.width as f64 && y >= 0.0 && y < self.scene.height as f64 {
            PixelPosition::new(x, y)
        } else {
            PixelPosition::INVALID
        }
    }

    fn pixel_to_geo(&self, pixel: PixelPosition) -> GeoPosition {
        if !self.forward_usable()
            || !pixel.is_valid()
            || pixel.x < 0.0
            || pixel.y < 0.0
            || pixel.x > self.scene.width as f64
            || pixel.y > self.scene.height as f64
        {
            return GeoPosition::INVALID;
        }
        let lat = self.forward_lat.value(pixel.x, pixel.y);
        let lon = self.forward_lon.value(pixel.x, pixel.y);
        self.rotator
            .transform_inversely(GeoPosition::new(lat, lon))
    }

    fn is_crossing_meridian_at_180(&self) -> bool {
        self.crossing
    }

    fn scene(&self) -> SceneGeometry {
        self.scene
    }
}

/// Pixel centers along the raster boundary, clockwise from the top-left,
/// at most ~100 samples per edge.
fn boundary_pixels(scene: SceneGeometry) -> Vec<PixelPosition> {
    let w = scene.width as f64;
    let h = scene.height as f64;
    let step_x = (w / 100.0).max(1.0);
    let step_y = (h / 100.0).max(1.0);
    let mut pixels = Vec::new();
    let mut x = 0.5;
    while x < w {
        pixels.push(PixelPosition::new(x, 0.5));
        x += step_x;
    }
    let mut y = 0.5;
    while y < h {
        pixels.push(PixelPosition::new(w - 0.5, y));
        y += step_y;
    }
    let mut x = w - 0.5;
    while x > 0.0 {
        pixels.push(PixelPosition::new(x, h - 0.5));
        x -= step_x;
    }
    let mut y = h - 0.5;
    while y > 0.0 {
        pixels.push(PixelPosition::new(0.5, y));
        y -= step_y;
    }
    pixels
}
