//! Geocoding backed by per-pixel longitude/latitude raster bands.
//!
//! The forward direction reads the bands directly (bilinearly when
//! sub-pixel accuracy is requested). The inverse direction seeds from a
//! coarse estimator and then runs a bounded expanding-window search for
//! the sample nearest to the query, optionally refined to a fractional
//! pixel through a local affine model.

use std::sync::OnceLock;

use nalgebra::{Matrix3, Vector3};
use ndarray::Array2;

use crate::error::GeocodingError;
use crate::geocoding::tie_point::TiePointGeocoding;
use crate::geocoding::{Geocoder, Geocoding};
use crate::position::{interpolate2d, interpolate_lon, lon_diff, GeoPosition, PixelPosition};
use crate::raster::{SampleSource, SceneGeometry, SubsetRegion, TiePointGrid};

/// Hard bound on search window re-centering cycles.
pub const MAX_SEARCH_CYCLES: usize = 30;

/// Pixel spacing of the internally built estimator grid.
const ESTIMATOR_SUB_SAMPLING: usize = 30;

/// Tuning knobs of the inverse search.
#[derive(Clone, Copy, Debug)]
pub struct PixelSearchConfig {
    /// Half-width of the search window in pixels, at least 2.
    pub search_radius: usize,
    /// Resolve inverse queries to fractional pixel positions and sample
    /// forward queries bilinearly.
    pub fraction_accuracy: bool,
    /// Widen the window along the x axis while its boundary column is
    /// entirely masked, to tolerate duplicated-pixel swath borders.
    pub widen_masked_window: bool,
}

impl Default for PixelSearchConfig {
    fn default() -> Self {
        Self {
            search_radius: 5,
            fraction_accuracy: false,
            widen_masked_window: true,
        }
    }
}

/// Supplies the coarse starting pixel for the inverse search.
///
/// Any geocoding can serve; when none is given the search geocoder builds
/// one from a sub-sampled tie-point view of its own bands.
#[derive(Debug)]
pub struct PixelPositionEstimator {
    delegate: Box<Geocoder>,
}

impl PixelPositionEstimator {
    pub fn new(delegate: Geocoder) -> Self {
        Self {
            delegate: Box::new(delegate),
        }
    }

    /// Builds an estimator from full-resolution coordinate bands by
    /// thinning them into a tie-point geocoding.
    fn from_bands(
        lat: &Array2<f64>,
        lon: &Array2<f64>,
        valid: Option<&Array2<bool>>,
        scene: SceneGeometry,
    ) -> Result<Self, GeocodingError> {
        let lat_grid = thin_to_grid(lat, valid)?;
        let lon_grid = thin_to_grid(lon, valid)?;
        let geocoding = TiePointGeocoding::new(lat_grid, lon_grid, scene)?;
        Ok(Self::new(Geocoder::TiePoint(geocoding)))
    }

    pub fn estimate(&self, geo: GeoPosition) -> PixelPosition {
        self.delegate.geo_to_pixel(geo)
    }

    pub fn geo_pos(&self, pixel: PixelPosition) -> GeoPosition {
        self.delegate.pixel_to_geo(pixel)
    }
}

/// Geocoding for scenes whose geolocation is only available per pixel.
#[derive(Debug)]
pub struct PixelSearchGeocoding {
    lat: Array2<f64>,
    lon: Array2<f64>,
    /// True marks a usable pixel; absent means all pixels are usable.
    valid: Option<Array2<bool>>,
    config: PixelSearchConfig,
    estimator: PixelPositionEstimator,
    scene: SceneGeometry,
    crossing: OnceLock<bool>,
}

impl PixelSearchGeocoding {
    /// Loads the coordinate bands into memory and builds the geocoding.
    ///
    /// The bands must share dimensions of at least 2 x 2; the optional
    /// mask band marks pixels with sample 0 as unusable. Without an
    /// explicit estimator a sub-sampled tie-point estimator is built from
    /// the bands themselves.
    pub fn new(
        lat_band: &dyn SampleSource,
        lon_band: &dyn SampleSource,
        mask_band: Option<&dyn SampleSource>,
        config: PixelSearchConfig,
        estimator: Option<PixelPositionEstimator>,
    ) -> Result<Self, GeocodingError> {
        let w = lat_band.width();
        let h = lat_band.height();
        if lon_band.width() != w || lon_band.height() != h {
            return Err(GeocodingError::GridMismatch(format!(
                "latitude band {} x {} and longitude band {} x {} differ",
                w,
                h,
                lon_band.width(),
                lon_band.height()
            )));
        }
        if let Some(mask) = mask_band {
            if mask.width() != w || mask.height() != h {
                return Err(GeocodingError::GridMismatch(format!(
                    "mask band {} x {} does not match bands {} x {}",
                    mask.width(),
                    mask.height(),
                    w,
                    h
                )));
            }
        }
        let lat = Array2::from_shape_fn((h, w), |(y, x)| lat_band.sample(x, y));
        let lon = Array2::from_shape_fn((h, w), |(y, x)| lon_band.sample(x, y));
        let valid =
            mask_band.map(|m| Array2::from_shape_fn((h, w), |(y, x)| m.sample(x, y) != 0.0));
        Self::from_arrays(lat, lon, valid, config, estimator)
    }

    fn from_arrays(
        lat: Array2<f64>,
        lon: Array2<f64>,
        valid: Option<Array2<bool>>,
        config: PixelSearchConfig,
        estimator: Option<PixelPositionEstimator>,
    ) -> Result<Self, GeocodingError> {
        let (h, w) = lat.dim();
        if w < 2 || h < 2 {
            return Err(GeocodingError::Shape(format!(
                "coordinate bands must be at least 2 x 2, got {w} x {h}"
            )));
        }
        if config.search_radius < 2 {
            return Err(GeocodingError::Shape(format!(
                "search radius must be at least 2, got {}",
                config.search_radius
            )));
        }
        let scene = SceneGeometry::new(w, h);
        let estimator = match estimator {
            Some(e) => e,
            None => PixelPositionEstimator::from_bands(&lat, &lon, valid.as_ref(), scene)?,
        };
        Ok(Self {
            lat,
            lon,
            valid,
            config,
            estimator,
            scene,
            crossing: OnceLock::new(),
        })
    }

    pub fn config(&self) -> PixelSearchConfig {
        self.config
    }

    /// Produces the geocoding for a cropped, sub-sampled scene by
    /// cropping the bands and rebuilding the estimator.
    pub fn transfer(
        &self,
        region: &SubsetRegion,
        step_x: usize,
        step_y: usize,
    ) -> Result<PixelSearchGeocoding, GeocodingError> {
        region.validate(self.scene, step_x, step_y)?;
        let nw = region.width.div_ceil(step_x);
        let nh = region.height.div_ceil(step_y);
        let lat = Array2::from_shape_fn((nh, nw), |(j, i)| {
            self.lat[(region.y + j * step_y, region.x + i * step_x)]
        });
        let lon = Array2::from_shape_fn((nh, nw), |(j, i)| {
            self.lon[(region.y + j * step_y, region.x + i * step_x)]
        });
        let valid = self.valid.as_ref().map(|v| {
            Array2::from_shape_fn((nh, nw), |(j, i)| {
                v[(region.y + j * step_y, region.x + i * step_x)]
            })
        });
        Self::from_arrays(lat, lon, valid, self.config, None)
    }

    fn masked(&self, x: usize, y: usize) -> bool {
        self.valid.as_ref().is_some_and(|v| !v[(y, x)])
    }

    /// Squared sinusoidal-projected distance from `(lat0, lon0)` to the
    /// sample at `(x, y)`, in degrees squared.
    fn square_distance(&self, lat0: f64, lon0: f64, cos_lat0: f64, x: usize, y: usize) -> f64 {
        let dlat = self.lat[(y, x)] - lat0;
        let dlon = cos_lat0 * lon_diff(self.lon[(y, x)], lon0);
        dlat * dlat + dlon * dlon
    }

    /// Squared geographic extent of one pixel diagonal at `(x, y)`.
    fn pixel_diagonal_sq(&self, x: usize, y: usize, cos_lat0: f64) -> f64 {
        let x1 = if x + 1 < self.scene.width { x + 1 } else { x - 1 };
        let y1 = if y + 1 < self.scene.height { y + 1 } else { y - 1 };
        let dlat = self.lat[(y1, x1)] - self.lat[(y, x)];
        let dlon = cos_lat0 * lon_diff(self.lon[(y1, x1)], self.lon[(y, x)]);
        dlat * dlat + dlon * dlon
    }

    /// Expanding-window search for the sample nearest to the query,
    /// bounded by [`MAX_SEARCH_CYCLES`] re-centerings.
    fn search_nearest(
        &self,
        lat0: f64,
        lon0: f64,
        cos_lat0: f64,
        start_x: usize,
        start_y: usize,
    ) -> Option<(usize, usize, f64)> {
        let w = self.scene.width as i64;
        let h = self.scene.height as i64;
        let r = self.config.search_radius as i64;

        let mut center = (start_x as i64, start_y as i64);
        let mut best: Option<(i64, i64)> = None;
        let mut best_delta = f64::INFINITY;
        let mut known: Option<(i64, i64, i64, i64)> = None;

        for _ in 0..MAX_SEARCH_CYCLES {
            let mut x1 = (center.0 - r).max(0);
            let mut x2 = (center.0 + r).min(w - 1);
            let y1 = (center.1 - r).max(0);
            let y2 = (center.1 + r).min(h - 1);

            if self.config.widen_masked_window && self.valid.is_some() {
                while x1 > 0 && self.column_fully_masked(x1, y1, y2) {
                    x1 -= 1;
                }
                while x2 < w - 1 && self.column_fully_masked(x2, y1, y2) {
                    x2 += 1;
                }
            }

            for y in y1..=y2 {
                for x in x1..=x2 {
                    if let Some((kx1, ky1, kx2, ky2)) = known {
                        if x >= kx1 && x <= kx2 && y >= ky1 && y <= ky2 {
                            continue;
                        }
                    }
                    if self.masked(x as usize, y as usize) {
                        continue;
                    }
                    let d = self.square_distance(lat0, lon0, cos_lat0, x as usize, y as usize);
                    let better = d < best_delta
                        || (d == best_delta
                            && best.is_some_and(|(bx, by)| {
                                let dc = (x - center.0).pow(2) + (y - center.1).pow(2);
                                let db = (bx - center.0).pow(2) + (by - center.1).pow(2);
                                dc > db
                            }));
                    if better {
                        best_delta = d;
                        best = Some((x, y));
                    }
                }
            }
            known = Some((x1, y1, x2, y2));

            match best {
                Some(b) if b != center => center = b,
                _ => break,
            }
        }

        best.map(|(x, y)| (x as usize, y as usize, best_delta))
    }

    fn column_fully_masked(&self, x: i64, y1: i64, y2: i64) -> bool {
        (y1..=y2).all(|y| self.masked(x as usize, y as usize))
    }

    /// Sub-pixel refinement through a local affine (lat, lon) -> pixel
    /// model over the best pixel and its two nearest valid neighbors.
    fn refine_fraction(&self, lat0: f64, lon0: f64, cos_lat0: f64, bx: usize, by: usize) -> PixelPosition {
        let whole = PixelPosition::new(bx as f64 + 0.5, by as f64 + 0.5);
        let Some(nx) = self.closer_neighbor(lat0, lon0, cos_lat0, bx, by, true) else {
            log::trace!("no valid x neighbor at ({bx}, {by}), keeping whole-pixel accuracy");
            return whole;
        };
        let Some(ny) = self.closer_neighbor(lat0, lon0, cos_lat0, bx, by, false) else {
            log::trace!("no valid y neighbor at ({bx}, {by}), keeping whole-pixel accuracy");
            return whole;
        };

        let points = [(bx, by), (nx, by), (bx, ny)];
        let mut rows = [[0.0; 3]; 3];
        let mut rhs_x = Vector3::zeros();
        let mut rhs_y = Vector3::zeros();
        for (k, &(px, py)) in points.iter().enumerate() {
            let lat = self.lat[(py, px)];
            let mut lon = self.lon[(py, px)];
            // Bring each longitude into the query's 360 degree branch.
            lon += 360.0 * ((lon0 - lon) / 360.0).round();
            rows[k] = [1.0, lat, lon];
            rhs_x[k] = px as f64 + 0.5;
            rhs_y[k] = py as f64 + 0.5;
        }
        let m = Matrix3::from_fn(|i, j| rows[i][j]);
        let lu = m.lu();
        let (Some(cx), Some(cy)) = (lu.solve(&rhs_x), lu.solve(&rhs_y)) else {
            log::trace!("singular neighborhood at ({bx}, {by}), keeping whole-pixel accuracy");
            return whole;
        };
        PixelPosition::new(
            cx[0] + cx[1] * lat0 + cx[2] * lon0,
            cy[0] + cy[1] * lat0 + cy[2] * lon0,
        )
    }

    /// The valid neighbor of `(bx, by)` along one axis whose sample lies
    /// closer to the query.
    fn closer_neighbor(
        &self,
        lat0: f64,
        lon0: f64,
        cos_lat0: f64,
        bx: usize,
        by: usize,
        along_x: bool,
    ) -> Option<usize> {
        let (limit, pos) = if along_x {
            (self.scene.width, bx)
        } else {
            (self.scene.height, by)
        };
        let mut candidates: [Option<usize>; 2] = [None, None];
        if pos > 0 {
            candidates[0] = Some(pos - 1);
        }
        if pos + 1 < limit {
            candidates[1] = Some(pos + 1);
        }
        let mut best: Option<(usize, f64)> = None;
        for n in candidates.into_iter().flatten() {
            let (x, y) = if along_x { (n, by) } else { (bx, n) };
            if self.masked(x, y) {
                continue;
            }
            let d = self.square_distance(lat0, lon0, cos_lat0, x, y);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((n, d));
            }
        }
        best.map(|(n, _)| n)
    }
}

impl Geocoding for PixelSearchGeocoding {
    fn can_get_pixel_pos(&self) -> bool {
        true
    }

    fn can_get_geo_pos(&self) -> bool {
        true
    }

    fn geo_to_pixel(&self, geo: GeoPosition) -> PixelPosition {
        if !geo.is_valid() {
            return PixelPosition::INVALID;
        }
        let seed = self.estimator.estimate(geo);
        if !seed.is_valid() {
            return PixelPosition::INVALID;
        }
        let w = self.scene.width;
        let h = self.scene.height;
        let start_x = (seed.x.floor() as i64).clamp(0, w as i64 - 1) as usize;
        let start_y = (seed.y.floor() as i64).clamp(0, h as i64 - 1) as usize;

        let cos_lat0 = geo.lat.to_radians().cos();
        let Some((bx, by, delta)) = self.search_nearest(geo.lat, geo.lon, cos_lat0, start_x, start_y)
        else {
            return PixelPosition::INVALID;
        };
        // Reject hits farther than half the local pixel diagonal; the
        // query then lies between swath lines or outside the swath.
        if delta > 0.25 * self.pixel_diagonal_sq(bx, by, cos_lat0) {
            return PixelPosition::INVALID;
        }
        if self.config.fraction_accuracy {
            self.refine_fraction(geo.lat, geo.lon, cos_lat0, bx, by)
        } else {
            PixelPosition::new(bx as f64 + 0.5, by as f64 + 0.5)
        }
    }

    fn pixel_to_geo(&self, pixel: PixelPosition) -> GeoPosition {
        if !pixel.is_valid() {
            return GeoPosition::INVALID;
        }
        let w = self.scene.width;
        let h = self.scene.height;
        let x0 = pixel.x.floor() as i64;
        let y0 = pixel.y.floor() as i64;
        if x0 < 0 || y0 < 0 || x0 >= w as i64 || y0 >= h as i64 {
            return self.estimator.geo_pos(pixel);
        }
        let x0 = x0 as usize;
        let y0 = y0 as usize;

        if self.config.fraction_accuracy {
            // Re-anchor on the 2x2 cell of surrounding pixel centers.
            let mut cx = x0;
            let mut cy = y0;
            if (cx > 0 && pixel.x - (cx as f64) < 0.5) || cx == w - 1 {
                cx -= 1;
            }
            if (cy > 0 && pixel.y - (cy as f64) < 0.5) || cy == h - 1 {
                cy -= 1;
            }
            let cell_valid = !self.masked(cx, cy)
                && !self.masked(cx + 1, cy)
                && !self.masked(cx, cy + 1)
                && !self.masked(cx + 1, cy + 1);
            if cell_valid {
                let wx = pixel.x - (cx as f64 + 0.5);
                let wy = pixel.y - (cy as f64 + 0.5);
                let lat = interpolate2d(
                    wx,
                    wy,
                    self.lat[(cy, cx)],
                    self.lat[(cy, cx + 1)],
                    self.lat[(cy + 1, cx)],
                    self.lat[(cy + 1, cx + 1)],
                );
                let lon = interpolate_lon(
                    wx,
                    wy,
                    self.lon[(cy, cx)],
                    self.lon[(cy, cx + 1)],
                    self.lon[(cy + 1, cx)],
                    self.lon[(cy + 1, cx + 1)],
                );
                let geo = GeoPosition::new(lat, lon);
                if geo.is_valid() {
                    return geo;
                }
            }
        }

        if !self.masked(x0, y0) {
            let geo = GeoPosition::new(self.lat[(y0, x0)], self.lon[(y0, x0)]);
            if geo.is_valid() {
                return geo;
            }
        }
        self.estimator.geo_pos(pixel)
    }

    fn is_crossing_meridian_at_180(&self) -> bool {
        *self.crossing.get_or_init(|| {
            let mut previous: Option<f64> = None;
            for (x, y) in boundary_indices(self.scene) {
                if self.masked(x, y) {
                    continue;
                }
                let lon = self.lon[(y, x)];
                if !lon.is_finite() {
                    continue;
                }
                if let Some(prev) = previous {
                    if (lon - prev).abs() > 180.0 {
                        return true;
                    }
                }
                previous = Some(lon);
            }
            false
        })
    }

    fn scene(&self) -> SceneGeometry {
        self.scene
    }
}

/// Index walk along the raster boundary, clockwise from (0, 0).
fn boundary_indices(scene: SceneGeometry) -> Vec<(usize, usize)> {
    let w = scene.width;
    let h = scene.height;
    let mut indices = Vec::with_capacity(2 * (w + h));
    for x in 0..w {
        indices.push((x, 0));
    }
    for y in 1..h {
        indices.push((w - 1, y));
    }
    for x in (0..w.saturating_sub(1)).rev() {
        indices.push((x, h - 1));
    }
    for y in (1..h.saturating_sub(1)).rev() {
        indices.push((0, y));
    }
    indices
}

/// Thins a full-resolution band into a tie-point grid spanning the whole
/// raster, one node roughly every [`ESTIMATOR_SUB_SAMPLING`] pixels.
fn thin_to_grid(
    data: &Array2<f64>,
    valid: Option<&Array2<bool>>,
) -> Result<TiePointGrid, GeocodingError> {
    let (h, w) = data.dim();
    let nx = (w - 1).div_ceil(ESTIMATOR_SUB_SAMPLING) + 1;
    let ny = (h - 1).div_ceil(ESTIMATOR_SUB_SAMPLING) + 1;
    let ss_x = (w - 1) as f64 / (nx - 1) as f64;
    let ss_y = (h - 1) as f64 / (ny - 1) as f64;
    let mut values = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let x = ((i as f64 * ss_x).round() as usize).min(w - 1);
            let y = ((j as f64 * ss_y).round() as usize).min(h - 1);
            values.push(node_value(data, valid, x, y));
        }
    }
    TiePointGrid::new(nx, ny, 0.5, 0.5, ss_x, ss_y, values)
}

/// The band value at `(x, y)`, or at the nearest usable pixel within a
/// small neighborhood when `(x, y)` is masked.
fn node_value(data: &Array2<f64>, valid: Option<&Array2<bool>>, x: usize, y: usize) -> f64 {
    let Some(valid) = valid else {
        return data[(y, x)];
    };
    if valid[(y, x)] {
        return data[(y, x)];
    }
    let (h, w) = data.dim();
    for radius in 1i64..=3 {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                if valid[(ny as usize, nx as usize)] {
                    return data[(ny as usize, nx as usize)];
                }
            }
        }
    }
    data[(y, x)]
}
