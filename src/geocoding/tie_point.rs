//! Geocoding backed by a pair of sparse tie-point grids.
//!
//! The forward direction interpolates the grids bilinearly. The inverse
//! direction is served by per-tile polynomial approximations of the
//! `(lat, lon) -> (x, y)` mapping, built lazily on first use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::GeocodingError;
use crate::fitting::{select_best, FxySum};
use crate::geocoding::Geocoding;
use crate::position::{normalize_lat, GeoPosition, PixelPosition};
use crate::raster::{SceneGeometry, SubsetRegion, TiePointGrid};

/// Maximum absolute fit error accepted per tile, in pixels.
const ABS_ERROR_LIMIT: f64 = 0.5;
/// Cap on the number of samples fed into one tile fit.
const MAX_POINTS_PER_TILE: usize = 1000;
/// Target angular extent of one approximation tile, in degrees.
const TILE_ANGLE_SPAN: f64 = 10.0;

/// One inverse approximation tile: a pair of polynomials mapping rescaled
/// `(lat, lon)` to pixel `x` and `y`, valid within a squared-distance
/// radius around the tile center.
#[derive(Debug)]
struct Approximation {
    fx: FxySum,
    fy: FxySum,
    center_lat: f64,
    center_lon: f64,
    min_square_distance: f64,
    /// Squared distance below which no other tile center can be closer,
    /// a quarter of the squared distance to the nearest other center.
    exclusive_square_distance: f64,
}

impl Approximation {
    fn square_distance(&self, lat: f64, lon: f64) -> f64 {
        let dlat = lat - self.center_lat;
        let dlon = lon - self.center_lon;
        dlat * dlat + dlon * dlon
    }

    fn pixel_pos(&self, lat: f64, lon: f64) -> PixelPosition {
        let u = lat / 90.0;
        let v = (lon - self.center_lon) / 90.0;
        PixelPosition::new(self.fx.eval(u, v), self.fy.eval(u, v))
    }
}

/// Geocoding interpolated from latitude and longitude tie-point grids.
#[derive(Debug)]
pub struct TiePointGeocoding {
    lat_grid: TiePointGrid,
    lon_grid: TiePointGrid,
    /// Longitude grid with antimeridian jumps removed; values may exceed
    /// +180 on scenes crossing the 180 degree meridian.
    normalized_lon_grid: TiePointGrid,
    normalized: bool,
    lat_min: f64,
    lat_max: f64,
    normalized_lon_min: f64,
    normalized_lon_max: f64,
    /// Longitude band answered a second time after a +360 shift, present
    /// when the normalized grid extends beyond +180.
    overlap_start: f64,
    overlap_end: f64,
    scene: SceneGeometry,
    approximations: OnceLock<Option<Vec<Approximation>>>,
    /// Index of the tile that answered the last successful inverse query.
    /// Purely a locality hint; any value is safe.
    last_tile: AtomicUsize,
}

impl TiePointGeocoding {
    /// Builds a geocoding from compatible latitude and longitude grids.
    ///
    /// Both grids must share width, height, offsets and sub-sampling, and
    /// the scene must be non-empty. The longitude grid is normalized up
    /// front; the inverse approximations are built lazily.
    pub fn new(
        lat_grid: TiePointGrid,
        lon_grid: TiePointGrid,
        scene: SceneGeometry,
    ) -> Result<Self, GeocodingError> {
        if !lat_grid.is_compatible_with(&lon_grid) {
            return Err(GeocodingError::GridMismatch(format!(
                "lat grid {} x {} and lon grid {} x {} must share geometry",
                lat_grid.width(),
                lat_grid.height(),
                lon_grid.width(),
                lon_grid.height()
            )));
        }
        if scene.width == 0 || scene.height == 0 {
            return Err(GeocodingError::Shape("empty scene".into()));
        }

        let (normalized_data, normalized) = normalize_lon_grid(lon_grid.data());
        let normalized_lon_grid = lon_grid.with_data(normalized_data);

        let (lat_min, lat_max) = min_max(lat_grid.data());
        let (normalized_lon_min, normalized_lon_max) = min_max(normalized_lon_grid.data());

        // Queries falling into the overlap band are retried with +360 so
        // that scenes reaching past the antimeridian answer both aliases
        // of the same longitude.
        let overlap_start = normalized_lon_min;
        let overlap_end = if normalized_lon_max > 180.0 {
            normalized_lon_max - 360.0
        } else {
            overlap_start
        };

        if normalized {
            log::debug!(
                "longitude grid normalized, range [{normalized_lon_min}, {normalized_lon_max}]"
            );
        }

        Ok(Self {
            lat_grid,
            lon_grid,
            normalized_lon_grid,
            normalized,
            lat_min,
            lat_max,
            normalized_lon_min,
            normalized_lon_max,
            overlap_start,
            overlap_end,
            scene,
            approximations: OnceLock::new(),
            last_tile: AtomicUsize::new(0),
        })
    }

    pub fn lat_grid(&self) -> &TiePointGrid {
        &self.lat_grid
    }

    pub fn lon_grid(&self) -> &TiePointGrid {
        &self.lon_grid
    }

    /// Produces the geocoding for a cropped, sub-sampled scene by
    /// subsetting both grids and rebasing their geometry.
    pub fn transfer(
        &self,
        region: &SubsetRegion,
        step_x: usize,
        step_y: usize,
    ) -> Result<TiePointGeocoding, GeocodingError> {
        region.validate(self.scene, step_x, step_y)?;
        let lat = self.lat_grid.create_subset(region, step_x, step_y)?;
        let lon = self.lon_grid.create_subset(region, step_x, step_y)?;
        let scene = SceneGeometry::new(
            region.width.div_ceil(step_x),
            region.height.div_ceil(step_y),
        );
        TiePointGeocoding::new(lat, lon, scene)
    }

    /// Shifts a query longitude into the normalized grid range, or NaN
    /// when it cannot fall on the scene.
    fn normalize_lon(&self, lon: f64) -> f64 {
        if !(-180.0..=180.0).contains(&lon) {
            return f64::NAN;
        }
        let mut lon = lon;
        if lon < self.normalized_lon_min {
            lon += 360.0;
        }
        if lon < self.normalized_lon_min || lon > self.normalized_lon_max {
            return f64::NAN;
        }
        lon
    }

    fn approximations(&self) -> Option<&[Approximation]> {
        self.approximations
            .get_or_init(|| self.create_approximations())
            .as_deref()
    }

    /// Builds the tile set, or None when any tile fails to reach the
    /// error limit. A failed build disables the inverse direction but is
    /// not an error.
    fn create_approximations(&self) -> Option<Vec<Approximation>> {
        let w = self.lat_grid.width();
        let h = self.lat_grid.height();
        let num_points = w * h;

        let mut num_tiles = if h > 2 {
            let lat_span = self.lat_max - self.lat_min;
            let lon_span = self.normalized_lon_max - self.normalized_lon_min;
            ((lat_span.max(lon_span) / TILE_ANGLE_SPAN).round() as usize).max(1)
        } else {
            30
        };
        while num_tiles > 1 && num_points / num_tiles < 10 {
            num_tiles -= 1;
        }

        let (ni, nj) = fit_dimension(num_tiles, w, h);
        // Tiles are independent fits; build them in parallel.
        let mut tiles: Vec<Approximation> = subdivide(w, h, ni, nj, 1)
            .into_par_iter()
            .map(|(i1, j1, i2, j2)| {
                let a = self.create_approximation(i1, j1, i2, j2);
                if a.is_none() {
                    log::warn!(
                        "no polynomial approximation for tile [{i1}..{i2}] x [{j1}..{j2}], \
                         inverse geocoding disabled"
                    );
                }
                a
            })
            .collect::<Option<Vec<_>>>()?;

        for index in 0..tiles.len() {
            let mut nearest = f64::INFINITY;
            for (other, tile) in tiles.iter().enumerate() {
                if other != index {
                    let d = tile.square_distance(
                        tiles[index].center_lat,
                        tiles[index].center_lon,
                    );
                    nearest = nearest.min(d);
                }
            }
            tiles[index].exclusive_square_distance = nearest / 4.0;
        }
        Some(tiles)
    }

    /// Fits one tile over the inclusive grid rectangle `[i1..i2] x [j1..j2]`.
    fn create_approximation(
        &self,
        i1: usize,
        j1: usize,
        i2: usize,
        j2: usize,
    ) -> Option<Approximation> {
        let sw = i2 - i1 + 1;
        let sh = j2 - j1 + 1;

        // Thin the samples alternately along both axes until the fit
        // stays below the point cap, always keeping the border rows and
        // columns so the tile edges are constrained.
        let mut step_i = 1usize;
        let mut step_j = 1usize;
        let mut widen_i = true;
        while sw.div_ceil(step_i) * sh.div_ceil(step_j) > MAX_POINTS_PER_TILE {
            if widen_i {
                step_i += 1;
            } else {
                step_j += 1;
            }
            widen_i = !widen_i;
        }

        let mut lats = Vec::new();
        let mut lons = Vec::new();
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut j = j1;
        loop {
            let mut i = i1;
            loop {
                lats.push(self.lat_grid.data()[(j, i)]);
                lons.push(self.normalized_lon_grid.data()[(j, i)]);
                xs.push(self.lat_grid.raster_x(i));
                ys.push(self.lat_grid.raster_y(j));
                if i == i2 {
                    break;
                }
                i = (i + step_i).min(i2);
            }
            if j == j2 {
                break;
            }
            j = (j + step_j).min(j2);
        }

        let n = lats.len() as f64;
        let center_lat = lats.iter().sum::<f64>() / n;
        let center_lon = lons.iter().sum::<f64>() / n;
        let max_square_distance = lats
            .iter()
            .zip(&lons)
            .map(|(&lat, &lon)| {
                let dlat = lat - center_lat;
                let dlon = lon - center_lon;
                dlat * dlat + dlon * dlon
            })
            .fold(0.0, f64::max);

        let u: Vec<f64> = lats.iter().map(|&lat| lat / 90.0).collect();
        let v: Vec<f64> = lons.iter().map(|&lon| (lon - center_lon) / 90.0).collect();

        let fx = select_best(&u, &v, &xs, ABS_ERROR_LIMIT)?;
        let fy = select_best(&u, &v, &ys, ABS_ERROR_LIMIT)?;
        log::trace!(
            "tile [{i1}..{i2}] x [{j1}..{j2}]: fx {} rmse {:.4}, fy {} rmse {:.4}",
            fx.model().name,
            fx.rmse(),
            fy.model().name,
            fy.rmse()
        );

        Some(Approximation {
            fx,
            fy,
            center_lat,
            center_lon,
            min_square_distance: max_square_distance * 1.1,
            exclusive_square_distance: f64::INFINITY,
        })
    }

    /// The qualifying tile closest to `(lat, lon)`, if any.
    fn best_approximation<'a>(
        &self,
        tiles: &'a [Approximation],
        lat: f64,
        lon: f64,
    ) -> Option<&'a Approximation> {
        // Within half the separation to the nearest other center the
        // previously used tile is provably the closest; reuse it without
        // scanning.
        let hint = self.last_tile.load(Ordering::Relaxed);
        if let Some(tile) = tiles.get(hint) {
            let d = tile.square_distance(lat, lon);
            if d < tile.min_square_distance && d < tile.exclusive_square_distance {
                return Some(tile);
            }
        }
        let mut best: Option<(usize, f64)> = None;
        for (index, tile) in tiles.iter().enumerate() {
            let d = tile.square_distance(lat, lon);
            if d < tile.min_square_distance && best.map_or(true, |(_, bd)| d < bd) {
                best = Some((index, d));
            }
        }
        best.map(|(index, _)| {
            self.last_tile.store(index, Ordering::Relaxed);
            &tiles[index]
        })
    }
}

impl Geocoding for TiePointGeocoding {
    fn can_get_pixel_pos(&self) -> bool {
        self.approximations().is_some()
    }

    fn can_get_geo_pos(&self) -> bool {
        true
    }

    fn geo_to_pixel(&self, geo: GeoPosition) -> PixelPosition {
        let Some(tiles) = self.approximations() else {
            return PixelPosition::INVALID;
        };
        let lat = normalize_lat(geo.lat);
        let lon = self.normalize_lon(geo.lon);
        if lat.is_nan() || lon.is_nan() {
            return PixelPosition::INVALID;
        }
        if let Some(tile) = self.best_approximation(tiles, lat, lon) {
            return tile.pixel_pos(lat, lon);
        }
        // A miss inside the overlap band retries with the +360 alias.
        if lon >= self.overlap_start && lon <= self.overlap_end {
            let lon = lon + 360.0;
            if let Some(tile) = self.best_approximation(tiles, lat, lon) {
                return tile.pixel_pos(lat, lon);
            }
        }
        PixelPosition::INVALID
    }

    fn pixel_to_geo(&self, pixel: PixelPosition) -> GeoPosition {
        if !pixel.is_valid()
            || pixel.x < 0.0
            || pixel.y < 0.0
            || pixel.x > self.scene.width as f64
            || pixel.y > self.scene.height as f64
        {
            return GeoPosition::INVALID;
        }
        let lat = self.lat_grid.value_at(pixel.x, pixel.y);
        let mut lon = self.normalized_lon_grid.value_at(pixel.x, pixel.y);
        if lon > 180.0 {
            lon -= 360.0;
        }
        GeoPosition::new(lat, lon)
    }

    fn is_crossing_meridian_at_180(&self) -> bool {
        self.normalized
    }

    fn scene(&self) -> SceneGeometry {
        self.scene
    }
}

/// Removes antimeridian sign jumps from a longitude grid.
///
/// Walking the grid row-major, any step of more than 180 degrees against
/// the previous value (the western neighbor, or the northern neighbor at
/// a row start) is treated as a dateline crossing and compensated with a
/// 360 degree shift. If any westward shift occurred the whole grid is
/// lifted by 360 so values stay above -180.
fn normalize_lon_grid(lons: &Array2<f64>) -> (Array2<f64>, bool) {
    let (h, w) = lons.dim();
    let mut out = lons.clone();
    let mut west_shifted = false;
    let mut east_shifted = false;
    for j in 0..h {
        for i in 0..w {
            if i == 0 && j == 0 {
                continue;
            }
            let reference = if i == 0 {
                out[(j - 1, 0)]
            } else {
                out[(j, i - 1)]
            };
            let mut p = out[(j, i)];
            if p - reference > 180.0 {
                p -= 360.0;
                west_shifted = true;
            } else if p - reference < -180.0 {
                p += 360.0;
                east_shifted = true;
            }
            out[(j, i)] = p;
        }
    }
    if west_shifted {
        out.mapv_inplace(|p| p + 360.0);
    }
    (out, west_shifted || east_shifted)
}

fn min_max(data: &Array2<f64>) -> (f64, f64) {
    data.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), &v| {
            (min.min(v), max.max(v))
        })
}

/// Partitions `n` tiles over a `w x h` grid so tile cells stay roughly
/// square in grid units.
fn fit_dimension(n: usize, w: usize, h: usize) -> (usize, usize) {
    if n <= 1 {
        return (1, 1);
    }
    let ni = ((n as f64 * w as f64 / h as f64).sqrt().round() as usize).clamp(1, n.min(w));
    let nj = ((n as f64 / ni as f64).round() as usize).clamp(1, h);
    (ni, nj)
}

/// Inclusive grid rectangles of an `ni x nj` partition, each extended by
/// `extra` cells to the east and south so neighboring tiles overlap.
fn subdivide(w: usize, h: usize, ni: usize, nj: usize, extra: usize) -> Vec<(usize, usize, usize, usize)> {
    let mut rects = Vec::with_capacity(ni * nj);
    for j in 0..nj {
        let j1 = j * h / nj;
        let j2 = (((j + 1) * h / nj - 1) + extra).min(h - 1);
        for i in 0..ni {
            let i1 = i * w / ni;
            let i2 = (((i + 1) * w / ni - 1) + extra).min(w - 1);
            rects.push((i1, j1, i2, j2));
        }
    }
    rects
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_geocoding() -> TiePointGeocoding {
        // 4x4 grids over a 100x100 scene; latitude ramps south-to-north
        // along y from 10.0 to 10.3, longitude along x from 20.0 to 20.3.
        let mut lat = Vec::new();
        let mut lon = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                lat.push(10.0 + 0.1 * j as f64);
                lon.push(20.0 + 0.1 * i as f64);
            }
        }
        let step = 100.0 / 3.0;
        let lat_grid = TiePointGrid::new(4, 4, 0.0, 0.0, step, step, lat).unwrap();
        let lon_grid = TiePointGrid::new(4, 4, 0.0, 0.0, step, step, lon).unwrap();
        init_logging();
        TiePointGeocoding::new(lat_grid, lon_grid, SceneGeometry::new(100, 100)).unwrap()
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// 5x9 grids whose longitude spans 40 degrees across the columns but
    /// latitude only 4 down the rows, so the approximation tiles stack
    /// along y and sit far closer together than their validity radii. A
    /// small non-polynomial ripple on the latitudes keeps the per-tile
    /// fits distinguishable.
    fn stacked_tile_geocoding() -> TiePointGeocoding {
        let mut lat = Vec::new();
        let mut lon = Vec::new();
        for j in 0..9 {
            for i in 0..5 {
                let ripple = 0.004 * (1.9 * i as f64 + 1.3 * j as f64).sin();
                lat.push(50.0 + 0.5 * j as f64 + ripple);
                lon.push(10.0 * i as f64);
            }
        }
        let lat_grid = TiePointGrid::new(5, 9, 0.0, 0.0, 10.0, 10.0, lat).unwrap();
        let lon_grid = TiePointGrid::new(5, 9, 0.0, 0.0, 10.0, 10.0, lon).unwrap();
        init_logging();
        TiePointGeocoding::new(lat_grid, lon_grid, SceneGeometry::new(40, 80)).unwrap()
    }

    #[test]
    fn test_rejects_incompatible_grids() {
        let a = TiePointGrid::new(2, 2, 0.0, 0.0, 10.0, 10.0, vec![0.0; 4]).unwrap();
        let b = TiePointGrid::new(3, 2, 0.0, 0.0, 10.0, 10.0, vec![0.0; 6]).unwrap();
        let r = TiePointGeocoding::new(a, b, SceneGeometry::new(20, 20));
        assert!(matches!(r, Err(GeocodingError::GridMismatch(_))));
    }

    #[test]
    fn test_pixel_to_geo_interpolates() {
        let gc = ramp_geocoding();
        let geo = gc.pixel_to_geo(PixelPosition::new(50.0, 50.0));
        assert_relative_eq!(geo.lat, 10.15, epsilon = 1e-9);
        assert_relative_eq!(geo.lon, 20.15, epsilon = 1e-9);
    }

    #[test]
    fn test_geo_to_pixel_roundtrip() {
        let gc = ramp_geocoding();
        assert!(gc.can_get_pixel_pos());
        let pos = gc.geo_to_pixel(GeoPosition::new(10.15, 20.15));
        assert!(pos.is_valid());
        assert!((pos.x - 50.0).abs() <= 1.0, "x = {}", pos.x);
        assert!((pos.y - 50.0).abs() <= 1.0, "y = {}", pos.y);
    }

    #[test]
    fn test_geo_to_pixel_outside_grid_is_invalid() {
        let gc = ramp_geocoding();
        assert!(!gc.geo_to_pixel(GeoPosition::new(10.15, 25.3)).is_valid());
        assert!(!gc.geo_to_pixel(GeoPosition::new(15.15, 20.15)).is_valid());
        assert!(!gc.geo_to_pixel(GeoPosition::new(91.0, 20.15)).is_valid());
    }

    #[test]
    fn test_pixel_to_geo_outside_scene_is_invalid() {
        let gc = ramp_geocoding();
        assert!(!gc.pixel_to_geo(PixelPosition::new(-1.0, 50.0)).is_valid());
        assert!(!gc.pixel_to_geo(PixelPosition::new(50.0, 101.0)).is_valid());
        assert!(!gc.pixel_to_geo(PixelPosition::INVALID).is_valid());
    }

    #[test]
    fn test_antimeridian_grid_is_normalized() {
        let lat_grid =
            TiePointGrid::new(2, 2, 0.0, 0.0, 10.0, 10.0, vec![0.0, 0.0, 1.0, 1.0]).unwrap();
        let lon_grid =
            TiePointGrid::new(2, 2, 0.0, 0.0, 10.0, 10.0, vec![179.0, -179.0, 178.0, -178.0])
                .unwrap();
        let gc = TiePointGeocoding::new(lat_grid, lon_grid, SceneGeometry::new(10, 10)).unwrap();
        assert!(gc.is_crossing_meridian_at_180());
        // Interpolating across the seam must stay near the dateline.
        let geo = gc.pixel_to_geo(PixelPosition::new(5.0, 0.0));
        assert!(geo.lon.abs() >= 179.0, "lon = {}", geo.lon);
    }

    #[test]
    fn test_antimeridian_inverse_query() {
        // 4x4 grid straddling the dateline, lon 179.0 .. 179.3 + wrap.
        let mut lat = Vec::new();
        let mut lon = Vec::new();
        for j in 0..4 {
            for i in 0..4 {
                lat.push(0.1 * j as f64);
                let mut l = 179.4 + 0.4 * i as f64;
                if l > 180.0 {
                    l -= 360.0;
                }
                lon.push(l);
            }
        }
        let step = 100.0 / 3.0;
        let lat_grid = TiePointGrid::new(4, 4, 0.0, 0.0, step, step, lat).unwrap();
        let lon_grid = TiePointGrid::new(4, 4, 0.0, 0.0, step, step, lon).unwrap();
        let gc = TiePointGeocoding::new(lat_grid, lon_grid, SceneGeometry::new(100, 100)).unwrap();
        assert!(gc.is_crossing_meridian_at_180());
        // A longitude west of the seam and one east of it must both hit.
        let west = gc.geo_to_pixel(GeoPosition::new(0.15, 179.6));
        let east = gc.geo_to_pixel(GeoPosition::new(0.15, -179.8));
        assert!(west.is_valid());
        assert!(east.is_valid());
        assert!(east.x > west.x);
    }

    #[test]
    fn test_transfer_preserves_geolocation() {
        let gc = ramp_geocoding();
        let sub = gc
            .transfer(&SubsetRegion::new(20, 20, 60, 60), 2, 2)
            .unwrap();
        assert_eq!(sub.scene(), SceneGeometry::new(30, 30));
        let src = gc.pixel_to_geo(PixelPosition::new(50.0, 50.0));
        let dst = sub.pixel_to_geo(PixelPosition::new(15.0, 15.0));
        assert_relative_eq!(src.lat, dst.lat, epsilon = 1e-9);
        assert_relative_eq!(src.lon, dst.lon, epsilon = 1e-9);
    }

    #[test]
    fn test_inverse_lookup_ignores_previous_query() {
        // Park one instance's lookup cursor on the southern tile and the
        // other's on the northern tile.
        let south = stacked_tile_geocoding();
        assert!(south.geo_to_pixel(GeoPosition::new(50.5, 20.0)).is_valid());
        let north = stacked_tile_geocoding();
        assert!(north.geo_to_pixel(GeoPosition::new(54.0, 0.0)).is_valid());
        // The query lies inside every tile's validity radius; both
        // instances must pick the same closest tile regardless of what
        // they answered before.
        let query = GeoPosition::new(51.05, 20.0);
        let a = south.geo_to_pixel(query);
        let b = north.geo_to_pixel(query);
        assert!(a.is_valid());
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, b.y);
    }

    #[test]
    fn test_concurrent_first_queries_agree() {
        let gc = ramp_geocoding();
        let reference = ramp_geocoding().geo_to_pixel(GeoPosition::new(10.15, 20.15));
        // All threads race the lazy tile build on a shared instance.
        std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| gc.geo_to_pixel(GeoPosition::new(10.15, 20.15))))
                .collect();
            for worker in workers {
                let pos = worker.join().unwrap();
                assert_eq!(pos.x, reference.x);
                assert_eq!(pos.y, reference.y);
            }
        });
    }

    #[test]
    fn test_fit_dimension_balance() {
        assert_eq!(fit_dimension(1, 10, 10), (1, 1));
        let (ni, nj) = fit_dimension(4, 10, 10);
        assert_eq!((ni, nj), (2, 2));
        let (ni, nj) = fit_dimension(4, 40, 10);
        assert!(ni > nj);
    }

    #[test]
    fn test_subdivide_covers_grid_with_overlap() {
        let rects = subdivide(10, 10, 2, 2, 1);
        assert_eq!(rects.len(), 4);
        // First tile reaches one cell into its neighbors.
        assert_eq!(rects[0], (0, 0, 5, 5));
        // Last tile is clamped at the grid border.
        assert_eq!(rects[3], (5, 5, 9, 9));
    }
}
