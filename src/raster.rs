//! Raster-facing collaborator interfaces: sample sources, tie-point grids
//! and scene/subset geometry.
//!
//! Sample storage and I/O live outside this crate; the geocoders only see
//! resident arrays through [`SampleSource`] or a [`TiePointGrid`].

use ndarray::Array2;
use num_traits::NumCast;

use crate::error::GeocodingError;

/// Read access to an in-memory raster band.
///
/// Mask bands use the value 0.0 to mean "no data". Implementations must be
/// safe to call from multiple threads.
pub trait SampleSource: Send + Sync {
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// The sample at pixel `(x, y)`. Callers guarantee in-bounds access.
    fn sample(&self, x: usize, y: usize) -> f64;
}

impl<T> SampleSource for Array2<T>
where
    T: Copy + NumCast + Send + Sync,
{
    fn width(&self) -> usize {
        self.ncols()
    }

    fn height(&self) -> usize {
        self.nrows()
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        NumCast::from(self[(y, x)]).unwrap_or(f64::NAN)
    }
}

/// Raster dimensions of the full scene a geocoding is valid for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SceneGeometry {
    pub width: usize,
    pub height: usize,
}

impl SceneGeometry {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }
}

/// A rectangular sub-region of a scene, in full-resolution pixel
/// coordinates of the source scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubsetRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl SubsetRegion {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub(crate) fn validate(
        &self,
        scene: SceneGeometry,
        step_x: usize,
        step_y: usize,
    ) -> Result<(), GeocodingError> {
        if self.width == 0 || self.height == 0 {
            return Err(GeocodingError::InvalidRegion("empty region".into()));
        }
        if step_x == 0 || step_y == 0 {
            return Err(GeocodingError::InvalidRegion("zero sub-sampling".into()));
        }
        if self.x + self.width > scene.width || self.y + self.height > scene.height {
            return Err(GeocodingError::InvalidRegion(format!(
                "region {}+{} x {}+{} exceeds scene {} x {}",
                self.x, self.width, self.y, self.height, scene.width, scene.height
            )));
        }
        Ok(())
    }
}

/// A sparse grid of samples (latitudes or longitudes) covering the full
/// raster through an offset and sub-sampling mapping.
///
/// Grid cell `(i, j)` sits at raster pixel
/// `(offset_x + i * sub_sampling_x, offset_y + j * sub_sampling_y)`.
#[derive(Clone, Debug)]
pub struct TiePointGrid {
    width: usize,
    height: usize,
    offset_x: f64,
    offset_y: f64,
    sub_sampling_x: f64,
    sub_sampling_y: f64,
    data: Array2<f64>,
}

impl TiePointGrid {
    pub fn new(
        width: usize,
        height: usize,
        offset_x: f64,
        offset_y: f64,
        sub_sampling_x: f64,
        sub_sampling_y: f64,
        data: Vec<f64>,
    ) -> Result<Self, GeocodingError> {
        if width == 0 || height == 0 {
            return Err(GeocodingError::Shape("empty tie-point grid".into()));
        }
        if sub_sampling_x <= 0.0 || sub_sampling_y <= 0.0 {
            return Err(GeocodingError::Shape(format!(
                "sub-sampling must be positive, got ({sub_sampling_x}, {sub_sampling_y})"
            )));
        }
        if data.len() != width * height {
            return Err(GeocodingError::Shape(format!(
                "tie-point data length {} does not match {} x {}",
                data.len(),
                width,
                height
            )));
        }
        let data = Array2::from_shape_vec((height, width), data)
            .map_err(|e| GeocodingError::Shape(e.to_string()))?;
        Ok(Self {
            width,
            height,
            offset_x,
            offset_y,
            sub_sampling_x,
            sub_sampling_y,
            data,
        })
    }

    /// Builds a grid with identical geometry but different sample values.
    pub(crate) fn with_data(&self, data: Array2<f64>) -> Self {
        Self {
            data,
            ..self.clone()
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn offset_x(&self) -> f64 {
        self.offset_x
    }

    pub fn offset_y(&self) -> f64 {
        self.offset_y
    }

    pub fn sub_sampling_x(&self) -> f64 {
        self.sub_sampling_x
    }

    pub fn sub_sampling_y(&self) -> f64 {
        self.sub_sampling_y
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    /// True when both grids describe the same sub-grid of the same raster.
    pub fn is_compatible_with(&self, other: &TiePointGrid) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.offset_x == other.offset_x
            && self.offset_y == other.offset_y
            && self.sub_sampling_x == other.sub_sampling_x
            && self.sub_sampling_y == other.sub_sampling_y
    }

    /// The raster pixel x-coordinate of grid column `i`.
    pub fn raster_x(&self, i: usize) -> f64 {
        self.offset_x + i as f64 * self.sub_sampling_x
    }

    /// The raster pixel y-coordinate of grid row `j`.
    pub fn raster_y(&self, j: usize) -> f64 {
        self.offset_y + j as f64 * self.sub_sampling_y
    }

    /// The grid value at a fractional raster pixel position, bilinearly
    /// interpolated between the four surrounding tie points. Positions
    /// outside the grid hull are clamped to its border cells.
    pub fn value_at(&self, pixel_x: f64, pixel_y: f64) -> f64 {
        let fi = (pixel_x - self.offset_x) / self.sub_sampling_x;
        let fj = (pixel_y - self.offset_y) / self.sub_sampling_y;
        let fi = fi.clamp(0.0, (self.width - 1) as f64);
        let fj = fj.clamp(0.0, (self.height - 1) as f64);
        let i0 = (fi.floor() as usize).min(self.width.saturating_sub(2));
        let j0 = (fj.floor() as usize).min(self.height.saturating_sub(2));
        if self.width == 1 || self.height == 1 {
            // Degenerate grid lines interpolate along the remaining axis.
            let i1 = (i0 + 1).min(self.width - 1);
            let j1 = (j0 + 1).min(self.height - 1);
            let wi = if self.width == 1 { 0.0 } else { fi - i0 as f64 };
            let wj = if self.height == 1 { 0.0 } else { fj - j0 as f64 };
            return crate::position::interpolate2d(
                wi,
                wj,
                self.data[(j0, i0)],
                self.data[(j0, i1)],
                self.data[(j1, i0)],
                self.data[(j1, i1)],
            );
        }
        let wi = fi - i0 as f64;
        let wj = fj - j0 as f64;
        crate::position::interpolate2d(
            wi,
            wj,
            self.data[(j0, i0)],
            self.data[(j0, i0 + 1)],
            self.data[(j0 + 1, i0)],
            self.data[(j0 + 1, i0 + 1)],
        )
    }

    /// Creates the grid describing the same samples over a cropped,
    /// sub-sampled scene.
    ///
    /// Tie points outside the covering range of `region` are dropped; the
    /// offset and sub-sampling are rebased to the subset raster.
    pub fn create_subset(
        &self,
        region: &SubsetRegion,
        step_x: usize,
        step_y: usize,
    ) -> Result<TiePointGrid, GeocodingError> {
        let x0 = region.x as f64;
        let y0 = region.y as f64;
        let x1 = (region.x + region.width) as f64;
        let y1 = (region.y + region.height) as f64;

        let i1 = (((x0 - self.offset_x) / self.sub_sampling_x).floor() as isize)
            .clamp(0, self.width as isize - 1) as usize;
        let i2 = (((x1 - self.offset_x) / self.sub_sampling_x).ceil() as isize)
            .clamp(0, self.width as isize - 1) as usize;
        let j1 = (((y0 - self.offset_y) / self.sub_sampling_y).floor() as isize)
            .clamp(0, self.height as isize - 1) as usize;
        let j2 = (((y1 - self.offset_y) / self.sub_sampling_y).ceil() as isize)
            .clamp(0, self.height as isize - 1) as usize;

        let new_w = i2 - i1 + 1;
        let new_h = j2 - j1 + 1;
        if new_w < 2 || new_h < 2 {
            return Err(GeocodingError::InvalidRegion(format!(
                "region covers only {new_w} x {new_h} tie points, need at least 2 x 2"
            )));
        }

        let data: Vec<f64> = self
            .data
            .slice(ndarray::s![j1..=j2, i1..=i2])
            .iter()
            .copied()
            .collect();

        TiePointGrid::new(
            new_w,
            new_h,
            (self.raster_x(i1) - x0) / step_x as f64,
            (self.raster_y(j1) - y0) / step_y as f64,
            self.sub_sampling_x / step_x as f64,
            self.sub_sampling_y / step_y as f64,
            data,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp_grid() -> TiePointGrid {
        // 3x3 grid over a 40x40 raster, values 0..8 row-major.
        TiePointGrid::new(
            3,
            3,
            0.5,
            0.5,
            20.0,
            20.0,
            (0..9).map(|v| v as f64).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(TiePointGrid::new(3, 3, 0.0, 0.0, 1.0, 1.0, vec![0.0; 8]).is_err());
        assert!(TiePointGrid::new(0, 3, 0.0, 0.0, 1.0, 1.0, vec![]).is_err());
        assert!(TiePointGrid::new(2, 2, 0.0, 0.0, 0.0, 1.0, vec![0.0; 4]).is_err());
    }

    #[test]
    fn test_value_at_grid_nodes() {
        let g = ramp_grid();
        assert_relative_eq!(g.value_at(0.5, 0.5), 0.0);
        assert_relative_eq!(g.value_at(20.5, 0.5), 1.0);
        assert_relative_eq!(g.value_at(40.5, 40.5), 8.0);
    }

    #[test]
    fn test_value_at_interpolates() {
        let g = ramp_grid();
        // Halfway between nodes (0,0) and (1,0).
        assert_relative_eq!(g.value_at(10.5, 0.5), 0.5);
        // Center of the grid.
        assert_relative_eq!(g.value_at(20.5, 20.5), 4.0);
    }

    #[test]
    fn test_value_at_clamps_outside() {
        let g = ramp_grid();
        assert_relative_eq!(g.value_at(-100.0, -100.0), 0.0);
        assert_relative_eq!(g.value_at(1000.0, 1000.0), 8.0);
    }

    #[test]
    fn test_subset_rebases_geometry() {
        let g = ramp_grid();
        let sub = g
            .create_subset(&SubsetRegion::new(10, 10, 30, 30), 1, 1)
            .unwrap();
        // The same scene location must interpolate to the same value.
        let v_src = g.value_at(25.0, 25.0);
        let v_sub = sub.value_at(15.0, 15.0);
        assert_relative_eq!(v_src, v_sub, epsilon = 1e-12);
    }

    #[test]
    fn test_subset_with_step() {
        let g = ramp_grid();
        let sub = g
            .create_subset(&SubsetRegion::new(0, 0, 40, 40), 2, 2)
            .unwrap();
        assert_relative_eq!(sub.sub_sampling_x(), 10.0);
        // Source pixel (20.5, 20.5) becomes subset pixel (10.25, 10.25).
        assert_relative_eq!(g.value_at(20.5, 20.5), sub.value_at(10.25, 10.25), epsilon = 1e-12);
    }

    #[test]
    fn test_sample_source_for_arrays() {
        let a = Array2::from_shape_fn((2, 3), |(r, c)| (r * 3 + c) as f32);
        assert_eq!(SampleSource::width(&a), 3);
        assert_eq!(SampleSource::height(&a), 2);
        assert_relative_eq!(a.sample(2, 1), 5.0);
    }
}
