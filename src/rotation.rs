//! Spherical rotation of geographic coordinates.
//!
//! A [`SphericalRotator`] moves an arbitrary point to the new origin
//! (0, 0) of the lat/lon graticule. The tie-point and GCP fitters use it
//! to recenter their input so that polynomial fitting happens far away
//! from the antimeridian and the poles, where plain lat/lon arithmetic
//! breaks down.

use nalgebra::{Matrix3, Vector3};

use crate::position::GeoPosition;

/// Rotates geographic coordinates on the unit sphere.
///
/// The rotation matrix is orthonormal, so the inverse transform is the
/// transpose. Pure arithmetic, no failure modes.
#[derive(Clone, Debug)]
pub struct SphericalRotator {
    m: Matrix3<f64>,
}

impl SphericalRotator {
    /// Creates a rotator that maps the point `(lon, lat)` to `(0, 0)`.
    ///
    /// `alpha` applies an additional rotation (degrees) about the x-axis
    /// of the rotated frame.
    pub fn new(lon: f64, lat: f64, alpha: f64) -> Self {
        let u = lon.to_radians();
        let v = lat.to_radians();
        let w = alpha.to_radians();
        let (su, cu) = u.sin_cos();
        let (sv, cv) = v.sin_cos();
        let (sw, cw) = w.sin_cos();

        // R = Rx(alpha) * Ry(lat) * Rz(-lon)
        let m = Matrix3::new(
            cu * cv,
            su * cv,
            sv,
            -cw * su - sw * sv * cu,
            cw * cu - sw * sv * su,
            sw * cv,
            su * sw - cw * sv * cu,
            -sw * cu - cw * sv * su,
            cw * cv,
        );
        Self { m }
    }

    /// Creates a rotator centered on the spherical mean of the given
    /// points.
    ///
    /// The center is computed by averaging unit vectors, not lat/lon
    /// values, so point sets straddling the antimeridian or enclosing a
    /// pole produce a meaningful center.
    pub fn for_points(points: &[GeoPosition]) -> Self {
        let (lon, lat) = spherical_mean(points);
        Self::new(lon, lat, 0.0)
    }

    /// Rotates a single position into the centered frame.
    pub fn transform(&self, point: GeoPosition) -> GeoPosition {
        rotate(&self.m, point)
    }

    /// Rotates a single position back into the original frame.
    pub fn transform_inversely(&self, point: GeoPosition) -> GeoPosition {
        rotate(&self.m.transpose(), point)
    }

    /// Rotates coordinate arrays in place.
    pub fn transform_slices(&self, lons: &mut [f64], lats: &mut [f64]) {
        assert_eq!(lons.len(), lats.len(), "lon/lat length mismatch");
        for (lon, lat) in lons.iter_mut().zip(lats.iter_mut()) {
            let p = rotate(&self.m, GeoPosition::new(*lat, *lon));
            *lon = p.lon;
            *lat = p.lat;
        }
    }

    /// Rotates coordinate arrays in place, back into the original frame.
    pub fn transform_slices_inversely(&self, lons: &mut [f64], lats: &mut [f64]) {
        assert_eq!(lons.len(), lats.len(), "lon/lat length mismatch");
        let t = self.m.transpose();
        for (lon, lat) in lons.iter_mut().zip(lats.iter_mut()) {
            let p = rotate(&t, GeoPosition::new(*lat, *lon));
            *lon = p.lon;
            *lat = p.lat;
        }
    }
}

fn rotate(m: &Matrix3<f64>, point: GeoPosition) -> GeoPosition {
    let u = point.lon.to_radians();
    let v = point.lat.to_radians();
    let (su, cu) = u.sin_cos();
    let (sv, cv) = v.sin_cos();
    let p = m * Vector3::new(cu * cv, su * cv, sv);
    GeoPosition::new(
        p.z.clamp(-1.0, 1.0).asin().to_degrees(),
        p.y.atan2(p.x).to_degrees(),
    )
}

/// Spherical mean of a point set via unit-vector averaging.
/// Returns `(lon, lat)` in degrees.
pub fn spherical_mean(points: &[GeoPosition]) -> (f64, f64) {
    let mut sum = Vector3::zeros();
    for p in points {
        let u = p.lon.to_radians();
        let v = p.lat.to_radians();
        let (su, cu) = u.sin_cos();
        let (sv, cv) = v.sin_cos();
        sum += Vector3::new(cu * cv, su * cv, sv);
    }
    let lat = (sum.z / sum.norm()).clamp(-1.0, 1.0).asin().to_degrees();
    let lon = sum.y.atan2(sum.x).to_degrees();
    (lon, lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_maps_to_origin() {
        let r = SphericalRotator::new(135.0, -60.0, 0.0);
        let p = r.transform(GeoPosition::new(-60.0, 135.0));
        assert_relative_eq!(p.lat, 0.0, epsilon = 1e-10);
        assert_relative_eq!(p.lon, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_roundtrip() {
        let cases: &[(f64, f64, f64)] = &[
            (0.0, 0.0, 0.0),
            (10.0, 50.0, 0.0),
            (-170.0, -80.0, 30.0),
            (179.5, 5.0, -45.0),
            (45.0, 89.0, 120.0),
        ];
        for &(lon, lat, alpha) in cases {
            let r = SphericalRotator::new(lon, lat, alpha);
            for &(plon, plat) in &[(7.0, 53.0), (-179.0, -10.0), (0.0, 89.9), (100.0, -45.0)] {
                let p = GeoPosition::new(plat, plon);
                let q = r.transform_inversely(r.transform(p));
                assert_relative_eq!(q.lat, p.lat, epsilon = 1e-9);
                // Longitudes compare modulo 360.
                let dlon = crate::position::lon_diff(q.lon, p.lon);
                assert!(dlon < 1e-9, "dlon = {dlon} for ({plon}, {plat})");
            }
        }
    }

    #[test]
    fn test_batch_matches_single() {
        let r = SphericalRotator::new(-25.0, 33.0, 10.0);
        let mut lons = vec![-30.0, -20.0, -25.0];
        let mut lats = vec![30.0, 36.0, 33.0];
        r.transform_slices(&mut lons, &mut lats);
        for i in 0..3 {
            let single = r.transform(GeoPosition::new(
                [30.0, 36.0, 33.0][i],
                [-30.0, -20.0, -25.0][i],
            ));
            assert_relative_eq!(lats[i], single.lat, epsilon = 1e-12);
            assert_relative_eq!(lons[i], single.lon, epsilon = 1e-12);
        }
        r.transform_slices_inversely(&mut lons, &mut lats);
        assert_relative_eq!(lons[2], -25.0, epsilon = 1e-9);
        assert_relative_eq!(lats[2], 33.0, epsilon = 1e-9);
    }

    #[test]
    fn test_spherical_mean_across_antimeridian() {
        let points = [
            GeoPosition::new(0.0, 179.0),
            GeoPosition::new(0.0, -179.0),
        ];
        let (lon, lat) = spherical_mean(&points);
        assert_relative_eq!(lat, 0.0, epsilon = 1e-10);
        assert!(lon.abs() > 179.9, "lon = {lon}");
    }

    #[test]
    fn test_rotation_preserves_distance() {
        // Angular separation between two points is invariant under rotation.
        let r = SphericalRotator::new(60.0, -45.0, 77.0);
        let a = GeoPosition::new(10.0, 20.0);
        let b = GeoPosition::new(12.0, 24.0);
        let ra = r.transform(a);
        let rb = r.transform(b);
        let sep = |p: GeoPosition, q: GeoPosition| {
            let (p1, l1) = (p.lat.to_radians(), p.lon.to_radians());
            let (p2, l2) = (q.lat.to_radians(), q.lon.to_radians());
            (p1.sin() * p2.sin() + p1.cos() * p2.cos() * (l1 - l2).cos())
                .clamp(-1.0, 1.0)
                .acos()
        };
        assert_relative_eq!(sep(a, b), sep(ra, rb), epsilon = 1e-12);
    }
}
