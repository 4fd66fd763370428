use crate::models::Point;

/// Projective mapping between two quadrilaterals (homography, `h33 = 1`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveTransform {
    h: [f64; 8],
}

impl PerspectiveTransform {
    /// Solve the transform that maps each `src[i]` onto `dst[i]`.
    ///
    /// Returns `None` for degenerate quads (three collinear corners etc.).
    pub fn from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];

        for i in 0..4 {
            let (sx, sy) = (src[i].x as f64, src[i].y as f64);
            let (dx, dy) = (dst[i].x as f64, dst[i].y as f64);

            let row = i * 2;
            a[row] = [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy];
            b[row] = dx;
            a[row + 1] = [0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy];
            b[row + 1] = dy;
        }

        let h = solve_linear_system(a, b)?;
        h.iter().all(|v| v.is_finite()).then_some(Self { h })
    }

    /// Map a point; `None` when it lands on the line at infinity
    pub fn transform(&self, p: &Point) -> Option<Point> {
        let h = &self.h;
        let (x, y) = (p.x as f64, p.y as f64);
        let denominator = h[6] * x + h[7] * y + 1.0;
        if denominator.abs() < 1e-12 {
            return None;
        }
        let out = Point::new(
            ((h[0] * x + h[1] * y + h[2]) / denominator) as f32,
            ((h[3] * x + h[4] * y + h[5]) / denominator) as f32,
        );
        out.is_finite().then_some(out)
    }
}

/// Gaussian elimination with partial pivoting on an 8x8 system
#[allow(clippy::needless_range_loop)]
fn solve_linear_system(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Option<[f64; 8]> {
    const N: usize = 8;

    for i in 0..N {
        let mut max_row = i;
        for k in (i + 1)..N {
            if a[k][i].abs() > a[max_row][i].abs() {
                max_row = k;
            }
        }
        if a[max_row][i].abs() < 1e-12 {
            return None;
        }
        a.swap(i, max_row);
        b.swap(i, max_row);

        for k in (i + 1)..N {
            let factor = a[k][i] / a[i][i];
            b[k] -= factor * b[i];
            for j in i..N {
                a[k][j] -= factor * a[i][j];
            }
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = b[i];
        for j in (i + 1)..N {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }
    Some(x)
}

/// Absolute cosine of the angle at `corner` formed with `a` and `b`
pub fn corner_cosine(corner: &Point, a: &Point, b: &Point) -> Option<f32> {
    let (v1x, v1y) = (a.x - corner.x, a.y - corner.y);
    let (v2x, v2y) = (b.x - corner.x, b.y - corner.y);
    let denom = (v1x * v1x + v1y * v1y).sqrt() * (v2x * v2x + v2y * v2y).sqrt();
    if denom <= f32::EPSILON {
        return None;
    }
    Some(((v1x * v2x + v1y * v2y) / denom).abs())
}

/// Z component of `(a - origin) x (b - origin)`
pub fn cross(origin: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - origin.x) * (b.y - origin.y) - (a.y - origin.y) * (b.x - origin.x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaling_transform() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(0.0, 50.0),
        ];

        let t = PerspectiveTransform::from_points(&src, &dst).unwrap();
        let p = t.transform(&Point::new(50.0, 50.0)).unwrap();
        assert!((p.x - 25.0).abs() < 1e-3);
        assert!((p.y - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_maps_corners_exactly() {
        let src = [
            Point::new(3.5, 3.5),
            Point::new(17.5, 3.5),
            Point::new(17.5, 17.5),
            Point::new(3.5, 17.5),
        ];
        let dst = [
            Point::new(40.0, 52.0),
            Point::new(180.0, 60.0),
            Point::new(170.0, 210.0),
            Point::new(30.0, 200.0),
        ];
        let t = PerspectiveTransform::from_points(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let mapped = t.transform(s).unwrap();
            assert!(mapped.distance(d) < 1e-2);
        }
    }

    #[test]
    fn test_degenerate_quad() {
        let line = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(3.0, 0.0),
        ];
        assert!(PerspectiveTransform::from_points(&line, &line).is_none());
    }

    #[test]
    fn test_corner_cosine_and_cross() {
        let o = Point::new(0.0, 0.0);
        let a = Point::new(1.0, 0.0);
        let b = Point::new(0.0, 1.0);
        assert!(corner_cosine(&o, &a, &b).unwrap() < 1e-6);
        assert!(cross(&o, &a, &b) > 0.0);
        assert!(corner_cosine(&o, &o, &b).is_none());
    }
}
