use nalgebra::Matrix3;

use crate::math::Math;

pub const KEY_POINTS_LEN: usize = 5;

// Canonical alignment template as fractions of the output square,
// ordered left eye, right eye, nose, left mouth, right mouth.
const CANONICAL_DST: [[f32; 2]; KEY_POINTS_LEN] = [
    [0.31556875, 0.46157407],
    [0.68262292, 0.46157407],
    [0.50026250, 0.64050537],
    [0.37015179, 0.82469196],
    [0.63151667, 0.82469196],
];

#[derive(Debug, Clone, PartialEq)]
pub struct KeyPoints(pub [[f32; 2]; KEY_POINTS_LEN]);

impl KeyPoints {
    pub fn left_eye(&self) -> [f32; 2] {
        self.0[0]
    }

    pub fn right_eye(&self) -> [f32; 2] {
        self.0[1]
    }

    pub fn nose(&self) -> [f32; 2] {
        self.0[2]
    }

    /// Eyes + nose, the subset driving the geometric fallback.
    pub fn anchor_triangle(&self) -> [[f32; 2]; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn shift_relative(&self, x: f32, y: f32) -> Self {
        Self(self.0.map(|[px, py]| [px - x, py - y]))
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|[x, y]| x.is_finite() && y.is_finite())
    }

    fn mean(&self) -> [f32; 2] {
        Math::mean(self.0)
    }

    /// Least-squares similarity transform mapping `self` onto `dst`
    /// (scikit-image's umeyama). `None` when the point spread is rank zero.
    pub fn umeyama(&self, dst: &Self) -> Option<Matrix3<f32>> {
        use nalgebra::{ArrayStorage, Matrix, Matrix1x2, Matrix2, Matrix2x1};
        use std::ops::Mul;
        let [src_x_mean, src_y_mean] = self.mean();
        let [dst_x_mean, dst_y_mean] = dst.mean();
        let (src_dmean, dst_dmean) = (
            Matrix::from_array_storage(ArrayStorage(
                self.0.map(|[x, y]| [x - src_x_mean, y - src_y_mean]),
            )),
            Matrix::from_array_storage(ArrayStorage(
                dst.0.map(|[x, y]| [x - dst_x_mean, y - dst_y_mean]),
            )),
        );
        let a = std::ops::Mul::mul(dst_dmean, &src_dmean.transpose()) / KEY_POINTS_LEN as f32;
        let svd = Matrix::svd(a, true, true);
        let determinant = a.determinant();

        let mut d = [1f32; 2];
        if determinant < 0. {
            d[1] = -1.;
        }

        let rank = a.rank(0.00001f32);
        if rank == 0 {
            return None;
        }

        let mut t = Matrix2::<f32>::identity();
        let (s, (u, v)) = (svd.singular_values, (svd.u?, svd.v_t?));

        if rank == 1 {
            if u.determinant() * v.determinant() > 0. {
                u.mul_to(&v, &mut t);
            } else {
                let s = d[1];
                d[1] = -1.;
                let dg = Matrix2::<f32>::new(d[0], 0., 0., d[1]);

                let udg = u.mul(&dg);
                udg.mul_to(&v, &mut t);
                d[1] = s;
            }
        } else {
            let dg = Matrix2::<f32>::new(d[0], 0., 0., d[1]);
            let udg = u.mul(&dg);
            udg.mul_to(&v, &mut t);
        }

        let ddd = Matrix1x2::new(d[0], d[1]);
        let d_x_s = ddd.mul(s);

        let (var0, var1) = (
            src_dmean.remove_row(0).variance(),
            src_dmean.remove_row(1).variance(),
        );

        let var_sum = var0 + var1;

        let scale = d_x_s.get((0, 0))? / var_sum;

        let (dst_mean, src_mean) = (
            Matrix2x1::<f32>::new(dst_x_mean, dst_y_mean),
            Matrix2x1::<f32>::new(src_x_mean, src_y_mean),
        );
        let t_x_src_mean = t.mul(&src_mean);

        let translation = dst_mean - scale * t_x_src_mean;

        let (m13, m23) = (*translation.get(0)?, *translation.get(1)?);

        let m00x22 = t * scale;

        let (m11, m21, m12, m22) = (m00x22.m11, m00x22.m21, m00x22.m12, m00x22.m22);

        Some(Matrix3::<f32>::new(m11, m12, m13, m21, m22, m23, 0., 0., 1.))
    }

    /// Similarity onto the canonical template scaled to `output_size`.
    pub fn umeyama_to_canonical(&self, output_size: u32) -> Option<Matrix3<f32>> {
        let dst = Self(CANONICAL_DST.map(|[x, y]| {
            [x * output_size as f32, y * output_size as f32]
        }));
        self.umeyama(&dst)
    }

    /// Exact affine transform carrying three `src` points onto three `dst`
    /// points. `None` when either triangle is collinear.
    pub fn three_point_affine(
        src: [[f32; 2]; 3],
        dst: [[f32; 2]; 3],
    ) -> Option<Matrix3<f32>> {
        let coeffs = [
            [src[0][0], src[0][1], 1.],
            [src[1][0], src[1][1], 1.],
            [src[2][0], src[2][1], 1.],
        ];
        let [a, b, c] = Math::solve3(coeffs, [dst[0][0], dst[1][0], dst[2][0]])?;
        let [d, e, f] = Math::solve3(coeffs, [dst[0][1], dst[1][1], dst[2][1]])?;

        Some(Matrix3::new(a, b, c, d, e, f, 0., 0., 1.))
    }
}

impl std::ops::Deref for KeyPoints {
    type Target = [[f32; 2]; KEY_POINTS_LEN];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for KeyPoints {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[cfg(test)]
mod test {
    use super::KeyPoints;

    fn apply(m: &nalgebra::Matrix3<f32>, [x, y]: [f32; 2]) -> [f32; 2] {
        let p = m * nalgebra::Matrix3x1::new(x, y, 1.);
        [p.x, p.y]
    }

    #[test]
    fn umeyama_recovers_a_similarity_transform() {
        let src = KeyPoints([[10., 10.], [50., 12.], [30., 30.], [15., 45.], [48., 44.]]);
        // rotate 30 degrees, scale 1.5, translate (7, -3)
        let (sin, cos) = 30f32.to_radians().sin_cos();
        let expected =
            nalgebra::Matrix3::new(1.5 * cos, -1.5 * sin, 7., 1.5 * sin, 1.5 * cos, -3., 0., 0., 1.);
        let dst = KeyPoints(src.0.map(|p| apply(&expected, p)));

        let estimated = src.umeyama(&dst).unwrap();

        for (point, target) in src.0.iter().zip(dst.0.iter()) {
            let mapped = apply(&estimated, *point);
            assert!((mapped[0] - target[0]).abs() < 1e-2);
            assert!((mapped[1] - target[1]).abs() < 1e-2);
        }
    }

    #[test]
    fn umeyama_rejects_coincident_points() {
        let src = KeyPoints([[5., 5.]; 5]);
        let dst = KeyPoints([[10., 10.], [50., 12.], [30., 30.], [15., 45.], [48., 44.]]);

        assert!(src.umeyama(&dst).is_none());
    }

    #[test]
    fn canonical_transform_lands_landmarks_on_template() {
        // landmarks already laid out like the template for a 100px square
        let src = KeyPoints([
            [31.556875, 46.157407],
            [68.262292, 46.157407],
            [50.026250, 64.050537],
            [37.015179, 82.469196],
            [63.151667, 82.469196],
        ]);

        let transform = src.umeyama_to_canonical(512).unwrap();

        let mapped = apply(&transform, src.left_eye());
        assert!((mapped[0] - 0.31556875 * 512.).abs() < 0.5);
        assert!((mapped[1] - 0.46157407 * 512.).abs() < 0.5);
    }

    #[test]
    fn three_point_affine_is_exact_on_its_anchors() {
        let src = [[0., 0.], [10., 0.], [0., 10.]];
        let dst = [[5., 5.], [25., 7.], [3., 28.]];

        let transform = KeyPoints::three_point_affine(src, dst).unwrap();

        for (point, target) in src.iter().zip(dst.iter()) {
            let mapped = apply(&transform, *point);
            assert!((mapped[0] - target[0]).abs() < 1e-3);
            assert!((mapped[1] - target[1]).abs() < 1e-3);
        }
    }

    #[test]
    fn three_point_affine_rejects_collinear_anchors() {
        let src = [[0., 0.], [5., 5.], [10., 10.]];
        let dst = [[5., 5.], [25., 7.], [3., 28.]];

        assert!(KeyPoints::three_point_affine(src, dst).is_none());
    }

    #[test]
    fn shift_relative_moves_all_points() {
        let kp = KeyPoints([[10., 20.], [30., 40.], [50., 60.], [70., 80.], [90., 100.]]);
        let shifted = kp.shift_relative(10., 20.);

        assert_eq!(shifted.left_eye(), [0., 0.]);
        assert_eq!(shifted.nose(), [40., 40.]);
    }
}
