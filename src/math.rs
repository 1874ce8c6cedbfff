pub struct Math;

impl Math {
    pub fn mean<const C: usize, const R: usize>(set: [[f32; C]; R]) -> [f32; C] {
        set.iter().fold([0.; C], |accu, row| {
            accu.iter()
                .enumerate()
                .map(|(idx, v)| v + row[idx] / R as f32)
                .collect::<Vec<f32>>()
                .try_into()
                .unwrap()
        })
    }

    /// Solves `a * x = b` for a 3x3 system by Gaussian elimination with
    /// partial pivoting. `None` when the system is singular.
    pub fn solve3(a: [[f32; 3]; 3], b: [f32; 3]) -> Option<[f32; 3]> {
        let mut m = a;
        let mut v = b;

        for i in 0..3 {
            let mut pivot_row = i;
            for row in i + 1..3 {
                if m[row][i].abs() > m[pivot_row][i].abs() {
                    pivot_row = row;
                }
            }
            m.swap(i, pivot_row);
            v.swap(i, pivot_row);

            let pivot = m[i][i];
            if pivot.abs() < 1e-6 {
                return None;
            }

            for row in i + 1..3 {
                let factor = m[row][i] / pivot;
                m[row][i] = 0.;
                for col in i + 1..3 {
                    m[row][col] -= factor * m[i][col];
                }
                v[row] -= factor * v[i];
            }
        }

        let mut x = [0f32; 3];
        for i in (0..3).rev() {
            let sum: f32 = (i + 1..3).map(|j| m[i][j] * x[j]).sum();
            x[i] = (v[i] - sum) / m[i][i];
        }
        Some(x)
    }
}

#[cfg(test)]
mod test {
    use super::Math;

    #[test]
    fn get_correct_mean() {
        let mean = Math::mean([[1., 2.], [3., 4.], [5., 6.], [7., 8.], [9., 10.]]);
        assert_eq!(mean, [5., 6.]);
    }

    #[test]
    fn solves_three_by_three_system() {
        // x = 1, y = -2, z = 3
        let a = [[2., 1., -1.], [-3., -1., 2.], [-2., 1., 2.]];
        let b = [-3., 5., 2.];
        let x = Math::solve3(a, b).unwrap();

        assert!((x[0] - 1.).abs() < 1e-4);
        assert!((x[1] + 2.).abs() < 1e-4);
        assert!((x[2] - 3.).abs() < 1e-4);
    }

    #[test]
    fn rejects_singular_system() {
        let a = [[1., 2., 3.], [2., 4., 6.], [1., 0., 1.]];
        assert!(Math::solve3(a, [1., 2., 3.]).is_none());
    }
}
