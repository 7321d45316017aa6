use facerec_core::{
    io,
    linalg::{self, NumericPolicy},
    FaceCoreError, Matrix, Metric,
};
use std::io::{Seek, SeekFrom};

fn assert_approx_eq_matrix(a: &Matrix, b: &Matrix, tolerance: f64) {
    assert_eq!(a.dims(), b.dims(), "Matrix shapes differ");
    for j in 0..a.cols() {
        for i in 0..a.rows() {
            let diff = (a[(i, j)] - b[(i, j)]).abs();
            assert!(
                diff <= tolerance,
                "Mismatch at ({}, {}): expected {}, got {}, diff {}",
                i,
                j,
                b[(i, j)],
                a[(i, j)],
                diff
            );
        }
    }
}

/// Diagonally dominant, hence invertible.
fn well_conditioned(n: usize, seed: u64) -> Matrix {
    let mut m = Matrix::random_normal_seeded(n, n, seed).unwrap();
    for i in 0..n {
        m[(i, i)] += 2.0 * n as f64;
    }
    m
}

#[test]
fn test_inverse_round_trip() -> Result<(), FaceCoreError> {
    for (n, seed) in [(1, 1), (3, 2), (8, 3), (17, 4)] {
        let m = well_conditioned(n, seed);
        let inv = linalg::inverse(&m)?;
        assert_approx_eq_matrix(&linalg::inverse(&inv)?, &m, 1e-9);
        assert_approx_eq_matrix(&linalg::product(&m, &inv)?, &Matrix::identity(n)?, 1e-12);
    }
    Ok(())
}

#[test]
fn test_identity_product_is_exact() -> Result<(), FaceCoreError> {
    let m = Matrix::random_normal_seeded(6, 4, 9)?;
    assert_eq!(linalg::product(&m, &Matrix::identity(4)?)?, m);
    assert_eq!(linalg::product(&Matrix::identity(6)?, &m)?, m);
    Ok(())
}

#[test]
fn test_transpose_twice() -> Result<(), FaceCoreError> {
    let m = Matrix::random_normal_seeded(5, 3, 21)?;
    let t = linalg::transpose(&m);
    assert_eq!(t.dims(), (3, 5));
    assert_eq!(linalg::transpose(&t), m);
    assert_approx_eq_matrix(
        &linalg::product_transposed(&m, &m)?,
        &linalg::product(&t, &m)?,
        1e-12,
    );
    Ok(())
}

#[test]
fn test_binary_round_trip_is_bit_exact() -> Result<(), FaceCoreError> {
    let mut m = Matrix::random_normal_seeded(7, 5, 5)?;
    m[(0, 0)] = f64::MIN_POSITIVE;
    m[(6, 4)] = -0.0;
    let mut file = tempfile::tempfile()?;
    io::write_binary(&m, &mut file)?;
    file.seek(SeekFrom::Start(0))?;
    let back = io::read_binary(&mut file)?;
    let bits = |m: &Matrix| m.as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(back.dims(), m.dims());
    assert_eq!(bits(&back), bits(&m));
    Ok(())
}

#[test]
fn test_eigen_pairs() -> Result<(), FaceCoreError> {
    let x = Matrix::random_normal_seeded(6, 10, 13)?;
    let m = linalg::covariance(&x)?;
    let eig = linalg::eigen(&m)?;
    let values = eig.values.as_slice();
    assert!(values.windows(2).all(|w| w[0] <= w[1]), "not ascending: {:?}", values);

    for (i, &lambda) in values.iter().enumerate() {
        let v = eig.vectors.copy_columns(i, i + 1)?;
        let mut lv = v.copy();
        lv.elem_mult(lambda);
        assert_approx_eq_matrix(&linalg::product(&m, &v)?, &lv, 1e-10);
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }
    Ok(())
}

#[test]
fn test_covariance_is_symmetric_psd() -> Result<(), FaceCoreError> {
    for (rows, cols, seed) in [(4, 2, 1), (5, 9, 2), (8, 3, 3)] {
        let c = linalg::covariance(&Matrix::random_normal_seeded(rows, cols, seed)?)?;
        assert_eq!(c.dims(), (rows, rows));
        assert_approx_eq_matrix(&c, &linalg::transpose(&c), 1e-12);
        let eig = linalg::eigen(&c)?;
        assert!(eig.values.as_slice().iter().all(|&l| l > -1e-10));
    }
    Ok(())
}

#[test]
fn test_sqrtm_of_covariance_squares_back() -> Result<(), FaceCoreError> {
    let c = linalg::covariance(&Matrix::random_normal_seeded(5, 12, 17)?)?;
    let r = linalg::sqrtm(&c)?;
    assert_approx_eq_matrix(&linalg::product(&r, &r)?, &c, 1e-10);
    Ok(())
}

#[test]
fn test_generalized_eigen_satisfies_equation() -> Result<(), FaceCoreError> {
    let a = linalg::covariance(&Matrix::random_normal_seeded(4, 9, 31)?)?;
    let mut b = linalg::covariance(&Matrix::random_normal_seeded(4, 9, 32)?)?;
    for i in 0..4 {
        b[(i, i)] += 1.0;
    }
    let eig = linalg::eigen2(&a, &b)?;
    for (i, &lambda) in eig.values.as_slice().iter().enumerate() {
        let x = eig.vectors.copy_columns(i, i + 1)?;
        let mut bx = linalg::product(&b, &x)?;
        bx.elem_mult(lambda);
        assert_approx_eq_matrix(&linalg::product(&a, &x)?, &bx, 1e-9);
    }
    Ok(())
}

#[test]
fn test_numeric_policies() -> Result<(), FaceCoreError> {
    let singular = Matrix::from_rows(&[[1.0, 2.0], [2.0, 4.0]])?;
    assert!(matches!(
        linalg::inverse(&singular),
        Err(FaceCoreError::NumericallyInvalid { .. })
    ));
    let garbage = linalg::inverse_with(&singular, NumericPolicy::Propagate)?;
    assert!(garbage.as_slice().iter().all(|v| v.is_nan()));

    let indefinite = Matrix::from_rows(&[[0.0, 1.0], [1.0, 0.0]])?;
    assert!(linalg::sqrtm(&indefinite).is_err());
    let nan = linalg::sqrtm_with(&indefinite, NumericPolicy::Propagate)?;
    assert!(nan.as_slice().iter().any(|v| v.is_nan()));
    Ok(())
}

#[test]
fn test_distance_properties() -> Result<(), FaceCoreError> {
    let a = Matrix::random_normal_seeded(6, 4, 41)?;
    for j in 0..4 {
        assert_eq!(Metric::L2.distance(&a, j, &a, j)?, 0.0);
        assert!((Metric::Cosine.distance(&a, j, &a, j)? + 1.0).abs() < 1e-12);
        for k in 0..4 {
            let l2 = Metric::L2.distance(&a, j, &a, k)?;
            assert!((Metric::L1.distance(&a, j, &a, k)? - l2.sqrt()).abs() < 1e-12);
        }
    }
    Ok(())
}

#[test]
fn test_vector_product_scenario() -> Result<(), FaceCoreError> {
    let a = Matrix::from_rows(&[[1.0, 1.0, 0.0, 0.0]])?;
    let b = Matrix::from_rows(&[[1.0], [2.0], [3.0], [4.0]])?;
    assert_eq!(linalg::product(&a, &b)?, Matrix::from_rows(&[[3.0]])?);
    Ok(())
}
