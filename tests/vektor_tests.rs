use mosaic_compute::api::{MatrixRequest, PcaRequest, TransformRequest};
use mosaic_compute::{ComputeService, Endpoint, Eigenvalue, ServiceConfig};

use approx::assert_abs_diff_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Value};

fn service() -> ComputeService {
    ComputeService::new(ServiceConfig::default())
}

fn call(endpoint: Endpoint, body: Value) -> (u16, Value) {
    service().dispatch_json(endpoint, body.to_string().as_bytes())
}

fn as_f64(v: &Value) -> f64 {
    v.as_f64().unwrap()
}

#[test]
fn identity_matrix_end_to_end() {
    let identity = json!([[1.0, 0.0], [0.0, 1.0]]);

    let (status, body) = call(Endpoint::Determinant, json!({ "matrix": identity }));
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "determinant": 1.0 }));

    let (status, body) = call(Endpoint::Eigen, json!({ "matrix": identity }));
    assert_eq!(status, 200);
    for value in body["eigenvalues"].as_array().unwrap() {
        assert_abs_diff_eq!(as_f64(value), 1.0, epsilon = 1e-12);
    }
    let vectors = body["eigenvectors"].as_array().unwrap();
    let dot: f64 = (0..2).map(|k| as_f64(&vectors[0][k]) * as_f64(&vectors[1][k])).sum();
    assert_abs_diff_eq!(dot, 0.0, epsilon = 1e-12);

    let (status, body) = call(
        Endpoint::Transform,
        json!({ "matrix": identity, "points": [[2.0, 1.0]] }),
    );
    assert_eq!(status, 200);
    assert_eq!(body["transformed"], json!([[2.0, 1.0]]));
    assert_eq!(body["original"], json!([[2.0, 1.0]]));
    assert_eq!(body["matrix"], identity);
}

#[test]
fn quarter_turn_end_to_end() {
    let rotation = json!([[0.0, -1.0], [1.0, 0.0]]);

    let (_, body) = call(Endpoint::Determinant, json!({ "matrix": rotation }));
    assert_abs_diff_eq!(as_f64(&body["determinant"]), 1.0, epsilon = 1e-12);

    let (status, body) = call(Endpoint::Eigen, json!({ "matrix": rotation }));
    assert_eq!(status, 200);
    let values = body["eigenvalues"].as_array().unwrap();
    assert_eq!(values.len(), 2);
    let mut imag: Vec<f64> = values
        .iter()
        .map(|v| {
            let pair = v.as_array().expect("complex eigenvalue is [re, im]");
            assert_abs_diff_eq!(as_f64(&pair[0]), 0.0, epsilon = 1e-12);
            as_f64(&pair[1])
        })
        .collect();
    imag.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_abs_diff_eq!(imag[0], -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(imag[1], 1.0, epsilon = 1e-12);

    let (_, body) = call(Endpoint::Transform, json!({ "matrix": rotation, "points": [[1.0, 0.0]] }));
    assert_abs_diff_eq!(as_f64(&body["transformed"][0][0]), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(as_f64(&body["transformed"][0][1]), 1.0, epsilon = 1e-12);
}

#[test]
fn transform_applies_matrix_to_every_point() {
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let matrix: Vec<Vec<f64>> = (0..3).map(|_| (0..3).map(|_| rng.gen_range(-2.0..2.0)).collect()).collect();
    let points: Vec<Vec<f64>> = (0..25).map(|_| (0..3).map(|_| rng.gen_range(-10.0..10.0)).collect()).collect();

    let response = service()
        .transform(&TransformRequest {
            matrix: matrix.clone(),
            points: Some(points.clone()),
            ..Default::default()
        })
        .unwrap();
    for (p, t) in points.iter().zip(&response.transformed) {
        for i in 0..3 {
            let expected: f64 = (0..3).map(|j| matrix[i][j] * p[j]).sum();
            assert_abs_diff_eq!(t[i], expected, epsilon = 1e-10);
        }
    }
}

#[test]
fn transform_grid_defaults_and_errors() {
    let identity = json!([[1.0, 0.0], [0.0, 1.0]]);

    let (status, body) = call(Endpoint::Transform, json!({ "matrix": identity, "grid_size": 4 }));
    assert_eq!(status, 200);
    assert_eq!(body["original"].as_array().unwrap().len(), 32);
    assert_eq!(body["original"][0], json!([-5.0, -5.0]));

    let (status, body) = call(Endpoint::Transform, json!({ "matrix": identity, "grid_range": 1.0 }));
    assert_eq!(status, 200);
    assert_eq!(body["original"].as_array().unwrap().len(), 200);

    let (status, body) = call(Endpoint::Transform, json!({ "matrix": identity }));
    assert_eq!(status, 422);
    assert!(body["detail"].as_str().unwrap().contains("grid_size"));

    let (status, _) = call(Endpoint::Transform, json!({ "matrix": identity, "grid_size": -2 }));
    assert_eq!(status, 422);

    let (status, _) = call(Endpoint::Transform, json!({ "matrix": identity, "grid_size": 100000 }));
    assert_eq!(status, 422);
}

#[test]
fn malformed_matrix_bodies_are_422() {
    for body in [
        json!({}),
        json!({ "matrix": "not a matrix" }),
        json!({ "matrix": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]] }),
        json!({ "matrix": [[1.0, 2.0], [3.0]] }),
        json!({ "matrix": [] }),
    ] {
        for endpoint in [Endpoint::Determinant, Endpoint::Eigen] {
            let (status, response) = call(endpoint, body.clone());
            assert_eq!(status, 422, "{:?} accepted {}", endpoint, body);
            assert!(response["detail"].is_string());
        }
    }

    let (status, body) = call(
        Endpoint::Transform,
        json!({ "matrix": [[1.0, 0.0], [0.0, 1.0]], "points": [[1.0, 2.0, 3.0]] }),
    );
    assert_eq!(status, 422);
    assert!(body["detail"].as_str().unwrap().contains("dimensionality"));
}

#[test]
fn oversized_matrix_is_rejected() {
    let config = ServiceConfig {
        max_matrix_order: 3,
        ..ServiceConfig::default()
    };
    let service = ComputeService::new(config);
    let err = service
        .determinant(&MatrixRequest {
            matrix: vec![vec![0.0; 4]; 4],
        })
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
}

#[test]
fn determinant_is_multiplicative() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let service = service();
    for order in [2usize, 3, 4] {
        let a: Vec<Vec<f64>> = (0..order).map(|_| (0..order).map(|_| rng.gen_range(-3.0..3.0)).collect()).collect();
        let b: Vec<Vec<f64>> = (0..order).map(|_| (0..order).map(|_| rng.gen_range(-3.0..3.0)).collect()).collect();
        let ab: Vec<Vec<f64>> = (0..order)
            .map(|i| (0..order).map(|j| (0..order).map(|k| a[i][k] * b[k][j]).sum()).collect())
            .collect();
        let det = |m: Vec<Vec<f64>>| service.determinant(&MatrixRequest { matrix: m }).unwrap().determinant;
        let (da, db, dab) = (det(a), det(b), det(ab));
        assert_abs_diff_eq!(dab, da * db, epsilon = 1e-8 * (1.0 + dab.abs()));
    }
}

#[test]
fn eigen_is_deterministic_and_typed() {
    let service = service();
    let request = MatrixRequest {
        matrix: vec![vec![2.0, 0.0], vec![0.0, 2.0]],
    };
    let first = service.eigen(&request).unwrap();
    let second = service.eigen(&request).unwrap();
    assert_eq!(first, second);
    for value in &first.eigenvalues {
        assert!(matches!(value, Eigenvalue::Real(_)));
        assert_abs_diff_eq!(value.re(), 2.0, epsilon = 1e-12);
    }
}

#[test]
fn pca_response_carries_all_fields() {
    let (status, body) = call(
        Endpoint::Pca,
        json!({ "data": [[1.0, 2.0], [2.0, 3.5], [3.0, 6.1], [4.0, 8.0], [5.0, 9.9]] }),
    );
    assert_eq!(status, 200);
    for key in ["principal_components", "explained_variance", "projected_data", "mean", "original_data"] {
        assert!(body.get(key).is_some(), "missing {}", key);
    }
    let ratios: Vec<f64> = body["explained_variance"].as_array().unwrap().iter().map(as_f64).collect();
    assert_abs_diff_eq!(ratios.iter().sum::<f64>(), 1.0, epsilon = 1e-10);
    assert!(ratios[0] >= ratios[1]);
    assert_eq!(body["projected_data"].as_array().unwrap().len(), 5);
}

#[test]
fn pca_rejects_bad_point_sets() {
    let service = service();
    for data in [vec![vec![1.0, 2.0]], vec![vec![1.0, 2.0], vec![3.0]], vec![]] {
        let err = service.pca(&PcaRequest { data }).unwrap_err();
        assert_eq!(err.status_code(), 422);
    }
}

#[test]
fn concurrent_requests_agree() {
    use rayon::prelude::*;

    let service = service();
    let body = json!({ "matrix": [[3.0, 1.0], [1.0, 2.0]] }).to_string();
    let expected = service.dispatch_json(Endpoint::Eigen, body.as_bytes());
    let results: Vec<(u16, Value)> = (0..64)
        .into_par_iter()
        .map(|_| service.dispatch_json(Endpoint::Eigen, body.as_bytes()))
        .collect();
    assert!(results.iter().all(|r| *r == expected));
}

#[test]
fn service_metadata_messages() {
    let (status, body) = call(Endpoint::Hello, Value::Null);
    assert_eq!(status, 200);
    assert!(body["message"].as_str().unwrap().contains("ready"));
    let (status, body) = call(Endpoint::Root, Value::Null);
    assert_eq!(status, 200);
    assert!(body["message"].is_string());
}
