//! K-means clustering of embedding vectors
//!
//! Seeds centroids with k-means++ from a seeded RNG and refines them with
//! Lloyd iterations. The assignment step runs in parallel.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use satembed_core::raster::Raster;
use satembed_core::{Algorithm, EmbeddingCube, Error, Result};
use tracing::{debug, warn};

use crate::maybe_rayon::*;

/// Parameters for K-means clustering
#[derive(Debug, Clone)]
pub struct KmeansParams {
    /// Number of clusters
    pub k: usize,
    /// Maximum Lloyd iterations (default: 100)
    pub max_iterations: usize,
    /// Stop when no centroid moves further than this (default: 1e-4)
    pub tolerance: f64,
    /// Seed for k-means++ initialization (default: 100)
    pub seed: u64,
}

impl Default for KmeansParams {
    fn default() -> Self {
        Self {
            k: 5,
            max_iterations: 100,
            tolerance: 1e-4,
            seed: 100,
        }
    }
}

impl KmeansParams {
    pub fn with_k(k: usize) -> Self {
        Self { k, ..Default::default() }
    }
}

/// A fitted model.
#[derive(Debug, Clone)]
pub struct KmeansModel {
    /// One row per cluster
    pub centroids: Array2<f64>,
    /// Sum of squared distances of the training vectors to their centroid
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
    /// Training vectors per cluster
    pub sizes: Vec<usize>,
}

/// K-means algorithm over sample rows
#[derive(Debug, Clone, Default)]
pub struct Kmeans;

impl Algorithm for Kmeans {
    type Input = Array2<f32>;
    type Output = KmeansModel;
    type Params = KmeansParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "K-means"
    }

    fn description(&self) -> &'static str {
        "K-means++ seeded Lloyd clustering of embedding vectors"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        Kmeans::fit(&input, &params)
    }
}

impl Kmeans {
    /// Fit `params.k` clusters to the rows of `data`.
    ///
    /// Identical data and seed always produce the identical model.
    pub fn fit(data: &Array2<f32>, params: &KmeansParams) -> Result<KmeansModel> {
        let (n, dims) = data.dim();
        if params.k == 0 || params.k > n {
            return Err(Error::InvalidParameter {
                name: "k",
                value: params.k.to_string(),
                reason: format!("must be between 1 and the number of samples ({n})"),
            });
        }
        if dims == 0 {
            return Err(Error::Algorithm("K-means requires at least one band".into()));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(Error::Algorithm("K-means input contains non-finite values".into()));
        }

        let k = params.k;
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut centroids = kmeans_plus_plus(data, k, &mut rng);

        let mut iterations = 0;
        let mut converged = false;
        let mut assignment = assign(data, &centroids);

        while iterations < params.max_iterations {
            iterations += 1;

            // Update step: recompute centroids in f64
            let mut sums = Array2::<f64>::zeros((k, dims));
            let mut counts = vec![0usize; k];
            for (i, &(label, _)) in assignment.iter().enumerate() {
                let mut row = sums.row_mut(label);
                for (s, &v) in row.iter_mut().zip(data.row(i)) {
                    *s += v as f64;
                }
                counts[label] += 1;
            }

            let mut reseeded = Vec::new();
            for c in 0..k {
                if counts[c] > 0 {
                    let count = counts[c] as f64;
                    sums.row_mut(c).mapv_inplace(|s| s / count);
                } else if let Some(far) = farthest_point(&assignment, &reseeded) {
                    // Empty cluster: move it to the worst-fitted point
                    reseeded.push(far);
                    for (s, &v) in sums.row_mut(c).iter_mut().zip(data.row(far)) {
                        *s = v as f64;
                    }
                    warn!(cluster = c, sample = far, iteration = iterations, "re-seeded empty cluster");
                } else {
                    // Every point sits on a centroid; nothing to move to
                    sums.row_mut(c).assign(&centroids.row(c));
                }
            }

            let shift = (0..k)
                .map(|c| squared_distance_f64(sums.row(c), centroids.row(c)).sqrt())
                .fold(0.0f64, f64::max);
            centroids = sums;
            assignment = assign(data, &centroids);

            debug!(iteration = iterations, shift, "k-means step");
            if shift < params.tolerance && reseeded.is_empty() {
                converged = true;
                break;
            }
        }

        let inertia = assignment.iter().map(|&(_, d)| d).sum();
        let mut sizes = vec![0usize; k];
        for &(label, _) in &assignment {
            sizes[label] += 1;
        }

        debug!(k, iterations, converged, inertia, "k-means fitted");
        Ok(KmeansModel {
            centroids,
            inertia,
            iterations,
            converged,
            sizes,
        })
    }
}

impl KmeansModel {
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    pub fn dims(&self) -> usize {
        self.centroids.ncols()
    }

    /// Nearest centroid of `vector`.
    pub fn predict(&self, vector: ArrayView1<'_, f32>) -> usize {
        nearest(vector, &self.centroids).0
    }

    /// Label every pixel of `cube`: valid pixels get their cluster id in
    /// `[0, k)`, invalid ones the nodata value -1.
    pub fn predict_cube(&self, cube: &EmbeddingCube) -> Result<Raster<i32>> {
        if cube.band_count() != self.dims() {
            return Err(Error::BandCountMismatch {
                left: self.dims(),
                right: cube.band_count(),
            });
        }

        let (rows, cols) = cube.shape();
        let data = cube.data();
        let labels: Vec<i32> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![-1i32; cols];
                for (col, label) in row_data.iter_mut().enumerate() {
                    let px = data.slice(ndarray::s![row, col, ..]);
                    if px.iter().all(|v| v.is_finite()) {
                        *label = nearest(px, &self.centroids).0 as i32;
                    }
                }
                row_data
            })
            .collect();

        let mut raster = Raster::from_vec(labels, rows, cols)?;
        raster.set_transform(*cube.transform());
        raster.set_crs(cube.crs().cloned());
        raster.set_nodata(Some(-1));
        Ok(raster)
    }
}

/// k-means++: first centre uniform, each next one drawn with probability
/// proportional to the squared distance to the nearest chosen centre.
fn kmeans_plus_plus(data: &Array2<f32>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let (n, dims) = data.dim();
    let mut centroids = Array2::<f64>::zeros((k, dims));
    let mut chosen = vec![rng.gen_range(0..n)];
    copy_row(&mut centroids, 0, data, chosen[0]);

    let mut min_dist: Vec<f64> = (0..n)
        .map(|i| squared_distance(data.row(i), centroids.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = min_dist.iter().sum();
        let pick = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut acc = 0.0;
            min_dist
                .iter()
                .position(|&d| {
                    acc += d;
                    acc >= target && d > 0.0
                })
                .unwrap_or(n - 1)
        } else {
            // All remaining points coincide with a centre
            (0..n).find(|i| !chosen.contains(i)).unwrap_or(0)
        };
        chosen.push(pick);
        copy_row(&mut centroids, c, data, pick);

        for (i, d) in min_dist.iter_mut().enumerate() {
            *d = d.min(squared_distance(data.row(i), centroids.row(c)));
        }
    }
    centroids
}

fn copy_row(centroids: &mut Array2<f64>, c: usize, data: &Array2<f32>, i: usize) {
    for (dst, &v) in centroids.row_mut(c).iter_mut().zip(data.row(i)) {
        *dst = v as f64;
    }
}

/// (nearest centroid, squared distance) for every row.
fn assign(data: &Array2<f32>, centroids: &Array2<f64>) -> Vec<(usize, f64)> {
    (0..data.nrows())
        .into_par_iter()
        .map(|i| nearest(data.row(i), centroids))
        .collect()
}

/// Sample with the largest distance to its centroid, if any is off-centre.
fn farthest_point(assignment: &[(usize, f64)], exclude: &[usize]) -> Option<usize> {
    assignment
        .iter()
        .enumerate()
        .filter(|(i, (_, d))| *d > 0.0 && !exclude.contains(i))
        .max_by(|a, b| a.1 .1.total_cmp(&b.1 .1))
        .map(|(i, _)| i)
}

fn nearest(vector: ArrayView1<'_, f32>, centroids: &Array2<f64>) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (c, centroid) in centroids.rows().into_iter().enumerate() {
        let d = squared_distance(vector, centroid);
        if d < best.1 {
            best = (c, d);
        }
    }
    best
}

fn squared_distance(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| (x as f64 - y).powi(2)).sum()
}

fn squared_distance_f64(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array3};

    fn blobs() -> Array2<f32> {
        // Three well separated groups of four points in 2-D
        array![
            [0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [0.1, 0.1],
            [5.0, 5.0], [5.1, 5.0], [5.0, 5.1], [5.1, 5.1],
            [0.0, 9.0], [0.1, 9.0], [0.0, 9.1], [0.1, 9.1],
        ]
    }

    #[test]
    fn separates_distinct_groups() {
        let data = blobs();
        let model = Kmeans::fit(&data, &KmeansParams::with_k(3)).unwrap();

        assert!(model.converged);
        assert_eq!(model.sizes.iter().sum::<usize>(), 12);
        assert!(model.sizes.iter().all(|&s| s == 4));
        for g in 0..3 {
            let first = model.predict(data.row(g * 4));
            for i in 1..4 {
                assert_eq!(model.predict(data.row(g * 4 + i)), first);
            }
        }
        // 12 points each 0.05*sqrt(2) from their centroid
        assert_relative_eq!(model.inertia, 12.0 * 0.005, epsilon = 1e-4);
    }

    #[test]
    fn same_seed_same_model() {
        let data = blobs();
        let a = Kmeans::fit(&data, &KmeansParams::with_k(4)).unwrap();
        let b = Kmeans::fit(&data, &KmeansParams::with_k(4)).unwrap();
        assert_eq!(a.centroids, b.centroids);
        assert_eq!(a.sizes, b.sizes);
        assert_eq!(a.iterations, b.iterations);
    }

    #[test]
    fn k_bounds() {
        let data = blobs();
        assert!(matches!(
            Kmeans::fit(&data, &KmeansParams::with_k(0)),
            Err(Error::InvalidParameter { name: "k", .. })
        ));
        assert!(Kmeans::fit(&data, &KmeansParams::with_k(13)).is_err());

        let one = Kmeans::fit(&data, &KmeansParams::with_k(1)).unwrap();
        assert_eq!(one.sizes, vec![12]);
        let all = Kmeans::fit(&data, &KmeansParams::with_k(12)).unwrap();
        assert_eq!(all.sizes.iter().filter(|&&s| s > 0).count(), 12);
    }

    #[test]
    fn identical_points_still_fit() {
        let data = Array2::<f32>::from_elem((6, 3), 0.5);
        let model = Kmeans::fit(&data, &KmeansParams::with_k(3)).unwrap();
        assert!(model.converged);
        assert_eq!(model.sizes.iter().sum::<usize>(), 6);
        assert_relative_eq!(model.inertia, 0.0);
    }

    #[test]
    fn predict_cube_marks_invalid_pixels() {
        let model = Kmeans::fit(&blobs(), &KmeansParams::with_k(3)).unwrap();
        let mut data = Array3::<f32>::zeros((2, 2, 2));
        data[[0, 1, 0]] = 5.0;
        data[[0, 1, 1]] = 5.0;
        let mut cube = EmbeddingCube::new(data, vec!["A00".into(), "A01".into()]).unwrap();
        cube.mask(1, 1);

        let labels = model.predict_cube(&cube).unwrap();
        assert_eq!(labels.nodata(), Some(-1));
        assert_eq!(labels.get(1, 1).unwrap(), -1);
        let a = labels.get(0, 0).unwrap();
        let b = labels.get(0, 1).unwrap();
        assert!((0..3).contains(&a) && (0..3).contains(&b));
        assert_ne!(a, b);
        assert_eq!(labels.get(1, 0).unwrap(), a);
    }

    #[test]
    fn predict_cube_checks_band_count() {
        let model = Kmeans::fit(&blobs(), &KmeansParams::with_k(2)).unwrap();
        let cube = EmbeddingCube::new(Array3::zeros((2, 2, 3)), vec!["a".into(), "b".into(), "c".into()]).unwrap();
        assert!(matches!(model.predict_cube(&cube), Err(Error::BandCountMismatch { .. })));
    }
}
