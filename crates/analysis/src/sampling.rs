//! Drawing training samples from an embedding cube.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use satembed_core::{EmbeddingCube, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How sample pixels are chosen among the valid pixels of a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleStrategy {
    /// Distinct pixels drawn uniformly with a seeded RNG
    #[default]
    Random,
    /// Evenly strided over the valid pixels in row-major order
    Grid,
}

/// Sampled pixel locations with their embedding vectors.
#[derive(Debug, Clone)]
pub struct SampleTable {
    /// (row, col) of each sample
    pub locations: Vec<(usize, usize)>,
    /// One row per sample, one column per band
    pub vectors: Array2<f32>,
}

impl SampleTable {
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.vectors.ncols()
    }
}

/// Sample up to `n` valid pixels of `cube`.
///
/// The table holds `min(n, valid pixels)` rows, in row-major pixel order.
/// For [`SampleStrategy::Random`] the same seed always yields the same table.
pub fn sample_pixels(cube: &EmbeddingCube, n: usize, strategy: SampleStrategy, seed: u64) -> Result<SampleTable> {
    if n == 0 {
        return Err(Error::InvalidParameter {
            name: "n_samples",
            value: n.to_string(),
            reason: "must be at least 1".into(),
        });
    }

    let (rows, cols) = cube.shape();
    let valid: Vec<(usize, usize)> = (0..rows)
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .filter(|&(r, c)| cube.is_valid(r, c))
        .collect();
    if valid.is_empty() {
        return Err(Error::Algorithm("no valid pixels to sample".into()));
    }

    let m = n.min(valid.len());
    let mut picks: Vec<usize> = match strategy {
        SampleStrategy::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            rand::seq::index::sample(&mut rng, valid.len(), m).into_vec()
        }
        SampleStrategy::Grid => {
            let stride = valid.len() as f64 / m as f64;
            (0..m)
                .map(|i| ((i as f64 + 0.5) * stride).floor() as usize)
                .map(|i| i.min(valid.len() - 1))
                .collect()
        }
    };
    picks.sort_unstable();

    let bands = cube.band_count();
    let mut vectors = Array2::<f32>::zeros((m, bands));
    let mut locations = Vec::with_capacity(m);
    for (i, &p) in picks.iter().enumerate() {
        let (r, c) = valid[p];
        vectors.row_mut(i).assign(&cube.pixel(r, c)?);
        locations.push((r, c));
    }

    debug!(requested = n, drawn = m, valid = valid.len(), ?strategy, "sampled pixels");
    Ok(SampleTable { locations, vectors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn cube_with_holes() -> EmbeddingCube {
        let mut data = Array3::<f32>::zeros((6, 6, 2));
        for ((r, c, b), v) in data.indexed_iter_mut() {
            *v = (r * 6 + c) as f32 + b as f32 * 0.5;
        }
        let mut cube = EmbeddingCube::new(data, vec!["A00".into(), "A01".into()]).unwrap();
        for c in 0..6 {
            cube.mask(0, c);
        }
        cube
    }

    #[test]
    fn random_samples_are_valid_distinct_and_seeded() {
        let cube = cube_with_holes();
        let a = sample_pixels(&cube, 10, SampleStrategy::Random, 7).unwrap();
        let b = sample_pixels(&cube, 10, SampleStrategy::Random, 7).unwrap();
        assert_eq!(a.len(), 10);
        assert_eq!(a.locations, b.locations);
        assert!(a.locations.iter().all(|&(r, _)| r > 0));

        let mut unique = a.locations.clone();
        unique.dedup();
        assert_eq!(unique.len(), 10);

        for (i, &(r, c)) in a.locations.iter().enumerate() {
            assert_eq!(a.vectors[[i, 0]], (r * 6 + c) as f32);
        }
    }

    #[test]
    fn sample_size_is_capped_by_valid_pixels() {
        let cube = cube_with_holes();
        let t = sample_pixels(&cube, 1000, SampleStrategy::Random, 1).unwrap();
        assert_eq!(t.len(), 30);
        assert_eq!(t.dims(), 2);
    }

    #[test]
    fn grid_strategy_spreads_evenly() {
        let cube = cube_with_holes();
        let t = sample_pixels(&cube, 3, SampleStrategy::Grid, 0).unwrap();
        assert_eq!(t.locations, vec![(1, 5), (3, 3), (5, 1)]);
    }

    #[test]
    fn rejects_empty_requests_and_empty_cubes() {
        let cube = cube_with_holes();
        assert!(matches!(
            sample_pixels(&cube, 0, SampleStrategy::Random, 0),
            Err(Error::InvalidParameter { .. })
        ));
        let empty = EmbeddingCube::masked(2, 2, vec!["A00".into()]).unwrap();
        assert!(matches!(
            sample_pixels(&empty, 5, SampleStrategy::Random, 0),
            Err(Error::Algorithm(_))
        ));
    }
}
