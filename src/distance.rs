//! Pairwise cosine distances over a batch of embedding vectors.

use tracing::debug;

use crate::{Error, Result};

/// A square, symmetric, zero-diagonal matrix of cosine distances.
///
/// Stored row-major in a single flat buffer (`len * len` entries).
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    len: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    /// Number of rows (and columns).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Distance between item `i` and item `j`.
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> f32 {
        assert!(i < self.len && j < self.len, "index out of bounds");
        self.data[i * self.len + j]
    }

    /// The distances from item `i` to every item, in index order.
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.len..(i + 1) * self.len]
    }

    /// Build a matrix by evaluating `distance(i, j)` once for every pair `i < j`.
    ///
    /// The lower triangle mirrors the upper one and the diagonal is zero, so the result is
    /// symmetric regardless of what `distance` would return for `(j, i)`.
    pub fn from_fn(len: usize, mut distance: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = vec![0.0; len * len];
        for i in 0..len {
            for j in (i + 1)..len {
                let d = distance(i, j);
                data[i * len + j] = d;
                data[j * len + i] = d;
            }
        }
        Self { len, data }
    }
}

/// Cosine distance (`1 - cosine similarity`) between two vectors of equal length.
///
/// A zero-magnitude vector is maximally distant (1.0) from everything. The result is clamped to
/// `[0, 2]` to absorb floating point error.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    distance_from_parts(dot(a, b), norm(a), norm(b))
}

/// Build the full pairwise distance matrix for `vectors`.
///
/// Each unordered pair is computed once and mirrored; vector norms are computed once per
/// vector. Fails with [`Error::DimensionMismatch`] if the vectors differ in length.
pub fn build_distance_matrix<V: AsRef<[f32]>>(vectors: &[V]) -> Result<DistanceMatrix> {
    if let Some(first) = vectors.first() {
        let expected = first.as_ref().len();
        if let Some((index, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.as_ref().len() != expected)
        {
            return Err(Error::DimensionMismatch {
                index,
                expected,
                actual: v.as_ref().len(),
            });
        }
    }

    let norms: Vec<f32> = vectors.iter().map(|v| norm(v.as_ref())).collect();
    let matrix = DistanceMatrix::from_fn(vectors.len(), |i, j| {
        let d = dot(vectors[i].as_ref(), vectors[j].as_ref());
        distance_from_parts(d, norms[i], norms[j])
    });

    let n = matrix.len();
    let dims = vectors.first().map_or(0, |v| v.as_ref().len());
    debug!(n, dims, "built distance matrix");
    Ok(matrix)
}

fn distance_from_parts(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let similarity = dot / (norm_a * norm_b);
    (1.0 - similarity).clamp(0.0, 2.0)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}
