//! Density-based clustering (DBSCAN) over a precomputed distance matrix.
//!
//! Conventions:
//! - `j` is in the neighborhood of `i` iff `distance(i, j) < eps` (strict).
//! - A neighborhood always contains the point itself, and that self-membership counts toward
//!   `min_pts`.
//! - Points are scanned in index order; cluster ids follow discovery order.
//!
//! Given the same matrix and parameters the partition is always identical.

use serde::Serialize;
use tracing::debug;

use crate::distance::DistanceMatrix;
use crate::opts::ClusterOpts;
use crate::{Error, Result};

/// Raw clustering output: member indices per cluster plus the indices left as noise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterAssignment {
    /// One entry per cluster (id = position), members in scan insertion order.
    pub clusters: Vec<Vec<usize>>,
    /// Indices reachable from no core point, in the order they were classified.
    pub noise: Vec<usize>,
}

/// Run DBSCAN over `matrix`.
///
/// Fails only with [`Error::EmptyInput`] for an empty matrix. Degenerate parameters are not
/// errors: `eps <= 0` (or NaN) leaves every point as noise, and `min_pts == 0` makes every point
/// a core point. An all-noise result is valid and returned as such.
pub fn dbscan(matrix: &DistanceMatrix, opts: &ClusterOpts) -> Result<ClusterAssignment> {
    if matrix.is_empty() {
        return Err(Error::EmptyInput("no embeddings provided"));
    }

    let n = matrix.len();
    let mut scan = Scan {
        matrix,
        eps: opts.eps,
        min_pts: opts.min_pts,
        visited: vec![false; n],
        assigned: vec![false; n],
        queued_for: vec![None; n],
    };

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut noise = Vec::new();

    for point in 0..n {
        if scan.visited[point] {
            continue;
        }
        scan.visited[point] = true;

        let neighbors = scan.region(point);
        if neighbors.len() < scan.min_pts {
            noise.push(point);
            continue;
        }

        let cluster_id = clusters.len();
        let members = scan.expand(cluster_id, point, neighbors);
        clusters.push(members);
    }

    // Points first seen as noise may have been picked up later as border points.
    noise.retain(|&i| !scan.assigned[i]);

    debug!(
        points = n,
        clusters = clusters.len(),
        noise = noise.len(),
        "dbscan finished"
    );

    Ok(ClusterAssignment { clusters, noise })
}

/// Per-run scan state. Allocated fresh for every call.
struct Scan<'a> {
    matrix: &'a DistanceMatrix,
    eps: f32,
    min_pts: usize,
    visited: Vec<bool>,
    assigned: Vec<bool>,
    // Cluster whose seed list already holds the point; avoids re-queuing duplicates.
    queued_for: Vec<Option<usize>>,
}

impl Scan<'_> {
    fn region(&self, point: usize) -> Vec<usize> {
        self.matrix
            .row(point)
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d < self.eps)
            .map(|(j, _)| j)
            .collect()
    }

    /// Grow a cluster from core point `core` whose neighborhood is `seeds`.
    fn expand(&mut self, cluster_id: usize, core: usize, mut seeds: Vec<usize>) -> Vec<usize> {
        let mut members = vec![core];
        self.assigned[core] = true;

        for &p in &seeds {
            self.queued_for[p] = Some(cluster_id);
        }

        let mut i = 0;
        while i < seeds.len() {
            let p = seeds[i];
            i += 1;

            if !self.visited[p] {
                self.visited[p] = true;
                let neighbors = self.region(p);
                if neighbors.len() >= self.min_pts {
                    for q in neighbors {
                        if self.queued_for[q] != Some(cluster_id) {
                            self.queued_for[q] = Some(cluster_id);
                            seeds.push(q);
                        }
                    }
                }
            }

            if !self.assigned[p] {
                self.assigned[p] = true;
                members.push(p);
            }
        }

        members
    }
}
