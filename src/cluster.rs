use fxhash::FxHashMap;
use petgraph::unionfind::UnionFind;
use smallvec::SmallVec;

use crate::grid::{neighbor_offsets, Connectivity, OccupancyGrid};
use crate::INLINE_DIMS;

/// A connected group of obstacle cells.
#[derive(Clone, Debug, PartialEq)]
pub struct ObstacleCluster {
    /// Number of cells in the cluster.
    pub size: usize,
    /// Mean of the member cell coordinates.
    pub centroid: SmallVec<[f64; INLINE_DIMS]>,
    /// Largest Euclidean distance from the centroid to a member cell.
    pub radius: f64,
}

/// Labels the obstacle cells into clusters that touch along a shared face (axis-adjacent).
/// Clusters are returned in the storage order of their first cell.
pub fn obstacle_clusters(grid: &OccupancyGrid) -> Vec<ObstacleCluster> {
    let n = grid.len();
    let mut components = UnionFind::new(n);
    // Only the positive half of the axis offsets is needed, every pair is seen once.
    let forward: Vec<_> = neighbor_offsets(grid.ndim(), Connectivity::Axis)
        .into_iter()
        .filter(|o| o.iter().sum::<i32>() > 0)
        .collect();
    for ix in 0..n {
        if !grid.cells()[ix] {
            continue;
        }
        let cell = grid.unflatten(ix);
        for o in &forward {
            let next = cell.offset(o);
            if let Some(nix) = grid.flat_index(&next) {
                if grid.cells()[nix] {
                    components.union(ix, nix);
                }
            }
        }
    }

    let mut label_of: FxHashMap<usize, usize> = FxHashMap::default();
    let mut members: Vec<Vec<usize>> = Vec::new();
    for ix in (0..n).filter(|&ix| grid.cells()[ix]) {
        let root = components.find(ix);
        let label = *label_of.entry(root).or_insert_with(|| {
            members.push(Vec::new());
            members.len() - 1
        });
        members[label].push(ix);
    }

    members
        .into_iter()
        .map(|cells| {
            let ndim = grid.ndim();
            let mut centroid: SmallVec<[f64; INLINE_DIMS]> = SmallVec::from_elem(0.0, ndim);
            for &ix in &cells {
                for (acc, c) in centroid.iter_mut().zip(grid.unflatten(ix).iter()) {
                    *acc += *c as f64;
                }
            }
            let size = cells.len();
            centroid.iter_mut().for_each(|c| *c /= size as f64);
            let radius = cells
                .iter()
                .map(|&ix| {
                    grid.unflatten(ix)
                        .iter()
                        .zip(&centroid)
                        .map(|(&c, m)| (c as f64 - m).powi(2))
                        .sum::<f64>()
                        .sqrt()
                })
                .fold(0.0, f64::max);
            ObstacleCluster {
                size,
                centroid,
                radius,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Diagonal contact does not join clusters.
    #[test]
    fn face_connected_labels() {
        let grid = OccupancyGrid::from_rows(&[
            [1u8, 1, 0, 0],
            [0, 0, 1, 0],
            [0, 0, 1, 0],
            [0, 0, 0, 0],
        ])
        .unwrap();
        let clusters = obstacle_clusters(&grid);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].size, 2);
        assert_eq!(clusters[0].centroid.as_slice(), &[0.0, 0.5]);
        assert!((clusters[0].radius - 0.5).abs() < 1e-12);
        assert_eq!(clusters[1].centroid.as_slice(), &[1.5, 2.0]);
    }

    #[test]
    fn no_obstacles() {
        let grid = OccupancyGrid::new(&[3, 3, 3], false);
        assert!(obstacle_clusters(&grid).is_empty());
    }

    #[test]
    fn clusters_in_3d() {
        let mut grid = OccupancyGrid::new(&[3, 3, 3], false);
        grid.set(&[0, 0, 0], true);
        grid.set(&[0, 0, 1], true);
        grid.set(&[2, 2, 2], true);
        let clusters = obstacle_clusters(&grid);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[1].size, 1);
        assert_eq!(clusters[1].radius, 0.0);
    }
}
