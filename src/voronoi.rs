//! Delaunay triangulation by incremental Bowyer–Watson insertion in any dimension, and the Voronoi
//! diagram read off it.
use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use log::debug;
use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use crate::INLINE_DIMS;

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;
type Simplex = SmallVec<[usize; INLINE_DIMS + 1]>;

/// Sites are moved by up to this fraction of their extent so no `N + 2` of them are cospherical.
const JITTER: f64 = 1e-6;
const JITTER_SEED: u64 = 0x5eed;

/// Finite part of a Voronoi diagram.
#[derive(Clone, Debug, Default)]
pub struct VoronoiDiagram {
    /// Circumcentres of the finite Delaunay simplices.
    pub vertices: Vec<Vec<f64>>,
    /// Site indices of the simplex behind each vertex.
    pub simplices: Vec<Simplex>,
    /// Pairs of vertices whose simplices share a facet.
    pub ridges: Vec<(usize, usize)>,
}

struct Cell {
    vertices: Simplex,
    sphere: Option<(Vec<f64>, f64)>,
}

impl Cell {
    fn new(points: &[Vec<f64>], mut vertices: Simplex) -> Cell {
        vertices.sort_unstable();
        let sphere = circumsphere(points, &vertices);
        Cell { vertices, sphere }
    }

    fn contains(&self, p: &[f64]) -> bool {
        match &self.sphere {
            Some((center, radius_sq)) => distance_sq(p, center) < *radius_sq,
            None => false,
        }
    }
}

fn distance_sq(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Centre and squared radius of the sphere through the simplex corners. [None] for flat simplices.
fn circumsphere(points: &[Vec<f64>], simplex: &[usize]) -> Option<(Vec<f64>, f64)> {
    let p0 = &points[simplex[0]];
    let n = p0.len();
    let rel = |i: usize, j: usize| points[simplex[i + 1]][j] - p0[j];
    let a = DMatrix::from_fn(n, n, rel);
    let b = DVector::from_fn(n, |i, _| 0.5 * (0..n).map(|j| rel(i, j).powi(2)).sum::<f64>());
    let offset = a.lu().solve(&b)?;
    if !offset.iter().all(|v| v.is_finite()) {
        return None;
    }
    let center = p0.iter().zip(offset.iter()).map(|(p, o)| p + o).collect();
    Some((center, offset.norm_squared()))
}

/// All facets of `simplex`, each with one corner left out.
fn facets(simplex: &Simplex) -> impl Iterator<Item = Simplex> + '_ {
    (0..simplex.len()).map(move |skip| {
        simplex
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, &v)| v)
            .collect()
    })
}

/// Delaunay simplices of `sites` (all of the same dimension), as sorted site indices.
pub fn delaunay(sites: &[Vec<f64>]) -> Vec<Simplex> {
    let n = match sites.first() {
        Some(s) if !s.is_empty() => s.len(),
        _ => return Vec::new(),
    };
    let lo = sites.iter().flatten().copied().fold(f64::INFINITY, f64::min);
    let hi = sites.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
    let scale = (hi - lo).max(1.0);

    let mut rng = StdRng::seed_from_u64(JITTER_SEED);
    let mut points: Vec<Vec<f64>> = sites
        .iter()
        .map(|s| {
            s.iter()
                .map(|x| x + rng.gen_range(-1.0..1.0) * JITTER * scale)
                .collect()
        })
        .collect();

    // A corner simplex far below and around the sites: x_i >= a with sum (x_i - a) <= k.
    let a = lo - 100.0 * scale;
    let k = 1000.0 * n as f64 * scale;
    let first_outer = points.len();
    points.push(vec![a; n]);
    for axis in 0..n {
        let mut corner = vec![a; n];
        corner[axis] += k;
        points.push(corner);
    }

    let mut cells = vec![Cell::new(&points, (first_outer..points.len()).collect())];
    for p in 0..first_outer {
        let (bad, good): (Vec<Cell>, Vec<Cell>) =
            cells.into_iter().partition(|c| c.contains(&points[p]));
        cells = good;
        let mut boundary: FxIndexMap<Simplex, usize> = FxIndexMap::default();
        for cell in &bad {
            for facet in facets(&cell.vertices) {
                *boundary.entry(facet).or_insert(0) += 1;
            }
        }
        for (mut facet, _) in boundary.into_iter().filter(|(_, count)| *count == 1) {
            facet.push(p);
            cells.push(Cell::new(&points, facet));
        }
    }

    cells
        .into_iter()
        .filter(|c| c.sphere.is_some() && c.vertices.iter().all(|&v| v < first_outer))
        .map(|c| c.vertices)
        .collect()
}

/// The Voronoi diagram of `sites`, without its unbounded ridges.
pub fn voronoi(sites: &[Vec<f64>]) -> VoronoiDiagram {
    let simplices = delaunay(sites);
    let mut diagram = VoronoiDiagram::default();
    for simplex in simplices {
        if let Some((center, _)) = circumsphere(sites, &simplex) {
            diagram.vertices.push(center);
            diagram.simplices.push(simplex);
        }
    }
    let mut shared: FxIndexMap<Simplex, SmallVec<[usize; 2]>> = FxIndexMap::default();
    for (ix, simplex) in diagram.simplices.iter().enumerate() {
        for facet in facets(simplex) {
            shared.entry(facet).or_default().push(ix);
        }
    }
    diagram.ridges = shared
        .values()
        .filter(|owners| owners.len() == 2)
        .map(|owners| (owners[0], owners[1]))
        .collect();
    debug!(
        "Voronoi diagram of {} sites: {} vertices, {} ridges",
        sites.len(),
        diagram.vertices.len(),
        diagram.ridges.len()
    );
    diagram
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        distance_sq(a, b) < 1e-6
    }

    #[test]
    fn square_with_centre() {
        let sites = vec![
            vec![0.0, 0.0],
            vec![2.0, 0.0],
            vec![2.0, 2.0],
            vec![0.0, 2.0],
            vec![1.0, 1.0],
        ];
        let diagram = voronoi(&sites);
        assert_eq!(diagram.vertices.len(), 4);
        for expected in [[1.0, 0.0], [2.0, 1.0], [1.0, 2.0], [0.0, 1.0]] {
            assert!(diagram.vertices.iter().any(|v| close(v, &expected)));
        }
        assert_eq!(diagram.ridges.len(), 4);
        // Every ridge joins two vertices one unit apart diagonally.
        for &(i, j) in &diagram.ridges {
            let d = distance_sq(&diagram.vertices[i], &diagram.vertices[j]);
            assert!((d - 2.0).abs() < 1e-4);
        }
    }

    /// Each circumsphere passes through its own sites and holds no other site.
    fn check_empty_spheres(sites: &[Vec<f64>]) {
        let diagram = voronoi(sites);
        assert!(!diagram.vertices.is_empty());
        for (center, simplex) in diagram.vertices.iter().zip(&diagram.simplices) {
            let r = distance_sq(center, &sites[simplex[0]]).sqrt();
            for &s in simplex.iter() {
                assert!((distance_sq(center, &sites[s]).sqrt() - r).abs() < 1e-3);
            }
            for (ix, site) in sites.iter().enumerate() {
                if !simplex.contains(&ix) {
                    assert!(distance_sq(center, site).sqrt() > r - 1e-3);
                }
            }
        }
    }

    #[test]
    fn random_sites_are_delaunay() {
        let mut rng = StdRng::seed_from_u64(0);
        let planar: Vec<Vec<f64>> = (0..20)
            .map(|_| vec![rng.gen_range(0.0..50.0), rng.gen_range(0.0..50.0)])
            .collect();
        check_empty_spheres(&planar);
        let spatial: Vec<Vec<f64>> = (0..12)
            .map(|_| (0..3).map(|_| rng.gen_range(0.0..20.0)).collect())
            .collect();
        check_empty_spheres(&spatial);
    }

    #[test]
    fn too_few_sites() {
        let diagram = voronoi(&[vec![0.0, 0.0], vec![1.0, 1.0]]);
        assert!(diagram.vertices.is_empty());
        assert!(diagram.ridges.is_empty());
        assert!(voronoi(&[]).vertices.is_empty());
    }
}
