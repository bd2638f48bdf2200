//! DBSCAN over an R-tree.
//!
//! Neighborhood queries go through [`rstar`] so each lookup is
//! logarithmic instead of a scan over every point. A point's neighborhood
//! includes the point itself and every point at Euclidean distance
//! `<= eps`; a point is *core* when its neighborhood holds at least
//! `min_samples` points.

use rstar::RTree;
use rstar::primitives::GeomWithData;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Labels each point with its cluster, or `None` for noise.
///
/// Clusters are numbered in the order their first core point appears in
/// `points`, so identical input yields identical labels. A border point
/// reachable from several clusters joins the earliest one.
#[must_use]
pub fn dbscan(points: &[[f64; 2]], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let tree: RTree<IndexedPoint> = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(*p, i))
            .collect(),
    );
    let eps_2 = eps * eps;

    let neighbors = |p: &[f64; 2]| tree.locate_within_distance(*p, eps_2).map(|e| e.data);

    let is_core: Vec<bool> = points
        .iter()
        .map(|p| neighbors(p).count() >= min_samples)
        .collect();

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut next_label = 0;
    let mut stack = Vec::new();

    for seed in 0..points.len() {
        if labels[seed].is_some() || !is_core[seed] {
            continue;
        }

        labels[seed] = Some(next_label);
        stack.push(seed);

        while let Some(current) = stack.pop() {
            for neighbor in neighbors(&points[current]) {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(next_label);
                    // Border points join the cluster but do not expand it.
                    if is_core[neighbor] {
                        stack.push(neighbor);
                    }
                }
            }
        }

        next_label += 1;
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_blobs_and_an_outlier() {
        let points = [
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [5.0, 5.0],
            [5.1, 5.0],
            [5.0, 5.1],
            [10.0, -10.0],
        ];
        let labels = dbscan(&points, 0.2, 3);
        assert_eq!(
            labels,
            vec![
                Some(0),
                Some(0),
                Some(0),
                Some(1),
                Some(1),
                Some(1),
                None
            ]
        );
    }

    #[test]
    fn border_points_join_but_do_not_chain() {
        // 0-3 are core; 4 has only three neighbors so it is a border point
        // of the first cluster; 5 is reachable only through 4 and stays noise.
        let points = [
            [0.0, 0.0],
            [0.2, 0.0],
            [0.4, 0.0],
            [0.6, 0.0],
            [1.5, 0.0],
            [2.4, 0.0],
        ];
        let labels = dbscan(&points, 1.0, 4);
        assert_eq!(
            labels,
            vec![Some(0), Some(0), Some(0), Some(0), Some(0), None]
        );
    }

    #[test]
    fn eps_is_inclusive() {
        let points = [[0.0, 0.0], [1.0, 0.0]];
        assert_eq!(dbscan(&points, 1.0, 2), vec![Some(0), Some(0)]);
        assert_eq!(dbscan(&points, 0.999, 2), vec![None, None]);
    }

    #[test]
    fn empty_input() {
        assert!(dbscan(&[], 1.0, 3).is_empty());
    }
}
