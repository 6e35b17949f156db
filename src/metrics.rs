// Unsupervised cluster-quality scores over a feature matrix and labels.
//
// Every score needs at least two distinct labels; with fewer the score is
// `None` ("not applicable") rather than a number.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::Serialize;
use std::collections::BTreeMap;

/// Values this close to zero count as zero for Davies-Bouldin's
/// degenerate-case check.
const ZERO_TOLERANCE: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterQuality {
    /// Higher is better, in [-1, 1].
    pub silhouette: Option<f64>,
    /// Lower is better, >= 0.
    pub davies_bouldin: Option<f64>,
    /// Higher is better, >= 0.
    pub calinski_harabasz: Option<f64>,
}

impl ClusterQuality {
    pub fn not_applicable() -> Self {
        Self {
            silhouette: None,
            davies_bouldin: None,
            calinski_harabasz: None,
        }
    }

    pub fn evaluate(data: ArrayView2<f64>, labels: &[usize]) -> Self {
        Self {
            silhouette: silhouette_score(data, labels),
            davies_bouldin: davies_bouldin_score(data, labels),
            calinski_harabasz: calinski_harabasz_score(data, labels),
        }
    }
}

pub fn squared_euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

pub fn euclidean(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    squared_euclidean(a, b).sqrt()
}

/// Member indices per distinct label, in label order.
fn group_indices(labels: &[usize]) -> Vec<Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(i);
    }
    groups.into_values().collect()
}

fn group_centroids(data: ArrayView2<f64>, groups: &[Vec<usize>]) -> Array2<f64> {
    let mut centroids = Array2::zeros((groups.len(), data.ncols()));
    for (g, members) in groups.iter().enumerate() {
        let mean: Array1<f64> = data
            .select(Axis(0), members)
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        centroids.row_mut(g).assign(&mean);
    }
    centroids
}

/// Mean silhouette coefficient. A point alone in its cluster scores 0.
pub fn silhouette_score(data: ArrayView2<f64>, labels: &[usize]) -> Option<f64> {
    let groups = group_indices(labels);
    if groups.len() < 2 {
        return None;
    }

    let n = data.nrows();
    let mut label_group = vec![0usize; n];
    for (g, members) in groups.iter().enumerate() {
        for &i in members {
            label_group[i] = g;
        }
    }

    let mut total = 0.0;
    for i in 0..n {
        let own = label_group[i];
        if groups[own].len() < 2 {
            continue;
        }
        let mut a = 0.0;
        let mut b = f64::INFINITY;
        for (g, members) in groups.iter().enumerate() {
            let sum: f64 = members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| euclidean(data.row(i), data.row(j)))
                .sum();
            if g == own {
                a = sum / (members.len() - 1) as f64;
            } else {
                b = b.min(sum / members.len() as f64);
            }
        }
        let denom = a.max(b);
        if denom > 0.0 {
            total += (b - a) / denom;
        }
    }
    Some(total / n as f64)
}

/// Davies-Bouldin index: mean over clusters of the worst
/// (spread_i + spread_j) / centroid_distance_ij ratio.
pub fn davies_bouldin_score(data: ArrayView2<f64>, labels: &[usize]) -> Option<f64> {
    let groups = group_indices(labels);
    if groups.len() < 2 {
        return None;
    }
    let centroids = group_centroids(data, &groups);

    let spreads: Vec<f64> = groups
        .iter()
        .enumerate()
        .map(|(g, members)| {
            let sum: f64 = members
                .iter()
                .map(|&i| euclidean(data.row(i), centroids.row(g)))
                .sum();
            sum / members.len() as f64
        })
        .collect();

    let k = groups.len();
    let mut separations = Array2::<f64>::zeros((k, k));
    for i in 0..k {
        for j in 0..k {
            separations[[i, j]] = euclidean(centroids.row(i), centroids.row(j));
        }
    }

    if spreads.iter().all(|s| s.abs() <= ZERO_TOLERANCE)
        || separations.iter().all(|d| d.abs() <= ZERO_TOLERANCE)
    {
        return Some(0.0);
    }

    let mut total = 0.0;
    for i in 0..k {
        let worst = (0..k)
            .filter(|&j| j != i)
            .map(|j| {
                let d = separations[[i, j]];
                if d == 0.0 {
                    0.0
                } else {
                    (spreads[i] + spreads[j]) / d
                }
            })
            .fold(0.0, f64::max);
        total += worst;
    }
    Some(total / k as f64)
}

/// Calinski-Harabasz variance ratio:
/// (between dispersion / (k - 1)) / (within dispersion / (n - k)).
pub fn calinski_harabasz_score(data: ArrayView2<f64>, labels: &[usize]) -> Option<f64> {
    let groups = group_indices(labels);
    if groups.len() < 2 {
        return None;
    }
    let n = data.nrows();
    let k = groups.len();
    let centroids = group_centroids(data, &groups);
    let overall = data.mean_axis(Axis(0))?;

    let mut between = 0.0;
    let mut within = 0.0;
    for (g, members) in groups.iter().enumerate() {
        between += members.len() as f64 * squared_euclidean(centroids.row(g), overall.view());
        within += members
            .iter()
            .map(|&i| squared_euclidean(data.row(i), centroids.row(g)))
            .sum::<f64>();
    }

    if within == 0.0 {
        return Some(1.0);
    }
    Some(between * (n - k) as f64 / (within * (k - 1) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_blobs() -> (Array2<f64>, Vec<usize>) {
        let data = array![
            [0.0, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [10.0, 10.0],
            [10.0, 11.0],
            [11.0, 10.0],
        ];
        (data, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn single_label_is_not_applicable() {
        let (data, _) = two_blobs();
        let quality = ClusterQuality::evaluate(data.view(), &[0; 6]);
        assert_eq!(quality, ClusterQuality::not_applicable());
    }

    #[test]
    fn separated_blobs_score_well() {
        let (data, labels) = two_blobs();
        let quality = ClusterQuality::evaluate(data.view(), &labels);
        let sil = quality.silhouette.unwrap();
        assert!(sil > 0.9 && sil <= 1.0, "silhouette {sil}");
        assert!(quality.davies_bouldin.unwrap() < 0.2);
        assert!(quality.calinski_harabasz.unwrap() > 100.0);
    }

    #[test]
    fn bad_partition_scores_worse() {
        let (data, good) = two_blobs();
        let bad = vec![0, 1, 0, 1, 0, 1];
        let good_q = ClusterQuality::evaluate(data.view(), &good);
        let bad_q = ClusterQuality::evaluate(data.view(), &bad);
        assert!(bad_q.silhouette.unwrap() < good_q.silhouette.unwrap());
        assert!(bad_q.davies_bouldin.unwrap() > good_q.davies_bouldin.unwrap());
        assert!(bad_q.calinski_harabasz.unwrap() < good_q.calinski_harabasz.unwrap());
    }

    #[test]
    fn singleton_clusters_are_finite() {
        let data = array![[1.0, 1.0], [-1.0, -1.0]];
        let quality = ClusterQuality::evaluate(data.view(), &[1, 0]);
        assert_eq!(quality.silhouette, Some(0.0));
        assert_eq!(quality.davies_bouldin, Some(0.0));
        assert_eq!(quality.calinski_harabasz, Some(1.0));
    }

    #[test]
    fn calinski_harabasz_matches_hand_computation() {
        // Centroids (0.5, 0) and (4.5, 0), overall mean (2.5, 0).
        let data = array![[0.0, 0.0], [1.0, 0.0], [4.0, 0.0], [5.0, 0.0]];
        let score = calinski_harabasz_score(data.view(), &[0, 0, 1, 1]).unwrap();
        // between = 2*4 + 2*4 = 16, within = 4 * 0.25 = 1, (16 * 2) / (1 * 1)
        assert!((score - 32.0).abs() < 1e-9);
    }

    #[test]
    fn davies_bouldin_matches_hand_computation() {
        let data = array![[0.0, 0.0], [1.0, 0.0], [4.0, 0.0], [5.0, 0.0]];
        let score = davies_bouldin_score(data.view(), &[0, 0, 1, 1]).unwrap();
        // spreads 0.5 each, centroid distance 4 -> 1/4 for both clusters
        assert!((score - 0.25).abs() < 1e-9);
    }
}
