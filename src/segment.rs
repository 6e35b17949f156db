// Customer segmentation: standardize (Frequency, Monetary), cluster with
// k-means, score the partition.

use crate::error::{Error, Result};
use crate::metrics::{squared_euclidean, ClusterQuality};
use crate::types::{CustomerProfile, LabeledCustomer};
use linfa::prelude::{DatasetBase, Fit, Predict};
use linfa_clustering::{KMeans, KMeansError};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_N_INIT: usize = 10;
pub const DEFAULT_MAX_ITER: usize = 300;
pub const DEFAULT_TOLERANCE: f64 = 1e-4;

/// Parameters of a clustering run other than the cluster count.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationConfig {
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            n_init: DEFAULT_N_INIT,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOLERANCE,
        }
    }
}

/// Per-feature standardization to zero mean and unit (population) variance.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Fit on `data`. A constant feature keeps unit scale so it maps to 0.
    pub fn fit(data: ArrayView2<f64>) -> Self {
        let n_features = data.ncols();
        let mean = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(n_features));
        let scale = data.var_axis(Axis(0), 0.0).mapv(|v| {
            let sd = v.sqrt();
            if sd > f64::EPSILON {
                sd
            } else {
                1.0
            }
        });
        Self { mean, scale }
    }

    pub fn transform(&self, data: ArrayView2<f64>) -> Array2<f64> {
        (&data - &self.mean) / &self.scale
    }

    pub fn transform_point(&self, point: ArrayView1<f64>) -> Array1<f64> {
        (&point - &self.mean) / &self.scale
    }
}

/// Fitted k-means partition in standardized feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    pub n_clusters: usize,
    pub labels: Vec<usize>,
    pub centroids: Array2<f64>,
    /// Sum of squared distances to the assigned centroid.
    pub inertia: f64,
}

impl KMeansModel {
    /// Nearest centroid; ties go to the lower index.
    pub fn predict(&self, point: ArrayView1<f64>) -> usize {
        let mut best = (0, f64::INFINITY);
        for (c, centroid) in self.centroids.outer_iter().enumerate() {
            let d = squared_euclidean(point, centroid);
            if d < best.1 {
                best = (c, d);
            }
        }
        best.0
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.n_clusters];
        for &label in &self.labels {
            if label < self.n_clusters {
                sizes[label] += 1;
            }
        }
        sizes
    }
}

fn validate(data: ArrayView2<f64>, n_clusters: usize, config: &SegmentationConfig) -> Result<()> {
    if n_clusters == 0 {
        return Err(Error::invalid_parameter("Number of clusters must be > 0"));
    }
    if config.n_init == 0 {
        return Err(Error::invalid_parameter("n_init must be > 0"));
    }
    if config.max_iter == 0 {
        return Err(Error::invalid_parameter("max_iter must be > 0"));
    }
    if !(config.tol > 0.0) {
        return Err(Error::invalid_parameter("tolerance must be > 0"));
    }
    if data.nrows() == 0 {
        return Err(Error::invalid_parameter("Cannot cluster an empty data set"));
    }
    if n_clusters > data.nrows() {
        return Err(Error::invalid_parameter(format!(
            "Number of clusters ({}) cannot exceed number of data points ({})",
            n_clusters,
            data.nrows()
        )));
    }
    Ok(())
}

/// Fit k-means (k-means++ seeding, `config.n_init` runs, lowest inertia
/// kept) with a generator seeded from `config.seed`.
pub fn fit_kmeans(
    data: ArrayView2<f64>,
    n_clusters: usize,
    config: &SegmentationConfig,
) -> Result<KMeansModel> {
    validate(data, n_clusters, config)?;

    let dataset = DatasetBase::from(data.to_owned());
    let rng = StdRng::seed_from_u64(config.seed);
    let fitted: std::result::Result<KMeans<f64, L2Dist>, KMeansError> =
        KMeans::params_with(n_clusters, rng, L2Dist)
            .n_runs(config.n_init)
            .max_n_iterations(config.max_iter as u64)
            .tolerance(config.tol)
            .fit(&dataset);
    let model = fitted?;

    let labels: Array1<usize> = model.predict(dataset.records());
    let centroids = model.centroids().to_owned();
    let inertia: f64 = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| squared_euclidean(data.row(i), centroids.row(c)))
        .sum();
    debug!(n_clusters, runs = config.n_init, inertia, "k-means fitted");

    Ok(KMeansModel {
        n_clusters,
        labels: labels.to_vec(),
        centroids,
        inertia,
    })
}

/// Fitted state of a segmentation run, reusable for new customers.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationModel {
    pub scaler: StandardScaler,
    pub kmeans: KMeansModel,
}

impl SegmentationModel {
    /// Cluster for a raw (Frequency, Monetary) pair.
    pub fn predict(&self, frequency: f64, monetary: f64) -> usize {
        let raw = Array1::from(vec![frequency, monetary]);
        let scaled = self.scaler.transform_point(raw.view());
        self.kmeans.predict(scaled.view())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    pub customers: Vec<LabeledCustomer>,
    /// Standardized features the clustering and scores were computed on.
    pub features: Array2<f64>,
    /// `None` when there was nothing to cluster.
    pub model: Option<SegmentationModel>,
    pub quality: ClusterQuality,
}

impl Segmentation {
    fn empty() -> Self {
        Self {
            customers: Vec::new(),
            features: Array2::zeros((0, 2)),
            model: None,
            quality: ClusterQuality::not_applicable(),
        }
    }

    /// Number of distinct labels actually produced.
    pub fn realized_clusters(&self) -> usize {
        self.model
            .as_ref()
            .map_or(0, |m| m.kmeans.cluster_sizes().iter().filter(|&&s| s > 0).count())
    }
}

/// Segment customers into `k` clusters on standardized (Frequency,
/// Monetary). No customers means no labels and no scores; that is not an
/// error. `k` must lie in `1..=profiles.len()`.
pub fn segment(
    profiles: &[CustomerProfile],
    k: usize,
    config: &SegmentationConfig,
) -> Result<Segmentation> {
    if profiles.is_empty() {
        return Ok(Segmentation::empty());
    }

    let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
    let raw: Vec<f64> = profiles
        .iter()
        .flat_map(|p| [p.frequency as f64, finite_or_zero(p.monetary)])
        .collect();
    let raw = Array2::from_shape_vec((profiles.len(), 2), raw)
        .map_err(|e| Error::invalid_parameter(e.to_string()))?;

    let scaler = StandardScaler::fit(raw.view());
    let features = scaler.transform(raw.view());
    let kmeans = fit_kmeans(features.view(), k, config)?;
    let quality = ClusterQuality::evaluate(features.view(), &kmeans.labels);

    info!(
        customers = profiles.len(),
        k,
        inertia = kmeans.inertia,
        silhouette = ?quality.silhouette,
        "customers segmented"
    );

    let customers = profiles
        .iter()
        .zip(&kmeans.labels)
        .map(|(p, &cluster)| LabeledCustomer {
            customer: p.customer.clone(),
            frequency: p.frequency,
            monetary: p.monetary,
            cluster,
        })
        .collect();

    Ok(Segmentation {
        customers,
        features,
        model: Some(SegmentationModel { scaler, kmeans }),
        quality,
    })
}
