// Command-line interface definitions and argument parsing

use crate::filter::FilterContext;
use crate::loader::DEFAULT_CANDIDATES;
use crate::segment::{
    SegmentationConfig, DEFAULT_MAX_ITER, DEFAULT_N_INIT, DEFAULT_SEED, DEFAULT_TOLERANCE,
};
use clap::Parser;
use std::path::PathBuf;

/// Pharmacy sales reports and customer segmentation (Frequency/Monetary k-means)
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the sales CSV; the default locations are probed when omitted
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Number of customer segments
    #[arg(short = 'k', long, default_value_t = 3)]
    pub clusters: usize,

    /// Base random seed; restart r uses seed + r
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Number of k-means restarts
    #[arg(long, default_value_t = DEFAULT_N_INIT)]
    pub n_init: usize,

    /// Maximum Lloyd iterations per restart
    #[arg(long, default_value_t = DEFAULT_MAX_ITER)]
    pub max_iter: usize,

    /// Convergence tolerance on centroid shift (must be > 0)
    #[arg(long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Directory exports are written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Restrict to these years (repeatable)
    #[arg(long = "year")]
    pub years: Vec<i32>,

    /// Restrict to these month values (repeatable)
    #[arg(long = "month")]
    pub months: Vec<String>,

    /// Restrict to these cities (repeatable)
    #[arg(long = "city")]
    pub cities: Vec<String>,

    /// Render every page once, export, and exit
    #[arg(long)]
    pub batch: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn segmentation_config(&self) -> SegmentationConfig {
        SegmentationConfig {
            seed: self.seed,
            n_init: self.n_init,
            max_iter: self.max_iter,
            tol: self.tolerance,
        }
    }

    pub fn filter_context(&self) -> FilterContext {
        FilterContext::all()
            .with_years(self.years.iter().copied())
            .with_months(self.months.iter().cloned())
            .with_cities(self.cities.iter().cloned())
    }

    /// The explicit input if given, otherwise the default locations.
    pub fn input_candidates(&self) -> Vec<PathBuf> {
        match &self.input {
            Some(path) => vec![path.clone()],
            None => DEFAULT_CANDIDATES.iter().map(PathBuf::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["pharma-report"]).unwrap();
        assert_eq!(args.clusters, 3);
        assert_eq!(args.segmentation_config(), SegmentationConfig::default());
        assert!(args.filter_context().is_unrestricted());
        assert_eq!(args.input_candidates().len(), DEFAULT_CANDIDATES.len());
        assert!(!args.batch);
    }

    #[test]
    fn filters_and_overrides() {
        let args = Args::try_parse_from([
            "pharma-report",
            "--input",
            "sales.csv",
            "-k",
            "5",
            "--seed",
            "7",
            "--year",
            "2018",
            "--year",
            "2019",
            "--city",
            "Lublin",
            "--batch",
        ])
        .unwrap();
        assert_eq!(args.clusters, 5);
        assert_eq!(args.segmentation_config().seed, 7);
        assert_eq!(args.input_candidates(), vec![PathBuf::from("sales.csv")]);

        let filter = args.filter_context();
        assert_eq!(filter.years.len(), 2);
        assert!(filter.cities.contains("Lublin"));
        assert!(filter.months.is_empty());
        assert!(args.batch);
    }

    #[test]
    fn rejects_non_numeric_cluster_count() {
        assert!(Args::try_parse_from(["pharma-report", "-k", "many"]).is_err());
    }
}
