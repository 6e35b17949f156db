// In-memory session: owns the prepared table and memoizes the derived
// stages (filtered view, customer profiles, segmentation) per input.
//
// Every cache key carries the dataset fingerprint and the full filter
// context; segmentation keys add the requested cluster count. Changing the
// clustering configuration drops everything derived.

use crate::attribution::{revenue_by_cluster_over_time, summarize_clusters, ClusterTimeline};
use crate::customers::aggregate_customers;
use crate::error::Result;
use crate::filter::{FilterContext, FilterOptions};
use crate::loader::{load_dataset, LoadedDataset};
use crate::prep::prepare_with_report;
use crate::segment::{segment, Segmentation, SegmentationConfig};
use crate::types::{ClusterSummaryRow, CustomerProfile, PrepReport, TransactionTable};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything the segmentation page shows for one (filter, k) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationView {
    pub requested_k: usize,
    /// `requested_k` clamped into `1..=distinct customer points`; 0 when
    /// there are no customers.
    pub effective_k: usize,
    pub segmentation: Segmentation,
    pub summary: Vec<ClusterSummaryRow>,
    pub timeline: ClusterTimeline,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FilterKey {
    fingerprint: String,
    filter: FilterContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SegmentKey {
    filter: FilterKey,
    k: usize,
}

/// Entry counts of the three caches, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub filtered: usize,
    pub profiles: usize,
    pub segmentations: usize,
}

pub struct Session {
    source: String,
    fingerprint: String,
    table: Arc<TransactionTable>,
    report: PrepReport,
    config: SegmentationConfig,
    filtered: HashMap<FilterKey, Arc<TransactionTable>>,
    profiles: HashMap<FilterKey, Arc<Vec<CustomerProfile>>>,
    segmentations: HashMap<SegmentKey, Arc<SegmentationView>>,
}

impl Session {
    pub fn new(dataset: LoadedDataset, config: SegmentationConfig) -> Self {
        let (table, report) = prepare_with_report(&dataset.raw);
        Self {
            source: dataset.source,
            fingerprint: dataset.fingerprint,
            table: Arc::new(table),
            report,
            config,
            filtered: HashMap::new(),
            profiles: HashMap::new(),
            segmentations: HashMap::new(),
        }
    }

    /// Load, fingerprint and prepare the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: SegmentationConfig) -> Result<Self> {
        Ok(Self::new(load_dataset(path)?, config))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn table(&self) -> &TransactionTable {
        &self.table
    }

    pub fn prep_report(&self) -> &PrepReport {
        &self.report
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SegmentationConfig) {
        if config != self.config {
            info!(?config, "segmentation config changed, clearing caches");
            self.config = config;
            self.clear_cache();
        }
    }

    pub fn clear_cache(&mut self) {
        self.filtered.clear();
        self.profiles.clear();
        self.segmentations.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            filtered: self.filtered.len(),
            profiles: self.profiles.len(),
            segmentations: self.segmentations.len(),
        }
    }

    /// Choices available for each filter dimension on the full table.
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_table(&self.table)
    }

    fn filter_key(&self, filter: &FilterContext) -> FilterKey {
        FilterKey {
            fingerprint: self.fingerprint.clone(),
            filter: filter.clone(),
        }
    }

    pub fn filtered(&mut self, filter: &FilterContext) -> Arc<TransactionTable> {
        if filter.is_unrestricted() {
            return Arc::clone(&self.table);
        }
        let key = self.filter_key(filter);
        if let Some(hit) = self.filtered.get(&key) {
            debug!(stage = "filter", "cache hit");
            return Arc::clone(hit);
        }
        debug!(stage = "filter", "cache miss");
        let view = Arc::new(filter.apply(&self.table));
        debug!(rows = view.rows.len(), "filter applied");
        self.filtered.insert(key, Arc::clone(&view));
        view
    }

    pub fn customer_profiles(&mut self, filter: &FilterContext) -> Arc<Vec<CustomerProfile>> {
        let key = self.filter_key(filter);
        if let Some(hit) = self.profiles.get(&key) {
            debug!(stage = "customers", "cache hit");
            return Arc::clone(hit);
        }
        debug!(stage = "customers", "cache miss");
        let table = self.filtered(filter);
        let profiles = Arc::new(aggregate_customers(&table));
        self.profiles.insert(key, Arc::clone(&profiles));
        profiles
    }

    /// Segment the customers under `filter` into `k` clusters. `k` is
    /// clamped to the number of distinct (Frequency, Monetary) points, so
    /// any `k` is accepted.
    pub fn segmentation(
        &mut self,
        filter: &FilterContext,
        k: usize,
    ) -> Result<Arc<SegmentationView>> {
        let key = SegmentKey {
            filter: self.filter_key(filter),
            k,
        };
        if let Some(hit) = self.segmentations.get(&key) {
            debug!(stage = "segmentation", k, "cache hit");
            return Ok(Arc::clone(hit));
        }
        debug!(stage = "segmentation", k, "cache miss");

        let table = self.filtered(filter);
        let profiles = self.customer_profiles(filter);
        let distinct = profiles
            .iter()
            .map(|p| (p.frequency, p.monetary.to_bits()))
            .collect::<HashSet<_>>()
            .len();
        let effective_k = if distinct == 0 { 0 } else { k.clamp(1, distinct) };
        if effective_k != k {
            info!(requested = k, effective = effective_k, "cluster count clamped");
        }

        let segmentation = segment(&profiles, effective_k, &self.config)?;
        let summary = summarize_clusters(&segmentation.customers);
        let timeline = revenue_by_cluster_over_time(&segmentation.customers, &table);
        let view = Arc::new(SegmentationView {
            requested_k: k,
            effective_k,
            segmentation,
            summary,
            timeline,
        });
        self.segmentations.insert(key, Arc::clone(&view));
        Ok(view)
    }
}
