use crate::error::Result;
use crate::metrics::ClusterQuality;
use crate::session::SegmentationView;
use crate::types::{ClusterSummaryRow, Column, TransactionTable};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

pub const CLUSTERED_CUSTOMERS_FILE: &str = "clustered_customers.csv";
pub const CLUSTER_SUMMARY_FILE: &str = "cluster_summary.csv";
pub const CLUSTER_TIMELINE_FILE: &str = "cluster_revenue_by_month.csv";
pub const SEGMENTATION_SUMMARY_FILE: &str = "segmentation_summary.json";
pub const CLEANED_TRANSACTIONS_FILE: &str = "cleaned_transactions.csv";

pub fn write_csv<T: Serialize, P: AsRef<Path>>(path: P, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    fs::write(path, s)?;
    Ok(())
}

/// JSON shape of `segmentation_summary.json`. Scores that do not apply are
/// written as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentationSummary<'a> {
    pub requested_k: usize,
    pub effective_k: usize,
    pub customers: usize,
    pub inertia: Option<f64>,
    pub scores: ClusterQuality,
    pub clusters: &'a [ClusterSummaryRow],
}

impl<'a> SegmentationSummary<'a> {
    pub fn from_view(view: &'a SegmentationView) -> Self {
        let fit = view.segmentation.model.as_ref().map(|m| &m.kmeans);
        Self {
            requested_k: view.requested_k,
            effective_k: view.effective_k,
            customers: view.segmentation.customers.len(),
            inertia: fit.map(|f| f.inertia),
            scores: view.segmentation.quality,
            clusters: &view.summary,
        }
    }
}

/// Write the labeled customers, cluster summary, cluster-by-month revenue
/// and the JSON summary into `dir`. Returns the paths written.
pub fn export_segmentation(dir: &Path, view: &SegmentationView) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let customers = dir.join(CLUSTERED_CUSTOMERS_FILE);
    let summary = dir.join(CLUSTER_SUMMARY_FILE);
    let timeline = dir.join(CLUSTER_TIMELINE_FILE);
    let json = dir.join(SEGMENTATION_SUMMARY_FILE);

    write_csv(&customers, &view.segmentation.customers)?;
    write_csv(&summary, &view.summary)?;
    write_csv(&timeline, &view.timeline.rows)?;
    write_json(&json, &SegmentationSummary::from_view(view))?;

    info!(
        dir = %dir.display(),
        customers = view.segmentation.customers.len(),
        "segmentation exported"
    );
    Ok(vec![customers, summary, timeline, json])
}

/// Write the cleaned table: canonical and pass-through columns as loaded,
/// then the derived `sales_value` and `invoice_date`.
pub fn export_cleaned_transactions(dir: &Path, table: &TransactionTable) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(CLEANED_TRANSACTIONS_FILE);
    let raw = table.to_raw();

    let mut wtr = csv::Writer::from_path(&path)?;
    let mut headers = raw.headers.clone();
    headers.push("sales_value".to_string());
    headers.push("invoice_date".to_string());
    wtr.write_record(&headers)?;
    for (cells, row) in raw.rows.iter().zip(&table.rows) {
        let mut record = cells.clone();
        record.push(row.sales_value.to_string());
        record.push(
            row.invoice_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        );
        wtr.write_record(&record)?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = table.rows.len(), "cleaned transactions exported");
    Ok(path)
}

/// Notice printed in place of a section whose source column is absent.
pub fn not_available(column: Column) -> String {
    format!("({} not available in dataset)", column.name())
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}", table_str);
    if rows.len() > max_rows {
        println!("... {} more rows", rows.len() - max_rows);
    }
    println!();
}
