// Normalization of a raw table into the canonical transaction schema.
//
// `prepare` never fails: cells that do not coerce become missing, and the
// only rows removed are those with a negative quantity.

use crate::types::{
    Column, MonetarySource, PrepReport, RawTable, SubChannelCategory, Transaction,
    TransactionTable,
};
use crate::util::{invoice_date, parse_f64_safe, parse_year_safe};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Resolved header layout: where each canonical column lives, plus the
/// positions of the pass-through columns.
struct Layout {
    canonical: BTreeMap<Column, usize>,
    extra: Vec<(usize, String)>,
}

impl Layout {
    fn resolve(headers: &[String]) -> Self {
        let mut canonical = BTreeMap::new();
        let mut extra = Vec::new();
        for (idx, header) in headers.iter().enumerate() {
            let header = header.trim();
            match Column::from_header(header) {
                // First source column claiming a canonical name wins.
                Some(col) if !canonical.contains_key(&col) => {
                    canonical.insert(col, idx);
                }
                _ => extra.push((idx, header.to_string())),
            }
        }
        Self { canonical, extra }
    }

    fn cell<'a>(&self, row: &'a [String], column: Column) -> Option<&'a str> {
        let idx = *self.canonical.get(&column)?;
        row.get(idx).map(String::as_str)
    }

    fn text(&self, row: &[String], column: Column) -> Option<String> {
        self.cell(row, column)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn number(&self, row: &[String], column: Column) -> Option<f64> {
        parse_f64_safe(self.cell(row, column))
    }

    /// Present and holding at least one numeric value among `rows`.
    fn has_numbers(&self, rows: &[&[String]], column: Column) -> bool {
        self.canonical.contains_key(&column)
            && rows.iter().any(|row| self.number(row, column).is_some())
    }

    fn negative_quantity(&self, row: &[String]) -> bool {
        self.number(row, Column::Quantity).unwrap_or(0.0) < 0.0
    }
}

pub fn prepare(raw: &RawTable) -> TransactionTable {
    let (table, report) = prepare_with_report(raw);
    info!(
        total = report.total_rows,
        kept = report.kept_rows,
        negative_quantity = report.negative_quantity_rows,
        undated = report.undated_rows,
        monetary = ?report.monetary_source,
        "transactions prepared"
    );
    table
}

pub fn prepare_with_report(raw: &RawTable) -> (TransactionTable, PrepReport) {
    let layout = Layout::resolve(&raw.headers);

    // Only rows that survive the quantity filter decide the monetary column.
    let kept: Vec<&[String]> = raw
        .rows
        .iter()
        .map(Vec::as_slice)
        .filter(|row| !layout.negative_quantity(row))
        .collect();
    let negative_quantity_rows = raw.rows.len() - kept.len();

    let monetary_source = if layout.has_numbers(&kept, Column::Sales) {
        MonetarySource::Sales
    } else if layout.has_numbers(&kept, Column::Revenue) {
        MonetarySource::Revenue
    } else {
        MonetarySource::Missing
    };
    let dated = layout.canonical.contains_key(&Column::Year)
        && layout.canonical.contains_key(&Column::Month);

    let mut rows = Vec::with_capacity(kept.len());
    let mut undated_rows = 0usize;

    for row in kept {
        let quantity = layout.number(row, Column::Quantity);

        let sales = layout.number(row, Column::Sales);
        let revenue = layout.number(row, Column::Revenue);
        let sales_value = match monetary_source {
            MonetarySource::Sales => sales.unwrap_or(0.0),
            MonetarySource::Revenue => revenue.unwrap_or(0.0),
            MonetarySource::Missing => 0.0,
        };

        let year = parse_year_safe(layout.cell(row, Column::Year));
        let month = layout.text(row, Column::Month);
        let invoice_date = match (dated, year, month.as_deref()) {
            (true, Some(y), Some(m)) => invoice_date(y, m),
            _ => None,
        };
        if invoice_date.is_none() {
            undated_rows += 1;
        }

        rows.push(Transaction {
            customer: layout.text(row, Column::Customer),
            city: layout.text(row, Column::City),
            country: layout.text(row, Column::Country),
            channel: layout.text(row, Column::Channel),
            sub_channel: layout.text(row, Column::SubChannel),
            product: layout.text(row, Column::Product),
            product_class: layout.text(row, Column::ProductClass),
            quantity,
            price: layout.number(row, Column::Price),
            sales,
            revenue,
            sales_rep: layout.text(row, Column::SalesRep),
            manager: layout.text(row, Column::Manager),
            sales_team: layout.text(row, Column::SalesTeam),
            distributor: layout.text(row, Column::Distributor),
            year,
            month,
            sales_value,
            invoice_date,
            extra: layout
                .extra
                .iter()
                .map(|(idx, _)| row.get(*idx).cloned().unwrap_or_default())
                .collect(),
        });
    }

    let report = PrepReport {
        total_rows: raw.rows.len(),
        kept_rows: rows.len(),
        negative_quantity_rows,
        undated_rows,
        monetary_source,
    };
    let table = TransactionTable {
        columns: layout.canonical.keys().copied().collect::<BTreeSet<_>>(),
        extra_columns: layout.extra.into_iter().map(|(_, h)| h).collect(),
        rows,
    };
    (table, report)
}

const RETAIL_KEYWORDS: [&str; 5] = ["retail", "apotek", "pharmacy", "toko", "retailer"];
const GOVERNMENT_KEYWORDS: [&str; 6] =
    ["government", "gov", "pemda", "puskesmas", "kemenkes", "public"];
const INSTITUTION_KEYWORDS: [&str; 7] = [
    "hospital",
    "clinic",
    "rumah sakit",
    "rs",
    "institution",
    "institutional",
    "hospital/clinic",
];
const PRIVATE_KEYWORDS: [&str; 5] = ["private", "corporate", "swasta", "company", "wholesale"];

/// Map a free-text sub-channel onto its high-level category by keyword.
/// Rules are checked in order and the first match wins.
pub fn map_subchannel_category(raw: Option<&str>) -> SubChannelCategory {
    let Some(raw) = raw else {
        return SubChannelCategory::Other;
    };
    let s = raw.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| s.contains(k));
    if matches(&RETAIL_KEYWORDS) {
        SubChannelCategory::Retail
    } else if matches(&GOVERNMENT_KEYWORDS) {
        SubChannelCategory::Government
    } else if matches(&INSTITUTION_KEYWORDS) {
        SubChannelCategory::Institution
    } else if matches(&PRIVATE_KEYWORDS) {
        SubChannelCategory::Private
    } else {
        SubChannelCategory::Other
    }
}
