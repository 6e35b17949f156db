use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tabled::Tabled;

use crate::util::format_number;

/// Canonical columns understood by the pipeline. Anything else in the
/// source file is carried along untouched as an extra column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Customer,
    City,
    Country,
    Channel,
    SubChannel,
    Product,
    ProductClass,
    Quantity,
    Price,
    Sales,
    Revenue,
    SalesRep,
    Manager,
    SalesTeam,
    Distributor,
    Year,
    Month,
}

impl Column {
    pub const ALL: [Column; 17] = [
        Column::Customer,
        Column::City,
        Column::Country,
        Column::Channel,
        Column::SubChannel,
        Column::Product,
        Column::ProductClass,
        Column::Quantity,
        Column::Price,
        Column::Sales,
        Column::Revenue,
        Column::SalesRep,
        Column::Manager,
        Column::SalesTeam,
        Column::Distributor,
        Column::Year,
        Column::Month,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Customer => "Customer",
            Column::City => "City",
            Column::Country => "Country",
            Column::Channel => "Channel",
            Column::SubChannel => "Sub-channel",
            Column::Product => "Product",
            Column::ProductClass => "ProductClass",
            Column::Quantity => "Quantity",
            Column::Price => "Price",
            Column::Sales => "Sales",
            Column::Revenue => "Revenue",
            Column::SalesRep => "SalesRep",
            Column::Manager => "Manager",
            Column::SalesTeam => "SalesTeam",
            Column::Distributor => "Distributor",
            Column::Year => "Year",
            Column::Month => "Month",
        }
    }

    /// Resolve a (trimmed) source header to its canonical column, applying
    /// the known spelling variants.
    pub fn from_header(header: &str) -> Option<Column> {
        HEADER_LOOKUP.get(header).copied()
    }
}

static HEADER_LOOKUP: Lazy<HashMap<&'static str, Column>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, Column> =
        Column::ALL.iter().map(|c| (c.name(), *c)).collect();
    let synonyms = [
        ("Customer Name", Column::Customer),
        ("Product Name", Column::Product),
        ("Name of Sales Rep", Column::SalesRep),
        ("Sales Team", Column::SalesTeam),
        ("Product Class", Column::ProductClass),
        ("Sub-Channel", Column::SubChannel),
        ("SubChannel", Column::SubChannel),
        ("Sub_Channel", Column::SubChannel),
        ("Sub Channel", Column::SubChannel),
    ];
    map.extend(synonyms);
    map
});

/// A delimited file as read from disk: headers plus string cells, nothing
/// interpreted yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub channel: Option<String>,
    pub sub_channel: Option<String>,
    pub product: Option<String>,
    pub product_class: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub sales: Option<f64>,
    pub revenue: Option<f64>,
    pub sales_rep: Option<String>,
    pub manager: Option<String>,
    pub sales_team: Option<String>,
    pub distributor: Option<String>,
    pub year: Option<i32>,
    pub month: Option<String>,
    /// Always finite; zero when no monetary column is usable.
    pub sales_value: f64,
    /// First day of the transaction month, when year and month parse.
    pub invoice_date: Option<NaiveDate>,
    /// Pass-through cells, aligned with `TransactionTable::extra_columns`.
    pub extra: Vec<String>,
}

impl Transaction {
    /// Text value of a canonical column, numbers rendered back to text.
    pub fn cell(&self, column: Column) -> Option<String> {
        let text = |v: &Option<String>| v.clone();
        let number = |v: &Option<f64>| v.map(|n| n.to_string());
        match column {
            Column::Customer => text(&self.customer),
            Column::City => text(&self.city),
            Column::Country => text(&self.country),
            Column::Channel => text(&self.channel),
            Column::SubChannel => text(&self.sub_channel),
            Column::Product => text(&self.product),
            Column::ProductClass => text(&self.product_class),
            Column::Quantity => number(&self.quantity),
            Column::Price => number(&self.price),
            Column::Sales => number(&self.sales),
            Column::Revenue => number(&self.revenue),
            Column::SalesRep => text(&self.sales_rep),
            Column::Manager => text(&self.manager),
            Column::SalesTeam => text(&self.sales_team),
            Column::Distributor => text(&self.distributor),
            Column::Year => self.year.map(|y| y.to_string()),
            Column::Month => text(&self.month),
        }
    }

    pub fn period(&self) -> Option<YearMonth> {
        self.invoice_date.map(YearMonth::from_date)
    }
}

/// Which source column supplied `Transaction::sales_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonetarySource {
    Sales,
    Revenue,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub negative_quantity_rows: usize,
    pub undated_rows: usize,
    pub monetary_source: MonetarySource,
}

/// The normalized transaction table produced by `prep::prepare`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionTable {
    pub columns: BTreeSet<Column>,
    pub extra_columns: Vec<String>,
    pub rows: Vec<Transaction>,
}

impl TransactionTable {
    pub fn has(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// Same schema, different rows. Used for filtered views.
    pub fn with_rows(&self, rows: Vec<Transaction>) -> Self {
        Self {
            columns: self.columns.clone(),
            extra_columns: self.extra_columns.clone(),
            rows,
        }
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|r| r.sales_value).sum()
    }

    /// Columns as loaded: canonical plus pass-through.
    pub fn column_count(&self) -> usize {
        self.columns.len() + self.extra_columns.len()
    }

    /// Earliest and latest invoice date. `None` when no row is dated.
    pub fn invoice_date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut dates = self.rows.iter().filter_map(|r| r.invoice_date);
        let first = dates.next()?;
        Some(dates.fold((first, first), |(lo, hi), d| (lo.min(d), hi.max(d))))
    }

    /// Render back to source form: canonical columns first, then the
    /// pass-through ones. Derived values are left out.
    pub fn to_raw(&self) -> RawTable {
        let canonical: Vec<Column> = Column::ALL
            .iter()
            .copied()
            .filter(|c| self.has(*c))
            .collect();
        let headers = canonical
            .iter()
            .map(|c| c.name().to_string())
            .chain(self.extra_columns.iter().cloned())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                canonical
                    .iter()
                    .map(|c| row.cell(*c).unwrap_or_default())
                    .chain(row.extra.iter().cloned())
                    .collect()
            })
            .collect();
        RawTable::new(headers, rows)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CustomerProfile {
    #[serde(rename = "Customer")]
    #[tabled(rename = "Customer")]
    pub customer: String,
    #[serde(rename = "Frequency")]
    #[tabled(rename = "Frequency")]
    pub frequency: usize,
    #[serde(rename = "Monetary")]
    #[tabled(rename = "Monetary", display_with = "fmt_money")]
    pub monetary: f64,
}

/// A customer profile after segmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct LabeledCustomer {
    #[serde(rename = "Customer")]
    #[tabled(rename = "Customer")]
    pub customer: String,
    #[serde(rename = "Frequency")]
    #[tabled(rename = "Frequency")]
    pub frequency: usize,
    #[serde(rename = "Monetary")]
    #[tabled(rename = "Monetary", display_with = "fmt_money")]
    pub monetary: f64,
    #[serde(rename = "cluster")]
    #[tabled(rename = "cluster")]
    pub cluster: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SubChannelCategory {
    Retail,
    Government,
    Institution,
    Private,
    Other,
}

impl fmt::Display for SubChannelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubChannelCategory::Retail => "Retail",
            SubChannelCategory::Government => "Government",
            SubChannelCategory::Institution => "Institution",
            SubChannelCategory::Private => "Private",
            SubChannelCategory::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Calendar month bucket. Orders chronologically; displays as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(self) -> Self {
        if self.month >= 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RevenueRow {
    #[tabled(rename = "Name")]
    pub label: String,
    #[tabled(rename = "Revenue", display_with = "fmt_money")]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ShareRow {
    #[tabled(rename = "Name")]
    pub label: String,
    #[tabled(rename = "Revenue", display_with = "fmt_money")]
    pub revenue: f64,
    #[serde(rename = "pct_of_total")]
    #[tabled(rename = "% of Total", display_with = "fmt_pct")]
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct YearRevenueRow {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Revenue", display_with = "fmt_money")]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct PeriodRevenueRow {
    #[tabled(rename = "Month")]
    pub period: YearMonth,
    #[tabled(rename = "Revenue", display_with = "fmt_money")]
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct SubChannelMappingRow {
    #[tabled(rename = "Raw Sub-channel")]
    pub raw: String,
    #[tabled(rename = "Mapped Category")]
    pub category: SubChannelCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ClusterSummaryRow {
    #[tabled(rename = "cluster")]
    pub cluster: usize,
    #[serde(rename = "Customers")]
    #[tabled(rename = "Customers")]
    pub customers: usize,
    #[serde(rename = "Avg_Monetary")]
    #[tabled(rename = "Avg_Monetary", display_with = "fmt_money")]
    pub avg_monetary: f64,
    #[serde(rename = "Total_Revenue")]
    #[tabled(rename = "Total_Revenue", display_with = "fmt_whole")]
    pub total_monetary: f64,
    #[serde(rename = "pct_of_total_revenue")]
    #[tabled(rename = "% of Total Revenue", display_with = "fmt_pct")]
    pub revenue_share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct ClusterPeriodRevenueRow {
    #[serde(rename = "YearMonth")]
    #[tabled(rename = "YearMonth")]
    pub period: YearMonth,
    #[tabled(rename = "cluster")]
    pub cluster: usize,
    #[serde(rename = "sales_value")]
    #[tabled(rename = "Revenue", display_with = "fmt_money")]
    pub revenue: f64,
}

fn fmt_money(v: &f64) -> String {
    format_number(*v, 2)
}

fn fmt_whole(v: &f64) -> String {
    format_number(*v, 0)
}

fn fmt_pct(v: &f64) -> String {
    format!("{:.2}%", v)
}
