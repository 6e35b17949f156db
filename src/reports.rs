use crate::prep::map_subchannel_category;
use crate::types::{
    Column, PeriodRevenueRow, RevenueRow, ShareRow, SubChannelMappingRow, Transaction,
    TransactionTable, YearMonth, YearRevenueRow,
};
use crate::util::share_pct;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const TOP_CITIES: usize = 20;
pub const TOP_PRODUCTS: usize = 10;
pub const TOP_REPS: usize = 15;
pub const TOP_DISTRIBUTORS: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewKpis {
    pub total_revenue: f64,
    pub transactions: usize,
    /// `None` when the data has no Quantity column.
    pub units_sold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesOverview {
    pub kpis: OverviewKpis,
    pub yearly: Vec<YearRevenueRow>,
    pub monthly: Vec<PeriodRevenueRow>,
    pub by_channel: Vec<RevenueRow>,
    pub by_sub_channel: Vec<RevenueRow>,
    pub sub_channel_mapping: Vec<SubChannelMappingRow>,
    pub top_cities: Vec<RevenueRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesManagerView {
    pub distributors: Vec<String>,
    pub top_products: Vec<RevenueRow>,
    pub top_reps: Vec<RevenueRow>,
    pub distributor_contribution: Vec<RevenueRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadOfSalesView {
    pub total_revenue: f64,
    pub team_count: usize,
    pub rep_count: usize,
    pub teams: Vec<ShareRow>,
    pub top_reps: Vec<RevenueRow>,
    pub by_country: Vec<RevenueRow>,
}

/// Sum `sales_value` per key, highest first (ties by key), optionally
/// truncated. Rows whose key is `None` are skipped.
fn revenue_by<'a, I, F>(rows: I, key: F, limit: Option<usize>) -> Vec<RevenueRow>
where
    I: IntoIterator<Item = &'a Transaction>,
    F: Fn(&Transaction) -> Option<String>,
{
    let mut map: HashMap<String, f64> = HashMap::new();
    for r in rows {
        if let Some(k) = key(r) {
            *map.entry(k).or_insert(0.0) += r.sales_value;
        }
    }
    let mut out: Vec<RevenueRow> = map
        .into_iter()
        .map(|(label, revenue)| RevenueRow { label, revenue })
        .collect();
    out.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
    if let Some(n) = limit {
        out.truncate(n);
    }
    out
}

fn column_revenue<F>(
    table: &TransactionTable,
    column: Column,
    key: F,
    limit: Option<usize>,
) -> Vec<RevenueRow>
where
    F: Fn(&Transaction) -> Option<String>,
{
    if !table.has(column) {
        return Vec::new();
    }
    revenue_by(&table.rows, key, limit)
}

fn distinct_count<F>(table: &TransactionTable, key: F) -> usize
where
    F: Fn(&Transaction) -> Option<&str>,
{
    table.rows.iter().filter_map(key).collect::<HashSet<_>>().len()
}

pub fn yearly_revenue(table: &TransactionTable) -> Vec<YearRevenueRow> {
    let mut map: BTreeMap<i32, f64> = BTreeMap::new();
    for r in &table.rows {
        if let Some(year) = r.year {
            *map.entry(year).or_insert(0.0) += r.sales_value;
        }
    }
    map.into_iter()
        .map(|(year, revenue)| YearRevenueRow { year, revenue })
        .collect()
}

/// Revenue per calendar month from the first to the last dated month,
/// months without sales included at zero.
pub fn monthly_revenue(table: &TransactionTable) -> Vec<PeriodRevenueRow> {
    let mut map: BTreeMap<YearMonth, f64> = BTreeMap::new();
    for r in &table.rows {
        if let Some(period) = r.period() {
            *map.entry(period).or_insert(0.0) += r.sales_value;
        }
    }
    let (Some(&first), Some(&last)) = (map.keys().next(), map.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut period = first;
    while period <= last {
        out.push(PeriodRevenueRow {
            period,
            revenue: map.get(&period).copied().unwrap_or(0.0),
        });
        period = period.next();
    }
    out
}

/// Distinct raw sub-channel values, in order of first appearance, with the
/// category each maps to.
pub fn sub_channel_mapping(table: &TransactionTable) -> Vec<SubChannelMappingRow> {
    let mut seen = BTreeSet::new();
    table
        .rows
        .iter()
        .filter_map(|r| r.sub_channel.as_deref())
        .filter(|raw| seen.insert(*raw))
        .map(|raw| SubChannelMappingRow {
            raw: raw.to_string(),
            category: map_subchannel_category(Some(raw)),
        })
        .collect()
}

pub fn sales_overview(table: &TransactionTable) -> SalesOverview {
    let kpis = OverviewKpis {
        total_revenue: table.total_revenue(),
        transactions: table.rows.len(),
        units_sold: table
            .has(Column::Quantity)
            .then(|| table.rows.iter().filter_map(|r| r.quantity).sum()),
    };

    let has_sub_channel = table.rows.iter().any(|r| r.sub_channel.is_some());
    let by_sub_channel = if has_sub_channel {
        // Missing sub-channel counts as Other here, unlike other groupings.
        revenue_by(
            &table.rows,
            |r| Some(map_subchannel_category(r.sub_channel.as_deref()).to_string()),
            None,
        )
    } else {
        Vec::new()
    };

    SalesOverview {
        kpis,
        yearly: yearly_revenue(table),
        monthly: monthly_revenue(table),
        by_channel: column_revenue(table, Column::Channel, |r| r.channel.clone(), None),
        by_sub_channel,
        sub_channel_mapping: sub_channel_mapping(table),
        top_cities: column_revenue(table, Column::City, |r| r.city.clone(), Some(TOP_CITIES)),
    }
}

/// Products and reps are limited to `distributor` when one is given; the
/// distributor ranking always covers the whole table.
pub fn sales_manager_view(table: &TransactionTable, distributor: Option<&str>) -> SalesManagerView {
    let selected: Vec<&Transaction> = table
        .rows
        .iter()
        .filter(|r| distributor.map_or(true, |d| r.distributor.as_deref() == Some(d)))
        .collect();

    let distributors: BTreeSet<&str> = table
        .rows
        .iter()
        .filter_map(|r| r.distributor.as_deref())
        .collect();

    let top_products = if table.has(Column::Product) {
        revenue_by(selected.iter().copied(), |r| r.product.clone(), Some(TOP_PRODUCTS))
    } else {
        Vec::new()
    };
    let top_reps = if table.has(Column::SalesRep) {
        revenue_by(selected.iter().copied(), |r| r.sales_rep.clone(), Some(TOP_REPS))
    } else {
        Vec::new()
    };

    SalesManagerView {
        distributors: distributors.into_iter().map(str::to_string).collect(),
        top_products,
        top_reps,
        distributor_contribution: column_revenue(
            table,
            Column::Distributor,
            |r| r.distributor.clone(),
            Some(TOP_DISTRIBUTORS),
        ),
    }
}

pub fn head_of_sales_view(table: &TransactionTable) -> HeadOfSalesView {
    let total_revenue = table.total_revenue();
    let teams = column_revenue(table, Column::SalesTeam, |r| r.sales_team.clone(), None)
        .into_iter()
        .map(|row| ShareRow {
            share_pct: share_pct(row.revenue, total_revenue),
            label: row.label,
            revenue: row.revenue,
        })
        .collect();

    HeadOfSalesView {
        total_revenue,
        team_count: distinct_count(table, |r| r.sales_team.as_deref()),
        rep_count: distinct_count(table, |r| r.sales_rep.as_deref()),
        teams,
        top_reps: column_revenue(table, Column::SalesRep, |r| r.sales_rep.clone(), Some(TOP_REPS)),
        by_country: column_revenue(table, Column::Country, |r| r.country.clone(), None),
    }
}
