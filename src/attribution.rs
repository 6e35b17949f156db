// Roll segmentation results back up: per-cluster totals, and revenue per
// cluster per month by joining labels onto the transactions.

use crate::types::{
    ClusterPeriodRevenueRow, ClusterSummaryRow, LabeledCustomer, TransactionTable, YearMonth,
};
use crate::util::{round2, share_pct};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Customers, mean and total Monetary, and share of revenue per cluster,
/// ordered by cluster label.
pub fn summarize_clusters(customers: &[LabeledCustomer]) -> Vec<ClusterSummaryRow> {
    let mut acc: BTreeMap<usize, (usize, f64)> = BTreeMap::new();
    for c in customers {
        let e = acc.entry(c.cluster).or_insert((0, 0.0));
        e.0 += 1;
        e.1 += c.monetary;
    }
    let grand_total: f64 = acc.values().map(|(_, total)| total).sum();

    acc.into_iter()
        .map(|(cluster, (count, total))| ClusterSummaryRow {
            cluster,
            customers: count,
            avg_monetary: round2(total / count as f64),
            total_monetary: total,
            revenue_share_pct: share_pct(total, grand_total),
        })
        .collect()
}

/// Revenue per (month, cluster). `periods` is the chronological category
/// axis: only months that actually occur, no gap filling.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterTimeline {
    pub periods: Vec<YearMonth>,
    pub rows: Vec<ClusterPeriodRevenueRow>,
}

impl ClusterTimeline {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total_revenue(&self) -> f64 {
        self.rows.iter().map(|r| r.revenue).sum()
    }
}

/// Transactions count when their customer carries a label and their
/// invoice date is known; everything else is left out.
pub fn revenue_by_cluster_over_time(
    customers: &[LabeledCustomer],
    table: &TransactionTable,
) -> ClusterTimeline {
    let labels: HashMap<&str, usize> = customers
        .iter()
        .map(|c| (c.customer.as_str(), c.cluster))
        .collect();

    let mut acc: BTreeMap<(YearMonth, usize), f64> = BTreeMap::new();
    for row in &table.rows {
        let (Some(customer), Some(period)) = (row.customer.as_deref(), row.period()) else {
            continue;
        };
        let Some(&cluster) = labels.get(customer) else {
            continue;
        };
        *acc.entry((period, cluster)).or_insert(0.0) += row.sales_value;
    }

    let periods: BTreeSet<YearMonth> = acc.keys().map(|(p, _)| *p).collect();
    let rows = acc
        .into_iter()
        .map(|((period, cluster), revenue)| ClusterPeriodRevenueRow {
            period,
            cluster,
            revenue,
        })
        .collect();

    ClusterTimeline {
        periods: periods.into_iter().collect(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_raw_table;
    use crate::prep::prepare;

    fn labeled(customer: &str, frequency: usize, monetary: f64, cluster: usize) -> LabeledCustomer {
        LabeledCustomer {
            customer: customer.to_string(),
            frequency,
            monetary,
            cluster,
        }
    }

    #[test]
    fn summary_rows_sorted_with_shares() {
        let customers = vec![
            labeled("A", 2, 150.0, 1),
            labeled("B", 1, 10.0, 0),
            labeled("C", 1, 40.0, 1),
        ];
        let summary = summarize_clusters(&customers);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].cluster, 0);
        assert_eq!(summary[0].customers, 1);
        assert_eq!(summary[0].revenue_share_pct, 5.0);
        assert_eq!(summary[1].customers, 2);
        assert_eq!(summary[1].avg_monetary, 95.0);
        assert_eq!(summary[1].total_monetary, 190.0);
        assert_eq!(summary[1].revenue_share_pct, 95.0);
        let total: f64 = summary.iter().map(|s| s.total_monetary).sum();
        assert_eq!(total, 200.0);
    }

    #[test]
    fn zero_revenue_gives_zero_shares() {
        let customers = vec![labeled("A", 1, 0.0, 0), labeled("B", 3, 0.0, 1)];
        let summary = summarize_clusters(&customers);
        assert!(summary.iter().all(|s| s.revenue_share_pct == 0.0));
    }

    #[test]
    fn timeline_joins_labels_and_skips_undated_or_unknown() {
        let csv = "\
Customer,Sales,Month,Year
A,100,1,2018
A,50,2,2018
B,10,1,2018
B,7,,2018
Z,999,1,2018
,5,1,2018
";
        let table = prepare(&read_raw_table(csv.as_bytes()).unwrap());
        let customers = vec![labeled("A", 2, 150.0, 1), labeled("B", 2, 17.0, 0)];
        let timeline = revenue_by_cluster_over_time(&customers, &table);

        let jan = YearMonth { year: 2018, month: 1 };
        let feb = YearMonth { year: 2018, month: 2 };
        assert_eq!(timeline.periods, vec![jan, feb]);
        assert_eq!(
            timeline.rows,
            vec![
                ClusterPeriodRevenueRow { period: jan, cluster: 0, revenue: 10.0 },
                ClusterPeriodRevenueRow { period: jan, cluster: 1, revenue: 100.0 },
                ClusterPeriodRevenueRow { period: feb, cluster: 1, revenue: 50.0 },
            ]
        );
        assert_eq!(timeline.total_revenue(), 160.0);
    }

    #[test]
    fn timeline_orders_periods_chronologically_across_years() {
        let csv = "Customer,Sales,Month,Year\nA,1,1,2019\nA,1,12,2018\nA,1,3,2018\n";
        let table = prepare(&read_raw_table(csv.as_bytes()).unwrap());
        let timeline = revenue_by_cluster_over_time(&[labeled("A", 3, 3.0, 0)], &table);
        let labels: Vec<String> = timeline.periods.iter().map(|p| p.to_string()).collect();
        assert_eq!(labels, vec!["2018-03", "2018-12", "2019-01"]);
    }
}
