// Collapse transactions to one profile per customer.

use crate::types::{Column, CustomerProfile, TransactionTable};
use std::collections::BTreeMap;

/// Frequency (transaction count) and Monetary (summed `sales_value`) per
/// customer, ordered by customer id. Rows without a customer are skipped;
/// a table without a customer column yields no profiles.
pub fn aggregate_customers(table: &TransactionTable) -> Vec<CustomerProfile> {
    if !table.has(Column::Customer) {
        return Vec::new();
    }

    let mut acc: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for row in &table.rows {
        let Some(customer) = row.customer.as_deref() else {
            continue;
        };
        let e = acc.entry(customer).or_insert((0, 0.0));
        e.0 += 1;
        e.1 += row.sales_value;
    }

    acc.into_iter()
        .map(|(customer, (frequency, monetary))| CustomerProfile {
            customer: customer.to_string(),
            frequency,
            monetary,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_raw_table;
    use crate::prep::prepare;

    fn table(csv: &str) -> TransactionTable {
        prepare(&read_raw_table(csv.as_bytes()).unwrap())
    }

    #[test]
    fn frequency_and_monetary_per_customer() {
        let t = table("Customer,Sales\nA,100\nA,50\nB,10\n");
        let profiles = aggregate_customers(&t);
        assert_eq!(
            profiles,
            vec![
                CustomerProfile { customer: "A".into(), frequency: 2, monetary: 150.0 },
                CustomerProfile { customer: "B".into(), frequency: 1, monetary: 10.0 },
            ]
        );
    }

    #[test]
    fn rows_without_customer_are_excluded_and_money_is_conserved() {
        let t = table("Customer,Sales\nA,100\n,999\nB,10\nA,5\n");
        let profiles = aggregate_customers(&t);
        assert_eq!(profiles.len(), 2);
        let profiled: f64 = profiles.iter().map(|p| p.monetary).sum();
        let attributed: f64 = t
            .rows
            .iter()
            .filter(|r| r.customer.is_some())
            .map(|r| r.sales_value)
            .sum();
        assert_eq!(profiled, attributed);
        assert_eq!(profiles.iter().map(|p| p.frequency).sum::<usize>(), 3);
    }

    #[test]
    fn no_customer_column_gives_empty_result() {
        let t = table("City,Sales\nLublin,100\n");
        assert!(aggregate_customers(&t).is_empty());
    }

    #[test]
    fn frequency_counted_without_monetary_columns() {
        let t = table("Customer,Quantity\nA,1\nA,2\nB,3\n");
        let profiles = aggregate_customers(&t);
        assert_eq!(profiles[0].frequency, 2);
        assert_eq!(profiles[1].frequency, 1);
        assert!(profiles.iter().all(|p| p.monetary == 0.0));
    }
}
