// Session filters (year, month, city) as an explicit value.

use crate::types::{Transaction, TransactionTable};
use crate::util::month_token;
use std::collections::BTreeSet;

/// An empty set leaves that dimension unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterContext {
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<String>,
    pub cities: BTreeSet<String>,
}

impl FilterContext {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_years<I: IntoIterator<Item = i32>>(mut self, years: I) -> Self {
        self.years = years.into_iter().collect();
        self
    }

    pub fn with_months<I, S>(mut self, months: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.months = months.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cities = cities.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.years.is_empty() && self.months.is_empty() && self.cities.is_empty()
    }

    /// Filtered copy of `table`. A dimension is applied only when the table
    /// carries at least one value for it; rows missing a value in an applied
    /// dimension are dropped.
    pub fn apply(&self, table: &TransactionTable) -> TransactionTable {
        let options = FilterOptions::from_table(table);
        let by_year = !self.years.is_empty() && !options.years.is_empty();
        let by_month = !self.months.is_empty() && !options.months.is_empty();
        let by_city = !self.cities.is_empty() && !options.cities.is_empty();

        let keep = |r: &Transaction| {
            (!by_year || r.year.map_or(false, |y| self.years.contains(&y)))
                && (!by_month || r.month.as_ref().map_or(false, |m| self.months.contains(m)))
                && (!by_city || r.city.as_ref().map_or(false, |c| self.cities.contains(c)))
        };
        table.with_rows(table.rows.iter().filter(|&r| keep(r)).cloned().collect())
    }
}

/// Distinct values available for each filter dimension, sorted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub years: Vec<i32>,
    pub months: Vec<String>,
    pub cities: Vec<String>,
}

impl FilterOptions {
    pub fn from_table(table: &TransactionTable) -> Self {
        let years: BTreeSet<i32> = table.rows.iter().filter_map(|r| r.year).collect();
        let months: BTreeSet<&str> = table.rows.iter().filter_map(|r| r.month.as_deref()).collect();
        let cities: BTreeSet<&str> = table.rows.iter().filter_map(|r| r.city.as_deref()).collect();

        let mut months: Vec<String> = months.into_iter().map(str::to_string).collect();
        // Numeric months sort by value ("2" before "10"), names after them.
        months.sort_by_key(|m| (month_token(m).parse::<u32>().unwrap_or(u32::MAX), m.clone()));

        Self {
            years: years.into_iter().collect(),
            months,
            cities: cities.into_iter().map(str::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::read_raw_table;
    use crate::prep::prepare;

    fn table() -> TransactionTable {
        let csv = "\
Customer,City,Sales,Month,Year
A,Lublin,10,1,2018
B,Lublin,20,2,2018
C,Gdansk,30,10,2019
D,,40,2,2019
E,Gdansk,50,,
";
        prepare(&read_raw_table(csv.as_bytes()).unwrap())
    }

    fn customers(t: &TransactionTable) -> Vec<&str> {
        t.rows.iter().filter_map(|r| r.customer.as_deref()).collect()
    }

    #[test]
    fn unrestricted_filter_keeps_everything() {
        let t = table();
        let filtered = FilterContext::all().apply(&t);
        assert_eq!(filtered, t);
    }

    #[test]
    fn filters_combine_and_drop_missing_values() {
        let t = table();
        let f = FilterContext::all().with_years([2019]);
        assert_eq!(customers(&f.apply(&t)), vec!["C", "D"]);

        let f = FilterContext::all().with_years([2018, 2019]).with_cities(["Lublin"]);
        assert_eq!(customers(&f.apply(&t)), vec!["A", "B"]);

        let f = FilterContext::all().with_months(["2"]);
        assert_eq!(customers(&f.apply(&t)), vec!["B", "D"]);
    }

    #[test]
    fn dimension_without_values_is_not_applied() {
        let csv = "Customer,Sales\nA,1\nB,2\n";
        let t = prepare(&read_raw_table(csv.as_bytes()).unwrap());
        let f = FilterContext::all().with_cities(["Lublin"]).with_years([2018]);
        assert_eq!(f.apply(&t).rows.len(), 2);
    }

    #[test]
    fn options_are_sorted() {
        let options = FilterOptions::from_table(&table());
        assert_eq!(options.years, vec![2018, 2019]);
        assert_eq!(options.months, vec!["1", "2", "10"]);
        assert_eq!(options.cities, vec!["Gdansk", "Lublin"]);
    }
}
