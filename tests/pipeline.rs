use pharma_report::customers::aggregate_customers;
use pharma_report::output::{
    export_cleaned_transactions, export_segmentation, CLUSTERED_CUSTOMERS_FILE,
    CLUSTER_TIMELINE_FILE,
};
use pharma_report::reports::{head_of_sales_view, sales_overview};
use pharma_report::types::MonetarySource;
use pharma_report::{
    load_dataset, prepare, prepare_with_report, Error, FilterContext, SegmentationConfig, Session,
};
use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

fn write_csv(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn open(path: &Path) -> Session {
    Session::open(path, SegmentationConfig::default()).unwrap()
}

/// 24 customers across two cities and two years, integer sales so sums are
/// exact.
fn generated_csv() -> String {
    let mut csv = String::from("Customer Name,City,Country,Sales Team,Quantity,Sales,Month,Year\n");
    for c in 0..24u32 {
        let transactions = c % 4 + 1;
        for t in 0..transactions {
            let city = if c % 3 == 0 { "Lublin" } else { "Gdansk" };
            let team = if c % 2 == 0 { "Delta" } else { "Bravo" };
            let sales = (c * 37 % 101 + 1) * 10 + t * 3;
            let month = (c + t) % 12 + 1;
            let year = 2018 + (c + t) % 2;
            writeln!(
                csv,
                "Cust {c:02},{city},Poland,{team},{},{sales},{month},{year}",
                t + 1
            )
            .unwrap();
        }
    }
    csv
}

#[test]
fn example_customers_split_by_monetary() {
    let file = write_csv("Customer,Sales\nA,100\nA,50\nB,10\n");
    let mut session = open(file.path());

    let profiles = session.customer_profiles(&FilterContext::all());
    assert_eq!(profiles.len(), 2);
    assert_eq!((profiles[0].frequency, profiles[0].monetary), (2, 150.0));
    assert_eq!((profiles[1].frequency, profiles[1].monetary), (1, 10.0));

    let view = session.segmentation(&FilterContext::all(), 2).unwrap();
    let labels: Vec<usize> = view.segmentation.customers.iter().map(|c| c.cluster).collect();
    assert_ne!(labels[0], labels[1]);
    let quality = view.segmentation.quality;
    assert!(quality.silhouette.is_some_and(f64::is_finite));
    assert!(quality.davies_bouldin.is_some_and(f64::is_finite));
    assert!(quality.calinski_harabasz.is_some_and(f64::is_finite));
}

#[test]
fn zero_revenue_dataset_clusters_on_frequency() {
    let file = write_csv("Customer,Quantity\nA,1\nA,2\nB,3\nC,1\n");
    let mut session = open(file.path());
    assert_eq!(session.prep_report().monetary_source, MonetarySource::Missing);
    assert!(session.table().rows.iter().all(|r| r.sales_value == 0.0));

    let view = session.segmentation(&FilterContext::all(), 2).unwrap();
    let customers = &view.segmentation.customers;
    assert_eq!(customers.iter().map(|c| c.frequency).collect::<Vec<_>>(), vec![2, 1, 1]);
    assert!(customers.iter().all(|c| c.monetary == 0.0));
    assert_ne!(customers[0].cluster, customers[1].cluster);
    assert_eq!(customers[1].cluster, customers[2].cluster);
}

#[test]
fn preparation_is_idempotent() {
    let file = write_csv(
        "Customer Name,Sub_Channel,Quantity,Sales,Revenue,Month,Year,Latitude\n\
         A,Retail,2,\"1,472\",9,Jan 1,2018.0,51.2\n\
         B,,-1,10,1,2,2018,50.1\n\
         C,Hospital,,5,,3,,49.9\n",
    );
    let loaded = load_dataset(file.path()).unwrap();
    let once = prepare(&loaded.raw);
    let twice = prepare(&once.to_raw());
    assert_eq!(once, twice);
    assert_eq!(once.rows.len(), 2);
    assert_eq!(once.rows[0].sales_value, 1472.0);
    assert_eq!(once.extra_columns, vec!["Latitude"]);
}

#[test]
fn negative_quantity_rows_are_dropped_and_missing_kept() {
    let file = write_csv("Customer,Quantity,Sales\nA,-3,10\nB,,20\nC,0,30\nD,abc,40\n");
    let loaded = load_dataset(file.path()).unwrap();
    let (table, report) = prepare_with_report(&loaded.raw);
    let kept: Vec<&str> = table.rows.iter().filter_map(|r| r.customer.as_deref()).collect();
    assert_eq!(kept, vec!["B", "C", "D"]);
    assert_eq!(report.negative_quantity_rows, 1);
    assert_eq!(report.total_rows, 4);
}

#[test]
fn revenue_used_only_when_sales_entirely_missing() {
    let file = write_csv("Customer,Sales,Revenue\nA,,5\nB,n/a,7\n");
    let session = open(file.path());
    assert_eq!(session.prep_report().monetary_source, MonetarySource::Revenue);
    let values: Vec<f64> = session.table().rows.iter().map(|r| r.sales_value).collect();
    assert_eq!(values, vec![5.0, 7.0]);

    let file = write_csv("Customer,Sales,Revenue\nA,,5\nB,3,7\n");
    let session = open(file.path());
    assert_eq!(session.prep_report().monetary_source, MonetarySource::Sales);
    let values: Vec<f64> = session.table().rows.iter().map(|r| r.sales_value).collect();
    assert_eq!(values, vec![0.0, 3.0]);
}

#[test]
fn revenue_is_conserved_through_aggregation_and_attribution() {
    let file = write_csv(&generated_csv());
    let mut session = open(file.path());
    let filter = FilterContext::all().with_cities(["Gdansk"]);

    let table = session.filtered(&filter);
    let attributed: f64 = table
        .rows
        .iter()
        .filter(|r| r.customer.is_some())
        .map(|r| r.sales_value)
        .sum();
    let profiles = session.customer_profiles(&filter);
    let profiled: f64 = profiles.iter().map(|p| p.monetary).sum();
    assert_eq!(profiled, attributed);

    let view = session.segmentation(&filter, 3).unwrap();
    let summarized: f64 = view.summary.iter().map(|r| r.total_monetary).sum();
    assert_eq!(summarized, profiled);

    let dated: f64 = table
        .rows
        .iter()
        .filter(|r| r.customer.is_some() && r.invoice_date.is_some())
        .map(|r| r.sales_value)
        .sum();
    assert_eq!(view.timeline.total_revenue(), dated);
}

#[test]
fn every_customer_gets_exactly_one_valid_label() {
    let file = write_csv(&generated_csv());
    let mut session = open(file.path());
    let filter = FilterContext::all();
    let n = session.customer_profiles(&filter).len();
    assert_eq!(n, 24);

    for k in 1..=6 {
        let view = session.segmentation(&filter, k).unwrap();
        assert_eq!(view.segmentation.customers.len(), n);
        assert!(view.segmentation.customers.iter().all(|c| c.cluster < k));
        let counted: usize = view.summary.iter().map(|r| r.customers).sum();
        assert_eq!(counted, n);
    }
}

#[test]
fn single_cluster_scores_are_not_applicable() {
    let file = write_csv(&generated_csv());
    let mut session = open(file.path());
    let view = session.segmentation(&FilterContext::all(), 1).unwrap();
    assert!(view.segmentation.customers.iter().all(|c| c.cluster == 0));
    let quality = view.segmentation.quality;
    assert_eq!(quality.silhouette, None);
    assert_eq!(quality.davies_bouldin, None);
    assert_eq!(quality.calinski_harabasz, None);
}

#[test]
fn independent_runs_are_identical() {
    let file = write_csv(&generated_csv());
    let mut first = open(file.path());
    let mut second = open(file.path());
    let filter = FilterContext::all().with_years([2019]);

    let a = first.segmentation(&filter, 4).unwrap();
    let b = second.segmentation(&filter, 4).unwrap();
    assert_eq!(a.segmentation.customers, b.segmentation.customers);
    assert_eq!(a.segmentation.quality, b.segmentation.quality);
    assert_eq!(a.summary, b.summary);
}

#[test]
fn filters_narrow_every_view() {
    let file = write_csv(&generated_csv());
    let mut session = open(file.path());
    let all = session.filtered(&FilterContext::all());
    let lublin = session.filtered(&FilterContext::all().with_cities(["Lublin"]));

    assert!(lublin.rows.iter().all(|r| r.city.as_deref() == Some("Lublin")));
    assert!(lublin.rows.len() < all.rows.len());
    let overview = sales_overview(&lublin);
    assert_eq!(overview.top_cities.len(), 1);
    assert_eq!(overview.kpis.total_revenue, lublin.total_revenue());

    let head = head_of_sales_view(&all);
    assert_eq!(head.team_count, 2);
    let shares: f64 = head.teams.iter().map(|t| t.share_pct).sum();
    assert!((shares - 100.0).abs() < 0.02);
}

#[test]
fn exports_land_in_output_dir() {
    let file = write_csv(&generated_csv());
    let mut session = open(file.path());
    let out = tempdir().unwrap();
    let dir = out.path().join("reports");

    let view = session.segmentation(&FilterContext::all(), 3).unwrap();
    export_segmentation(&dir, &view).unwrap();
    let customers = fs::read_to_string(dir.join(CLUSTERED_CUSTOMERS_FILE)).unwrap();
    assert_eq!(customers.lines().count(), 25);
    let timeline = fs::read_to_string(dir.join(CLUSTER_TIMELINE_FILE)).unwrap();
    assert_eq!(timeline.lines().next(), Some("YearMonth,cluster,sales_value"));

    let cleaned = export_cleaned_transactions(&dir, session.table()).unwrap();
    let text = fs::read_to_string(cleaned).unwrap();
    assert_eq!(text.lines().count(), session.table().rows.len() + 1);
    assert!(text.lines().next().unwrap().ends_with(",sales_value,invoice_date"));
}

#[test]
fn fingerprint_tracks_content() {
    let a = write_csv("Customer,Sales\nA,1\n");
    let b = write_csv("Customer,Sales\nA,2\n");
    let a_again = write_csv("Customer,Sales\nA,1\n");
    let (a, b, a_again) = (open(a.path()), open(b.path()), open(a_again.path()));
    assert_ne!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint(), a_again.fingerprint());
}

#[test]
fn empty_file_is_no_data() {
    let file = write_csv("");
    assert!(matches!(load_dataset(file.path()), Err(Error::NoData { .. })));
}

#[test]
fn customer_less_dataset_degrades_to_empty_segmentation() {
    let file = write_csv("City,Sales\nLublin,100\n");
    let mut session = open(file.path());
    assert!(aggregate_customers(session.table()).is_empty());
    let view = session.segmentation(&FilterContext::all(), 3).unwrap();
    assert!(view.segmentation.customers.is_empty());
    assert_eq!(view.effective_k, 0);
}
