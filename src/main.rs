// Entry point and terminal presentation shell.
//
// Menu-driven: each page is recomputed from the session on selection, with
// the session's caches absorbing repeated requests. `--batch` renders every
// page once, writes the exports and exits.
use anyhow::{Context, Result};
use clap::Parser;
use pharma_report::output::{self, not_available, preview_table};
use pharma_report::reports;
use pharma_report::types::{Column, MonetarySource, TransactionTable};
use pharma_report::util::{format_int, format_number};
use pharma_report::{locate_dataset, Args, FilterContext, Session};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Interactive state: the session plus what the user has selected so far.
struct App {
    session: Session,
    filter: FilterContext,
    k: usize,
    output_dir: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Print `label` and read one trimmed line. `None` on end of input.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn fmt_score(score: Option<f64>) -> String {
    score.map_or_else(|| "n/a".to_string(), |s| format!("{:.3}", s))
}

/// Find the dataset: explicit/default locations first, then ask.
fn resolve_dataset(args: &Args) -> Option<PathBuf> {
    if let Some(path) = locate_dataset(&args.input_candidates()) {
        return Some(path);
    }
    if let Some(input) = &args.input {
        warn!(path = %input.display(), "input file not found");
    }
    if args.batch {
        return None;
    }
    println!("No dataset found at the default locations.");
    let answer = prompt("Path to sales CSV (blank to quit): ")?;
    if answer.is_empty() {
        None
    } else {
        Some(PathBuf::from(answer))
    }
}

fn print_filter_note(filter: &FilterContext) {
    if filter.is_unrestricted() {
        println!("(All data)");
        return;
    }
    let join = |values: Vec<String>| {
        if values.is_empty() {
            "all".to_string()
        } else {
            values.join(", ")
        }
    };
    println!(
        "(Filtered: years {}; months {}; cities {})",
        join(filter.years.iter().map(|y| y.to_string()).collect()),
        join(filter.months.iter().cloned().collect()),
        join(filter.cities.iter().cloned().collect()),
    );
}

fn print_dataset_facts(table: &TransactionTable) {
    println!("\n=== Dataset Facts ===");
    println!(
        "Shape: {} rows x {} columns",
        format_int(table.rows.len()),
        format_int(table.column_count())
    );
    match table.invoice_date_range() {
        Some((first, last)) => println!(
            "Invoice dates: {} to {}",
            first.format("%Y-%m"),
            last.format("%Y-%m")
        ),
        None => println!("Invoice dates: (no dated rows)"),
    }
}

fn section<T>(title: &str, available: bool, column: Column, rows: &[T], max_rows: usize)
where
    T: tabled::Tabled + Clone,
{
    if available {
        preview_table(title, None, rows, max_rows);
    } else {
        println!("\n{}\n{}\n", title, not_available(column));
    }
}

fn render_overview(app: &mut App) {
    let table = app.session.filtered(&app.filter);
    let overview = reports::sales_overview(&table);

    println!("\n=== Sales Overview ===");
    print_filter_note(&app.filter);
    println!("Total Revenue: {}", format_number(overview.kpis.total_revenue, 2));
    println!("Transactions: {}", format_int(overview.kpis.transactions));
    match overview.kpis.units_sold {
        Some(units) => println!("Units Sold: {}", format_number(units, 0)),
        None => println!("Units Sold: {}", not_available(Column::Quantity)),
    }

    section("Revenue by Year", table.has(Column::Year), Column::Year, &overview.yearly, 50);
    section("Monthly Revenue", !overview.monthly.is_empty(), Column::Month, &overview.monthly, 60);
    section(
        "Revenue by Channel",
        table.has(Column::Channel),
        Column::Channel,
        &overview.by_channel,
        20,
    );
    section(
        "Revenue by Sub-channel Category",
        !overview.by_sub_channel.is_empty(),
        Column::SubChannel,
        &overview.by_sub_channel,
        10,
    );
    if !overview.sub_channel_mapping.is_empty() {
        preview_table("Sub-channel Mapping", None, &overview.sub_channel_mapping, 20);
    }
    section(
        "Top Cities by Revenue",
        table.has(Column::City),
        Column::City,
        &overview.top_cities,
        reports::TOP_CITIES,
    );
}

fn render_sales_manager(app: &mut App, distributor: Option<&str>) {
    let table = app.session.filtered(&app.filter);
    let view = reports::sales_manager_view(&table, distributor);

    println!("\n=== Sales Manager ===");
    print_filter_note(&app.filter);
    println!("Distributor: {}", distributor.unwrap_or("All"));

    section(
        "Top Products",
        table.has(Column::Product),
        Column::Product,
        &view.top_products,
        reports::TOP_PRODUCTS,
    );
    section(
        "Top Sales Reps",
        table.has(Column::SalesRep),
        Column::SalesRep,
        &view.top_reps,
        reports::TOP_REPS,
    );
    section(
        "Distributor Contribution",
        table.has(Column::Distributor),
        Column::Distributor,
        &view.distributor_contribution,
        reports::TOP_DISTRIBUTORS,
    );
}

fn choose_distributor(app: &mut App) -> Option<String> {
    let table = app.session.filtered(&app.filter);
    let distributors = reports::sales_manager_view(&table, None).distributors;
    if distributors.is_empty() {
        return None;
    }
    println!("\nDistributors:");
    for (i, d) in distributors.iter().enumerate() {
        println!("[{}] {}", i + 1, d);
    }
    let answer = prompt("Select distributor (blank for all): ")?;
    match answer.parse::<usize>() {
        Ok(n) if (1..=distributors.len()).contains(&n) => Some(distributors[n - 1].clone()),
        _ => None,
    }
}

fn render_head_of_sales(app: &mut App) {
    let table = app.session.filtered(&app.filter);
    let view = reports::head_of_sales_view(&table);

    println!("\n=== Head of Sales ===");
    print_filter_note(&app.filter);
    println!("Total Revenue: {}", format_number(view.total_revenue, 2));
    println!("Sales Teams: {}", format_int(view.team_count));
    println!("Sales Reps: {}", format_int(view.rep_count));

    section(
        "Revenue by Sales Team",
        table.has(Column::SalesTeam),
        Column::SalesTeam,
        &view.teams,
        20,
    );
    section(
        "Top Sales Reps",
        table.has(Column::SalesRep),
        Column::SalesRep,
        &view.top_reps,
        reports::TOP_REPS,
    );
    section(
        "Revenue by Country",
        table.has(Column::Country),
        Column::Country,
        &view.by_country,
        30,
    );
}

fn render_segmentation(app: &mut App) -> Result<()> {
    let view = app.session.segmentation(&app.filter, app.k)?;

    println!("\n=== Customer Segmentation ===");
    print_filter_note(&app.filter);
    if view.segmentation.customers.is_empty() {
        println!("{}\n", not_available(Column::Customer));
        return Ok(());
    }
    println!(
        "Customers: {} | clusters requested {} / used {}",
        format_int(view.segmentation.customers.len()),
        view.requested_k,
        view.effective_k
    );
    let config = app.session.config();
    println!(
        "k-means: seed {}, {} runs, max {} iterations",
        config.seed, config.n_init, config.max_iter
    );
    let quality = view.segmentation.quality;
    println!(
        "Silhouette: {} | Davies-Bouldin: {} | Calinski-Harabasz: {}",
        fmt_score(quality.silhouette),
        fmt_score(quality.davies_bouldin),
        fmt_score(quality.calinski_harabasz)
    );

    preview_table("Cluster Summary", None, &view.summary, 20);
    preview_table(
        "Customers by Cluster",
        Some("Frequency = transactions, Monetary = total sales"),
        &view.segmentation.customers,
        10,
    );
    preview_table(
        "Revenue by Cluster over Time",
        Some("dated transactions only"),
        &view.timeline.rows,
        12,
    );

    let written = output::export_segmentation(&app.output_dir, &view)
        .context("failed to export segmentation")?;
    for path in written {
        println!("(Exported {})", path.display());
    }
    println!();
    Ok(())
}

fn handle_segmentation(app: &mut App) -> Result<()> {
    if let Some(answer) = prompt(&format!("Number of clusters [{}]: ", app.k)) {
        if !answer.is_empty() {
            match answer.parse::<usize>() {
                Ok(k) if k >= 1 => app.k = k,
                _ => println!("Invalid cluster count; keeping {}.", app.k),
            }
        }
    }
    render_segmentation(app)
}

fn handle_filters(app: &mut App) {
    let options = app.session.filter_options();
    let show = |name: &str, values: Vec<String>| {
        if values.is_empty() {
            println!("{}: (no values in dataset)", name);
        } else {
            println!("{}: {}", name, values.join(", "));
        }
    };
    println!();
    show("Year", options.years.iter().map(|y| y.to_string()).collect());
    show("Month", options.months.clone());
    show("City", options.cities.clone());

    let Some(years) = prompt("Years (comma-separated, blank for all): ") else {
        return;
    };
    let Some(months) = prompt("Months (comma-separated, blank for all): ") else {
        return;
    };
    let Some(cities) = prompt("Cities (comma-separated, blank for all): ") else {
        return;
    };

    let years: Vec<i32> = split_list(&years)
        .iter()
        .filter_map(|y| match y.parse() {
            Ok(y) => Some(y),
            Err(_) => {
                println!("Ignoring invalid year: {}", y);
                None
            }
        })
        .collect();
    app.filter = FilterContext::all()
        .with_years(years)
        .with_months(split_list(&months))
        .with_cities(split_list(&cities));
    print_filter_note(&app.filter);
    println!();
}

fn handle_export_cleaned(app: &mut App) -> Result<()> {
    let table = app.session.filtered(&app.filter);
    let path = output::export_cleaned_transactions(&app.output_dir, &table)
        .context("failed to export cleaned transactions")?;
    println!("(Exported {})\n", path.display());
    Ok(())
}

fn run_batch(app: &mut App) -> Result<()> {
    render_overview(app);
    render_sales_manager(app, None);
    render_head_of_sales(app);
    render_segmentation(app)?;
    handle_export_cleaned(app)
}

fn run_menu(app: &mut App) {
    loop {
        println!("Select Page:");
        println!("[1] Sales Overview");
        println!("[2] Sales Manager");
        println!("[3] Head of Sales");
        println!("[4] Customer Segmentation");
        println!("[5] Set Filters");
        println!("[6] Export Cleaned Data");
        println!("[7] Exit\n");
        let Some(choice) = prompt("Enter choice: ") else {
            break;
        };
        let result = match choice.as_str() {
            "1" => {
                render_overview(app);
                Ok(())
            }
            "2" => {
                let distributor = choose_distributor(app);
                render_sales_manager(app, distributor.as_deref());
                Ok(())
            }
            "3" => {
                render_head_of_sales(app);
                Ok(())
            }
            "4" => handle_segmentation(app),
            "5" => {
                handle_filters(app);
                Ok(())
            }
            "6" => handle_export_cleaned(app),
            "7" => break,
            _ => {
                println!("Invalid choice. Please enter 1-7.\n");
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {:#}\n", e);
        }
    }
    println!("Exiting the program.");
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let Some(path) = resolve_dataset(&args) else {
        println!("No data available. Please provide a dataset to continue.");
        return Ok(());
    };

    let session = Session::open(&path, args.segmentation_config())
        .with_context(|| format!("failed to load {}", path.display()))?;
    let report = session.prep_report();
    println!("Dataset: {}", session.source());
    println!(
        "Processing dataset... ({} rows loaded, {} kept)",
        format_int(report.total_rows),
        format_int(report.kept_rows)
    );
    print_dataset_facts(session.table());
    if report.negative_quantity_rows > 0 {
        println!(
            "Note: {} rows with negative quantity removed.",
            format_int(report.negative_quantity_rows)
        );
    }
    if report.monetary_source == MonetarySource::Missing {
        println!("Note: no Sales or Revenue values found; revenue is reported as 0.");
    }
    println!();

    let mut app = App {
        filter: args.filter_context(),
        k: args.clusters.max(1),
        output_dir: args.output_dir.clone(),
        session,
    };

    if args.batch {
        run_batch(&mut app)
    } else {
        run_menu(&mut app);
        Ok(())
    }
}
