// End-to-end runs against a throwaway sales database and output directory.

use revenue_core::{RevenueConfig, RunState, Stage};
use revenue_pipeline::{Pipeline, StageOutput};
use rusqlite::Connection;
use tempfile::TempDir;

fn seeded(details: &str) -> (TempDir, RevenueConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = RevenueConfig::rooted_at(dir.path());
    let conn = Connection::open(&config.source.path).unwrap();
    conn.execute_batch(
        "
        CREATE TABLE orders (orderid INTEGER PRIMARY KEY, orderdate TEXT NOT NULL);
        CREATE TABLE products (productid INTEGER PRIMARY KEY, productname TEXT NOT NULL, price REAL NOT NULL);
        CREATE TABLE order_details (orderid INTEGER NOT NULL, productid INTEGER NOT NULL, quantity INTEGER NOT NULL);

        INSERT INTO products VALUES (1, 'Chai', 10.0), (2, 'Chang', 5.0), (3, 'Aniseed Syrup', 2.5);
        INSERT INTO orders VALUES
            (100, '2024-01-03 08:00:00'),
            (101, '2024-01-01 10:30:00'),
            (102, '2024-01-01 16:45:00'),
            (103, '2024-01-02 12:00:00');
        ",
    )
    .unwrap();
    conn.execute_batch(details).unwrap();
    (dir, config)
}

fn standard() -> (TempDir, RevenueConfig) {
    seeded(
        "INSERT INTO order_details VALUES
            (101, 1, 2), (102, 2, 1),
            (103, 3, 4),
            (100, 1, 3), (100, 2, 4);",
    )
}

#[test]
fn full_run_produces_all_artifacts() {
    let (_dir, config) = standard();
    let report = Pipeline::new(config.clone()).run().unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.rows_extracted, 5);
    assert_eq!(report.days_aggregated, 3);
    assert_eq!(report.chart_path.as_deref(), Some(config.output.chart.as_path()));

    let raw = std::fs::read_to_string(&config.output.raw_snapshot).unwrap();
    assert!(raw.starts_with("sale_date,productid,productname,quantity,price\n"));
    assert_eq!(raw.lines().count(), 6);

    let revenue = std::fs::read_to_string(&config.output.revenue_snapshot).unwrap();
    assert_eq!(
        revenue,
        "sale_date,total_revenue\n2024-01-01,25.0\n2024-01-02,10.0\n2024-01-03,50.0\n"
    );
    assert!(config.output.chart.exists());
}

#[test]
fn rerun_is_byte_identical() {
    let (_dir, config) = standard();
    let pipeline = Pipeline::new(config.clone());

    pipeline.run().unwrap();
    let first = (
        std::fs::read(&config.output.raw_snapshot).unwrap(),
        std::fs::read(&config.output.revenue_snapshot).unwrap(),
        std::fs::read(&config.output.chart).unwrap(),
    );
    pipeline.run().unwrap();
    let second = (
        std::fs::read(&config.output.raw_snapshot).unwrap(),
        std::fs::read(&config.output.revenue_snapshot).unwrap(),
        std::fs::read(&config.output.chart).unwrap(),
    );
    assert_eq!(first, second);
}

#[test]
fn empty_history_renders_empty_chart() {
    let (_dir, config) = seeded("");
    let report = Pipeline::new(config.clone()).run().unwrap();

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.rows_extracted, 0);
    assert_eq!(report.days_aggregated, 0);
    let revenue = std::fs::read_to_string(&config.output.revenue_snapshot).unwrap();
    assert_eq!(revenue, "sale_date,total_revenue\n");
    assert!(config.output.chart.exists());
}

#[test]
fn unreachable_source_stops_before_aggregation() {
    let dir = tempfile::tempdir().unwrap();
    let config = RevenueConfig::rooted_at(dir.path());

    let failure = Pipeline::new(config.clone()).run().unwrap_err();
    assert_eq!(failure.stage, Stage::Extract);
    assert_eq!(failure.error.code(), "CONNECTIVITY_ERROR");
    assert!(!config.output.raw_snapshot.exists());
    assert!(!config.output.revenue_snapshot.exists());
    assert!(!config.output.chart.exists());
}

#[test]
fn corrupt_raw_snapshot_fails_aggregate_stage() {
    let (_dir, config) = standard();
    let pipeline = Pipeline::new(config.clone());
    pipeline.run_stage(Stage::Extract).unwrap();
    std::fs::write(
        &config.output.raw_snapshot,
        "sale_date,productid,productname,quantity,price\n2024-01-01,1,Chai,2,ten\n",
    )
    .unwrap();

    let err = pipeline.run_stage(Stage::Aggregate).unwrap_err();
    assert_eq!(err.code(), "SCHEMA_ERROR");
}

#[test]
fn stages_can_be_invoked_one_at_a_time() {
    let (_dir, config) = standard();
    let pipeline = Pipeline::new(config.clone());

    assert_eq!(
        pipeline.run_stage(Stage::Extract).unwrap(),
        StageOutput::Extracted(5)
    );
    assert_eq!(
        pipeline.run_stage(Stage::Aggregate).unwrap(),
        StageOutput::Aggregated(3)
    );
    assert_eq!(
        pipeline.run_stage(Stage::Render).unwrap(),
        StageOutput::Rendered(config.output.chart.clone())
    );
}

#[test]
fn render_without_aggregate_is_missing_input() {
    let (_dir, config) = standard();
    let err = Pipeline::new(config)
        .run_stage(Stage::Render)
        .unwrap_err();
    assert_eq!(err.code(), "MISSING_INPUT");
}
