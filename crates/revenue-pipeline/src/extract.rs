use chrono::NaiveDate;
use revenue_core::{
    config::RevenueConfig,
    error::{Result, RevenueError},
    types::OrderLine,
};
use rusqlite::{Connection, OpenFlags};
use tracing::{info, instrument};

use crate::snapshot::write_snapshot;

/// One row per (order, order line, product). Full history, no filter.
///
/// `sale_date` is the UTC calendar day: `date()` shifts timestamps that
/// carry an offset to UTC before dropping the time.
///
/// The ORDER BY only pins row order so unchanged data yields an identical
/// snapshot on every run.
pub const ORDER_LINES_SQL: &str = "
    SELECT
        date(o.orderdate) AS sale_date,
        od.productid,
        p.productname,
        od.quantity,
        p.price
    FROM orders o
    JOIN order_details od ON o.orderid = od.orderid
    JOIN products p ON od.productid = p.productid
    ORDER BY sale_date, o.orderid, od.productid";

const QUERY_ORIGIN: &str = "order lines query";

/// Open the configured sales database read-only.
///
/// A missing file is a connectivity failure rather than an empty database.
pub fn open_source(config: &RevenueConfig) -> Result<Connection> {
    let path = &config.source.path;
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| RevenueError::Connectivity(format!("cannot open {}: {e}", path.display())))
}

/// Run the order lines query against `conn`.
pub fn fetch_order_lines(conn: &Connection) -> Result<Vec<OrderLine>> {
    let mut stmt = conn
        .prepare(ORDER_LINES_SQL)
        .map_err(|e| RevenueError::Connectivity(format!("query rejected: {e}")))?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, Option<String>>(0)?, // sale_date
                row.get::<_, i64>(1)?,            // productid
                row.get::<_, String>(2)?,         // productname
                row.get::<_, Option<i64>>(3)?,    // quantity
                row.get::<_, Option<f64>>(4)?,    // price
            ))
        })
        .map_err(|e| RevenueError::Connectivity(format!("query failed: {e}")))?;

    let mut lines = Vec::new();
    for row in rows {
        let (date, product_id, product_name, quantity, price) = row.map_err(row_error)?;
        let line = OrderLine {
            sale_date: parse_sale_date(date, product_id)?,
            product_id,
            product_name,
            quantity: parse_quantity(quantity, product_id)?,
            price: price.ok_or_else(|| {
                RevenueError::schema(QUERY_ORIGIN, format!("product {product_id}: NULL price"))
            })?,
        };
        line.validate()
            .map_err(|reason| RevenueError::schema(QUERY_ORIGIN, reason))?;
        lines.push(line);
    }
    Ok(lines)
}

/// Extractor stage: query the source and replace the raw snapshot.
///
/// Returns the number of rows written.
#[instrument(skip_all, fields(source = %config.source.path.display()))]
pub fn fetch_order_data(config: &RevenueConfig) -> Result<usize> {
    let conn = open_source(config)?;
    let lines = fetch_order_lines(&conn)?;
    let path = &config.output.raw_snapshot;
    write_snapshot(path, &OrderLine::COLUMNS, &lines)?;
    info!(rows = lines.len(), path = %path.display(), "raw snapshot written");
    Ok(lines.len())
}

fn parse_sale_date(raw: Option<String>, product_id: i64) -> Result<NaiveDate> {
    let raw = raw.ok_or_else(|| {
        RevenueError::schema(
            QUERY_ORIGIN,
            format!("product {product_id}: order date is NULL or not a date"),
        )
    })?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| {
        RevenueError::schema(QUERY_ORIGIN, format!("product {product_id}: sale_date {raw:?}: {e}"))
    })
}

fn parse_quantity(raw: Option<i64>, product_id: i64) -> Result<u32> {
    let raw = raw.ok_or_else(|| {
        RevenueError::schema(QUERY_ORIGIN, format!("product {product_id}: NULL quantity"))
    })?;
    u32::try_from(raw).map_err(|_| {
        RevenueError::schema(
            QUERY_ORIGIN,
            format!("product {product_id}: quantity {raw} out of range"),
        )
    })
}

/// Row decode failures are a schema problem; anything else means the
/// source stopped answering mid-query.
fn row_error(err: rusqlite::Error) -> RevenueError {
    match err {
        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
            RevenueError::schema(QUERY_ORIGIN, err.to_string())
        }
        other => RevenueError::Connectivity(format!("query failed: {other}")),
    }
}
