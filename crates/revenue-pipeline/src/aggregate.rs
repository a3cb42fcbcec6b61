use std::collections::BTreeMap;

use chrono::NaiveDate;
use revenue_core::{
    config::RevenueConfig,
    error::{Result, RevenueError},
    types::{DailyRevenue, OrderLine},
};
use tracing::{info, instrument};

use crate::snapshot::{read_snapshot, write_snapshot};

/// Sum `quantity * price` per sale date.
///
/// One row per distinct date in `lines`, in chronological order.
pub fn daily_revenue(lines: &[OrderLine]) -> Vec<DailyRevenue> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for line in lines {
        *by_day.entry(line.sale_date).or_insert(0.0) += line.revenue();
    }
    by_day
        .into_iter()
        .map(|(sale_date, total_revenue)| DailyRevenue {
            sale_date,
            total_revenue,
        })
        .collect()
}

/// Aggregator stage: raw snapshot in, per-day snapshot out.
///
/// Returns the number of days written.
#[instrument(skip_all, fields(input = %config.output.raw_snapshot.display()))]
pub fn process_daily_revenue(config: &RevenueConfig) -> Result<usize> {
    let input = &config.output.raw_snapshot;
    let lines: Vec<OrderLine> = read_snapshot(input, &OrderLine::COLUMNS)?;
    for line in &lines {
        line.validate()
            .map_err(|reason| RevenueError::schema(input.display().to_string(), reason))?;
    }

    let days = daily_revenue(&lines);
    let output = &config.output.revenue_snapshot;
    write_snapshot(output, &DailyRevenue::COLUMNS, &days)?;
    info!(
        lines = lines.len(),
        days = days.len(),
        path = %output.display(),
        "daily revenue written"
    );
    Ok(days.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn line(d: u32, product_id: i64, quantity: u32, price: f64) -> OrderLine {
        OrderLine {
            sale_date: date(d),
            product_id,
            product_name: format!("product-{product_id}"),
            quantity,
            price,
        }
    }

    #[test]
    fn sums_quantity_times_price_per_day() {
        let days = daily_revenue(&[line(1, 1, 2, 10.0), line(1, 2, 1, 5.0)]);
        assert_eq!(
            days,
            vec![DailyRevenue {
                sale_date: date(1),
                total_revenue: 25.0
            }]
        );
    }

    #[test]
    fn single_unit_lines_sum_prices() {
        let days = daily_revenue(&[line(1, 1, 1, 10.0), line(1, 2, 1, 5.0)]);
        assert_eq!(days[0].total_revenue, 15.0);
    }

    #[test]
    fn output_dates_match_input_dates() {
        let lines = vec![
            line(5, 1, 1, 1.0),
            line(2, 1, 3, 2.0),
            line(5, 2, 0, 9.0),
            line(9, 3, 4, 0.5),
        ];
        let days = daily_revenue(&lines);

        let input: BTreeSet<_> = lines.iter().map(|l| l.sale_date).collect();
        let output: BTreeSet<_> = days.iter().map(|d| d.sale_date).collect();
        assert_eq!(input, output);
        assert_eq!(days.len(), input.len());
    }

    #[test]
    fn output_is_chronological() {
        let days = daily_revenue(&[line(3, 1, 1, 1.0), line(1, 1, 1, 1.0), line(2, 1, 1, 1.0)]);
        let dates: Vec<_> = days.iter().map(|d| d.sale_date).collect();
        assert_eq!(dates, vec![date(1), date(2), date(3)]);
    }

    #[test]
    fn non_negative_inputs_give_non_negative_totals() {
        let lines: Vec<_> = (0..50u32)
            .map(|i| line(1 + i % 7, i64::from(i), i % 4, f64::from(i) * 0.25))
            .collect();
        assert!(daily_revenue(&lines).iter().all(|d| d.total_revenue >= 0.0));
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(daily_revenue(&[]).is_empty());
    }

    #[test]
    fn stage_rejects_negative_price_in_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = RevenueConfig::rooted_at(dir.path());
        std::fs::create_dir_all(config.output.raw_snapshot.parent().unwrap()).unwrap();
        std::fs::write(
            &config.output.raw_snapshot,
            "sale_date,productid,productname,quantity,price\n2024-01-01,1,Chai,2,-3.0\n",
        )
        .unwrap();

        let err = process_daily_revenue(&config).unwrap_err();
        assert_eq!(err.code(), "SCHEMA_ERROR");
        assert!(!config.output.revenue_snapshot.exists());
    }

    #[test]
    fn stage_rejects_negative_quantity_in_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let config = RevenueConfig::rooted_at(dir.path());
        std::fs::create_dir_all(config.output.raw_snapshot.parent().unwrap()).unwrap();
        std::fs::write(
            &config.output.raw_snapshot,
            "sale_date,productid,productname,quantity,price\n2024-01-01,1,Chai,-2,3.0\n",
        )
        .unwrap();

        let err = process_daily_revenue(&config).unwrap_err();
        assert!(matches!(err, RevenueError::Schema { .. }));
    }

    #[test]
    fn stage_without_raw_snapshot_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = RevenueConfig::rooted_at(dir.path());
        let err = process_daily_revenue(&config).unwrap_err();
        assert!(matches!(err, RevenueError::MissingInput { .. }));
    }
}
