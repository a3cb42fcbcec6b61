use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the raw snapshot: a single order line joined to its product.
///
/// Field names on the wire follow the source query's column aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sale_date: NaiveDate,
    #[serde(rename = "productid")]
    pub product_id: i64,
    #[serde(rename = "productname")]
    pub product_name: String,
    pub quantity: u32,
    pub price: f64,
}

impl OrderLine {
    /// Column order of the raw snapshot header.
    pub const COLUMNS: [&'static str; 5] =
        ["sale_date", "productid", "productname", "quantity", "price"];

    pub fn revenue(&self) -> f64 {
        f64::from(self.quantity) * self.price
    }

    /// Reject prices that would break the non-negative revenue invariant.
    ///
    /// `quantity` is unsigned, so only the price needs checking here.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.price.is_finite() {
            return Err(format!(
                "product {} on {}: price is not a finite number",
                self.product_id, self.sale_date
            ));
        }
        if self.price < 0.0 {
            return Err(format!(
                "product {} on {}: negative price {}",
                self.product_id, self.sale_date, self.price
            ));
        }
        Ok(())
    }
}

/// Per-day revenue aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRevenue {
    pub sale_date: NaiveDate,
    pub total_revenue: f64,
}

impl DailyRevenue {
    pub const COLUMNS: [&'static str; 2] = ["sale_date", "total_revenue"];

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.total_revenue.is_finite() {
            return Err(format!(
                "{}: total_revenue is not a finite number",
                self.sale_date
            ));
        }
        Ok(())
    }
}

/// The three pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Aggregate,
    Render,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Aggregate, Stage::Render];

    /// The stage that consumes this stage's output, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Extract => Some(Stage::Aggregate),
            Stage::Aggregate => Some(Stage::Render),
            Stage::Render => None,
        }
    }

    /// Task identifier used in logs and run history.
    pub fn task_id(self) -> &'static str {
        match self {
            Stage::Extract => "fetch_order_data",
            Stage::Aggregate => "process_daily_revenue",
            Stage::Render => "plot_daily_revenue",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Aggregate => write!(f, "aggregate"),
            Stage::Render => write!(f, "render"),
        }
    }
}

impl std::str::FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "extract" | "fetch_order_data" => Ok(Stage::Extract),
            "aggregate" | "process_daily_revenue" => Ok(Stage::Aggregate),
            "render" | "plot_daily_revenue" => Ok(Stage::Render),
            other => Err(format!("unknown stage: {}", other)),
        }
    }
}

/// Where a single pipeline run currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotStarted,
    Extracting,
    Aggregating,
    Rendering,
    Done,
    Failed { stage: Stage },
}

impl RunState {
    /// The state a run is in while `stage` executes.
    pub fn running(stage: Stage) -> Self {
        match stage {
            Stage::Extract => RunState::Extracting,
            Stage::Aggregate => RunState::Aggregating,
            Stage::Render => RunState::Rendering,
        }
    }

    /// Advance past a successfully completed `stage`.
    pub fn completed(stage: Stage) -> Self {
        match stage.next() {
            Some(next) => RunState::running(next),
            None => RunState::Done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed { .. })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => write!(f, "not_started"),
            RunState::Extracting => write!(f, "extracting"),
            RunState::Aggregating => write!(f, "aggregating"),
            RunState::Rendering => write!(f, "rendering"),
            RunState::Done => write!(f, "done"),
            RunState::Failed { stage } => write!(f, "failed_at_{}", stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: f64) -> OrderLine {
        OrderLine {
            sale_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            product_id: 7,
            product_name: "Chai".to_string(),
            quantity: 3,
            price,
        }
    }

    #[test]
    fn revenue_is_quantity_times_price() {
        assert_eq!(line(2.5).revenue(), 7.5);
    }

    #[test]
    fn negative_price_rejected() {
        let err = line(-1.0).validate().unwrap_err();
        assert!(err.contains("negative price"));
    }

    #[test]
    fn nan_price_rejected() {
        assert!(line(f64::NAN).validate().is_err());
        assert!(line(0.0).validate().is_ok());
    }

    #[test]
    fn stage_order_is_linear() {
        assert_eq!(Stage::Extract.next(), Some(Stage::Aggregate));
        assert_eq!(Stage::Aggregate.next(), Some(Stage::Render));
        assert_eq!(Stage::Render.next(), None);
    }

    #[test]
    fn stage_parses_task_ids() {
        for stage in Stage::ALL {
            assert_eq!(stage.task_id().parse::<Stage>().unwrap(), stage);
            assert_eq!(stage.to_string().parse::<Stage>().unwrap(), stage);
        }
        assert!("load".parse::<Stage>().is_err());
    }

    #[test]
    fn run_state_walks_stages_to_done() {
        let mut state = RunState::running(Stage::Extract);
        assert_eq!(state, RunState::Extracting);
        for stage in Stage::ALL {
            state = RunState::completed(stage);
        }
        assert_eq!(state, RunState::Done);
        assert!(state.is_terminal());
        assert!(!RunState::Rendering.is_terminal());
        assert_eq!(
            RunState::Failed {
                stage: Stage::Aggregate
            }
            .to_string(),
            "failed_at_aggregate"
        );
    }
}
