//! `revenue-pipeline` — the three-stage daily revenue batch job.
//!
//! | Stage       | Input                 | Output                 |
//! |-------------|-----------------------|------------------------|
//! | `extract`   | sales database        | raw snapshot (CSV)     |
//! | `aggregate` | raw snapshot          | revenue snapshot (CSV) |
//! | `render`    | revenue snapshot      | chart (SVG)            |
//!
//! Every stage recomputes its output from scratch and replaces the previous
//! file atomically.

pub mod aggregate;
pub mod extract;
pub mod pipeline;
pub mod render;
pub mod snapshot;

pub use pipeline::{Pipeline, RunReport, StageFailure, StageOutput};
