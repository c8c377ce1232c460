//! Run results and their renderings: console, JSON and JUnit XML.

mod export;
mod model;
mod printer;

pub use export::{render_report, write_report, ReportFormat};
pub use model::{
    ErrorCause, GroupReport, Outcome, RequestSummary, RunReport, ScenarioResult, Summary,
};
pub use printer::{format_report, print_report};
