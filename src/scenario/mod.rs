mod model;
mod reader;
mod resolve;

pub use model::{Fixture, GeneratedFixture, Group, Scenario, Suite};
pub use reader::{discover_suites, load_suite, load_suites, parse_suite, validate_suite};
pub use resolve::{ResolveError, ResolvedScenario};
