mod environment;
mod loader;

pub use environment::{EnvironmentBuilder, EnvironmentContext, Overrides};
pub use loader::{load_config, ContractpitConfig, LoadedConfig, ProfileConfig, CONFIG_FILE};
