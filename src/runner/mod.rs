//! Orchestrates groups of scenarios.
//!
//! Scenarios inside a group run strictly in declared order against one
//! variable store. Groups share nothing but the HTTP client and run
//! concurrently, at most `jobs` at a time; the report keeps declaration order.

mod group;
mod plan;
mod state;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use futures_util::{stream, StreamExt};
use tracing::info;

use crate::{
    config::EnvironmentContext,
    env::EnvMap,
    executor::HttpExecutor,
    generator::{RandomGenerator, ValueGenerator},
    report::{GroupReport, RunReport, ScenarioResult},
    scenario::{Group, Suite},
};

pub use plan::{plan_group, Dependency, DependencyReason, ScenarioPlan};
pub use state::ScenarioState;

use group::{run_group, RunContext};

/// Progress hooks; every method defaults to doing nothing.
pub trait RunObserver: Send + Sync {
    fn group_started(&self, _suite: &str, _group: &Group) {}
    fn scenario_finished(&self, _result: &ScenarioResult) {}
    fn group_finished(&self, _report: &GroupReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Groups in flight at once.
    pub jobs: usize,
    pub response_dir: Option<PathBuf>,
    /// Only run groups with these names; empty runs everything.
    pub group_filter: Vec<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            response_dir: None,
            group_filter: Vec::new(),
        }
    }
}

pub struct Runner {
    executor: HttpExecutor,
    generator: Arc<dyn ValueGenerator>,
    environment: EnvMap,
    options: RunOptions,
    observer: Arc<dyn RunObserver>,
}

impl Runner {
    pub fn new(executor: HttpExecutor) -> Self {
        Self {
            executor,
            generator: Arc::new(RandomGenerator),
            environment: EnvMap::new(),
            options: RunOptions::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Executor, variables and response directory from a built environment.
    pub fn from_environment(environment: &EnvironmentContext) -> Result<Self> {
        let executor = HttpExecutor::new(environment.executor_options())?;
        Ok(Self::new(executor)
            .with_environment(environment.variables.clone())
            .with_options(RunOptions {
                response_dir: environment.response_output_dir.clone(),
                ..RunOptions::default()
            }))
    }

    pub fn with_generator(mut self, generator: Arc<dyn ValueGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_environment(mut self, environment: EnvMap) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn selected_groups<'s>(&self, suites: &'s [Suite]) -> Vec<(&'s Suite, &'s Group)> {
        suites
            .iter()
            .flat_map(|suite| suite.groups.iter().map(move |group| (suite, group)))
            .filter(|(_, group)| {
                self.options.group_filter.is_empty()
                    || self.options.group_filter.iter().any(|name| name == &group.name)
            })
            .collect()
    }

    pub async fn run(&self, suites: &[Suite]) -> RunReport {
        let mut report = RunReport::begin();
        let selected = self.selected_groups(suites);
        info!(
            groups = selected.len(),
            jobs = self.options.jobs,
            "starting run"
        );

        let ctx = RunContext {
            executor: &self.executor,
            generator: self.generator.as_ref(),
            environment: &self.environment,
            response_dir: self.options.response_dir.as_deref(),
            observer: self.observer.as_ref(),
        };

        let groups: Vec<GroupReport> = stream::iter(selected)
            .map(|(suite, group)| run_group(&ctx, &suite.name, group))
            .buffered(self.options.jobs.max(1))
            .collect()
            .await;

        for group in groups {
            report.push(group);
        }
        let report = report.finish();
        info!(
            total = report.summary.total,
            passed = report.summary.passed,
            failed = report.summary.failed,
            errored = report.summary.errored,
            "run finished"
        );
        report
    }
}
