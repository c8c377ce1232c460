use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
    time::Instant,
};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    env::EnvMap,
    executor::{create_preview, write_exchange, HttpExecutor},
    generator::ValueGenerator,
    matcher::{extract_captures, match_envelope},
    report::{ErrorCause, GroupReport, Outcome, RequestSummary, ScenarioResult},
    scenario::{Fixture, Group, ResolveError, Scenario},
    store::VariableStore,
    template::{self, Scope},
};

use super::{
    plan::{plan_group, ScenarioPlan},
    state::{ScenarioState, StateMachine},
    RunObserver,
};

const PREVIEW_LIMIT: usize = 512;

pub(crate) struct RunContext<'a> {
    pub executor: &'a HttpExecutor,
    pub generator: &'a dyn ValueGenerator,
    pub environment: &'a EnvMap,
    pub response_dir: Option<&'a Path>,
    pub observer: &'a dyn RunObserver,
}

/// Runs one group in declared order with a fresh variable store.
pub(crate) async fn run_group(ctx: &RunContext<'_>, suite: &str, group: &Group) -> GroupReport {
    ctx.observer.group_started(suite, group);
    let started = Instant::now();
    let mut results = Vec::with_capacity(group.scenarios.len());

    match build_fixtures(group, ctx.generator, ctx.environment) {
        Ok(fixtures) => {
            let plans = plan_group(group);
            let mut store = VariableStore::new();
            let mut outcomes: HashMap<&str, Outcome> = HashMap::new();

            for (scenario, plan) in group.scenarios.iter().zip(&plans) {
                let result = match blocked_by(plan, &outcomes) {
                    Some(cause) => {
                        let mut machine = StateMachine::new(&group.name, &scenario.id);
                        machine.advance(ScenarioState::Errored);
                        errored(group, scenario, cause, 0.0, None)
                    }
                    None => {
                        run_scenario(ctx, suite, group, scenario, &fixtures, &mut store).await
                    }
                };
                outcomes.insert(scenario.id.as_str(), result.outcome);
                finish(ctx, result, &mut results);
            }
        }
        Err(err) => {
            warn!(group = %group.name, error = %err, "fixtures could not be built");
            let cause = cause_from_resolve(&err);
            for scenario in &group.scenarios {
                let result = errored(group, scenario, cause.clone(), 0.0, None);
                finish(ctx, result, &mut results);
            }
        }
    }

    let report = GroupReport {
        suite: suite.to_string(),
        name: group.name.clone(),
        results,
        duration_ms: started.elapsed().as_secs_f64() * 1000.0,
    };
    ctx.observer.group_finished(&report);
    report
}

fn finish(ctx: &RunContext<'_>, result: ScenarioResult, results: &mut Vec<ScenarioResult>) {
    info!(
        group = %result.group,
        scenario = %result.scenario_id,
        outcome = result.outcome.as_str(),
        duration_ms = result.duration_ms,
        "scenario finished"
    );
    ctx.observer.scenario_finished(&result);
    results.push(result);
}

/// Generated values first, then literals rendered against them and the
/// environment.
fn build_fixtures(
    group: &Group,
    generator: &dyn ValueGenerator,
    environment: &EnvMap,
) -> Result<BTreeMap<String, Value>, ResolveError> {
    let mut values = BTreeMap::new();
    for (name, fixture) in &group.fixtures {
        if let Fixture::Generated(generated) = fixture {
            values.insert(name.clone(), generator.generate(generated.generate));
        }
    }

    let empty = VariableStore::new();
    let mut literals = BTreeMap::new();
    {
        let scope = Scope::new(&empty, &values, environment);
        for (name, fixture) in &group.fixtures {
            if let Fixture::Literal(value) = fixture {
                let rendered =
                    template::render_value(value, &scope).map_err(|source| ResolveError {
                        field: format!("fixture `{name}`"),
                        source,
                    })?;
                literals.insert(name.clone(), rendered);
            }
        }
    }
    values.extend(literals);
    Ok(values)
}

fn blocked_by(plan: &ScenarioPlan, outcomes: &HashMap<&str, Outcome>) -> Option<ErrorCause> {
    plan.upstream().find_map(|upstream| {
        let reason = match outcomes.get(upstream) {
            Some(Outcome::Pass) => return None,
            Some(Outcome::Fail) => "failed",
            Some(Outcome::Error) => "errored",
            None => "did not run",
        };
        Some(ErrorCause::Propagated {
            upstream: upstream.to_string(),
            reason: reason.to_string(),
        })
    })
}

async fn run_scenario(
    ctx: &RunContext<'_>,
    suite: &str,
    group: &Group,
    scenario: &Scenario,
    fixtures: &BTreeMap<String, Value>,
    store: &mut VariableStore,
) -> ScenarioResult {
    let started = Instant::now();
    let elapsed = |started: Instant| started.elapsed().as_secs_f64() * 1000.0;
    let mut machine = StateMachine::new(&group.name, &scenario.id);

    machine.advance(ScenarioState::Resolving);
    let resolved = {
        let scope = Scope::new(store, fixtures, ctx.environment);
        scenario.resolve(&scope)
    };
    let resolved = match resolved {
        Ok(resolved) => resolved,
        Err(err) => {
            machine.advance(ScenarioState::Errored);
            return errored(group, scenario, cause_from_resolve(&err), elapsed(started), None);
        }
    };

    let request = RequestSummary {
        method: resolved.request.method.to_string(),
        url: ctx
            .executor
            .resolve_url(&resolved.request.url)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| resolved.request.url.clone()),
    };

    machine.advance(ScenarioState::Executing);
    let envelope = match ctx.executor.execute(&resolved.request).await {
        Ok(envelope) => envelope,
        Err(err) => {
            machine.advance(ScenarioState::Errored);
            let cause = ErrorCause::Transport {
                message: err.to_string(),
                timeout: err.is_timeout(),
            };
            return errored(group, scenario, cause, elapsed(started), Some(request));
        }
    };

    let exchange_path = ctx.response_dir.and_then(|dir| {
        let written = write_exchange(
            dir,
            suite,
            &group.name,
            &scenario.id,
            &resolved.request,
            &envelope,
        );
        match written {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(scenario = %scenario.id, error = %err, "could not save exchange");
                None
            }
        }
    });

    machine.advance(ScenarioState::Matching);
    let mut failures = match_envelope(&envelope, &resolved.expect).failures;
    if failures.is_empty() {
        match extract_captures(envelope.body(), &resolved.capture) {
            Ok(values) => {
                for (name, value) in values {
                    store.set(name, value);
                }
                debug!(scenario = %scenario.id, store = ?store.snapshot(), "captured values");
            }
            Err(capture_failures) => failures = capture_failures,
        }
    }

    let outcome = if failures.is_empty() {
        Outcome::Pass
    } else {
        Outcome::Fail
    };
    machine.advance(ScenarioState::Completed(outcome));

    let response_preview = match (outcome, envelope.body()) {
        (Outcome::Pass, _) | (_, Value::Null) => None,
        (_, Value::String(text)) => Some(create_preview(text.as_bytes(), PREVIEW_LIMIT)),
        (_, body) => Some(create_preview(body.to_string().as_bytes(), PREVIEW_LIMIT)),
    };

    ScenarioResult {
        scenario_id: scenario.id.clone(),
        group: group.name.clone(),
        description: scenario.description.clone(),
        outcome,
        failed_assertions: failures,
        error: None,
        duration_ms: elapsed(started),
        request: Some(request),
        status: Some(envelope.status()),
        response_preview,
        exchange_path,
    }
}

fn errored(
    group: &Group,
    scenario: &Scenario,
    cause: ErrorCause,
    duration_ms: f64,
    request: Option<RequestSummary>,
) -> ScenarioResult {
    ScenarioResult {
        scenario_id: scenario.id.clone(),
        group: group.name.clone(),
        description: scenario.description.clone(),
        outcome: Outcome::Error,
        failed_assertions: Vec::new(),
        error: Some(cause),
        duration_ms,
        request,
        status: None,
        response_preview: None,
        exchange_path: None,
    }
}

fn cause_from_resolve(err: &ResolveError) -> ErrorCause {
    match err.unresolved_variable() {
        Some(variable) => ErrorCause::UnresolvedVariable {
            field: err.field.clone(),
            variable: variable.to_string(),
        },
        None => ErrorCause::InvalidTemplate {
            field: err.field.clone(),
            message: err.source.to_string(),
        },
    }
}
