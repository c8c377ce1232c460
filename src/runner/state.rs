use std::fmt;

use tracing::debug;

use crate::report::Outcome;

/// Lifecycle of a single scenario inside its group run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Pending,
    Resolving,
    Executing,
    Matching,
    Completed(Outcome),
    Errored,
}

impl ScenarioState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScenarioState::Completed(_) | ScenarioState::Errored)
    }

    /// Errored is reachable from every non-terminal state; everything else
    /// only moves forward one step.
    pub fn can_advance_to(&self, next: ScenarioState) -> bool {
        use ScenarioState::*;
        match (self, next) {
            (current, Errored) => !current.is_terminal(),
            (Pending, Resolving) | (Resolving, Executing) | (Executing, Matching) => true,
            (Matching, Completed(Outcome::Pass | Outcome::Fail)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioState::Pending => f.write_str("pending"),
            ScenarioState::Resolving => f.write_str("resolving"),
            ScenarioState::Executing => f.write_str("executing"),
            ScenarioState::Matching => f.write_str("matching"),
            ScenarioState::Completed(outcome) => write!(f, "completed({})", outcome.as_str()),
            ScenarioState::Errored => f.write_str("errored"),
        }
    }
}

pub(crate) struct StateMachine<'a> {
    group: &'a str,
    scenario: &'a str,
    state: ScenarioState,
}

impl<'a> StateMachine<'a> {
    pub(crate) fn new(group: &'a str, scenario: &'a str) -> Self {
        Self {
            group,
            scenario,
            state: ScenarioState::Pending,
        }
    }

    pub(crate) fn state(&self) -> ScenarioState {
        self.state
    }

    pub(crate) fn advance(&mut self, next: ScenarioState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(
            group = self.group,
            scenario = self.scenario,
            from = %self.state,
            to = %next,
            "scenario transition"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_moves_forward() {
        let mut machine = StateMachine::new("auth", "login");
        for next in [
            ScenarioState::Resolving,
            ScenarioState::Executing,
            ScenarioState::Matching,
            ScenarioState::Completed(Outcome::Pass),
        ] {
            machine.advance(next);
        }
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn errored_only_from_live_states() {
        assert!(ScenarioState::Pending.can_advance_to(ScenarioState::Errored));
        assert!(ScenarioState::Executing.can_advance_to(ScenarioState::Errored));
        assert!(!ScenarioState::Errored.can_advance_to(ScenarioState::Errored));
        assert!(!ScenarioState::Completed(Outcome::Fail).can_advance_to(ScenarioState::Errored));
    }

    #[test]
    fn skipping_steps_is_rejected() {
        assert!(!ScenarioState::Pending.can_advance_to(ScenarioState::Executing));
        assert!(!ScenarioState::Resolving.can_advance_to(ScenarioState::Completed(Outcome::Pass)));
        assert!(!ScenarioState::Matching.can_advance_to(ScenarioState::Completed(Outcome::Error)));
    }
}
