use std::fmt;

use serde::Serialize;

use crate::scenario::Group;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "variable")]
pub enum DependencyReason {
    /// Listed in `dependsOn`.
    Declared,
    /// The upstream scenario captures a variable this one reads.
    Captures(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub scenario: String,
    pub reason: DependencyReason,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            DependencyReason::Declared => write!(f, "{} (dependsOn)", self.scenario),
            DependencyReason::Captures(variable) => {
                write!(f, "{} (captures `{}`)", self.scenario, variable)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPlan {
    pub id: String,
    pub depends_on: Vec<Dependency>,
}

/// Dependency edges of every scenario in declared order. Implicit edges point
/// at the latest earlier scenario capturing a referenced root variable.
pub fn plan_group(group: &Group) -> Vec<ScenarioPlan> {
    let mut plans = Vec::with_capacity(group.scenarios.len());

    for (index, scenario) in group.scenarios.iter().enumerate() {
        let mut depends_on: Vec<Dependency> = Vec::new();
        for upstream in &scenario.depends_on {
            if !depends_on.iter().any(|dep| &dep.scenario == upstream) {
                depends_on.push(Dependency {
                    scenario: upstream.clone(),
                    reason: DependencyReason::Declared,
                });
            }
        }

        let required = scenario.required_variables().unwrap_or_default();
        for variable in required {
            if variable == "env" {
                continue;
            }
            let producer = group.scenarios[..index]
                .iter()
                .rev()
                .find(|earlier| earlier.captures(&variable));
            if let Some(producer) = producer {
                if !depends_on.iter().any(|dep| dep.scenario == producer.id) {
                    depends_on.push(Dependency {
                        scenario: producer.id.clone(),
                        reason: DependencyReason::Captures(variable),
                    });
                }
            }
        }

        plans.push(ScenarioPlan {
            id: scenario.id.clone(),
            depends_on,
        });
    }

    plans
}

impl ScenarioPlan {
    pub fn upstream(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(|dep| dep.scenario.as_str())
    }
}
