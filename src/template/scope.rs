use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    env::{lookup_env, EnvMap},
    matcher::FieldPath,
    store::VariableStore,
};

pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// `env.NAME` reads configured variables, then the process environment.
impl Lookup for EnvMap {
    fn lookup(&self, name: &str) -> Option<Value> {
        match name.strip_prefix("env.") {
            Some(env_name) => lookup_env(env_name, self).map(Value::String),
            None => self.get(name).cloned().map(Value::String),
        }
    }
}

/// Resolution context of one scenario: captured values first, then group
/// fixtures, then configured variables. Dotted names walk into values, so
/// `movie.id` reads the `id` field of a captured `movie` object.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    store: &'a VariableStore,
    fixtures: &'a BTreeMap<String, Value>,
    environment: &'a EnvMap,
}

impl<'a> Scope<'a> {
    pub fn new(
        store: &'a VariableStore,
        fixtures: &'a BTreeMap<String, Value>,
        environment: &'a EnvMap,
    ) -> Self {
        Self {
            store,
            fixtures,
            environment,
        }
    }

    fn direct(&self, name: &str) -> Option<Value> {
        self.store
            .lookup(name)
            .or_else(|| self.fixtures.get(name))
            .cloned()
            .or_else(|| self.environment.get(name).cloned().map(Value::String))
    }
}

impl Lookup for Scope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if name.starts_with("env.") {
            return self.environment.lookup(name);
        }
        if let Some(value) = self.direct(name) {
            return Some(value);
        }

        let path = FieldPath::parse(name).ok()?;
        let (root, rest) = path.split_first()?;
        let base = self.direct(root)?;
        rest.lookup(&base).ok().cloned()
    }
}
