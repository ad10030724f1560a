use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::action::Action;
use crate::descriptor::check_declared;
use crate::error::{Error, Result};
use crate::value::ParamValue;

/// Transform applied to a delegate's return value on the way back out.
pub type ResultTransform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A behavioral specialization: invoke `target` with specific keys forced,
/// optionally post-processing the result. The explicit record replaces the
/// subclass-forwarding idiom - chains stay introspectable and cycle
/// detection stays trivial.
#[derive(Clone)]
pub struct DelegateSpec {
    pub name: String,
    pub target: String,
    /// Keys injected into the raw arguments before handing off. An override
    /// replaces whatever the caller supplied for that key.
    pub overrides: BTreeMap<String, ParamValue>,
    pub result_transform: Option<ResultTransform>,
    pub description: Option<String>,
}

impl DelegateSpec {
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            overrides: BTreeMap::new(),
            result_transform: None,
            description: None,
        }
    }

    pub fn override_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn result_transform(mut self, f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.result_transform = Some(Arc::new(f));
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

impl fmt::Debug for DelegateSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateSpec")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("overrides", &self.overrides)
            .field(
                "result_transform",
                &self.result_transform.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

enum Registration {
    Concrete(Arc<dyn Action>),
    /// Pure rename, no behavior change.
    Alias {
        target: String,
    },
    Delegate(Arc<DelegateSpec>),
}

/// A fully resolved invocation name: the ordered delegate hops traversed
/// (outermost first) and the terminal concrete action. The runner invokes
/// *through* the chain so every layer's overrides apply.
pub struct ResolvedAction {
    pub chain: Vec<Arc<DelegateSpec>>,
    pub action: Arc<dyn Action>,
}

impl std::fmt::Debug for ResolvedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedAction")
            .field("chain_len", &self.chain.len())
            .finish_non_exhaustive()
    }
}

/// Maps invocation names - including aliases and delegation records - to
/// action implementations.
#[derive(Default)]
pub struct ActionRegistry {
    entries: BTreeMap<String, Registration>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a concrete action under its canonical name. The action's
    /// declared descriptors are checked here so a malformed set fails at
    /// startup, not mid-lane.
    pub fn register(&mut self, action: Arc<dyn Action>) -> Result<()> {
        check_declared(&action.available_options())?;
        let name = action.name().to_string();
        self.insert(name, Registration::Concrete(action))
    }

    /// Register a pure rename for an existing (or later-registered) name.
    pub fn register_alias(
        &mut self,
        alias: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<()> {
        self.insert(
            alias.into(),
            Registration::Alias {
                target: target.into(),
            },
        )
    }

    /// Register a behavioral specialization of another action.
    pub fn register_delegate(&mut self, spec: DelegateSpec) -> Result<()> {
        let name = spec.name.clone();
        self.insert(name, Registration::Delegate(Arc::new(spec)))
    }

    fn insert(&mut self, name: String, registration: Registration) -> Result<()> {
        if self.entries.contains_key(&name) {
            return Err(Error::duplicate_name(name));
        }
        self.entries.insert(name, registration);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Follow alias and delegate links from `name` to the terminal concrete
    /// action. Dangling targets and cycles fail fast here, with the visited
    /// chain in the error details.
    pub fn resolve(&self, name: &str) -> Result<ResolvedAction> {
        let mut visited: Vec<String> = Vec::new();
        let mut chain: Vec<Arc<DelegateSpec>> = Vec::new();
        let mut current = name.to_string();

        loop {
            if visited.iter().any(|seen| seen == &current) {
                visited.push(current);
                return Err(Error::delegate_cycle(visited));
            }
            visited.push(current.clone());

            match self.entries.get(&current) {
                None => {
                    let mut err = Error::action_not_found(&current);
                    if current != name {
                        err = err.with_hint(format!(
                            "Reached while resolving '{}' through {}",
                            name,
                            visited.join(" -> ")
                        ));
                    }
                    return Err(err);
                }
                Some(Registration::Concrete(action)) => {
                    return Ok(ResolvedAction {
                        chain,
                        action: Arc::clone(action),
                    });
                }
                Some(Registration::Alias { target }) => {
                    current = target.clone();
                }
                Some(Registration::Delegate(spec)) => {
                    chain.push(Arc::clone(spec));
                    current = spec.target.clone();
                }
            }
        }
    }
}
