use std::collections::BTreeMap;

use serde_json::Value;

use crate::context::LaneContext;
use crate::descriptor::{check_declared, ParamDescriptor};
use crate::error::{Error, Result};
use crate::value::{coerce, ParamValue};

/// How an action receives its arguments. Most actions take named keys; a
/// minority take a bare ordered list instead. Positional is a deliberate
/// variant, not an escape hatch from unknown-key checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgsKind {
    Named,
    Positional,
}

/// Raw arguments as supplied by the caller, before resolution.
#[derive(Debug, Clone, Default)]
pub enum RawArgs {
    #[default]
    Empty,
    Named(BTreeMap<String, ParamValue>),
    Positional(Vec<ParamValue>),
}

impl RawArgs {
    pub fn named<K: Into<String>, V: Into<ParamValue>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        RawArgs::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn positional<V: Into<ParamValue>>(values: impl IntoIterator<Item = V>) -> Self {
        RawArgs::Positional(values.into_iter().map(|v| v.into()).collect())
    }

    /// Insert or replace a named argument. Used by delegate layers to force
    /// specific keys before handing off to their target.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Result<()> {
        match self {
            RawArgs::Empty => {
                let mut map = BTreeMap::new();
                map.insert(key.into(), value.into());
                *self = RawArgs::Named(map);
                Ok(())
            }
            RawArgs::Named(map) => {
                map.insert(key.into(), value.into());
                Ok(())
            }
            RawArgs::Positional(_) => Err(Error::params_invalid(
                key.into(),
                None,
                "Cannot set a named key on positional arguments",
            )),
        }
    }
}

/// The validated, typed parameter store handed to an action's `run`.
///
/// Built fresh per invocation. The set of declared keys is fixed after
/// construction, but values may be mutated via `set` (re-validated) so an
/// action can adjust a parameter before delegating. The store belongs to
/// the invocation, not to any one action.
#[derive(Debug)]
pub enum ParamSet {
    Named(NamedParams),
    Positional(PositionalParams),
}

#[derive(Debug)]
pub struct NamedParams {
    descriptors: Vec<ParamDescriptor>,
    values: BTreeMap<String, ParamValue>,
}

#[derive(Debug)]
pub struct PositionalParams {
    values: Vec<ParamValue>,
}

impl ParamSet {
    /// Resolve raw arguments against an action's declared descriptors.
    ///
    /// Named arguments: unknown keys are rejected (typo protection),
    /// descriptors resolve in declaration order against the current context,
    /// then conflicting pairs are checked. Positional actions skip named-key
    /// resolution entirely and receive the list as given.
    pub fn build(
        descriptors: Vec<ParamDescriptor>,
        raw_args: RawArgs,
        kind: ArgsKind,
        context: &LaneContext,
    ) -> Result<ParamSet> {
        match kind {
            ArgsKind::Positional => {
                let values = match raw_args {
                    RawArgs::Empty => Vec::new(),
                    RawArgs::Positional(values) => values,
                    RawArgs::Named(map) if map.is_empty() => Vec::new(),
                    RawArgs::Named(_) => {
                        return Err(Error::params_invalid(
                            "arguments",
                            None,
                            "This action takes a positional argument list, not named keys",
                        ));
                    }
                };
                Ok(ParamSet::Positional(PositionalParams { values }))
            }
            ArgsKind::Named => {
                let raw = match raw_args {
                    RawArgs::Empty => BTreeMap::new(),
                    RawArgs::Named(map) => map,
                    RawArgs::Positional(_) => {
                        return Err(Error::params_invalid(
                            "arguments",
                            None,
                            "This action takes named keys, not a positional argument list",
                        ));
                    }
                };
                NamedParams::build(descriptors, raw, context).map(ParamSet::Named)
            }
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<&ParamValue>> {
        match self {
            ParamSet::Named(params) => params.get(key),
            ParamSet::Positional(_) => Err(Error::params_unknown(key, Vec::new())
                .with_hint("This action takes positional arguments; use positional()")),
        }
    }

    /// Convenience accessor for a required value the action knows resolved.
    pub fn require(&self, key: &str) -> Result<&ParamValue> {
        self.get(key)?
            .ok_or_else(|| Error::params_missing(key))
    }

    pub fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self.get(key)?.and_then(|v| v.as_bool()))
    }

    pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
        Ok(self.get(key)?.and_then(|v| v.as_i64()))
    }

    /// Overwrite a declared key, e.g. before delegating. The new value is
    /// coerced and validated against the key's descriptor.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> Result<()> {
        match self {
            ParamSet::Named(params) => params.set(key, value.into()),
            ParamSet::Positional(_) => Err(Error::params_unknown(key, Vec::new())),
        }
    }

    /// Iterate resolved key/value pairs, for generic tooling such as help
    /// generation. Positional sets yield nothing.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        match self {
            ParamSet::Named(params) => {
                Box::new(params.values.iter().map(|(k, v)| (k.as_str(), v)))
                    as Box<dyn Iterator<Item = (&str, &ParamValue)>>
            }
            ParamSet::Positional(_) => Box::new(std::iter::empty()),
        }
    }

    /// The ordered argument list of a positional action.
    pub fn positional(&self) -> Result<&[ParamValue]> {
        match self {
            ParamSet::Positional(params) => Ok(&params.values),
            ParamSet::Named(_) => Err(Error::params_invalid(
                "arguments",
                None,
                "This action takes named keys; use get()",
            )),
        }
    }

    /// Render the set with sensitive values replaced. The only rendering
    /// that should ever reach logs or error text.
    pub fn to_redacted_json(&self) -> Value {
        match self {
            ParamSet::Named(params) => {
                let map: serde_json::Map<String, Value> = params
                    .values
                    .iter()
                    .map(|(k, v)| {
                        if params.is_sensitive(k) {
                            (k.clone(), Value::String("[REDACTED]".to_string()))
                        } else {
                            (
                                k.clone(),
                                v.as_value()
                                    .cloned()
                                    .unwrap_or_else(|| Value::String("<callback>".to_string())),
                            )
                        }
                    })
                    .collect();
                Value::Object(map)
            }
            ParamSet::Positional(params) => Value::Array(
                params
                    .values
                    .iter()
                    .map(|v| {
                        v.as_value()
                            .cloned()
                            .unwrap_or_else(|| Value::String("<callback>".to_string()))
                    })
                    .collect(),
            ),
        }
    }
}

impl std::fmt::Display for ParamSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_redacted_json())
    }
}

// Equality compares resolved values only (descriptors carry closures).
// Used to verify that resolution is idempotent.
impl PartialEq for ParamSet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamSet::Named(a), ParamSet::Named(b)) => a.values == b.values,
            (ParamSet::Positional(a), ParamSet::Positional(b)) => a.values == b.values,
            _ => false,
        }
    }
}

impl NamedParams {
    fn build(
        descriptors: Vec<ParamDescriptor>,
        mut raw: BTreeMap<String, ParamValue>,
        context: &LaneContext,
    ) -> Result<NamedParams> {
        check_declared(&descriptors)?;

        // Typo protection: every supplied key must be declared.
        for key in raw.keys() {
            if !descriptors.iter().any(|d| &d.key == key) {
                let available = descriptors.iter().map(|d| d.key.clone()).collect();
                return Err(Error::params_unknown(key, available));
            }
        }

        // Declaration order matters: a later dynamic default may depend on
        // context state, and actions rely on stable resolution order.
        let mut values = BTreeMap::new();
        for descriptor in &descriptors {
            let supplied = raw.remove(&descriptor.key);
            if let Some(value) = descriptor.resolve(supplied, context)? {
                values.insert(descriptor.key.clone(), value);
            }
        }

        let params = NamedParams {
            descriptors,
            values,
        };
        params.check_conflicts()?;
        Ok(params)
    }

    fn check_conflicts(&self) -> Result<()> {
        for descriptor in &self.descriptors {
            if !self.values.contains_key(&descriptor.key) {
                continue;
            }
            for other in &descriptor.conflicts_with {
                if self.values.contains_key(other) {
                    return Err(Error::params_conflict(&descriptor.key, other));
                }
            }
        }
        Ok(())
    }

    fn descriptor_for(&self, key: &str) -> Option<&ParamDescriptor> {
        self.descriptors.iter().find(|d| d.key == key)
    }

    fn is_sensitive(&self, key: &str) -> bool {
        self.descriptor_for(key).map(|d| d.sensitive).unwrap_or(false)
    }

    fn get(&self, key: &str) -> Result<Option<&ParamValue>> {
        if self.descriptor_for(key).is_none() {
            let available = self.descriptors.iter().map(|d| d.key.clone()).collect();
            return Err(Error::params_unknown(key, available));
        }
        Ok(self.values.get(key))
    }

    fn set(&mut self, key: &str, value: ParamValue) -> Result<()> {
        let descriptor = match self.descriptor_for(key) {
            Some(d) => d.clone(),
            None => {
                let available = self.descriptors.iter().map(|d| d.key.clone()).collect();
                return Err(Error::params_unknown(key, available));
            }
        };
        // Same coerce-then-validate path as initial resolution.
        let value = coerce(value, descriptor.param_type, key)?;
        descriptor.validate(&value)?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}
