use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;

use crate::context::LaneContext;
use crate::error::{Error, Result};
use crate::log_status;
use crate::value::{coerce, ParamType, ParamValue};

/// Default for a parameter: either a fixed value, or a small computation
/// over the shared context evaluated at resolution time - not at lane start -
/// so it observes state written by earlier actions in the same run.
///
/// A dynamic default may read context keys set by earlier *actions*, but not
/// other parameters of the same set. Intra-set dependency cycles are not
/// checked at runtime; keep dynamic defaults independent of sibling keys.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Dynamic(Arc<dyn Fn(&LaneContext) -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn dynamic(f: impl Fn(&LaneContext) -> Value + Send + Sync + 'static) -> Self {
        DefaultValue::Dynamic(Arc::new(f))
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => write!(f, "Static({})", v),
            DefaultValue::Dynamic(_) => write!(f, "Dynamic(..)"),
        }
    }
}

/// Validation rule applied after coercion. Failing it is a resolution
/// error, never a runtime error inside the action.
#[derive(Clone)]
pub enum Validation {
    /// Arbitrary check; return Err with a problem description to reject.
    Predicate(Arc<dyn Fn(&ParamValue) -> std::result::Result<(), String> + Send + Sync>),
    /// String values must match the pattern.
    Matches(Regex),
    /// Value must be one of the listed values.
    OneOf(Vec<Value>),
}

impl Validation {
    pub fn predicate(
        f: impl Fn(&ParamValue) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Validation::Predicate(Arc::new(f))
    }

    fn check(&self, value: &ParamValue) -> std::result::Result<(), String> {
        match self {
            Validation::Predicate(f) => f(value),
            Validation::Matches(pattern) => match value.as_str() {
                Some(s) if pattern.is_match(s) => Ok(()),
                Some(_) => Err(format!("Value does not match pattern '{}'", pattern)),
                None => Err("Pattern validation requires a string value".to_string()),
            },
            Validation::OneOf(allowed) => match value.as_value() {
                Some(v) if allowed.contains(v) => Ok(()),
                _ => Err(format!(
                    "Value must be one of: {}",
                    allowed
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
            },
        }
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Predicate(_) => write!(f, "Predicate(..)"),
            Validation::Matches(p) => write!(f, "Matches({})", p),
            Validation::OneOf(values) => write!(f, "OneOf({:?})", values),
        }
    }
}

/// Declares one named input of an action: type, sources, validation.
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub key: String,
    pub param_type: ParamType,
    pub description: Option<String>,
    pub env_name: Option<String>,
    pub default: Option<DefaultValue>,
    pub optional: bool,
    pub sensitive: bool,
    pub validation: Option<Validation>,
    pub conflicts_with: Vec<String>,
    pub deprecated: Option<String>,
}

impl ParamDescriptor {
    pub fn new(key: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            key: key.into(),
            param_type,
            description: None,
            env_name: None,
            default: None,
            optional: false,
            sensitive: false,
            validation: None,
            conflicts_with: Vec::new(),
            deprecated: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Environment variable consulted when no explicit value is given,
    /// before falling back to the default.
    pub fn env_name(mut self, name: impl Into<String>) -> Self {
        self.env_name = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Static(value));
        self
    }

    pub fn dynamic_default(
        mut self,
        f: impl Fn(&LaneContext) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.default = Some(DefaultValue::dynamic(f));
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Never log or render this parameter's value verbatim.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn validation(mut self, rule: Validation) -> Self {
        self.validation = Some(rule);
        self
    }

    pub fn conflicts_with(mut self, keys: &[&str]) -> Self {
        self.conflicts_with = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn deprecated(mut self, note: impl Into<String>) -> Self {
        self.deprecated = Some(note.into());
        self
    }

    /// The value rendering allowed in error details: None when sensitive.
    fn loggable(&self, value: &ParamValue) -> Option<String> {
        if self.sensitive {
            None
        } else {
            Some(value.rendered())
        }
    }

    pub(crate) fn validate(&self, value: &ParamValue) -> Result<()> {
        if let Some(rule) = &self.validation {
            if let Err(problem) = rule.check(value) {
                return Err(Error::params_invalid(
                    &self.key,
                    self.loggable(value),
                    problem,
                ));
            }
        }
        Ok(())
    }

    /// Resolve this descriptor against a raw value and the shared context.
    ///
    /// Source order: explicit value, then environment variable, then default
    /// (dynamic defaults see the context as it is *now*), then the required
    /// check. Explicit and environment values are coerced to the declared
    /// type and validated; defaults are returned as-is.
    pub fn resolve(
        &self,
        raw_value: Option<ParamValue>,
        context: &LaneContext,
    ) -> Result<Option<ParamValue>> {
        if let Some(raw) = raw_value {
            if !raw.is_null() {
                if let Some(note) = &self.deprecated {
                    log_status!("params", "Option '{}' is deprecated: {}", self.key, note);
                }
                let value = coerce(raw, self.param_type, &self.key)?;
                self.validate(&value)?;
                return Ok(Some(value));
            }
        }

        if let Some(env_name) = &self.env_name {
            if let Ok(raw) = std::env::var(env_name) {
                // The value itself is never logged; it may be sensitive.
                log_status!(
                    "params",
                    "Taking value for '{}' from environment variable '{}'",
                    self.key,
                    env_name
                );
                let value = coerce(ParamValue::from(raw), self.param_type, &self.key)?;
                self.validate(&value)?;
                return Ok(Some(value));
            }
        }

        match &self.default {
            Some(DefaultValue::Static(v)) => return Ok(Some(ParamValue::Data(v.clone()))),
            Some(DefaultValue::Dynamic(f)) => {
                // A dynamic default that finds nothing yields Null; that
                // counts as no value at all, so the required check below
                // still applies and conflict checks never see the key.
                let v = f(context);
                if !v.is_null() {
                    return Ok(Some(ParamValue::Data(v)));
                }
            }
            None => {}
        }

        if !self.optional {
            return Err(Error::params_missing(&self.key));
        }

        Ok(None)
    }
}

/// Checks a declared descriptor set for programmer mistakes: duplicate keys
/// and static defaults that fail their own validation rule. Run once per
/// action at registration time.
pub fn check_declared(descriptors: &[ParamDescriptor]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for descriptor in descriptors {
        if !seen.insert(descriptor.key.as_str()) {
            return Err(Error::config_invalid_descriptor(
                &descriptor.key,
                "Multiple descriptors declared for the same key",
            ));
        }

        if let Some(DefaultValue::Static(default)) = &descriptor.default {
            let value = coerce(
                ParamValue::Data(default.clone()),
                descriptor.param_type,
                &descriptor.key,
            )
            .map_err(|_| {
                Error::config_invalid_descriptor(
                    &descriptor.key,
                    "Default value does not match the declared type",
                )
            })?;
            descriptor.validate(&value).map_err(|_| {
                Error::config_invalid_descriptor(
                    &descriptor.key,
                    "Default value fails the descriptor's own validation",
                )
            })?;
        }
    }
    Ok(())
}
