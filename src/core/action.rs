use serde::Serialize;
use serde_json::Value;

use crate::context::LaneContext;
use crate::descriptor::ParamDescriptor;
use crate::error::Result;
use crate::executor::{self, ToolCommand, ToolOptions};
use crate::params::{ArgsKind, ParamSet, RawArgs};
use crate::platform::Platform;
use crate::runner::Runner;

/// A context key an action documents writing during `run`. Advisory
/// metadata for help output and audits; the runner never enforces that the
/// key was actually written.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSpec {
    pub key: String,
    pub description: String,
}

impl OutputSpec {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

/// One named, independently invocable unit of work.
///
/// Implemented by concrete actions and, uniformly, by delegation records in
/// the registry. `run` receives the validated parameter store for this
/// invocation plus an environment handle for context access, re-entrant
/// invocation and shelling out.
pub trait Action: Send + Sync {
    /// Canonical snake_case invocation name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn details(&self) -> Option<&str> {
        None
    }

    /// Declared inputs. Checked for programmer mistakes at registration.
    fn available_options(&self) -> Vec<ParamDescriptor> {
        Vec::new()
    }

    fn args_kind(&self) -> ArgsKind {
        ArgsKind::Named
    }

    /// Context keys this action documents writing. Advisory only.
    fn output(&self) -> Vec<OutputSpec> {
        Vec::new()
    }

    fn is_supported(&self, _platform: &Platform) -> bool {
        true
    }

    fn run(&self, params: &mut ParamSet, env: &mut ActionEnv<'_>) -> Result<Value>;
}

/// What a running action sees of the engine: the shared context, the
/// current platform, re-entrant invocation of other actions through the
/// same runner and context, and the external-process collaborator.
pub struct ActionEnv<'a> {
    runner: &'a Runner,
    pub context: &'a mut LaneContext,
}

impl<'a> ActionEnv<'a> {
    pub(crate) fn new(runner: &'a Runner, context: &'a mut LaneContext) -> Self {
        Self { runner, context }
    }

    pub fn platform(&self) -> &Platform {
        self.runner.platform()
    }

    /// Invoke another action by name, sharing this invocation's context.
    /// Ordinary, unrestricted recursive composition - the callee goes
    /// through the full resolve/validate/execute path.
    pub fn invoke(&mut self, name: &str, args: RawArgs) -> Result<Value> {
        self.runner.invoke(name, args, self.context)
    }

    /// Shell out through the external-process collaborator.
    pub fn run_external(&self, command: &ToolCommand, options: &ToolOptions) -> Result<String> {
        executor::run_external(command, options)
    }
}
