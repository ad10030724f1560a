use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::action::ActionEnv;
use crate::context::{shared_keys, LaneContext};
use crate::error::{Error, Result};
use crate::log_status;
use crate::params::{ParamSet, RawArgs};
use crate::platform::Platform;
use crate::registry::ActionRegistry;

/// Phase of one action invocation. Terminal states are `Completed` and
/// `Failed`; a record left in an earlier state means the process died
/// mid-step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Resolving,
    Validating,
    Executing,
    Completed,
    Failed,
}

/// Audit record for one invocation, including nested ones.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub action: String,
    pub state: InvocationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
}

/// One step of a lane: an action name plus its raw arguments.
#[derive(Debug, Clone, Default)]
pub struct LaneStep {
    pub action: String,
    pub args: RawArgs,
}

impl LaneStep {
    pub fn new(action: impl Into<String>, args: RawArgs) -> Self {
        Self {
            action: action.into(),
            args,
        }
    }
}

/// Outcome of a fully completed lane.
#[derive(Debug)]
pub struct LaneSummary {
    pub lane: String,
    pub platform: Platform,
    pub steps_completed: usize,
    pub context: LaneContext,
}

/// Drives action invocations against a registry for one platform.
///
/// The runner owns the step audit trail; the shared context is owned by the
/// caller (or by `run_lane`) and threaded through every invocation,
/// including re-entrant ones made from inside actions.
pub struct Runner {
    registry: Arc<ActionRegistry>,
    platform: Platform,
    records: Mutex<Vec<StepRecord>>,
}

impl Runner {
    pub fn new(registry: Arc<ActionRegistry>, platform: Platform) -> Self {
        Self {
            registry,
            platform,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Snapshot of every step recorded so far, in invocation order.
    pub fn records(&self) -> Vec<StepRecord> {
        self.lock_records().clone()
    }

    /// Invoke an action by name: resolve it through the registry, gate on
    /// platform support, apply delegate overrides, validate parameters,
    /// execute, then unwind result transforms. Each phase transition is
    /// recorded; the first failing phase aborts the step.
    pub fn invoke(&self, name: &str, args: RawArgs, context: &mut LaneContext) -> Result<Value> {
        let started_at = Utc::now();
        let index = self.push_record(name, started_at);

        let result = self.invoke_inner(name, args, context, index);

        let duration_ms = (Utc::now() - started_at).num_milliseconds();
        match &result {
            Ok(_) => self.finish_record(index, InvocationState::Completed, None, duration_ms),
            Err(e) => self.finish_record(
                index,
                InvocationState::Failed,
                Some(e.message.clone()),
                duration_ms,
            ),
        }
        result
    }

    fn invoke_inner(
        &self,
        name: &str,
        mut args: RawArgs,
        context: &mut LaneContext,
        index: usize,
    ) -> Result<Value> {
        let resolved = self.registry.resolve(name)?;
        let action = resolved.action;

        // Platform gate sits before parameter validation: an action that
        // cannot run here should not get a chance to complain about input.
        if !action.is_supported(&self.platform) {
            return Err(Error::platform_unsupported(name, self.platform.name()));
        }

        // Outermost layer first, so an inner layer's override wins when two
        // layers force the same key.
        for spec in &resolved.chain {
            for (key, value) in &spec.overrides {
                args.insert(key.clone(), value.clone())?;
            }
        }

        self.set_record_state(index, InvocationState::Validating);
        let mut params = ParamSet::build(
            action.available_options(),
            args,
            action.args_kind(),
            context,
        )?;

        self.set_record_state(index, InvocationState::Executing);
        log_status!("runner", "Step: {}", name);

        let mut env = ActionEnv::new(self, context);
        let mut value = action.run(&mut params, &mut env)?;

        // Transforms unwind inside-out, mirroring a call stack.
        for spec in resolved.chain.iter().rev() {
            if let Some(transform) = &spec.result_transform {
                value = transform(value);
            }
        }

        Ok(value)
    }

    /// Run a sequence of steps against a fresh context. The lane and
    /// platform names are published into the context before the first step;
    /// the first failing step aborts the lane.
    pub fn run_lane(&self, lane: &str, steps: &[LaneStep]) -> Result<LaneSummary> {
        let mut context = LaneContext::new();
        context.set(shared_keys::LANE_NAME, Value::String(lane.to_string()));
        context.set(
            shared_keys::PLATFORM_NAME,
            Value::String(self.platform.name().to_string()),
        );

        log_status!("runner", "Driving the lane '{} {}'", self.platform, lane);

        let mut steps_completed = 0;
        for step in steps {
            self.invoke(&step.action, step.args.clone(), &mut context)?;
            steps_completed += 1;
        }

        log_status!("runner", "Lane '{}' finished ({} steps)", lane, steps_completed);

        Ok(LaneSummary {
            lane: lane.to_string(),
            platform: self.platform.clone(),
            steps_completed,
            context,
        })
    }

    fn lock_records(&self) -> std::sync::MutexGuard<'_, Vec<StepRecord>> {
        self.records.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn push_record(&self, action: &str, started_at: DateTime<Utc>) -> usize {
        let mut records = self.lock_records();
        records.push(StepRecord {
            action: action.to_string(),
            state: InvocationState::Resolving,
            error: None,
            started_at,
            duration_ms: 0,
        });
        records.len() - 1
    }

    fn set_record_state(&self, index: usize, state: InvocationState) {
        let mut records = self.lock_records();
        if let Some(record) = records.get_mut(index) {
            record.state = state;
        }
    }

    fn finish_record(
        &self,
        index: usize,
        state: InvocationState,
        error: Option<String>,
        duration_ms: i64,
    ) {
        let mut records = self.lock_records();
        if let Some(record) = records.get_mut(index) {
            record.state = state;
            record.error = error;
            record.duration_ms = duration_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::descriptor::ParamDescriptor;
    use crate::registry::DelegateSpec;
    use crate::value::ParamType;
    use serde_json::json;

    struct BuildApp;

    impl Action for BuildApp {
        fn name(&self) -> &str {
            "build_app"
        }

        fn description(&self) -> &str {
            "builds the app"
        }

        fn available_options(&self) -> Vec<ParamDescriptor> {
            vec![
                ParamDescriptor::new("scheme", ParamType::String),
                ParamDescriptor::new("catalyst_platform", ParamType::String).optional(),
            ]
        }

        fn run(&self, params: &mut ParamSet, env: &mut ActionEnv<'_>) -> Result<Value> {
            let scheme = params.get_string("scheme")?.unwrap_or_default();
            env.context.set("built_scheme", json!(scheme));
            Ok(json!({
                "scheme": scheme,
                "catalyst_platform": params.get_string("catalyst_platform")?,
            }))
        }
    }

    struct MacOnly;

    impl Action for MacOnly {
        fn name(&self) -> &str {
            "notarize"
        }

        fn description(&self) -> &str {
            "mac only"
        }

        fn is_supported(&self, platform: &Platform) -> bool {
            matches!(platform, Platform::Mac)
        }

        fn run(&self, _params: &mut ParamSet, _env: &mut ActionEnv<'_>) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    struct Composite;

    impl Action for Composite {
        fn name(&self) -> &str {
            "release"
        }

        fn description(&self) -> &str {
            "builds via a nested invocation"
        }

        fn run(&self, _params: &mut ParamSet, env: &mut ActionEnv<'_>) -> Result<Value> {
            env.invoke("build_app", RawArgs::named([("scheme", "Nested")]))
        }
    }

    fn runner(platform: Platform) -> Runner {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(BuildApp)).unwrap();
        registry.register(Arc::new(MacOnly)).unwrap();
        registry.register(Arc::new(Composite)).unwrap();
        registry
            .register_delegate(
                DelegateSpec::new("build_ios_app", "build_app")
                    .override_param("catalyst_platform", "ios"),
            )
            .unwrap();
        registry.register_alias("gym", "build_ios_app").unwrap();
        Runner::new(Arc::new(registry), platform)
    }

    #[test]
    fn invoke_runs_and_records_completion() {
        let runner = runner(Platform::Ios);
        let mut ctx = LaneContext::new();

        let value = runner
            .invoke("build_app", RawArgs::named([("scheme", "App")]), &mut ctx)
            .unwrap();
        assert_eq!(value["scheme"], "App");
        assert_eq!(ctx.get("built_scheme"), Some(&json!("App")));

        let records = runner.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "build_app");
        assert_eq!(records[0].state, InvocationState::Completed);
        assert!(records[0].error.is_none());
    }

    #[test]
    fn alias_reaches_the_delegate_overrides() {
        let runner = runner(Platform::Ios);
        let mut ctx = LaneContext::new();

        let value = runner
            .invoke("gym", RawArgs::named([("scheme", "App")]), &mut ctx)
            .unwrap();
        assert_eq!(value["catalyst_platform"], "ios");
    }

    #[test]
    fn override_beats_caller_supplied_value() {
        let runner = runner(Platform::Ios);
        let mut ctx = LaneContext::new();

        let value = runner
            .invoke(
                "build_ios_app",
                RawArgs::named([("scheme", "App"), ("catalyst_platform", "macos")]),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(value["catalyst_platform"], "ios");
    }

    #[test]
    fn inner_delegate_override_wins() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(BuildApp)).unwrap();
        registry
            .register_delegate(
                DelegateSpec::new("inner", "build_app")
                    .override_param("catalyst_platform", "ios"),
            )
            .unwrap();
        registry
            .register_delegate(
                DelegateSpec::new("outer", "inner")
                    .override_param("catalyst_platform", "macos"),
            )
            .unwrap();
        let runner = Runner::new(Arc::new(registry), Platform::Ios);

        let mut ctx = LaneContext::new();
        let value = runner
            .invoke("outer", RawArgs::named([("scheme", "App")]), &mut ctx)
            .unwrap();
        assert_eq!(value["catalyst_platform"], "ios");
    }

    #[test]
    fn result_transforms_unwind_inside_out() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(BuildApp)).unwrap();
        registry
            .register_delegate(
                DelegateSpec::new("inner", "build_app")
                    .result_transform(|v| json!(format!("inner({})", v["scheme"].as_str().unwrap_or("")))),
            )
            .unwrap();
        registry
            .register_delegate(
                DelegateSpec::new("outer", "inner")
                    .result_transform(|v| json!(format!("outer({})", v.as_str().unwrap_or("")))),
            )
            .unwrap();
        let runner = Runner::new(Arc::new(registry), Platform::Ios);

        let mut ctx = LaneContext::new();
        let value = runner
            .invoke("outer", RawArgs::named([("scheme", "App")]), &mut ctx)
            .unwrap();
        assert_eq!(value, json!("outer(inner(App))"));
    }

    #[test]
    fn unsupported_platform_is_gated_before_validation() {
        let runner = runner(Platform::Android);
        let mut ctx = LaneContext::new();

        let err = runner
            .invoke("notarize", RawArgs::Empty, &mut ctx)
            .unwrap_err();
        assert_eq!(err.code.as_str(), "platform.unsupported");
        assert_eq!(err.details["platform"], "android");

        let records = runner.records();
        assert_eq!(records[0].state, InvocationState::Failed);
        assert!(records[0].error.is_some());
    }

    #[test]
    fn nested_invocations_share_context_and_records() {
        let runner = runner(Platform::Ios);
        let mut ctx = LaneContext::new();

        runner.invoke("release", RawArgs::Empty, &mut ctx).unwrap();
        assert_eq!(ctx.get("built_scheme"), Some(&json!("Nested")));

        let actions: Vec<String> = runner.records().iter().map(|r| r.action.clone()).collect();
        assert_eq!(actions, vec!["release", "build_app"]);
    }

    #[test]
    fn validation_failure_marks_the_record() {
        let runner = runner(Platform::Ios);
        let mut ctx = LaneContext::new();

        let err = runner
            .invoke("build_app", RawArgs::Empty, &mut ctx)
            .unwrap_err();
        assert_eq!(err.code.as_str(), "params.missing");
        assert_eq!(runner.records()[0].state, InvocationState::Failed);
    }

    #[test]
    fn run_lane_publishes_shared_keys_and_counts_steps() {
        let runner = runner(Platform::Ios);
        let steps = vec![
            LaneStep::new("build_app", RawArgs::named([("scheme", "App")])),
            LaneStep::new("gym", RawArgs::named([("scheme", "App")])),
        ];

        let summary = runner.run_lane("beta", &steps).unwrap();
        assert_eq!(summary.steps_completed, 2);
        assert_eq!(summary.context.get(shared_keys::LANE_NAME), Some(&json!("beta")));
        assert_eq!(
            summary.context.get(shared_keys::PLATFORM_NAME),
            Some(&json!("ios"))
        );
    }

    #[test]
    fn run_lane_stops_at_the_first_failure() {
        let runner = runner(Platform::Ios);
        let steps = vec![
            LaneStep::new("build_app", RawArgs::named([("scheme", "App")])),
            LaneStep::new("does_not_exist", RawArgs::Empty),
            LaneStep::new("gym", RawArgs::named([("scheme", "App")])),
        ];

        let err = runner.run_lane("beta", &steps).unwrap_err();
        assert_eq!(err.code.as_str(), "registry.action_not_found");

        let records = runner.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].state, InvocationState::Failed);
    }
}
