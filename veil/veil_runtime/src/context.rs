//! The runtime handle.
//!
//! A [`Runtime`] packages every registry the faceted evaluator needs: labels
//! acquired by stable key, registered policies, the path environment and the
//! writer provenance of labels minted by protected writes. Two runtimes never
//! observe each other's labels or policies.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use veil_core::error::Result;
use veil_core::log_event;
use veil_core::utils::{init_logging, LogLevel};
use veil_core::RuntimeConfig;
use veil_facet::{Assignment, Expr, Label, Value};
use veil_policy::{Concretizer, InMemoryPolicyStore, PathEnv, PolicyEntry, PolicyFn, PolicyStore};

/// An explicit runtime context.
pub struct Runtime {
    /// Configuration.
    config: RuntimeConfig,

    /// Labels acquired by stable key.
    labels: DashMap<String, Label>,

    /// The ordered policy registry.
    policies: InMemoryPolicyStore,

    /// Assumptions of the branch currently being explored.
    path: PathEnv,

    /// Writer context of each label minted by a protected write.
    provenance: HashMap<Label, Value>,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Runtime {
    /// Create a runtime with empty registries.
    pub fn new(config: RuntimeConfig) -> Self {
        log_event!(LogLevel::Debug, "Runtime created",
            max_decisions => format!("{:?}", config.solver.max_decisions),
            track_implicit_flows => config.track_implicit_flows,
        );
        Self {
            config,
            labels: DashMap::new(),
            policies: InMemoryPolicyStore::new(),
            path: PathEnv::new(),
            provenance: HashMap::new(),
        }
    }

    /// Install a log subscriber at the configured level, unless one is
    /// already installed, then create a runtime.
    pub fn with_logging(config: RuntimeConfig) -> Self {
        if init_logging(config.logging.level) {
            debug!("Installed log subscriber at level {:?}", config.logging.level);
        }
        Self::new(config)
    }

    /// The configuration this runtime was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Drop every label, policy, path assumption and provenance record.
    ///
    /// Expressions built before the reset stay valid as trees, but the
    /// policies of their labels are gone.
    pub fn reset(&mut self) -> Result<()> {
        self.labels.clear();
        self.path.clear();
        self.provenance.clear();
        self.policies.clear()?;
        log_event!(LogLevel::Debug, "Runtime reset");
        Ok(())
    }

    /// Mint a fresh label.
    pub fn mk_label(&self, name: Option<&str>) -> Label {
        let label = Label::fresh(name);
        trace!("Minted label {}", label);
        label
    }

    /// The label associated with `key`.
    ///
    /// Repeated calls with the same key return the same label object. The
    /// label's identifier is derived from the key, so it is stable across
    /// runtimes and process restarts.
    pub fn label_for_key(&self, key: &str) -> Label {
        self.acquire_label(key).0
    }

    /// Like [`Runtime::label_for_key`], also reporting whether the label was
    /// created by this call.
    pub fn acquire_label(&self, key: &str) -> (Label, bool) {
        if let Some(existing) = self.labels.get(key) {
            return (existing.clone(), false);
        }
        let mut created = false;
        let label = self
            .labels
            .entry(key.to_string())
            .or_insert_with(|| {
                created = true;
                Label::from_stable_key(key)
            })
            .clone();
        (label, created)
    }

    /// Attach a disclosure policy to `label`.
    ///
    /// The current path assumptions are recorded with the policy, so a policy
    /// registered inside a branch only constrains the label on that branch.
    pub fn restrict<F>(&self, label: &Label, policy: F) -> Result<()>
    where
        F: Fn(&Value) -> Expr + Send + Sync + 'static,
    {
        self.restrict_with(label, Arc::new(policy))
    }

    /// Like [`Runtime::restrict`], for an already shared policy.
    pub fn restrict_with(&self, label: &Label, policy: PolicyFn) -> Result<()> {
        let guard = self.path.entries().to_vec();
        debug!(
            "Registering policy for {} under {} path assumption(s)",
            label,
            guard.len()
        );
        self.policies
            .add_policy(PolicyEntry::new(label.clone(), policy, guard))
    }

    /// Attach a disclosure policy that holds on every branch, whatever the
    /// current path assumptions.
    pub fn restrict_unconditionally<F>(&self, label: &Label, policy: F) -> Result<()>
    where
        F: Fn(&Value) -> Expr + Send + Sync + 'static,
    {
        debug!("Registering unconditional policy for {}", label);
        self.policies
            .add_policy(PolicyEntry::new(label.clone(), Arc::new(policy), Vec::new()))
    }

    /// A sensitive value: `high` to viewers allowed by `label`'s policies,
    /// `low` to everyone else.
    pub fn mk_sensitive(&self, label: &Label, high: impl Into<Expr>, low: impl Into<Expr>) -> Expr {
        Expr::facet(label, high.into(), low.into())
    }

    /// Resolve `expr` for the viewer `ctx`.
    ///
    /// Opens a fresh solver session, so repeated calls with no policy change
    /// in between return the same value.
    pub fn concretize(&self, ctx: &Value, expr: &Expr) -> Result<Value> {
        self.session(ctx.clone()).concretize(expr)
    }

    /// Open a solver session for the viewer `ctx`.
    ///
    /// Expressions concretized through one session see one consistent label
    /// assignment. Policies registered while the session is open are picked
    /// up before the next label is resolved.
    pub fn session(&self, ctx: Value) -> Session {
        Session {
            inner: Concretizer::new(self.policies.clone(), ctx, &self.config.solver),
            path: self.path.assignment(),
        }
    }

    /// The path environment.
    pub fn path(&self) -> &PathEnv {
        &self.path
    }

    /// Assume `label == value` until the matching [`Runtime::pop_path`].
    pub fn push_path(&mut self, label: Label, value: bool) {
        self.path.push(label, value);
    }

    /// Drop the innermost path assumption.
    pub fn pop_path(&mut self) -> Result<(Label, bool)> {
        self.path.pop()
    }

    /// Run `f` with `label == value` assumed, restoring the path afterwards
    /// even when `f` fails.
    pub fn with_assumption<R>(
        &mut self,
        label: &Label,
        value: bool,
        f: impl FnOnce(&mut Runtime) -> Result<R>,
    ) -> Result<R> {
        self.path.push(label.clone(), value);
        let result = f(self);
        self.path.pop()?;
        result
    }

    /// The registered policies.
    pub fn policies(&self) -> &InMemoryPolicyStore {
        &self.policies
    }

    /// The writer context recorded for `label`, if it was minted by a
    /// protected write.
    pub fn writer_of(&self, label: &Label) -> Option<&Value> {
        self.provenance.get(label)
    }

    pub(crate) fn record_writer(&mut self, label: &Label, writer: Value) {
        self.provenance.insert(label.clone(), writer);
    }
}

/// A solver session opened through [`Runtime::session`].
pub struct Session {
    inner: Concretizer<InMemoryPolicyStore>,
    path: Assignment,
}

impl Session {
    /// The viewer context.
    pub fn context(&self) -> &Value {
        self.inner.context()
    }

    /// Resolve `expr` for this session's viewer.
    pub fn concretize(&mut self, expr: &Expr) -> Result<Value> {
        self.inner.concretize(expr, &self.path)
    }

    /// Decide a single label.
    pub fn resolve(&mut self, label: &Label) -> Result<bool> {
        self.inner.resolve(label)
    }

    /// Labels decided so far.
    pub fn resolved(&self) -> &Assignment {
        self.inner.resolved()
    }
}
