//! Solver sessions.
//!
//! A [`Concretizer`] resolves the labels of expressions for one viewer
//! context. Labels are decided greedily: each label is tried as `true` first
//! and only set to `false` when the registered policies forbid disclosure.
//! Decisions are memoized, so every expression concretized through the same
//! session sees a consistent assignment.
//!
//! Before a label is decided, the labels its policies mention are decided
//! first. A label minted by a write therefore never forces the secret it was
//! derived from to be hidden from a viewer allowed to see it.

use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

use veil_core::error::{PolicyError, Result};
use veil_core::SolverConfig;
use veil_facet::{Assignment, Expr, Label, Value};

use super::solver::{DpllSolver, SatBackend, SatResult};
use crate::model::Formula;
use crate::store::PolicyStore;

/// One resolution session for one viewer context.
pub struct Concretizer<S, B = DpllSolver> {
    /// The policy registry, read from `cursor` onwards.
    store: S,

    /// The viewer context policies are evaluated against.
    ctx: Value,

    /// The solver.
    backend: B,

    /// Labels decided so far.
    resolved: Assignment,

    /// Other labels mentioned by each label's policies.
    dependencies: HashMap<Label, Vec<Label>>,

    /// Number of store entries already asserted.
    cursor: usize,

    /// Whether the global satisfiability check has run at least once.
    checked: bool,

    /// Set once the policy set was found contradictory.
    unsatisfiable: bool,
}

impl<S: PolicyStore> Concretizer<S, DpllSolver> {
    /// Open a session backed by the bundled DPLL solver.
    ///
    /// # Arguments
    ///
    /// * `store` - The policy registry.
    /// * `ctx` - The viewer context.
    /// * `config` - Solver settings.
    ///
    /// # Returns
    ///
    /// A new session. No policy is asserted until the first resolution.
    pub fn new(store: S, ctx: Value, config: &SolverConfig) -> Self {
        Self::with_backend(store, ctx, DpllSolver::with_config(config))
    }
}

impl<S: PolicyStore, B: SatBackend> Concretizer<S, B> {
    /// Open a session with an explicit solver backend.
    pub fn with_backend(store: S, ctx: Value, backend: B) -> Self {
        debug!("Opening solver session for context {}", ctx);
        Self {
            store,
            ctx,
            backend,
            resolved: Assignment::new(),
            dependencies: HashMap::new(),
            cursor: 0,
            checked: false,
            unsatisfiable: false,
        }
    }

    /// The viewer context.
    pub fn context(&self) -> &Value {
        &self.ctx
    }

    /// Labels decided so far in this session.
    pub fn resolved(&self) -> &Assignment {
        &self.resolved
    }

    /// The solver backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn unsat_error(&self) -> veil_core::Error {
        PolicyError::Unsatisfiable {
            context: self.ctx.to_string(),
        }
        .into()
    }

    /// Assert every policy registered since the last call, then check that
    /// the constraint set is still satisfiable.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the policies are consistent.
    /// * `Err` - `PolicyError::Unsatisfiable` if they contradict each other
    ///   (or the decisions already taken in this session). The session stays
    ///   failed afterwards.
    pub fn sync_policies(&mut self) -> Result<()> {
        if self.unsatisfiable {
            return Err(self.unsat_error());
        }

        let fresh = self.store.entries_from(self.cursor)?;
        if fresh.is_empty() && self.checked {
            return Ok(());
        }

        for entry in &fresh {
            let implication = entry.implication(&self.ctx)?;
            trace!("Asserting policy for {}: {}", entry.label, implication);
            self.backend.declare(&entry.label);
            self.backend.assert_formula(&implication)?;
            let deps = self.dependencies.entry(entry.label.clone()).or_default();
            for atom in implication.atoms() {
                if atom != entry.label && !deps.contains(&atom) {
                    deps.push(atom);
                }
            }
            self.cursor += 1;
        }

        self.checked = true;
        match self.backend.check_sat()? {
            SatResult::Sat => Ok(()),
            SatResult::Unsat => {
                warn!("Policy set is unsatisfiable for context {}", self.ctx);
                self.unsatisfiable = true;
                Err(self.unsat_error())
            }
        }
    }

    /// Decide `label`, preferring `true`.
    ///
    /// Policies registered since the last resolution are asserted first, and
    /// the labels those policies mention are decided before `label`. The
    /// decision is memoized for the rest of the session.
    pub fn resolve(&mut self, label: &Label) -> Result<bool> {
        if let Some(&value) = self.resolved.get(label) {
            return Ok(value);
        }
        self.sync_policies()?;
        self.resolve_after_dependencies(label, &mut HashSet::new())
    }

    fn resolve_after_dependencies(
        &mut self,
        label: &Label,
        visiting: &mut HashSet<Label>,
    ) -> Result<bool> {
        if let Some(&value) = self.resolved.get(label) {
            return Ok(value);
        }
        // A label already being visited sits on a cycle and is decided as is.
        if visiting.insert(label.clone()) {
            let deps = self.dependencies.get(label).cloned().unwrap_or_default();
            for dep in &deps {
                self.resolve_after_dependencies(dep, visiting)?;
            }
        }
        self.decide(label)
    }

    fn decide(&mut self, label: &Label) -> Result<bool> {
        if let Some(&value) = self.resolved.get(label) {
            return Ok(value);
        }
        self.backend.declare(label);
        self.backend.push();
        let outcome = self
            .backend
            .assert_formula(&Formula::lit(label, true))
            .and_then(|_| self.backend.check_sat());
        self.backend.pop()?;
        let value = outcome? == SatResult::Sat;

        // Re-asserted outside the scope so later pops never retract it.
        self.backend.assert_formula(&Formula::lit(label, value))?;
        trace!("Resolved {} = {}", label, value);
        self.resolved.insert(label.clone(), value);
        Ok(value)
    }

    /// Resolve `expr` to a plain value.
    ///
    /// The expression is first normalized under `path` (the assumptions of
    /// the branch the caller is in). Every label of the normalized tree is
    /// then resolved, dependencies first, and the tree is evaluated.
    /// Elements of list values are resolved in the same session.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The value visible to this session's context.
    /// * `Err` - If the policy set is unsatisfiable, the solver budget is
    ///   exhausted, or the value taken is an unassigned marker.
    pub fn concretize(&mut self, expr: &Expr, path: &Assignment) -> Result<Value> {
        self.sync_policies()?;
        let pure = expr.partial_eval(path)?;
        for label in pure.labels() {
            self.resolve(&label)?;
        }
        let value = pure.eval(&self.resolved)?;
        self.force_elements(value, path)
    }

    fn force_elements(&mut self, value: Value, path: &Assignment) -> Result<Value> {
        match value {
            Value::List(elements) => {
                let mut forced = Vec::with_capacity(elements.len());
                for element in elements.iter() {
                    forced.push(Expr::constant(self.concretize(element, path)?));
                }
                Ok(Value::list(forced))
            }
            other => Ok(other),
        }
    }
}
