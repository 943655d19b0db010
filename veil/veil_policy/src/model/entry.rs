//! Policy entry model.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use veil_core::error::Result;
use veil_facet::{Expr, Label, Value};

use super::formula::Formula;

/// A disclosure policy: given the viewer context, a boolean expression that
/// must hold for the label to be true.
pub type PolicyFn = Arc<dyn Fn(&Value) -> Expr + Send + Sync>;

/// A registered disclosure rule.
#[derive(Clone)]
pub struct PolicyEntry {
    /// The label this rule restricts.
    pub label: Label,

    /// The policy function.
    pub policy: PolicyFn,

    /// Path assumptions active when the rule was registered.
    pub guard: Vec<(Label, bool)>,

    /// When this rule was registered.
    pub registered_at: DateTime<Utc>,
}

impl PolicyEntry {
    /// Create a new policy entry.
    ///
    /// # Arguments
    ///
    /// * `label` - The label to restrict.
    /// * `policy` - The policy function.
    /// * `guard` - The path assumptions at the registration site.
    ///
    /// # Returns
    ///
    /// A new policy entry.
    pub fn new(label: Label, policy: PolicyFn, guard: Vec<(Label, bool)>) -> Self {
        Self {
            label,
            policy,
            guard,
            registered_at: Utc::now(),
        }
    }

    /// The guard as a formula.
    pub fn guard_formula(&self) -> Formula {
        Formula::and(self.guard.iter().map(|(l, b)| Formula::lit(l, *b)))
    }

    /// The implication asserted for `ctx`: `label => (guard => policy(ctx))`.
    ///
    /// Where the policy reaches a value that was never assigned, it denies.
    pub fn implication(&self, ctx: &Value) -> Result<Formula> {
        let policy = Formula::from_policy(&(self.policy)(ctx))?;
        Ok(Formula::implies(
            Formula::lit(&self.label, true),
            Formula::implies(self.guard_formula(), policy),
        ))
    }
}

impl fmt::Debug for PolicyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEntry")
            .field("label", &self.label)
            .field("guard", &self.guard)
            .field("registered_at", &self.registered_at)
            .finish_non_exhaustive()
    }
}
