//! Normalization of expression trees under a partial assignment.

use veil_core::error::Result;

use crate::expr::{Assignment, Expr, Node};
use crate::ops::{distribute_binary, distribute_unary};

impl Expr {
    /// Normalize this tree under a partial assignment.
    ///
    /// The result is a pure facet tree (facet nodes over constant or
    /// unassigned leaves). Labels bound in `env` are substituted and their
    /// facets pruned; a free label used as a boolean becomes the facet
    /// `<L ? true : false>`. Deferred operations are pushed into the leaves.
    pub fn partial_eval(&self, env: &Assignment) -> Result<Expr> {
        let mut env = env.clone();
        self.partial_eval_in(&mut env)
    }

    fn partial_eval_in(&self, env: &mut Assignment) -> Result<Expr> {
        match self.node() {
            Node::Const(_) | Node::Unassigned(_) => Ok(self.clone()),
            Node::Var(label) => Ok(match env.get(label) {
                Some(&b) => Expr::from(b),
                None => Expr::facet(label, Expr::from(true), Expr::from(false)),
            }),
            Node::Facet { cond, high, low } => {
                if let Some(&decided) = env.get(cond) {
                    let branch = if decided { high } else { low };
                    return branch.partial_eval_in(env);
                }
                env.insert(cond.clone(), true);
                let high = high.partial_eval_in(env);
                env.insert(cond.clone(), false);
                let low = low.partial_eval_in(env);
                env.remove(cond);
                Ok(Expr::facet(cond, high?, low?))
            }
            Node::Unary { op, arg } => distribute_unary(*op, &arg.partial_eval_in(env)?),
            Node::Binary { op, lhs, rhs } => {
                let lhs = lhs.partial_eval_in(env)?;
                if let Some(decided) = lhs.as_const().and_then(|v| op.short_circuit(v)) {
                    return Ok(Expr::constant(decided));
                }
                let rhs = rhs.partial_eval_in(env)?;
                distribute_binary(*op, &lhs, &rhs, &mut Assignment::new())
            }
        }
    }
}
