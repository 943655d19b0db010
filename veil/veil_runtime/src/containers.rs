//! Faceted containers.
//!
//! A faceted sequence is a facet tree whose leaves are lists. The combinators
//! here visit every leaf list under the path assumptions leading to it, the
//! same way [`Runtime::branch`] does, and merge the per-leaf results into a
//! facet on the same labels. Answers stay faceted; nothing is resolved early.

use veil_core::error::{Error, FacetError, Result};
use veil_facet::{Expr, Node, Value};

use crate::context::Runtime;

impl Runtime {
    /// Apply `f` to every element of a faceted sequence.
    ///
    /// `f` runs once per element of every leaf list, with the path
    /// assumptions of that leaf active.
    pub fn map<F>(&mut self, seq: &Expr, mut f: F) -> Result<Expr>
    where
        F: FnMut(&mut Runtime, &Expr) -> Result<Expr>,
    {
        let pure = seq.partial_eval(&self.path().assignment())?;
        self.for_each_leaf(&pure, "map", &mut |rt, elements| {
            let mut mapped = Vec::with_capacity(elements.len());
            for element in elements {
                mapped.push(f(rt, element)?);
            }
            Ok(Expr::list(mapped))
        })
    }

    /// Whether some element satisfies `predicate`, as a faceted boolean.
    pub fn has_element<F>(&mut self, seq: &Expr, mut predicate: F) -> Result<Expr>
    where
        F: FnMut(&mut Runtime, &Expr) -> Result<Expr>,
    {
        let pure = seq.partial_eval(&self.path().assignment())?;
        self.for_each_leaf(&pure, "has_element", &mut |rt, elements| {
            let mut found = Expr::from(false);
            for element in elements {
                let hit = predicate(rt, element)?;
                found = found.or(&hit)?;
            }
            Ok(found)
        })
    }

    /// Whether the sequence contains `needle`, as a faceted boolean.
    pub fn contains(&mut self, seq: &Expr, needle: &Expr) -> Result<Expr> {
        self.has_element(seq, |_, element| element.equals(needle))
    }

    /// Whether every element of a sequence of booleans is true, as a faceted
    /// boolean. The empty sequence is true.
    pub fn all(&mut self, seq: &Expr) -> Result<Expr> {
        let pure = seq.partial_eval(&self.path().assignment())?;
        self.for_each_leaf(&pure, "all", &mut |_, elements| {
            let mut every = Expr::from(true);
            for element in elements {
                every = every.and(element)?;
            }
            Ok(every)
        })
    }

    fn for_each_leaf(
        &mut self,
        seq: &Expr,
        op: &str,
        visit: &mut dyn FnMut(&mut Runtime, &[Expr]) -> Result<Expr>,
    ) -> Result<Expr> {
        match seq.node() {
            Node::Facet { cond, high, low } => {
                let high = self.with_assumption(cond, true, |rt| rt.for_each_leaf(high, op, visit))?;
                let low = self.with_assumption(cond, false, |rt| rt.for_each_leaf(low, op, visit))?;
                Ok(Expr::facet(cond, high, low))
            }
            Node::Const(Value::List(elements)) => visit(self, &elements[..]),
            Node::Const(other) => Err(FacetError::TypeMismatch {
                op: op.to_string(),
                lhs: other.ty().to_string(),
                rhs: "-".to_string(),
            }
            .into()),
            Node::Unassigned(name) => Err(Error::Unassigned {
                name: name.to_string(),
            }),
            _ => Err(FacetError::TypeMismatch {
                op: op.to_string(),
                lhs: seq.to_string(),
                rhs: "-".to_string(),
            }
            .into()),
        }
    }
}
