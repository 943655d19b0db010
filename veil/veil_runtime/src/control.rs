//! Faceted control flow.
//!
//! When a condition depends on labels that are not yet resolved, [`Runtime::branch`]
//! runs both sides, each under the matching path assumption, and merges the
//! results into a facet. Thunks are re-run for every leaf of the condition,
//! so they must only affect the world through the runtime (protected writes,
//! [`Runtime::assign`]).

use veil_core::error::{Error, FacetError, Result};
use veil_facet::{Expr, Node, UnaryOp};

use crate::context::Runtime;

impl Runtime {
    /// Faceted conditional.
    ///
    /// If `cond` normalizes to a boolean constant under the current path,
    /// exactly one thunk runs. If it is a facet on label `L`, the then-side is
    /// explored with `L = true` and the else-side with `L = false`, and the
    /// two results are merged into a facet on `L`.
    ///
    /// # Errors
    ///
    /// `FacetError::NotBoolean` if a leaf of the condition is not a boolean;
    /// `Error::Unassigned` if the branch taken depends on an unassigned value.
    pub fn branch<T, E>(&mut self, cond: &Expr, mut then: T, mut otherwise: E) -> Result<Expr>
    where
        T: FnMut(&mut Runtime) -> Result<Expr>,
        E: FnMut(&mut Runtime) -> Result<Expr>,
    {
        let pure = cond.partial_eval(&self.path().assignment())?;
        self.branch_on(&pure, &mut then, &mut otherwise)
    }

    fn branch_on<T, E>(&mut self, cond: &Expr, then: &mut T, otherwise: &mut E) -> Result<Expr>
    where
        T: FnMut(&mut Runtime) -> Result<Expr>,
        E: FnMut(&mut Runtime) -> Result<Expr>,
    {
        match cond.node() {
            Node::Facet { cond: label, high, low } => {
                let high = self.with_assumption(label, true, |rt| rt.branch_on(high, then, otherwise))?;
                let low = self.with_assumption(label, false, |rt| rt.branch_on(low, then, otherwise))?;
                Ok(Expr::facet(label, high, low))
            }
            Node::Const(value) => match value.as_bool() {
                Some(true) => then(self),
                Some(false) => otherwise(self),
                None => Err(FacetError::NotBoolean(value.to_string()).into()),
            },
            Node::Unassigned(name) => Err(Error::Unassigned {
                name: name.to_string(),
            }),
            _ => Err(FacetError::NotBoolean(cond.to_string()).into()),
        }
    }

    /// Short-circuiting conjunction: `rhs` only runs where `lhs` may be true.
    pub fn and_then<F>(&mut self, lhs: &Expr, rhs: F) -> Result<Expr>
    where
        F: FnMut(&mut Runtime) -> Result<Expr>,
    {
        self.branch(lhs, rhs, |_| Ok(Expr::from(false)))
    }

    /// Short-circuiting disjunction: `rhs` only runs where `lhs` may be false.
    pub fn or_else<F>(&mut self, lhs: &Expr, rhs: F) -> Result<Expr>
    where
        F: FnMut(&mut Runtime) -> Result<Expr>,
    {
        self.branch(lhs, |_| Ok(Expr::from(true)), rhs)
    }

    /// Faceted conjunction of two already built values.
    pub fn and(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Expr> {
        self.and_then(lhs, |_| Ok(rhs.clone()))
    }

    /// Faceted disjunction of two already built values.
    pub fn or(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Expr> {
        self.or_else(lhs, |_| Ok(rhs.clone()))
    }

    /// Faceted negation.
    pub fn not(&self, value: &Expr) -> Result<Expr> {
        let pure = value.partial_eval(&self.path().assignment())?;
        Expr::apply_unary(UnaryOp::Not, &pure)
    }

    /// Update a plain variable under the current path.
    ///
    /// The result is `new` on the branch described by the path environment
    /// and `old` on every other branch.
    pub fn assign(&self, old: &Expr, new: &Expr) -> Expr {
        self.path()
            .entries()
            .iter()
            .rev()
            .fold(new.clone(), |inner, (label, value)| {
                if *value {
                    Expr::facet(label, inner, old.clone())
                } else {
                    Expr::facet(label, old.clone(), inner)
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use veil_facet::Value;

    #[test]
    fn test_constant_condition_runs_one_side() {
        let mut rt = Runtime::default();
        let mut else_runs = 0;
        let result = rt
            .branch(
                &Expr::from(true),
                |_| Ok(Expr::from(1)),
                |_| {
                    else_runs += 1;
                    Ok(Expr::from(2))
                },
            )
            .unwrap();
        assert_eq!(result.as_const(), Some(&Value::Int(1)));
        assert_eq!(else_runs, 0);
    }

    #[test]
    fn test_faceted_condition_explores_both_sides() {
        let mut rt = Runtime::default();
        let x = rt.mk_label(Some("x"));
        let seen = RefCell::new(Vec::new());
        let result = rt
            .branch(
                &Expr::var(&x),
                |rt| {
                    seen.borrow_mut().push(rt.path().has_positive(&x));
                    Ok(Expr::from("then"))
                },
                |rt| {
                    seen.borrow_mut().push(rt.path().has_negative(&x));
                    Ok(Expr::from("else"))
                },
            )
            .unwrap();

        assert_eq!(seen.into_inner(), vec![true, true]);
        assert!(rt.path().is_empty());
        assert_eq!(
            result.to_string(),
            Expr::facet(&x, Expr::from("then"), Expr::from("else")).to_string()
        );
    }

    #[test]
    fn test_branch_on_non_boolean() {
        let mut rt = Runtime::default();
        let err = rt
            .branch(&Expr::from(3), |_| Ok(Expr::unit()), |_| Ok(Expr::unit()))
            .unwrap_err();
        assert!(matches!(err, Error::Facet(FacetError::NotBoolean(_))));

        let err = rt
            .branch(&Expr::unassigned("flag"), |_| Ok(Expr::unit()), |_| Ok(Expr::unit()))
            .unwrap_err();
        assert!(matches!(err, Error::Unassigned { .. }));
    }

    #[test]
    fn test_branch_uses_path_assumptions() {
        let mut rt = Runtime::default();
        let x = rt.mk_label(Some("x"));
        let cond = Expr::var(&x);
        let nested = rt
            .with_assumption(&x, false, |rt| {
                rt.branch(&cond, |_| Ok(Expr::from(1)), |_| Ok(Expr::from(2)))
            })
            .unwrap();
        assert_eq!(nested.as_const(), Some(&Value::Int(2)));
    }

    #[test]
    fn test_and_short_circuits() {
        let mut rt = Runtime::default();
        let mut rhs_runs = 0;
        let result = rt
            .and_then(&Expr::from(false), |_| {
                rhs_runs += 1;
                Ok(Expr::from(true))
            })
            .unwrap();
        assert_eq!(result.as_bool(), Some(false));
        assert_eq!(rhs_runs, 0);
    }

    #[test]
    fn test_assign_under_path() {
        let mut rt = Runtime::default();
        let x = rt.mk_label(Some("x"));
        let y = rt.mk_label(Some("y"));
        let old = Expr::from(0);

        assert!(rt.assign(&old, &Expr::from(5)).as_const().is_some());

        rt.push_path(x.clone(), true);
        rt.push_path(y.clone(), false);
        let updated = rt.assign(&old, &Expr::from(5));
        rt.pop_path().unwrap();
        rt.pop_path().unwrap();

        let expected = Expr::facet(
            &x,
            Expr::facet(&y, Expr::from(0), Expr::from(5)),
            Expr::from(0),
        );
        assert_eq!(updated.to_string(), expected.to_string());
    }
}
