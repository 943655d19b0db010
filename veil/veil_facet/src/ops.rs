//! Operators and their distribution over facets.
//!
//! [`Expr::apply`] pushes an operator down into the branches of faceted
//! operands: the left tree is walked first, then the right tree. Labels
//! already decided on the way down pick their branch directly, so the result
//! has at most one facet node per distinct label on each path.

use serde::{Deserialize, Serialize};

use veil_core::error::{FacetError, Result};

use crate::expr::{Assignment, Expr, Node};
use crate::value::{Value, ValueType};

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// Integer addition or string concatenation.
    Add,
    /// Integer subtraction.
    Sub,
    /// Integer multiplication.
    Mul,
    /// Integer division.
    Div,
    /// Integer remainder.
    Rem,
    /// Equality on any values.
    Eq,
    /// Inequality on any values.
    Ne,
    /// Less than (integers and strings).
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Boolean conjunction.
    And,
    /// Boolean disjunction.
    Or,
    /// Boolean implication.
    Implies,
}

impl BinaryOp {
    /// The operator symbol, used in diagnostics.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Implies => "=>",
        }
    }

    /// Result type given the type of the left operand.
    pub fn result_type(&self, lhs: Option<ValueType>) -> Option<ValueType> {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Rem => lhs,
            _ => Some(ValueType::Bool),
        }
    }

    /// The result decided by the left operand alone, if any.
    pub fn short_circuit(&self, lhs: &Value) -> Option<Value> {
        match (self, lhs) {
            (Self::And, Value::Bool(false)) => Some(Value::Bool(false)),
            (Self::Or, Value::Bool(true)) => Some(Value::Bool(true)),
            (Self::Implies, Value::Bool(false)) => Some(Value::Bool(true)),
            _ => None,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Boolean negation.
    Not,
    /// Integer negation.
    Neg,
}

impl UnaryOp {
    /// The operator symbol, used in diagnostics.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
        }
    }

    /// Result type given the operand type.
    pub fn result_type(&self, arg: Option<ValueType>) -> Option<ValueType> {
        match self {
            Self::Not => Some(ValueType::Bool),
            Self::Neg => arg,
        }
    }
}

fn mismatch(op: &str, lhs: &Value, rhs: Option<&Value>) -> FacetError {
    FacetError::TypeMismatch {
        op: op.to_string(),
        lhs: lhs.ty().to_string(),
        rhs: rhs.map_or_else(|| "-".to_string(), |v| v.ty().to_string()),
    }
}

/// Apply a binary operator to two resolved values.
pub fn apply_binary_value(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    use Value::{Bool, Int, Str};

    let value = match (op, lhs, rhs) {
        (BinaryOp::Eq, _, _) => Bool(lhs == rhs),
        (BinaryOp::Ne, _, _) => Bool(lhs != rhs),

        (BinaryOp::Add, Int(a), Int(b)) => Int(a.wrapping_add(*b)),
        (BinaryOp::Add, Str(a), Str(b)) => Value::from(format!("{}{}", a, b)),
        (BinaryOp::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(*b)),
        (BinaryOp::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(*b)),
        (BinaryOp::Div, Int(_), Int(0)) | (BinaryOp::Rem, Int(_), Int(0)) => {
            return Err(FacetError::DivisionByZero.into())
        }
        (BinaryOp::Div, Int(a), Int(b)) => Int(a.wrapping_div(*b)),
        (BinaryOp::Rem, Int(a), Int(b)) => Int(a.wrapping_rem(*b)),

        (BinaryOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinaryOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (BinaryOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinaryOp::Ge, Int(a), Int(b)) => Bool(a >= b),
        (BinaryOp::Lt, Str(a), Str(b)) => Bool(a < b),
        (BinaryOp::Le, Str(a), Str(b)) => Bool(a <= b),
        (BinaryOp::Gt, Str(a), Str(b)) => Bool(a > b),
        (BinaryOp::Ge, Str(a), Str(b)) => Bool(a >= b),

        (BinaryOp::And, Bool(a), Bool(b)) => Bool(*a && *b),
        (BinaryOp::Or, Bool(a), Bool(b)) => Bool(*a || *b),
        (BinaryOp::Implies, Bool(a), Bool(b)) => Bool(!*a || *b),

        _ => return Err(mismatch(op.symbol(), lhs, Some(rhs)).into()),
    };
    Ok(value)
}

/// Apply a unary operator to a resolved value.
pub fn apply_unary_value(op: UnaryOp, arg: &Value) -> Result<Value> {
    match (op, arg) {
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(i)) => Ok(Value::Int(i.wrapping_neg())),
        _ => Err(mismatch(op.symbol(), arg, None).into()),
    }
}

impl Expr {
    /// Apply `op` to two expressions, distributing over their facets.
    pub fn apply(op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Expr> {
        let mut assumed = Assignment::new();
        let lhs = lhs.partial_eval(&assumed)?;
        let rhs = rhs.partial_eval(&assumed)?;
        distribute_binary(op, &lhs, &rhs, &mut assumed)
    }

    /// Apply a unary operator, distributing over facets.
    pub fn apply_unary(op: UnaryOp, arg: &Expr) -> Result<Expr> {
        let arg = arg.partial_eval(&Assignment::new())?;
        distribute_unary(op, &arg)
    }

    /// `self == other`.
    pub fn equals(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::Eq, self, other)
    }

    /// `self != other`.
    pub fn not_equals(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::Ne, self, other)
    }

    /// `self + other`.
    pub fn plus(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::Add, self, other)
    }

    /// `self < other`.
    pub fn less_than(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::Lt, self, other)
    }

    /// Eager (non short-circuiting over thunks) conjunction.
    pub fn and(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::And, self, other)
    }

    /// Eager disjunction.
    pub fn or(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::Or, self, other)
    }

    /// `self => other`.
    pub fn implies(&self, other: &Expr) -> Result<Expr> {
        Expr::apply(BinaryOp::Implies, self, other)
    }

    /// Boolean negation.
    pub fn negate(&self) -> Result<Expr> {
        Expr::apply_unary(UnaryOp::Not, self)
    }
}

/// Distribute a unary operator over a pure tree.
pub(crate) fn distribute_unary(op: UnaryOp, arg: &Expr) -> Result<Expr> {
    match arg.node() {
        Node::Facet { cond, high, low } => Ok(Expr::facet(
            cond,
            distribute_unary(op, high)?,
            distribute_unary(op, low)?,
        )),
        Node::Const(value) => Ok(Expr::constant(apply_unary_value(op, value)?)),
        // Deferred markers and unnormalized shapes stay as they are, wrapped.
        Node::Unassigned(_) => Ok(arg.clone()),
        _ => Ok(Expr::unary(op, arg.clone())),
    }
}

/// Distribute a binary operator over two pure trees, left tree first.
///
/// `assumed` carries the label decisions taken on the way down.
pub(crate) fn distribute_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    assumed: &mut Assignment,
) -> Result<Expr> {
    if let Node::Facet { cond, high, low } = lhs.node() {
        if let Some(&decided) = assumed.get(cond) {
            let branch = if decided { high } else { low };
            return distribute_binary(op, branch, rhs, assumed);
        }
        assumed.insert(cond.clone(), true);
        let high = distribute_binary(op, high, rhs, assumed);
        assumed.insert(cond.clone(), false);
        let low = distribute_binary(op, low, rhs, assumed);
        assumed.remove(cond);
        return Ok(Expr::facet(cond, high?, low?));
    }

    // The left side is a leaf from here on.
    if let Some(left) = lhs.as_const() {
        if let Some(decided) = op.short_circuit(left) {
            return Ok(Expr::constant(decided));
        }
    }
    if matches!(lhs.node(), Node::Unassigned(_)) {
        return Ok(lhs.clone());
    }

    if let Node::Facet { cond, high, low } = rhs.node() {
        if let Some(&decided) = assumed.get(cond) {
            let branch = if decided { high } else { low };
            return distribute_binary(op, lhs, branch, assumed);
        }
        assumed.insert(cond.clone(), true);
        let high = distribute_binary(op, lhs, high, assumed);
        assumed.insert(cond.clone(), false);
        let low = distribute_binary(op, lhs, low, assumed);
        assumed.remove(cond);
        return Ok(Expr::facet(cond, high?, low?));
    }

    match (lhs.node(), rhs.node()) {
        (Node::Const(a), Node::Const(b)) => Ok(Expr::constant(apply_binary_value(op, a, b)?)),
        (_, Node::Unassigned(_)) => Ok(rhs.clone()),
        _ => Ok(Expr::binary(op, lhs.clone(), rhs.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use veil_core::error::Error;

    #[test]
    fn test_constant_arithmetic() {
        let sum = Expr::from(40).plus(&Expr::from(2)).unwrap();
        assert_eq!(sum.as_const(), Some(&Value::Int(42)));

        let joined = Expr::from("ab").plus(&Expr::from("cd")).unwrap();
        assert_eq!(joined.as_const(), Some(&Value::from("abcd")));
    }

    #[test]
    fn test_type_mismatch_fails_fast() {
        let err = Expr::from(1).plus(&Expr::from("x")).unwrap_err();
        assert!(matches!(err, Error::Facet(FacetError::TypeMismatch { .. })));

        let err = Expr::apply(BinaryOp::Div, &Expr::from(1), &Expr::from(0)).unwrap_err();
        assert!(matches!(err, Error::Facet(FacetError::DivisionByZero)));
    }

    #[test]
    fn test_distribution_over_left_facet() {
        let x = Label::fresh(Some("x"));
        let value = Expr::facet(&x, Expr::from(42), Expr::from(0));
        let result = value.equals(&Expr::from(42)).unwrap();

        match result.node() {
            Node::Facet { cond, high, low } => {
                assert_eq!(cond, &x);
                assert_eq!(high.as_bool(), Some(true));
                assert_eq!(low.as_bool(), Some(false));
            }
            other => panic!("expected facet, got {:?}", other),
        }
    }

    #[test]
    fn test_distribution_shares_labels() {
        let x = Label::fresh(Some("x"));
        let a = Expr::facet(&x, Expr::from(1), Expr::from(2));
        let b = Expr::facet(&x, Expr::from(10), Expr::from(20));

        // x is decided once: the result has a single facet node on x.
        let sum = a.plus(&b).unwrap();
        match sum.node() {
            Node::Facet { high, low, .. } => {
                assert_eq!(high.as_const(), Some(&Value::Int(11)));
                assert_eq!(low.as_const(), Some(&Value::Int(22)));
            }
            other => panic!("expected facet, got {:?}", other),
        }
    }

    #[test]
    fn test_distribution_over_two_labels() {
        let x = Label::fresh(Some("x"));
        let y = Label::fresh(Some("y"));
        let a = Expr::facet(&x, Expr::from(1), Expr::from(2));
        let b = Expr::facet(&y, Expr::from(10), Expr::from(20));
        let sum = a.plus(&b).unwrap();

        assert_eq!(sum.labels(), vec![x.clone(), y.clone()]);
        for (vx, vy, expected) in [
            (true, true, 11),
            (true, false, 21),
            (false, true, 12),
            (false, false, 22),
        ] {
            let mut assignment = Assignment::new();
            assignment.insert(x.clone(), vx);
            assignment.insert(y.clone(), vy);
            assert_eq!(sum.eval(&assignment).unwrap(), Value::Int(expected));
        }
    }

    #[test]
    fn test_short_circuit_skips_unassigned() {
        let missing = Expr::unassigned("flag");
        let result = Expr::from(false).and(&missing).unwrap();
        assert_eq!(result.as_bool(), Some(false));

        let deferred = Expr::from(true).and(&missing).unwrap();
        assert!(matches!(deferred.node(), Node::Unassigned(_)));
    }

    #[test]
    fn test_negate_facet() {
        let x = Label::fresh(None);
        let negated = Expr::var(&x).negate().unwrap();
        match negated.node() {
            Node::Facet { high, low, .. } => {
                assert_eq!(high.as_bool(), Some(false));
                assert_eq!(low.as_bool(), Some(true));
            }
            other => panic!("expected facet, got {:?}", other),
        }
    }
}
