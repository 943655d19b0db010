//! Conditional value trees.
//!
//! An [`Expr`] is an immutable, reference-counted tree. Cloning an `Expr` is
//! cheap and shares structure; every transformation builds a new tree.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use veil_core::error::{Error, FacetError, Result};

use crate::label::Label;
use crate::ops::{self, BinaryOp, UnaryOp};
use crate::value::{Object, Value, ValueType};

/// A (partial or total) assignment of booleans to labels.
pub type Assignment = HashMap<Label, bool>;

/// A node of an expression tree.
#[derive(Debug)]
pub enum Node {
    /// A resolved leaf.
    Const(Value),

    /// A label used as a boolean value.
    Var(Label),

    /// A value that is `high` when `cond` holds and `low` otherwise.
    Facet {
        /// The deciding label.
        cond: Label,
        /// Value when the label is true.
        high: Expr,
        /// Value when the label is false.
        low: Expr,
    },

    /// A deferred unary operation; see [`Expr::unary`].
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        arg: Expr,
    },

    /// A deferred binary operation; see [`Expr::binary`].
    Binary {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Expr,
        /// Right operand.
        rhs: Expr,
    },

    /// Marker for a variable or field never assigned along this branch.
    Unassigned(Arc<str>),
}

/// A persistent expression tree.
#[derive(Clone)]
pub struct Expr(Arc<Node>);

impl Expr {
    fn from_node(node: Node) -> Self {
        Self(Arc::new(node))
    }

    /// A constant leaf.
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::from_node(Node::Const(value.into()))
    }

    /// The unit constant.
    pub fn unit() -> Self {
        Self::constant(Value::Unit)
    }

    /// An opaque host object leaf.
    pub fn object<T: std::any::Any + Send + Sync>(value: T) -> Self {
        Self::constant(Object::new(value))
    }

    /// A list leaf.
    pub fn list(elements: impl IntoIterator<Item = Expr>) -> Self {
        Self::constant(Value::list(elements))
    }

    /// A label used as a boolean.
    pub fn var(label: &Label) -> Self {
        Self::from_node(Node::Var(label.clone()))
    }

    /// The deferred-error marker for a value never assigned.
    pub fn unassigned(name: &str) -> Self {
        Self::from_node(Node::Unassigned(name.into()))
    }

    /// A facet on `cond`.
    ///
    /// Collapses to `high` when both branches are the same tree or equal
    /// constants.
    pub fn facet(cond: &Label, high: Expr, low: Expr) -> Self {
        if high.same_leaf(&low) {
            return high;
        }
        Self::from_node(Node::Facet {
            cond: cond.clone(),
            high,
            low,
        })
    }

    /// A facet whose condition is given as an expression.
    ///
    /// The condition must be a bare label (`Expr::var`); any other shape is
    /// rejected rather than normalized.
    pub fn facet_on(cond: &Expr, high: Expr, low: Expr) -> Result<Self> {
        match cond.node() {
            Node::Var(label) => Ok(Self::facet(label, high, low)),
            _ => Err(FacetError::NonAtomicCondition(cond.to_string()).into()),
        }
    }

    /// A deferred unary operation, normalized by [`Expr::partial_eval`].
    pub fn unary(op: UnaryOp, arg: Expr) -> Self {
        Self::from_node(Node::Unary { op, arg })
    }

    /// A deferred binary operation, normalized by [`Expr::partial_eval`].
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::from_node(Node::Binary { op, lhs, rhs })
    }

    /// The root node.
    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Whether both handles share the same tree.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether two trees are interchangeable as facet branches: the same tree,
    /// equal constants, the same label, or markers for the same name.
    pub fn same_leaf(&self, other: &Expr) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.node(), other.node()) {
            (Node::Const(a), Node::Const(b)) => a == b,
            (Node::Var(a), Node::Var(b)) => a == b,
            (Node::Unassigned(a), Node::Unassigned(b)) => a == b,
            _ => false,
        }
    }

    /// The constant value, if this is a constant leaf.
    pub fn as_const(&self) -> Option<&Value> {
        match self.node() {
            Node::Const(value) => Some(value),
            _ => None,
        }
    }

    /// The boolean value, if this is a boolean constant leaf.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_const().and_then(Value::as_bool)
    }

    /// Whether this tree contains any label.
    pub fn is_faceted(&self) -> bool {
        !self.labels().is_empty()
    }

    /// Whether this is a pure facet tree: only facet nodes over constant or
    /// unassigned leaves.
    pub fn is_pure(&self) -> bool {
        match self.node() {
            Node::Const(_) | Node::Unassigned(_) => true,
            Node::Facet { high, low, .. } => high.is_pure() && low.is_pure(),
            _ => false,
        }
    }

    /// Labels referenced by this tree, in first-occurrence order (high
    /// branches before low branches).
    ///
    /// List elements held in constant leaves are not visited; they are
    /// resolved when the list itself is forced.
    pub fn labels(&self) -> Vec<Label> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_labels(&mut seen, &mut out);
        out
    }

    fn collect_labels(&self, seen: &mut HashSet<Label>, out: &mut Vec<Label>) {
        match self.node() {
            Node::Const(_) | Node::Unassigned(_) => {}
            Node::Var(label) => {
                if seen.insert(label.clone()) {
                    out.push(label.clone());
                }
            }
            Node::Facet { cond, high, low } => {
                if seen.insert(cond.clone()) {
                    out.push(cond.clone());
                }
                high.collect_labels(seen, out);
                low.collect_labels(seen, out);
            }
            Node::Unary { arg, .. } => arg.collect_labels(seen, out),
            Node::Binary { lhs, rhs, .. } => {
                lhs.collect_labels(seen, out);
                rhs.collect_labels(seen, out);
            }
        }
    }

    /// Replace labels according to `renames`; other labels are kept.
    ///
    /// Subtrees without a renamed label are shared with the original.
    pub fn relabel(&self, renames: &HashMap<Label, Label>) -> Expr {
        match self.node() {
            Node::Const(_) | Node::Unassigned(_) => self.clone(),
            Node::Var(label) => match renames.get(label) {
                Some(renamed) => Expr::var(renamed),
                None => self.clone(),
            },
            Node::Facet { cond, high, low } => {
                let cond = renames.get(cond).unwrap_or(cond);
                Expr::facet(cond, high.relabel(renames), low.relabel(renames))
            }
            Node::Unary { op, arg } => Expr::unary(*op, arg.relabel(renames)),
            Node::Binary { op, lhs, rhs } => {
                Expr::binary(*op, lhs.relabel(renames), rhs.relabel(renames))
            }
        }
    }

    /// The inferred type, or `None` when branches disagree or the value is an
    /// unassigned marker.
    pub fn ty(&self) -> Option<ValueType> {
        match self.node() {
            Node::Const(value) => Some(value.ty()),
            Node::Var(_) => Some(ValueType::Bool),
            Node::Facet { high, low, .. } => match (high.ty(), low.ty()) {
                (Some(h), Some(l)) if h == l => Some(h),
                // An unassigned branch does not change the type of the other.
                (Some(h), None) if matches!(low.node(), Node::Unassigned(_)) => Some(h),
                (None, Some(l)) if matches!(high.node(), Node::Unassigned(_)) => Some(l),
                _ => None,
            },
            Node::Unary { op, arg } => op.result_type(arg.ty()),
            Node::Binary { op, lhs, .. } => op.result_type(lhs.ty()),
            Node::Unassigned(_) => None,
        }
    }

    /// Evaluate against an assignment covering every label in the tree.
    ///
    /// Forcing an unassigned marker raises [`Error::Unassigned`].
    pub fn eval(&self, assignment: &Assignment) -> Result<Value> {
        match self.node() {
            Node::Const(value) => Ok(value.clone()),
            Node::Var(label) => lookup(assignment, label).map(Value::Bool),
            Node::Facet { cond, high, low } => {
                if lookup(assignment, cond)? {
                    high.eval(assignment)
                } else {
                    low.eval(assignment)
                }
            }
            Node::Unary { op, arg } => ops::apply_unary_value(*op, &arg.eval(assignment)?),
            Node::Binary { op, lhs, rhs } => {
                let left = lhs.eval(assignment)?;
                if let Some(decided) = op.short_circuit(&left) {
                    return Ok(decided);
                }
                ops::apply_binary_value(*op, &left, &rhs.eval(assignment)?)
            }
            Node::Unassigned(name) => Err(Error::Unassigned {
                name: name.to_string(),
            }),
        }
    }
}

fn lookup(assignment: &Assignment, label: &Label) -> Result<bool> {
    assignment
        .get(label)
        .copied()
        .ok_or_else(|| FacetError::UnresolvedLabel(label.to_string()).into())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Node::Const(value) => write!(f, "{}", value),
            Node::Var(label) => write!(f, "{}", label),
            Node::Facet { cond, high, low } => write!(f, "<{} ? {} : {}>", cond, high, low),
            Node::Unary { op, arg } => write!(f, "{}({})", op.symbol(), arg),
            Node::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Node::Unassigned(name) => write!(f, "<unassigned {}>", name),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::constant(value)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Self::constant(b)
    }
}

impl From<i64> for Expr {
    fn from(i: i64) -> Self {
        Self::constant(i)
    }
}

impl From<i32> for Expr {
    fn from(i: i32) -> Self {
        Self::constant(i)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::constant(s)
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Self::constant(s)
    }
}
