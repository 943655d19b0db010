//! Propositional formulas over labels.
//!
//! Policies are written as boolean [`Expr`]s; before they reach the solver
//! they are normalized and converted into a [`Formula`].

use std::collections::HashSet;
use std::fmt;

use veil_core::error::{Error, PolicyError, Result};
use veil_facet::{Assignment, Expr, Label, Node, Value};

/// A propositional formula whose atoms are labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formula {
    /// A constant.
    Const(bool),

    /// A label.
    Atom(Label),

    /// Negation.
    Not(Box<Formula>),

    /// Conjunction; empty means true.
    And(Vec<Formula>),

    /// Disjunction; empty means false.
    Or(Vec<Formula>),

    /// Implication.
    Implies(Box<Formula>, Box<Formula>),

    /// If-then-else on a label, the shape a boolean facet compiles to.
    Ite(Label, Box<Formula>, Box<Formula>),
}

impl Formula {
    /// The literal `label` (when `positive`) or `!label`.
    pub fn lit(label: &Label, positive: bool) -> Self {
        let atom = Self::Atom(label.clone());
        if positive {
            atom
        } else {
            Self::Not(Box::new(atom))
        }
    }

    /// Negation, folding constants and double negation.
    pub fn negate(self) -> Self {
        match self {
            Self::Const(b) => Self::Const(!b),
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Conjunction, dropping `true` conjuncts and folding `false`.
    pub fn and(parts: impl IntoIterator<Item = Formula>) -> Self {
        let mut kept = Vec::new();
        for part in parts {
            match part {
                Self::Const(true) => {}
                Self::Const(false) => return Self::Const(false),
                Self::And(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Self::Const(true),
            1 => kept.remove(0),
            _ => Self::And(kept),
        }
    }

    /// Disjunction, dropping `false` disjuncts and folding `true`.
    pub fn or(parts: impl IntoIterator<Item = Formula>) -> Self {
        let mut kept = Vec::new();
        for part in parts {
            match part {
                Self::Const(false) => {}
                Self::Const(true) => return Self::Const(true),
                Self::Or(inner) => kept.extend(inner),
                other => kept.push(other),
            }
        }
        match kept.len() {
            0 => Self::Const(false),
            1 => kept.remove(0),
            _ => Self::Or(kept),
        }
    }

    /// `lhs => rhs`.
    pub fn implies(lhs: Formula, rhs: Formula) -> Self {
        match (lhs, rhs) {
            (Self::Const(true), rhs) => rhs,
            (Self::Const(false), _) | (_, Self::Const(true)) => Self::Const(true),
            (lhs, rhs) => Self::Implies(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Compile a boolean expression.
    ///
    /// The expression is first normalized into a pure facet tree; every leaf
    /// must then be a boolean constant.
    pub fn from_expr(expr: &Expr) -> Result<Self> {
        let pure = expr.partial_eval(&Assignment::new())?;
        Self::from_pure(&pure, false)
    }

    /// Compile the result of a disclosure policy.
    ///
    /// Like [`Formula::from_expr`], except that an unassigned leaf compiles
    /// to `false`: a policy that depends on a value not written yet denies
    /// disclosure on the branches where that value is reached.
    pub fn from_policy(expr: &Expr) -> Result<Self> {
        let pure = expr.partial_eval(&Assignment::new())?;
        Self::from_pure(&pure, true)
    }

    fn from_pure(expr: &Expr, deny_unassigned: bool) -> Result<Self> {
        match expr.node() {
            Node::Const(Value::Bool(b)) => Ok(Self::Const(*b)),
            Node::Const(other) => Err(PolicyError::Malformed(format!(
                "expected a boolean, got {} of type {}",
                other,
                other.ty()
            ))
            .into()),
            Node::Facet { cond, high, low } => {
                let high = Self::from_pure(high, deny_unassigned)?;
                let low = Self::from_pure(low, deny_unassigned)?;
                Ok(match (high, low) {
                    (Self::Const(true), Self::Const(false)) => Self::lit(cond, true),
                    (Self::Const(false), Self::Const(true)) => Self::lit(cond, false),
                    (high, low) => Self::Ite(cond.clone(), Box::new(high), Box::new(low)),
                })
            }
            Node::Unassigned(_) if deny_unassigned => Ok(Self::Const(false)),
            Node::Unassigned(name) => Err(Error::Unassigned {
                name: name.to_string(),
            }),
            _ => Err(PolicyError::Malformed(format!("not a pure facet tree: {}", expr)).into()),
        }
    }

    /// Evaluate under an assignment; `None` if some atom is unassigned.
    pub fn eval(&self, assignment: &Assignment) -> Option<bool> {
        match self {
            Self::Const(b) => Some(*b),
            Self::Atom(label) => assignment.get(label).copied(),
            Self::Not(inner) => inner.eval(assignment).map(|b| !b),
            Self::And(parts) => {
                for part in parts {
                    if !part.eval(assignment)? {
                        return Some(false);
                    }
                }
                Some(true)
            }
            Self::Or(parts) => {
                for part in parts {
                    if part.eval(assignment)? {
                        return Some(true);
                    }
                }
                Some(false)
            }
            Self::Implies(lhs, rhs) => {
                if !lhs.eval(assignment)? {
                    Some(true)
                } else {
                    rhs.eval(assignment)
                }
            }
            Self::Ite(cond, high, low) => {
                if *assignment.get(cond)? {
                    high.eval(assignment)
                } else {
                    low.eval(assignment)
                }
            }
        }
    }

    /// Atoms in first-occurrence order.
    pub fn atoms(&self) -> Vec<Label> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.collect_atoms(&mut seen, &mut out);
        out
    }

    fn collect_atoms(&self, seen: &mut HashSet<Label>, out: &mut Vec<Label>) {
        match self {
            Self::Const(_) => {}
            Self::Atom(label) => note_atom(label, seen, out),
            Self::Not(inner) => inner.collect_atoms(seen, out),
            Self::And(parts) | Self::Or(parts) => {
                for part in parts {
                    part.collect_atoms(seen, out);
                }
            }
            Self::Implies(lhs, rhs) => {
                lhs.collect_atoms(seen, out);
                rhs.collect_atoms(seen, out);
            }
            Self::Ite(cond, high, low) => {
                note_atom(cond, seen, out);
                high.collect_atoms(seen, out);
                low.collect_atoms(seen, out);
            }
        }
    }
}

fn note_atom(label: &Label, seen: &mut HashSet<Label>, out: &mut Vec<Label>) {
    if seen.insert(label.clone()) {
        out.push(label.clone());
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(b) => write!(f, "{}", b),
            Self::Atom(label) => write!(f, "{}", label),
            Self::Not(inner) => write!(f, "!{}", inner),
            Self::And(parts) => write_joined(f, parts, "&&"),
            Self::Or(parts) => write_joined(f, parts, "||"),
            Self::Implies(lhs, rhs) => write!(f, "({} => {})", lhs, rhs),
            Self::Ite(cond, high, low) => write!(f, "({} ? {} : {})", cond, high, low),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, parts: &[Formula], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", part)?;
    }
    write!(f, ")")
}
