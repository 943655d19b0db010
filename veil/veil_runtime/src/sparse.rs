//! Sparse rows.
//!
//! A [`FacetedRows`] stores a faceted value as `(value, partial assignment)`
//! rows instead of a decision tree. This is the shape a persisted field takes:
//! each row is valid on every branch that agrees with its assignment, and
//! labels the row does not mention are irrelevant to it.
//!
//! Rows convert to the canonical facet tree in one construction pass over the
//! union of assignment keys, taken in label order.

use std::collections::BTreeSet;
use std::convert::Infallible;
use tracing::debug;

use veil_core::error::{FacetError, Result, RuntimeError};
use veil_facet::{Assignment, Expr, Label, Node, Value};

/// One stored row.
#[derive(Debug, Clone)]
pub struct Row {
    /// The value of the row.
    pub value: Value,

    /// The branch the row belongs to. Labels absent from the map may take
    /// either value.
    pub assignment: Assignment,
}

impl Row {
    /// Create a row.
    pub fn new(value: impl Into<Value>, assignment: Assignment) -> Self {
        Self {
            value: value.into(),
            assignment,
        }
    }

    /// A row valid on every branch.
    pub fn unconditional(value: impl Into<Value>) -> Self {
        Self::new(value, Assignment::new())
    }

    /// Whether the row may hold when `label == value`.
    fn admits(&self, label: &Label, value: bool) -> bool {
        self.assignment.get(label).map_or(true, |&v| v == value)
    }
}

/// A faceted value in row form.
#[derive(Debug, Clone, Default)]
pub struct FacetedRows {
    rows: Vec<Row>,
}

impl FacetedRows {
    /// An empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row.
    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// The rows, in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn keys(&self) -> Vec<Label> {
        let keys: BTreeSet<Label> = self
            .rows
            .iter()
            .flat_map(|row| row.assignment.keys().cloned())
            .collect();
        keys.into_iter().collect()
    }

    /// The facet tree whose leaf on each branch is the list of values of the
    /// rows valid there, in row order.
    pub fn to_list_facet(&self) -> Expr {
        let rows: Vec<&Row> = self.rows.iter().collect();
        let built = build::<Infallible>(&self.keys(), &rows, &mut |leaf| {
            Ok(Expr::list(
                leaf.iter().map(|row| Expr::constant(row.value.clone())),
            ))
        });
        match built {
            Ok(tree) => tree,
            Err(never) => match never {},
        }
    }

    /// The facet tree whose leaf on each branch is the single value of the
    /// rows valid there.
    ///
    /// A branch with no row holds the unassigned marker for `name`.
    ///
    /// # Errors
    ///
    /// `RuntimeError::AmbiguousRows` if rows with different values are valid
    /// on the same branch.
    pub fn to_value_facet(&self, name: &str) -> Result<Expr> {
        let rows: Vec<&Row> = self.rows.iter().collect();
        build(&self.keys(), &rows, &mut |leaf| match leaf.split_first() {
            None => Ok(Expr::unassigned(name)),
            Some((first, rest)) => {
                if let Some(other) = rest.iter().find(|row| row.value != first.value) {
                    return Err(RuntimeError::AmbiguousRows(format!(
                        "{} is both {} and {} on one branch",
                        name, first.value, other.value
                    ))
                    .into());
                }
                Ok(Expr::constant(first.value.clone()))
            }
        })
    }

    /// Expand a facet tree into rows, one per reachable leaf.
    ///
    /// The tree is normalized first. Branches holding the unassigned marker
    /// produce no row.
    pub fn from_facet(expr: &Expr) -> Result<Self> {
        let pure = expr.partial_eval(&Assignment::new())?;
        let mut rows = Self::new();
        let mut path = Assignment::new();
        expand(&pure, &mut path, &mut rows)?;
        Ok(rows)
    }

    /// Merge rows with equal values whose assignments share a key set and
    /// differ in exactly one entry, dropping that entry, until no such pair
    /// is left.
    pub fn collapse(&mut self) {
        let before = self.rows.len();
        while let Some((keep, drop, label)) = self.find_mergeable() {
            self.rows[keep].assignment.remove(&label);
            self.rows.remove(drop);
        }
        if self.rows.len() < before {
            debug!("Collapsed {} row(s) into {}", before, self.rows.len());
        }
    }

    fn find_mergeable(&self) -> Option<(usize, usize, Label)> {
        for (i, a) in self.rows.iter().enumerate() {
            for (j, b) in self.rows.iter().enumerate().skip(i + 1) {
                if a.value != b.value || a.assignment.len() != b.assignment.len() {
                    continue;
                }
                let mut differing = None;
                let mut mergeable = true;
                for (label, value) in &a.assignment {
                    match b.assignment.get(label) {
                        Some(other) if other == value => {}
                        Some(_) if differing.is_none() => differing = Some(label.clone()),
                        _ => {
                            mergeable = false;
                            break;
                        }
                    }
                }
                if let (true, Some(label)) = (mergeable, differing) {
                    return Some((i, j, label));
                }
            }
        }
        None
    }
}

impl FromIterator<Row> for FacetedRows {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        Self {
            rows: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FacetedRows {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

fn build<E>(
    keys: &[Label],
    rows: &[&Row],
    leaf: &mut dyn FnMut(&[&Row]) -> std::result::Result<Expr, E>,
) -> std::result::Result<Expr, E> {
    let Some((label, rest)) = keys.split_first() else {
        return leaf(rows);
    };
    if rows.iter().all(|row| !row.assignment.contains_key(label)) {
        return build(rest, rows, leaf);
    }
    let high: Vec<&Row> = rows.iter().copied().filter(|r| r.admits(label, true)).collect();
    let low: Vec<&Row> = rows.iter().copied().filter(|r| r.admits(label, false)).collect();
    let high = build(rest, &high, leaf)?;
    let low = build(rest, &low, leaf)?;
    Ok(Expr::facet(label, high, low))
}

fn expand(expr: &Expr, path: &mut Assignment, rows: &mut FacetedRows) -> Result<()> {
    match expr.node() {
        Node::Facet { cond, high, low } => {
            path.insert(cond.clone(), true);
            expand(high, path, rows)?;
            path.insert(cond.clone(), false);
            expand(low, path, rows)?;
            path.remove(cond);
            Ok(())
        }
        Node::Const(value) => {
            rows.push(Row::new(value.clone(), path.clone()));
            Ok(())
        }
        Node::Unassigned(_) => Ok(()),
        _ => Err(FacetError::TypeMismatch {
            op: "from_facet".to_string(),
            lhs: expr.to_string(),
            rhs: "-".to_string(),
        }
        .into()),
    }
}
