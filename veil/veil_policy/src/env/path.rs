//! Path environment.
//!
//! The stack of label assumptions describing the branch currently being
//! explored. Pushes and pops are strictly nested.

use veil_core::error::{Result, RuntimeError};
use veil_facet::{Assignment, Label};

use crate::model::Formula;

/// A stack of `(label, value)` assumptions.
#[derive(Debug, Clone, Default)]
pub struct PathEnv {
    stack: Vec<(Label, bool)>,
}

impl PathEnv {
    /// Create an empty path environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assume `label == value` until the matching [`PathEnv::pop`].
    pub fn push(&mut self, label: Label, value: bool) {
        self.stack.push((label, value));
    }

    /// Drop the innermost assumption.
    pub fn pop(&mut self) -> Result<(Label, bool)> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::PathUnderflow.into())
    }

    /// Whether `label` is assumed true.
    pub fn has_positive(&self, label: &Label) -> bool {
        self.stack.iter().any(|(l, b)| *b && l == label)
    }

    /// Whether `label` is assumed false.
    pub fn has_negative(&self, label: &Label) -> bool {
        self.stack.iter().any(|(l, b)| !*b && l == label)
    }

    /// The assumptions as an assignment.
    pub fn assignment(&self) -> Assignment {
        self.stack.iter().cloned().collect()
    }

    /// The conjunction of the assumptions.
    pub fn formula(&self) -> Formula {
        Formula::and(self.stack.iter().map(|(l, b)| Formula::lit(l, *b)))
    }

    /// The assumptions, outermost first.
    pub fn entries(&self) -> &[(Label, bool)] {
        &self.stack
    }

    /// Number of assumptions.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether no assumption is active.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Drop every assumption.
    pub fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::error::Error;

    #[test]
    fn test_push_pop() {
        let mut env = PathEnv::new();
        let x = Label::fresh(Some("x"));
        let y = Label::fresh(Some("y"));

        env.push(x.clone(), true);
        env.push(y.clone(), false);
        assert!(env.has_positive(&x));
        assert!(!env.has_negative(&x));
        assert!(env.has_negative(&y));
        assert_eq!(env.assignment().get(&y), Some(&false));
        assert_eq!(
            env.formula(),
            Formula::And(vec![Formula::lit(&x, true), Formula::lit(&y, false)])
        );

        assert_eq!(env.pop().unwrap(), (y, false));
        assert_eq!(env.depth(), 1);
        env.pop().unwrap();
        assert_eq!(env.formula(), Formula::Const(true));
    }

    #[test]
    fn test_pop_empty_underflows() {
        let mut env = PathEnv::new();
        assert!(matches!(
            env.pop(),
            Err(Error::Runtime(RuntimeError::PathUnderflow))
        ));
    }
}
