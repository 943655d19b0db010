//! Solver backend contract and the bundled DPLL backend.
//!
//! Any incremental boolean solver offering declare/assert/push/pop/check and
//! model lookup can drive a [`Concretizer`](super::Concretizer). The bundled
//! [`DpllSolver`] encodes formulas into clauses (Tseitin) and decides them
//! with a plain DPLL search with unit propagation, which is ample for policy
//! sets of the size a single resolution produces.

use std::collections::HashMap;

use tracing::warn;
use veil_core::error::{Result, SolverError};
use veil_core::SolverConfig;
use veil_facet::Label;

use crate::model::Formula;

/// Outcome of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatResult {
    /// The asserted constraints have a model.
    Sat,
    /// The asserted constraints are contradictory.
    Unsat,
}

/// An incremental boolean solver.
pub trait SatBackend {
    /// Declare a boolean atom. Declaring twice is a no-op.
    fn declare(&mut self, atom: &Label);

    /// Assert a formula in the current scope. Undeclared atoms are declared.
    fn assert_formula(&mut self, formula: &Formula) -> Result<()>;

    /// Open a scope.
    fn push(&mut self);

    /// Retract every assertion made since the matching [`SatBackend::push`].
    fn pop(&mut self) -> Result<()>;

    /// Check the asserted constraints.
    fn check_sat(&mut self) -> Result<SatResult>;

    /// The value of `atom` in the model found by the last successful check.
    fn model_value(&self, atom: &Label) -> Result<Option<bool>>;
}

/// A literal: a variable index and its polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lit {
    var: usize,
    positive: bool,
}

impl Lit {
    fn pos(var: usize) -> Self {
        Self {
            var,
            positive: true,
        }
    }

    fn negate(self) -> Self {
        Self {
            var: self.var,
            positive: !self.positive,
        }
    }
}

type Clause = Vec<Lit>;

/// Variable reserved for the constant `true`.
const TRUE_VAR: usize = 0;

/// A small incremental DPLL solver.
#[derive(Debug)]
pub struct DpllSolver {
    atoms: HashMap<Label, usize>,
    num_vars: usize,
    clauses: Vec<Clause>,
    scopes: Vec<usize>,
    model: Option<Vec<bool>>,
    max_decisions: Option<u64>,
}

impl Default for DpllSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DpllSolver {
    /// Create a solver with no decision budget.
    pub fn new() -> Self {
        Self {
            atoms: HashMap::new(),
            num_vars: 1,
            clauses: vec![vec![Lit::pos(TRUE_VAR)]],
            scopes: Vec::new(),
            model: None,
            max_decisions: None,
        }
    }

    /// Create a solver honoring `config`.
    pub fn with_config(config: &SolverConfig) -> Self {
        let mut solver = Self::new();
        solver.max_decisions = config.max_decisions;
        solver
    }

    /// Number of clauses currently asserted.
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    fn fresh_var(&mut self) -> usize {
        let var = self.num_vars;
        self.num_vars += 1;
        var
    }

    fn atom_var(&mut self, atom: &Label) -> usize {
        if let Some(&var) = self.atoms.get(atom) {
            return var;
        }
        let var = self.fresh_var();
        self.atoms.insert(atom.clone(), var);
        var
    }

    /// Tseitin-encode `formula`, returning a literal equivalent to it.
    fn encode(&mut self, formula: &Formula) -> Lit {
        match formula {
            Formula::Const(b) => Lit {
                var: TRUE_VAR,
                positive: *b,
            },
            Formula::Atom(label) => Lit::pos(self.atom_var(label)),
            Formula::Not(inner) => self.encode(inner).negate(),
            Formula::And(parts) => {
                let lits: Vec<Lit> = parts.iter().map(|p| self.encode(p)).collect();
                let out = Lit::pos(self.fresh_var());
                // out => each part; all parts => out
                let mut back = vec![out];
                for lit in &lits {
                    self.clauses.push(vec![out.negate(), *lit]);
                    back.push(lit.negate());
                }
                self.clauses.push(back);
                out
            }
            Formula::Or(parts) => {
                let lits: Vec<Lit> = parts.iter().map(|p| self.encode(p)).collect();
                let out = Lit::pos(self.fresh_var());
                let mut forward = vec![out.negate()];
                for lit in &lits {
                    self.clauses.push(vec![out, lit.negate()]);
                    forward.push(*lit);
                }
                self.clauses.push(forward);
                out
            }
            Formula::Implies(lhs, rhs) => {
                let a = self.encode(lhs);
                let b = self.encode(rhs);
                let out = Lit::pos(self.fresh_var());
                self.clauses.push(vec![out.negate(), a.negate(), b]);
                self.clauses.push(vec![out, a]);
                self.clauses.push(vec![out, b.negate()]);
                out
            }
            Formula::Ite(cond, high, low) => {
                let c = Lit::pos(self.atom_var(cond));
                let h = self.encode(high);
                let l = self.encode(low);
                let out = Lit::pos(self.fresh_var());
                self.clauses.push(vec![c.negate(), h.negate(), out]);
                self.clauses.push(vec![c.negate(), h, out.negate()]);
                self.clauses.push(vec![c, l.negate(), out]);
                self.clauses.push(vec![c, l, out.negate()]);
                out
            }
        }
    }

    fn search(&self, assignment: &mut Vec<Option<bool>>, decisions: &mut u64) -> Result<bool> {
        if !self.propagate(assignment) {
            return Ok(false);
        }

        let Some(var) = self.pick_branch_var(assignment) else {
            return Ok(true);
        };

        *decisions += 1;
        if let Some(limit) = self.max_decisions {
            if *decisions > limit {
                warn!("Solver decision budget of {} exhausted", limit);
                return Err(SolverError::BudgetExhausted { limit }.into());
            }
        }

        for value in [true, false] {
            let saved = assignment.clone();
            assignment[var] = Some(value);
            if self.search(assignment, decisions)? {
                return Ok(true);
            }
            *assignment = saved;
        }
        Ok(false)
    }

    /// Unit propagation to a fixpoint. Returns false on conflict.
    fn propagate(&self, assignment: &mut [Option<bool>]) -> bool {
        loop {
            let mut changed = false;
            for clause in &self.clauses {
                let mut unassigned = None;
                let mut open = 0;
                let mut satisfied = false;
                for lit in clause {
                    match assignment[lit.var] {
                        Some(value) if value == lit.positive => {
                            satisfied = true;
                            break;
                        }
                        Some(_) => {}
                        None => {
                            open += 1;
                            unassigned = Some(*lit);
                        }
                    }
                }
                if satisfied {
                    continue;
                }
                match (open, unassigned) {
                    (0, _) => return false,
                    (1, Some(lit)) => {
                        assignment[lit.var] = Some(lit.positive);
                        changed = true;
                    }
                    _ => {}
                }
            }
            if !changed {
                return true;
            }
        }
    }

    /// First unassigned variable of the first clause not yet satisfied.
    fn pick_branch_var(&self, assignment: &[Option<bool>]) -> Option<usize> {
        self.clauses
            .iter()
            .filter(|clause| {
                !clause
                    .iter()
                    .any(|lit| assignment[lit.var] == Some(lit.positive))
            })
            .flat_map(|clause| clause.iter())
            .find(|lit| assignment[lit.var].is_none())
            .map(|lit| lit.var)
    }
}

impl SatBackend for DpllSolver {
    fn declare(&mut self, atom: &Label) {
        self.atom_var(atom);
    }

    fn assert_formula(&mut self, formula: &Formula) -> Result<()> {
        match formula {
            Formula::Const(true) => {}
            Formula::And(parts) => {
                for part in parts {
                    self.assert_formula(part)?;
                }
            }
            other => {
                let lit = self.encode(other);
                self.clauses.push(vec![lit]);
            }
        }
        self.model = None;
        Ok(())
    }

    fn push(&mut self) {
        self.scopes.push(self.clauses.len());
    }

    fn pop(&mut self) -> Result<()> {
        let mark = self.scopes.pop().ok_or(SolverError::ScopeUnderflow)?;
        self.clauses.truncate(mark);
        self.model = None;
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult> {
        let mut assignment = vec![None; self.num_vars];
        let mut decisions = 0;
        if self.search(&mut assignment, &mut decisions)? {
            self.model = Some(assignment.into_iter().map(|v| v.unwrap_or(false)).collect());
            Ok(SatResult::Sat)
        } else {
            self.model = None;
            Ok(SatResult::Unsat)
        }
    }

    fn model_value(&self, atom: &Label) -> Result<Option<bool>> {
        let var = self
            .atoms
            .get(atom)
            .ok_or_else(|| SolverError::UnknownAtom(atom.to_string()))?;
        Ok(self.model.as_ref().map(|model| model[*var]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::error::Error;

    fn atom(label: &Label) -> Formula {
        Formula::Atom(label.clone())
    }

    #[test]
    fn test_simple_sat_and_model() {
        let x = Label::fresh(Some("x"));
        let y = Label::fresh(Some("y"));
        let mut solver = DpllSolver::new();

        solver
            .assert_formula(&Formula::Or(vec![atom(&x), atom(&y)]))
            .unwrap();
        solver.assert_formula(&Formula::lit(&x, false)).unwrap();

        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(solver.model_value(&x).unwrap(), Some(false));
        assert_eq!(solver.model_value(&y).unwrap(), Some(true));
    }

    #[test]
    fn test_contradiction_is_unsat() {
        let x = Label::fresh(Some("x"));
        let mut solver = DpllSolver::new();
        solver.assert_formula(&atom(&x)).unwrap();
        solver.assert_formula(&Formula::lit(&x, false)).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);

        let mut solver = DpllSolver::new();
        solver.assert_formula(&Formula::Const(false)).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_push_pop_retracts() {
        let x = Label::fresh(Some("x"));
        let mut solver = DpllSolver::new();
        solver
            .assert_formula(&Formula::implies(atom(&x), Formula::Const(false)))
            .unwrap();

        solver.push();
        solver.assert_formula(&atom(&x)).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
        solver.pop().unwrap();

        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(solver.model_value(&x).unwrap(), Some(false));
    }

    #[test]
    fn test_ite_encoding() {
        let c = Label::fresh(Some("c"));
        let h = Label::fresh(Some("h"));
        let mut solver = DpllSolver::new();
        let ite = Formula::Ite(c.clone(), Box::new(atom(&h)), Box::new(Formula::Const(true)));
        solver.assert_formula(&ite).unwrap();
        solver.assert_formula(&Formula::lit(&h, false)).unwrap();

        // With h false, only the low branch can hold.
        assert_eq!(solver.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(solver.model_value(&c).unwrap(), Some(false));

        solver.assert_formula(&atom(&c)).unwrap();
        assert_eq!(solver.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn test_pop_without_push() {
        let mut solver = DpllSolver::new();
        assert!(matches!(
            solver.pop(),
            Err(Error::Solver(SolverError::ScopeUnderflow))
        ));
    }

    #[test]
    fn test_unknown_atom() {
        let solver = DpllSolver::new();
        let x = Label::fresh(None);
        assert!(matches!(
            solver.model_value(&x),
            Err(Error::Solver(SolverError::UnknownAtom(_)))
        ));
    }

    #[test]
    fn test_decision_budget() {
        let labels: Vec<Label> = (0..6).map(|_| Label::fresh(None)).collect();
        let mut solver = DpllSolver::with_config(&SolverConfig {
            max_decisions: Some(1),
        });
        // Pairwise disjunctions force several decisions.
        for pair in labels.windows(2) {
            solver
                .assert_formula(&Formula::Or(vec![atom(&pair[0]), atom(&pair[1])]))
                .unwrap();
        }
        assert!(matches!(
            solver.check_sat(),
            Err(Error::Solver(SolverError::BudgetExhausted { limit: 1 }))
        ));
    }
}
