//! Protected references.
//!
//! A [`ProtectedRef`] is a mutable cell with two write policies:
//!
//! - the *input-write* policy decides whether a writer may write at all. A
//!   rejected write leaves the cell untouched and reports
//!   [`UpdateResult::Failure`].
//! - the *output-write* policy decides which viewers may observe that a write
//!   happened. An accepted write does not overwrite the cell; it wraps the new
//!   value in facets on freshly minted labels whose policies require the
//!   output-write policy, so viewers it rejects keep seeing the old contents.
//!
//! The path environment active during the write is folded into those labels,
//! so a write performed inside a branch on a secret is only visible to
//! viewers who may learn which way the branch went.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use veil_core::error::{PolicyError, Result};
use veil_facet::{BinaryOp, Expr, Label, UnaryOp, Value};

use crate::context::Runtime;

/// Input-write policy: `(current contents, writer) -> boolean`.
pub type InputPolicy = Arc<dyn Fn(&Expr, &Value) -> Expr + Send + Sync>;

/// Output-write policy: `(current contents, writer, viewer) -> boolean`.
pub type OutputPolicy = Arc<dyn Fn(&Expr, &Value, &Value) -> Expr + Send + Sync>;

/// Outcome of [`ProtectedRef::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResult {
    /// The cell was overwritten.
    Success,
    /// The input-write policy rejected the writer; the cell is unchanged.
    Failure,
    /// The write was recorded; who observes it depends on viewer policies.
    Unknown,
}

/// A mutable, policy-guarded cell.
#[derive(Clone)]
pub struct ProtectedRef {
    value: Expr,
    input_policy: Option<InputPolicy>,
    output_policy: Option<OutputPolicy>,
}

impl ProtectedRef {
    /// A cell holding `initial`, with no write policies.
    pub fn new(initial: impl Into<Expr>) -> Self {
        Self {
            value: initial.into(),
            input_policy: None,
            output_policy: None,
        }
    }

    /// A cell that was never written. Reading it concretely raises
    /// `Error::Unassigned` until a write reaches the branch being read.
    pub fn unwritten(name: &str) -> Self {
        Self::new(Expr::unassigned(name))
    }

    /// Set the input-write policy.
    pub fn with_input_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&Expr, &Value) -> Expr + Send + Sync + 'static,
    {
        self.input_policy = Some(Arc::new(policy));
        self
    }

    /// Set the output-write policy.
    pub fn with_output_policy<F>(mut self, policy: F) -> Self
    where
        F: Fn(&Expr, &Value, &Value) -> Expr + Send + Sync + 'static,
    {
        self.output_policy = Some(Arc::new(policy));
        self
    }

    /// The current contents.
    pub fn value(&self) -> &Expr {
        &self.value
    }

    /// Write `new` on behalf of `input_ctx`, with disclosure of the change
    /// governed by the output-write policy bound to `output_ctx`.
    ///
    /// # Returns
    ///
    /// * `Ok(UpdateResult::Failure)` - The input-write policy rejected the writer.
    /// * `Ok(UpdateResult::Success)` - No output-write policy; the cell was overwritten.
    /// * `Ok(UpdateResult::Unknown)` - The write was wrapped in policy-guarded facets.
    /// * `Err` - `PolicyError::Malformed` if the input-write policy does not
    ///   produce a boolean, or any resolution error.
    pub fn update(
        &mut self,
        rt: &mut Runtime,
        input_ctx: &Value,
        output_ctx: &Value,
        new: &Expr,
    ) -> Result<UpdateResult> {
        if let Some(input_policy) = &self.input_policy {
            if !write_allowed(rt, input_policy(&self.value, input_ctx), output_ctx)? {
                debug!("Rejected write by {}", input_ctx);
                return Ok(UpdateResult::Failure);
            }
        }

        let Some(output_policy) = self.output_policy.clone() else {
            self.value = new.clone();
            return Ok(UpdateResult::Success);
        };

        let old = self.value.clone();
        let guarded = Guard {
            policy: output_policy,
            old: old.clone(),
            writer: output_ctx.clone(),
        };

        // Labels in the new value inherit the cell's output-write policy.
        let mut renames = HashMap::new();
        for label in new.labels() {
            let remapped = guarded.mint(rt, MintKind::Remap, Some(&label), true)?;
            renames.insert(label, remapped);
        }
        let new = new.relabel(&renames);

        let writer_label = guarded.mint(rt, MintKind::Writer, None, true)?;
        let mut written = Expr::facet(&writer_label, new, old.clone());

        if rt.config().track_implicit_flows {
            let path = rt.path().entries().to_vec();
            for (label, value) in path.iter().rev() {
                let path_label = guarded.mint(rt, MintKind::Path, Some(label), *value)?;
                written = Expr::facet(&path_label, written, old.clone());
            }
        }

        debug!("Recorded write by {} under writer label {}", output_ctx, writer_label);
        self.value = written;
        Ok(UpdateResult::Unknown)
    }
}

impl fmt::Debug for ProtectedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedRef")
            .field("value", &self.value)
            .field("input_policy", &self.input_policy.is_some())
            .field("output_policy", &self.output_policy.is_some())
            .finish()
    }
}

/// Resolve an input-write verdict.
///
/// A verdict that still depends on labels is resolved for `output_ctx`.
pub(crate) fn write_allowed(rt: &Runtime, verdict: Expr, output_ctx: &Value) -> Result<bool> {
    let resolved = match verdict.as_const() {
        Some(value) => value.clone(),
        None => rt.concretize(output_ctx, &verdict)?,
    };
    resolved.as_bool().ok_or_else(|| {
        PolicyError::Malformed(format!(
            "input-write policy returned {} of type {}",
            resolved,
            resolved.ty()
        ))
        .into()
    })
}

/// Why a label is minted during a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MintKind {
    /// Replaces a label embedded in the written value.
    Remap,
    /// Guards the write itself.
    Writer,
    /// Stands for one path assumption active during the write.
    Path,
}

impl MintKind {
    fn name(self) -> &'static str {
        match self {
            Self::Remap => "remap",
            Self::Writer => "writer",
            Self::Path => "path",
        }
    }
}

/// The output-write policy bound to one write.
struct Guard {
    policy: OutputPolicy,
    old: Expr,
    writer: Value,
}

impl Guard {
    /// Mint a label whose policy requires the output-write policy for the
    /// current writer, and for the original writer of `source` if it was
    /// minted by an earlier write. When `source` is given, the new label also
    /// implies `source == value`.
    fn mint(
        &self,
        rt: &mut Runtime,
        kind: MintKind,
        source: Option<&Label>,
        value: bool,
    ) -> Result<Label> {
        let label = rt.mk_label(Some(kind.name()));
        let policy = self.policy.clone();
        let old = self.old.clone();
        let writer = self.writer.clone();
        let source = source.cloned();
        let prior_writer = source.as_ref().and_then(|l| rt.writer_of(l)).cloned();
        let required_writer = prior_writer.clone();

        rt.restrict_unconditionally(&label, move |viewer| {
            let mut parts = vec![policy(&old, &writer, viewer)];
            if let Some(prior) = &required_writer {
                parts.push(policy(&old, prior, viewer));
            }
            if let Some(source) = &source {
                let lit = Expr::var(source);
                parts.push(if value {
                    lit
                } else {
                    Expr::unary(UnaryOp::Not, lit)
                });
            }
            parts
                .into_iter()
                .reduce(|acc, part| Expr::binary(BinaryOp::And, acc, part))
                .unwrap_or_else(|| Expr::from(true))
        })?;

        // A remapped label keeps the writer of the label it replaces.
        let provenance = match (kind, &prior_writer) {
            (MintKind::Remap, Some(prior)) => prior.clone(),
            _ => self.writer.clone(),
        };
        rt.record_writer(&label, provenance);
        Ok(label)
    }
}
