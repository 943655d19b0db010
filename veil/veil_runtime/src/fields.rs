//! Field policies for records.
//!
//! Read and write policies of record fields live in an explicit
//! [`FieldPolicyTable`] keyed by `(type, field)`. A [`FacetedRecord`] consults
//! the table whenever a field is written: the stored value becomes a facet on
//! the field's label, `value` for viewers the read policy admits and the
//! policy's low value for everyone else.
//!
//! The label of a field is acquired by the stable key
//! `"{type}.{field}#{record id}"`, so every write to the same field of the
//! same record shares one label and one registered policy. That policy is
//! evaluated against the record as it is when a viewer resolves the label,
//! not as it was at the first write.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use veil_core::error::{PolicyError, Result};
use veil_core::RecordId;
use veil_facet::{Expr, Value};

use crate::context::Runtime;
use crate::protected::{write_allowed, InputPolicy, UpdateResult};
use crate::sparse::FacetedRows;

/// Read policy of a field: `(record, viewer) -> boolean`.
pub type ReadPolicy = Arc<dyn Fn(&FacetedRecord, &Value) -> Expr + Send + Sync>;

/// Produces the value shown to viewers the read policy rejects.
pub type LowValue = Arc<dyn Fn(&Expr) -> Expr + Send + Sync>;

/// The policies attached to one field.
#[derive(Clone)]
pub struct FieldPolicy {
    read: ReadPolicy,
    low: LowValue,
    write: Option<InputPolicy>,
}

impl FieldPolicy {
    /// A field readable by viewers `read` admits. Other viewers see unit.
    pub fn new<F>(read: F) -> Self
    where
        F: Fn(&FacetedRecord, &Value) -> Expr + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
            low: Arc::new(|_| Expr::unit()),
            write: None,
        }
    }

    /// Set the low-value generator. It receives the value being written.
    pub fn with_low<F>(mut self, low: F) -> Self
    where
        F: Fn(&Expr) -> Expr + Send + Sync + 'static,
    {
        self.low = Arc::new(low);
        self
    }

    /// Set the write policy: `(current contents, writer) -> boolean`.
    pub fn with_write_policy<F>(mut self, write: F) -> Self
    where
        F: Fn(&Expr, &Value) -> Expr + Send + Sync + 'static,
    {
        self.write = Some(Arc::new(write));
        self
    }
}

impl fmt::Debug for FieldPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPolicy")
            .field("write", &self.write.is_some())
            .finish_non_exhaustive()
    }
}

/// Mapping from `(type, field)` to the field's policies.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicyTable {
    policies: HashMap<(String, String), FieldPolicy>,
}

impl FieldPolicyTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the policies of `type_name.field`.
    ///
    /// # Errors
    ///
    /// `PolicyError::DuplicateFieldPolicy` if the field already has one.
    pub fn register(&mut self, type_name: &str, field: &str, policy: FieldPolicy) -> Result<()> {
        let key = (type_name.to_string(), field.to_string());
        if self.policies.contains_key(&key) {
            return Err(PolicyError::DuplicateFieldPolicy {
                type_name: key.0,
                field: key.1,
            }
            .into());
        }
        debug!("Registered field policy for {}.{}", type_name, field);
        self.policies.insert(key, policy);
        Ok(())
    }

    /// The policies of `type_name.field`, if any.
    pub fn get(&self, type_name: &str, field: &str) -> Option<&FieldPolicy> {
        self.policies
            .get(&(type_name.to_string(), field.to_string()))
    }

    /// Number of fields with registered policies.
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Whether no field has a registered policy.
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// A record whose fields hold faceted values.
///
/// Clones share the same fields, so a registered read policy always sees the
/// record's current contents.
#[derive(Debug, Clone)]
pub struct FacetedRecord {
    type_name: String,
    id: RecordId,
    fields: Arc<RwLock<HashMap<String, Expr>>>,
}

impl FacetedRecord {
    /// A record with a fresh identifier and no fields.
    pub fn new(type_name: &str) -> Self {
        Self::with_id(type_name, RecordId::new())
    }

    /// A record whose identifier is derived from `key`, so a record reloaded
    /// under the same key gets the same field labels.
    pub fn with_key(type_name: &str, key: &str) -> Self {
        Self::with_id(type_name, RecordId::from_stable_key(key))
    }

    fn with_id(type_name: &str, id: RecordId) -> Self {
        Self {
            type_name: type_name.to_string(),
            id,
            fields: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The record type, the first half of every field-policy key.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The record identifier, part of every field label key.
    pub fn id(&self) -> RecordId {
        self.id
    }

    fn field_name(&self, field: &str) -> String {
        format!("{}.{}", self.type_name, field)
    }

    /// The faceted contents of `field`. A field never written holds the
    /// unassigned marker.
    pub fn get(&self, field: &str) -> Expr {
        self.fields
            .read()
            .get(field)
            .cloned()
            .unwrap_or_else(|| Expr::unassigned(&self.field_name(field)))
    }

    /// Resolve `field` for the viewer `ctx`.
    pub fn read(&self, rt: &Runtime, ctx: &Value, field: &str) -> Result<Value> {
        rt.concretize(ctx, &self.get(field))
    }

    /// Write `value` to `field` on behalf of `writer`.
    ///
    /// The write is folded into the current path, so a write made inside a
    /// branch only replaces the field on that branch.
    ///
    /// # Returns
    ///
    /// * `Ok(UpdateResult::Failure)` - The field's write policy rejected the writer.
    /// * `Ok(UpdateResult::Success)` - The field was written.
    /// * `Err` - `PolicyError::Malformed` if the write policy does not produce
    ///   a boolean, or any resolution error.
    pub fn set(
        &mut self,
        rt: &mut Runtime,
        table: &FieldPolicyTable,
        writer: &Value,
        field: &str,
        value: impl Into<Expr>,
    ) -> Result<UpdateResult> {
        let value = value.into();
        let old = self.get(field);

        let Some(policy) = table.get(&self.type_name, field) else {
            let written = rt.assign(&old, &value);
            self.fields.write().insert(field.to_string(), written);
            return Ok(UpdateResult::Success);
        };

        if let Some(write) = &policy.write {
            if !write_allowed(rt, write(&old, writer), writer)? {
                debug!("Rejected write of {} by {}", self.field_name(field), writer);
                return Ok(UpdateResult::Failure);
            }
        }

        let key = format!("{}#{}", self.field_name(field), self.id);
        let (label, created) = rt.acquire_label(&key);
        let low = (policy.low)(&value);
        let guarded = Expr::facet(&label, value, low);
        let written = rt.assign(&old, &guarded);
        self.fields.write().insert(field.to_string(), written);

        if created {
            let read = policy.read.clone();
            let live = self.clone();
            rt.restrict_unconditionally(&label, move |viewer| read(&live, viewer))?;
        }
        Ok(UpdateResult::Success)
    }

    /// The rows representing `field` for storage.
    pub fn store_field(&self, field: &str) -> Result<FacetedRows> {
        let mut rows = FacetedRows::from_facet(&self.get(field))?;
        rows.collapse();
        Ok(rows)
    }

    /// Replace `field` with the value stored as `rows`.
    pub fn load_field(&mut self, field: &str, rows: &FacetedRows) -> Result<()> {
        let value = rows.to_value_facet(&self.field_name(field))?;
        self.fields.write().insert(field.to_string(), value);
        Ok(())
    }
}
