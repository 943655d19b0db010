//! Decision atoms.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use veil_core::id::LabelId;

/// An opaque boolean decision atom.
///
/// Labels compare by identity: two labels are equal only if they share the
/// same identifier. A fresh label never equals any other label, whatever its
/// name. Labels acquired through a stable key share an identifier derived from
/// that key.
#[derive(Clone)]
pub struct Label {
    inner: Arc<LabelInner>,
}

struct LabelInner {
    id: LabelId,
    name: Option<String>,
    key: Option<String>,
}

impl Label {
    /// Mint a fresh label, optionally named for diagnostics.
    pub fn fresh(name: Option<&str>) -> Self {
        Self {
            inner: Arc::new(LabelInner {
                id: LabelId::new(),
                name: name.map(str::to_string),
                key: None,
            }),
        }
    }

    /// Create the label deterministically associated with a stable key.
    ///
    /// Callers that need the *same object* for repeated acquisitions should go
    /// through the runtime's label registry rather than calling this directly.
    pub fn from_stable_key(key: &str) -> Self {
        Self {
            inner: Arc::new(LabelInner {
                id: LabelId::from_stable_key(key),
                name: Some(key.to_string()),
                key: Some(key.to_string()),
            }),
        }
    }

    /// The identifier of this label.
    pub fn id(&self) -> LabelId {
        self.inner.id
    }

    /// The diagnostic name, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The stable key this label was acquired by, if any.
    pub fn stable_key(&self) -> Option<&str> {
        self.inner.key.as_deref()
    }

    /// Whether two handles point at the very same label object.
    pub fn same_object(&self, other: &Label) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Label {}

impl Hash for Label {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.id.cmp(&other.inner.id)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => write!(f, "{}@{}", name, self.inner.id.short()),
            None => write!(f, "L@{}", self.inner.id.short()),
        }
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_labels_are_distinct() {
        let a = Label::fresh(Some("x"));
        let b = Label::fresh(Some("x"));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a.same_object(&a.clone()));
    }

    #[test]
    fn test_stable_key_identity() {
        let a = Label::from_stable_key("doc.body#1");
        let b = Label::from_stable_key("doc.body#1");
        assert_eq!(a, b);
        assert!(!a.same_object(&b));
        assert_eq!(a.stable_key(), Some("doc.body#1"));
    }

    #[test]
    fn test_display() {
        let named = Label::fresh(Some("secret"));
        assert!(named.to_string().starts_with("secret@"));
        let anonymous = Label::fresh(None);
        assert!(anonymous.to_string().starts_with("L@"));
    }
}
