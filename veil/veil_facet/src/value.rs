//! Resolved leaf values.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;

/// A resolved value.
///
/// Lists hold expressions rather than values so that a list of faceted
/// elements can be represented without first resolving every element.
#[derive(Clone, Debug)]
pub enum Value {
    /// The unit value, returned by branches evaluated only for their effects.
    Unit,

    /// A boolean.
    Bool(bool),

    /// A signed integer.
    Int(i64),

    /// A string.
    Str(Arc<str>),

    /// A sequence of (possibly faceted) elements.
    List(Arc<[Expr]>),

    /// An opaque host object, compared by identity.
    Object(Object),
}

/// The type of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// See [`Value::Unit`].
    Unit,
    /// See [`Value::Bool`].
    Bool,
    /// See [`Value::Int`].
    Int,
    /// See [`Value::Str`].
    Str,
    /// See [`Value::List`].
    List,
    /// See [`Value::Object`].
    Object,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Str => "str",
            Self::List => "list",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Build a list value from elements.
    pub fn list(elements: impl IntoIterator<Item = Expr>) -> Self {
        Self::List(elements.into_iter().collect::<Vec<_>>().into())
    }

    /// The type of this value.
    pub fn ty(&self) -> ValueType {
        match self {
            Self::Unit => ValueType::Unit,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Str(_) => ValueType::Str,
            Self::List(_) => ValueType::List,
            Self::Object(_) => ValueType::Object,
        }
    }

    /// Get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the elements of a list value.
    pub fn as_list(&self) -> Option<&[Expr]> {
        match self {
            Self::List(elements) => Some(elements),
            _ => None,
        }
    }

    /// Get the wrapped host object.
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Unit, Self::Unit) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.same_leaf(y)))
            }
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => write!(f, "()"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Str(s) => write!(f, "\"{}\"", s),
            Self::List(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Self::Object(object) => write!(f, "<{}>", object.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(s.into())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Unit
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

/// An opaque host object.
///
/// Objects are immutable once wrapped and compare by identity: two objects
/// are equal only if they are clones of the same handle.
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Object {
    /// Wrap a host value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Borrow the wrapped value as `T`, if it has that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The Rust type name of the wrapped value.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object<{}>", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Principal {
        name: &'static str,
    }

    #[test]
    fn test_object_identity() {
        let alice = Object::new(Principal { name: "alice" });
        let also_alice = Object::new(Principal { name: "alice" });

        assert_eq!(Value::from(alice.clone()), Value::from(alice.clone()));
        assert_ne!(Value::from(alice.clone()), Value::from(also_alice));
        assert_eq!(
            alice.downcast_ref::<Principal>().map(|p| p.name),
            Some("alice")
        );
        assert!(alice.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_list_equality() {
        let a = Value::list(vec![Expr::from(1), Expr::from(2)]);
        let b = Value::list(vec![Expr::from(1), Expr::from(2)]);
        let c = Value::list(vec![Expr::from(2)]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("hi").to_string(), "\"hi\"");
        assert_eq!(Value::list(vec![Expr::from(1), Expr::from(true)]).to_string(), "[1, true]");
        assert_eq!(ValueType::Int.to_string(), "int");
    }
}
