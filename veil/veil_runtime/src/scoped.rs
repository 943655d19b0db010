//! Thread-scoped default runtime.
//!
//! Each OS thread lazily owns one [`Runtime`], for callers that prefer not to
//! thread a handle through their code. Runtimes of different threads share
//! nothing.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use thread_local::ThreadLocal;

use veil_core::error::{Result, RuntimeError};
use veil_core::RuntimeConfig;

use crate::context::Runtime;

/// Static thread-local storage for the current runtime
static CURRENT_RUNTIME: Lazy<ThreadLocal<Mutex<Runtime>>> = Lazy::new(ThreadLocal::new);

fn current() -> &'static Mutex<Runtime> {
    CURRENT_RUNTIME.get_or(|| Mutex::new(Runtime::default()))
}

/// Run `f` against this thread's runtime.
///
/// # Errors
///
/// `RuntimeError::Reentrant` if called from inside another `with_current` on
/// the same thread.
pub fn with_current<F, R>(f: F) -> Result<R>
where
    F: FnOnce(&mut Runtime) -> Result<R>,
{
    let mut guard = current().try_lock().ok_or(RuntimeError::Reentrant)?;
    f(&mut guard)
}

/// Drop every label, policy and path assumption of this thread's runtime.
pub fn reset_current() -> Result<()> {
    with_current(Runtime::reset)
}

/// Replace this thread's runtime with a fresh one built from `config`.
pub fn configure_current(config: RuntimeConfig) -> Result<()> {
    with_current(|rt| {
        *rt = Runtime::new(config);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_core::error::Error;
    use veil_facet::{Expr, Value};
    use veil_policy::PolicyStore;

    #[test]
    fn test_state_persists_between_calls() {
        reset_current().unwrap();
        let label = with_current(|rt| {
            let label = rt.label_for_key("scoped.test");
            rt.restrict(&label, |_| Expr::from(false))?;
            Ok(label)
        })
        .unwrap();

        let seen = with_current(|rt| {
            assert!(rt.label_for_key("scoped.test").same_object(&label));
            rt.concretize(&Value::Unit, &Expr::var(&label))
        })
        .unwrap();
        assert_eq!(seen, Value::Bool(false));

        reset_current().unwrap();
        assert!(with_current(|rt| Ok(rt.policies().is_empty())).unwrap());
    }

    #[test]
    fn test_nested_use_is_rejected() {
        let err = with_current(|_| with_current(|_| Ok(()))).unwrap_err();
        assert!(matches!(err, Error::Runtime(RuntimeError::Reentrant)));
        // The outer lock was released.
        assert!(with_current(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_threads_are_isolated() {
        configure_current(RuntimeConfig::default().with_max_decisions(64)).unwrap();
        with_current(|rt| {
            let label = rt.mk_label(None);
            rt.restrict(&label, |_| Expr::from(true))
        })
        .unwrap();

        std::thread::spawn(|| {
            let (empty, budget) =
                with_current(|rt| Ok((rt.policies().is_empty(), rt.config().solver.max_decisions)))
                    .unwrap();
            assert!(empty);
            assert_eq!(budget, None);
        })
        .join()
        .unwrap();
    }
}
