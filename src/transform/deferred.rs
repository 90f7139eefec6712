//! Deferred values
//!
//! A [`DeferredValue`] holds a one-shot computation and memoizes its result.
//! The first `force` runs it; every later or concurrent `force` observes the
//! same result without running it again.

use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::diagnostics::ContentError;

/// A transformed leaf together with the errors its collaborators reported
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformedValue {
    pub value: Value,
    pub errors: Vec<ContentError>,
}

type Compute = Box<dyn FnOnce() -> TransformedValue + Send>;

struct Inner {
    value: OnceLock<TransformedValue>,
    compute: Mutex<Option<Compute>>,
}

/// Memoized, lazily computed transformed value. Clones share one result.
#[derive(Clone)]
pub struct DeferredValue {
    inner: Arc<Inner>,
}

impl DeferredValue {
    pub fn new(compute: impl FnOnce() -> TransformedValue + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: OnceLock::new(),
                compute: Mutex::new(Some(Box::new(compute))),
            }),
        }
    }

    /// An already computed value
    pub fn ready(value: TransformedValue) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: OnceLock::from(value),
                compute: Mutex::new(None),
            }),
        }
    }

    /// Compute on first use; later calls return the memoized result
    pub fn force(&self) -> &TransformedValue {
        self.inner.value.get_or_init(|| {
            let compute = self.inner.compute.lock().take();
            compute.map(|compute| compute()).unwrap_or_default()
        })
    }

    pub fn is_forced(&self) -> bool {
        self.inner.value.get().is_some()
    }
}

impl fmt::Debug for DeferredValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.value.get() {
            Some(value) => f.debug_tuple("DeferredValue").field(value).finish(),
            None => f.write_str("DeferredValue(<pending>)"),
        }
    }
}
