//! Resource variables and the per-device store that owns them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use irprobe_ir::{ElementType, Shape};

use crate::error::RuntimeError;
use crate::tensor::Tensor;

/// A mutable variable. The value is `None` until first assigned.
#[derive(Debug)]
pub struct Var {
    name: String,
    dtype: ElementType,
    dims: Vec<i64>,
    value: Mutex<Option<Tensor>>,
}

/// Exclusive access to a variable's value.
pub type VarGuard<'a> = MutexGuard<'a, Option<Tensor>>;

impl Var {
    /// An uninitialized variable with a declared type and shape.
    pub fn new(name: impl Into<String>, dtype: ElementType, dims: impl Into<Vec<i64>>) -> Self {
        Self {
            name: name.into(),
            dtype,
            dims: dims.into(),
            value: Mutex::new(None),
        }
    }

    /// A variable initialized to `value`, taking its type and shape from it.
    pub fn with_value(name: impl Into<String>, value: Tensor) -> Result<Self, RuntimeError> {
        let name = name.into();
        let dtype = value.dtype().element().ok_or_else(|| {
            RuntimeError::InvalidTensor(format!("variable '{name}' cannot hold a resource handle"))
        })?;
        let dims = value.dims().to_vec();
        Ok(Self {
            name,
            dtype,
            dims,
            value: Mutex::new(Some(value)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> ElementType {
        self.dtype
    }

    pub fn shape(&self) -> Shape {
        Shape::array(self.dtype, self.dims.clone())
    }

    /// Blocks until the variable's lock is held.
    pub fn lock(&self) -> Result<VarGuard<'_>, RuntimeError> {
        self.value
            .lock()
            .map_err(|_| RuntimeError::PoisonedLock(self.name.clone()))
    }

    /// Returns `true` if another holder currently owns the lock.
    pub fn is_locked(&self) -> bool {
        matches!(
            self.value.try_lock(),
            Err(std::sync::TryLockError::WouldBlock)
        )
    }
}

/// Variables owned by one device, keyed by container and name.
#[derive(Debug, Default)]
pub struct ResourceManager {
    vars: Mutex<HashMap<(String, String), Arc<Var>>>,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `var`, replacing any variable with the same key.
    pub fn create(&self, container: &str, var: Var) -> Arc<Var> {
        let var = Arc::new(var);
        let key = (container.to_string(), var.name().to_string());
        log::debug!("creating variable '{}/{}'", key.0, key.1);
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&var));
        var
    }

    pub fn lookup(&self, container: &str, name: &str) -> Option<Arc<Var>> {
        self.vars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(container.to_string(), name.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.vars.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup() {
        let rm = ResourceManager::new();
        let v = rm.create("c", Var::new("v", ElementType::F32, [2]));
        let found = rm.lookup("c", "v").unwrap();
        assert!(Arc::ptr_eq(&v, &found));
        assert!(rm.lookup("other", "v").is_none());
        assert_eq!(rm.len(), 1);
    }

    #[test]
    fn lock_state_is_observable() {
        let v = Var::new("v", ElementType::F32, [2]);
        assert!(!v.is_locked());
        let guard = v.lock().unwrap();
        assert!(v.is_locked());
        assert!(guard.is_none());
        drop(guard);
        assert!(!v.is_locked());
    }

    #[test]
    fn initialized_variable_takes_value_shape() {
        let v = Var::with_value("w", Tensor::new(ElementType::F32, [3], vec![1.0, 2.0, 3.0]).unwrap())
            .unwrap();
        assert_eq!(v.shape(), Shape::array(ElementType::F32, [3]));
        assert!(v.lock().unwrap().is_some());
    }

    #[test]
    fn poisoned_lock_is_reported() {
        let v = Arc::new(Var::new("p", ElementType::F32, Vec::new()));
        let v2 = Arc::clone(&v);
        let _ = std::thread::spawn(move || {
            let _g = v2.lock().unwrap();
            panic!("poison");
        })
        .join();
        assert!(matches!(v.lock(), Err(RuntimeError::PoisonedLock(n)) if n == "p"));
    }
}
