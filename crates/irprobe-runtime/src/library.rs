//! Registry of function bodies by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::function::FunctionDef;

#[derive(Debug, Default)]
pub struct FunctionLibrary {
    functions: BTreeMap<String, Arc<FunctionDef>>,
}

impl FunctionLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under its signature name.
    pub fn register(&mut self, function: FunctionDef) -> Result<(), RuntimeError> {
        let name = function.name().to_string();
        if self.functions.contains_key(&name) {
            return Err(RuntimeError::DuplicateFunction(name));
        }
        log::debug!("registered function '{name}'");
        self.functions.insert(name, Arc::new(function));
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
