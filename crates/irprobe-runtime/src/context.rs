//! The execution context a call runs in.

use std::sync::Arc;

use crate::device::Device;
use crate::library::FunctionLibrary;

/// Owns the function library and the host device.
#[derive(Debug)]
pub struct ExecutionContext {
    library: FunctionLibrary,
    host: Arc<Device>,
}

impl ExecutionContext {
    pub fn new(library: FunctionLibrary) -> Self {
        Self {
            library,
            host: Arc::new(Device::cpu(0)),
        }
    }

    pub fn library(&self) -> &FunctionLibrary {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut FunctionLibrary {
        &mut self.library
    }

    pub fn host_device(&self) -> &Device {
        &self.host
    }
}
