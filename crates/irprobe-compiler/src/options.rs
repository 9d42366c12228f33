//! Option structs for lowering and executable building.

use std::fmt;
use std::sync::Arc;

use irprobe_ir::Shape;
use irprobe_opt::OptLevel;
use irprobe_runtime::{Allocator, DeviceType};

use crate::client::CompilerClient;

/// The platform a compiler client targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Host,
    Cuda,
    Tpu,
}

impl Platform {
    pub fn for_device_type(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Cpu => Self::Host,
            DeviceType::Gpu => Self::Cuda,
            DeviceType::Tpu => Self::Tpu,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Host => "Host",
            Self::Cuda => "CUDA",
            Self::Tpu => "TPU",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration of a function compiler for one device.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub device_type: DeviceType,
    /// Client that builds executables for the device.
    pub client: Arc<dyn CompilerClient>,
    pub device_ordinal: i32,
    /// Allocator for temporary buffers; `None` lets the client choose.
    pub allocator: Option<Arc<Allocator>>,
    /// Outputs that are unmodified parameters share the parameter buffer.
    pub alias_passthrough_params: bool,
    pub detailed_logging: bool,
    pub allow_cpu_custom_calls: bool,
}

impl CompilerOptions {
    /// Options with the client's default ordinal and no aliasing.
    pub fn new(device_type: DeviceType, client: Arc<dyn CompilerClient>) -> Self {
        let device_ordinal = client.default_device_ordinal();
        Self {
            device_type,
            client,
            device_ordinal,
            allocator: None,
            alias_passthrough_params: false,
            detailed_logging: true,
            allow_cpu_custom_calls: false,
        }
    }
}

/// Per-compilation settings for lowering a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Wrap the result in a tuple even when there is a single output.
    pub always_return_tuple: bool,
    /// Alias each resource update output with the variable's parameter.
    pub alias_resource_update: bool,
    pub is_entry_computation: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            always_return_tuple: true,
            alias_resource_update: false,
            is_entry_computation: true,
        }
    }
}

/// Debugging switches carried into the executable build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugOptions {
    /// Log the optimized module after the build.
    pub detailed_logging: bool,
    /// Keep the optimized module and buffer assignment in the executable.
    pub embed_ir_in_executable: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            detailed_logging: true,
            embed_ir_in_executable: false,
        }
    }
}

/// Settings for building an executable from a program.
#[derive(Debug, Clone)]
pub struct ExecutableBuildOptions {
    /// `None` uses the client's default device.
    pub device_ordinal: Option<i32>,
    pub result_layout: Option<Shape>,
    pub allocator: Option<Arc<Allocator>>,
    pub alias_passthrough_params: bool,
    pub num_replicas: u32,
    pub opt_level: OptLevel,
    pub debug_options: DebugOptions,
}

impl Default for ExecutableBuildOptions {
    fn default() -> Self {
        Self {
            device_ordinal: None,
            result_layout: None,
            allocator: None,
            alias_passthrough_params: false,
            num_replicas: 1,
            opt_level: OptLevel::default(),
            debug_options: DebugOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LocalClient;

    #[test]
    fn compiler_options_use_client_default() {
        let client = Arc::new(LocalClient::new(Platform::Cuda, 2));
        let opts = CompilerOptions::new(DeviceType::Gpu, client);
        assert_eq!(opts.device_ordinal, 0);
        assert!(opts.allocator.is_none());
    }

    #[test]
    fn defaults() {
        let opts = CompileOptions::default();
        assert!(opts.always_return_tuple);
        assert!(!opts.alias_resource_update);
        let build = ExecutableBuildOptions::default();
        assert_eq!(build.num_replicas, 1);
        assert!(!build.debug_options.embed_ir_in_executable);
    }

    #[test]
    fn platform_for_device() {
        assert_eq!(Platform::for_device_type(DeviceType::Cpu), Platform::Host);
        assert_eq!(Platform::for_device_type(DeviceType::Tpu).to_string(), "TPU");
    }
}
