//! Compiler options derived from the target device.

use std::sync::Arc;

use irprobe_compiler::{CompilerOptions, Platform};
use irprobe_runtime::{Allocator, Device, DeviceType};

use crate::cache::DeviceCompiler;

/// Platform facts about a device that shape its compiler configuration.
#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub device_type: DeviceType,
    pub platform: Platform,
    /// The device keeps tensors in compiler-managed memory.
    pub on_xla_device: bool,
    pub allocator: Arc<Allocator>,
}

impl PlatformInfo {
    pub fn from_device(device: &Device) -> Self {
        Self {
            device_type: device.device_type,
            platform: Platform::for_device_type(device.device_type),
            on_xla_device: device.on_xla_device,
            allocator: device.allocator(),
        }
    }
}

/// Picks the configuration for `device`: the offload configuration for a
/// TPU without a bound stream, the standard one otherwise.
pub fn generate_compiler_options(
    compiler: &DeviceCompiler,
    device: &Device,
    platform: &PlatformInfo,
) -> CompilerOptions {
    if platform.device_type == DeviceType::Tpu && device.stream().is_none() {
        offload_options(compiler)
    } else {
        standard_options(compiler, device, platform, false)
    }
}

/// Options for a device driven by an asynchronous runtime. The runtime owns
/// placement, so no allocator or device-specific behavior is requested.
fn offload_options(compiler: &DeviceCompiler) -> CompilerOptions {
    let mut options = CompilerOptions::new(compiler.device_type(), Arc::clone(compiler.client()));
    options.detailed_logging = false;
    options
}

fn standard_options(
    compiler: &DeviceCompiler,
    device: &Device,
    platform: &PlatformInfo,
    has_ref_vars: bool,
) -> CompilerOptions {
    let mut options = CompilerOptions::new(compiler.device_type(), Arc::clone(compiler.client()));
    if let Some(stream) = device.stream() {
        options.device_ordinal = stream.device_ordinal;
    }
    options.allocator = Some(Arc::clone(&platform.allocator));
    // Reference variables may be mutated behind the program's back.
    options.alias_passthrough_params = !has_ref_vars && !platform.on_xla_device;
    options.detailed_logging = true;
    options.allow_cpu_custom_calls = platform.platform == Platform::Host;
    options
}
