//! Devices, their execution streams and allocators.

use std::fmt;
use std::sync::Arc;

use crate::resource::ResourceManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Cpu,
    Gpu,
    Tpu,
}

impl DeviceType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Gpu => "GPU",
            Self::Tpu => "TPU",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An execution stream bound to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stream {
    pub device_ordinal: i32,
}

/// Accelerator-specific information. A device without a bound stream runs
/// through an asynchronous runtime and compiles for offload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceleratorInfo {
    pub stream: Option<Stream>,
}

/// Memory allocator handed to the compiler for temporary buffers.
#[derive(Debug, PartialEq, Eq)]
pub struct Allocator {
    name: String,
}

impl Allocator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct Device {
    /// Full device name, e.g. `/device:CPU:0`. Also the device identity.
    pub name: String,
    pub device_type: DeviceType,
    pub ordinal: i32,
    pub accelerator: Option<AcceleratorInfo>,
    /// Set for devices that keep tensors in compiler-managed memory.
    pub on_xla_device: bool,
    resources: Arc<ResourceManager>,
    allocator: Arc<Allocator>,
}

impl Device {
    fn with_parts(device_type: DeviceType, ordinal: i32, accelerator: Option<AcceleratorInfo>) -> Self {
        let name = format!("/device:{device_type}:{ordinal}");
        let allocator = match device_type {
            DeviceType::Cpu => Allocator::new("host"),
            _ => Allocator::new(format!("{device_type}_{ordinal}_bfc")),
        };
        Self {
            name,
            device_type,
            ordinal,
            accelerator,
            on_xla_device: false,
            resources: Arc::new(ResourceManager::new()),
            allocator: Arc::new(allocator),
        }
    }

    /// A host CPU device.
    pub fn cpu(ordinal: i32) -> Self {
        Self::with_parts(DeviceType::Cpu, ordinal, None)
    }

    /// A GPU with a stream bound to the same ordinal.
    pub fn gpu(ordinal: i32) -> Self {
        Self::with_parts(
            DeviceType::Gpu,
            ordinal,
            Some(AcceleratorInfo {
                stream: Some(Stream {
                    device_ordinal: ordinal,
                }),
            }),
        )
    }

    /// A TPU driven through an asynchronous runtime, with no bound stream.
    pub fn tpu_async(ordinal: i32) -> Self {
        let mut device = Self::with_parts(DeviceType::Tpu, ordinal, Some(AcceleratorInfo::default()));
        device.on_xla_device = true;
        device
    }

    /// The stream bound to this device, if any.
    pub fn stream(&self) -> Option<Stream> {
        self.accelerator.as_ref().and_then(|a| a.stream)
    }

    /// `true` for accelerator devices with no bound stream.
    pub fn is_streamless_accelerator(&self) -> bool {
        self.device_type != DeviceType::Cpu
            && self.accelerator.as_ref().is_some_and(|a| a.stream.is_none())
    }

    pub fn resource_manager(&self) -> &ResourceManager {
        &self.resources
    }

    pub fn allocator(&self) -> Arc<Allocator> {
        Arc::clone(&self.allocator)
    }
}
