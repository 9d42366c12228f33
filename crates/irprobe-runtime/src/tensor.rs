//! Runtime values: tensors, resource handles and device-placed handles.

use std::fmt;
use std::sync::Arc;

use irprobe_ir::{ElementType, Literal, Shape};

use crate::context::ExecutionContext;
use crate::device::Device;
use crate::error::RuntimeError;

/// Data type of a function argument or runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Element(ElementType),
    /// A handle to a resource variable owned by a device.
    Resource,
}

impl DataType {
    pub const F32: Self = Self::Element(ElementType::F32);
    pub const S32: Self = Self::Element(ElementType::S32);

    pub fn element(self) -> Option<ElementType> {
        match self {
            Self::Element(et) => Some(et),
            Self::Resource => None,
        }
    }

    pub fn is_resource(self) -> bool {
        matches!(self, Self::Resource)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(et) => write!(f, "{et}"),
            Self::Resource => f.write_str("resource"),
        }
    }
}

impl From<ElementType> for DataType {
    fn from(et: ElementType) -> Self {
        Self::Element(et)
    }
}

/// Identifies a resource variable in a device's resource manager.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceHandle {
    /// Name of the device whose resource manager owns the variable.
    pub device: String,
    pub container: String,
    pub name: String,
    /// Declared element type of the variable's value.
    pub dtype: ElementType,
    /// Declared shape of the variable's value.
    pub dims: Vec<i64>,
}

impl ResourceHandle {
    pub fn shape(&self) -> Shape {
        Shape::array(self.dtype, self.dims.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Values(Literal),
    Resource(ResourceHandle),
}

/// A dense host-side value or a resource handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: TensorData,
}

impl Tensor {
    /// Creates a dense tensor, checking the value count against `dims`.
    pub fn new(
        element_type: ElementType,
        dims: impl Into<Vec<i64>>,
        values: Vec<f64>,
    ) -> Result<Self, RuntimeError> {
        let literal = Literal::new(element_type, dims, values)
            .map_err(|e| RuntimeError::InvalidTensor(e.to_string()))?;
        Ok(Self::from_literal(literal))
    }

    pub fn scalar(element_type: ElementType, value: f64) -> Self {
        Self::from_literal(Literal::scalar(element_type, value))
    }

    pub fn from_literal(literal: Literal) -> Self {
        Self {
            data: TensorData::Values(literal),
        }
    }

    /// A scalar tensor holding a resource handle.
    pub fn resource(handle: ResourceHandle) -> Self {
        Self {
            data: TensorData::Resource(handle),
        }
    }

    pub fn dtype(&self) -> DataType {
        match &self.data {
            TensorData::Values(lit) => DataType::Element(lit.element_type),
            TensorData::Resource(_) => DataType::Resource,
        }
    }

    /// Shape of the value. Resource handles are scalars.
    pub fn dims(&self) -> &[i64] {
        match &self.data {
            TensorData::Values(lit) => &lit.dims,
            TensorData::Resource(_) => &[],
        }
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn literal(&self) -> Option<&Literal> {
        match &self.data {
            TensorData::Values(lit) => Some(lit),
            TensorData::Resource(_) => None,
        }
    }

    pub fn resource_handle(&self) -> Option<&ResourceHandle> {
        match &self.data {
            TensorData::Resource(h) => Some(h),
            TensorData::Values(_) => None,
        }
    }

    /// Array shape of a dense tensor; `None` for resource handles.
    pub fn shape(&self) -> Option<Shape> {
        self.literal().map(Literal::shape)
    }
}

/// A tensor placed on a named device.
#[derive(Debug, Clone)]
pub struct TensorHandle {
    tensor: Arc<Tensor>,
    device: String,
}

impl TensorHandle {
    pub fn new(tensor: Tensor, device: &Device) -> Self {
        Self {
            tensor: Arc::new(tensor),
            device: device.name.clone(),
        }
    }

    pub fn tensor(&self) -> &Tensor {
        &self.tensor
    }

    pub fn device_name(&self) -> &str {
        &self.device
    }

    /// Returns a handle to the same value resident on the host device.
    pub fn copy_to_host(&self, ctx: &ExecutionContext) -> TensorHandle {
        let host = ctx.host_device();
        if self.device != host.name {
            log::debug!("copying tensor from {} to host", self.device);
        }
        Self {
            tensor: Arc::clone(&self.tensor),
            device: host.name.clone(),
        }
    }
}
