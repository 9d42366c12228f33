//! Runtime collaborators for irprobe: the function library, tensors and
//! handles, devices with their resource managers, and the execution context.

mod context;
mod device;
mod error;
mod function;
mod library;
pub mod ops;
mod resource;
mod tensor;

pub use context::ExecutionContext;
pub use device::{AcceleratorInfo, Allocator, Device, DeviceType, Stream};
pub use error::RuntimeError;
pub use function::{
    ArgDef, AttrValue, FunctionBuilder, FunctionDef, NodeDef, OUTPUT_SHAPES_ATTR, Signature,
    parse_input,
};
pub use library::FunctionLibrary;
pub use resource::{ResourceManager, Var, VarGuard};
pub use tensor::{DataType, ResourceHandle, Tensor, TensorData, TensorHandle};
