//! Compiler IR introspection.
//!
//! [`get_compiler_ir`] compiles a registered function for a device and
//! returns its IR at a chosen [`ExportStage`]: the unoptimized program as
//! text or protobuf, or the optimized program of a built executable as
//! text, protobuf, a combined program and buffer assignment payload, or a
//! Graphviz graph.
//!
//! The call runs in stages:
//!
//! 1. [`resolve`] looks the function up and classifies its arguments.
//! 2. [`arguments`] builds compiler arguments, either from declared shapes
//!    or from input values; input values that refer to variables are read
//!    under locks taken by [`locker`].
//! 3. [`cache`] supplies the device's shared compiler and [`options`]
//!    configures it.
//! 4. [`compile`] lowers the function, and [`export`] renders the stage,
//!    building an executable through [`executable`] when needed.

pub mod arguments;
pub mod cache;
pub mod compile;
mod driver;
mod error;
pub mod executable;
pub mod export;
pub mod locker;
pub mod options;
pub mod resolve;

pub use cache::{DeviceCompiler, DeviceCompilerCache, DeviceCompilerRef};
pub use driver::{ClientFactory, IrDriver, get_compiler_ir};
pub use error::{DriverError, ErrorKind};
pub use export::{ExportStage, IrOutput};
pub use locker::{VariableInfo, VariableLocks};
pub use options::PlatformInfo;
pub use resolve::ResolvedFunction;
