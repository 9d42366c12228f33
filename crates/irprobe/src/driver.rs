//! The `get_compiler_ir` entry point.

use std::fmt;
use std::sync::{Arc, OnceLock};

use irprobe_compiler::{CompilerClient, LocalClient};
use irprobe_runtime::{Device, ExecutionContext, TensorHandle};

use crate::arguments::{self, check_input_count};
use crate::cache::{DeviceCompiler, DeviceCompilerCache};
use crate::compile::compile;
use crate::error::DriverError;
use crate::export::{ExportStage, IrOutput, export};
use crate::locker::{VariableInfo, VariableLocks, variable_infos_from_inputs};
use crate::options::{PlatformInfo, generate_compiler_options};
use crate::resolve::resolve;

/// Builds the compiler client for a device the first time it is targeted.
pub type ClientFactory =
    dyn Fn(&Device, &PlatformInfo) -> Result<Arc<dyn CompilerClient>, DriverError> + Send + Sync;

/// Drives compilation of registered functions and exports their IR.
///
/// Owns the per-device compiler cache; one driver is meant to be shared by
/// all callers in a process.
pub struct IrDriver {
    compilers: DeviceCompilerCache,
    client_factory: Box<ClientFactory>,
}

impl IrDriver {
    /// A driver that compiles with an in-process [`LocalClient`].
    pub fn new() -> Self {
        Self::with_client_factory(|device, platform| {
            let client: Arc<dyn CompilerClient> =
                Arc::new(LocalClient::new(platform.platform, device.ordinal + 1));
            Ok(client)
        })
    }

    pub fn with_client_factory<F>(factory: F) -> Self
    where
        F: Fn(&Device, &PlatformInfo) -> Result<Arc<dyn CompilerClient>, DriverError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            compilers: DeviceCompilerCache::new(),
            client_factory: Box::new(factory),
        }
    }

    pub fn compilers(&self) -> &DeviceCompilerCache {
        &self.compilers
    }

    /// Compiles `function_name` for `device` and renders it at `stage`.
    ///
    /// With no `inputs`, argument shapes come from the function's shape
    /// annotations. Otherwise each input supplies its argument's shape, and
    /// the variables behind resource inputs stay locked until the call
    /// returns.
    pub fn get_compiler_ir(
        &self,
        stage: ExportStage,
        function_name: &str,
        device: &Device,
        context: &ExecutionContext,
        inputs: &[TensorHandle],
    ) -> Result<IrOutput, DriverError> {
        if device.is_streamless_accelerator() && stage.needs_executable() {
            return Err(DriverError::internal(format!(
                "stage {stage} is not supported on device {}, which has no bound stream",
                device.name
            )));
        }

        let resolved = resolve(function_name, context)?;
        let value_mode = !inputs.is_empty();
        log::debug!(
            "exporting '{function_name}' at {stage} on {} from {}",
            device.name,
            if value_mode { "input values" } else { "declared shapes" }
        );

        let variables: Vec<VariableInfo> = if value_mode {
            check_input_count(&resolved.function, inputs)?;
            variable_infos_from_inputs(device, inputs, &resolved.resource_args)?
        } else {
            Vec::new()
        };
        let locks = VariableLocks::acquire(&variables)?;

        let platform = PlatformInfo::from_device(device);
        let compiler = self.compilers.get_or_create(&device.name, || {
            let client = (self.client_factory)(device, &platform)?;
            Ok(DeviceCompiler::new(device.device_type, client))
        })?;
        let options = generate_compiler_options(&compiler, device, &platform);

        let args = if value_mode {
            arguments::from_values(&resolved, inputs, &locks, context)?
        } else {
            arguments::from_signature(&resolved.function)?
        };
        let result = compile(&resolved.function, &args, &options)?;
        let output = export(stage, &result, compiler.client().as_ref(), &options)?;

        compiler.release();
        drop(locks);
        Ok(output)
    }
}

impl Default for IrDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IrDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrDriver")
            .field("compilers", &self.compilers)
            .finish_non_exhaustive()
    }
}

/// [`IrDriver::get_compiler_ir`] on a process-wide driver.
pub fn get_compiler_ir(
    stage: ExportStage,
    function_name: &str,
    device: &Device,
    context: &ExecutionContext,
    inputs: &[TensorHandle],
) -> Result<IrOutput, DriverError> {
    static DRIVER: OnceLock<IrDriver> = OnceLock::new();
    DRIVER
        .get_or_init(IrDriver::new)
        .get_compiler_ir(stage, function_name, device, context, inputs)
}
