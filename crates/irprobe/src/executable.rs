//! Building one optimized executable from a lowered program.

use irprobe_compiler::{
    CompilationResult, CompilerClient, CompilerOptions, DebugOptions, ExecutableBuildOptions,
    LocalExecutable,
};

use crate::error::DriverError;

/// Build options for `result` under `options`.
pub fn build_options(
    client: &dyn CompilerClient,
    result: &CompilationResult,
    options: &CompilerOptions,
    embed_ir: bool,
) -> ExecutableBuildOptions {
    let device_ordinal = if options.device_ordinal >= 0 {
        options.device_ordinal
    } else {
        client.default_device_ordinal()
    };
    ExecutableBuildOptions {
        device_ordinal: Some(device_ordinal),
        result_layout: Some(result.output_shape.clone()),
        allocator: options.allocator.clone(),
        alias_passthrough_params: options.alias_passthrough_params,
        num_replicas: result.collective_info.map_or(1, |c| c.group_size),
        debug_options: DebugOptions {
            detailed_logging: options.detailed_logging,
            embed_ir_in_executable: embed_ir,
        },
        ..Default::default()
    }
}

/// Compiles `result` into exactly one executable.
pub fn build(
    client: &dyn CompilerClient,
    result: &CompilationResult,
    options: &CompilerOptions,
    embed_ir: bool,
) -> Result<LocalExecutable, DriverError> {
    let build_options = build_options(client, result, options, embed_ir);
    let mut executables = client.compile(&result.module, &result.input_shapes, &build_options)?;
    if executables.len() != 1 {
        return Err(DriverError::internal(format!(
            "expected one executable for '{}', got {}",
            result.module.name,
            executables.len()
        )));
    }
    executables
        .pop()
        .ok_or_else(|| DriverError::internal("executable list emptied"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::compile::compile;
    use irprobe_compiler::{Argument, CompileError, LocalClient, Platform};
    use irprobe_ir::{ElementType, HloModule, Shape};
    use irprobe_runtime::{AttrValue, DataType, DeviceType, FunctionBuilder, NodeDef};

    /// A client that returns every executable twice.
    #[derive(Debug)]
    struct DuplicatingClient(LocalClient);

    impl CompilerClient for DuplicatingClient {
        fn platform(&self) -> Platform {
            self.0.platform()
        }

        fn device_count(&self) -> i32 {
            self.0.device_count()
        }

        fn compile(
            &self,
            module: &HloModule,
            argument_layouts: &[Shape],
            options: &ExecutableBuildOptions,
        ) -> Result<Vec<LocalExecutable>, CompileError> {
            let mut exes = self.0.compile(module, argument_layouts, options)?;
            exes.extend(exes.clone());
            Ok(exes)
        }
    }

    fn lowered(client: Arc<dyn CompilerClient>) -> (CompilationResult, CompilerOptions) {
        let f = FunctionBuilder::new("sum")
            .arg("x", DataType::F32, &[4])
            .node(
                NodeDef::new("all", "CollectiveReduceV2", &["x"])
                    .with_attr("group_size", AttrValue::Int(2))
                    .with_attr("group_key", AttrValue::Int(1)),
            )
            .ret("out", DataType::F32, "all")
            .build();
        let options = CompilerOptions::new(DeviceType::Cpu, client);
        let args = [Argument::parameter("x", Shape::array(ElementType::F32, [4]))];
        (compile(&f, &args, &options).unwrap(), options)
    }

    #[test]
    fn options_follow_program() {
        let client = LocalClient::host();
        let (result, mut options) = lowered(Arc::new(client.clone()));
        options.device_ordinal = -1;
        let build = build_options(&client, &result, &options, true);
        assert_eq!(build.device_ordinal, Some(0));
        assert_eq!(build.num_replicas, 2);
        assert_eq!(build.result_layout.as_ref(), Some(&result.output_shape));
        assert!(build.debug_options.embed_ir_in_executable);
    }

    #[test]
    fn builds_replicated_executable() {
        let client: Arc<dyn CompilerClient> = Arc::new(LocalClient::host());
        let (result, options) = lowered(Arc::clone(&client));
        let exe = build(client.as_ref(), &result, &options, false).unwrap();
        assert_eq!(exe.replica_count(), 2);
        assert!(exe.hlo_proto().is_none());
    }

    #[test]
    fn more_than_one_executable_is_internal() {
        let client: Arc<dyn CompilerClient> = Arc::new(DuplicatingClient(LocalClient::host()));
        let (result, options) = lowered(Arc::clone(&client));
        let err = build(client.as_ref(), &result, &options, false).unwrap_err();
        assert!(matches!(err, DriverError::Internal(_)));
    }
}
