use irprobe_compiler::{Argument, CompilationResult, CompileOptions, CompilerOptions, FunctionCompiler};
use irprobe_runtime::FunctionDef;

use crate::error::DriverError;

/// Lowering settings for exported programs: outputs stay individually
/// addressable and resource updates alias their inputs.
pub fn compile_options() -> CompileOptions {
    CompileOptions {
        always_return_tuple: false,
        alias_resource_update: true,
        ..Default::default()
    }
}

/// Lowers `function` with `args` into an unoptimized program.
pub fn compile(
    function: &FunctionDef,
    args: &[Argument],
    options: &CompilerOptions,
) -> Result<CompilationResult, DriverError> {
    let compiler = FunctionCompiler::new(options.clone());
    Ok(compiler.compile_function(&compile_options(), function, args)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use irprobe_compiler::{CompileError, LocalClient};
    use irprobe_ir::{ElementType, Shape};
    use irprobe_runtime::{DataType, DeviceType, FunctionBuilder, NodeDef};

    fn options() -> CompilerOptions {
        CompilerOptions::new(DeviceType::Cpu, Arc::new(LocalClient::host()))
    }

    #[test]
    fn single_output_is_not_wrapped() {
        let f = FunctionBuilder::new("neg")
            .arg("x", DataType::F32, &[3])
            .node(NodeDef::new("n", "Neg", &["x"]))
            .ret("out", DataType::F32, "n")
            .build();
        let shape = Shape::array(ElementType::F32, [3]);
        let result = compile(&f, &[Argument::parameter("x", shape.clone())], &options()).unwrap();
        assert_eq!(result.output_shape, shape);
        assert_eq!(result.module.entry, "neg");
    }

    #[test]
    fn compiler_errors_pass_through() {
        let f = FunctionBuilder::new("bad")
            .arg("x", DataType::F32, &[3])
            .node(NodeDef::new("n", "Fft", &["x"]))
            .ret("out", DataType::F32, "n")
            .build();
        let shape = Shape::array(ElementType::F32, [3]);
        let err = compile(&f, &[Argument::parameter("x", shape)], &options()).unwrap_err();
        assert!(matches!(
            err,
            DriverError::Compile(CompileError::UnsupportedOp { ref op, .. }) if op == "Fft"
        ));
    }
}
