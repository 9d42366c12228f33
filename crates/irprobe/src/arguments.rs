//! Compiler argument descriptors, from declared shapes or from values.
//!
//! [`from_signature`] is used when the caller passes no inputs and relies on
//! the `_output_shapes` annotation of every argument. [`from_values`] takes
//! the shape and type of each argument from a concrete input.

use irprobe_compiler::Argument;
use irprobe_ir::Shape;
use irprobe_runtime::{ExecutionContext, FunctionDef, TensorHandle};

use crate::error::DriverError;
use crate::locker::VariableLocks;
use crate::resolve::ResolvedFunction;

/// One parameter per input, shaped by the argument annotations.
pub fn from_signature(function: &FunctionDef) -> Result<Vec<Argument>, DriverError> {
    if function.arg_attrs.len() != function.arity() {
        return Err(DriverError::invalid_argument(format!(
            "function '{}' has {} shape annotations for {} arguments; it may capture a \
             variable defined outside its body, which is not supported without input values",
            function.name(),
            function.arg_attrs.len(),
            function.arity()
        )));
    }

    let mut args = Vec::with_capacity(function.arity());
    for (index, def) in function.signature.input_args.iter().enumerate() {
        let dims = function.declared_shape(index).ok_or_else(|| {
            DriverError::invalid_argument(format!(
                "argument {index} ('{}') of '{}' has no shape annotation",
                def.name,
                function.name()
            ))
        })?;
        if dims.iter().any(|&d| d < 0) {
            return Err(DriverError::invalid_argument(format!(
                "argument {index} ('{}') of '{}' has incomplete shape annotation {dims:?}",
                def.name,
                function.name()
            )));
        }
        let element_type = def.dtype.element().ok_or_else(|| {
            DriverError::invalid_argument(format!(
                "argument {index} ('{}') of '{}' is a resource and needs an input value",
                def.name,
                function.name()
            ))
        })?;
        args.push(Argument::parameter(
            def.name.clone(),
            Shape::array(element_type, dims.to_vec()),
        ));
    }
    Ok(args)
}

pub(crate) fn check_input_count(function: &FunctionDef, inputs: &[TensorHandle]) -> Result<(), DriverError> {
    if inputs.len() == function.arity() {
        return Ok(());
    }
    Err(DriverError::invalid_argument(format!(
        "function '{}' takes {} arguments but {} inputs were given",
        function.name(),
        function.arity(),
        inputs.len()
    )))
}

/// Descriptors for concrete `inputs`, classified by `resolved`.
///
/// Resource arguments are read through `variables`, which must hold the
/// locks of every index in `resolved.resource_args`.
pub fn from_values(
    resolved: &ResolvedFunction,
    inputs: &[TensorHandle],
    variables: &VariableLocks<'_>,
    context: &ExecutionContext,
) -> Result<Vec<Argument>, DriverError> {
    let function = &resolved.function;
    check_input_count(function, inputs)?;

    let mut args = Vec::with_capacity(inputs.len());
    for (index, (input, def)) in inputs.iter().zip(&function.signature.input_args).enumerate() {
        if resolved.is_resource(index) {
            let (info, value) = variables.get(index).ok_or_else(|| {
                DriverError::internal(format!("resource argument {index} is not locked"))
            })?;
            let var = info.var();
            let arg = match value.and_then(|t| t.shape()) {
                Some(shape) => Argument::resource(var.name(), shape, true),
                None => Argument::resource(var.name(), var.shape(), false),
            };
            args.push(arg);
            continue;
        }

        if resolved.is_constant(index) {
            let host = input.copy_to_host(context);
            let literal = host.tensor().literal().cloned().ok_or_else(|| {
                DriverError::invalid_argument(format!(
                    "compile-time constant argument {index} ('{}') holds a resource handle",
                    def.name
                ))
            })?;
            args.push(Argument::constant(def.name.clone(), literal));
            continue;
        }

        let shape = input.tensor().shape().ok_or_else(|| {
            DriverError::invalid_argument(format!(
                "argument {index} ('{}') holds a resource handle but is not a resource argument",
                def.name
            ))
        })?;
        args.push(Argument::parameter(def.name.clone(), shape));
    }
    Ok(args)
}
