//! Function lookup and argument classification.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use irprobe_runtime::{ExecutionContext, FunctionDef, ops, parse_input};

use crate::error::DriverError;

/// A function body with its arguments classified by how they reach the
/// compiler. Both index lists are ascending and disjoint.
#[derive(Debug, Clone)]
pub struct ResolvedFunction {
    pub function: Arc<FunctionDef>,
    /// Arguments whose value must be known at compile time.
    pub constant_args: Vec<usize>,
    /// Arguments that refer to resource variables.
    pub resource_args: Vec<usize>,
}

impl ResolvedFunction {
    pub fn is_constant(&self, index: usize) -> bool {
        self.constant_args.binary_search(&index).is_ok()
    }

    pub fn is_resource(&self, index: usize) -> bool {
        self.resource_args.binary_search(&index).is_ok()
    }
}

/// Looks up `name` in the context's library and classifies its arguments.
pub fn resolve(name: &str, context: &ExecutionContext) -> Result<ResolvedFunction, DriverError> {
    let function = context
        .library()
        .find(name)
        .ok_or_else(|| DriverError::NotFound(name.to_string()))?;
    let (constant_args, resource_args) = classify(&function)?;
    log::debug!(
        "resolved '{name}': {} args, constant {constant_args:?}, resource {resource_args:?}",
        function.arity()
    );
    Ok(ResolvedFunction {
        function,
        constant_args,
        resource_args,
    })
}

/// Splits argument indices into compile-time constants and resources.
///
/// An argument is a compile-time constant when it reaches a constant-only
/// op input, directly or through forwarding ops.
pub fn classify(function: &FunctionDef) -> Result<(Vec<usize>, Vec<usize>), DriverError> {
    let resource_args: BTreeSet<usize> = function
        .signature
        .input_args
        .iter()
        .enumerate()
        .filter(|(_, arg)| arg.dtype.is_resource())
        .map(|(i, _)| i)
        .collect();

    // Node outputs that forward an argument unchanged, keyed by (node, output).
    let mut forwarded: HashMap<(&str, usize), usize> = HashMap::new();
    let mut defined: HashSet<&str> = HashSet::new();
    let mut constant_args = BTreeSet::new();

    for node in &function.nodes {
        let mut origins = Vec::with_capacity(node.inputs.len());
        for input in &node.inputs {
            let (source, output) = parse_input(input);
            let origin = match function.input_index(source) {
                Some(arg) => Some(arg),
                None if defined.contains(source) => forwarded.get(&(source, output)).copied(),
                None => {
                    return Err(DriverError::invalid_argument(format!(
                        "cannot classify arguments of '{}': node '{}' reads unknown input '{input}'",
                        function.name(),
                        node.name
                    )));
                }
            };
            origins.push(origin);
        }

        for &position in ops::compile_time_const_inputs(&node.op) {
            if let Some(Some(arg)) = origins.get(position) {
                constant_args.insert(*arg);
            }
        }
        if ops::is_forwarding(&node.op) {
            for (output, origin) in origins.iter().enumerate() {
                if let Some(arg) = origin {
                    forwarded.insert((node.name.as_str(), output), *arg);
                }
            }
        }
        defined.insert(node.name.as_str());
    }

    if let Some(both) = constant_args.intersection(&resource_args).next() {
        return Err(DriverError::invalid_argument(format!(
            "argument {both} of '{}' is used both as a compile-time constant and as a resource",
            function.name()
        )));
    }
    Ok((
        constant_args.into_iter().collect(),
        resource_args.into_iter().collect(),
    ))
}
