//! Compiler clients: turn a program into executables for a platform.

use std::fmt::Debug;

use irprobe_ir::proto::HloProto;
use irprobe_ir::{HloModule, InstrId, Instruction, Opcode, PrintOptions, Shape};
use irprobe_opt::{LayoutAssignment, Pass, PassManager};

use crate::buffer::BufferAssignment;
use crate::error::CompileError;
use crate::executable::LocalExecutable;
use crate::options::{ExecutableBuildOptions, Platform};

/// Builds executables for the devices of one platform.
pub trait CompilerClient: Debug + Send + Sync {
    fn platform(&self) -> Platform;

    fn device_count(&self) -> i32;

    /// Ordinal used when build options do not name a device.
    fn default_device_ordinal(&self) -> i32 {
        0
    }

    /// Compiles `module` into executables. `argument_layouts` gives the
    /// shape, with layout, of each entry parameter.
    fn compile(
        &self,
        module: &HloModule,
        argument_layouts: &[Shape],
        options: &ExecutableBuildOptions,
    ) -> Result<Vec<LocalExecutable>, CompileError>;
}

/// In-process client that optimizes and buffer-assigns the program.
#[derive(Debug, Clone)]
pub struct LocalClient {
    platform: Platform,
    device_count: i32,
}

impl LocalClient {
    pub fn new(platform: Platform, device_count: i32) -> Self {
        Self {
            platform,
            device_count,
        }
    }

    /// A client for a single host device.
    pub fn host() -> Self {
        Self::new(Platform::Host, 1)
    }

    fn check_layouts(
        &self,
        module: &HloModule,
        argument_layouts: &[Shape],
        options: &ExecutableBuildOptions,
    ) -> Result<(), CompileError> {
        let program = module.program_shape()?;
        if argument_layouts.len() != program.parameters.len() {
            return Err(CompileError::InvalidLayout(format!(
                "{} argument layouts for {} parameters",
                argument_layouts.len(),
                program.parameters.len()
            )));
        }
        for (i, (layout, param)) in argument_layouts.iter().zip(&program.parameters).enumerate() {
            if !layout.compatible(param) {
                return Err(CompileError::InvalidLayout(format!(
                    "argument {i} has shape {layout}, parameter is {param}"
                )));
            }
        }
        if let Some(result) = &options.result_layout {
            if !result.compatible(&program.result) {
                return Err(CompileError::InvalidLayout(format!(
                    "result layout {result} does not match {}",
                    program.result
                )));
            }
        }
        Ok(())
    }
}

impl CompilerClient for LocalClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn device_count(&self) -> i32 {
        self.device_count
    }

    fn compile(
        &self,
        module: &HloModule,
        argument_layouts: &[Shape],
        options: &ExecutableBuildOptions,
    ) -> Result<Vec<LocalExecutable>, CompileError> {
        let ordinal = options
            .device_ordinal
            .unwrap_or_else(|| self.default_device_ordinal());
        if !(0..self.device_count).contains(&ordinal) {
            return Err(CompileError::InvalidDeviceOrdinal {
                ordinal,
                count: self.device_count,
            });
        }
        self.check_layouts(module, argument_layouts, options)?;

        let mut optimized = module.clone();
        optimized.config.replica_count = options.num_replicas.max(1);

        let pm = PassManager::for_level(options.opt_level);
        let iterations = pm.run(&mut optimized);
        if !options.alias_passthrough_params {
            copy_passthrough_outputs(&mut optimized)?;
        }
        LayoutAssignment {
            parameter_layouts: argument_layouts.to_vec(),
            result_layout: options.result_layout.clone(),
        }
        .run(&mut optimized);
        optimized.verify()?;

        log::info!(
            "compiled '{}' for {} device {ordinal}: {} instructions after {iterations} changing pass iteration(s)",
            optimized.name,
            self.platform,
            optimized.instruction_count()
        );
        if options.debug_options.detailed_logging {
            log::debug!("optimized module:\n{}", optimized.to_text(&PrintOptions::default()));
        }

        let assignment = BufferAssignment::run(&optimized)?;
        let hlo_proto = options
            .debug_options
            .embed_ir_in_executable
            .then(|| HloProto {
                hlo_module: Some(optimized.to_proto()),
                buffer_assignment: Some(assignment.to_proto()),
            });

        Ok(vec![LocalExecutable::new(optimized, assignment, hlo_proto, ordinal)])
    }
}

/// Inserts a copy for each output that is an entry parameter, so outputs
/// never share a buffer with an input unless aliasing was requested.
fn copy_passthrough_outputs(module: &mut HloModule) -> Result<(), CompileError> {
    let aliased: Vec<u32> = module
        .input_output_alias
        .iter()
        .map(|a| a.parameter_number)
        .collect();
    let entry = module.entry_computation_mut()?;
    let root = entry.root_instruction()?;

    let is_passthrough = |id: InstrId| {
        entry.get(id).is_some_and(|i| {
            i.opcode == Opcode::Parameter
                && i.parameter_number.is_some_and(|n| !aliased.contains(&n))
        })
    };
    let targets: Vec<(Option<usize>, InstrId)> = if root.opcode == Opcode::Tuple {
        root.operands
            .iter()
            .enumerate()
            .filter(|&(_, &op)| is_passthrough(op))
            .map(|(i, &op)| (Some(i), op))
            .collect()
    } else if is_passthrough(root.id) {
        vec![(None, root.id)]
    } else {
        Vec::new()
    };
    let root_id = root.id;

    for (slot, param) in targets {
        let shape = entry.instruction(param)?.shape.clone();
        let copy = entry.add(Instruction::new(Opcode::Copy, "copy", shape, vec![param]));
        match slot {
            Some(i) => {
                if let Some(tuple) = entry.get_mut(root_id) {
                    tuple.operands[i] = copy;
                }
            }
            None => entry.set_root(copy),
        }
    }
    Ok(())
}
