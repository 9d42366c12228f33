//! Lowering of function bodies to HLO.
//!
//! Each node of a [`FunctionDef`] is lowered in order into instructions of a
//! single entry computation. Arguments become parameters or constants;
//! resource variables are tracked through reads and assignments, and every
//! modified variable becomes an extra output.

use std::collections::{BTreeMap, HashMap};

use irprobe_ir::{
    AliasEntry, AliasKind, Computation, DotDimensions, ElementType, HloModule, InstrId,
    Instruction, Literal, OpMetadata, Opcode, Shape,
};
use irprobe_runtime::{AttrValue, DataType, FunctionDef, NodeDef, ops, parse_input};

use crate::argument::{Argument, ArgumentKind};
use crate::error::CompileError;
use crate::options::{CompileOptions, CompilerOptions};

/// Replica grouping of the collectives in a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectiveInfo {
    pub group_key: i64,
    pub group_size: u32,
}

/// A variable written by the function.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUpdate {
    /// Index of the resource argument.
    pub input_index: usize,
    /// Position among the program outputs.
    pub output_index: usize,
    pub shape: Shape,
}

/// The unoptimized program for a function, with its argument mapping.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub module: HloModule,
    /// Argument index for each program parameter, by parameter number.
    pub input_mapping: Vec<usize>,
    pub input_shapes: Vec<Shape>,
    pub output_shape: Shape,
    /// Shapes of the function outputs, excluding resource updates.
    pub outputs: Vec<Shape>,
    pub resource_updates: Vec<ResourceUpdate>,
    pub collective_info: Option<CollectiveInfo>,
}

/// Lowers functions for one device.
#[derive(Debug, Clone)]
pub struct FunctionCompiler {
    options: CompilerOptions,
}

impl FunctionCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Lowers `function` called with `args` into an HLO program.
    pub fn compile_function(
        &self,
        compile_options: &CompileOptions,
        function: &FunctionDef,
        args: &[Argument],
    ) -> Result<CompilationResult, CompileError> {
        if args.len() != function.arity() {
            return Err(CompileError::ArgumentCount {
                function: function.name().to_string(),
                expected: function.arity(),
                actual: args.len(),
            });
        }
        log::debug!(
            "lowering '{}' for {} device {}",
            function.name(),
            self.options.device_type,
            self.options.device_ordinal
        );

        let mut lowering = Lowering::new(function);
        let input_mapping = lowering.bind_arguments(args)?;
        for node in &function.nodes {
            let outputs = lowering.lower_node(node)?;
            lowering.values.insert(node.name.clone(), outputs);
        }
        let result = lowering.finish(compile_options, input_mapping)?;

        if self.options.detailed_logging {
            log::debug!(
                "lowered '{}': {} instructions, {} parameters, {} resource updates",
                function.name(),
                result.module.instruction_count(),
                result.input_shapes.len(),
                result.resource_updates.len()
            );
        }
        Ok(result)
    }
}

#[derive(Debug, Clone)]
enum Value {
    Tensor {
        id: InstrId,
        shape: Shape,
        /// Known value, when the tensor is a compile-time constant.
        constant: Option<Literal>,
    },
    /// A resource argument, by argument index.
    Resource(usize),
}

impl Value {
    fn tensor(id: InstrId, shape: Shape) -> Self {
        Self::Tensor {
            id,
            shape,
            constant: None,
        }
    }
}

#[derive(Debug)]
struct ResourceState {
    name: String,
    shape: Shape,
    /// Parameter instruction and number, for initialized variables.
    parameter: Option<(InstrId, u32)>,
    current: Option<InstrId>,
    modified: bool,
}

struct Lowering<'a> {
    function: &'a FunctionDef,
    comp: Computation,
    values: HashMap<String, Vec<Value>>,
    resources: BTreeMap<usize, ResourceState>,
    collective: Option<CollectiveInfo>,
    metadata: Option<OpMetadata>,
}

impl<'a> Lowering<'a> {
    fn new(function: &'a FunctionDef) -> Self {
        Self {
            function,
            comp: Computation::new(function.name()),
            values: HashMap::new(),
            resources: BTreeMap::new(),
            collective: None,
            metadata: None,
        }
    }

    fn emit(&mut self, mut instr: Instruction) -> InstrId {
        if let Some(metadata) = &self.metadata {
            instr.metadata = Some(metadata.clone());
        }
        self.comp.add(instr)
    }

    fn bind_arguments(&mut self, args: &[Argument]) -> Result<Vec<usize>, CompileError> {
        let function = self.function;
        let mut input_mapping = Vec::new();
        for (index, (arg, def)) in args
            .iter()
            .zip(&function.signature.input_args)
            .enumerate()
        {
            let invalid = |reason: String| CompileError::InvalidArgument {
                index,
                name: def.name.clone(),
                reason,
            };
            match (def.dtype, arg.kind) {
                (DataType::Resource, ArgumentKind::Resource) => {}
                (DataType::Resource, kind) => {
                    return Err(invalid(format!("declared as resource, passed as {kind}")));
                }
                (dtype, ArgumentKind::Resource) => {
                    return Err(invalid(format!("declared as {dtype}, passed as resource")));
                }
                (DataType::Element(et), _) if arg.element_type() != Some(et) => {
                    return Err(invalid(format!("expected {et}, got {}", arg.shape)));
                }
                _ => {}
            }
            if arg.shape.is_tuple() {
                return Err(invalid("tuple-shaped arguments are not supported".into()));
            }

            let value = match arg.kind {
                ArgumentKind::Parameter => {
                    let number = input_mapping.len() as u32;
                    let id = self
                        .comp
                        .add(Instruction::parameter(number, &def.name, arg.shape.clone()));
                    input_mapping.push(index);
                    Value::tensor(id, arg.shape.clone())
                }
                ArgumentKind::Constant => {
                    let literal = arg
                        .constant_value
                        .clone()
                        .ok_or_else(|| invalid("constant argument without a value".into()))?;
                    if !literal.shape().compatible(&arg.shape) {
                        return Err(invalid(format!(
                            "constant of shape {} does not match {}",
                            literal.shape(),
                            arg.shape
                        )));
                    }
                    let id = self
                        .comp
                        .add(Instruction::constant(&def.name, literal.clone()));
                    Value::Tensor {
                        id,
                        shape: arg.shape.clone(),
                        constant: Some(literal),
                    }
                }
                ArgumentKind::Resource => {
                    let parameter = if arg.initialized {
                        let number = input_mapping.len() as u32;
                        let id = self
                            .comp
                            .add(Instruction::parameter(number, &def.name, arg.shape.clone()));
                        input_mapping.push(index);
                        Some((id, number))
                    } else {
                        None
                    };
                    self.resources.insert(
                        index,
                        ResourceState {
                            name: arg.name.clone(),
                            shape: arg.shape.clone(),
                            parameter,
                            current: parameter.map(|(id, _)| id),
                            modified: false,
                        },
                    );
                    Value::Resource(index)
                }
            };
            self.values.insert(def.name.clone(), vec![value]);
        }
        Ok(input_mapping)
    }

    fn lookup(&self, node: &str, input: &str) -> Result<Value, CompileError> {
        let (name, index) = parse_input(input);
        self.values
            .get(name)
            .and_then(|outputs| outputs.get(index))
            .cloned()
            .ok_or_else(|| CompileError::UnknownInput {
                node: node.to_string(),
                input: input.to_string(),
            })
    }

    fn lower_node(&mut self, node: &NodeDef) -> Result<Vec<Value>, CompileError> {
        self.metadata = Some(OpMetadata::new(&node.op, &node.name));
        let inputs = node
            .inputs
            .iter()
            .map(|input| self.lookup(&node.name, input))
            .collect::<Result<Vec<_>, _>>()?;

        if ops::is_forwarding(&node.op) {
            return Ok(inputs);
        }

        let output = match node.op.as_str() {
            "Const" => self.constant(node)?,
            "AddV2" | "Add" => self.binary(node, Opcode::Add, &inputs)?,
            "Sub" => self.binary(node, Opcode::Subtract, &inputs)?,
            "Mul" => self.binary(node, Opcode::Multiply, &inputs)?,
            "RealDiv" | "Div" => self.binary(node, Opcode::Divide, &inputs)?,
            "Maximum" => self.binary(node, Opcode::Maximum, &inputs)?,
            "Minimum" => self.binary(node, Opcode::Minimum, &inputs)?,
            "Neg" => self.unary(node, Opcode::Negate, &inputs)?,
            "Exp" => self.unary(node, Opcode::Exponential, &inputs)?,
            "Log" => self.unary(node, Opcode::Log, &inputs)?,
            "Tanh" => self.unary(node, Opcode::Tanh, &inputs)?,
            "Relu" => self.relu(node, &inputs)?,
            "MatMul" => self.matmul(node, &inputs)?,
            "Transpose" => self.transpose(node, &inputs)?,
            "Reshape" => self.reshape(node, &inputs)?,
            "Cast" => self.cast(node, &inputs)?,
            "ReadVariableOp" => self.read_variable(node, &inputs)?,
            "AssignVariableOp" => {
                self.assign_variable(node, &inputs, false)?;
                return Ok(Vec::new());
            }
            "AssignAddVariableOp" => {
                self.assign_variable(node, &inputs, true)?;
                return Ok(Vec::new());
            }
            "CollectiveReduceV2" => self.all_reduce(node, &inputs)?,
            _ => {
                return Err(CompileError::UnsupportedOp {
                    node: node.name.clone(),
                    op: node.op.clone(),
                });
            }
        };
        Ok(vec![output])
    }

    fn expect_inputs<'v>(
        node: &NodeDef,
        inputs: &'v [Value],
        count: usize,
    ) -> Result<&'v [Value], CompileError> {
        if inputs.len() != count {
            return Err(CompileError::node(
                &node.name,
                format!("{} expects {count} inputs, got {}", node.op, inputs.len()),
            ));
        }
        Ok(inputs)
    }

    fn tensor<'v>(
        node: &NodeDef,
        value: &'v Value,
    ) -> Result<(InstrId, &'v Shape, Option<&'v Literal>), CompileError> {
        match value {
            Value::Tensor {
                id,
                shape,
                constant,
            } => Ok((*id, shape, constant.as_ref())),
            Value::Resource(_) => Err(CompileError::node(
                &node.name,
                format!("{} expects a tensor, got a resource", node.op),
            )),
        }
    }

    fn constant(&mut self, node: &NodeDef) -> Result<Value, CompileError> {
        let literal = node
            .attr("value")
            .and_then(AttrValue::as_tensor)
            .ok_or_else(|| CompileError::node(&node.name, "Const without a tensor 'value'"))?
            .clone();
        let id = self.emit(Instruction::constant(&node.name, literal.clone()));
        Ok(Value::Tensor {
            id,
            shape: literal.shape(),
            constant: Some(literal),
        })
    }

    fn binary(&mut self, node: &NodeDef, opcode: Opcode, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 2)?;
        let (lhs, lhs_shape, _) = Self::tensor(node, &inputs[0])?;
        let (rhs, rhs_shape, _) = Self::tensor(node, &inputs[1])?;
        let et = element_type(lhs_shape);
        if et != element_type(rhs_shape) {
            return Err(CompileError::node(
                &node.name,
                format!("mismatched operand types {lhs_shape} and {rhs_shape}"),
            ));
        }
        let out_dims = broadcast_dims(lhs_shape.dims(), rhs_shape.dims()).ok_or_else(|| {
            CompileError::node(
                &node.name,
                format!("incompatible shapes {lhs_shape} and {rhs_shape}"),
            )
        })?;
        let lhs = self.broadcast_to(lhs, lhs_shape, &out_dims);
        let rhs = self.broadcast_to(rhs, rhs_shape, &out_dims);
        let shape = Shape::array(et, out_dims);
        let id = self.emit(Instruction::new(opcode, &node.name, shape.clone(), vec![lhs, rhs]));
        Ok(Value::tensor(id, shape))
    }

    /// Broadcasts `id` to `out_dims`, dropping size-1 dimensions that expand.
    fn broadcast_to(&mut self, id: InstrId, shape: &Shape, out_dims: &[i64]) -> InstrId {
        let dims = shape.dims();
        if dims == out_dims {
            return id;
        }
        let et = element_type(shape);
        let offset = out_dims.len() - dims.len();
        let (kept, mapping): (Vec<i64>, Vec<i64>) = dims
            .iter()
            .enumerate()
            .filter(|&(i, &d)| d == out_dims[offset + i])
            .map(|(i, &d)| (d, (offset + i) as i64))
            .unzip();
        let operand = if kept.len() == dims.len() {
            id
        } else {
            self.emit(Instruction::new(
                Opcode::Reshape,
                "reshape",
                Shape::array(et, kept),
                vec![id],
            ))
        };
        self.emit(
            Instruction::new(
                Opcode::Broadcast,
                "broadcast",
                Shape::array(et, out_dims.to_vec()),
                vec![operand],
            )
            .with_dimensions(mapping),
        )
    }

    fn unary(&mut self, node: &NodeDef, opcode: Opcode, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 1)?;
        let (operand, shape, _) = Self::tensor(node, &inputs[0])?;
        let transcendental = matches!(opcode, Opcode::Exponential | Opcode::Log | Opcode::Tanh);
        if transcendental && !element_type(shape).is_floating() {
            return Err(CompileError::node(
                &node.name,
                format!("{} requires a floating-point operand, got {shape}", node.op),
            ));
        }
        let shape = shape.clone();
        let id = self.emit(Instruction::new(opcode, &node.name, shape.clone(), vec![operand]));
        Ok(Value::tensor(id, shape))
    }

    fn relu(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 1)?;
        let (operand, shape, _) = Self::tensor(node, &inputs[0])?;
        let shape = shape.clone();
        let zero = self.emit(Instruction::constant(
            "zero",
            Literal::scalar(element_type(&shape), 0.0),
        ));
        let zero_shape = Shape::scalar(element_type(&shape));
        let zero = self.broadcast_to(zero, &zero_shape, shape.dims());
        let id = self.emit(Instruction::new(
            Opcode::Maximum,
            &node.name,
            shape.clone(),
            vec![operand, zero],
        ));
        Ok(Value::tensor(id, shape))
    }

    fn matmul(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 2)?;
        let flag = |key: &str| node.attr(key).and_then(AttrValue::as_bool).unwrap_or(false);
        let (a, a_shape, _) = Self::tensor(node, &inputs[0])?;
        let (b, b_shape, _) = Self::tensor(node, &inputs[1])?;
        if a_shape.dims().len() != 2 || b_shape.dims().len() != 2 {
            return Err(CompileError::node(
                &node.name,
                format!("MatMul needs rank-2 operands, got {a_shape} and {b_shape}"),
            ));
        }
        let et = element_type(a_shape);
        if et != element_type(b_shape) {
            return Err(CompileError::node(
                &node.name,
                format!("mismatched operand types {a_shape} and {b_shape}"),
            ));
        }
        let (a, a_dims) = self.maybe_transpose(a, a_shape, flag("transpose_a"));
        let (b, b_dims) = self.maybe_transpose(b, b_shape, flag("transpose_b"));
        if a_dims[1] != b_dims[0] {
            return Err(CompileError::node(
                &node.name,
                format!("contracting dimensions differ: {} vs {}", a_dims[1], b_dims[0]),
            ));
        }
        let shape = Shape::array(et, [a_dims[0], b_dims[1]]);
        let dot = Instruction {
            dot_dimensions: Some(DotDimensions {
                lhs_contracting: vec![1],
                rhs_contracting: vec![0],
            }),
            ..Instruction::new(Opcode::Dot, &node.name, shape.clone(), vec![a, b])
        };
        let id = self.emit(dot);
        Ok(Value::tensor(id, shape))
    }

    fn maybe_transpose(&mut self, id: InstrId, shape: &Shape, transpose: bool) -> (InstrId, [i64; 2]) {
        let dims = [shape.dims()[0], shape.dims()[1]];
        if !transpose {
            return (id, dims);
        }
        let swapped = [dims[1], dims[0]];
        let id = self.emit(
            Instruction::new(
                Opcode::Transpose,
                "transpose",
                Shape::array(element_type(shape), swapped),
                vec![id],
            )
            .with_dimensions(vec![1, 0]),
        );
        (id, swapped)
    }

    /// The compile-time value of input `index`, which must be constant.
    fn const_input<'v>(node: &NodeDef, inputs: &'v [Value], index: usize) -> Result<&'v Literal, CompileError> {
        debug_assert!(ops::compile_time_const_inputs(&node.op).contains(&index));
        let (_, _, constant) = Self::tensor(node, &inputs[index])?;
        constant.ok_or_else(|| {
            CompileError::node(
                &node.name,
                format!("input {index} of {} must be a compile-time constant", node.op),
            )
        })
    }

    fn transpose(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 2)?;
        let (operand, shape, constant) = Self::tensor(node, &inputs[0])?;
        let perm = Self::const_input(node, inputs, 1)?.to_i64_vec();
        let rank = shape.dims().len();
        let mut seen = vec![false; rank];
        let valid = perm.len() == rank
            && perm.iter().all(|&p| {
                usize::try_from(p)
                    .ok()
                    .and_then(|p| seen.get_mut(p))
                    .is_some_and(|s| !std::mem::replace(s, true))
            });
        if !valid {
            return Err(CompileError::node(
                &node.name,
                format!("{perm:?} is not a permutation of rank {rank}"),
            ));
        }
        let out_dims: Vec<i64> = perm.iter().map(|&p| shape.dims()[p as usize]).collect();
        let out = Shape::array(element_type(shape), out_dims);
        let constant = constant.filter(|_| rank <= 1).cloned();
        let id = self.emit(
            Instruction::new(Opcode::Transpose, &node.name, out.clone(), vec![operand])
                .with_dimensions(perm),
        );
        Ok(Value::Tensor {
            id,
            shape: out,
            constant,
        })
    }

    fn reshape(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 2)?;
        let (operand, shape, constant) = Self::tensor(node, &inputs[0])?;
        let requested = Self::const_input(node, inputs, 1)?.to_i64_vec();
        let count: i64 = shape.dims().iter().product();
        let dims = infer_reshape(&requested, count).ok_or_else(|| {
            CompileError::node(
                &node.name,
                format!("cannot reshape {shape} to {requested:?}"),
            )
        })?;
        let constant = constant.and_then(|lit| lit.reshape(&dims));
        let out = Shape::array(element_type(shape), dims);
        let id = self.emit(Instruction::new(Opcode::Reshape, &node.name, out.clone(), vec![operand]));
        Ok(Value::Tensor {
            id,
            shape: out,
            constant,
        })
    }

    fn cast(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 1)?;
        let (operand, shape, constant) = Self::tensor(node, &inputs[0])?;
        let et = node
            .attr("DstT")
            .and_then(AttrValue::as_type)
            .and_then(DataType::element)
            .ok_or_else(|| CompileError::node(&node.name, "Cast without an element 'DstT'"))?;
        let constant = constant.map(|lit| lit.convert(et));
        let out = Shape::array(et, shape.dims().to_vec());
        let id = self.emit(Instruction::new(Opcode::Convert, &node.name, out.clone(), vec![operand]));
        Ok(Value::Tensor {
            id,
            shape: out,
            constant,
        })
    }

    fn resource<'r>(&'r mut self, node: &NodeDef, value: &Value) -> Result<&'r mut ResourceState, CompileError> {
        let index = match value {
            Value::Resource(index) => *index,
            Value::Tensor { .. } => {
                return Err(CompileError::node(
                    &node.name,
                    format!("{} expects a resource input", node.op),
                ));
            }
        };
        self.resources
            .get_mut(&index)
            .ok_or_else(|| CompileError::node(&node.name, format!("no resource for argument {index}")))
    }

    fn read_variable(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 1)?;
        let state = self.resource(node, &inputs[0])?;
        let id = state
            .current
            .ok_or_else(|| CompileError::UninitializedResource(state.name.clone()))?;
        Ok(Value::tensor(id, state.shape.clone()))
    }

    fn assign_variable(&mut self, node: &NodeDef, inputs: &[Value], accumulate: bool) -> Result<(), CompileError> {
        let inputs = Self::expect_inputs(node, inputs, 2)?;
        let (value, value_shape, _) = Self::tensor(node, &inputs[1])?;
        let value_shape = value_shape.clone();
        let (name, shape, current) = {
            let state = self.resource(node, &inputs[0])?;
            (state.name.clone(), state.shape.clone(), state.current)
        };

        if element_type(&value_shape) != element_type(&shape)
            || (current.is_some() && !value_shape.compatible(&shape))
        {
            return Err(CompileError::node(
                &node.name,
                format!("cannot assign {value_shape} to variable '{name}' of shape {shape}"),
            ));
        }

        let new_value = if accumulate {
            let current = current.ok_or(CompileError::UninitializedResource(name))?;
            self.emit(Instruction::new(
                Opcode::Add,
                &node.name,
                shape.clone(),
                vec![current, value],
            ))
        } else {
            value
        };

        let state = self.resource(node, &inputs[0])?;
        state.shape = value_shape;
        state.current = Some(new_value);
        state.modified = true;
        Ok(())
    }

    fn all_reduce(&mut self, node: &NodeDef, inputs: &[Value]) -> Result<Value, CompileError> {
        let (operand, shape, _) = Self::tensor(node, inputs.first().ok_or_else(|| {
            CompileError::node(&node.name, "CollectiveReduceV2 expects an input")
        })?)?;
        let merge_op = node.attr("merge_op").and_then(AttrValue::as_str).unwrap_or("Add");
        if merge_op != "Add" {
            return Err(CompileError::node(
                &node.name,
                format!("unsupported merge_op '{merge_op}'"),
            ));
        }
        let group_size = node
            .attr("group_size")
            .and_then(AttrValue::as_int)
            .and_then(|n| u32::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| CompileError::node(&node.name, "missing or invalid 'group_size'"))?;
        let group_key = node.attr("group_key").and_then(AttrValue::as_int).unwrap_or(0);

        let info = CollectiveInfo {
            group_key,
            group_size,
        };
        match self.collective {
            Some(existing) if existing != info => {
                return Err(CompileError::node(
                    &node.name,
                    "only one collective configuration per function is supported",
                ));
            }
            _ => self.collective = Some(info),
        }

        let shape = shape.clone();
        let id = self.emit(Instruction {
            replica_group_size: Some(group_size),
            ..Instruction::new(Opcode::AllReduce, &node.name, shape.clone(), vec![operand])
        });
        Ok(Value::tensor(id, shape))
    }

    fn finish(
        mut self,
        options: &CompileOptions,
        input_mapping: Vec<usize>,
    ) -> Result<CompilationResult, CompileError> {
        self.metadata = None;
        let function = self.function;
        let mut outputs: Vec<(InstrId, Shape)> = Vec::new();
        for out in &function.signature.output_args {
            let invalid = |message: String| CompileError::InvalidOutput {
                output: out.name.clone(),
                message,
            };
            let source = function
                .ret
                .get(&out.name)
                .ok_or_else(|| invalid("not bound to any node".into()))?;
            match self.lookup(&out.name, source) {
                Ok(Value::Tensor { id, shape, .. }) => {
                    if out.dtype != DataType::Element(element_type(&shape)) {
                        return Err(invalid(format!("declared as {}, produces {shape}", out.dtype)));
                    }
                    outputs.push((id, shape));
                }
                Ok(Value::Resource(_)) => {
                    return Err(invalid("returning a resource handle is not supported".into()));
                }
                Err(_) => return Err(invalid(format!("unknown source '{source}'"))),
            }
        }
        let output_shapes = outputs.iter().map(|(_, s)| s.clone()).collect();

        let mut resource_updates = Vec::new();
        for (&input_index, state) in &self.resources {
            if let (true, Some(current)) = (state.modified, state.current) {
                resource_updates.push(ResourceUpdate {
                    input_index,
                    output_index: outputs.len(),
                    shape: state.shape.clone(),
                });
                outputs.push((current, state.shape.clone()));
            }
        }

        let tuple_result = options.always_return_tuple || outputs.len() != 1;
        let root = if tuple_result {
            self.comp.add(Instruction::tuple("tuple", outputs))
        } else {
            outputs[0].0
        };
        self.comp.set_root(root);

        let mut module = HloModule::new(function.name(), self.comp);
        if options.alias_resource_update {
            for update in &resource_updates {
                let Some((_, parameter_number)) = self.resources[&update.input_index].parameter else {
                    continue;
                };
                module.input_output_alias.push(AliasEntry {
                    output_index: if tuple_result {
                        vec![update.output_index as i64]
                    } else {
                        Vec::new()
                    },
                    parameter_number,
                    kind: AliasKind::MayAlias,
                });
            }
        }
        module.verify()?;

        let program_shape = module.program_shape()?;
        Ok(CompilationResult {
            module,
            input_mapping,
            input_shapes: program_shape.parameters,
            output_shape: program_shape.result,
            outputs: output_shapes,
            resource_updates,
            collective_info: self.collective,
        })
    }
}

fn element_type(shape: &Shape) -> ElementType {
    shape
        .as_array()
        .map(|a| a.element_type)
        .unwrap_or(ElementType::Pred)
}

/// Numpy-style broadcast of two dimension lists.
fn broadcast_dims(a: &[i64], b: &[i64]) -> Option<Vec<i64>> {
    let rank = a.len().max(b.len());
    let aligned = |dims: &[i64], i: usize| {
        let offset = rank - dims.len();
        if i < offset { 1 } else { dims[i - offset] }
    };
    (0..rank)
        .map(|i| match (aligned(a, i), aligned(b, i)) {
            (x, y) if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

/// Resolves a single `-1` entry against the element count.
fn infer_reshape(requested: &[i64], count: i64) -> Option<Vec<i64>> {
    let unknown = requested.iter().filter(|&&d| d == -1).count();
    if unknown > 1 || requested.iter().any(|&d| d < -1) {
        return None;
    }
    let known: i64 = requested.iter().filter(|&&d| d != -1).product();
    let dims: Vec<i64> = if unknown == 1 {
        if known == 0 || count % known != 0 {
            return None;
        }
        requested
            .iter()
            .map(|&d| if d == -1 { count / known } else { d })
            .collect()
    } else {
        requested.to_vec()
    };
    (dims.iter().product::<i64>() == count).then_some(dims)
}
