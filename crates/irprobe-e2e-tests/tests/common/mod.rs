use irprobe::{ExportStage, IrDriver, IrOutput};
use irprobe_ir::ElementType;
use irprobe_runtime::{
    DataType, Device, ExecutionContext, FunctionBuilder, FunctionDef, FunctionLibrary, NodeDef,
    ResourceHandle, Tensor, TensorHandle, Var,
};

/// Container used for test variables.
#[allow(dead_code)]
pub const VARS: &str = "vars";

/// `out = x + y` over two `f32[2,2]` arguments.
#[allow(dead_code)]
pub fn add_function() -> FunctionDef {
    FunctionBuilder::new("add")
        .arg("x", DataType::F32, &[2, 2])
        .arg("y", DataType::F32, &[2, 2])
        .node(NodeDef::new("sum", "AddV2", &["x", "y"]))
        .ret("out", DataType::F32, "sum")
        .build()
}

/// `v += d; out = tanh(read(v))`, arguments `(v, d)`.
#[allow(dead_code)]
pub fn accumulate_function() -> FunctionDef {
    FunctionBuilder::new("accumulate")
        .arg("v", DataType::Resource, &[])
        .arg("d", DataType::F32, &[4])
        .node(NodeDef::new("update", "AssignAddVariableOp", &["v", "d"]))
        .node(NodeDef::new("read", "ReadVariableOp", &["v"]))
        .node(NodeDef::new("out", "Tanh", &["read"]))
        .ret("out", DataType::F32, "out")
        .build()
}

/// An execution context whose library holds `functions`.
#[allow(dead_code)]
pub fn context_with(functions: Vec<FunctionDef>) -> ExecutionContext {
    let mut library = FunctionLibrary::new();
    for function in functions {
        library.register(function).expect("duplicate test function");
    }
    ExecutionContext::new(library)
}

/// Runs one export and panics on failure.
#[allow(dead_code)]
pub fn export(
    driver: &IrDriver,
    stage: ExportStage,
    name: &str,
    device: &Device,
    context: &ExecutionContext,
    inputs: &[TensorHandle],
) -> IrOutput {
    driver
        .get_compiler_ir(stage, name, device, context, inputs)
        .unwrap_or_else(|e| panic!("export of '{name}' at {stage} failed: {e}"))
}

/// The text of a text stage's output.
#[allow(dead_code)]
pub fn text(output: &IrOutput) -> &str {
    match output {
        IrOutput::Text(t) => t,
        IrOutput::Serialized(_) => panic!("expected text output, got bytes"),
    }
}

/// The bytes of a serialized stage's output.
#[allow(dead_code)]
pub fn bytes(output: &IrOutput) -> &[u8] {
    match output {
        IrOutput::Serialized(b) => b,
        IrOutput::Text(_) => panic!("expected serialized output, got text"),
    }
}

/// A dense `f32` tensor on `device`.
#[allow(dead_code)]
pub fn f32_input(device: &Device, dims: &[i64], values: Vec<f64>) -> TensorHandle {
    let tensor = Tensor::new(ElementType::F32, dims.to_vec(), values).expect("bad test tensor");
    TensorHandle::new(tensor, device)
}

/// Creates a variable on `device` and returns a resource input naming it.
#[allow(dead_code)]
pub fn variable(device: &Device, name: &str, value: Option<Tensor>, dims: &[i64]) -> TensorHandle {
    let var = match value {
        Some(v) => Var::with_value(name, v).expect("bad variable value"),
        None => Var::new(name, ElementType::F32, dims.to_vec()),
    };
    device.resource_manager().create(VARS, var);
    resource_input(device, name, dims)
}

/// A resource input referring to variable `name` on `device`.
#[allow(dead_code)]
pub fn resource_input(device: &Device, name: &str, dims: &[i64]) -> TensorHandle {
    let handle = ResourceHandle {
        device: device.name.clone(),
        container: VARS.to_string(),
        name: name.to_string(),
        dtype: ElementType::F32,
        dims: dims.to_vec(),
    };
    TensorHandle::new(Tensor::resource(handle), device)
}

/// Parameter lines of the entry computation header, e.g. `x.1: f32[2,2]`.
#[allow(dead_code)]
pub fn entry_parameters(hlo: &str) -> Vec<String> {
    let header = hlo
        .lines()
        .find(|l| l.starts_with("ENTRY "))
        .expect("no entry computation");
    let open = header.find('(').expect("no parameter list");
    let close = header.find(')').expect("no parameter list");
    header[open + 1..close]
        .split(", ")
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
