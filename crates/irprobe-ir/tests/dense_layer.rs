//! Integration test: build a dense layer (`tanh(x @ w + b)`) programmatically
//! and check the text, graph and wire forms agree.

use irprobe_ir::*;

fn dense_layer() -> HloModule {
    let ty = ElementType::F32;
    let mut comp = Computation::new("main");

    // ---- Parameters ----
    let x = comp.add(Instruction::parameter(0, "x", Shape::array(ty, [4, 8])));
    let w = comp.add(Instruction::parameter(1, "w", Shape::array(ty, [8, 2])));

    // ---- Constants ----
    let b = comp.add(Instruction::constant(
        "b",
        Literal::new(ty, [2], vec![0.5, -0.5]).unwrap(),
    ));

    // ---- Body ----
    let dot = comp.add(Instruction {
        dot_dimensions: Some(DotDimensions {
            lhs_contracting: vec![1],
            rhs_contracting: vec![0],
        }),
        ..Instruction::new(Opcode::Dot, "matmul", Shape::array(ty, [4, 2]), vec![x, w])
            .with_metadata(OpMetadata::new("MatMul", "dense/MatMul"))
    });
    let bias = comp.add(
        Instruction::new(Opcode::Broadcast, "bias", Shape::array(ty, [4, 2]), vec![b])
            .with_dimensions(vec![1]),
    );
    let add = comp.add(
        Instruction::new(Opcode::Add, "add", Shape::array(ty, [4, 2]), vec![dot, bias])
            .with_metadata(OpMetadata::new("AddV2", "dense/BiasAdd")),
    );
    let act = comp.add(
        Instruction::new(Opcode::Tanh, "tanh", Shape::array(ty, [4, 2]), vec![add])
            .with_metadata(OpMetadata::new("Tanh", "dense/Tanh")),
    );
    comp.set_root(act);

    HloModule::new("dense_layer", comp)
}

#[test]
fn verifies() {
    dense_layer().verify().unwrap();
}

#[test]
fn text_dump() {
    let text = dense_layer().to_string();
    assert!(text.contains("ENTRY %main (x.1: f32[4,8], w.2: f32[8,2]) -> f32[4,2] {"));
    assert!(text.contains("%b.3 = f32[2] constant({0.5, -0.5})"));
    assert!(text.contains(
        "%matmul.4 = f32[4,2] dot(%x.1, %w.2), lhs_contracting_dims={1}, rhs_contracting_dims={0}"
    ));
    assert!(text.contains("%bias.5 = f32[4,2] broadcast(%b.3), dimensions={1}"));
    assert!(text.contains("ROOT %tanh.7 = f32[4,2] tanh(%add.6)"));
    assert_eq!(text.matches("parameter(").count(), 2);
}

#[test]
fn program_shape() {
    let ps = dense_layer().program_shape().unwrap();
    assert_eq!(ps.parameters.len(), 2);
    assert_eq!(ps.result, Shape::array(ElementType::F32, [4, 2]));
}

#[test]
fn wire_form_matches_text() {
    let module = dense_layer();
    let decoded = HloModule::from_bytes(&module.to_bytes()).unwrap();
    assert_eq!(decoded, module);
    assert_eq!(decoded.to_string(), module.to_string());
}

#[test]
fn graph_dump() {
    let module = dense_layer();
    let dot = render_dot(module.entry_computation().unwrap(), "Visualization").unwrap();
    assert!(dot.contains("digraph \"main\""));
    // One node per instruction, one edge per operand use.
    assert_eq!(dot.matches("fillcolor=").count(), 7);
    assert_eq!(dot.matches(" -> ").count(), 6);
}
