mod common;

use irprobe::{ExportStage, IrDriver, IrOutput};
use irprobe_ir::proto::HloProto;
use irprobe_ir::{HloModule, PrintOptions};
use irprobe_runtime::{AttrValue, DataType, Device, FunctionBuilder, NodeDef};

#[test]
fn host_hlo_from_declared_shapes() {
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![common::add_function()]);
    let out = common::export(&driver, ExportStage::Hlo, "add", &Device::cpu(0), &ctx, &[]);
    let hlo = common::text(&out);

    let params = common::entry_parameters(hlo);
    assert_eq!(params, vec!["x.1: f32[2,2]", "y.2: f32[2,2]"]);
    assert!(hlo.starts_with("HloModule add"));
    assert!(hlo.contains("metadata={op_type=\"AddV2\" op_name=\"sum\"}"));
}

#[test]
fn metadata_stage_differs_only_in_annotations() {
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![common::add_function()]);
    let cpu = Device::cpu(0);
    let with = common::export(&driver, ExportStage::Hlo, "add", &cpu, &ctx, &[]);
    let without = common::export(&driver, ExportStage::HloNoMetadata, "add", &cpu, &ctx, &[]);

    let stripped: Vec<String> = common::text(&with)
        .lines()
        .map(|l| l.split(", metadata={").next().unwrap_or(l).to_string())
        .collect();
    let plain: Vec<&str> = common::text(&without).lines().collect();
    assert_eq!(stripped, plain);
    assert_ne!(common::text(&with), common::text(&without));
}

#[test]
fn serialized_program_matches_text() {
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![common::add_function()]);
    let cpu = Device::cpu(0);
    let text = common::export(&driver, ExportStage::Hlo, "add", &cpu, &ctx, &[]);
    let bytes = common::export(&driver, ExportStage::HloSerialized, "add", &cpu, &ctx, &[]);

    let module = HloModule::from_bytes(common::bytes(&bytes)).expect("decode failed");
    assert_eq!(module.to_text(&PrintOptions::default()), common::text(&text));
    assert_eq!(module.program_shape().unwrap().parameters.len(), 2);
}

#[test]
fn optimized_stages_agree() {
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![common::add_function()]);
    let cpu = Device::cpu(0);
    let text = common::export(&driver, ExportStage::OptimizedHlo, "add", &cpu, &ctx, &[]);
    let bytes = common::export(&driver, ExportStage::OptimizedHloSerialized, "add", &cpu, &ctx, &[]);
    let proto = common::export(
        &driver,
        ExportStage::OptimizedHloProtoSerialized,
        "add",
        &cpu,
        &ctx,
        &[],
    );

    let module = HloModule::from_bytes(common::bytes(&bytes)).expect("decode failed");
    assert_eq!(module.to_string(), common::text(&text));
    assert!(common::text(&text).contains("f32[2,2]{1,0}"));

    let hlo_proto = HloProto::from_bytes(common::bytes(&proto)).expect("decode failed");
    assert_eq!(hlo_proto.hlo_module, Some(module.to_proto()));
    let buffers = hlo_proto.buffer_assignment.expect("no buffer assignment");
    assert!(!buffers.buffer_allocations.is_empty());
    assert_eq!(
        buffers
            .buffer_allocations
            .iter()
            .filter(|a| a.is_entry_computation_parameter)
            .count(),
        2
    );
}

#[test]
fn dot_graph_names_entry() {
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![common::add_function()]);
    let out = common::export(&driver, ExportStage::OptimizedHloDot, "add", &Device::cpu(0), &ctx, &[]);
    let dot = common::text(&out);
    assert!(!dot.is_empty());
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("add"));
    assert!(dot.trim_end().ends_with('}'));
}

#[test]
fn every_stage_on_gpu() {
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![common::add_function()]);
    let gpu = Device::gpu(1);
    for stage in ExportStage::ALL {
        let out = common::export(&driver, stage, "add", &gpu, &ctx, &[]);
        match out {
            IrOutput::Text(t) => assert!(!t.is_empty(), "{stage}"),
            IrOutput::Serialized(b) => assert!(!b.is_empty(), "{stage}"),
        }
    }
    assert_eq!(driver.compilers().len(), 1);
}

#[test]
fn optimization_removes_identity_work() {
    let f = FunctionBuilder::new("redundant")
        .arg("x", DataType::F32, &[2, 3])
        .node(NodeDef::new("same", "Identity", &["x"]))
        .node(
            NodeDef::new("zero", "Const", &[]).with_attr(
                "value",
                AttrValue::Tensor(irprobe_ir::Literal::scalar(irprobe_ir::ElementType::F32, 0.0)),
            ),
        )
        .node(NodeDef::new("plus", "AddV2", &["same", "zero"]))
        .node(NodeDef::new("e", "Exp", &["plus"]))
        .ret("out", DataType::F32, "e")
        .build();
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![f]);
    let cpu = Device::cpu(0);

    let before = common::export(&driver, ExportStage::HloNoMetadata, "redundant", &cpu, &ctx, &[]);
    let after = common::export(&driver, ExportStage::OptimizedHlo, "redundant", &cpu, &ctx, &[]);
    assert!(common::text(&before).contains(" add("));
    assert!(!common::text(&after).contains(" add("));
    assert!(common::text(&after).contains("exponential(%x.1)"));
}

#[test]
fn collective_sets_replica_count() {
    let f = FunctionBuilder::new("allsum")
        .arg("x", DataType::F32, &[8])
        .node(
            NodeDef::new("sum", "CollectiveReduceV2", &["x"])
                .with_attr("group_size", AttrValue::Int(4))
                .with_attr("group_key", AttrValue::Int(3))
                .with_attr("merge_op", AttrValue::Str("Add".into())),
        )
        .ret("out", DataType::F32, "sum")
        .build();
    let driver = IrDriver::new();
    let ctx = common::context_with(vec![f]);
    let cpu = Device::cpu(0);

    let program = common::export(&driver, ExportStage::Hlo, "allsum", &cpu, &ctx, &[]);
    assert!(!common::text(&program).contains("replica_count="));

    let optimized = common::export(&driver, ExportStage::OptimizedHlo, "allsum", &cpu, &ctx, &[]);
    let text = common::text(&optimized);
    assert!(text.contains("replica_count=4"));
    assert!(text.contains("replica_groups={{0,1,2,3}}"));
}
