//! Conversion between the in-memory IR and its protobuf form.

use prost::Message;

use crate::computation::Computation;
use crate::error::IrError;
use crate::instruction::{DotDimensions, InstrId, Instruction, OpMetadata, Opcode};
use crate::literal::Literal;
use crate::module::{AliasEntry, AliasKind, HloModule, ModuleConfig};
use crate::proto::{
    AliasProto, DotDimensionNumbersProto, HloComputationProto, HloInstructionProto,
    HloModuleProto, LayoutProto, LiteralProto, OpMetadataProto, ShapeProto, alias_kind,
};
use crate::types::{ArrayShape, ElementType, Layout, Shape};

impl Shape {
    pub fn to_proto(&self) -> ShapeProto {
        match self {
            Self::Array(a) => ShapeProto {
                element_type: a.element_type.to_proto(),
                dimensions: a.dims.clone(),
                tuple_shapes: Vec::new(),
                layout: a.layout.as_ref().map(|l| LayoutProto {
                    minor_to_major: l.minor_to_major.clone(),
                }),
                is_tuple: false,
            },
            Self::Tuple(elements) => ShapeProto {
                tuple_shapes: elements.iter().map(Shape::to_proto).collect(),
                is_tuple: true,
                ..Default::default()
            },
        }
    }

    pub fn from_proto(proto: &ShapeProto) -> Result<Self, IrError> {
        if proto.is_tuple {
            let elements = proto
                .tuple_shapes
                .iter()
                .map(Shape::from_proto)
                .collect::<Result<_, _>>()?;
            return Ok(Self::Tuple(elements));
        }
        let element_type = ElementType::from_proto(proto.element_type).ok_or_else(|| {
            IrError::MalformedProto(format!("unknown element type {}", proto.element_type))
        })?;
        if proto.dimensions.iter().any(|&d| d < 0) {
            return Err(IrError::MalformedProto(format!(
                "negative dimension in {:?}",
                proto.dimensions
            )));
        }
        let layout = match &proto.layout {
            Some(l) => {
                let layout = Layout {
                    minor_to_major: l.minor_to_major.clone(),
                };
                if !layout.is_valid_for_rank(proto.dimensions.len()) {
                    return Err(IrError::MalformedProto(format!(
                        "layout {:?} does not match rank {}",
                        layout.minor_to_major,
                        proto.dimensions.len()
                    )));
                }
                Some(layout)
            }
            None => None,
        };
        Ok(Self::Array(ArrayShape {
            element_type,
            dims: proto.dimensions.clone(),
            layout,
        }))
    }
}

impl Literal {
    pub fn to_proto(&self) -> LiteralProto {
        LiteralProto {
            shape: Some(self.shape().to_proto()),
            values: self.values.clone(),
        }
    }

    pub fn from_proto(proto: &LiteralProto) -> Result<Self, IrError> {
        let shape = proto
            .shape
            .as_ref()
            .ok_or_else(|| IrError::MalformedProto("literal without shape".into()))?;
        match Shape::from_proto(shape)? {
            Shape::Array(a) => Literal::new(a.element_type, a.dims, proto.values.clone()),
            Shape::Tuple(_) => Err(IrError::MalformedProto("tuple literal".into())),
        }
    }
}

fn instruction_to_proto(instr: &Instruction) -> HloInstructionProto {
    HloInstructionProto {
        id: i64::from(instr.id.0),
        name: instr.name.clone(),
        opcode: instr.opcode.name().into(),
        shape: Some(instr.shape.to_proto()),
        operand_ids: instr.operands.iter().map(|o| i64::from(o.0)).collect(),
        parameter_number: instr.parameter_number.map(i64::from),
        literal: instr.literal.as_ref().map(Literal::to_proto),
        dimensions: instr.dimensions.clone(),
        tuple_index: instr.tuple_index.map(i64::from),
        dot_dimension_numbers: instr.dot_dimensions.as_ref().map(|d| DotDimensionNumbersProto {
            lhs_contracting_dimensions: d.lhs_contracting.clone(),
            rhs_contracting_dimensions: d.rhs_contracting.clone(),
        }),
        replica_group_size: instr.replica_group_size.map(i64::from),
        metadata: instr.metadata.as_ref().map(|m| OpMetadataProto {
            op_type: m.op_type.clone(),
            op_name: m.op_name.clone(),
            source_file: m.source_file.clone(),
            source_line: m.source_line,
        }),
    }
}

fn to_u32(value: i64, what: &str) -> Result<u32, IrError> {
    u32::try_from(value).map_err(|_| IrError::MalformedProto(format!("{what} {value} out of range")))
}

fn instruction_from_proto(proto: &HloInstructionProto) -> Result<Instruction, IrError> {
    let opcode = Opcode::from_name(&proto.opcode)
        .ok_or_else(|| IrError::MalformedProto(format!("unknown opcode '{}'", proto.opcode)))?;
    let shape = proto
        .shape
        .as_ref()
        .ok_or_else(|| IrError::MalformedProto(format!("instruction '{}' has no shape", proto.name)))?;
    let operands = proto
        .operand_ids
        .iter()
        .map(|&id| to_u32(id, "operand id").map(InstrId))
        .collect::<Result<_, _>>()?;

    Ok(Instruction {
        id: InstrId(to_u32(proto.id, "instruction id")?),
        name: proto.name.clone(),
        opcode,
        shape: Shape::from_proto(shape)?,
        operands,
        parameter_number: proto
            .parameter_number
            .map(|n| to_u32(n, "parameter number"))
            .transpose()?,
        literal: proto.literal.as_ref().map(Literal::from_proto).transpose()?,
        dimensions: proto.dimensions.clone(),
        tuple_index: proto.tuple_index.map(|n| to_u32(n, "tuple index")).transpose()?,
        dot_dimensions: proto.dot_dimension_numbers.as_ref().map(|d| DotDimensions {
            lhs_contracting: d.lhs_contracting_dimensions.clone(),
            rhs_contracting: d.rhs_contracting_dimensions.clone(),
        }),
        replica_group_size: proto
            .replica_group_size
            .map(|n| to_u32(n, "replica group size"))
            .transpose()?,
        metadata: proto.metadata.as_ref().map(|m| OpMetadata {
            op_type: m.op_type.clone(),
            op_name: m.op_name.clone(),
            source_file: m.source_file.clone(),
            source_line: m.source_line,
        }),
    })
}

impl Computation {
    pub fn to_proto(&self) -> HloComputationProto {
        HloComputationProto {
            name: self.name.clone(),
            instructions: self.instructions.iter().map(instruction_to_proto).collect(),
            root_id: self.root.map(|r| i64::from(r.0)),
        }
    }

    pub fn from_proto(proto: &HloComputationProto) -> Result<Self, IrError> {
        let instructions = proto
            .instructions
            .iter()
            .map(instruction_from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        let root = proto
            .root_id
            .map(|id| to_u32(id, "root id").map(InstrId))
            .transpose()?;
        Ok(Computation::from_parts(proto.name.clone(), instructions, root))
    }
}

impl HloModule {
    pub fn to_proto(&self) -> HloModuleProto {
        HloModuleProto {
            name: self.name.clone(),
            entry_computation_name: self.entry.clone(),
            computations: self.computations.iter().map(Computation::to_proto).collect(),
            replica_count: i64::from(self.config.replica_count),
            input_output_alias: self
                .input_output_alias
                .iter()
                .map(|a| AliasProto {
                    output_shape_index: a.output_index.clone(),
                    parameter_number: i64::from(a.parameter_number),
                    kind: match a.kind {
                        AliasKind::MayAlias => alias_kind::MAY_ALIAS,
                        AliasKind::MustAlias => alias_kind::MUST_ALIAS,
                    },
                })
                .collect(),
        }
    }

    /// Rebuilds a module from its protobuf form and verifies it.
    pub fn from_proto(proto: &HloModuleProto) -> Result<Self, IrError> {
        let computations = proto
            .computations
            .iter()
            .map(Computation::from_proto)
            .collect::<Result<Vec<_>, _>>()?;
        let input_output_alias = proto
            .input_output_alias
            .iter()
            .map(|a| {
                let kind = match a.kind {
                    alias_kind::MAY_ALIAS => AliasKind::MayAlias,
                    alias_kind::MUST_ALIAS => AliasKind::MustAlias,
                    other => {
                        return Err(IrError::MalformedProto(format!("unknown alias kind {other}")));
                    }
                };
                Ok(AliasEntry {
                    output_index: a.output_shape_index.clone(),
                    parameter_number: to_u32(a.parameter_number, "alias parameter")?,
                    kind,
                })
            })
            .collect::<Result<_, _>>()?;
        let module = HloModule {
            name: proto.name.clone(),
            entry: proto.entry_computation_name.clone(),
            computations,
            config: ModuleConfig {
                replica_count: to_u32(proto.replica_count.max(1), "replica count")?,
            },
            input_output_alias,
        };
        module.verify()?;
        Ok(module)
    }

    /// Serializes the module to protobuf bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    /// Decodes and verifies a module from protobuf bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IrError> {
        let proto = HloModuleProto::decode(bytes)?;
        Self::from_proto(&proto)
    }
}
