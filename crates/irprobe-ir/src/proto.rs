//! Protobuf wire types via prost derive.
//!
//! Hand-defined messages for the serialized program form. Field tags are
//! stable; new fields must take fresh tags.

use prost::Message;

/// Top-level serialized module.
#[derive(Clone, PartialEq, Message)]
pub struct HloModuleProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub entry_computation_name: String,
    #[prost(message, repeated, tag = "3")]
    pub computations: Vec<HloComputationProto>,
    #[prost(int64, tag = "4")]
    pub replica_count: i64,
    #[prost(message, repeated, tag = "5")]
    pub input_output_alias: Vec<AliasProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct HloComputationProto {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub instructions: Vec<HloInstructionProto>,
    #[prost(int64, optional, tag = "3")]
    pub root_id: Option<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct HloInstructionProto {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(string, tag = "3")]
    pub opcode: String,
    #[prost(message, optional, tag = "4")]
    pub shape: Option<ShapeProto>,
    #[prost(int64, repeated, tag = "5")]
    pub operand_ids: Vec<i64>,
    #[prost(int64, optional, tag = "6")]
    pub parameter_number: Option<i64>,
    #[prost(message, optional, tag = "7")]
    pub literal: Option<LiteralProto>,
    #[prost(int64, repeated, tag = "8")]
    pub dimensions: Vec<i64>,
    #[prost(int64, optional, tag = "9")]
    pub tuple_index: Option<i64>,
    #[prost(message, optional, tag = "10")]
    pub dot_dimension_numbers: Option<DotDimensionNumbersProto>,
    #[prost(int64, optional, tag = "11")]
    pub replica_group_size: Option<i64>,
    #[prost(message, optional, tag = "12")]
    pub metadata: Option<OpMetadataProto>,
}

/// Array or tuple shape.
#[derive(Clone, PartialEq, Message)]
pub struct ShapeProto {
    #[prost(int32, tag = "1")]
    pub element_type: i32,
    #[prost(int64, repeated, tag = "2")]
    pub dimensions: Vec<i64>,
    #[prost(message, repeated, tag = "3")]
    pub tuple_shapes: Vec<ShapeProto>,
    #[prost(message, optional, tag = "4")]
    pub layout: Option<LayoutProto>,
    #[prost(bool, tag = "5")]
    pub is_tuple: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct LayoutProto {
    #[prost(int64, repeated, tag = "1")]
    pub minor_to_major: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LiteralProto {
    #[prost(message, optional, tag = "1")]
    pub shape: Option<ShapeProto>,
    #[prost(double, repeated, tag = "2")]
    pub values: Vec<f64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DotDimensionNumbersProto {
    #[prost(int64, repeated, tag = "1")]
    pub lhs_contracting_dimensions: Vec<i64>,
    #[prost(int64, repeated, tag = "2")]
    pub rhs_contracting_dimensions: Vec<i64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct OpMetadataProto {
    #[prost(string, tag = "1")]
    pub op_type: String,
    #[prost(string, tag = "2")]
    pub op_name: String,
    #[prost(string, tag = "3")]
    pub source_file: String,
    #[prost(int32, tag = "4")]
    pub source_line: i32,
}

/// Alias kind constants for [`AliasProto::kind`].
pub mod alias_kind {
    pub const MAY_ALIAS: i32 = 0;
    pub const MUST_ALIAS: i32 = 1;
}

#[derive(Clone, PartialEq, Message)]
pub struct AliasProto {
    #[prost(int64, repeated, tag = "1")]
    pub output_shape_index: Vec<i64>,
    #[prost(int64, tag = "2")]
    pub parameter_number: i64,
    #[prost(int32, tag = "3")]
    pub kind: i32,
}

/// An optimized module together with its buffer assignment, as embedded in
/// an executable built with IR embedding enabled.
#[derive(Clone, PartialEq, Message)]
pub struct HloProto {
    #[prost(message, optional, tag = "1")]
    pub hlo_module: Option<HloModuleProto>,
    #[prost(message, optional, tag = "3")]
    pub buffer_assignment: Option<BufferAssignmentProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct BufferAssignmentProto {
    #[prost(message, repeated, tag = "1")]
    pub logical_buffers: Vec<LogicalBufferProto>,
    #[prost(message, repeated, tag = "2")]
    pub buffer_allocations: Vec<BufferAllocationProto>,
}

/// A value produced by one instruction at one tuple index.
#[derive(Clone, PartialEq, Message)]
pub struct LogicalBufferProto {
    #[prost(int64, tag = "1")]
    pub id: i64,
    #[prost(string, tag = "2")]
    pub instruction_name: String,
    #[prost(int64, repeated, tag = "3")]
    pub shape_index: Vec<i64>,
    #[prost(int64, tag = "4")]
    pub size: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct BufferAllocationProto {
    #[prost(int64, tag = "1")]
    pub index: i64,
    #[prost(int64, tag = "2")]
    pub size: i64,
    #[prost(bool, tag = "3")]
    pub is_entry_computation_parameter: bool,
    #[prost(int64, tag = "4")]
    pub parameter_number: i64,
    #[prost(bool, tag = "5")]
    pub maybe_live_out: bool,
    #[prost(bool, tag = "6")]
    pub is_constant: bool,
    #[prost(message, repeated, tag = "7")]
    pub assigned: Vec<AssignedProto>,
}

#[derive(Clone, PartialEq, Message)]
pub struct AssignedProto {
    #[prost(int64, tag = "1")]
    pub logical_buffer_id: i64,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(int64, tag = "3")]
    pub size: i64,
}

impl HloProto {
    /// Serializes to protobuf bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    /// Decodes protobuf bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, prost::DecodeError> {
        Self::decode(bytes)
    }
}
