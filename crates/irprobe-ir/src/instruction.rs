//! HLO instructions.

use crate::literal::Literal;
use crate::types::Shape;

/// Identifier of an instruction, unique within its computation.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct InstrId(pub u32);

/// The operation an instruction performs.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum Opcode {
    Parameter,
    Constant,
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
    Negate,
    Exponential,
    Log,
    Tanh,
    Dot,
    Reshape,
    Transpose,
    Broadcast,
    Convert,
    Copy,
    Tuple,
    GetTupleElement,
    AllReduce,
}

impl Opcode {
    const ALL: [Self; 21] = [
        Self::Parameter,
        Self::Constant,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::Maximum,
        Self::Minimum,
        Self::Negate,
        Self::Exponential,
        Self::Log,
        Self::Tanh,
        Self::Dot,
        Self::Reshape,
        Self::Transpose,
        Self::Broadcast,
        Self::Convert,
        Self::Copy,
        Self::Tuple,
        Self::GetTupleElement,
        Self::AllReduce,
    ];

    /// Name used in the text and wire formats.
    pub fn name(self) -> &'static str {
        match self {
            Self::Parameter => "parameter",
            Self::Constant => "constant",
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
            Self::Divide => "divide",
            Self::Maximum => "maximum",
            Self::Minimum => "minimum",
            Self::Negate => "negate",
            Self::Exponential => "exponential",
            Self::Log => "log",
            Self::Tanh => "tanh",
            Self::Dot => "dot",
            Self::Reshape => "reshape",
            Self::Transpose => "transpose",
            Self::Broadcast => "broadcast",
            Self::Convert => "convert",
            Self::Copy => "copy",
            Self::Tuple => "tuple",
            Self::GetTupleElement => "get-tuple-element",
            Self::AllReduce => "all-reduce",
        }
    }

    /// Parses a name produced by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Two-operand elementwise arithmetic.
    pub fn is_elementwise_binary(self) -> bool {
        matches!(
            self,
            Self::Add
                | Self::Subtract
                | Self::Multiply
                | Self::Divide
                | Self::Maximum
                | Self::Minimum
        )
    }

    /// One-operand elementwise math.
    pub fn is_elementwise_unary(self) -> bool {
        matches!(
            self,
            Self::Negate | Self::Exponential | Self::Log | Self::Tanh | Self::Copy
        )
    }
}

/// Contracting dimensions of a `dot`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DotDimensions {
    pub lhs_contracting: Vec<i64>,
    pub rhs_contracting: Vec<i64>,
}

/// Source-level provenance attached to an instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpMetadata {
    /// Op type in the function body (e.g. `AddV2`).
    pub op_type: String,
    /// Node name in the function body.
    pub op_name: String,
    pub source_file: String,
    pub source_line: i32,
}

impl OpMetadata {
    pub fn new(op_type: impl Into<String>, op_name: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            op_name: op_name.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.op_type.is_empty()
            && self.op_name.is_empty()
            && self.source_file.is_empty()
            && self.source_line == 0
    }
}

/// A single HLO instruction.
///
/// Opcode-specific attributes live in optional fields; only the fields
/// relevant to `opcode` are set.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    /// Assigned by [`Computation::add`](crate::Computation::add).
    pub id: InstrId,
    pub name: String,
    pub opcode: Opcode,
    pub shape: Shape,
    pub operands: Vec<InstrId>,
    /// `parameter` only.
    pub parameter_number: Option<u32>,
    /// `constant` only.
    pub literal: Option<Literal>,
    /// Permutation for `transpose`, mapped dimensions for `broadcast`.
    pub dimensions: Vec<i64>,
    /// `get-tuple-element` only.
    pub tuple_index: Option<u32>,
    /// `dot` only.
    pub dot_dimensions: Option<DotDimensions>,
    /// `all-reduce` only: number of replicas in the group.
    pub replica_group_size: Option<u32>,
    pub metadata: Option<OpMetadata>,
}

impl Instruction {
    /// A bare instruction; `name` is the base that the computation suffixes
    /// with the instruction id.
    pub fn new(opcode: Opcode, name: impl Into<String>, shape: Shape, operands: Vec<InstrId>) -> Self {
        Self {
            id: InstrId(0),
            name: name.into(),
            opcode,
            shape,
            operands,
            parameter_number: None,
            literal: None,
            dimensions: Vec::new(),
            tuple_index: None,
            dot_dimensions: None,
            replica_group_size: None,
            metadata: None,
        }
    }

    pub fn parameter(number: u32, name: impl Into<String>, shape: Shape) -> Self {
        Self {
            parameter_number: Some(number),
            ..Self::new(Opcode::Parameter, name, shape, Vec::new())
        }
    }

    pub fn constant(name: impl Into<String>, literal: Literal) -> Self {
        Self {
            literal: Some(literal.clone()),
            ..Self::new(Opcode::Constant, name, literal.shape(), Vec::new())
        }
    }

    pub fn tuple(name: impl Into<String>, elements: Vec<(InstrId, Shape)>) -> Self {
        let (operands, shapes): (Vec<_>, Vec<_>) = elements.into_iter().unzip();
        Self::new(Opcode::Tuple, name, Shape::Tuple(shapes), operands)
    }

    pub fn with_dimensions(mut self, dimensions: Vec<i64>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_metadata(mut self, metadata: OpMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Replaces every use of `from` among the operands with `to`.
    pub fn replace_operand(&mut self, from: InstrId, to: InstrId) -> bool {
        let mut changed = false;
        for op in &mut self.operands {
            if *op == from {
                *op = to;
                changed = true;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ElementType;

    #[test]
    fn opcode_names_parse_back() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_name(op.name()), Some(op));
        }
        assert_eq!(Opcode::from_name("fusion"), None);
    }

    #[test]
    fn elementwise_classes_are_disjoint() {
        for op in Opcode::ALL {
            assert!(!(op.is_elementwise_binary() && op.is_elementwise_unary()));
        }
        assert!(Opcode::Add.is_elementwise_binary());
        assert!(Opcode::Tanh.is_elementwise_unary());
        assert!(!Opcode::Dot.is_elementwise_binary());
    }

    #[test]
    fn constant_takes_literal_shape() {
        let lit = Literal::splat(ElementType::F32, [3], 1.0);
        let instr = Instruction::constant("one", lit);
        assert_eq!(instr.shape, Shape::array(ElementType::F32, [3]));
        assert_eq!(instr.opcode, Opcode::Constant);
    }

    #[test]
    fn replace_operand_rewrites_all_uses() {
        let shape = Shape::scalar(ElementType::F32);
        let mut add = Instruction::new(Opcode::Add, "add", shape, vec![InstrId(1), InstrId(1)]);
        assert!(add.replace_operand(InstrId(1), InstrId(7)));
        assert_eq!(add.operands, vec![InstrId(7), InstrId(7)]);
        assert!(!add.replace_operand(InstrId(1), InstrId(7)));
    }

    #[test]
    fn empty_metadata() {
        assert!(OpMetadata::default().is_empty());
        assert!(!OpMetadata::new("AddV2", "add").is_empty());
    }
}
