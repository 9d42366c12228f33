//! Function bodies: signatures, argument attributes and op nodes.

use std::collections::BTreeMap;

use irprobe_ir::Literal;

use crate::tensor::DataType;

/// Per-argument attribute key holding the declared argument shape.
pub const OUTPUT_SHAPES_ATTR: &str = "_output_shapes";

/// An attribute value on a node or argument.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Type(DataType),
    Shape(Vec<i64>),
    ShapeList(Vec<Vec<i64>>),
    IntList(Vec<i64>),
    Tensor(Literal),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<DataType> {
        match self {
            Self::Type(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Literal> {
        match self {
            Self::Tensor(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn as_shape_list(&self) -> Option<&[Vec<i64>]> {
        match self {
            Self::ShapeList(shapes) => Some(shapes),
            _ => None,
        }
    }
}

/// A named, typed input or output of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDef {
    pub name: String,
    pub dtype: DataType,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub name: String,
    pub input_args: Vec<ArgDef>,
    pub output_args: Vec<ArgDef>,
}

/// One operation in a function body.
///
/// Inputs name either a function argument (`"x"`) or an output of an
/// earlier node (`"add"` for output 0, `"split:1"` otherwise).
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
    pub name: String,
    pub op: String,
    pub inputs: Vec<String>,
    pub attrs: BTreeMap<String, AttrValue>,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, op: impl Into<String>, inputs: &[&str]) -> Self {
        Self {
            name: name.into(),
            op: op.into(),
            inputs: inputs.iter().map(|s| (*s).to_string()).collect(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }
}

/// Splits an input reference into the producer name and output index.
pub fn parse_input(input: &str) -> (&str, usize) {
    match input.rsplit_once(':') {
        Some((name, idx)) => match idx.parse() {
            Ok(i) => (name, i),
            Err(_) => (input, 0),
        },
        None => (input, 0),
    }
}

/// A function body as registered in a [`FunctionLibrary`](crate::FunctionLibrary).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionDef {
    pub signature: Signature,
    /// Attributes per input argument index.
    pub arg_attrs: BTreeMap<usize, BTreeMap<String, AttrValue>>,
    pub nodes: Vec<NodeDef>,
    /// Output argument name to the node output it returns.
    pub ret: BTreeMap<String, String>,
}

impl FunctionDef {
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn arity(&self) -> usize {
        self.signature.input_args.len()
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.signature.input_args.iter().position(|a| a.name == name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// The declared shape of input `index`, from its `_output_shapes` attribute.
    pub fn declared_shape(&self, index: usize) -> Option<&[i64]> {
        self.arg_attrs
            .get(&index)?
            .get(OUTPUT_SHAPES_ATTR)?
            .as_shape_list()?
            .first()
            .map(Vec::as_slice)
    }
}

/// Incremental construction of a [`FunctionDef`].
#[derive(Debug, Default)]
pub struct FunctionBuilder {
    def: FunctionDef,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            def: FunctionDef {
                signature: Signature {
                    name: name.into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    /// Adds an input argument with a declared shape annotation.
    pub fn arg(mut self, name: impl Into<String>, dtype: DataType, dims: &[i64]) -> Self {
        let index = self.def.signature.input_args.len();
        self.def.arg_attrs.insert(
            index,
            BTreeMap::from([(
                OUTPUT_SHAPES_ATTR.to_string(),
                AttrValue::ShapeList(vec![dims.to_vec()]),
            )]),
        );
        self.unannotated_arg(name, dtype)
    }

    /// Adds an input argument without any shape annotation.
    pub fn unannotated_arg(mut self, name: impl Into<String>, dtype: DataType) -> Self {
        self.def.signature.input_args.push(ArgDef {
            name: name.into(),
            dtype,
        });
        self
    }

    pub fn node(mut self, node: NodeDef) -> Self {
        self.def.nodes.push(node);
        self
    }

    pub fn ret(mut self, name: impl Into<String>, dtype: DataType, source: impl Into<String>) -> Self {
        let name = name.into();
        self.def.signature.output_args.push(ArgDef {
            name: name.clone(),
            dtype,
        });
        self.def.ret.insert(name, source.into());
        self
    }

    pub fn build(self) -> FunctionDef {
        self.def
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_input_forms() {
        assert_eq!(parse_input("x"), ("x", 0));
        assert_eq!(parse_input("split:1"), ("split", 1));
        assert_eq!(parse_input("scope:name"), ("scope:name", 0));
    }

    #[test]
    fn builder_records_annotations() {
        let f = FunctionBuilder::new("f")
            .arg("x", DataType::F32, &[2, 2])
            .unannotated_arg("y", DataType::F32)
            .node(NodeDef::new("add", "AddV2", &["x", "y"]))
            .ret("out", DataType::F32, "add")
            .build();
        assert_eq!(f.name(), "f");
        assert_eq!(f.arity(), 2);
        assert_eq!(f.arg_attrs.len(), 1);
        assert_eq!(f.declared_shape(0), Some(&[2i64, 2][..]));
        assert_eq!(f.declared_shape(1), None);
        assert_eq!(f.input_index("y"), Some(1));
        assert_eq!(f.ret["out"], "add");
    }

    #[test]
    fn attr_accessors() {
        let node = NodeDef::new("c", "Cast", &["x"]).with_attr("DstT", AttrValue::Type(DataType::S32));
        assert_eq!(node.attr("DstT").and_then(AttrValue::as_type), Some(DataType::S32));
        assert_eq!(node.attr("DstT").and_then(AttrValue::as_int), None);
    }
}
