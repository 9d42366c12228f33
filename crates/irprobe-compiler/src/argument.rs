//! Compiler-facing argument descriptors.

use std::fmt;

use irprobe_ir::{ElementType, Literal, Shape};

/// How an argument reaches the compiled program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgumentKind {
    /// A runtime parameter of the program.
    Parameter,
    /// A value baked into the program as a constant.
    Constant,
    /// A resource variable, passed as a parameter and possibly updated.
    Resource,
}

impl fmt::Display for ArgumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Parameter => "parameter",
            Self::Constant => "constant",
            Self::Resource => "resource",
        })
    }
}

/// Describes one function argument to the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub kind: ArgumentKind,
    pub name: String,
    /// Array shape of the value (for resources, of the variable's value).
    pub shape: Shape,
    /// Set for [`ArgumentKind::Constant`].
    pub constant_value: Option<Literal>,
    /// For resources: whether the variable holds a value.
    pub initialized: bool,
}

impl Argument {
    pub fn parameter(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            kind: ArgumentKind::Parameter,
            name: name.into(),
            shape,
            constant_value: None,
            initialized: true,
        }
    }

    pub fn constant(name: impl Into<String>, value: Literal) -> Self {
        Self {
            kind: ArgumentKind::Constant,
            name: name.into(),
            shape: value.shape(),
            constant_value: Some(value),
            initialized: true,
        }
    }

    pub fn resource(name: impl Into<String>, shape: Shape, initialized: bool) -> Self {
        Self {
            kind: ArgumentKind::Resource,
            name: name.into(),
            shape,
            constant_value: None,
            initialized,
        }
    }

    pub fn element_type(&self) -> Option<ElementType> {
        self.shape.as_array().map(|a| a.element_type)
    }

    /// `true` if the argument becomes a program parameter.
    pub fn is_parameter(&self) -> bool {
        match self.kind {
            ArgumentKind::Parameter => true,
            ArgumentKind::Resource => self.initialized,
            ArgumentKind::Constant => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_takes_literal_shape() {
        let arg = Argument::constant("perm", Literal::new(ElementType::S32, [2], vec![1.0, 0.0]).unwrap());
        assert_eq!(arg.shape, Shape::array(ElementType::S32, [2]));
        assert!(!arg.is_parameter());
    }

    #[test]
    fn uninitialized_resource_is_not_a_parameter() {
        let shape = Shape::array(ElementType::F32, [3]);
        assert!(Argument::resource("v", shape.clone(), true).is_parameter());
        assert!(!Argument::resource("v", shape, false).is_parameter());
    }
}
