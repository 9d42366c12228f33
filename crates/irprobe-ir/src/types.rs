//! Element types, layouts and shapes.

/// Primitive element type of an array value.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum ElementType {
    /// Boolean predicate.
    Pred,
    /// 8-bit signed integer.
    S8,
    /// 32-bit signed integer.
    S32,
    /// 64-bit signed integer.
    S64,
    /// 8-bit unsigned integer.
    U8,
    /// 32-bit unsigned integer.
    U32,
    /// IEEE half precision.
    F16,
    /// Brain floating point.
    Bf16,
    /// IEEE single precision.
    F32,
    /// IEEE double precision.
    F64,
}

impl ElementType {
    /// Every element type, in wire-id order.
    pub const ALL: [Self; 10] = [
        Self::Pred,
        Self::S8,
        Self::S32,
        Self::S64,
        Self::U8,
        Self::U32,
        Self::F16,
        Self::Bf16,
        Self::F32,
        Self::F64,
    ];

    /// Size of one element in bytes.
    pub fn byte_width(self) -> usize {
        match self {
            Self::Pred | Self::S8 | Self::U8 => 1,
            Self::F16 | Self::Bf16 => 2,
            Self::S32 | Self::U32 | Self::F32 => 4,
            Self::S64 | Self::F64 => 8,
        }
    }

    /// Short lowercase name used in the text format (`f32`, `s32`, ...).
    pub fn name(self) -> &'static str {
        match self {
            Self::Pred => "pred",
            Self::S8 => "s8",
            Self::S32 => "s32",
            Self::S64 => "s64",
            Self::U8 => "u8",
            Self::U32 => "u32",
            Self::F16 => "f16",
            Self::Bf16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Parses a name produced by [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Returns `true` for the floating point types.
    pub fn is_floating(self) -> bool {
        matches!(self, Self::F16 | Self::Bf16 | Self::F32 | Self::F64)
    }

    /// Wire identifier used by the protobuf form.
    pub fn to_proto(self) -> i32 {
        self as i32 + 1
    }

    /// Inverse of [`to_proto`](Self::to_proto).
    pub fn from_proto(id: i32) -> Option<Self> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        Self::ALL.get(index).copied()
    }
}

/// Physical dimension ordering of an array, minor-most dimension first.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Layout {
    pub minor_to_major: Vec<i64>,
}

impl Layout {
    /// Row-major layout for the given rank (`{rank-1, ..., 0}`).
    pub fn default_for_rank(rank: usize) -> Self {
        Self {
            minor_to_major: (0..rank as i64).rev().collect(),
        }
    }

    /// Returns `true` if this layout is a permutation of `0..rank`.
    pub fn is_valid_for_rank(&self, rank: usize) -> bool {
        if self.minor_to_major.len() != rank {
            return false;
        }
        let mut seen = vec![false; rank];
        for &d in &self.minor_to_major {
            match usize::try_from(d).ok().filter(|&d| d < rank) {
                Some(d) if !seen[d] => seen[d] = true,
                _ => return false,
            }
        }
        true
    }
}

/// Shape of a dense array: element type, dimensions and optional layout.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ArrayShape {
    pub element_type: ElementType,
    pub dims: Vec<i64>,
    pub layout: Option<Layout>,
}

impl ArrayShape {
    /// Number of elements (1 for scalars).
    pub fn element_count(&self) -> i64 {
        self.dims.iter().product()
    }

    /// Rank of the array.
    pub fn rank(&self) -> usize {
        self.dims.len()
    }
}

/// The shape of an HLO value: an array or a tuple of shapes.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Shape {
    /// A dense array.
    Array(ArrayShape),
    /// A tuple of (possibly nested) shapes.
    Tuple(Vec<Shape>),
}

impl Shape {
    /// Array shape without a layout.
    pub fn array(element_type: ElementType, dims: impl Into<Vec<i64>>) -> Self {
        Self::Array(ArrayShape {
            element_type,
            dims: dims.into(),
            layout: None,
        })
    }

    /// Rank-0 array shape.
    pub fn scalar(element_type: ElementType) -> Self {
        Self::array(element_type, Vec::new())
    }

    /// Tuple shape.
    pub fn tuple(elements: Vec<Shape>) -> Self {
        Self::Tuple(elements)
    }

    pub fn as_array(&self) -> Option<&ArrayShape> {
        match self {
            Self::Array(a) => Some(a),
            Self::Tuple(_) => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut ArrayShape> {
        match self {
            Self::Array(a) => Some(a),
            Self::Tuple(_) => None,
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Self::Tuple(_))
    }

    /// Element shapes of a tuple (empty for arrays).
    pub fn tuple_elements(&self) -> &[Shape] {
        match self {
            Self::Tuple(elements) => elements,
            Self::Array(_) => &[],
        }
    }

    /// Dimensions of an array shape (empty for tuples).
    pub fn dims(&self) -> &[i64] {
        match self {
            Self::Array(a) => &a.dims,
            Self::Tuple(_) => &[],
        }
    }

    /// Total size in bytes of the array data; tuples count one pointer
    /// (8 bytes) per element, as a tuple buffer holds only the index table.
    pub fn byte_size(&self) -> i64 {
        match self {
            Self::Array(a) => a.element_count() * a.element_type.byte_width() as i64,
            Self::Tuple(elements) => 8 * elements.len() as i64,
        }
    }

    /// Compares shapes ignoring layouts.
    pub fn compatible(&self, other: &Shape) -> bool {
        match (self, other) {
            (Self::Array(a), Self::Array(b)) => a.element_type == b.element_type && a.dims == b.dims,
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.compatible(y))
            }
            _ => false,
        }
    }

    /// Returns `true` if every array in this shape carries a layout.
    pub fn has_layout(&self) -> bool {
        match self {
            Self::Array(a) => a.layout.is_some(),
            Self::Tuple(elements) => elements.iter().all(Shape::has_layout),
        }
    }

    /// Fills in the default layout for every array lacking one.
    /// Returns `true` if anything changed.
    pub fn set_default_layout(&mut self) -> bool {
        match self {
            Self::Array(a) if a.layout.is_none() => {
                a.layout = Some(Layout::default_for_rank(a.rank()));
                true
            }
            Self::Array(_) => false,
            Self::Tuple(elements) => elements
                .iter_mut()
                .fold(false, |changed, e| e.set_default_layout() | changed),
        }
    }

    /// Removes every layout in this shape.
    pub fn clear_layout(&mut self) {
        match self {
            Self::Array(a) => a.layout = None,
            Self::Tuple(elements) => elements.iter_mut().for_each(Shape::clear_layout),
        }
    }

    /// The sub-shape at `index` (a path of tuple indices).
    pub fn subshape(&self, index: &[i64]) -> Option<&Shape> {
        let Some((&first, rest)) = index.split_first() else {
            return Some(self);
        };
        let i = usize::try_from(first).ok()?;
        self.tuple_elements().get(i)?.subshape(rest)
    }
}

/// Parameter and result shapes of a computation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramShape {
    pub parameters: Vec<Shape>,
    pub parameter_names: Vec<String>,
    pub result: Shape,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_widths() {
        assert_eq!(ElementType::F32.byte_width(), 4);
        assert_eq!(ElementType::Bf16.byte_width(), 2);
        assert_eq!(ElementType::Pred.byte_width(), 1);
        assert_eq!(ElementType::S64.byte_width(), 8);
    }

    #[test]
    fn element_type_names_parse_back() {
        for ty in ElementType::ALL {
            assert_eq!(ElementType::from_name(ty.name()), Some(ty));
            assert_eq!(ElementType::from_proto(ty.to_proto()), Some(ty));
        }
        assert_eq!(ElementType::from_name("f128"), None);
        assert_eq!(ElementType::from_proto(0), None);
        assert_eq!(ElementType::from_proto(99), None);
    }

    #[test]
    fn default_layout_is_row_major() {
        assert_eq!(Layout::default_for_rank(3).minor_to_major, vec![2, 1, 0]);
        assert!(Layout::default_for_rank(0).minor_to_major.is_empty());
    }

    #[test]
    fn layout_validity() {
        assert!(Layout::default_for_rank(2).is_valid_for_rank(2));
        let bad = Layout {
            minor_to_major: vec![0, 0],
        };
        assert!(!bad.is_valid_for_rank(2));
        assert!(!Layout::default_for_rank(2).is_valid_for_rank(3));
    }

    #[test]
    fn shape_byte_size() {
        assert_eq!(Shape::array(ElementType::F32, [2, 2]).byte_size(), 16);
        assert_eq!(Shape::scalar(ElementType::S64).byte_size(), 8);
        let t = Shape::tuple(vec![Shape::scalar(ElementType::F32); 3]);
        assert_eq!(t.byte_size(), 24);
    }

    #[test]
    fn compatible_ignores_layout() {
        let a = Shape::array(ElementType::F32, [2, 3]);
        let mut b = a.clone();
        assert!(b.set_default_layout());
        assert!(!b.set_default_layout());
        assert_ne!(a, b);
        assert!(a.compatible(&b));
        assert!(!a.compatible(&Shape::array(ElementType::F32, [3, 2])));
    }

    #[test]
    fn subshape_walks_tuples() {
        let inner = Shape::array(ElementType::S32, [4]);
        let t = Shape::tuple(vec![Shape::scalar(ElementType::F32), inner.clone()]);
        assert_eq!(t.subshape(&[1]), Some(&inner));
        assert_eq!(t.subshape(&[]), Some(&t));
        assert_eq!(t.subshape(&[2]), None);
    }
}
