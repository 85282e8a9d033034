//! Host-side argument descriptions.
//!
//! The resolution pipeline never looks at argument data. A host describes each
//! argument by its kind, declared shape, element type, writability and
//! whether it carries gradients.

mod calldata;
mod vectorize;

use itertools::Itertools;

pub(crate) use self::calldata::gen_leaf_calldata;
use crate::{
    reflection::{
        KernelType,
        ScalarType,
    },
    shape::Shape,
};

#[derive(Clone, Debug, PartialEq)]
pub enum HostValue {
    /// A plain value passed by value, e.g. a float or a vector.
    Scalar(KernelType),

    /// A single value the kernel may write to.
    ValueRef(KernelType),

    /// An N-dimensional buffer.
    NdBuffer(NdBufferDesc),

    /// A raw buffer that can only be bound to buffer parameters.
    StructuredBuffer(StructuredBufferDesc),

    /// Random uints, hashed from a seed and the call coordinate.
    WangHash(WangHashArg),

    /// Named sub-values mirroring the fields of a kernel type.
    Composite(Vec<(String, HostValue)>),

    /// Placeholder for an output the call allocates itself. It's replaced
    /// once the call dimensionality is known.
    Output,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NdBufferDesc {
    pub element: KernelType,
    pub shape: Shape,
    pub writable: bool,
    pub requires_grad: bool,
}

impl NdBufferDesc {
    pub fn new(element: KernelType, shape: impl Into<Shape>) -> Self {
        Self {
            element,
            shape: shape.into(),
            writable: true,
            requires_grad: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn with_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructuredBufferDesc {
    /// `None` for untyped (byte address) buffers.
    pub element: Option<KernelType>,
    pub element_count: Option<usize>,
    /// Whether the buffer was created with unordered access.
    pub writable: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WangHashArg {
    pub dims: usize,
    pub seed: u32,
}

impl WangHashArg {
    pub fn new(dims: usize, seed: u32) -> Self {
        Self { dims, seed }
    }

    pub fn kernel_type(&self) -> KernelType {
        if self.dims == 1 {
            KernelType::uint()
        }
        else {
            KernelType::vector(ScalarType::UInt32, self.dims)
        }
    }
}

impl HostValue {
    pub fn scalar(ty: KernelType) -> Self {
        Self::Scalar(ty)
    }

    pub fn value_ref(ty: KernelType) -> Self {
        Self::ValueRef(ty)
    }

    pub fn nd_buffer(desc: NdBufferDesc) -> Self {
        Self::NdBuffer(desc)
    }

    pub fn composite<S: ToString>(children: impl IntoIterator<Item = (S, HostValue)>) -> Self {
        Self::Composite(
            children
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::ValueRef(_) => "value reference",
            Self::NdBuffer(_) => "nd buffer",
            Self::StructuredBuffer(_) => "structured buffer",
            Self::WangHash(_) => "wang hash",
            Self::Composite(_) => "composite",
            Self::Output => "output",
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    pub fn children(&self) -> Option<&[(String, HostValue)]> {
        match self {
            Self::Composite(children) => Some(children),
            _ => None,
        }
    }

    /// Full shape: container dimensions followed by the element's own
    /// dimensions.
    pub fn shape(&self) -> Shape {
        match self {
            Self::Scalar(ty) | Self::ValueRef(ty) => ty.shape(),
            Self::NdBuffer(buffer) => buffer.shape.concat(&buffer.element.shape()),
            Self::StructuredBuffer(buffer) => Shape::from_dims(vec![buffer.element_count]),
            Self::WangHash(hash) => Shape::new([hash.dims]),
            Self::Composite(_) | Self::Output => Shape::scalar(),
        }
    }

    pub fn is_writable(&self) -> bool {
        match self {
            Self::Scalar(_) | Self::WangHash(_) => false,
            Self::ValueRef(_) | Self::Output => true,
            Self::NdBuffer(buffer) => buffer.writable,
            Self::StructuredBuffer(buffer) => buffer.writable,
            Self::Composite(children) => children.iter().all(|(_, child)| child.is_writable()),
        }
    }

    /// Whether the value carries storage for derivatives.
    pub fn is_differentiable(&self) -> bool {
        match self {
            Self::NdBuffer(buffer) => buffer.requires_grad && buffer.element.derivative().is_some(),
            Self::Composite(_) => true,
            _ => false,
        }
    }

    /// Short description of the argument's type, shape and usage for call
    /// signatures. Never includes data.
    ///
    /// Buffer extents are part of it: overloads are matched against the
    /// trailing extents, and broadcast dimensions are emitted as constant
    /// indices.
    pub fn fingerprint(&self) -> String {
        match self {
            Self::Scalar(ty) => format!("[scalar:{ty}]"),
            Self::ValueRef(ty) => format!("[valueref:{ty}]"),
            Self::NdBuffer(buffer) => {
                format!(
                    "[ndbuffer:{},{},{}{}]",
                    buffer.element,
                    buffer.shape,
                    if buffer.writable { "w" } else { "r" },
                    if buffer.requires_grad { "g" } else { "" },
                )
            }
            Self::StructuredBuffer(buffer) => {
                format!(
                    "[buffer:{},{}]",
                    buffer
                        .element
                        .as_ref()
                        .map(KernelType::name)
                        .unwrap_or_else(|| "bytes".to_owned()),
                    if buffer.writable { "w" } else { "r" },
                )
            }
            Self::WangHash(hash) => format!("[wanghash:{}]", hash.dims),
            Self::Composite(children) => {
                format!(
                    "{{{}}}",
                    children
                        .iter()
                        .map(|(name, child)| format!("{name}:{}", child.fingerprint()))
                        .join(",")
                )
            }
            Self::Output => "[output]".to_owned(),
        }
    }
}

impl std::fmt::Display for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(ty) => write!(f, "scalar {ty}"),
            Self::ValueRef(ty) => write!(f, "value reference {ty}"),
            Self::NdBuffer(buffer) => write!(f, "nd buffer {}{}", buffer.element, buffer.shape),
            Self::StructuredBuffer(buffer) => {
                match &buffer.element {
                    Some(element) => write!(f, "structured buffer {element}"),
                    None => write!(f, "byte buffer"),
                }
            }
            Self::WangHash(hash) => write!(f, "wang hash {}", hash.kernel_type()),
            Self::Composite(children) => {
                write!(f, "composite {{{}}}", children.iter().map(|(name, _)| name).join(", "))
            }
            Self::Output => write!(f, "output"),
        }
    }
}
