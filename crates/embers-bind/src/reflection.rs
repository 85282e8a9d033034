//! Kernel-side reflection: the types and function signatures a kernel
//! module declares.

use std::{
    collections::HashMap,
    fmt::Display,
    sync::Arc,
};

use itertools::Itertools;

use crate::{
    access::IOType,
    error::ReflectionError,
    shape::Shape,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float16,
    Float32,
    Float64,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int",
            Self::UInt32 => "uint",
            Self::Int64 => "int64_t",
            Self::UInt64 => "uint64_t",
            Self::Float16 => "half",
            Self::Float32 => "float",
            Self::Float64 => "double",
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KernelType {
    Void,
    Scalar(ScalarType),
    Vector {
        scalar: ScalarType,
        count: usize,
    },
    Array {
        element: Box<KernelType>,
        count: usize,
    },
    Struct(Arc<StructType>),
    StructuredBuffer {
        element: Box<KernelType>,
        writable: bool,
    },
    ByteAddressBuffer {
        writable: bool,
    },
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, KernelType)>,
    pub differentiable: bool,
}

const VECTOR_FIELDS: [&str; 4] = ["x", "y", "z", "w"];

impl KernelType {
    pub fn float() -> Self {
        Self::Scalar(ScalarType::Float32)
    }

    pub fn int() -> Self {
        Self::Scalar(ScalarType::Int32)
    }

    pub fn uint() -> Self {
        Self::Scalar(ScalarType::UInt32)
    }

    pub fn vector(scalar: ScalarType, count: usize) -> Self {
        Self::Vector { scalar, count }
    }

    pub fn float_vector(count: usize) -> Self {
        Self::vector(ScalarType::Float32, count)
    }

    pub fn array(element: KernelType, count: usize) -> Self {
        Self::Array {
            element: Box::new(element),
            count,
        }
    }

    /// Wraps `element` in nested arrays, the last extent innermost.
    pub fn array_of(element: KernelType, extents: &[usize]) -> Self {
        extents
            .iter()
            .rev()
            .fold(element, |element, &count| Self::array(element, count))
    }

    pub fn structured_buffer(element: KernelType, writable: bool) -> Self {
        Self::StructuredBuffer {
            element: Box::new(element),
            writable,
        }
    }

    pub fn structure(
        name: impl ToString,
        fields: impl IntoIterator<Item = (&'static str, KernelType)>,
        differentiable: bool,
    ) -> Self {
        Self::Struct(Arc::new(StructType {
            name: name.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| (name.to_owned(), ty))
                .collect(),
            differentiable,
        }))
    }

    pub fn name(&self) -> String {
        match self {
            Self::Void => "void".to_owned(),
            Self::Scalar(scalar) => scalar.name().to_owned(),
            Self::Vector { scalar, count } => format!("{}{count}", scalar.name()),
            Self::Array { element, count } => format!("{}[{count}]", element.name()),
            Self::Struct(ty) => ty.name.clone(),
            Self::StructuredBuffer { element, writable } => {
                let prefix = if *writable { "RW" } else { "" };
                format!("{prefix}StructuredBuffer<{}>", element.name())
            }
            Self::ByteAddressBuffer { writable } => {
                let prefix = if *writable { "RW" } else { "" };
                format!("{prefix}ByteAddressBuffer")
            }
        }
    }

    pub fn is_void(&self) -> bool {
        *self == Self::Void
    }

    pub fn is_buffer(&self) -> bool {
        matches!(
            self,
            Self::StructuredBuffer { .. } | Self::ByteAddressBuffer { .. }
        )
    }

    /// Dimensions of a value of this type. Structs and resources are opaque.
    pub fn shape(&self) -> Shape {
        match self {
            Self::Vector { count, .. } => Shape::new([*count]),
            Self::Array { element, count } => Shape::new([*count]).concat(&element.shape()),
            _ => Shape::scalar(),
        }
    }

    /// The innermost scalar type of scalars, vectors and arrays.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(scalar) | Self::Vector { scalar, .. } => Some(*scalar),
            Self::Array { element, .. } => element.scalar(),
            _ => None,
        }
    }

    /// Removes `n` leading dimensions.
    pub fn reduce(&self, n: usize) -> Option<KernelType> {
        match (self, n) {
            (_, 0) => Some(self.clone()),
            (Self::Vector { scalar, .. }, 1) => Some(Self::Scalar(*scalar)),
            (Self::Array { element, .. }, n) => element.reduce(n - 1),
            _ => None,
        }
    }

    /// Named members: struct fields in declaration order, or vector
    /// components.
    pub fn fields(&self) -> Option<Vec<(String, KernelType)>> {
        match self {
            Self::Struct(ty) => Some(ty.fields.clone()),
            Self::Vector { scalar, count } => {
                Some(
                    VECTOR_FIELDS
                        .iter()
                        .take(*count)
                        .map(|name| (name.to_string(), Self::Scalar(*scalar)))
                        .collect(),
                )
            }
            _ => None,
        }
    }

    /// The type of this type's differential, if it's differentiable.
    pub fn derivative(&self) -> Option<KernelType> {
        match self {
            Self::Scalar(scalar) | Self::Vector { scalar, .. } => {
                scalar.is_floating_point().then(|| self.clone())
            }
            Self::Array { element, count } => {
                element
                    .derivative()
                    .map(|element| Self::array(element, *count))
            }
            Self::Struct(ty) if ty.differentiable => {
                let fields = ty
                    .fields
                    .iter()
                    .filter_map(|(name, ty)| Some((name.clone(), ty.derivative()?)))
                    .collect();
                Some(Self::Struct(Arc::new(StructType {
                    name: format!("{}.Differential", ty.name),
                    fields,
                    differentiable: true,
                })))
            }
            _ => None,
        }
    }

    /// Whether a value of this type can be passed where `target` is
    /// expected, allowing the implicit conversions of the kernel language.
    pub fn convertible_to(&self, target: &KernelType) -> bool {
        match (self, target) {
            (a, b) if a == b => true,
            (Self::Scalar(_), Self::Scalar(_)) => true,
            (Self::Vector { count: a, .. }, Self::Vector { count: b, .. }) => a == b,
            (
                Self::Array {
                    element: a,
                    count: n,
                },
                Self::Array {
                    element: b,
                    count: m,
                },
            ) => n == m && a.convertible_to(b),
            (
                Self::StructuredBuffer {
                    element: a,
                    writable: wa,
                },
                Self::StructuredBuffer {
                    element: b,
                    writable: wb,
                },
            ) => a == b && (*wa || !*wb),
            (Self::ByteAddressBuffer { writable: wa }, Self::ByteAddressBuffer { writable: wb }) => {
                *wa || !*wb
            }
            _ => false,
        }
    }
}

impl Display for KernelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterDesc {
    pub name: String,
    pub ty: KernelType,
    pub io: IOType,
    pub no_diff: bool,
}

impl Display for ParameterDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.no_diff {
            write!(f, "no_diff ")?;
        }
        write!(f, "{} {} {}", self.io, self.ty, self.name)
    }
}

/// Reflected signature of one function overload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDesc {
    pub name: String,
    pub parameters: Vec<ParameterDesc>,
    pub return_type: KernelType,
    pub differentiable: bool,
}

impl FunctionDesc {
    pub fn new(name: impl ToString, return_type: KernelType) -> Self {
        Self {
            name: name.to_string(),
            parameters: vec![],
            return_type,
            differentiable: false,
        }
    }

    pub fn differentiable(mut self) -> Self {
        self.differentiable = true;
        self
    }

    pub fn param(self, name: impl ToString, ty: KernelType) -> Self {
        self.param_with(name, ty, IOType::In, false)
    }

    pub fn out_param(self, name: impl ToString, ty: KernelType) -> Self {
        self.param_with(name, ty, IOType::Out, false)
    }

    pub fn inout_param(self, name: impl ToString, ty: KernelType) -> Self {
        self.param_with(name, ty, IOType::InOut, false)
    }

    pub fn param_with(mut self, name: impl ToString, ty: KernelType, io: IOType, no_diff: bool) -> Self {
        self.parameters.push(ParameterDesc {
            name: name.to_string(),
            ty,
            io,
            no_diff,
        });
        self
    }
}

impl Display for FunctionDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.differentiable {
            write!(f, "[Differentiable] ")?;
        }
        write!(
            f,
            "{} {}({})",
            self.return_type,
            self.name,
            self.parameters.iter().join(", ")
        )
    }
}

/// Provides reflection data for a compiled kernel module.
pub trait Reflection: Send + Sync {
    fn module_name(&self) -> &str;

    /// All overloads of the function `name`, in declaration order.
    fn overloads(&self, name: &str) -> Result<Vec<FunctionDesc>, ReflectionError>;
}

/// Reflection data held in memory, e.g. converted from a compiler's
/// reflection API once per module.
#[derive(Clone, Debug, Default)]
pub struct ModuleReflection {
    name: String,
    functions: HashMap<String, Vec<FunctionDesc>>,
}

impl ModuleReflection {
    pub fn new(name: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_function(&mut self, function: FunctionDesc) -> &mut Self {
        self.functions
            .entry(function.name.clone())
            .or_default()
            .push(function);
        self
    }
}

impl Reflection for ModuleReflection {
    fn module_name(&self) -> &str {
        &self.name
    }

    fn overloads(&self, name: &str) -> Result<Vec<FunctionDesc>, ReflectionError> {
        self.functions
            .get(name)
            .filter(|overloads| !overloads.is_empty())
            .cloned()
            .ok_or_else(|| {
                ReflectionError::FunctionNotFound {
                    module: self.name.clone(),
                    name: name.to_owned(),
                }
            })
    }
}
