use super::HostValue;
use crate::{
    error::ResolutionError,
    reflection::KernelType,
};

impl HostValue {
    fn resolution_error(&self, path: &str, kernel: impl ToString, reason: impl ToString) -> ResolutionError {
        ResolutionError {
            path: path.to_owned(),
            host: self.to_string(),
            kernel: kernel.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The type of one element after removing `n` leading dimensions, as
    /// selected by an explicit mapping of length `n`.
    pub fn reduce_type(&self, path: &str, n: usize) -> Result<KernelType, ResolutionError> {
        let reduced = match self {
            Self::Scalar(ty) | Self::ValueRef(ty) => ty.reduce(n),
            Self::NdBuffer(buffer) => {
                let rank = buffer.shape.rank();
                if n <= rank {
                    buffer.shape.skip(n).concrete().map(|extents| {
                        KernelType::array_of(buffer.element.clone(), &extents)
                    })
                }
                else {
                    buffer.element.reduce(n - rank)
                }
            }
            Self::StructuredBuffer(_) if n == 0 => self.buffer_type(),
            Self::WangHash(hash) => hash.kernel_type().reduce(n),
            _ => None,
        };

        reduced.ok_or_else(|| {
            self.resolution_error(
                path,
                format!("{n} mapped dimensions"),
                format!("can't remove {n} dimensions from a {}", self.kind_name()),
            )
        })
    }

    /// Reconciles this value with the kernel type it's bound to and returns
    /// the concrete type each call point receives.
    pub fn resolve_type(&self, path: &str, bound: &KernelType) -> Result<KernelType, ResolutionError> {
        let fail = |reason: &str| Err(self.resolution_error(path, bound, reason));

        match self {
            Self::Scalar(ty) | Self::ValueRef(ty) => {
                if ty.convertible_to(bound) {
                    Ok(bound.clone())
                }
                else {
                    fail("types are not convertible")
                }
            }
            Self::NdBuffer(buffer) => {
                if bound.is_buffer() || bound.is_void() {
                    return fail("nd buffers can only be vectorized against value types");
                }

                let shape = self.shape();
                let Some(bound_extents) = bound.shape().concrete()
                else {
                    return fail("kernel type has unknown extents");
                };
                if bound_extents.len() > shape.rank() {
                    return fail("kernel type has more dimensions than the buffer");
                }
                if shape.tail(bound_extents.len()).concrete().as_ref() != Some(&bound_extents) {
                    return fail("trailing buffer dimensions don't match the kernel type");
                }

                let compatible = match bound {
                    KernelType::Struct(_) => buffer.element == *bound,
                    _ => bound.scalar().is_some() && buffer.element.scalar() == bound.scalar(),
                };
                if compatible {
                    Ok(bound.clone())
                }
                else {
                    fail("element types don't match")
                }
            }
            Self::StructuredBuffer(buffer) => {
                let compatible = match bound {
                    KernelType::StructuredBuffer { element, writable } => {
                        buffer.element.as_ref() == Some(element.as_ref())
                            && (buffer.writable || !writable)
                    }
                    KernelType::ByteAddressBuffer { writable } => buffer.writable || !writable,
                    _ => {
                        return fail(
                            "raw buffers can't be vectorized, use an nd buffer instead",
                        )
                    }
                };
                if compatible {
                    Ok(bound.clone())
                }
                else {
                    fail("buffer element type or access doesn't match")
                }
            }
            Self::WangHash(hash) => {
                if hash.kernel_type() == *bound {
                    Ok(bound.clone())
                }
                else {
                    fail("wang hash arguments bind to uint vectors of their dimension")
                }
            }
            Self::Composite(children) => {
                match bound.fields() {
                    Some(fields) if fields.len() == children.len() => Ok(bound.clone()),
                    Some(_) => fail("number of fields doesn't match"),
                    None => fail("kernel type has no fields"),
                }
            }
            Self::Output => Ok(bound.clone()),
        }
    }

    /// Number of call dimensions needed to get from this value to
    /// `vector_type`. `None` for values that inherit the call's
    /// dimensionality.
    pub fn resolve_dimensionality(
        &self,
        path: &str,
        vector_type: &KernelType,
    ) -> Result<Option<usize>, ResolutionError> {
        match self {
            Self::StructuredBuffer(_) | Self::WangHash(_) => Ok(Some(0)),
            Self::Output => Ok(None),
            _ => {
                let rank = self.shape().rank();
                let vector_rank = vector_type.shape().rank();
                rank.checked_sub(vector_rank).map(Some).ok_or_else(|| {
                    self.resolution_error(
                        path,
                        vector_type,
                        format!("a {rank}-dimensional value can't provide a {vector_rank}-dimensional type"),
                    )
                })
            }
        }
    }

    fn buffer_type(&self) -> Option<KernelType> {
        match self {
            Self::StructuredBuffer(buffer) => {
                Some(match &buffer.element {
                    Some(element) => KernelType::structured_buffer(element.clone(), buffer.writable),
                    None => {
                        KernelType::ByteAddressBuffer {
                            writable: buffer.writable,
                        }
                    }
                })
            }
            _ => None,
        }
    }
}
