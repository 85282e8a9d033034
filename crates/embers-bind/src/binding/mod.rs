//! The binding tree: each host node paired with the kernel node it's passed
//! to, plus everything the pipeline derives for the pair.

mod codegen;

use std::fmt::Display;

use itertools::Itertools;

pub(crate) use self::codegen::Accessor;
use crate::{
    access::{
        access_for,
        AccessPair,
        CallMode,
    },
    error::{
        Error,
        GenerationError,
    },
    host::HostValue,
    reflection::KernelType,
    shape::VectorMapping,
    signature::{
        HostNode,
        KernelNode,
    },
};

#[derive(Clone, Debug)]
pub struct BoundVariable {
    pub name: String,

    /// Dotted path from the argument to this node, e.g. `a.x`.
    pub path: String,

    pub value: HostValue,
    pub kernel: KernelNode,
    pub vector_mapping: VectorMapping,

    /// The type each call point receives.
    pub vector_type: Option<KernelType>,

    pub access: AccessPair,
    pub differentiable: bool,

    /// Number of call dimensions this node needs. `None` until known, or
    /// for outputs that take whatever the call has.
    pub call_dimensionality: Option<usize>,

    pub children: Option<Vec<BoundVariable>>,
}

impl BoundVariable {
    pub fn new(host: &HostNode, kernel: &KernelNode, parent: Option<&str>) -> Result<Self, GenerationError> {
        let path = match parent {
            Some(parent) => format!("{parent}.{}", kernel.name),
            None => kernel.name.clone(),
        };

        let children = match (&host.children, &kernel.children) {
            (None, _) => None,
            (Some(host_children), Some(kernel_children))
                if host_children.len() == kernel_children.len() =>
            {
                let children = kernel_children
                    .iter()
                    .map(|kernel_child| {
                        let host_child = host.child(&kernel_child.name).ok_or_else(|| {
                            child_mismatch(&path, host, kernel)
                        })?;
                        BoundVariable::new(host_child, kernel_child, Some(&path))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(children)
            }
            (Some(_), _) => return Err(child_mismatch(&path, host, kernel)),
        };

        Ok(Self {
            name: kernel.name.clone(),
            path,
            value: host.value.clone(),
            kernel: kernel.clone(),
            vector_mapping: host.vector_mapping.clone(),
            vector_type: host.vector_type.clone(),
            access: AccessPair::NONE,
            differentiable: false,
            call_dimensionality: None,
            children,
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> &[BoundVariable] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Resolves the vector type of this node and how many call dimensions
    /// it needs.
    pub fn apply_implicit_vectorization(&mut self) -> Result<(), Error> {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.apply_implicit_vectorization()?;
            }

            self.call_dimensionality = Some(
                children
                    .iter()
                    .filter_map(|child| child.call_dimensionality)
                    .max()
                    .unwrap_or_default(),
            );
            self.vector_type = Some(self.value.resolve_type(&self.path, &self.kernel.primal)?);
            return Ok(());
        }

        let vector_type = match &self.vector_type {
            Some(vector_type) => vector_type.clone(),
            None => self.value.resolve_type(&self.path, &self.kernel.primal)?,
        };

        self.call_dimensionality = match self.vector_mapping.call_dimensionality() {
            Some(dims) => Some(dims),
            None => self.value.resolve_dimensionality(&self.path, &vector_type)?,
        };
        self.vector_type = Some(vector_type);

        Ok(())
    }

    /// Assigns the default right-aligned mapping to every node without an
    /// explicit one.
    pub fn finalize_mappings(&mut self, call_dimensionality: usize) -> Result<(), GenerationError> {
        for child in self.children.iter_mut().flatten() {
            child.finalize_mappings(call_dimensionality)?;
        }

        if !self.vector_mapping.is_valid() {
            let dims = self.call_dimensionality.unwrap_or(call_dimensionality);
            if dims > call_dimensionality {
                return Err(GenerationError::MappingOutOfRange {
                    path: self.path.clone(),
                    mapping: vec![],
                    call_dimensionality,
                });
            }
            self.vector_mapping = VectorMapping::right_aligned(call_dimensionality, dims);
            self.call_dimensionality = Some(dims);
        }

        tracing::trace!(path = %self.path, mapping = %self.vector_mapping, "finalized mapping");

        Ok(())
    }

    /// A node is differentiable if the kernel wants a derivative for it, the
    /// kernel type has one and the host value can store one.
    pub fn calculate_differentiability(&mut self, call_mode: CallMode) {
        self.differentiable = !self.kernel.no_diff
            && self.kernel.derivative.is_some()
            && self.value.is_differentiable();

        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                child.calculate_differentiability(call_mode);
            }
            self.differentiable &= children.iter().any(|child| child.differentiable);
        }

        self.access = access_for(call_mode, self.kernel.io, self.differentiable);
    }

    /// This node and all nodes below it, depth first.
    pub fn nodes(&self) -> Vec<&BoundVariable> {
        let mut nodes = vec![self];
        for child in self.children() {
            nodes.extend(child.nodes());
        }
        nodes
    }

    pub fn leaves(&self) -> Vec<&BoundVariable> {
        self.nodes()
            .into_iter()
            .filter(|node| node.is_leaf())
            .collect()
    }

    /// Where each of this node's own dimensions takes its index from.
    /// Dimensions of extent 1 broadcast and always use index 0.
    pub fn local_dims(&self) -> Option<Vec<LocalDim>> {
        let shape = self.value.shape();

        let dims = self
            .vector_mapping
            .axes()?
            .iter()
            .enumerate()
            .map(|(local, &axis)| {
                if shape.get(local) == Some(1) {
                    LocalDim::Broadcast
                }
                else {
                    LocalDim::Axis(axis)
                }
            })
            .collect();
        Some(dims)
    }

    /// The index into this node's own dimensions that the generated
    /// accessors use at the call coordinate `call_id`.
    pub fn local_index(&self, call_id: &[usize]) -> Option<Vec<usize>> {
        self.local_dims()?
            .into_iter()
            .map(|dim| {
                match dim {
                    LocalDim::Broadcast => Some(0),
                    LocalDim::Axis(axis) => call_id.get(axis).copied(),
                }
            })
            .collect()
    }
}

/// Source of the index of one local dimension.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LocalDim {
    /// The call coordinate on this axis.
    Axis(usize),

    /// Always 0.
    Broadcast,
}

impl Display for LocalDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Axis(axis) => write!(f, "context.call_id[{axis}]"),
            Self::Broadcast => write!(f, "0"),
        }
    }
}

fn child_mismatch(path: &str, host: &HostNode, kernel: &KernelNode) -> GenerationError {
    GenerationError::ChildMismatch {
        path: path.to_owned(),
        host: host.child_names(),
        kernel: kernel.child_names(),
    }
}

impl Display for BoundVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {} {}",
            self.path,
            self.value,
            self.vector_type
                .as_ref()
                .map(KernelType::name)
                .unwrap_or_else(|| "?".to_owned()),
            self.vector_mapping,
        )?;
        if !self.access.primal.is_none() || !self.access.derivative.is_none() {
            write!(f, " {}", self.access)?;
        }
        Ok(())
    }
}

/// The bound arguments of one call, in the kernel's parameter order.
#[derive(Clone, Debug, Default)]
pub struct BoundCall {
    pub parameters: Vec<BoundVariable>,
    pub result: Option<BoundVariable>,
}

impl BoundCall {
    pub fn iter(&self) -> impl Iterator<Item = &BoundVariable> {
        self.parameters.iter().chain(&self.result)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BoundVariable> {
        self.parameters.iter_mut().chain(&mut self.result)
    }

    pub fn nodes(&self) -> Vec<&BoundVariable> {
        self.iter().flat_map(BoundVariable::nodes).collect()
    }

    pub fn leaves(&self) -> Vec<&BoundVariable> {
        self.iter().flat_map(BoundVariable::leaves).collect()
    }

    /// Looks up a node by its dotted path.
    pub fn find(&self, path: &str) -> Option<&BoundVariable> {
        self.nodes().into_iter().find(|node| node.path == path)
    }
}

impl Display for BoundCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.nodes().into_iter().join("\n"))
    }
}
