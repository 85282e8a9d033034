use crate::{
    access::IOType,
    reflection::{
        FunctionDesc,
        KernelType,
        ParameterDesc,
    },
};

pub const RESULT_NAME: &str = "_result";

/// One parameter, or a field of a parameter, on the kernel side.
#[derive(Clone, Debug)]
pub struct KernelNode {
    pub name: String,
    pub io: IOType,
    pub no_diff: bool,
    pub primal: KernelType,
    pub derivative: Option<KernelType>,
    pub children: Option<Vec<KernelNode>>,
}

impl KernelNode {
    fn new(name: String, ty: KernelType, io: IOType, no_diff: bool) -> Self {
        // fields inherit the parameter's modifiers
        let children = ty.fields().map(|fields| {
            fields
                .into_iter()
                .map(|(name, ty)| KernelNode::new(name, ty, io, no_diff))
                .collect()
        });

        Self {
            name,
            io,
            no_diff,
            derivative: ty.derivative(),
            primal: ty,
            children,
        }
    }

    pub fn parameter(desc: &ParameterDesc) -> Self {
        Self::new(desc.name.clone(), desc.ty.clone(), desc.io, desc.no_diff)
    }

    /// The node a non-void function's return value is bound to. It's always
    /// an output and only differentiable if the function is.
    pub fn return_value(function: &FunctionDesc) -> Option<Self> {
        (!function.return_type.is_void()).then(|| {
            Self::new(
                RESULT_NAME.to_owned(),
                function.return_type.clone(),
                IOType::Out,
                !function.differentiable,
            )
        })
    }

    pub fn child(&self, name: &str) -> Option<&KernelNode> {
        self.children
            .as_ref()?
            .iter()
            .find(|child| child.name == name)
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children
            .iter()
            .flatten()
            .map(|child| child.name.clone())
            .collect()
    }
}

/// One overload of a kernel function, with its parameter trees.
#[derive(Clone, Debug)]
pub struct KernelFunction {
    pub overload: usize,
    pub desc: FunctionDesc,
    pub parameters: Vec<KernelNode>,
    pub return_value: Option<KernelNode>,
}

impl KernelFunction {
    pub fn new(overload: usize, desc: FunctionDesc) -> Self {
        let parameters = desc.parameters.iter().map(KernelNode::parameter).collect();
        let return_value = KernelNode::return_value(&desc);
        Self {
            overload,
            desc,
            parameters,
            return_value,
        }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn differentiable(&self) -> bool {
        self.desc.differentiable
    }

    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|param| param.name == name)
    }
}
