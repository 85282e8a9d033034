use crate::{
    host::HostValue,
    reflection::KernelType,
    shape::VectorMapping,
};

/// One argument, or a field of a composite argument, on the host side.
#[derive(Clone, Debug)]
pub struct HostNode {
    pub name: String,
    pub value: HostValue,
    pub vector_mapping: VectorMapping,
    pub vector_type: Option<KernelType>,
    pub children: Option<Vec<HostNode>>,
}

impl HostNode {
    pub fn new(name: impl ToString, value: HostValue) -> Self {
        let children = value.children().map(|children| {
            children
                .iter()
                .map(|(name, child)| HostNode::new(name, child.clone()))
                .collect()
        });

        Self {
            name: name.to_string(),
            value,
            vector_mapping: VectorMapping::unset(),
            vector_type: None,
            children,
        }
    }

    pub fn child(&self, name: &str) -> Option<&HostNode> {
        self.children
            .as_ref()?
            .iter()
            .find(|child| child.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut HostNode> {
        self.children
            .as_mut()?
            .iter_mut()
            .find(|child| child.name == name)
    }

    pub fn child_names(&self) -> Vec<String> {
        self.children
            .iter()
            .flatten()
            .map(|child| child.name.clone())
            .collect()
    }

    /// Follows a dotted path into composite children.
    pub fn find_mut(&mut self, path: &[&str]) -> Option<&mut HostNode> {
        match path.split_first() {
            None => Some(self),
            Some((first, rest)) => self.child_mut(first)?.find_mut(rest),
        }
    }
}

/// Host-side description of one call: positional and keyword arguments.
#[derive(Clone, Debug, Default)]
pub struct HostCall {
    pub args: Vec<HostNode>,
    pub kwargs: Vec<HostNode>,
}

impl HostCall {
    pub fn new<S: ToString>(
        args: impl IntoIterator<Item = HostValue>,
        kwargs: impl IntoIterator<Item = (S, HostValue)>,
    ) -> Self {
        let args = args
            .into_iter()
            .enumerate()
            .map(|(i, value)| HostNode::new(format!("_arg{i}"), value))
            .collect();
        let kwargs = kwargs
            .into_iter()
            .map(|(name, value)| HostNode::new(name, value))
            .collect();
        Self { args, kwargs }
    }

    pub fn kwarg(&self, name: &str) -> Option<&HostNode> {
        self.kwargs.iter().find(|node| node.name == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &HostNode> {
        self.args.iter().chain(&self.kwargs)
    }
}
