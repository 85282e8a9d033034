use std::fmt::Display;

use derivative::Derivative;
use itertools::Itertools;

use crate::{
    access::CallMode,
    call::CallData,
    compile::{
        self,
        Compiler,
    },
    config::CallOptions,
    error::Error,
    pipeline::{
        self,
        CallChain,
        Resolved,
        ReturnType,
    },
    reflection::Reflection,
    signature::HostCall,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum ChainItem {
    BwdsDiff,
    TransformInput(Vec<(String, Vec<usize>)>),
    Map {
        args: Vec<Option<Vec<usize>>>,
        kwargs: Vec<(String, Vec<usize>)>,
    },
    ReturnType(ReturnType),
}

fn mapping(axes: &[usize]) -> String {
    format!("({})", axes.iter().join(","))
}

impl Display for ChainItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BwdsDiff => write!(f, "bwds"),
            Self::TransformInput(transforms) => {
                write!(
                    f,
                    "transform({})",
                    transforms
                        .iter()
                        .map(|(path, axes)| format!("{path}={}", mapping(axes)))
                        .join(",")
                )
            }
            Self::Map { args, kwargs } => {
                let args = args.iter().map(|axes| {
                    axes.as_deref()
                        .map(mapping)
                        .unwrap_or_else(|| "_".to_owned())
                });
                let kwargs = kwargs
                    .iter()
                    .map(|(name, axes)| format!("{name}={}", mapping(axes)));
                write!(f, "map({})", args.chain(kwargs).join(","))
            }
            Self::ReturnType(ReturnType::ValueRef) => write!(f, "return_type(valueref)"),
            Self::ReturnType(ReturnType::NdBuffer) => write!(f, "return_type(ndbuffer)"),
        }
    }
}

/// A kernel function and the modifiers chained onto it.
///
/// Modifiers return a new function, so a base function can be shared:
///
/// ```ignore
/// let add = Function::new(&module, "add");
/// let transposed = add.transform_input([("a", [1, 0])]);
/// ```
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct Function<'m> {
    #[derivative(Debug = "ignore")]
    reflection: &'m dyn Reflection,
    name: String,
    chain: Vec<ChainItem>,
}

impl<'m> Function<'m> {
    pub fn new(reflection: &'m dyn Reflection, name: impl ToString) -> Self {
        Self {
            reflection,
            name: name.to_string(),
            chain: vec![],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        self.reflection.module_name()
    }

    fn with(&self, item: ChainItem) -> Self {
        let mut function = self.clone();
        function.chain.push(item);
        function
    }

    /// Calls the backward derivative of the function instead.
    pub fn bwds_diff(&self) -> Self {
        self.with(ChainItem::BwdsDiff)
    }

    /// Maps the dimensions of arguments, given by parameter name or by a
    /// dotted path into a composite argument, to call dimensions.
    pub fn transform_input<S: ToString, M: Into<Vec<usize>>>(
        &self,
        transforms: impl IntoIterator<Item = (S, M)>,
    ) -> Self {
        self.with(ChainItem::TransformInput(
            transforms
                .into_iter()
                .map(|(path, axes)| (path.to_string(), axes.into()))
                .collect(),
        ))
    }

    /// Maps the dimensions of positional and keyword arguments to call
    /// dimensions. `None` leaves a positional argument unmapped.
    pub fn map<S: ToString>(
        &self,
        args: impl IntoIterator<Item = Option<Vec<usize>>>,
        kwargs: impl IntoIterator<Item = (S, Vec<usize>)>,
    ) -> Self {
        self.with(ChainItem::Map {
            args: args.into_iter().collect(),
            kwargs: kwargs
                .into_iter()
                .map(|(name, axes)| (name.to_string(), axes))
                .collect(),
        })
    }

    /// How the implicit `_result` is allocated.
    pub fn return_type(&self, return_type: ReturnType) -> Self {
        self.with(ChainItem::ReturnType(return_type))
    }

    /// Flattens the modifiers. Later mappings for the same argument win.
    pub fn call_chain(&self) -> CallChain {
        let mut chain = CallChain::default();

        for item in &self.chain {
            match item {
                ChainItem::BwdsDiff => chain.call_mode = CallMode::Backward,
                ChainItem::TransformInput(transforms) => {
                    chain.named_mappings.extend(transforms.iter().cloned());
                }
                ChainItem::Map { args, kwargs } => {
                    if chain.positional_mappings.len() < args.len() {
                        chain.positional_mappings.resize(args.len(), None);
                    }
                    for (index, axes) in args.iter().enumerate() {
                        if axes.is_some() {
                            chain.positional_mappings[index] = axes.clone();
                        }
                    }
                    chain.named_mappings.extend(kwargs.iter().cloned());
                }
                ChainItem::ReturnType(return_type) => chain.return_type = Some(*return_type),
            }
        }

        chain
    }

    /// Identifies everything about a call that affects the generated code:
    /// the function, the modifiers and the kind and shape of each argument.
    pub fn signature(&self, call: &HostCall) -> String {
        let mut signature = format!("[{}::{}]", self.module(), self.name);
        for item in &self.chain {
            signature.push('.');
            signature.push_str(&item.to_string());
        }

        let args = call.args.iter().map(|node| node.value.fingerprint());
        let kwargs = call
            .kwargs
            .iter()
            .map(|node| format!("{}={}", node.name, node.value.fingerprint()));
        signature.push_str(&format!(".({})", args.chain(kwargs).join(",")));

        signature
    }

    pub fn resolve(&self, call: HostCall, options: &CallOptions) -> Result<Resolved, Error> {
        tracing::debug!(function = %self.name, "resolving call");
        pipeline::resolve(
            self.reflection,
            &self.name,
            call,
            &self.call_chain(),
            options,
        )
    }

    /// Resolves and compiles a call, bypassing any cache.
    pub fn build_call_data<C: Compiler>(
        &self,
        compiler: &C,
        call: HostCall,
        options: &CallOptions,
    ) -> Result<CallData<C::Kernel>, Error> {
        let signature = self.signature(&call);
        let resolved = self.resolve(call, options)?;
        let kernel = compile::compile(compiler, self.module(), &self.name, &resolved.source)?;
        let call_data = CallData::new(signature, resolved, kernel);

        if let Some(dir) = &options.dump_dir {
            match call_data.dump(dir) {
                Ok(path) => tracing::debug!(path = %path.display(), "dumped kernel source"),
                Err(error) => {
                    tracing::warn!(%error, dir = %dir.display(), "failed to dump kernel source")
                }
            }
        }

        Ok(call_data)
    }
}
