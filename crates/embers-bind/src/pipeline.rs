//! The resolution phases, in the order a call runs through them.
//!
//! Each phase either completes for every node or fails with the path of the
//! node it failed on. No tree is handed to the next phase half-processed.

use itertools::Itertools;

use crate::{
    access::{
        CallMode,
        PrimType,
    },
    binding::{
        BoundCall,
        BoundVariable,
    },
    codegen::CodeGen,
    config::CallOptions,
    diagnostics,
    error::{
        DifferentiabilityError,
        Error,
        GenerationError,
        InvalidMapping,
        MismatchReason,
        OverloadMismatch,
        ResolutionError,
        WritabilityError,
    },
    host::{
        HostValue,
        NdBufferDesc,
    },
    reflection::Reflection,
    shape::{
        CallShapeBuilder,
        Shape,
        VectorMapping,
    },
    signature::{
        HostCall,
        HostNode,
        KernelFunction,
        KernelNode,
        RESULT_NAME,
    },
};

/// How an implicit `_result` is allocated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReturnType {
    /// A single value. Only possible for 0-dimensional calls.
    ValueRef,

    /// A buffer with one dimension per call dimension.
    NdBuffer,
}

/// Everything a function's call chain contributes to resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallChain {
    pub call_mode: CallMode,

    /// Explicit mappings for positional arguments.
    pub positional_mappings: Vec<Option<Vec<usize>>>,

    /// Explicit mappings by parameter name, or by a dotted path into a
    /// composite argument.
    pub named_mappings: Vec<(String, Vec<usize>)>,

    pub return_type: Option<ReturnType>,
}

#[derive(Clone, Debug)]
pub struct BindContext {
    pub call_mode: CallMode,
    pub module: String,
    call_dimensionality: Option<usize>,
}

impl BindContext {
    pub fn new(call_mode: CallMode, module: impl ToString) -> Self {
        Self {
            call_mode,
            module: module.to_string(),
            call_dimensionality: None,
        }
    }

    pub fn call_dimensionality(&self) -> Result<usize, GenerationError> {
        self.call_dimensionality
            .ok_or(GenerationError::MissingCallDimensionality)
    }

    /// Can only be set once.
    pub fn set_call_dimensionality(&mut self, call_dimensionality: usize) -> Result<(), GenerationError> {
        if self.call_dimensionality.is_some() {
            return Err(GenerationError::CallDimensionalityAlreadySet);
        }
        self.call_dimensionality = Some(call_dimensionality);
        Ok(())
    }
}

/// Output of a successful pipeline run.
#[derive(Clone, Debug)]
pub struct Resolved {
    pub context: BindContext,
    pub function: KernelFunction,
    pub bindings: BoundCall,
    pub call_shape: Shape,
    pub source: String,
}

/// Runs all phases for a call of `function_name`.
pub fn resolve(
    reflection: &dyn Reflection,
    function_name: &str,
    mut call: HostCall,
    chain: &CallChain,
    options: &CallOptions,
) -> Result<Resolved, Error> {
    if chain.call_mode == CallMode::Forward {
        return Err(GenerationError::UnsupportedCallMode(chain.call_mode).into());
    }

    let mut context = BindContext::new(chain.call_mode, reflection.module_name());

    let overloads = reflection
        .overloads(function_name)?
        .into_iter()
        .enumerate()
        .map(|(index, desc)| KernelFunction::new(index, desc))
        .collect::<Vec<_>>();

    apply_explicit_vectorization(&mut call, chain, &overloads)?;
    let function = specialize(&call, &overloads)?;
    check_differentiability(&context, &function)?;
    inject_result(&mut call, &function, &context)?;

    let mut bindings = bind(&call, &function)?;
    apply_implicit_vectorization(&mut bindings)?;

    let call_dimensionality = calculate_call_dimensionality(&bindings);
    context.set_call_dimensionality(call_dimensionality)?;
    tracing::debug!(call_dimensionality, "calculated call dimensionality");

    create_return_value_binding(&context, &mut bindings, chain.return_type)?;
    finalize_mappings(&context, &mut bindings)?;
    let call_shape = calculate_call_shape(&context, &mut bindings)?;
    tracing::debug!(%call_shape, "calculated call shape");

    validate_specialize(&context, &bindings)?;
    calculate_differentiability(&context, &mut bindings);

    let source = generate_code(&context, &function, &bindings, options)?;

    Ok(Resolved {
        context,
        function,
        bindings,
        call_shape,
        source,
    })
}

/// Applies the mappings of the call chain to the host nodes and reduces
/// their types accordingly.
pub fn apply_explicit_vectorization(
    call: &mut HostCall,
    chain: &CallChain,
    overloads: &[KernelFunction],
) -> Result<(), Error> {
    for (index, mapping) in chain.positional_mappings.iter().enumerate() {
        let Some(mapping) = mapping
        else {
            continue;
        };
        let path = format!("_arg{index}");
        let node = call
            .args
            .get_mut(index)
            .ok_or_else(|| invalid_mapping(&path, mapping, "no such positional argument"))?;
        set_explicit_mapping(node, &path, mapping)?;
    }

    for (path, mapping) in &chain.named_mappings {
        let parts = path.split('.').collect::<Vec<_>>();
        let (root, rest) = parts
            .split_first()
            .ok_or_else(|| invalid_mapping(path, mapping, "empty path"))?;

        // parameter names resolve to positions if the argument was passed
        // positionally, which must be the same position in every overload
        let positions = overloads
            .iter()
            .filter_map(|function| function.parameter_index(root))
            .map(|index| (index < call.args.len()).then_some(index))
            .unique()
            .collect::<Vec<_>>();
        if positions.len() > 1 {
            return Err(invalid_mapping(
                path,
                mapping,
                "parameter position differs between overloads",
            )
            .into());
        }
        let position = positions.first().copied().flatten();

        let node = match position {
            Some(index) => call.args.get_mut(index),
            None => call.kwargs.iter_mut().find(|node| node.name == *root),
        };
        let node = node
            .and_then(|node| node.find_mut(rest))
            .ok_or_else(|| invalid_mapping(path, mapping, "no such argument"))?;
        set_explicit_mapping(node, path, mapping)?;
    }

    Ok(())
}

fn set_explicit_mapping(node: &mut HostNode, path: &str, mapping: &[usize]) -> Result<(), Error> {
    if node.value.is_composite() {
        return Err(invalid_mapping(path, mapping, "composite arguments are mapped per field").into());
    }

    node.vector_mapping = VectorMapping::explicit(path, mapping, node.value.shape().rank())?;
    node.vector_type = Some(node.value.reduce_type(path, mapping.len())?);

    Ok(())
}

fn invalid_mapping(path: &str, mapping: &[usize], reason: &str) -> InvalidMapping {
    InvalidMapping {
        path: path.to_owned(),
        mapping: mapping.to_vec(),
        reason: reason.to_owned(),
    }
}

/// Picks the first overload the call matches, collecting why every other
/// overload didn't.
pub fn specialize(call: &HostCall, overloads: &[KernelFunction]) -> Result<KernelFunction, OverloadMismatch> {
    let mut reasons = vec![];

    for function in overloads {
        match match_overload(call, function) {
            Ok(()) => {
                tracing::debug!(overload = function.overload, "selected {}", function.desc);
                return Ok(function.clone());
            }
            Err(reason) => {
                reasons.push(MismatchReason {
                    overload: function.overload,
                    reason,
                });
            }
        }
    }

    Err(OverloadMismatch {
        function: overloads
            .first()
            .map(|function| function.name().to_owned())
            .unwrap_or_default(),
        reasons,
        info: diagnostics::mismatch_info(call, overloads),
    })
}

/// Checks that the call covers every parameter exactly once and that each
/// argument fits its parameter.
pub fn match_overload(call: &HostCall, function: &KernelFunction) -> Result<(), String> {
    if call.args.len() > function.parameters.len() {
        return Err(format!(
            "too many positional arguments: {} given, {} expected",
            call.args.len(),
            function.parameters.len()
        ));
    }

    for node in &call.kwargs {
        if node.name == RESULT_NAME {
            let return_value = function
                .return_value
                .as_ref()
                .ok_or_else(|| format!("{RESULT_NAME} given, but the function returns void"))?;
            match_node(node, return_value)?;
            continue;
        }

        let index = function
            .parameter_index(&node.name)
            .ok_or_else(|| format!("no parameter named '{}'", node.name))?;
        if index < call.args.len() {
            return Err(format!(
                "'{}' given by position and by keyword",
                node.name
            ));
        }
    }

    for (index, parameter) in function.parameters.iter().enumerate() {
        let node = call
            .args
            .get(index)
            .or_else(|| call.kwarg(&parameter.name))
            .ok_or_else(|| format!("missing argument for '{}'", parameter.name))?;
        match_node(node, parameter)?;
    }

    Ok(())
}

fn match_node(host: &HostNode, kernel: &KernelNode) -> Result<(), String> {
    if let Some(children) = &host.children {
        if kernel.children.is_none() {
            return Err(format!(
                "'{}': a composite can't be passed as {}",
                kernel.name, kernel.primal
            ));
        }
        // field names are checked when binding, so that a mismatch is
        // reported with both field lists
        for child in children {
            if let Some(kernel_child) = kernel.child(&child.name) {
                match_node(child, kernel_child)?;
            }
        }
        return Ok(());
    }

    match &host.vector_type {
        Some(vector_type) if !vector_type.convertible_to(&kernel.primal) => {
            Err(format!(
                "'{}': mapped type {vector_type} is not convertible to {}",
                kernel.name, kernel.primal
            ))
        }
        Some(_) => Ok(()),
        None => {
            host.value
                .resolve_type(&kernel.name, &kernel.primal)
                .map(|_| ())
                .map_err(|e| e.to_string())
        }
    }
}

pub fn check_differentiability(context: &BindContext, function: &KernelFunction) -> Result<(), DifferentiabilityError> {
    if context.call_mode != CallMode::Primal && !function.differentiable() {
        return Err(DifferentiabilityError {
            function: function.name().to_owned(),
            mode: context.call_mode,
        });
    }
    Ok(())
}

/// Adds an output for the return value if the caller didn't pass one.
pub fn inject_result(
    call: &mut HostCall,
    function: &KernelFunction,
    context: &BindContext,
) -> Result<(), ResolutionError> {
    let Some(return_value) = &function.return_value
    else {
        return Ok(());
    };
    if call.kwarg(RESULT_NAME).is_some() {
        return Ok(());
    }

    if context.call_mode != CallMode::Primal {
        return Err(ResolutionError {
            path: RESULT_NAME.to_owned(),
            host: "nothing".to_owned(),
            kernel: return_value.primal.name(),
            reason: "the gradient of the return value must be passed as _result".to_owned(),
        });
    }

    call.kwargs
        .push(HostNode::new(RESULT_NAME, HostValue::Output));
    Ok(())
}

/// Pairs each kernel parameter with its argument.
pub fn bind(call: &HostCall, function: &KernelFunction) -> Result<BoundCall, GenerationError> {
    let unbound = |kernel: &KernelNode| {
        GenerationError::UnboundParameter {
            path: kernel.name.clone(),
        }
    };

    let parameters = function
        .parameters
        .iter()
        .enumerate()
        .map(|(index, kernel)| {
            let host = call
                .args
                .get(index)
                .or_else(|| call.kwarg(&kernel.name))
                .ok_or_else(|| unbound(kernel))?;
            BoundVariable::new(host, kernel, None)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let result = function
        .return_value
        .as_ref()
        .map(|kernel| {
            let host = call.kwarg(RESULT_NAME).ok_or_else(|| unbound(kernel))?;
            BoundVariable::new(host, kernel, None)
        })
        .transpose()?;

    Ok(BoundCall { parameters, result })
}

pub fn apply_implicit_vectorization(bindings: &mut BoundCall) -> Result<(), Error> {
    for variable in bindings.iter_mut() {
        variable.apply_implicit_vectorization()?;
    }
    Ok(())
}

/// The largest number of dimensions any argument needs.
pub fn calculate_call_dimensionality(bindings: &BoundCall) -> usize {
    bindings
        .nodes()
        .into_iter()
        .filter_map(|node| node.call_dimensionality)
        .max()
        .unwrap_or_default()
}

/// Turns outputs into concrete values now that the call dimensionality is
/// known: a value reference for 0-dimensional calls, a buffer otherwise.
pub fn create_return_value_binding(
    context: &BindContext,
    bindings: &mut BoundCall,
    return_type: Option<ReturnType>,
) -> Result<(), Error> {
    let call_dimensionality = context.call_dimensionality()?;

    for variable in bindings.iter_mut() {
        if variable.value != HostValue::Output {
            continue;
        }
        let vector_type = variable.vector_type()?.clone();

        variable.value = match (return_type, call_dimensionality) {
            (None | Some(ReturnType::ValueRef), 0) => HostValue::ValueRef(vector_type.clone()),
            (Some(ReturnType::ValueRef), _) => {
                return Err(ResolutionError {
                    path: variable.path.clone(),
                    host: "value reference".to_owned(),
                    kernel: vector_type.name(),
                    reason: format!("a {call_dimensionality}-dimensional call needs a buffer to return into"),
                }
                .into());
            }
            (None | Some(ReturnType::NdBuffer), _) => {
                HostValue::NdBuffer(NdBufferDesc::new(
                    vector_type.clone(),
                    Shape::unknown(call_dimensionality),
                ))
            }
        };
        variable.call_dimensionality = variable
            .value
            .resolve_dimensionality(&variable.path, &vector_type)?;
    }

    Ok(())
}

pub fn finalize_mappings(context: &BindContext, bindings: &mut BoundCall) -> Result<(), GenerationError> {
    let call_dimensionality = context.call_dimensionality()?;
    for variable in bindings.iter_mut() {
        variable.finalize_mappings(call_dimensionality)?;
    }
    Ok(())
}

/// Computes the call shape from the arguments' extents and allocates
/// outputs with it.
pub fn calculate_call_shape(context: &BindContext, bindings: &mut BoundCall) -> Result<Shape, Error> {
    let mut builder = CallShapeBuilder::new(context.call_dimensionality()?);

    for leaf in bindings.leaves() {
        let axes = leaf.vector_mapping.axes().ok_or_else(|| {
            GenerationError::UnresolvedMapping {
                path: leaf.path.clone(),
            }
        })?;
        builder.add(&leaf.path, &leaf.value.shape(), axes)?;
    }
    let call_shape = builder.build()?;

    for variable in bindings.iter_mut() {
        let Some(axes) = variable.vector_mapping.axes()
        else {
            continue;
        };
        if let HostValue::NdBuffer(buffer) = &mut variable.value {
            if !buffer.shape.is_concrete() && buffer.shape.rank() == axes.len() {
                buffer.shape = Shape::from_dims(axes.iter().map(|axis| call_shape.get(*axis)).collect());
            }
        }
    }

    Ok(call_shape)
}

/// Cross-checks the finished tree before any code is generated.
pub fn validate_specialize(context: &BindContext, bindings: &BoundCall) -> Result<(), Error> {
    let call_dimensionality = context.call_dimensionality()?;

    for node in bindings.nodes() {
        let vector_type = node.vector_type()?;
        let axes = node.vector_mapping.axes().ok_or_else(|| {
            GenerationError::UnresolvedMapping {
                path: node.path.clone(),
            }
        })?;

        let contribution = node.call_dimensionality.unwrap_or(call_dimensionality);
        let in_range = axes.iter().all(|axis| *axis < call_dimensionality)
            && axes.iter().all_unique()
            && axes.len() <= contribution
            && contribution <= call_dimensionality;
        if !in_range {
            return Err(GenerationError::MappingOutOfRange {
                path: node.path.clone(),
                mapping: axes.to_vec(),
                call_dimensionality,
            }
            .into());
        }

        if node.is_leaf() && !vector_type.convertible_to(&node.kernel.primal) {
            return Err(ResolutionError {
                path: node.path.clone(),
                host: node.value.to_string(),
                kernel: node.kernel.primal.name(),
                reason: format!("resolved type {vector_type} doesn't fit the parameter"),
            }
            .into());
        }
    }

    Ok(())
}

pub fn calculate_differentiability(context: &BindContext, bindings: &mut BoundCall) {
    for variable in bindings.iter_mut() {
        variable.calculate_differentiability(context.call_mode);
    }
}

/// Checks that every written value is writable, then emits the kernel.
pub fn generate_code(
    context: &BindContext,
    function: &KernelFunction,
    bindings: &BoundCall,
    options: &CallOptions,
) -> Result<String, Error> {
    for leaf in bindings.leaves() {
        for prim in PrimType::ALL {
            let writable = match prim {
                PrimType::Primal => leaf.value.is_writable(),
                // gradients live in their own storage
                PrimType::Derivative => leaf.value.is_differentiable(),
            };
            if leaf.access[prim].writes() && !writable {
                return Err(WritabilityError {
                    path: leaf.path.clone(),
                    kind: leaf.value.kind_name(),
                    access: leaf.access,
                }
                .into());
            }
        }
    }

    let mut cg = CodeGen::new(context.call_dimensionality()?, options.thread_group_size);
    cg.add_import(&context.module);
    bindings.gen_call_data_code(&mut cg)?;
    bindings.gen_trampoline(&mut cg, function, context.call_mode)?;
    bindings.gen_kernel_body(&mut cg, context.call_mode)?;

    Ok(cg.finish()?)
}
