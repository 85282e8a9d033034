use std::sync::OnceLock;

use embers_bind::{
    access::IOType,
    FunctionDesc,
    HostCall,
    HostValue,
    KernelType,
    ModuleReflection,
    NdBufferDesc,
    ScalarType,
};

static MODULE: OnceLock<ModuleReflection> = OnceLock::new();

/// Reflection of the kernel module the tests call into.
pub fn module() -> &'static ModuleReflection {
    MODULE.get_or_init(|| {
        let mut module = ModuleReflection::new("test_module");

        let particle = KernelType::structure(
            "Particle",
            [
                ("position", KernelType::float_vector(3)),
                ("velocity", KernelType::float_vector(3)),
            ],
            true,
        );

        let float = KernelType::float;
        let float3 = || KernelType::float_vector(3);

        module
            // the more specific overload goes first, a float3 buffer would
            // also match the scalar one
            .add_function(
                FunctionDesc::new("add", float3())
                    .differentiable()
                    .param("a", float3())
                    .param("b", float3()),
            )
            .add_function(
                FunctionDesc::new("add", float())
                    .differentiable()
                    .param("a", float())
                    .param("b", float()),
            )
            .add_function(
                FunctionDesc::new("mul", float())
                    .differentiable()
                    .param("a", float())
                    .param("b", float()),
            )
            .add_function(FunctionDesc::new("floor", KernelType::int()).param("x", float()))
            .add_function(FunctionDesc::new("fill", KernelType::Void).out_param("value", float()))
            .add_function(
                FunctionDesc::new("scale", KernelType::Void)
                    .differentiable()
                    .inout_param("value", float())
                    .param_with("factor", float(), IOType::In, true),
            )
            .add_function(
                FunctionDesc::new("integrate", particle.clone())
                    .differentiable()
                    .param("particle", particle)
                    .param("dt", float()),
            )
            .add_function(
                FunctionDesc::new("length", float())
                    .differentiable()
                    .param("v", float3()),
            )
            .add_function(
                FunctionDesc::new("sum", KernelType::uint())
                    .param("data", KernelType::structured_buffer(KernelType::uint(), false)),
            )
            .add_function(
                FunctionDesc::new("random", KernelType::float())
                    .param("seed", KernelType::vector(ScalarType::UInt32, 2)),
            )
            // same parameter names, different positions
            .add_function(
                FunctionDesc::new("blend", float3())
                    .param("value", float3())
                    .param("weight", float()),
            )
            .add_function(
                FunctionDesc::new("blend", float3())
                    .param("weight", float())
                    .param("value", float3()),
            );

        module
    })
}

pub fn float_buffer(shape: impl Into<embers_bind::Shape>) -> HostValue {
    HostValue::nd_buffer(NdBufferDesc::new(KernelType::float(), shape))
}

pub fn grad_buffer(shape: impl Into<embers_bind::Shape>) -> HostValue {
    HostValue::nd_buffer(NdBufferDesc::new(KernelType::float(), shape).with_grad())
}

pub fn float3_buffer(shape: impl Into<embers_bind::Shape>) -> HostValue {
    HostValue::nd_buffer(NdBufferDesc::new(KernelType::float_vector(3), shape))
}

pub fn float3_grad_buffer(shape: impl Into<embers_bind::Shape>) -> HostValue {
    HostValue::nd_buffer(NdBufferDesc::new(KernelType::float_vector(3), shape).with_grad())
}

pub fn args(args: impl IntoIterator<Item = HostValue>) -> HostCall {
    HostCall::new(args, Vec::<(String, HostValue)>::new())
}

pub fn kwargs(kwargs: impl IntoIterator<Item = (&'static str, HostValue)>) -> HostCall {
    HostCall::new([], kwargs)
}

/// Row-major data of a buffer with `shape`, each element distinct.
pub fn iota(shape: &[usize]) -> Vec<f32> {
    (0..shape.iter().product::<usize>())
        .map(|i| i as f32 * 1.5 + 1.)
        .collect()
}

/// Element of row-major data at a multi-dimensional index.
pub fn at(data: &[f32], shape: &[usize], index: &[usize]) -> f32 {
    let flat = index
        .iter()
        .zip(shape)
        .fold(0, |flat, (i, extent)| flat * extent + i);
    data[flat]
}
