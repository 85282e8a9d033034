//! Calls into shader kernels with host arguments.
//!
//! A call is resolved by pairing every host argument with the kernel
//! parameter it's passed to, inferring how the arguments broadcast against
//! each other and generating the kernel code that loads and stores them.
//! Resolved calls are cached by a signature of the argument kinds.

pub mod access;
pub mod binding;
pub mod cache;
pub mod call;
pub mod codegen;
pub mod compile;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod function;
pub mod host;
pub mod pipeline;
pub mod reflection;
pub mod shape;
pub mod signature;

pub use crate::{
    access::{
        AccessPair,
        AccessType,
        CallMode,
        IOType,
        PrimType,
    },
    binding::{
        BoundCall,
        BoundVariable,
        LocalDim,
    },
    cache::CallCache,
    call::CallData,
    compile::{
        Compiler,
        SourceCompiler,
    },
    config::CallOptions,
    error::Error,
    function::Function,
    host::{
        HostValue,
        NdBufferDesc,
        StructuredBufferDesc,
        WangHashArg,
    },
    pipeline::ReturnType,
    reflection::{
        FunctionDesc,
        KernelType,
        ModuleReflection,
        Reflection,
        ScalarType,
    },
    shape::{
        Shape,
        VectorMapping,
    },
    signature::HostCall,
};
