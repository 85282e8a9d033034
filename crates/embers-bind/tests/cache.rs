#![allow(dead_code)]

mod common;

use std::sync::{
    atomic::{
        AtomicUsize,
        Ordering,
    },
    Arc,
};

use common::{
    args,
    float_buffer,
    grad_buffer,
    module,
};
use embers_bind::{
    compile::{
        BoxError,
        KernelSource,
    },
    error::Error,
    CallCache,
    CallOptions,
    Compiler,
    Function,
    HostValue,
    KernelType,
    NdBufferDesc,
    SourceCompiler,
};
use pretty_assertions::assert_eq;

/// Counts how often it's asked to compile.
#[derive(Debug, Default)]
struct CountingCompiler {
    compiled: AtomicUsize,
}

impl Compiler for CountingCompiler {
    type Kernel = usize;

    fn compile(&self, _module: &str, _entry_point: &str, _source: &str) -> Result<usize, BoxError> {
        Ok(self.compiled.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct FailingCompiler;

impl Compiler for FailingCompiler {
    type Kernel = ();

    fn compile(&self, _module: &str, _entry_point: &str, _source: &str) -> Result<(), BoxError> {
        Err("syntax error".into())
    }
}

#[test]
fn signatures_include_buffer_shapes() {
    let mul = Function::new(module(), "mul");

    let small = mul.signature(&args([float_buffer([4]), float_buffer([4])]));
    assert_eq!(small, "[test_module::mul].([ndbuffer:float,(4),w],[ndbuffer:float,(4),w])");

    let large = mul.signature(&args([float_buffer([1000]), float_buffer([1000])]));
    assert_ne!(small, large);

    let matrix = mul.signature(&args([float_buffer([4, 4]), float_buffer([4])]));
    assert_ne!(small, matrix);

    let read_only = mul.signature(&args([
        HostValue::nd_buffer(NdBufferDesc::new(KernelType::float(), [4]).read_only()),
        float_buffer([4]),
    ]));
    assert_ne!(small, read_only);

    let scalar = mul.signature(&args([
        float_buffer([4]),
        HostValue::scalar(KernelType::float()),
    ]));
    assert_eq!(scalar, "[test_module::mul].([ndbuffer:float,(4),w],[scalar:float])");
}

#[test]
fn signatures_include_the_call_chain() {
    let mul = Function::new(module(), "mul");
    let call = args([grad_buffer([4]), float_buffer([4])]);

    assert_eq!(
        mul.bwds_diff().signature(&call),
        "[test_module::mul].bwds.([ndbuffer:float,(4),wg],[ndbuffer:float,(4),w])"
    );
    assert_eq!(
        mul.transform_input([("a", [0])]).signature(&call),
        "[test_module::mul].transform(a=(0)).([ndbuffer:float,(4),wg],[ndbuffer:float,(4),w])"
    );
    assert_eq!(
        mul.map([None, Some(vec![0])], Vec::<(String, Vec<usize>)>::new())
            .signature(&call),
        "[test_module::mul].map(_,(0)).([ndbuffer:float,(4),wg],[ndbuffer:float,(4),w])"
    );
}

#[tokio::test]
async fn calls_with_the_same_signature_share_call_data() {
    let cache = CallCache::new();
    let compiler = CountingCompiler::default();
    let mul = Function::new(module(), "mul");
    let options = CallOptions::default();

    let first = cache
        .get_or_resolve(&mul, &compiler, args([float_buffer([4]), float_buffer([4])]), &options)
        .await
        .unwrap();
    let second = cache
        .get_or_resolve(&mul, &compiler, args([float_buffer([4]), float_buffer([4])]), &options)
        .await
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.resolutions(), 1);
    assert_eq!(compiler.compiled.load(Ordering::Relaxed), 1);
    assert_eq!(cache.len().await, 1);
    assert_eq!(first.call_shape.to_string(), "(4)");

    let longer = cache
        .get_or_resolve(&mul, &compiler, args([float_buffer([16]), float_buffer([16])]), &options)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &longer));
    assert_eq!(longer.call_shape.to_string(), "(16)");

    let other = cache
        .get_or_resolve(&mul, &compiler, args([float_buffer([4, 4]), float_buffer([4])]), &options)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
    assert_eq!(cache.resolutions(), 3);
    assert_eq!(cache.len().await, 3);
}

#[tokio::test]
async fn cached_calls_keep_the_overload_their_extents_select() {
    let cache = CallCache::new();
    let add = Function::new(module(), "add");
    let options = CallOptions::default();

    // a trailing extent of 3 is a float3
    let vectors = cache
        .get_or_resolve(&add, &SourceCompiler, args([float_buffer([3]), float_buffer([3])]), &options)
        .await
        .unwrap();
    assert_eq!(vectors.function.overload, 0);
    assert_eq!(vectors.call_dimensionality, 0);

    let scalars = cache
        .get_or_resolve(&add, &SourceCompiler, args([float_buffer([5]), float_buffer([5])]), &options)
        .await
        .unwrap();
    assert!(!Arc::ptr_eq(&vectors, &scalars));
    assert_eq!(scalars.function.overload, 1);
    assert_eq!(scalars.call_dimensionality, 1);
    assert_eq!(scalars.call_shape.to_string(), "(5)");
    assert_eq!(cache.resolutions(), 2);
}

#[tokio::test]
async fn thread_group_size_is_part_of_the_key() {
    let cache = CallCache::new();
    let mul = Function::new(module(), "mul");
    let call = || args([float_buffer([4]), float_buffer([4])]);

    let default = cache
        .get_or_resolve(&mul, &SourceCompiler, call(), &CallOptions::default())
        .await
        .unwrap();
    let wide_options = CallOptions {
        thread_group_size: 64,
        ..CallOptions::default()
    };
    let wide = cache
        .get_or_resolve(&mul, &SourceCompiler, call(), &wide_options)
        .await
        .unwrap();

    assert!(!Arc::ptr_eq(&default, &wide));
    assert!(default.source.contains("[numthreads(32, 1, 1)]"));
    assert!(wide.source.contains("[numthreads(64, 1, 1)]"));
    assert_eq!(cache.resolutions(), 2);

    let again = cache
        .get_or_resolve(&mul, &SourceCompiler, call(), &wide_options)
        .await
        .unwrap();
    assert!(Arc::ptr_eq(&wide, &again));
    assert_eq!(cache.resolutions(), 2);
}

#[tokio::test]
async fn concurrent_calls_resolve_once() {
    let cache = CallCache::new();
    let mul = Function::new(module(), "mul");
    let options = CallOptions::default();

    let (a, b) = tokio::join!(
        cache.get_or_resolve(&mul, &SourceCompiler, args([float_buffer([4]), float_buffer([4])]), &options),
        cache.get_or_resolve(&mul, &SourceCompiler, args([float_buffer([4]), float_buffer([4])]), &options),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(cache.resolutions(), 1);

    let kernel: &KernelSource = &a.kernel;
    assert_eq!(kernel.module, "test_module");
    assert_eq!(kernel.entry_point, "main");
    assert_eq!(kernel.source, a.source);
}

#[tokio::test]
async fn disabled_cache_resolves_every_call() {
    let cache = CallCache::new();
    let mul = Function::new(module(), "mul");
    let options = CallOptions::default().without_cache();

    for _ in 0..2 {
        cache
            .get_or_resolve(&mul, &SourceCompiler, args([float_buffer([4]), float_buffer([4])]), &options)
            .await
            .unwrap();
    }

    assert_eq!(cache.resolutions(), 2);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn failed_resolutions_are_not_cached() {
    let cache = CallCache::new();
    let mul = Function::new(module(), "mul");
    let options = CallOptions::default();
    let call = || args([float_buffer([4]), float_buffer([5])]);

    for _ in 0..2 {
        let error = cache
            .get_or_resolve(&mul, &SourceCompiler, call(), &options)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::ShapeMismatch(_)));
    }

    assert_eq!(cache.resolutions(), 2);
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn compile_errors_name_the_function() {
    let cache = CallCache::new();
    let mul = Function::new(module(), "mul");

    let error = cache
        .get_or_resolve(
            &mul,
            &FailingCompiler,
            args([float_buffer([4]), float_buffer([4])]),
            &CallOptions::default(),
        )
        .await
        .unwrap_err();

    let Error::DownstreamCompile(error) = error
    else {
        panic!("expected a compile error, got {error:?}");
    };
    assert_eq!(error.function, "mul");
    assert_eq!(error.source.to_string(), "syntax error");
    assert!(cache.is_empty().await);
}

#[test]
fn blocking_lookups_share_the_cache() {
    let cache = CallCache::new();
    let add = Function::new(module(), "add");
    let options = CallOptions::default();

    let first = cache
        .get_or_resolve_blocking(&add, &SourceCompiler, args([float_buffer([2]), float_buffer([2])]), &options)
        .unwrap();
    let second = cache
        .get_or_resolve_blocking(&add, &SourceCompiler, args([float_buffer([2]), float_buffer([2])]), &options)
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.resolutions(), 1);
    assert_eq!(first.function.overload, 1);
}
