#![allow(dead_code)]

mod common;

use common::{
    args,
    at,
    float3_buffer,
    float_buffer,
    iota,
    module,
};
use embers_bind::{
    CallOptions,
    Function,
    HostValue,
    KernelType,
    LocalDim,
    ReturnType,
    Shape,
};
use pretty_assertions::assert_eq;

fn call_ids(call_shape: &[usize]) -> Vec<Vec<usize>> {
    call_shape
        .iter()
        .fold(vec![vec![]], |ids, &extent| {
            ids.into_iter()
                .flat_map(|id| {
                    (0..extent).map(move |i| {
                        let mut id = id.clone();
                        id.push(i);
                        id
                    })
                })
                .collect()
        })
}

#[test]
fn transposed_inputs_add_pointwise() {
    let add = Function::new(module(), "add").transform_input([("a", [1, 0]), ("b", [0, 1])]);

    let resolved = add
        .resolve(
            args([float_buffer([2, 3]), float_buffer([3, 2])]),
            &CallOptions::default(),
        )
        .unwrap();

    assert_eq!(resolved.context.call_dimensionality().unwrap(), 2);
    assert_eq!(resolved.call_shape, Shape::new([3, 2]));

    let a_data = iota(&[2, 3]);
    let b_data = iota(&[3, 2]);
    let a = resolved.bindings.find("a").unwrap();
    let b = resolved.bindings.find("b").unwrap();
    let result = resolved.bindings.find("_result").unwrap();

    for call_id in call_ids(&[3, 2]) {
        let (i, j) = (call_id[0], call_id[1]);
        let sum = at(&a_data, &[2, 3], &a.local_index(&call_id).unwrap())
            + at(&b_data, &[3, 2], &b.local_index(&call_id).unwrap());

        // a is read transposed, b as is
        let expected = at(&a_data, &[2, 3], &[j, i]) + at(&b_data, &[3, 2], &[i, j]);
        assert_eq!(sum, expected);

        assert_eq!(result.local_index(&call_id).unwrap(), call_id);
    }
}

#[test]
fn result_is_allocated_over_the_call_shape() {
    let add = Function::new(module(), "add").transform_input([("a", [1, 0])]);

    let resolved = add
        .resolve(
            args([float_buffer([2, 3]), float_buffer([3, 2])]),
            &CallOptions::default(),
        )
        .unwrap();

    let result = resolved.bindings.find("_result").unwrap();
    assert_eq!(
        result.value,
        HostValue::nd_buffer(embers_bind::NdBufferDesc::new(
            KernelType::float(),
            [3, 2]
        ))
    );
}

#[test]
fn lower_rank_arguments_align_to_trailing_axes() {
    let resolved = Function::new(module(), "mul")
        .resolve(
            args([float_buffer([4, 3]), float_buffer([3])]),
            &CallOptions::default(),
        )
        .unwrap();

    assert_eq!(resolved.call_shape, Shape::new([4, 3]));
    let b = resolved.bindings.find("b").unwrap();
    assert_eq!(b.vector_mapping.axes(), Some([1].as_slice()));
    assert_eq!(b.local_index(&[2, 1]), Some(vec![1]));
}

#[test]
fn extent_one_dimensions_broadcast() {
    let resolved = Function::new(module(), "mul")
        .resolve(
            args([float_buffer([4, 1]), float_buffer([1, 3])]),
            &CallOptions::default(),
        )
        .unwrap();

    assert_eq!(resolved.call_shape, Shape::new([4, 3]));
    let a = resolved.bindings.find("a").unwrap();
    let b = resolved.bindings.find("b").unwrap();
    assert_eq!(a.local_dims(), Some(vec![LocalDim::Axis(0), LocalDim::Broadcast]));
    assert_eq!(b.local_dims(), Some(vec![LocalDim::Broadcast, LocalDim::Axis(1)]));
    assert_eq!(a.local_index(&[2, 2]), Some(vec![2, 0]));
    assert_eq!(b.local_index(&[2, 2]), Some(vec![0, 2]));

    // the accessors read the extent 1 dimensions at index 0
    assert!(resolved.source.contains("int _idx[2] = { context.call_id[0], 0 };"));
    assert!(resolved.source.contains("int _idx[2] = { 0, context.call_id[1] };"));
    assert!(resolved.source.contains("int _idx[2] = { context.call_id[0], context.call_id[1] };"));
}

#[test]
fn scalars_make_a_zero_dimensional_call() {
    let resolved = Function::new(module(), "add")
        .resolve(
            args([
                HostValue::scalar(KernelType::float()),
                HostValue::scalar(KernelType::float()),
            ]),
            &CallOptions::default(),
        )
        .unwrap();

    assert_eq!(resolved.context.call_dimensionality().unwrap(), 0);
    assert_eq!(resolved.call_shape, Shape::scalar());
    let result = resolved.bindings.find("_result").unwrap();
    assert_eq!(result.value, HostValue::value_ref(KernelType::float()));
}

#[test]
fn vector_buffers_select_the_vector_overload() {
    let resolved = Function::new(module(), "add")
        .resolve(
            args([float3_buffer([8]), float3_buffer([8])]),
            &CallOptions::default(),
        )
        .unwrap();

    assert_eq!(resolved.function.overload, 0);
    assert_eq!(resolved.call_shape, Shape::new([8]));
    let a = resolved.bindings.find("a").unwrap();
    assert_eq!(a.vector_type, Some(KernelType::float_vector(3)));
}

#[test]
fn scalar_buffers_fall_through_to_the_scalar_overload() {
    let resolved = Function::new(module(), "add")
        .resolve(
            args([float_buffer([8]), float_buffer([8])]),
            &CallOptions::default(),
        )
        .unwrap();

    assert_eq!(resolved.function.overload, 1);
}

#[test]
fn forced_buffer_result_for_scalar_calls() {
    let resolved = Function::new(module(), "mul")
        .return_type(ReturnType::NdBuffer)
        .resolve(
            args([
                HostValue::scalar(KernelType::float()),
                HostValue::scalar(KernelType::float()),
            ]),
            &CallOptions::default(),
        )
        .unwrap();

    let result = resolved.bindings.find("_result").unwrap();
    assert!(matches!(result.value, HostValue::NdBuffer(_)));
}

#[test]
fn finalized_mappings_fit_the_call() {
    let add = Function::new(module(), "add").transform_input([("b", [1])]);

    let resolved = add
        .resolve(
            args([float_buffer([5, 2]), float_buffer([2])]),
            &CallOptions::default(),
        )
        .unwrap();
    let call_dimensionality = resolved.context.call_dimensionality().unwrap();

    for leaf in resolved.bindings.leaves() {
        let axes = leaf.vector_mapping.axes().unwrap();
        let contribution = leaf.call_dimensionality.unwrap();
        assert!(axes.len() <= contribution);
        assert!(axes.iter().all(|axis| *axis < call_dimensionality));

        // default mappings always cover exactly what the node needs
        if leaf.path != "b" {
            assert_eq!(axes.len(), contribution);
        }
    }
}

#[test]
fn wang_hash_follows_the_call_shape() {
    let random = Function::new(module(), "random");
    let resolved = random
        .resolve(
            args([HostValue::WangHash(embers_bind::WangHashArg::new(2, 42))]),
            &CallOptions::default(),
        )
        .unwrap();

    // nothing determines a call dimension, so the call has none
    assert_eq!(resolved.call_shape, Shape::scalar());
    assert!(resolved.source.contains("_wang_hash(hash ^ uint(context.call_id[i]))"));
}
