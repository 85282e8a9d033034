use embers_bind::{
    error::CallShapeError,
    shape::CallShapeBuilder,
    Shape,
    VectorMapping,
};
use pretty_assertions::assert_eq;

#[test]
fn default_mapping_is_right_aligned() {
    for call_dimensionality in 0..6 {
        for dims in 0..=call_dimensionality {
            let mapping = VectorMapping::right_aligned(call_dimensionality, dims);
            let expected = (call_dimensionality - dims..call_dimensionality).collect::<Vec<_>>();
            assert_eq!(mapping.axes(), Some(expected.as_slice()));
            assert_eq!(mapping.len(), dims);
        }
    }
}

#[test]
fn unset_mapping_is_invalid() {
    let mapping = VectorMapping::unset();
    assert!(!mapping.is_valid());
    assert_eq!(mapping.call_dimensionality(), None);
    assert_eq!(mapping.to_string(), "(unset)");
}

#[test]
fn explicit_mapping_needs_call_dimensions_up_to_its_largest_axis() {
    let mapping = VectorMapping::explicit("a", [2, 0], 2).unwrap();
    assert_eq!(mapping.call_dimensionality(), Some(3));
    assert_eq!(mapping.apply(&[4, 5, 6]), Some(vec![6, 4]));

    let empty = VectorMapping::explicit("a", Vec::new(), 2).unwrap();
    assert_eq!(empty.call_dimensionality(), Some(0));
}

#[test]
fn explicit_mapping_rejects_duplicate_axes() {
    let error = VectorMapping::explicit("a", [1, 1], 2).unwrap_err();
    assert_eq!(error.path, "a");
    assert_eq!(error.mapping, vec![1, 1]);
}

#[test]
fn explicit_mapping_cant_be_longer_than_the_argument() {
    let error = VectorMapping::explicit("a.x", [0, 1, 2], 2).unwrap_err();
    assert_eq!(error.path, "a.x");
}

#[test]
fn call_shape_broadcasts_extent_one() {
    let mut builder = CallShapeBuilder::new(2);
    builder.add("a", &Shape::new([4, 1]), &[0, 1]).unwrap();
    builder.add("b", &Shape::new([1, 3]), &[0, 1]).unwrap();
    assert_eq!(builder.build().unwrap(), Shape::new([4, 3]));
}

#[test]
fn call_shape_skips_unknown_extents() {
    let mut builder = CallShapeBuilder::new(2);
    builder.add("_result", &Shape::unknown(2), &[0, 1]).unwrap();
    builder.add("b", &Shape::new([3]), &[1]).unwrap();
    builder.add("a", &Shape::new([5]), &[0]).unwrap();
    assert_eq!(builder.build().unwrap(), Shape::new([5, 3]));
}

#[test]
fn call_shape_rejects_conflicting_extents() {
    let mut builder = CallShapeBuilder::new(1);
    builder.add("a", &Shape::new([4]), &[0]).unwrap();
    let error = builder.add("b", &Shape::new([3]), &[0]).unwrap_err();
    assert!(matches!(
        error,
        CallShapeError::Mismatch {
            axis: 0,
            extent: 3,
            expected: 4,
            ..
        }
    ));
}

#[test]
fn call_shape_needs_every_axis() {
    let mut builder = CallShapeBuilder::new(2);
    builder.add("a", &Shape::new([4]), &[1]).unwrap();
    assert!(matches!(
        builder.build(),
        Err(CallShapeError::Unresolved { axis: 0 })
    ));
}

#[test]
fn shapes_display_unknown_extents() {
    let shape = Shape::from_dims(vec![Some(2), None]);
    assert_eq!(shape.to_string(), "(2,?)");
    assert!(!shape.is_concrete());
    assert_eq!(Shape::new([2, 3, 4]).tail(2), Shape::new([3, 4]));
}
