use dimcheck_core::{is_compatible, DimValue, DimensionBinding, ShapePattern, ShapeToken};
use proptest::prelude::*;

macro_rules! match_test {
    ($spec:expr, [$($dim:expr),*], $expected:expr, $name:ident) => {
        #[test]
        fn $name() {
            let pattern: ShapePattern = $spec.parse().unwrap();
            let shape: Vec<usize> = vec![$($dim, )*];
            assert_eq!(
                is_compatible(&shape, &pattern, &mut DimensionBinding::new()),
                $expected
            );
        }
    };
}

match_test!("3, 4", [3, 4], true, exact);
match_test!("3, 4", [4, 3], false, swapped);
match_test!("3, -1", [3, 100], true, wildcard);
match_test!("N, N", [5, 5], true, repeated_name);
match_test!("N, N", [5, 6], false, repeated_name_differs);
match_test!("3,A,A,N", [3, 5, 5, 7], true, mixed_names);
match_test!("3,A,A,N", [3, 6, 5, 7], false, mixed_names_differ);
match_test!("n..., 1, 1", [1, 2, 3, 1, 1], true, leading_span);
match_test!("n..., 1, 1", [1, 1], true, empty_leading_span);
match_test!("...", [], true, variadic_empty);
match_test!("...", [9, 8, 7], true, variadic_any);
match_test!("N, ...", [], false, not_enough_dimensions);
match_test!("()", [], true, scalar_empty);
match_test!("()", [1], false, scalar_non_empty);

#[test]
fn variadic_span_shared_between_arguments() {
    let first: ShapePattern = "batch, variadic...".parse().unwrap();
    let second: ShapePattern = "variadic...".parse().unwrap();

    let mut bindings = DimensionBinding::new();
    assert!(is_compatible(&[7, 1, 2], &first, &mut bindings));
    assert!(is_compatible(&[1, 2], &second, &mut bindings));
    assert_eq!(bindings.get("batch"), Some(&DimValue::Scalar(7)));
    assert_eq!(bindings.get("variadic..."), Some(&DimValue::Span(vec![1, 2])));

    let mut bindings = DimensionBinding::new();
    assert!(is_compatible(&[6, 2], &first, &mut bindings));
    assert!(!is_compatible(&[1, 1], &second, &mut bindings));
}

#[test]
fn rebound_span_must_agree() {
    let pattern: ShapePattern = "n..., 1, 1".parse().unwrap();
    let mut bindings = DimensionBinding::new();
    assert!(is_compatible(&[1, 2, 3, 1, 1], &pattern, &mut bindings));
    let other: ShapePattern = "n...".parse().unwrap();
    assert!(!is_compatible(&[1, 2], &other, &mut bindings));
    assert!(!is_compatible(&[1, 2, 3, 4], &other, &mut bindings));
    assert!(is_compatible(&[1, 2, 3], &other, &mut bindings));
}

fn fixed_pattern() -> impl Strategy<Value = (Vec<usize>, Vec<i64>)> {
    prop::collection::vec((0usize..6, -1i64..6), 0..6).prop_map(|pairs| pairs.into_iter().unzip())
}

proptest! {
    #[test]
    fn fixed_patterns_compare_pointwise(
        (shape, dims) in fixed_pattern(),
        extra in prop::collection::vec(0usize..6, 0..3),
    ) {
        let tokens = dims.iter().map(|&d| ShapeToken::Fixed(d)).collect();
        let pattern = ShapePattern::from_tokens(tokens).unwrap();
        let expected = dims.iter().zip(&shape).all(|(&d, &s)| d == -1 || d == s as i64);
        prop_assert_eq!(is_compatible(&shape, &pattern, &mut DimensionBinding::new()), expected);

        // A different length never matches.
        let mut longer = shape.clone();
        longer.extend(extra.iter().copied());
        if !extra.is_empty() {
            prop_assert!(!is_compatible(&longer, &pattern, &mut DimensionBinding::new()));
        }
    }

    #[test]
    fn names_are_consistent(shape in prop::collection::vec(0usize..8, 1..6)) {
        let pattern = ShapePattern::from_tokens(
            (0..shape.len()).map(|i| ShapeToken::Named(format!("d{i}"))).collect(),
        ).unwrap();
        let mut bindings = DimensionBinding::new();
        prop_assert!(is_compatible(&shape, &pattern, &mut bindings));
        prop_assert!(is_compatible(&shape, &pattern, &mut bindings));
        let mut shifted = shape.clone();
        shifted[0] += 1;
        prop_assert!(!is_compatible(&shifted, &pattern, &mut bindings));
    }

    #[test]
    fn anonymous_variadic_accepts_everything(shape in prop::collection::vec(0usize..8, 0..8)) {
        let pattern: ShapePattern = "...".parse().unwrap();
        prop_assert!(is_compatible(&shape, &pattern, &mut DimensionBinding::new()));
    }
}
