//! Matching of observed shapes against [`ShapePattern`]s.
//!
//! Named dimensions behave like unification variables: the first occurrence
//! of a name binds it, every later occurrence (in the same pattern, in another
//! argument, or in a callee sharing the scope) is a constraint on the value.

use log::trace;

use crate::{
    binding::{DimValue, DimensionBinding},
    pattern::{ShapePattern, ShapeToken, ELLIPSIS},
};

/// Number of dimensions a non-variadic token consumes.
fn width(token: &ShapeToken) -> usize {
    match token {
        ShapeToken::Literal(dims) => dims.len(),
        ShapeToken::Variadic | ShapeToken::NamedVariadic(_) => 0,
        ShapeToken::Fixed(_) | ShapeToken::Named(_) => 1,
    }
}

/// Check `actual` against `pattern`, binding names in `bindings` as they are
/// met.
///
/// Bindings made before a mismatch is found are left in place: a failed
/// match may still have updated `bindings`.
pub fn is_compatible(
    actual: &[usize],
    pattern: &ShapePattern,
    bindings: &mut DimensionBinding,
) -> bool {
    let tokens = pattern.tokens();
    let has_variadic = pattern.has_variadic();
    let fixed_width: usize = tokens.iter().map(width).sum();

    if !has_variadic && actual.len() != fixed_width {
        return false;
    }
    if actual.len() < fixed_width {
        return false;
    }
    // Whatever the fixed tokens leave over belongs to the variadic span.
    let span = actual.len() - fixed_width;

    let mut s = 0;
    for token in tokens {
        match token {
            ShapeToken::Fixed(expected) => {
                let Some(&dim) = actual.get(s) else {
                    return false;
                };
                if *expected != -1 && usize::try_from(*expected).ok() != Some(dim) {
                    return false;
                }
                s += 1;
            }
            ShapeToken::Named(name) => {
                let Some(&dim) = actual.get(s) else {
                    return false;
                };
                match bindings.get(name) {
                    Some(DimValue::Scalar(bound)) => {
                        if *bound != dim {
                            return false;
                        }
                    }
                    Some(DimValue::Span(_)) => {
                        trace!("dimension {name} is bound to a span, not a scalar");
                        return false;
                    }
                    None => {
                        trace!("binding {name} = {dim}");
                        bindings.insert(name.clone(), dim);
                    }
                }
                s += 1;
            }
            ShapeToken::Literal(dims) => {
                if actual.get(s..s + dims.len()) != Some(dims.as_slice()) {
                    return false;
                }
                s += dims.len();
            }
            ShapeToken::Variadic => {
                s += span;
            }
            ShapeToken::NamedVariadic(name) => {
                let Some(consumed) = actual.get(s..s + span) else {
                    return false;
                };
                let key = format!("{name}{ELLIPSIS}");
                match bindings.get(&key) {
                    Some(DimValue::Span(bound)) => {
                        if bound.as_slice() != consumed {
                            return false;
                        }
                    }
                    Some(DimValue::Scalar(_)) => {
                        trace!("dimension {key} is bound to a scalar, not a span");
                        return false;
                    }
                    None => {
                        trace!("binding {key} = {consumed:?}");
                        bindings.insert(key, consumed);
                    }
                }
                s += span;
            }
        }
    }

    s == actual.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(actual: &[usize], spec: &str) -> bool {
        is_compatible(actual, &spec.parse().unwrap(), &mut DimensionBinding::new())
    }

    #[test]
    fn fixed_and_wildcard() {
        assert!(matches(&[3, 4], "3, 4"));
        assert!(matches(&[3, 4], "-1, 4"));
        assert!(!matches(&[3, 4], "3, 5"));
        assert!(!matches(&[3, 4], "3"));
        assert!(!matches(&[3], "3, -1"));
    }

    #[test]
    fn repeated_names_unify() {
        assert!(matches(&[5, 5], "N, N"));
        assert!(!matches(&[5, 6], "N, N"));
    }

    #[test]
    fn named_scenario() {
        let pattern: ShapePattern = "3,A,A,N".parse().unwrap();
        let mut bindings = DimensionBinding::new();
        assert!(is_compatible(&[3, 5, 5, 7], &pattern, &mut bindings));
        assert_eq!(bindings.get("A"), Some(&DimValue::Scalar(5)));
        assert_eq!(bindings.get("N"), Some(&DimValue::Scalar(7)));

        let mut bindings = DimensionBinding::new();
        assert!(!is_compatible(&[3, 6, 5, 7], &pattern, &mut bindings));
    }

    #[test]
    fn failed_match_keeps_partial_bindings() {
        let pattern: ShapePattern = "A, B, 9".parse().unwrap();
        let mut bindings = DimensionBinding::new();
        assert!(!is_compatible(&[1, 2, 3], &pattern, &mut bindings));
        assert_eq!(bindings.get("A"), Some(&DimValue::Scalar(1)));
        assert_eq!(bindings.get("B"), Some(&DimValue::Scalar(2)));
    }

    #[test]
    fn anonymous_variadic_matches_anything() {
        let shapes: [&[usize]; 3] = [&[], &[1], &[1, 2, 3, 4]];
        for shape in shapes {
            assert!(matches(shape, "..."));
        }
    }

    #[test]
    fn variadic_positions() {
        assert!(matches(&[1, 2, 3, 1, 1], "n..., 1, 1"));
        assert!(matches(&[1, 1], "n..., 1, 1"));
        assert!(!matches(&[1], "n..., 1, 1"));
        assert!(matches(&[2, 7, 7, 3], "2, ..., 3"));
        assert!(matches(&[2, 3], "2, ..., 3"));
        assert!(matches(&[4, 5, 6], "4, ..."));
        assert!(!matches(&[5, 5, 6], "4, ..."));
    }

    #[test]
    fn named_variadic_binds_span() {
        let pattern: ShapePattern = "n..., 1, 1".parse().unwrap();
        let mut bindings = DimensionBinding::new();
        assert!(is_compatible(&[1, 2, 3, 1, 1], &pattern, &mut bindings));
        assert_eq!(bindings.get("n..."), Some(&DimValue::Span(vec![1, 2, 3])));

        // Same pattern, different captured span.
        assert!(!is_compatible(&[1, 2, 1, 1], &pattern, &mut bindings));
        assert!(!is_compatible(&[1, 2, 4, 1, 1], &pattern, &mut bindings));
        assert!(is_compatible(&[1, 2, 3, 1, 1], &pattern, &mut bindings));
    }

    #[test]
    fn empty_named_variadic_is_bound() {
        let mut bindings = DimensionBinding::new();
        assert!(is_compatible(&[7], &"v..., 7".parse().unwrap(), &mut bindings));
        assert_eq!(bindings.get("v..."), Some(&DimValue::Span(vec![])));
        assert!(!is_compatible(&[1, 7], &"v..., 7".parse().unwrap(), &mut bindings));
    }

    #[test]
    fn variadic_shared_across_arguments() {
        let first: ShapePattern = "batch, variadic...".parse().unwrap();
        let second: ShapePattern = "variadic...".parse().unwrap();

        let mut bindings = DimensionBinding::new();
        assert!(is_compatible(&[7, 1, 2], &first, &mut bindings));
        assert!(is_compatible(&[1, 2], &second, &mut bindings));
        assert_eq!(bindings.get("variadic..."), Some(&DimValue::Span(vec![1, 2])));

        let mut bindings = DimensionBinding::new();
        assert!(is_compatible(&[6, 2], &first, &mut bindings));
        assert!(!is_compatible(&[1, 1], &second, &mut bindings));
    }

    #[test]
    fn literal_tokens() {
        let pattern = ShapePattern::from_tokens(vec![
            ShapeToken::Literal(vec![2, 3]),
            ShapeToken::Named("N".into()),
        ])
        .unwrap();
        assert!(is_compatible(&[2, 3, 9], &pattern, &mut DimensionBinding::new()));
        assert!(!is_compatible(&[2, 4, 9], &pattern, &mut DimensionBinding::new()));
        assert!(!is_compatible(&[2, 3], &pattern, &mut DimensionBinding::new()));
    }

    #[test]
    fn scalar_pattern_matches_empty_shape_only() {
        assert!(is_compatible(&[], &ShapePattern::scalar(), &mut DimensionBinding::new()));
        assert!(!is_compatible(&[1], &ShapePattern::scalar(), &mut DimensionBinding::new()));
    }

    #[test]
    fn huge_fixed_extent_is_not_a_wildcard() {
        let pattern = ShapePattern::from_tokens(vec![usize::MAX.into()]).unwrap();
        assert!(!is_compatible(&[3], &pattern, &mut DimensionBinding::new()));
        assert!(!matches(&[3], "-2"));
    }

    #[test]
    fn prebound_names_constrain() {
        let mut bindings = DimensionBinding::new();
        bindings.insert("N", 4usize);
        assert!(!is_compatible(&[5], &"N".parse().unwrap(), &mut bindings));
        assert!(is_compatible(&[4], &"N".parse().unwrap(), &mut bindings));
    }
}
