use std::collections::{BTreeMap, HashMap};

use crate::nested::{Key, Nested};

/// A value whose extents can be observed at call time.
pub trait Shaped {
    /// The extents of this value, or `None` when it exposes none.
    fn dims(&self) -> Option<Vec<usize>>;

    /// True when [`Shaped::dims`] is `None` because the value is a scalar,
    /// false when it is `None` because the data is ragged.
    fn is_scalar(&self) -> bool {
        false
    }
}

/// An explicitly observed shape, for array types that live outside this
/// crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Dims(pub Vec<usize>);

impl Dims {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }
}

impl Shaped for Dims {
    fn dims(&self) -> Option<Vec<usize>> {
        Some(self.0.clone())
    }
}

/// Row-major nested data: the outer length followed by the extents every
/// element shares. `None` when the elements disagree or are ragged
/// themselves.
fn row_major<T: Shaped>(items: &[T]) -> Option<Vec<usize>> {
    let Some(first) = items.first() else {
        return Some(vec![0]);
    };
    let inner = first.dims();
    if inner.is_none() && !first.is_scalar() {
        return None;
    }
    if items[1..]
        .iter()
        .any(|item| item.dims() != inner || (inner.is_none() && !item.is_scalar()))
    {
        return None;
    }
    let mut dims = vec![items.len()];
    dims.extend(inner.into_iter().flatten());
    Some(dims)
}

/// A sequence seen as one array when it is rectangular, otherwise as the
/// list of its elements.
fn sequence_tree<T: Shaped>(items: &[T]) -> Nested<Option<Vec<usize>>> {
    match row_major(items) {
        Some(dims) => Nested::Leaf(Some(dims)),
        None => Nested::List(items.iter().map(|item| Nested::Leaf(item.dims())).collect()),
    }
}

impl<T: Shaped> Shaped for [T] {
    fn dims(&self) -> Option<Vec<usize>> {
        row_major(self)
    }
}

impl<T: Shaped> Shaped for Vec<T> {
    fn dims(&self) -> Option<Vec<usize>> {
        row_major(self)
    }
}

impl<T: Shaped, const N: usize> Shaped for [T; N] {
    fn dims(&self) -> Option<Vec<usize>> {
        row_major(self)
    }
}

impl<T: Shaped + ?Sized> Shaped for &T {
    fn dims(&self) -> Option<Vec<usize>> {
        (**self).dims()
    }

    fn is_scalar(&self) -> bool {
        (**self).is_scalar()
    }
}

impl<T: Shaped> Shaped for Option<T> {
    fn dims(&self) -> Option<Vec<usize>> {
        self.as_ref().and_then(Shaped::dims)
    }

    fn is_scalar(&self) -> bool {
        self.as_ref().map_or(true, Shaped::is_scalar)
    }
}

macro_rules! scalar {
    ($($t:ty),*) => {
        $(
            impl Shaped for $t {
                fn dims(&self) -> Option<Vec<usize>> {
                    None
                }

                fn is_scalar(&self) -> bool {
                    true
                }
            }

            impl ShapeTree for $t {
                fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
                    Nested::Leaf(None)
                }
            }
        )*
    };
}

scalar!(bool, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64, char, String, str, ());

/// A value, or a structure of values, turned into the tree of observed
/// shapes that a check walks.
pub trait ShapeTree {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>>;
}

impl ShapeTree for Dims {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        Nested::Leaf(self.dims())
    }
}

impl<T: Shaped> ShapeTree for Vec<T> {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        sequence_tree(self)
    }
}

impl<T: Shaped> ShapeTree for [T] {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        sequence_tree(self)
    }
}

impl<T: Shaped, const N: usize> ShapeTree for [T; N] {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        sequence_tree(self)
    }
}

impl<T: ShapeTree + ?Sized> ShapeTree for &T {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        (**self).shape_tree()
    }
}

impl<T: ShapeTree> ShapeTree for Option<T> {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        match self {
            Some(value) => value.shape_tree(),
            None => Nested::Leaf(None),
        }
    }
}

fn trees<T: ShapeTree>(items: &[T]) -> Vec<Nested<Option<Vec<usize>>>> {
    items.iter().map(ShapeTree::shape_tree).collect()
}

impl<T: ShapeTree> ShapeTree for Nested<T> {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        match self {
            Nested::Leaf(value) => value.shape_tree(),
            Nested::Map(entries) => Nested::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.shape_tree()))
                    .collect(),
            ),
            Nested::List(items) => Nested::List(trees(items)),
            Nested::Tuple(items) => Nested::Tuple(trees(items)),
            Nested::Set(items) => Nested::Set(trees(items)),
            Nested::Record { name, fields } => Nested::Record {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(field, v)| (field.clone(), v.shape_tree()))
                    .collect(),
            },
        }
    }
}

impl<K: Clone + Into<Key>, V: ShapeTree> ShapeTree for BTreeMap<K, V> {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        Nested::mapping(self.iter().map(|(k, v)| (k.clone(), v.shape_tree())))
    }
}

impl<K: Clone + Into<Key>, V: ShapeTree, S> ShapeTree for HashMap<K, V, S> {
    fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
        Nested::mapping(self.iter().map(|(k, v)| (k.clone(), v.shape_tree())))
    }
}

macro_rules! tuple_tree {
    ($(($($T:ident . $idx:tt),+)),*) => {
        $(
            impl<$($T: ShapeTree),+> ShapeTree for ($($T,)+) {
                fn shape_tree(&self) -> Nested<Option<Vec<usize>>> {
                    Nested::Tuple(vec![$(self.$idx.shape_tree()),+])
                }
            }
        )*
    };
}

tuple_tree!(
    (A.0),
    (A.0, B.1),
    (A.0, B.1, C.2),
    (A.0, B.1, C.2, D.3),
    (A.0, B.1, C.2, D.3, E.4),
    (A.0, B.1, C.2, D.3, E.4, F.5)
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_vectors_are_row_major() {
        assert_eq!(vec![vec![0.0f32; 4]; 3].dims(), Some(vec![3, 4]));
        assert_eq!([[[1u8; 2]; 3]; 4].dims(), Some(vec![4, 3, 2]));
        assert_eq!(Vec::<f64>::new().dims(), Some(vec![0]));
    }

    #[test]
    fn ragged_rows_have_no_single_shape() {
        let ragged = vec![vec![1.0f32; 4], vec![1.0f32; 1]];
        assert_eq!(ragged.dims(), None);
        assert!(!ragged.is_scalar());
        assert_eq!(
            ragged.shape_tree(),
            Nested::List(vec![Nested::Leaf(Some(vec![4])), Nested::Leaf(Some(vec![1]))])
        );

        // Raggedness deeper down spoils the outer shape too.
        let deep = vec![ragged.clone(), ragged];
        assert_eq!(deep.dims(), None);

        let mixed: Vec<Vec<Vec<u8>>> = vec![vec![vec![1; 2]; 3], vec![vec![1; 2]; 2]];
        assert_eq!(mixed.dims(), None);
        assert_eq!(vec![vec![vec![1u8; 2]; 3]; 2].dims(), Some(vec![2, 3, 2]));
    }

    #[test]
    fn scalars_have_no_extents() {
        assert_eq!(3.5f64.dims(), None);
        assert_eq!(7usize.shape_tree(), Nested::Leaf(None));
    }

    #[test]
    fn tuples_become_tuple_trees() {
        let tree = (vec![1.0f32; 2], Dims(vec![4, 5])).shape_tree();
        assert_eq!(
            tree,
            Nested::tuple([Nested::Leaf(Some(vec![2])), Nested::Leaf(Some(vec![4, 5]))])
        );
    }

    #[test]
    fn maps_become_mapping_trees() {
        let mut map = BTreeMap::new();
        map.insert("a", Dims(vec![1]));
        map.insert("b", Dims(vec![2, 2]));
        assert_eq!(
            map.shape_tree(),
            Nested::mapping([
                ("a", Nested::Leaf(Some(vec![1]))),
                ("b", Nested::Leaf(Some(vec![2, 2]))),
            ])
        );
    }
}
