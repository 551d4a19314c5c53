use std::{
    collections::{btree_map, BTreeMap},
    fmt,
};

/// The value a dimension name is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DimValue {
    /// A named scalar dimension such as `N`.
    Scalar(usize),
    /// A named variadic span such as `batch...`.
    Span(Vec<usize>),
}

impl fmt::Display for DimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(d) => write!(f, "{d}"),
            Self::Span(dims) => {
                f.write_str("(")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{d}")?;
                }
                if dims.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<usize> for DimValue {
    fn from(value: usize) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<usize>> for DimValue {
    fn from(value: Vec<usize>) -> Self {
        Self::Span(value)
    }
}

impl From<&[usize]> for DimValue {
    fn from(value: &[usize]) -> Self {
        Self::Span(value.to_vec())
    }
}

/// Name → value environment shared by every match inside one check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionBinding {
    dims: BTreeMap<String, DimValue>,
}

impl DimensionBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&DimValue> {
        self.dims.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dims.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<DimValue>) {
        self.dims.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<DimValue> {
        self.dims.remove(name)
    }

    pub fn clear(&mut self) {
        self.dims.clear();
    }

    pub fn len(&self) -> usize {
        self.dims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, DimValue> {
        self.dims.iter()
    }
}

impl<'a> IntoIterator for &'a DimensionBinding {
    type Item = (&'a String, &'a DimValue);
    type IntoIter = btree_map::Iter<'a, String, DimValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.dims.iter()
    }
}

impl<K: Into<String>, V: Into<DimValue>> FromIterator<(K, V)> for DimensionBinding {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            dims: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Display for DimensionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.dims.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_sorted() {
        let binding: DimensionBinding = [
            ("N", DimValue::Scalar(7)),
            ("A", DimValue::Scalar(5)),
            ("n...", DimValue::Span(vec![1, 2])),
            ("m...", DimValue::Span(vec![4])),
        ]
        .into_iter()
        .collect();
        assert_eq!(binding.to_string(), "{A: 5, N: 7, m...: (4,), n...: (1, 2)}");
    }

    #[test]
    fn insert_and_remove() {
        let mut binding = DimensionBinding::new();
        binding.insert("N", 3usize);
        assert_eq!(binding.get("N"), Some(&DimValue::Scalar(3)));
        assert_eq!(binding.remove("N"), Some(DimValue::Scalar(3)));
        assert!(binding.is_empty());
    }
}
