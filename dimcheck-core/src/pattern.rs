use std::{collections::BTreeSet, fmt, str::FromStr};

use crate::{Error, Result};

/// Suffix marking a variadic segment.
pub(crate) const ELLIPSIS: &str = "...";

/// Spelling of the explicit "no dimensions" pattern.
const SCALAR: &str = "()";

/// One position of a [`ShapePattern`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ShapeToken {
    /// A concrete extent. `-1` matches any single dimension.
    Fixed(i64),
    /// A scalar dimension, bound on first sight and checked afterwards.
    Named(String),
    /// `...`: zero or more dimensions, binds nothing.
    Variadic,
    /// `name...`: zero or more dimensions bound as one span.
    NamedVariadic(String),
    /// A literal run of extents matched pointwise.
    Literal(Vec<usize>),
}

impl ShapeToken {
    pub const ANY: ShapeToken = ShapeToken::Fixed(-1);

    pub fn is_variadic(&self) -> bool {
        matches!(self, Self::Variadic | Self::NamedVariadic(_))
    }

    /// The key under which this token is stored in a binding, if it binds anything.
    pub fn binding_key(&self) -> Option<String> {
        match self {
            Self::Named(name) => Some(name.clone()),
            Self::NamedVariadic(name) => Some(format!("{name}{ELLIPSIS}")),
            Self::Fixed(_) | Self::Variadic | Self::Literal(_) => None,
        }
    }

    fn parse_segment(spec: &str, segment: &str) -> Result<Self> {
        if segment.is_empty() {
            return Err(Error::spec(spec, "empty dimension"));
        }
        if let Some(prefix) = segment.strip_suffix(ELLIPSIS) {
            let prefix = prefix.trim_end();
            if prefix.is_empty() {
                return Ok(Self::Variadic);
            }
            // Any prefix names the span, digits included: `2...` binds under "2...".
            return Ok(Self::NamedVariadic(prefix.to_string()));
        }
        // `-1` has to come through here as a number, not as a name.
        match segment.parse::<i64>() {
            Ok(n) => Ok(Self::Fixed(n)),
            Err(_) => Ok(Self::Named(segment.to_string())),
        }
    }
}

impl fmt::Display for ShapeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}"),
            Self::Named(name) => f.write_str(name),
            Self::Variadic => f.write_str(ELLIPSIS),
            Self::NamedVariadic(name) => write!(f, "{name}{ELLIPSIS}"),
            Self::Literal(dims) => {
                f.write_str("(")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{d}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Saturates at `i64::MAX`, so no extent can turn into the `-1` wildcard.
impl From<usize> for ShapeToken {
    fn from(value: usize) -> Self {
        Self::Fixed(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<&str> for ShapeToken {
    fn from(value: &str) -> Self {
        match value.strip_suffix(ELLIPSIS) {
            Some("") => Self::Variadic,
            Some(name) => Self::NamedVariadic(name.to_string()),
            None => Self::Named(value.to_string()),
        }
    }
}

/// A parsed shape specification: an immutable sequence of tokens holding at
/// most one variadic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapePattern(Vec<ShapeToken>);

impl ShapePattern {
    /// Parse an optional spec string.
    ///
    /// `None`, `""` and whitespace-only input mean "do not check" and yield
    /// `Ok(None)`. `"()"` is the pattern with no dimensions.
    pub fn parse(spec: Option<&str>) -> Result<Option<Self>> {
        match spec.map(str::trim) {
            None | Some("") => Ok(None),
            Some(SCALAR) => Ok(Some(Self::scalar())),
            Some(text) => {
                let tokens = text
                    .split(',')
                    .map(|segment| ShapeToken::parse_segment(text, segment.trim()))
                    .collect::<Result<Vec<_>>>()?;
                Self::from_tokens(tokens).map(Some).map_err(|err| match err {
                    Error::Specification { reason, .. } => Error::spec(text, reason),
                    other => other,
                })
            }
        }
    }

    /// Build a pattern directly from tokens, enforcing the single-variadic rule.
    pub fn from_tokens(tokens: Vec<ShapeToken>) -> Result<Self> {
        if tokens.iter().filter(|t| t.is_variadic()).count() > 1 {
            let text = Self(tokens).to_string();
            return Err(Error::spec(
                &text,
                "each shape can have at most one '...' dimension",
            ));
        }
        Ok(Self(tokens))
    }

    /// The pattern expecting no dimensions at all.
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    pub fn tokens(&self) -> &[ShapeToken] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_variadic(&self) -> bool {
        self.0.iter().any(ShapeToken::is_variadic)
    }

    /// Every binding key this pattern can introduce.
    pub fn names(&self) -> BTreeSet<String> {
        self.0.iter().filter_map(ShapeToken::binding_key).collect()
    }
}

impl FromStr for ShapePattern {
    type Err = Error;

    /// Parse a spec string that must request a check.
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(Some(s))?.ok_or_else(|| Error::spec(s, "empty shape specification"))
    }
}

impl fmt::Display for ShapePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str(SCALAR);
        }
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

impl From<ShapePattern> for Vec<ShapeToken> {
    fn from(value: ShapePattern) -> Self {
        value.0
    }
}
