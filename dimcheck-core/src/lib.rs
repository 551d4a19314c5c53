//! Dimcheck validates, at call time, that the extents of array-like values follow declared
//! shape patterns, and that named dimensions agree across a function's arguments and result.
//!
//! A pattern is written as a comma-separated list: integers are fixed extents (`-1` matches
//! anything), names like `N` bind on first sight and must agree everywhere after that, `...`
//! matches any number of dimensions, and `batch...` does the same while binding the span.
//!
//! ## A quick guide
//! - Describe a function with [`ShapeCheck::builder`], one spec per parameter and optionally one
//!   for the result. Specs are parsed once, in [`ShapeCheckBuilder::build`].
//! - Collect the actual arguments of a call in [`CallArgs`]. Anything implementing [`ShapeTree`]
//!   can be passed: nested `Vec`s and arrays, [`Dims`], tuples, maps and [`Nested`] trees.
//! - Run the function through [`ShapeCheck::call`] with a [`DimScope`]. A mismatch comes back as
//!   [`Error::ShapeMismatch`] carrying a [`ShapeMismatch`] report.
//! - Checks built with [`ShapeCheckBuilder::match_callees`] share their named dimensions with
//!   every checked call made through the same scope while they run.
//!
//! ## What can you do with it?
//! ```
//! use dimcheck_core::{CallArgs, DimScope, ShapeCheck};
//!
//! let matmul = ShapeCheck::builder("matmul")
//!     .arg("a", "M, K")
//!     .arg("b", "K, N")
//!     .output("M, N")
//!     .build()
//!     .unwrap();
//!
//! let scope = DimScope::new();
//! let a = vec![vec![1.0f32; 4]; 3];
//! let b = vec![vec![1.0f32; 2]; 4];
//!
//! let args = CallArgs::new().arg(&a).arg(&b);
//! let c = matmul
//!     .call(&scope, &args, |_| Ok(vec![vec![4.0f32; 2]; 3]))
//!     .unwrap();
//! assert_eq!(c.len(), 3);
//!
//! let bad = CallArgs::new().arg(&a).arg(&a);
//! let err = matmul.call(&scope, &bad, |_| Ok(vec![0.0f32])).unwrap_err();
//! let report = err.as_shape_mismatch().unwrap();
//! assert_eq!(report.failing_inputs().collect::<Vec<_>>(), vec!["b"]);
//! ```
//!
//! A [`DimScope`] is single-threaded state: it is `!Send`, and every thread checking calls
//! needs its own.

mod binding;
mod check;
mod config;
mod error;
mod matcher;
mod nested;
mod pattern;
mod scope;
mod shaped;

pub use binding::{DimValue, DimensionBinding};
pub use check::{
    check_leaf, CallArgs, MatchResult, ObservedTree, PatternTree, ShapeCheck, ShapeCheckBuilder,
    ShapeMismatch,
};
pub use config::{Config, ENABLED_VAR, MATCH_CALLEES_VAR};
pub use error::{Context, Error, Result};
pub use matcher::is_compatible;
pub use nested::{ContainerKind, Key, Leaves, Nested};
pub use pattern::{ShapePattern, ShapeToken};
pub use scope::{CalleesGuard, DimScope, EnabledGuard, NameGuard};
pub use shaped::{Dims, ShapeTree, Shaped};
