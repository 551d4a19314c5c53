//! Checked calls: parse the declared specs once, then match every call's
//! arguments and result against them.

use std::{collections::BTreeSet, fmt};

use log::{debug, trace};

use crate::{
    binding::{DimValue, DimensionBinding},
    matcher::is_compatible,
    nested::Nested,
    pattern::ShapePattern,
    scope::DimScope,
    shaped::ShapeTree,
    Error, Result,
};

/// Observed shapes of one argument, `None` where a value exposes no extents.
pub type ObservedTree = Nested<Option<Vec<usize>>>;

/// Declared patterns of one argument, `None` where no check is requested.
pub type PatternTree = Nested<Option<ShapePattern>>;

/// The outcome of comparing one value against one pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub compatible: bool,
    /// `None` when no pattern was declared and the value was skipped.
    pub expected: Option<ShapePattern>,
    pub actual: Option<Vec<usize>>,
    /// Extra context for mismatches that are not a plain shape difference.
    pub label: Option<String>,
}

impl MatchResult {
    pub fn skipped() -> Self {
        Self {
            compatible: true,
            expected: None,
            actual: None,
            label: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.expected.is_none()
    }

    fn render(&self, slot: &str) -> String {
        let Some(expected) = &self.expected else {
            return format!("Skipped:  {slot}.");
        };
        // `()` is already the spelling of the scalar pattern.
        let expected = if expected.is_empty() {
            expected.to_string()
        } else {
            format!("({expected})")
        };
        let actual = match &self.actual {
            Some(dims) => DimValue::Span(dims.clone()).to_string(),
            None => "none".to_string(),
        };
        let status = if self.compatible { "Match:   " } else { "MisMatch:" };
        let mut line =
            format!("{status} {slot} Expected Shape: {expected} Actual Shape: {actual}.");
        if let Some(label) = &self.label {
            line.push_str(&format!(" ({label})"));
        }
        line
    }
}

/// Compare one observed subtree against one declared pattern.
pub fn check_leaf(
    expected: Option<&ShapePattern>,
    actual: &ObservedTree,
    bindings: &mut DimensionBinding,
) -> MatchResult {
    let Some(pattern) = expected else {
        return MatchResult::skipped();
    };
    let result = match actual {
        Nested::Leaf(Some(dims)) => MatchResult {
            compatible: is_compatible(dims, pattern, bindings),
            expected: Some(pattern.clone()),
            actual: Some(dims.clone()),
            label: None,
        },
        Nested::Leaf(None) => MatchResult {
            compatible: pattern.is_empty(),
            expected: Some(pattern.clone()),
            actual: None,
            label: (!pattern.is_empty()).then(|| "value has no extents".to_string()),
        },
        container => MatchResult {
            compatible: false,
            expected: Some(pattern.clone()),
            actual: None,
            label: container
                .kind()
                .map(|kind| format!("expected a single value, found a {kind}")),
        },
    };
    trace!(
        "({pattern}) against {:?}: {}",
        result.actual,
        if result.compatible { "match" } else { "mismatch" }
    );
    result
}

/// Everything a caller needs to explain a failed check.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeMismatch {
    pub function: String,
    /// The named dimensions as they stood when the mismatch was found.
    pub bindings: DimensionBinding,
    pub inputs: Vec<(String, Nested<MatchResult>)>,
    /// Present only when the result was checked.
    pub output: Option<Nested<MatchResult>>,
}

impl ShapeMismatch {
    /// Names of the arguments that failed.
    pub fn failing_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .filter(|(_, info)| !info.all(|r| r.compatible))
            .map(|(name, _)| name.as_str())
    }

    pub fn output_failed(&self) -> bool {
        self.output
            .as_ref()
            .is_some_and(|info| !info.all(|r| r.compatible))
    }
}

fn write_tree(
    f: &mut fmt::Formatter<'_>,
    tree: &Nested<MatchResult>,
    slot: &str,
    indent: usize,
) -> fmt::Result {
    let pad = " ".repeat(indent);
    let Some(kind) = tree.kind() else {
        return match tree.as_leaf() {
            Some(result) => writeln!(f, "{pad}{}", result.render(slot)),
            None => Ok(()),
        };
    };
    let children: Vec<(String, &Nested<MatchResult>)> = match tree {
        Nested::Leaf(_) => Vec::new(),
        Nested::Map(entries) => entries
            .iter()
            .map(|(k, v)| (format!("Key: {k}"), v))
            .collect(),
        Nested::List(items) | Nested::Tuple(items) | Nested::Set(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("Ind: {i}"), v))
            .collect(),
        Nested::Record { fields, .. } => fields
            .iter()
            .map(|(name, v)| (format!("Field: {name}"), v))
            .collect(),
    };
    writeln!(f, "{pad}{slot}  Type: {kind}")?;
    for (child_slot, child) in children {
        write_tree(f, child, &child_slot, indent + 4)?;
    }
    Ok(())
}

impl fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "in function {}.", self.function)?;
        writeln!(f, "Named Dimensions: {}.", self.bindings)?;
        writeln!(f, "Input:")?;
        for (name, info) in &self.inputs {
            write_tree(f, info, &format!("Argument: {name}"), 4)?;
        }
        if let Some(output) = &self.output {
            writeln!(f, "Output:")?;
            write_tree(f, output, "Result:", 4)?;
        }
        Ok(())
    }
}

/// Actual arguments of one call, already reduced to their observed shapes.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<ObservedTree>,
    keyword: Vec<(String, ObservedTree)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next positional argument.
    pub fn arg<V: ShapeTree + ?Sized>(mut self, value: &V) -> Self {
        self.positional.push(value.shape_tree());
        self
    }

    /// Add an argument by parameter name.
    pub fn kwarg<V: ShapeTree + ?Sized>(mut self, name: impl Into<String>, value: &V) -> Self {
        self.keyword.push((name.into(), value.shape_tree()));
        self
    }
}

/// Declared parameter and result specs, collected before parsing.
#[derive(Debug, Clone)]
pub struct ShapeCheckBuilder {
    name: String,
    params: Vec<(String, Nested<String>)>,
    output: Option<Nested<String>>,
    match_callees: bool,
}

impl ShapeCheckBuilder {
    /// Declare the next parameter. An empty spec declares it unchecked.
    pub fn arg(self, name: impl Into<String>, spec: &str) -> Self {
        self.arg_nested(name, Nested::Leaf(spec))
    }

    /// Declare a parameter that is left unchecked.
    pub fn skip(self, name: impl Into<String>) -> Self {
        self.arg(name, "")
    }

    /// Declare a parameter holding a structure of values.
    pub fn arg_nested(mut self, name: impl Into<String>, spec: Nested<&str>) -> Self {
        self.params.push((name.into(), spec.map(|s| s.to_string())));
        self
    }

    pub fn output(self, spec: &str) -> Self {
        self.output_nested(Nested::Leaf(spec))
    }

    pub fn output_nested(mut self, spec: Nested<&str>) -> Self {
        self.output = Some(spec.map(|s| s.to_string()));
        self
    }

    /// Share named dimensions with every checked call made while this one runs.
    pub fn match_callees(mut self, enabled: bool) -> Self {
        self.match_callees = enabled;
        self
    }

    /// Parse every declared spec.
    pub fn build(self) -> Result<ShapeCheck> {
        let mut seen = BTreeSet::new();
        for (name, _) in &self.params {
            if !seen.insert(name.as_str()) {
                return Err(Error::Arguments(format!(
                    "parameter {name} is declared twice for {}",
                    self.name
                )));
            }
        }
        let params = self
            .params
            .iter()
            .map(|(name, spec)| Ok((name.clone(), parse_tree(spec)?)))
            .collect::<Result<Vec<_>>>()?;
        let output = self.output.as_ref().map(parse_tree).transpose()?;

        let mut names = BTreeSet::new();
        for tree in params.iter().map(|(_, t)| t).chain(output.as_ref()) {
            for pattern in tree.leaves().flatten() {
                names.extend(pattern.names());
            }
        }

        Ok(ShapeCheck {
            name: self.name,
            params,
            output,
            match_callees: self.match_callees,
            names,
        })
    }
}

fn parse_tree(spec: &Nested<String>) -> Result<PatternTree> {
    let mut first_err = None;
    let parsed = spec.map(|s| match ShapePattern::parse(Some(s.as_str())) {
        Ok(pattern) => pattern,
        Err(err) => {
            first_err.get_or_insert(err);
            None
        }
    });
    match first_err {
        Some(err) => Err(err),
        None => Ok(parsed),
    }
}

/// A parsed set of shape declarations for one function.
#[derive(Debug, Clone)]
pub struct ShapeCheck {
    name: String,
    params: Vec<(String, PatternTree)>,
    output: Option<PatternTree>,
    match_callees: bool,
    names: BTreeSet<String>,
}

impl ShapeCheck {
    pub fn builder(name: impl Into<String>) -> ShapeCheckBuilder {
        ShapeCheckBuilder {
            name: name.into(),
            params: Vec::new(),
            output: None,
            match_callees: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every dimension name mentioned by the inputs and the output.
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn matches_callees(&self) -> bool {
        self.match_callees
    }

    /// Pair each declared parameter with the argument passed for it.
    pub fn resolve<'a>(
        &'a self,
        args: &'a CallArgs,
    ) -> Result<Vec<(&'a str, &'a PatternTree, &'a ObservedTree)>> {
        if args.positional.len() > self.params.len() {
            return Err(Error::Arguments(format!(
                "{} takes {} arguments but {} were given",
                self.name,
                self.params.len(),
                args.positional.len()
            )));
        }
        let mut slots: Vec<Option<&ObservedTree>> = vec![None; self.params.len()];
        for (slot, value) in slots.iter_mut().zip(&args.positional) {
            *slot = Some(value);
        }
        for (name, value) in &args.keyword {
            let Some(i) = self.params.iter().position(|(p, _)| p == name) else {
                return Err(Error::Arguments(format!(
                    "{} got an unexpected argument {name}",
                    self.name
                )));
            };
            if slots[i].replace(value).is_some() {
                return Err(Error::Arguments(format!(
                    "{} got multiple values for argument {name}",
                    self.name
                )));
            }
        }
        self.params
            .iter()
            .zip(slots)
            .map(|((name, spec), value)| match value {
                Some(value) => Ok((name.as_str(), spec, value)),
                None => Err(Error::Arguments(format!(
                    "{} is missing argument {name}",
                    self.name
                ))),
            })
            .collect()
    }

    /// Check `args`, run `f`, then check what it returned.
    ///
    /// `f` receives the scope so that checked calls it makes can share named
    /// dimensions with this one. When this check matches its callees, or runs
    /// inside one that does, its names are registered in the scope for the
    /// duration of the call and matched against the scope's shared binding;
    /// otherwise a fresh binding is used. With checking disabled `f` runs
    /// directly.
    pub fn call<O, F>(&self, scope: &DimScope, args: &CallArgs, f: F) -> Result<O>
    where
        O: ShapeTree,
        F: FnOnce(&DimScope) -> Result<O>,
    {
        if !scope.is_checking_enabled() {
            trace!("checking disabled, calling {} directly", self.name);
            return f(scope);
        }

        let resolved = self.resolve(args)?;
        let cross = self.match_callees || scope.is_matching_callees();
        let _names = cross.then(|| scope.enter(&self.names));
        let mut local = DimensionBinding::new();

        let inputs = self.with_binding(scope, cross, &mut local, |bindings| {
            resolved
                .iter()
                .map(|(name, spec, value)| {
                    let info = match_tree(spec, value, bindings)?;
                    Ok((name.to_string(), info))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        if !inputs.iter().all(|(_, info)| info.all(|r| r.compatible)) {
            return Err(self.mismatch(scope, cross, &local, inputs, None));
        }

        let output = {
            let _callees = scope.match_callees(cross);
            f(scope)?
        };

        if let Some(spec) = &self.output {
            let observed = output.shape_tree();
            let info = self.with_binding(scope, cross, &mut local, |bindings| {
                match_tree(spec, &observed, bindings)
            })?;
            if !info.all(|r| r.compatible) {
                return Err(self.mismatch(scope, cross, &local, inputs, Some(info)));
            }
        }

        Ok(output)
    }

    fn with_binding<R>(
        &self,
        scope: &DimScope,
        cross: bool,
        local: &mut DimensionBinding,
        f: impl FnOnce(&mut DimensionBinding) -> R,
    ) -> R {
        if cross {
            scope.with_bindings(f)
        } else {
            f(local)
        }
    }

    fn mismatch(
        &self,
        scope: &DimScope,
        cross: bool,
        local: &DimensionBinding,
        inputs: Vec<(String, Nested<MatchResult>)>,
        output: Option<Nested<MatchResult>>,
    ) -> Error {
        let bindings = if cross {
            scope.bindings()
        } else {
            local.clone()
        };
        let report = ShapeMismatch {
            function: self.name.clone(),
            bindings,
            inputs,
            output,
        };
        debug!("shape mismatch {report}");
        report.into()
    }
}

fn match_tree(
    spec: &PatternTree,
    actual: &ObservedTree,
    bindings: &mut DimensionBinding,
) -> Result<Nested<MatchResult>> {
    spec.map_with(&[actual], |expected, found| {
        check_leaf(expected.as_ref(), found[0], bindings)
    })
}
