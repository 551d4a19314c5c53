//! The named-dimension scope shared by a chain of checked calls.
//!
//! A [`DimScope`] is a handle to state that lives as long as any clone of
//! it: the shared binding used when checks match their callees, a use count
//! per dimension name, and the checking toggles. It is reference counted with
//! `Rc` and therefore neither `Send` nor `Sync`; a scope belongs to one thread
//! of control. Give each thread its own scope.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use log::debug;

use crate::{binding::DimensionBinding, config::Config};

#[derive(Debug)]
struct ScopeState {
    bindings: DimensionBinding,
    /// Number of active frames that declared each name.
    use_counts: HashMap<String, usize>,
    checking_enabled: bool,
    match_callees: bool,
}

/// Shared handle to a named-dimension scope.
#[derive(Debug, Clone)]
pub struct DimScope {
    state: Rc<RefCell<ScopeState>>,
}

impl Default for DimScope {
    fn default() -> Self {
        Self::new()
    }
}

impl DimScope {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            state: Rc::new(RefCell::new(ScopeState {
                bindings: DimensionBinding::new(),
                use_counts: HashMap::new(),
                checking_enabled: config.checking_enabled,
                match_callees: config.match_callees,
            })),
        }
    }

    /// A scope configured from the environment, see [`Config::from_env`].
    pub fn from_env() -> Self {
        Self::with_config(Config::from_env())
    }

    /// Register one more active frame for each of `names`.
    ///
    /// The returned guard releases the frame when dropped, on every exit
    /// path. Guards must be dropped in reverse order of creation, which
    /// lexical scoping gives for free.
    #[must_use = "names are released as soon as the guard is dropped"]
    pub fn enter(&self, names: &BTreeSet<String>) -> NameGuard {
        let mut state = self.state.borrow_mut();
        for name in names {
            *state.use_counts.entry(name.clone()).or_insert(0) += 1;
        }
        NameGuard {
            scope: self.clone(),
            names: names.clone(),
        }
    }

    fn leave(&self, names: &BTreeSet<String>) {
        let mut state = self.state.borrow_mut();
        for name in names {
            let Some(count) = state.use_counts.get_mut(name) else {
                continue;
            };
            *count -= 1;
            if *count == 0 {
                state.use_counts.remove(name);
                if let Some(value) = state.bindings.remove(name) {
                    debug!("released dimension {name} = {value}");
                }
            }
        }
    }

    /// Number of active frames that declared `name`.
    pub fn use_count(&self, name: &str) -> usize {
        self.state
            .borrow()
            .use_counts
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// A copy of the shared binding as it is now.
    pub fn bindings(&self) -> DimensionBinding {
        self.state.borrow().bindings.clone()
    }

    /// Run `f` with the shared binding. `f` must not call back into the scope.
    pub(crate) fn with_bindings<R>(&self, f: impl FnOnce(&mut DimensionBinding) -> R) -> R {
        f(&mut self.state.borrow_mut().bindings)
    }

    pub fn is_checking_enabled(&self) -> bool {
        self.state.borrow().checking_enabled
    }

    /// Switch checking on or off until the guard is dropped.
    #[must_use = "the previous setting is restored as soon as the guard is dropped"]
    pub fn set_checking_enabled(&self, enabled: bool) -> EnabledGuard {
        let previous = std::mem::replace(&mut self.state.borrow_mut().checking_enabled, enabled);
        EnabledGuard {
            scope: self.clone(),
            previous,
        }
    }

    /// Whether checks currently running share named dimensions with their callees.
    pub fn is_matching_callees(&self) -> bool {
        self.state.borrow().match_callees
    }

    /// Switch cross-call matching on or off until the guard is dropped.
    #[must_use = "the previous setting is restored as soon as the guard is dropped"]
    pub fn match_callees(&self, enabled: bool) -> CalleesGuard {
        let previous = std::mem::replace(&mut self.state.borrow_mut().match_callees, enabled);
        CalleesGuard {
            scope: self.clone(),
            previous,
        }
    }
}

/// Releases names registered with [`DimScope::enter`].
#[derive(Debug)]
pub struct NameGuard {
    scope: DimScope,
    names: BTreeSet<String>,
}

impl NameGuard {
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

impl Drop for NameGuard {
    fn drop(&mut self) {
        self.scope.leave(&self.names);
    }
}

/// Restores the checking toggle set by [`DimScope::set_checking_enabled`].
#[derive(Debug)]
pub struct EnabledGuard {
    scope: DimScope,
    previous: bool,
}

impl Drop for EnabledGuard {
    fn drop(&mut self) {
        self.scope.state.borrow_mut().checking_enabled = self.previous;
    }
}

/// Restores the cross-call toggle set by [`DimScope::match_callees`].
#[derive(Debug)]
pub struct CalleesGuard {
    scope: DimScope,
    previous: bool,
}

impl Drop for CalleesGuard {
    fn drop(&mut self) {
        self.scope.state.borrow_mut().match_callees = self.previous;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts_follow_nesting() {
        let scope = DimScope::new();
        let outer = scope.enter(&names(&["N", "M"]));
        {
            let _inner = scope.enter(&names(&["N", "K"]));
            assert_eq!(scope.use_count("N"), 2);
            assert_eq!(scope.use_count("K"), 1);
        }
        assert_eq!(scope.use_count("N"), 1);
        assert_eq!(scope.use_count("K"), 0);
        drop(outer);
        assert_eq!(scope.use_count("N"), 0);
    }

    #[test]
    fn bindings_evicted_with_last_user() {
        let scope = DimScope::new();
        let outer = scope.enter(&names(&["N"]));
        {
            let _inner = scope.enter(&names(&["N", "K"]));
            scope.with_bindings(|b| {
                b.insert("N", 3usize);
                b.insert("K", 4usize);
            });
        }
        let snapshot = scope.bindings();
        assert!(snapshot.contains("N"));
        assert!(!snapshot.contains("K"));
        drop(outer);
        assert!(scope.bindings().is_empty());
    }

    #[test]
    fn released_on_panic() {
        let scope = DimScope::new();
        let inner = scope.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = inner.enter(&names(&["N"]));
            inner.with_bindings(|b| b.insert("N", 1usize));
            panic!("wrapped call failed");
        }));
        assert!(result.is_err());
        assert_eq!(scope.use_count("N"), 0);
        assert!(scope.bindings().is_empty());
    }

    #[test]
    fn toggles_restore() {
        let scope = DimScope::new();
        assert!(scope.is_checking_enabled());
        {
            let _off = scope.set_checking_enabled(false);
            assert!(!scope.is_checking_enabled());
            {
                let _on = scope.set_checking_enabled(true);
                assert!(scope.is_checking_enabled());
            }
            assert!(!scope.is_checking_enabled());
        }
        assert!(scope.is_checking_enabled());

        assert!(!scope.is_matching_callees());
        {
            let _callees = scope.match_callees(true);
            assert!(scope.is_matching_callees());
        }
        assert!(!scope.is_matching_callees());
    }

    #[test]
    fn config_seeds_toggles() {
        let scope = DimScope::with_config(Config {
            checking_enabled: false,
            match_callees: true,
        });
        assert!(!scope.is_checking_enabled());
        assert!(scope.is_matching_callees());
    }

    fn frames() -> impl Strategy<Value = Vec<BTreeSet<String>>> {
        let name = prop::sample::select(vec!["A", "B", "C", "N", "n..."]);
        prop::collection::vec(
            prop::collection::btree_set(name.prop_map(str::to_string), 0..4),
            1..8,
        )
    }

    proptest! {
        #[test]
        fn balanced_nesting_leaks_nothing(frames in frames()) {
            let scope = DimScope::new();
            let mut guards = Vec::new();
            for (depth, frame) in frames.iter().enumerate() {
                guards.push(scope.enter(frame));
                scope.with_bindings(|b| {
                    for name in frame {
                        if !b.contains(name) {
                            b.insert(name.clone(), depth);
                        }
                    }
                });
            }

            while let Some(guard) = guards.pop() {
                drop(guard);
                let live: BTreeSet<&String> = guards.iter().flat_map(|g| g.names()).collect();
                for (name, _) in &scope.bindings() {
                    prop_assert!(live.contains(&name), "{name} outlived its frames");
                }
                for name in &live {
                    let expected = guards.iter().filter(|g| g.names().contains(*name)).count();
                    prop_assert_eq!(scope.use_count(name), expected);
                }
            }
            prop_assert!(scope.bindings().is_empty());
            for frame in &frames {
                for name in frame {
                    prop_assert_eq!(scope.use_count(name), 0);
                }
            }
        }
    }
}
