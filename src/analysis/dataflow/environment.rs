//! Abstract environments: maps from locations to abstract values.
//!
//! An [`Environment`] is either bottom (the program point is unreachable) or a
//! total map in which every location not explicitly bound holds top. Top
//! values are never stored, so two environments describing the same map
//! compare equal.
//!
//! Binding any location to bottom collapses the whole environment to bottom:
//! a state in which some register has no possible value cannot be reached.

use std::{
    collections::BTreeMap,
    fmt::{self, Debug},
};

use crate::analysis::dataflow::lattice::{AbstractDomain, JoinSemiLattice};

/// A location-wise abstract environment.
///
/// # Examples
///
/// ```rust
/// use optscope::analysis::dataflow::{
///     AbstractDomain, Environment, JoinSemiLattice, SignedConstantDomain,
/// };
///
/// let mut a = Environment::<u32, SignedConstantDomain>::top();
/// a.set(0, SignedConstantDomain::Value(1));
/// let mut b = a.clone();
/// b.set(0, SignedConstantDomain::Value(2));
///
/// assert_eq!(a.join(&b).get(&0), SignedConstantDomain::Top);
/// assert_eq!(a.join(&Environment::bottom()), a);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Environment<K, V> {
    bindings: Option<BTreeMap<K, V>>,
}

impl<K, V> Environment<K, V>
where
    K: Ord + Clone + Debug,
    V: AbstractDomain,
{
    /// Returns the value bound to `key`: top when unbound, bottom when the
    /// environment itself is bottom.
    #[must_use]
    pub fn get(&self, key: &K) -> V {
        match &self.bindings {
            None => V::bottom(),
            Some(map) => map.get(key).cloned().unwrap_or_else(V::top),
        }
    }

    /// Binds `key` to `value`.
    ///
    /// A bottom value makes the environment bottom; a top value unbinds the
    /// key. Setting anything in a bottom environment has no effect.
    pub fn set(&mut self, key: K, value: V) {
        let Some(map) = &mut self.bindings else {
            return;
        };
        if value.is_bottom() {
            self.bindings = None;
        } else if value.is_top() {
            map.remove(&key);
        } else {
            map.insert(key, value);
        }
    }

    /// Applies `f` to the value bound to `key`.
    pub fn update(&mut self, key: K, f: impl FnOnce(&V) -> V) {
        if self.bindings.is_some() {
            let value = f(&self.get(&key));
            self.set(key, value);
        }
    }

    /// Resets `key` to top.
    pub fn forget(&mut self, key: &K) {
        if let Some(map) = &mut self.bindings {
            map.remove(key);
        }
    }

    /// Keeps only the bindings for which `keep` returns `true`; the others
    /// become top.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &V) -> bool) {
        if let Some(map) = &mut self.bindings {
            map.retain(|k, v| keep(k, v));
        }
    }

    /// Iterates over the explicit (non-top) bindings.
    pub fn bindings(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.bindings.iter().flat_map(BTreeMap::iter)
    }

    /// Number of explicit bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.as_ref().map_or(0, BTreeMap::len)
    }

    /// Returns `true` if nothing is bound (top or bottom).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes the environment bottom.
    pub fn set_to_bottom(&mut self) {
        self.bindings = None;
    }

    /// Combines two reachable maps key by key. Keys absent on either side are
    /// top there and stay top.
    fn combine(&self, other: &Self, op: impl Fn(&V, &V) -> V) -> Self {
        match (&self.bindings, &other.bindings) {
            (None, _) => other.clone(),
            (_, None) => self.clone(),
            (Some(a), Some(b)) => {
                let map = a
                    .iter()
                    .filter_map(|(k, va)| {
                        let vb = b.get(k)?;
                        let v = op(va, vb);
                        (!v.is_top()).then(|| (k.clone(), v))
                    })
                    .collect();
                Self { bindings: Some(map) }
            }
        }
    }
}

impl<K, V> JoinSemiLattice for Environment<K, V>
where
    K: Ord + Clone + Debug,
    V: AbstractDomain,
{
    fn bottom() -> Self {
        Self { bindings: None }
    }

    fn is_bottom(&self) -> bool {
        self.bindings.is_none()
    }

    fn leq(&self, other: &Self) -> bool {
        match (&self.bindings, &other.bindings) {
            (None, _) => true,
            (_, None) => false,
            (Some(_), Some(b)) => b.iter().all(|(k, vb)| self.get(k).leq(vb)),
        }
    }

    fn join(&self, other: &Self) -> Self {
        self.combine(other, V::join)
    }

    /// Widens value by value, then drops every binding that is still
    /// growing, so the set of bound keys shrinks until it stabilizes.
    fn widen(&self, other: &Self) -> Self {
        let mut widened = self.combine(other, V::widen);
        if let (Some(previous), Some(map)) = (&self.bindings, &mut widened.bindings) {
            map.retain(|k, v| previous.get(k) == Some(v));
        }
        widened
    }
}

impl<K, V> AbstractDomain for Environment<K, V>
where
    K: Ord + Clone + Debug,
    V: AbstractDomain,
{
    fn top() -> Self {
        Self {
            bindings: Some(BTreeMap::new()),
        }
    }

    fn is_top(&self) -> bool {
        self.bindings.as_ref().is_some_and(BTreeMap::is_empty)
    }

    fn meet(&self, other: &Self) -> Self {
        let (Some(a), Some(b)) = (&self.bindings, &other.bindings) else {
            return Self::bottom();
        };
        let mut result = Self {
            bindings: Some(a.clone()),
        };
        for (k, vb) in b {
            let value = result.get(k).meet(vb);
            result.set(k.clone(), value);
            if result.is_bottom() {
                break;
            }
        }
        result
    }
}

impl<K: Debug, V: Debug> Debug for Environment<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.bindings {
            None => f.write_str("_|_"),
            Some(map) => f.debug_map().entries(map.iter()).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dataflow::SignedConstantDomain as Sc;

    type Env = Environment<u32, Sc>;

    fn env(bindings: &[(u32, i64)]) -> Env {
        let mut env = Env::top();
        for &(k, v) in bindings {
            env.set(k, Sc::Value(v));
        }
        env
    }

    #[test]
    fn test_unbound_reads_top() {
        let e = env(&[(0, 1)]);
        assert_eq!(e.get(&0), Sc::Value(1));
        assert_eq!(e.get(&7), Sc::Top);
        assert_eq!(Env::bottom().get(&0), Sc::Bottom);
    }

    #[test]
    fn test_binding_bottom_collapses() {
        let mut e = env(&[(0, 1), (1, 2)]);
        e.set(2, Sc::Bottom);
        assert!(e.is_bottom());
        e.set(3, Sc::Value(3));
        assert!(e.is_bottom());
    }

    #[test]
    fn test_binding_top_unbinds() {
        let mut e = env(&[(0, 1)]);
        e.set(0, Sc::Top);
        assert!(e.is_top());
        assert_eq!(e, Env::top());
    }

    #[test]
    fn test_join_laws() {
        let a = env(&[(0, 1), (1, 2)]);
        let b = env(&[(0, 1), (1, 3)]);
        let c = env(&[(1, 2), (2, 5)]);
        let bottom = Env::bottom();

        assert_eq!(a.join(&bottom), a);
        assert_eq!(bottom.join(&a), a);
        assert_eq!(a.join(&a), a);
        assert_eq!(a.join(&b), b.join(&a));
        assert_eq!(a.join(&b.join(&c)), a.join(&b).join(&c));
        assert!(a.leq(&a.join(&b)));
        assert!(b.leq(&a.join(&b)));
        assert!(bottom.leq(&a));
        assert!(!a.leq(&bottom));
        assert!(a.leq(&Env::top()));

        let joined = a.join(&b);
        assert_eq!(joined.get(&0), Sc::Value(1));
        assert_eq!(joined.get(&1), Sc::Top);
    }

    #[test]
    fn test_widen_drops_growing_bindings() {
        let previous = env(&[(0, 1), (1, 2)]);
        let next = env(&[(0, 1), (1, 2)]);
        assert_eq!(previous.widen(&next), previous);

        let grown = env(&[(0, 1)]);
        let widened = previous.widen(&grown);
        assert!(previous.leq(&widened));
        assert!(grown.leq(&widened));
        assert_eq!(widened.get(&1), Sc::Top);
    }

    #[test]
    fn test_meet() {
        let a = env(&[(0, 1)]);
        let b = env(&[(1, 2)]);
        let m = a.meet(&b);
        assert_eq!(m.get(&0), Sc::Value(1));
        assert_eq!(m.get(&1), Sc::Value(2));

        let conflicting = env(&[(0, 2)]);
        assert!(a.meet(&conflicting).is_bottom());
        assert!(a.meet(&Env::bottom()).is_bottom());
    }
}
