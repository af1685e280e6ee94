//! Randomized balanced binary search trees built around a single
//! arena-backed "generalized zip tree" engine, parameterized over a
//! pluggable rank scheme. Includes an augmented first-fit bin-packing
//! index built on top of the same engine.
//!
//! Every variant implements [`RandomizedTree`], the shared surface used by
//! the test and benchmark harnesses to stay generic over the scheme in
//! exactly the shape a plain ordered-map library would expose one trait
//! over many interchangeable implementations.

mod cdouble;
mod driver;
mod first_fit;
mod hook;
mod ranks;
mod tree;

pub use cdouble::CDouble;
pub use driver::{first_fit, first_fit_decreasing};
pub use first_fit::{FFBin, FfHook, FirstFitIndex};
pub use hook::{NodeHook, NoopHook};
pub use ranks::{
    DynamicRank, DynamicScheme, GeometricScheme, RankScheme, TieCounters, TreapScheme,
    UniformScheme, VariableGeometricScheme, ZigZagScheme, ZipZipGgRank, ZipZipGgScheme,
    ZipZipGuRank, ZipZipGuScheme,
};
pub use tree::Tree;

/// Shared surface implemented by every randomized-tree variant in this
/// crate, so harnesses can stay generic over the rank scheme.
pub trait RandomizedTree {
    type Key: Ord;

    fn new(capacity_hint: usize) -> Self;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, key: Self::Key);

    fn remove(&mut self, key: &Self::Key) -> bool;

    fn find(&self, key: &Self::Key) -> bool;

    fn depth(&self, key: &Self::Key) -> i64;

    fn height(&self) -> i64;

    /// `f64::NAN` on an empty tree.
    fn average_depth(&self) -> f64;

    fn total_comparisons(&self) -> u64;

    fn first_ties(&self) -> u64;

    fn both_ties(&self) -> u64;
}

impl<K, Rk> RandomizedTree for Tree<K, Rk, NoopHook, ()>
where
    K: Ord,
    Rk: RankScheme,
{
    type Key = K;

    fn new(capacity_hint: usize) -> Self {
        Tree::new(capacity_hint)
    }

    fn len(&self) -> usize {
        Tree::len(self)
    }

    fn insert(&mut self, key: K) {
        Tree::insert(self, key)
    }

    fn remove(&mut self, key: &K) -> bool {
        Tree::remove(self, key)
    }

    fn find(&self, key: &K) -> bool {
        Tree::find(self, key)
    }

    fn depth(&self, key: &K) -> i64 {
        Tree::depth(self, key)
    }

    fn height(&self) -> i64 {
        Tree::height(self)
    }

    fn average_depth(&self) -> f64 {
        Tree::average_depth(self)
    }

    fn total_comparisons(&self) -> u64 {
        Tree::total_comparisons(self)
    }

    fn first_ties(&self) -> u64 {
        Tree::first_ties(self)
    }

    fn both_ties(&self) -> u64 {
        Tree::both_ties(self)
    }
}

/// Geometric ranks, the classic zip tree (Tarjan, Shioura, Tarjan 2019).
pub type GeometricZipTree<K> = Tree<K, GeometricScheme, NoopHook, ()>;
/// Uniform 64-bit ranks.
pub type UniformZipTree<K> = Tree<K, UniformScheme, NoopHook, ()>;
/// Zip-zip tree with `(geometric, uniform)` rank pairs.
pub type ZipZipTree<K> = Tree<K, ZipZipGuScheme, NoopHook, ()>;
/// Zip-zip tree with `(geometric, geometric)` rank pairs.
pub type ZipZipGgTree<K> = Tree<K, ZipZipGgScheme, NoopHook, ()>;
/// Zig-zag zip tree: direction/parity-aware tie-breaking, no explicit key
/// comparison in the promotion rule.
pub type ZigZagZipTree<K> = Tree<K, ZigZagScheme, NoopHook, ()>;
/// Dynamic lazy-bit zip tree: ranks materialize random bits on demand.
pub type DynamicZipTree<K> = Tree<K, DynamicScheme, NoopHook, ()>;
/// Variable-`p` geometric zip tree.
pub type VariableGeometricZipTree<K> = Tree<K, VariableGeometricScheme, NoopHook, ()>;
/// Classical treap (uniform priorities, heap-ordered).
pub type Treap<K> = Tree<K, TreapScheme, NoopHook, ()>;

impl<K: Ord> VariableGeometricZipTree<K> {
    pub fn with_p(p: f64, capacity_hint: usize, seed: u64) -> Self {
        Tree::from_scheme(VariableGeometricScheme::with_p(p, seed), capacity_hint)
    }
}
