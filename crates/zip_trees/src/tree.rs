//! Arena-backed generalized zip tree engine, shared by every rank scheme in
//! `ranks.rs` and, via `NodeHook`, by the augmented first-fit index.
//!
//! Ported from `GeneralizedZipTree.h`'s bucket/`NULLPTR` layout, crossed with
//! `ZipTree.h`'s actual unzip-insert/zip-remove algorithm (the arena source
//! only ever implements `insert`; `remove` is filled in here with a free
//! list, the gap the original Design Notes call out explicitly).

use std::cmp::Ordering;

use crate::hook::{NoopHook, NodeHook};
use crate::ranks::{bits_required, DynamicRank, DynamicScheme, RankScheme, TieCounters};

pub(crate) const NULLPTR: u32 = u32::MAX;

struct Bucket<K, R, V> {
    key: K,
    rank: R,
    payload: V,
    left: u32,
    right: u32,
}

/// A tree instance over key type `K`, rank scheme `Rk`, optional augmentation
/// hook `H`, and per-node payload `V`. Unaugmented variants use
/// `Tree<K, Rk, NoopHook, ()>` (see the type aliases in `lib.rs`).
pub struct Tree<K, Rk, H = NoopHook, V = ()>
where
    K: Ord,
    Rk: RankScheme,
{
    buckets: Vec<Option<Bucket<K, Rk::Rank, V>>>,
    free: Vec<u32>,
    root: u32,
    size: usize,
    counters: TieCounters,
    rank_scheme: Rk,
    _hook: std::marker::PhantomData<H>,
}

fn two_mut<K, R, V>(
    buckets: &mut [Option<Bucket<K, R, V>>],
    a: u32,
    b: u32,
) -> (&mut Bucket<K, R, V>, &mut Bucket<K, R, V>) {
    debug_assert_ne!(a, b);
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    let (left_slice, right_slice) = buckets.split_at_mut(hi as usize);
    let lo_ref = left_slice[lo as usize].as_mut().unwrap();
    let hi_ref = right_slice[0].as_mut().unwrap();
    if a < b { (lo_ref, hi_ref) } else { (hi_ref, lo_ref) }
}

fn refresh_hook<K, R, H, V>(buckets: &mut [Option<Bucket<K, R, V>>], idx: u32)
where
    H: NodeHook<V>,
    V: Clone,
{
    if idx == NULLPTR {
        return;
    }
    let (left_idx, right_idx) = {
        let node = buckets[idx as usize].as_ref().unwrap();
        (node.left, node.right)
    };
    let left_payload = if left_idx == NULLPTR {
        None
    } else {
        Some(buckets[left_idx as usize].as_ref().unwrap().payload.clone())
    };
    let right_payload = if right_idx == NULLPTR {
        None
    } else {
        Some(buckets[right_idx as usize].as_ref().unwrap().payload.clone())
    };
    let node = buckets[idx as usize].as_mut().unwrap();
    H::update(&mut node.payload, left_payload.as_ref(), right_payload.as_ref());
}

impl<K, Rk, H, V> Tree<K, Rk, H, V>
where
    K: Ord,
    Rk: RankScheme,
    H: NodeHook<V>,
    V: Clone,
{
    pub fn new(capacity_hint: usize) -> Self
    where
        V: Default,
    {
        Self::with_rank_scheme(Rk::for_capacity(capacity_hint), capacity_hint)
    }

    pub fn with_seed(capacity_hint: usize, seed: u64) -> Self
    where
        V: Default,
    {
        Self::with_rank_scheme(Rk::for_capacity_with_seed(capacity_hint, seed), capacity_hint)
    }

    pub fn from_scheme(rank_scheme: Rk, capacity_hint: usize) -> Self {
        Self::with_rank_scheme(rank_scheme, capacity_hint)
    }

    fn with_rank_scheme(rank_scheme: Rk, capacity_hint: usize) -> Self {
        Self {
            buckets: Vec::with_capacity(capacity_hint),
            free: Vec::new(),
            root: NULLPTR,
            size: 0,
            counters: TieCounters::default(),
            rank_scheme,
            _hook: std::marker::PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn total_comparisons(&self) -> u64 {
        self.counters.total_comparisons()
    }

    pub fn first_ties(&self) -> u64 {
        self.counters.first_ties()
    }

    pub fn both_ties(&self) -> u64 {
        self.counters.both_ties()
    }

    pub(crate) fn root_index(&self) -> u32 {
        self.root
    }

    pub(crate) fn left_of(&self, idx: u32) -> u32 {
        self.buckets[idx as usize].as_ref().unwrap().left
    }

    pub(crate) fn right_of(&self, idx: u32) -> u32 {
        self.buckets[idx as usize].as_ref().unwrap().right
    }

    pub(crate) fn payload_of(&self, idx: u32) -> &V {
        &self.buckets[idx as usize].as_ref().unwrap().payload
    }

    pub(crate) fn payload_mut_of(&mut self, idx: u32) -> &mut V {
        &mut self.buckets[idx as usize].as_mut().unwrap().payload
    }

    pub(crate) fn key_of(&self, idx: u32) -> &K {
        &self.buckets[idx as usize].as_ref().unwrap().key
    }

    pub(crate) fn refresh(&mut self, idx: u32) {
        refresh_hook::<_, _, H, _>(&mut self.buckets, idx);
    }

    fn alloc(&mut self, key: K, rank: Rk::Rank, payload: V) -> u32 {
        let bucket = Some(Bucket { key, rank, payload, left: NULLPTR, right: NULLPTR });
        if let Some(idx) = self.free.pop() {
            self.buckets[idx as usize] = bucket;
            idx
        } else {
            let idx = self.buckets.len() as u32;
            self.buckets.push(bucket);
            idx
        }
    }

    fn free_slot(&mut self, idx: u32) {
        self.buckets[idx as usize] = None;
        self.free.push(idx);
    }

    pub fn find(&self, key: &K) -> bool {
        let mut cur = self.root;
        while cur != NULLPTR {
            let node = self.buckets[cur as usize].as_ref().unwrap();
            cur = match key.cmp(&node.key) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return true,
            };
        }
        false
    }

    pub fn depth(&self, key: &K) -> i64 {
        let mut cur = self.root;
        let mut depth = 0i64;
        while cur != NULLPTR {
            let node = self.buckets[cur as usize].as_ref().unwrap();
            match key.cmp(&node.key) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => return depth,
            }
            depth += 1;
        }
        -1
    }

    pub fn height(&self) -> i64 {
        self.height_of(self.root)
    }

    fn height_of(&self, idx: u32) -> i64 {
        if idx == NULLPTR {
            return -1;
        }
        let node = self.buckets[idx as usize].as_ref().unwrap();
        1 + self.height_of(node.left).max(self.height_of(node.right))
    }

    pub fn average_depth(&self) -> f64 {
        if self.size == 0 {
            return f64::NAN;
        }
        self.total_depth(self.root, 0) as f64 / self.size as f64
    }

    fn total_depth(&self, idx: u32, depth: u64) -> u64 {
        if idx == NULLPTR {
            return 0;
        }
        let node = self.buckets[idx as usize].as_ref().unwrap();
        depth + self.total_depth(node.left, depth + 1) + self.total_depth(node.right, depth + 1)
    }

    pub fn insert(&mut self, key: K)
    where
        V: Default,
    {
        self.insert_with_payload(key, V::default());
    }

    /// Inserts `key` with an explicit payload, returning the new node's
    /// arena index. Used directly by the first-fit index, which computes its
    /// payload before linking the node in.
    pub fn insert_with_payload(&mut self, key: K, payload: V) -> u32 {
        debug_assert!(!self.find(&key), "duplicate keys in zip tree");
        let mut new_rank = self.rank_scheme.fresh();

        if self.root == NULLPTR {
            let x = self.alloc(key, new_rank, payload);
            self.root = x;
            self.size += 1;
            return x;
        }

        // Pass 1: find the insertion point, recording the ancestor path.
        let mut path = Vec::new();
        let mut cur = self.root;
        let mut prev = NULLPTR;
        let mut came_from_left = false;
        loop {
            if cur == NULLPTR {
                break;
            }
            let going_left = key < self.buckets[cur as usize].as_ref().unwrap().key;
            let promote = {
                let cur_rank = &mut self.buckets[cur as usize].as_mut().unwrap().rank;
                if going_left {
                    self.rank_scheme.promote_on_left(&mut new_rank, cur_rank, &mut self.counters)
                } else {
                    self.rank_scheme.promote_on_right(&mut new_rank, cur_rank, &mut self.counters)
                }
            };
            if promote {
                break;
            }
            path.push(cur);
            prev = cur;
            came_from_left = going_left;
            cur = if going_left {
                self.buckets[cur as usize].as_ref().unwrap().left
            } else {
                self.buckets[cur as usize].as_ref().unwrap().right
            };
        }

        let x = self.alloc(key, new_rank, payload);
        self.size += 1;

        if prev == NULLPTR {
            self.root = x;
        } else if came_from_left {
            self.buckets[prev as usize].as_mut().unwrap().left = x;
        } else {
            self.buckets[prev as usize].as_mut().unwrap().right = x;
        }

        if cur == NULLPTR {
            self.refresh(x);
            for &idx in path.iter().rev() {
                self.refresh(idx);
            }
            return x;
        }

        let x_left_of_cur = self.buckets[x as usize].as_ref().unwrap().key < self.buckets[cur as usize].as_ref().unwrap().key;
        if x_left_of_cur {
            self.buckets[x as usize].as_mut().unwrap().right = cur;
        } else {
            self.buckets[x as usize].as_mut().unwrap().left = cur;
        }

        // Pass 2: cut the remaining subtree into two spines hanging off `x`.
        let mut touched = vec![x];
        let mut prev2 = x;
        let mut cur2 = cur;
        while cur2 != NULLPTR {
            let fix = prev2;
            let cur2_key_less = {
                let ck = &self.buckets[cur2 as usize].as_ref().unwrap().key;
                let xk = &self.buckets[x as usize].as_ref().unwrap().key;
                ck < xk
            };
            if cur2_key_less {
                loop {
                    prev2 = cur2;
                    cur2 = self.buckets[cur2 as usize].as_ref().unwrap().right;
                    if cur2 == NULLPTR {
                        break;
                    }
                    let still_less = self.buckets[cur2 as usize].as_ref().unwrap().key < self.buckets[x as usize].as_ref().unwrap().key;
                    if !still_less {
                        break;
                    }
                }
            } else {
                loop {
                    prev2 = cur2;
                    cur2 = self.buckets[cur2 as usize].as_ref().unwrap().left;
                    if cur2 == NULLPTR {
                        break;
                    }
                    let still_greater = self.buckets[cur2 as usize].as_ref().unwrap().key > self.buckets[x as usize].as_ref().unwrap().key;
                    if !still_greater {
                        break;
                    }
                }
            }

            let fix_key_greater = self.buckets[fix as usize].as_ref().unwrap().key > self.buckets[x as usize].as_ref().unwrap().key;
            let special = fix == x && self.buckets[prev2 as usize].as_ref().unwrap().key > self.buckets[x as usize].as_ref().unwrap().key;
            if fix_key_greater || special {
                self.buckets[fix as usize].as_mut().unwrap().left = cur2;
            } else {
                self.buckets[fix as usize].as_mut().unwrap().right = cur2;
            }
            touched.push(fix);
        }

        for &idx in touched.iter().rev() {
            self.refresh(idx);
        }
        for &idx in path.iter().rev() {
            self.refresh(idx);
        }

        x
    }

    pub fn remove(&mut self, key: &K) -> bool {
        let mut path = Vec::new();
        let mut parent = NULLPTR;
        let mut came_from_left = false;
        let mut cur = self.root;
        while cur != NULLPTR {
            match key.cmp(&self.buckets[cur as usize].as_ref().unwrap().key) {
                Ordering::Less => {
                    path.push(cur);
                    parent = cur;
                    came_from_left = true;
                    cur = self.buckets[cur as usize].as_ref().unwrap().left;
                }
                Ordering::Greater => {
                    path.push(cur);
                    parent = cur;
                    came_from_left = false;
                    cur = self.buckets[cur as usize].as_ref().unwrap().right;
                }
                Ordering::Equal => break,
            }
        }
        if cur == NULLPTR {
            return false;
        }

        let (left, right) = {
            let node = self.buckets[cur as usize].as_ref().unwrap();
            (node.left, node.right)
        };
        let merged = self.zip(left, right);
        self.free_slot(cur);
        self.size -= 1;

        if parent == NULLPTR {
            self.root = merged;
        } else if came_from_left {
            self.buckets[parent as usize].as_mut().unwrap().left = merged;
        } else {
            self.buckets[parent as usize].as_mut().unwrap().right = merged;
        }

        for &idx in path.iter().rev() {
            self.refresh(idx);
        }
        true
    }

    fn zip(&mut self, x: u32, y: u32) -> u32 {
        if x == NULLPTR {
            return y;
        }
        if y == NULLPTR {
            return x;
        }
        let prefer_y = {
            let (xb, yb) = two_mut(&mut self.buckets, x, y);
            self.rank_scheme.zip_prefer_y(&mut xb.rank, &mut yb.rank, &mut self.counters)
        };
        if prefer_y {
            let y_left = self.buckets[y as usize].as_ref().unwrap().left;
            let merged = self.zip(x, y_left);
            self.buckets[y as usize].as_mut().unwrap().left = merged;
            self.refresh(y);
            y
        } else {
            let x_right = self.buckets[x as usize].as_ref().unwrap().right;
            let merged = self.zip(x_right, y);
            self.buckets[x as usize].as_mut().unwrap().right = merged;
            self.refresh(x);
            x
        }
    }
}

impl<K: Ord> Tree<K, DynamicScheme, NoopHook, ()> {
    /// Largest number of bits any stored rank's geometric component needed.
    pub fn max_geometric_bits(&self) -> u8 {
        self.fold_ranks(0u8, |best, r| best.max(bits_required(r.g())))
    }

    /// Total bits spent across all stored ranks' geometric components.
    pub fn total_geometric_bits(&self) -> u64 {
        self.fold_ranks(0u64, |total, r| total + bits_required(r.g()) as u64)
    }

    /// Largest number of lazily-materialized uniform bits any rank needed.
    pub fn max_uniform_bits(&self) -> u8 {
        self.fold_ranks(0u8, |best, r| best.max(r.num_bits()))
    }

    /// Total lazily-materialized uniform bits across all stored ranks.
    pub fn total_uniform_bits(&self) -> u64 {
        self.fold_ranks(0u64, |total, r| total + r.num_bits() as u64)
    }

    fn fold_ranks<T: Copy>(&self, init: T, f: impl Fn(T, &DynamicRank) -> T) -> T {
        self.buckets.iter().flatten().fold(init, |acc, bucket| f(acc, &bucket.rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranks::{DynamicScheme, GeometricScheme};
    use std::collections::BTreeSet;

    type TestTree = Tree<u64, GeometricScheme, NoopHook, ()>;

    #[derive(Clone)]
    struct XorShift64 {
        state: u64,
    }

    impl XorShift64 {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_u64(&mut self) -> u64 {
            let mut x = self.state;
            x ^= x << 13;
            x ^= x >> 7;
            x ^= x << 17;
            self.state = x;
            x
        }

        fn gen_range(&mut self, n: u64) -> u64 {
            self.next_u64() % n
        }
    }

    #[test]
    fn insert_find_remove_round_trip() {
        let mut tree = TestTree::with_seed(64, 42);
        for k in 0..64u64 {
            tree.insert(k);
        }
        assert_eq!(tree.len(), 64);
        for k in 0..64u64 {
            assert!(tree.find(&k));
        }
        for k in (0..64u64).step_by(2) {
            assert!(tree.remove(&k));
        }
        assert_eq!(tree.len(), 32);
        for k in 0..64u64 {
            assert_eq!(tree.find(&k), k % 2 == 1);
        }
    }

    #[test]
    fn empty_tree_sentinels() {
        let tree = TestTree::with_seed(0, 1);
        assert_eq!(tree.height(), -1);
        assert!(tree.average_depth().is_nan());
        assert_eq!(tree.depth(&0), -1);
        assert!(!tree.find(&0));
    }

    #[test]
    fn insert_delete_symmetry_against_btreeset() {
        let mut rng = XorShift64::new(0xC0FF_EE00_1234_5678);
        let mut tree = TestTree::with_seed(0, 9);
        let mut oracle: BTreeSet<u64> = BTreeSet::new();

        for _ in 0..5_000 {
            let key = rng.gen_range(2_000);
            if oracle.contains(&key) {
                assert!(tree.remove(&key));
                oracle.remove(&key);
            } else {
                tree.insert(key);
                oracle.insert(key);
            }
            assert_eq!(tree.len(), oracle.len());
            for probe in [key, key.wrapping_add(1)] {
                assert_eq!(tree.find(&probe), oracle.contains(&probe));
            }
        }

        for &key in oracle.iter().collect::<Vec<_>>() {
            assert!(tree.remove(key));
        }
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.height(), -1);
    }

    fn check_height_respects_log_bound<Rk: RankScheme>(seed: u64) {
        let n: u64 = 1 << 14;
        let mut tree = Tree::<u64, Rk, NoopHook, ()>::with_seed(n as usize, seed);
        for k in 0..n {
            tree.insert(k);
        }
        let n = tree.len() as f64;
        let bound = 4.0 * n.log2();
        assert!((tree.height() as f64) <= bound, "height {} exceeded {}", tree.height(), bound);
    }

    #[test]
    fn height_respects_log_bound_with_high_probability() {
        check_height_respects_log_bound::<GeometricScheme>(123);
    }

    #[test]
    fn dynamic_scheme_height_respects_log_bound_with_high_probability() {
        check_height_respects_log_bound::<DynamicScheme>(124);
    }

    #[test]
    fn counters_never_decrease() {
        let mut tree = TestTree::with_seed(256, 3);
        let mut last = (0u64, 0u64, 0u64);
        for k in 0..256u64 {
            tree.insert(k);
            let now = (tree.total_comparisons(), tree.first_ties(), tree.both_ties());
            assert!(now.0 >= last.0);
            assert!(now.1 >= last.1);
            assert!(now.2 >= last.2);
            last = now;
        }
    }

    /// Recursively checks `rank(left) < rank(self) <= rank(right)` (weakly on
    /// the right, per the zip tree's asymmetric invariant). Extends ranks
    /// through the tree's own scheme/counters (not a throwaway scratch one)
    /// so that any bits still un-decided between two adjacent nodes are
    /// drawn from the same stream the tree itself would continue to use,
    /// rather than a second, unrelated source of randomness.
    fn assert_rank_heap_invariant(tree: &mut Tree<u64, DynamicScheme, NoopHook, ()>, idx: u32) {
        if idx == NULLPTR {
            return;
        }
        let (left, right, mut self_rank) = {
            let node = tree.buckets[idx as usize].as_ref().unwrap();
            (node.left, node.right, node.rank)
        };

        if left != NULLPTR {
            let mut left_rank = tree.buckets[left as usize].as_ref().unwrap().rank;
            let ord = tree.rank_scheme.cmp(&mut left_rank, &mut self_rank, &mut tree.counters);
            assert_eq!(ord, Ordering::Less, "left child rank must be strictly less than parent's");
        }
        if right != NULLPTR {
            let mut right_rank = tree.buckets[right as usize].as_ref().unwrap().rank;
            let ord = tree.rank_scheme.cmp(&mut right_rank, &mut self_rank, &mut tree.counters);
            assert_ne!(ord, Ordering::Greater, "right child rank must not exceed parent's");
        }

        assert_rank_heap_invariant(tree, left);
        assert_rank_heap_invariant(tree, right);
    }

    #[test]
    fn dynamic_scheme_rank_heap_invariant_holds_after_many_inserts() {
        let mut tree = Tree::<u64, DynamicScheme, NoopHook, ()>::with_seed(2_000, 55);
        let mut rng = XorShift64::new(0x5EED_1357_9BDF_2468);
        let mut order: Vec<u64> = (0..2_000u64).collect();
        for i in (1..order.len()).rev() {
            let j = rng.gen_range((i + 1) as u64) as usize;
            order.swap(i, j);
        }
        for &k in &order {
            tree.insert(k);
        }
        let root = tree.root_index();
        assert_rank_heap_invariant(&mut tree, root);
    }
}
