//! Augmented first-fit bin index. Ported from `ZipTreeFF.{h,cpp}`: a
//! zig-zag zip tree keyed by 1-origin bin id, augmented with
//! `bestRemainingCapacity` so `insert_first` can find the leftmost
//! (oldest) bin with enough room in one descent.

use crate::cdouble::CDouble;
use crate::hook::NodeHook;
use crate::ranks::ZigZagScheme;
use crate::tree::{Tree, NULLPTR};

const BIN_CAPACITY: f64 = 1.0;

#[derive(Clone, Copy, Debug)]
pub struct FFBin {
    pub remaining_capacity: CDouble,
    pub best_remaining_capacity: CDouble,
}

impl Default for FFBin {
    fn default() -> Self {
        FFBin {
            remaining_capacity: CDouble::new(0.0),
            best_remaining_capacity: CDouble::new(0.0),
        }
    }
}

pub struct FfHook;

impl NodeHook<FFBin> for FfHook {
    fn update(payload: &mut FFBin, left: Option<&FFBin>, right: Option<&FFBin>) {
        let mut best = payload.remaining_capacity;
        if let Some(l) = left {
            if l.best_remaining_capacity.val > best.val {
                best = l.best_remaining_capacity;
            }
        }
        if let Some(r) = right {
            if r.best_remaining_capacity.val > best.val {
                best = r.best_remaining_capacity;
            }
        }
        payload.best_remaining_capacity = best;
    }
}

/// A first-fit bin index: `insert_first(weight)` finds or opens the
/// leftmost bin able to host `weight` and returns its 1-origin id.
pub struct FirstFitIndex {
    tree: Tree<u32, ZigZagScheme, FfHook, FFBin>,
}

impl FirstFitIndex {
    pub fn new(capacity_hint: usize) -> Self {
        Self {
            tree: Tree::from_scheme(ZigZagScheme::for_capacity(capacity_hint), capacity_hint),
        }
    }

    pub fn with_seed(capacity_hint: usize, seed: u64) -> Self {
        Self {
            tree: Tree::from_scheme(ZigZagScheme::for_capacity_with_seed(capacity_hint, seed), capacity_hint),
        }
    }

    pub fn size(&self) -> usize {
        self.tree.len()
    }

    pub fn insert_first(&mut self, weight: f64) -> u32 {
        let weight = CDouble::new(weight);
        let root = self.tree.root_index();
        let root_best = if root == NULLPTR {
            CDouble::new(0.0)
        } else {
            self.tree.payload_of(root).best_remaining_capacity
        };

        if root == NULLPTR || root_best.lt(weight) {
            let bin_id = self.tree.len() as u32 + 1;
            let remaining = CDouble::new(BIN_CAPACITY).sub(weight);
            let payload = FFBin { remaining_capacity: remaining, best_remaining_capacity: remaining };
            self.tree.insert_with_payload(bin_id, payload);
            return bin_id;
        }

        let mut path = Vec::new();
        let mut cur = root;
        let bin_id = loop {
            path.push(cur);
            let left = self.tree.left_of(cur);
            let left_best = if left == NULLPTR {
                CDouble::new(0.0)
            } else {
                self.tree.payload_of(left).best_remaining_capacity
            };

            if left != NULLPTR && left_best.ge(weight) {
                cur = left;
                continue;
            }

            let here_remaining = self.tree.payload_of(cur).remaining_capacity;
            if here_remaining.ge(weight) {
                let key = *self.tree.key_of(cur);
                self.tree.payload_mut_of(cur).remaining_capacity = here_remaining.sub(weight);
                break key;
            }

            cur = self.tree.right_of(cur);
        };

        for &idx in path.iter().rev() {
            self.tree.refresh(idx);
        }
        bin_id
    }
}
