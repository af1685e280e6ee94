//! Per-node augmentation callback, invoked bottom-up after structural
//! changes. Mirrors the source's `updateNode` timing, but is expressed over
//! resolved child payloads rather than raw child pointers (see `tree.rs`
//! and `SPEC_FULL.md` section 3.1), following the zero-sized-policy-struct
//! shape the teacher uses for its own augmentation traits.

pub trait NodeHook<V> {
    fn update(payload: &mut V, left: Option<&V>, right: Option<&V>);
}

/// The base variant's hook: every non-augmented tree in this crate uses it.
pub struct NoopHook;

impl<V> NodeHook<V> for NoopHook {
    fn update(_payload: &mut V, _left: Option<&V>, _right: Option<&V>) {}
}
