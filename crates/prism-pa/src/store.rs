//! Fixed-capacity vertex batch storage.

use prism_wide::{WideVec4, SIMD_WIDTH};

/// A fixed ring of shaded vertex batches.
///
/// Each batch is one [`WideVec4`] per attribute slot, holding `SIMD_WIDTH`
/// vertices. Assemblers hand out batch slots to the shader stage through
/// their feed points and later gather individual lanes back out by
/// `(batch, slot, component, lane)`; the store itself never reallocates.
#[derive(Debug)]
pub struct VertexStore {
    batches: usize,
    attrs: usize,
    data: Vec<WideVec4>,
}

impl VertexStore {
    pub fn new(batches: usize, attrs: usize) -> Self {
        debug_assert!(batches > 0);
        debug_assert!(attrs > 0);
        Self {
            batches,
            attrs,
            data: vec![WideVec4::ZERO; batches * attrs],
        }
    }

    pub fn num_batches(&self) -> usize {
        self.batches
    }

    pub fn num_attrs(&self) -> usize {
        self.attrs
    }

    /// Total vertex capacity of the ring.
    pub fn capacity_verts(&self) -> usize {
        self.batches * SIMD_WIDTH
    }

    /// One attribute slot of one stored batch.
    #[inline]
    pub fn attr(&self, batch: usize, slot: usize) -> &WideVec4 {
        debug_assert!(slot < self.attrs);
        &self.data[batch * self.attrs + slot]
    }

    /// All attribute slots of one batch, for the shader stage to fill.
    #[inline]
    pub fn batch_mut(&mut self, batch: usize) -> &mut [WideVec4] {
        let base = batch * self.attrs;
        &mut self.data[base..base + self.attrs]
    }

    /// Single-component read used by the per-primitive gather.
    #[inline]
    pub fn component(&self, batch: usize, slot: usize, component: usize, lane: usize) -> f32 {
        self.attr(batch, slot).v[component].0[lane]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_slots_are_independent() {
        let mut store = VertexStore::new(3, 2);
        assert_eq!(store.capacity_verts(), 3 * SIMD_WIDTH);

        store.batch_mut(1)[0].set_lane(4, [1.0, 2.0, 3.0, 4.0]);
        store.batch_mut(1)[1].set_lane(4, [5.0, 6.0, 7.0, 8.0]);

        assert_eq!(store.component(1, 0, 0, 4), 1.0);
        assert_eq!(store.component(1, 1, 3, 4), 8.0);
        // Other batches stay zeroed.
        assert_eq!(store.component(0, 0, 0, 4), 0.0);
        assert_eq!(store.attr(2, 1).lane(4), [0.0; 4]);
    }
}
