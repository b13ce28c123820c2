//! The capability contract shared by every assembler variant.

use prism_wide::{LaneMask, Vec4, WideU32, WideVec4};

/// One primitive assembler.
///
/// The driving loop is the same for every variant:
///
/// 1. While [`has_work`](Self::has_work): write a shaded vertex batch into
///    the slot returned by [`next_vs_output`](Self::next_vs_output) (and,
///    on the cut-aware path, the batch's restart bits into
///    [`next_vs_cut_mask`](Self::next_vs_cut_mask)).
/// 2. Call [`assemble`](Self::assemble). `false` means fewer than a full
///    batch of primitives is ready and more input is wanted; once input is
///    exhausted the partial batch is still valid and
///    [`num_prims`](Self::num_prims) gives its true lane count.
/// 3. Hand the assembled primitives downstream, then call
///    [`next_prim`](Self::next_prim) to retire them.
///
/// Repeated [`assemble`](Self::assemble) calls without an intervening
/// [`next_prim`](Self::next_prim) return the same primitive set; nothing
/// advances until the batch is retired.
///
/// Not every variant implements every operation: per-batch vector access is
/// an optimized-path affordance and the feed points are meaningless for
/// tessellation output. Calling an unimplemented operation is a contract
/// violation and panics.
pub trait PrimitiveAssembler {
    /// True while unassembled input remains.
    fn has_work(&self) -> bool;

    /// Direct reference to one attribute's full-batch vector at a stored
    /// batch index. Optimized path only.
    fn simd_vector(&self, batch: usize, slot: usize) -> &WideVec4;

    /// Assemble up to `SIMD_WIDTH` primitives' worth of vertices for one
    /// attribute slot. `out` holds one [`WideVec4`] per
    /// vertex-in-primitive. Returns `false` if the batch is incomplete and
    /// more input remains to be fed.
    fn assemble(&mut self, slot: usize, out: &mut [WideVec4]) -> bool;

    /// Extract a single assembled primitive's vertices, one [`Vec4`] per
    /// vertex-in-primitive. Used for degenerate or clip-generated
    /// primitives processed outside the wide path.
    fn assemble_single(&mut self, slot: usize, prim_index: usize, out: &mut [Vec4]);

    /// Retire the current batch and advance assembly state. Returns `true`
    /// iff complete work is still queued without requiring new input.
    fn next_prim(&mut self) -> bool;

    /// Feed point: the batch slot the shader stage writes next.
    fn next_vs_output(&mut self) -> &mut [WideVec4];

    /// Feed point: restart bits for the batch most recently returned by
    /// [`next_vs_output`](Self::next_vs_output). Cut-aware path only.
    fn next_vs_cut_mask(&mut self) -> &mut LaneMask;

    /// Feed point for stream-output data; advances the feed cursor and
    /// reports whether work remains.
    fn next_stream_output(&mut self) -> bool;

    /// Valid primitive count of the currently assembled batch
    /// (`<= SIMD_WIDTH`; meaningful on the final partial batch).
    fn num_prims(&self) -> usize;

    /// Return to the initial state for reuse across draws.
    fn reset(&mut self);

    /// Per-lane primitive IDs for the current batch, offset by `start_id`.
    fn prim_id(&self, start_id: u32) -> WideU32;
}
