//! Cut-aware primitive assembly.
//!
//! Indexed draws can carry strip-cut ("primitive restart") markers, and
//! adjacency topologies need exact per-vertex role tracking, so this
//! variant runs a state machine per *vertex* rather than per batch. Each
//! incoming vertex is fed to a per-topology handler that appends completed
//! primitives to a gather-index table; a cut mark terminates the current
//! primitive sequence and resets the topology window so no primitive spans
//! the cut.
//!
//! Vertices live in a fixed ring fed batch-by-batch. The `tail` cursor
//! marks the oldest vertex still needed by in-flight state; the store-full
//! predicate keeps the writer from overwriting it, and its one-batch slack
//! also protects the strip window trailing just behind the tail.

use prism_wide::{LaneMask, Vec4, WideU32, WideVec4, SIMD_WIDTH};
use tracing::trace;

use crate::assembler::PrimitiveAssembler;
use crate::store::VertexStore;
use crate::topology::{PrimitiveTopology, MAX_VERTS_PER_PRIM};
use crate::PaError;

/// Per-topology vertex handler, selected once at construction from the
/// topology and the geometry-stage flag. The no-GS forms retain only the
/// vertices of the core primitive, dropping adjacency vertices that exist
/// solely as geometry-stage inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VertexHandler {
    PointList,
    LineList,
    LineStrip,
    LineListAdj,
    LineListAdjNoGs,
    LineStripAdj,
    LineStripAdjNoGs,
    TriList,
    TriListAdj,
    TriListAdjNoGs,
    TriStrip,
    TriStripAdj { gs: bool },
}

impl VertexHandler {
    fn select(topology: PrimitiveTopology, gs_enabled: bool) -> Self {
        use PrimitiveTopology::*;
        match (topology, gs_enabled) {
            (PointList, _) => Self::PointList,
            (LineList, _) => Self::LineList,
            (LineStrip, _) => Self::LineStrip,
            (LineListAdj, true) => Self::LineListAdj,
            (LineListAdj, false) => Self::LineListAdjNoGs,
            (LineStripAdj, true) => Self::LineStripAdj,
            (LineStripAdj, false) => Self::LineStripAdjNoGs,
            (TriangleList, _) => Self::TriList,
            (TriangleListAdj, true) => Self::TriListAdj,
            (TriangleListAdj, false) => Self::TriListAdjNoGs,
            (TriangleStrip, _) => Self::TriStrip,
            (TriangleStripAdj, gs) => Self::TriStripAdj { gs },
        }
    }
}

/// Resolved gather source for one vertex of one primitive lane.
#[derive(Clone, Copy, Debug, Default)]
struct GatherSlot {
    batch: usize,
    lane: usize,
}

pub struct CutAssembler {
    store: VertexStore,
    /// One restart-bit word per ring batch, parallel to `store`.
    cut_masks: Vec<LaneMask>,

    topology: PrimitiveTopology,
    handler: VertexHandler,
    verts_per_prim: usize,

    /// Ring capacity in vertices.
    num_verts: usize,
    /// Vertices of the draw still to be consumed. Signed: the
    /// triangle-strip-adjacency finish step runs after this hits zero.
    remaining_verts: i64,
    total_verts: u32,

    /// Gather-index table: absolute ring vertex per vertex-in-primitive
    /// slot and primitive lane.
    indices: [[u32; SIMD_WIDTH]; MAX_VERTS_PER_PRIM],
    /// `indices` resolved to `(batch, lane)` pairs; recomputed only when
    /// new vertices have been fed since the last resolve.
    offsets: [[GatherSlot; SIMD_WIDTH]; MAX_VERTS_PER_PRIM],
    need_offsets: bool,

    prims_assembled: usize,
    /// Next unused write slot in the ring.
    head_vertex: usize,
    /// Oldest vertex still referenced by unretired primitive state.
    tail_vertex: usize,
    /// Next unprocessed vertex.
    cur_vertex: usize,
    /// Ring batch most recently handed out by the vertex feed point; its
    /// cut mask is what the mask feed point returns.
    fed_batch: usize,

    prim_id: WideU32,

    /// Whether cut-marked vertices are also fed to the handler (a geometry
    /// stage sees valid vertices on every index; a fetch stage sends
    /// garbage on cuts that must be skipped).
    process_cut_verts: bool,

    // Topology window.
    vert: [u32; MAX_VERTS_PER_PRIM],
    cur_index: usize,
    /// Strip winding parity; flipped per assembled strip primitive.
    reverse_winding: bool,
    /// Extra trailing vertex held across steps of a triangle strip with
    /// adjacency.
    adj_extra_vert: Option<u32>,
}

impl CutAssembler {
    /// `ring_verts` is the vertex ring capacity (a whole number of
    /// batches); `total_verts` is the draw's vertex count.
    pub fn new(
        topology: PrimitiveTopology,
        ring_verts: usize,
        num_attrs: usize,
        total_verts: u32,
        gs_enabled: bool,
        process_cut_verts: bool,
    ) -> Result<Self, PaError> {
        if num_attrs == 0 {
            return Err(PaError::NoAttributes);
        }
        if ring_verts == 0 || ring_verts % SIMD_WIDTH != 0 {
            return Err(PaError::MisalignedRing(ring_verts));
        }
        let batches = ring_verts / SIMD_WIDTH;
        Ok(Self {
            store: VertexStore::new(batches, num_attrs),
            cut_masks: vec![LaneMask::EMPTY; batches],
            topology,
            handler: VertexHandler::select(topology, gs_enabled),
            verts_per_prim: topology.verts_per_prim(gs_enabled),
            num_verts: ring_verts,
            remaining_verts: i64::from(total_verts),
            total_verts,
            indices: [[0; SIMD_WIDTH]; MAX_VERTS_PER_PRIM],
            offsets: [[GatherSlot::default(); SIMD_WIDTH]; MAX_VERTS_PER_PRIM],
            need_offsets: false,
            prims_assembled: 0,
            head_vertex: 0,
            tail_vertex: 0,
            cur_vertex: 0,
            fed_batch: 0,
            prim_id: WideU32::lane_sequence(),
            process_cut_verts,
            vert: [0; MAX_VERTS_PER_PRIM],
            cur_index: 0,
            reverse_winding: false,
            adj_extra_vert: None,
        })
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    /// True when accepting another vertex batch would overwrite vertices
    /// still referenced by unretired primitive state. The caller must
    /// check this before each feed.
    pub fn is_store_full(&self) -> bool {
        (self.head_vertex + SIMD_WIDTH) % self.num_verts == self.tail_vertex
    }

    fn is_cut_index(&self, vertex: usize) -> bool {
        self.cut_masks[vertex / SIMD_WIDTH].bit(vertex % SIMD_WIDTH)
    }

    /// Discard in-flight topology state; the next vertex begins a fresh,
    /// unconnected primitive sequence.
    fn restart_topology(&mut self) {
        self.cur_index = 0;
        self.reverse_winding = false;
        self.adj_extra_vert = None;
    }

    /// Consume unprocessed vertices until the batch holds `SIMD_WIDTH`
    /// primitives, input runs out, or the read cursor catches the writer.
    fn process_verts(&mut self) {
        while self.prims_assembled != SIMD_WIDTH
            && self.remaining_verts > 0
            && self.cur_vertex != self.head_vertex
        {
            if self.is_cut_index(self.cur_vertex) {
                if self.process_cut_verts {
                    self.process_vert(self.cur_vertex as u32, false);
                }
                // A pending strip-adjacency primitive completes against the
                // cut before the window resets. The batch-full check keeps
                // a cut vertex that just filled the batch from emitting a
                // ninth lane.
                if self.adj_extra_vert.is_some() && self.prims_assembled < SIMD_WIDTH {
                    self.process_vert(self.cur_vertex as u32, true);
                }
                self.restart_topology();
            } else {
                self.process_vert(self.cur_vertex as u32, false);
            }

            self.cur_vertex = (self.cur_vertex + 1) % self.num_verts;
            self.remaining_verts -= 1;
        }

        // End of draw with a strip-adjacency primitive one vertex short:
        // finish it from the held extra vertex.
        if self.prims_assembled != SIMD_WIDTH
            && self.remaining_verts == 0
            && self.adj_extra_vert.is_some()
        {
            self.process_vert(self.cur_vertex as u32, true);
        }
    }

    /// Retire the current primitive batch: everything consumed so far is
    /// released to the writer and the primitive-ID lanes advance.
    fn advance(&mut self) {
        self.tail_vertex = self.cur_vertex;
        self.prims_assembled = 0;
        self.prim_id = self.prim_id.add_splat(SIMD_WIDTH as u32);
        trace!(
            tail = self.tail_vertex,
            remaining = self.remaining_verts,
            "retired primitive batch"
        );
    }

    fn compute_offsets(&mut self) {
        for v in 0..self.verts_per_prim {
            for lane in 0..SIMD_WIDTH {
                let index = self.indices[v][lane] as usize;
                self.offsets[v][lane] = GatherSlot {
                    batch: index / SIMD_WIDTH,
                    lane: index % SIMD_WIDTH,
                };
            }
        }
    }

    fn process_vert(&mut self, index: u32, finish: bool) {
        match self.handler {
            VertexHandler::PointList => self.process_point(index),
            VertexHandler::LineList => self.process_line_list(index),
            VertexHandler::LineStrip => self.process_line_strip(index),
            VertexHandler::LineListAdj => self.process_line_list_adj(index),
            VertexHandler::LineListAdjNoGs => self.process_line_list_adj_no_gs(index),
            VertexHandler::LineStripAdj => self.process_line_strip_adj(index),
            VertexHandler::LineStripAdjNoGs => self.process_line_strip_adj_no_gs(index),
            VertexHandler::TriList => self.process_tri_list(index),
            VertexHandler::TriListAdj => self.process_tri_list_adj(index),
            VertexHandler::TriListAdjNoGs => self.process_tri_list_adj_no_gs(index),
            VertexHandler::TriStrip => self.process_tri_strip(index),
            VertexHandler::TriStripAdj { gs } => self.process_tri_strip_adj(index, finish, gs),
        }
    }

    fn process_point(&mut self, index: u32) {
        self.indices[0][self.prims_assembled] = index;
        self.prims_assembled += 1;
    }

    fn process_line_list(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 2 {
            self.indices[0][self.prims_assembled] = self.vert[0];
            self.indices[1][self.prims_assembled] = self.vert[1];
            self.prims_assembled += 1;
            self.cur_index = 0;
        }
    }

    fn process_line_strip(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 2 {
            self.indices[0][self.prims_assembled] = self.vert[0];
            self.indices[1][self.prims_assembled] = self.vert[1];
            self.prims_assembled += 1;

            // The strip continues from its trailing vertex.
            self.vert[0] = self.vert[1];
            self.cur_index = 1;
        }
    }

    fn process_line_list_adj(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 4 {
            for v in 0..4 {
                self.indices[v][self.prims_assembled] = self.vert[v];
            }
            self.prims_assembled += 1;
            self.cur_index = 0;
        }
    }

    fn process_line_list_adj_no_gs(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 4 {
            // Only the interior segment survives without a geometry stage.
            self.indices[0][self.prims_assembled] = self.vert[1];
            self.indices[1][self.prims_assembled] = self.vert[2];
            self.prims_assembled += 1;
            self.cur_index = 0;
        }
    }

    fn process_line_strip_adj(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 4 {
            for v in 0..4 {
                self.indices[v][self.prims_assembled] = self.vert[v];
            }
            self.prims_assembled += 1;

            self.vert[0] = self.vert[1];
            self.vert[1] = self.vert[2];
            self.vert[2] = self.vert[3];
            self.cur_index = 3;
        }
    }

    fn process_line_strip_adj_no_gs(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 4 {
            self.indices[0][self.prims_assembled] = self.vert[1];
            self.indices[1][self.prims_assembled] = self.vert[2];
            self.prims_assembled += 1;

            self.vert[0] = self.vert[1];
            self.vert[1] = self.vert[2];
            self.vert[2] = self.vert[3];
            self.cur_index = 3;
        }
    }

    fn process_tri_list(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 3 {
            for v in 0..3 {
                self.indices[v][self.prims_assembled] = self.vert[v];
            }
            self.prims_assembled += 1;
            self.cur_index = 0;
        }
    }

    fn process_tri_list_adj(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 6 {
            for v in 0..6 {
                self.indices[v][self.prims_assembled] = self.vert[v];
            }
            self.prims_assembled += 1;
            self.cur_index = 0;
        }
    }

    fn process_tri_list_adj_no_gs(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 6 {
            // Core triangle occupies the even slots of the adjacency form.
            self.indices[0][self.prims_assembled] = self.vert[0];
            self.indices[1][self.prims_assembled] = self.vert[2];
            self.indices[2][self.prims_assembled] = self.vert[4];
            self.prims_assembled += 1;
            self.cur_index = 0;
        }
    }

    fn process_tri_strip(&mut self, index: u32) {
        self.vert[self.cur_index] = index;
        self.cur_index += 1;
        if self.cur_index == 3 {
            self.indices[0][self.prims_assembled] = self.vert[0];
            if self.reverse_winding {
                self.indices[1][self.prims_assembled] = self.vert[2];
                self.indices[2][self.prims_assembled] = self.vert[1];
            } else {
                self.indices[1][self.prims_assembled] = self.vert[1];
                self.indices[2][self.prims_assembled] = self.vert[2];
            }
            self.prims_assembled += 1;

            self.vert[0] = self.vert[1];
            self.vert[1] = self.vert[2];
            self.cur_index = 2;
            self.reverse_winding = !self.reverse_winding;
        }
    }

    /// Emit one triangle-strip-adjacency primitive from the six-slot
    /// window. Without a geometry stage only the core corners (window
    /// slots 0/2/4) are emitted, and the window is massaged so the slide
    /// in the caller still sees the full-form slot roles.
    fn assemble_tri_strip_adj(&mut self, gs: bool) {
        if !gs {
            self.vert[1] = self.vert[2];
            self.vert[2] = self.vert[4];

            self.indices[0][self.prims_assembled] = self.vert[0];
            self.indices[1][self.prims_assembled] = self.vert[1];
            self.indices[2][self.prims_assembled] = self.vert[2];

            self.vert[4] = self.vert[2];
            self.vert[2] = self.vert[1];
        } else {
            for v in 0..6 {
                self.indices[v][self.prims_assembled] = self.vert[v];
            }
        }
        self.prims_assembled += 1;
    }

    /// Slide the six-slot window into the next primitive's layout. The
    /// adjacency strip shares vertices between consecutive primitives in a
    /// pattern offset from a plain strip, and the roles swap with winding
    /// parity.
    fn reorder_tri_strip_adj(&mut self, extra: u32) {
        let mut next = self.vert;
        if self.reverse_winding {
            next[0] = self.vert[4];
            next[1] = self.vert[0];
            next[2] = self.vert[2];
            next[4] = self.vert[3];
            next[5] = extra;
        } else {
            next[0] = self.vert[2];
            next[1] = extra;
            next[2] = self.vert[3];
            next[4] = self.vert[4];
            next[5] = self.vert[0];
        }
        self.vert = next;
        self.reverse_winding = !self.reverse_winding;
    }

    fn process_tri_strip_adj(&mut self, index: u32, finish: bool, gs: bool) {
        // Last primitive of the strip: the held extra vertex fills the
        // final adjacency slot.
        if finish {
            if let Some(extra) = self.adj_extra_vert {
                self.vert[3] = extra;
                self.assemble_tri_strip_adj(gs);
                self.adj_extra_vert = None;
            }
            return;
        }

        match self.cur_index {
            0 | 1 | 2 | 4 => {
                self.vert[self.cur_index] = index;
                self.cur_index += 1;
            }
            3 => {
                self.vert[5] = index;
                self.cur_index += 1;
            }
            5 => {
                match self.adj_extra_vert {
                    None => self.adj_extra_vert = Some(index),
                    Some(extra) => {
                        self.vert[3] = index;
                        if !gs {
                            self.assemble_tri_strip_adj(false);
                            self.reorder_tri_strip_adj(extra);
                            self.adj_extra_vert = None;
                        } else {
                            self.cur_index += 1;
                        }
                    }
                }
            }
            6 => {
                let extra = self
                    .adj_extra_vert
                    .expect("strip-adjacency window reached slot 6 without a held vertex");
                self.assemble_tri_strip_adj(gs);
                self.reorder_tri_strip_adj(extra);
                self.adj_extra_vert = Some(index);
                self.cur_index -= 1;
            }
            _ => unreachable!("strip-adjacency window cursor out of range"),
        }
    }
}

impl PrimitiveAssembler for CutAssembler {
    fn has_work(&self) -> bool {
        self.remaining_verts > 0 || self.adj_extra_vert.is_some()
    }

    fn simd_vector(&self, _batch: usize, _slot: usize) -> &WideVec4 {
        panic!("per-batch vector access is not supported by the cut-aware assembler");
    }

    fn assemble(&mut self, slot: usize, out: &mut [WideVec4]) -> bool {
        self.process_verts();

        // Not enough primitives yet and more input can still arrive: ask
        // for it. A full store counts as "no more input": cut-dense
        // streams can exhaust the ring before a whole batch assembles, and
        // the partial batch must drain so the tail can release vertices.
        if self.prims_assembled != SIMD_WIDTH && self.remaining_verts > 0 && !self.is_store_full()
        {
            return false;
        }

        if self.need_offsets {
            self.compute_offsets();
            self.need_offsets = false;
        }

        debug_assert!(out.len() >= self.verts_per_prim);
        for v in 0..self.verts_per_prim {
            for lane in 0..SIMD_WIDTH {
                let src = self.offsets[v][lane];
                for c in 0..4 {
                    out[v].v[c].0[lane] = self.store.component(src.batch, slot, c, src.lane);
                }
            }
        }
        true
    }

    fn assemble_single(&mut self, slot: usize, prim_index: usize, out: &mut [Vec4]) {
        debug_assert!(prim_index < SIMD_WIDTH);
        if self.need_offsets {
            self.compute_offsets();
            self.need_offsets = false;
        }
        debug_assert!(out.len() >= self.verts_per_prim);
        for (v, vert) in out.iter_mut().take(self.verts_per_prim).enumerate() {
            let src = self.offsets[v][prim_index];
            *vert = self.store.attr(src.batch, slot).lane(src.lane);
        }
    }

    fn next_prim(&mut self) -> bool {
        if self.prims_assembled == SIMD_WIDTH || self.remaining_verts <= 0 || self.is_store_full()
        {
            self.advance();
        }
        false
    }

    fn next_vs_output(&mut self) -> &mut [WideVec4] {
        let batch = self.head_vertex / SIMD_WIDTH;
        self.fed_batch = batch;
        self.head_vertex = (self.head_vertex + SIMD_WIDTH) % self.num_verts;
        self.need_offsets = true;
        self.store.batch_mut(batch)
    }

    fn next_vs_cut_mask(&mut self) -> &mut LaneMask {
        &mut self.cut_masks[self.fed_batch]
    }

    fn next_stream_output(&mut self) -> bool {
        self.head_vertex = (self.head_vertex + SIMD_WIDTH) % self.num_verts;
        self.need_offsets = true;
        self.has_work()
    }

    fn num_prims(&self) -> usize {
        self.prims_assembled
    }

    fn reset(&mut self) {
        self.remaining_verts = i64::from(self.total_verts);
        self.prims_assembled = 0;
        self.cur_index = 0;
        self.cur_vertex = 0;
        self.tail_vertex = 0;
        self.head_vertex = 0;
        self.fed_batch = 0;
        self.reverse_winding = false;
        self.adj_extra_vert = None;
        self.prim_id = WideU32::lane_sequence();
    }

    fn prim_id(&self, start_id: u32) -> WideU32 {
        self.prim_id.add_splat(start_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::RING_BATCHES;

    fn encode(id: usize, c: usize) -> f32 {
        (id * 8 + c) as f32
    }

    fn decode(value: f32) -> usize {
        value as usize / 8
    }

    fn new_cut(
        topology: PrimitiveTopology,
        total_verts: usize,
        gs_enabled: bool,
        process_cut_verts: bool,
    ) -> CutAssembler {
        CutAssembler::new(
            topology,
            RING_BATCHES * SIMD_WIDTH,
            1,
            total_verts as u32,
            gs_enabled,
            process_cut_verts,
        )
        .unwrap()
    }

    /// Drive a draw of sequential vertex ids with cut marks at `cuts`,
    /// returning each assembled primitive as its vertex ids.
    fn drive(pa: &mut CutAssembler, total_verts: usize, cuts: &[usize]) -> Vec<Vec<usize>> {
        let vpp = pa.verts_per_prim;
        let mut out = vec![WideVec4::ZERO; vpp];
        let mut prims = Vec::new();
        let mut fed = 0usize;

        while pa.has_work() {
            if pa.assemble(0, &mut out) {
                for p in 0..pa.num_prims() {
                    prims.push((0..vpp).map(|v| decode(out[v].v[0].0[p])).collect());
                }
                pa.next_prim();
            } else {
                assert!(!pa.is_store_full(), "feed stalled with batch incomplete");
                let batch = pa.next_vs_output();
                for lane in 0..SIMD_WIDTH {
                    let id = fed + lane;
                    batch[0].set_lane(
                        lane,
                        [encode(id, 0), encode(id, 1), encode(id, 2), encode(id, 3)],
                    );
                }
                let mask = pa.next_vs_cut_mask();
                mask.clear_all();
                for &cut in cuts {
                    if cut >= fed && cut < fed + SIMD_WIDTH {
                        mask.set(cut - fed);
                    }
                }
                fed += SIMD_WIDTH;
            }
        }
        prims
    }

    #[test]
    fn tri_list_spans_batches() {
        let mut pa = new_cut(PrimitiveTopology::TriangleList, 16, false, false);
        let prims = drive(&mut pa, 16, &[]);
        assert_eq!(prims.len(), 5);
        assert_eq!(prims[0], vec![0, 1, 2]);
        assert_eq!(prims[2], vec![6, 7, 8]);
        assert_eq!(prims[4], vec![12, 13, 14]);
    }

    #[test]
    fn tri_strip_winding_alternates() {
        let mut pa = new_cut(PrimitiveTopology::TriangleStrip, 5, false, false);
        let prims = drive(&mut pa, 5, &[]);
        assert_eq!(prims, vec![vec![0, 1, 2], vec![1, 3, 2], vec![2, 3, 4]]);
    }

    #[test]
    fn cut_before_first_primitive_suppresses_it() {
        // Strip [0, 1, 2, 3] with vertex 2 cut: nothing may span the cut,
        // and vertex 3 alone cannot finish a fresh strip.
        let mut pa = new_cut(PrimitiveTopology::TriangleStrip, 4, false, false);
        let prims = drive(&mut pa, 4, &[2]);
        assert!(prims.is_empty());
    }

    #[test]
    fn cut_restarts_strip() {
        let mut pa = new_cut(PrimitiveTopology::TriangleStrip, 6, false, false);
        let prims = drive(&mut pa, 6, &[2]);
        // Fresh strip from vertex 3, un-reversed winding.
        assert_eq!(prims, vec![vec![3, 4, 5]]);
    }

    #[test]
    fn cut_after_primitive_keeps_it() {
        let mut pa = new_cut(PrimitiveTopology::TriangleStrip, 7, false, false);
        let prims = drive(&mut pa, 7, &[3]);
        assert_eq!(prims, vec![vec![0, 1, 2], vec![4, 5, 6]]);
    }

    #[test]
    fn consecutive_and_leading_cuts() {
        let mut pa = new_cut(PrimitiveTopology::TriangleList, 9, false, false);
        // Cuts at 0 and 1 leave vertices 2..9; the list regroups from 2.
        let prims = drive(&mut pa, 9, &[0, 1]);
        assert_eq!(prims, vec![vec![2, 3, 4], vec![5, 6, 7]]);
    }

    #[test]
    fn cut_point_skipped_by_default_but_processed_on_request() {
        let mut pa = new_cut(PrimitiveTopology::PointList, 4, false, false);
        let prims = drive(&mut pa, 4, &[1]);
        assert_eq!(prims, vec![vec![0], vec![2], vec![3]]);

        // With cut processing on, the marked vertex is fed through before
        // the restart and still emits.
        let mut pa = new_cut(PrimitiveTopology::PointList, 4, false, true);
        let prims = drive(&mut pa, 4, &[1]);
        assert_eq!(prims, vec![vec![0], vec![1], vec![2], vec![3]]);
    }

    #[test]
    fn line_strip_adj_slides_full_window() {
        let mut pa = new_cut(PrimitiveTopology::LineStripAdj, 6, true, false);
        let prims = drive(&mut pa, 6, &[]);
        assert_eq!(
            prims,
            vec![vec![0, 1, 2, 3], vec![1, 2, 3, 4], vec![2, 3, 4, 5]]
        );
    }

    #[test]
    fn line_strip_adj_no_gs_keeps_interior_segment() {
        let mut pa = new_cut(PrimitiveTopology::LineStripAdj, 6, false, false);
        let prims = drive(&mut pa, 6, &[]);
        assert_eq!(prims, vec![vec![1, 2], vec![2, 3], vec![3, 4]]);
    }

    #[test]
    fn line_list_adj_groups_of_four() {
        let mut pa = new_cut(PrimitiveTopology::LineListAdj, 8, true, false);
        let prims = drive(&mut pa, 8, &[]);
        assert_eq!(prims, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);

        let mut pa = new_cut(PrimitiveTopology::LineListAdj, 8, false, false);
        let prims = drive(&mut pa, 8, &[]);
        assert_eq!(prims, vec![vec![1, 2], vec![5, 6]]);
    }

    #[test]
    fn tri_list_adj_no_gs_keeps_core_corners() {
        let mut pa = new_cut(PrimitiveTopology::TriangleListAdj, 12, false, false);
        let prims = drive(&mut pa, 12, &[]);
        assert_eq!(prims, vec![vec![0, 2, 4], vec![6, 8, 10]]);
    }

    #[test]
    fn tri_list_adj_gs_keeps_all_six() {
        let mut pa = new_cut(PrimitiveTopology::TriangleListAdj, 6, true, false);
        let prims = drive(&mut pa, 6, &[]);
        assert_eq!(prims, vec![vec![0, 1, 2, 3, 4, 5]]);
    }

    #[test]
    fn tri_strip_adj_no_gs_first_prim_uses_even_verts() {
        let mut pa = new_cut(PrimitiveTopology::TriangleStripAdj, 7, false, false);
        let prims = drive(&mut pa, 7, &[]);
        assert_eq!(prims, vec![vec![0, 2, 4]]);
    }

    #[test]
    fn tri_strip_adj_no_gs_winding_flips() {
        let mut pa = new_cut(PrimitiveTopology::TriangleStripAdj, 9, false, false);
        let prims = drive(&mut pa, 9, &[]);
        assert_eq!(prims, vec![vec![0, 2, 4], vec![2, 6, 4]]);
    }

    #[test]
    fn tri_strip_adj_gs_full_footprint() {
        let mut pa = new_cut(PrimitiveTopology::TriangleStripAdj, 9, true, false);
        let prims = drive(&mut pa, 9, &[]);
        // First primitive reads its adjacency slots out of stream order;
        // the finish step fills the last slot from the held vertex.
        assert_eq!(
            prims,
            vec![vec![0, 1, 2, 6, 4, 3], vec![2, 5, 6, 7, 4, 0]]
        );
    }

    #[test]
    fn tri_strip_adj_cut_resets_window() {
        // Seven vertices complete one adjacency primitive; a cut right
        // after must not leak window state into the next strip.
        let mut pa = new_cut(PrimitiveTopology::TriangleStripAdj, 15, false, false);
        let prims = drive(&mut pa, 15, &[7]);
        assert_eq!(prims[0], vec![0, 2, 4]);
        // Fresh strip over vertices 8..15.
        assert_eq!(prims[1], vec![8, 10, 12]);
        assert_eq!(prims.len(), 2);
    }

    #[test]
    fn tri_strip_adj_cut_finishes_pending_primitive() {
        // The cut lands while the strip still owes its final vertex; the
        // held extra vertex completes the primitive before the restart.
        let mut pa = new_cut(PrimitiveTopology::TriangleStripAdj, 14, false, false);
        let prims = drive(&mut pa, 14, &[6]);
        assert_eq!(prims, vec![vec![0, 2, 4], vec![7, 9, 11]]);
    }

    #[test]
    fn prim_ids_advance_by_batch_width() {
        let mut pa = new_cut(PrimitiveTopology::PointList, 16, false, false);
        let mut out = vec![WideVec4::ZERO; 1];

        // First batch: 8 points.
        assert!(!pa.assemble(0, &mut out));
        let batch = pa.next_vs_output();
        for lane in 0..SIMD_WIDTH {
            batch[0].set_lane(lane, [lane as f32, 0.0, 0.0, 0.0]);
        }
        assert!(pa.assemble(0, &mut out));
        assert_eq!(pa.prim_id(100).0[0], 100);
        assert_eq!(pa.prim_id(100).0[7], 107);
        pa.next_prim();
        assert_eq!(pa.prim_id(100).0[0], 108);
    }

    #[test]
    fn assemble_idempotent_and_single_matches() {
        let mut pa = new_cut(PrimitiveTopology::TriangleList, 6, false, false);
        let prims = drive(&mut pa, 6, &[]);
        assert_eq!(prims.len(), 2);

        // The retired batch's offsets stay cached; re-extract one lane.
        let mut single = [[0.0f32; 4]; 3];
        pa.assemble_single(0, 1, &mut single);
        assert_eq!(decode(single[0][0]), 3);
        assert_eq!(decode(single[2][0]), 5);
    }

    #[test]
    fn store_full_predicate_blocks_and_releases() {
        let mut pa =
            CutAssembler::new(PrimitiveTopology::PointList, 2 * SIMD_WIDTH, 1, 32, false, false)
                .unwrap();
        assert!(!pa.is_store_full());
        let _ = pa.next_vs_output();
        // One batch in flight, none consumed: the second batch would catch
        // the tail.
        assert!(pa.is_store_full());

        let mut out = vec![WideVec4::ZERO; 1];
        assert!(pa.assemble(0, &mut out));
        pa.next_prim();
        assert!(!pa.is_store_full());
    }

    #[test]
    #[should_panic(expected = "not supported")]
    fn simd_vector_access_is_a_contract_violation() {
        let pa = new_cut(PrimitiveTopology::PointList, 8, false, false);
        let _ = pa.simd_vector(0, 0);
    }

    #[test]
    fn reset_reuses_the_assembler() {
        let mut pa = new_cut(PrimitiveTopology::LineList, 4, false, false);
        let prims = drive(&mut pa, 4, &[]);
        assert_eq!(prims, vec![vec![0, 1], vec![2, 3]]);

        pa.reset();
        assert!(pa.has_work());
        let prims = drive(&mut pa, 4, &[]);
        assert_eq!(prims, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn misaligned_ring_is_rejected() {
        let err = CutAssembler::new(PrimitiveTopology::PointList, 12, 1, 8, false, false);
        assert_eq!(err.err(), Some(PaError::MisalignedRing(12)));
    }
}
