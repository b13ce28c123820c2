//! Optimized, non-cut-aware primitive assembly.
//!
//! This variant works at batch granularity: the per-topology logic decides,
//! once per fed vertex batch, whether enough batches are stored to emit a
//! full `SIMD_WIDTH` of primitives, and which stored lanes each primitive
//! pulls from. Strips reuse the trailing vertices of the previous batch to
//! start the next primitive, so transitions branch on batch boundaries, not
//! vertex counts.
//!
//! It must only be used for draws that cannot contain strip cuts; the
//! factory routes indexed draws and adjacency topologies to the cut-aware
//! assembler instead.

use prism_wide::{LaneMask, Vec4, WideU32, WideVec4, SIMD_WIDTH};

use crate::assembler::PrimitiveAssembler;
use crate::store::VertexStore;
use crate::topology::{PrimitiveTopology, MAX_VERTS_PER_PRIM};
use crate::PaError;

/// Assembly phase. Collect phases bank incoming batches; emit phases gather
/// a full batch of primitives from the banked ring slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OptPhase {
    PointEmit,
    LineCollect,
    LineEmit,
    LineStripStart,
    LineStripEmit,
    TriCollect0,
    TriCollect1,
    TriEmit,
    TriStripStart,
    TriStripEmit,
}

/// State staged by the current phase and committed by `next_prim`.
///
/// Staging keeps `assemble` idempotent: the transition is decided while the
/// batch is assembled but nothing moves until the caller retires it.
#[derive(Clone, Copy, Debug)]
struct Staged {
    phase: OptPhase,
    simd_prims: u32,
    prims_increment: u32,
    ring_restart: bool,
}

pub struct OptAssembler {
    store: VertexStore,
    topology: PrimitiveTopology,

    total_prims: u32,
    prims_complete: u32,
    /// Extra full primitive batches still extractable from the stored
    /// vertices without new input.
    simd_prims: u32,

    /// Ring slot of the current (most recently fed) batch.
    cur: usize,
    /// Ring slot of the previous batch; strips read across the pair.
    prev: usize,
    /// Fed-batch counter; the ring slot is `counter % num_batches`.
    counter: u32,
    restart_pending: bool,

    phase: OptPhase,
    staged: Staged,

    prim_id_base: WideU32,
    prim_id_step: u32,

    /// Stream-output mode never restarts the ring counter.
    streaming: bool,

    /// Returned by the cut-mask feed point, which this variant ignores.
    scratch_mask: LaneMask,
}

impl OptAssembler {
    /// `num_verts` is the draw's vertex count; the primitive total and the
    /// initial phase derive from it and the topology.
    pub fn new(
        topology: PrimitiveTopology,
        num_verts: u32,
        num_attrs: usize,
        streaming: bool,
    ) -> Result<Self, PaError> {
        if num_attrs == 0 {
            return Err(PaError::NoAttributes);
        }
        let phase = Self::initial_phase(topology)?;
        Ok(Self {
            store: VertexStore::new(MAX_VERTS_PER_PRIM, num_attrs),
            topology,
            total_prims: topology.prim_count(num_verts),
            prims_complete: 0,
            simd_prims: 0,
            cur: 0,
            prev: 0,
            counter: 0,
            restart_pending: false,
            phase,
            staged: Staged {
                phase,
                simd_prims: 0,
                prims_increment: 0,
                ring_restart: false,
            },
            prim_id_base: WideU32::lane_sequence(),
            prim_id_step: topology.prim_id_step(),
            streaming,
            scratch_mask: LaneMask::EMPTY,
        })
    }

    fn initial_phase(topology: PrimitiveTopology) -> Result<OptPhase, PaError> {
        Ok(match topology {
            PrimitiveTopology::PointList => OptPhase::PointEmit,
            PrimitiveTopology::LineList => OptPhase::LineCollect,
            PrimitiveTopology::LineStrip => OptPhase::LineStripStart,
            PrimitiveTopology::TriangleList => OptPhase::TriCollect0,
            PrimitiveTopology::TriangleStrip => OptPhase::TriStripStart,
            other => return Err(PaError::UnsupportedOptTopology(other)),
        })
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.topology
    }

    fn stage(&mut self, phase: OptPhase, simd_prims: u32, prims_increment: u32, ring_restart: bool) {
        self.staged = Staged {
            phase,
            simd_prims,
            prims_increment,
            ring_restart,
        };
    }

    /// Vertices an assembled primitive carries in this variant (no
    /// adjacency topologies reach it, so the GS flag is irrelevant).
    fn verts_per_prim(&self) -> usize {
        self.topology.verts_per_prim(false)
    }

    /// Ring source `(batch, lane)` for vertex `v` of primitive lane `p` in
    /// the current emit phase.
    ///
    /// List emits read absolute ring slots `0..n`; the ring restart staged
    /// alongside each list emit guarantees the group's batches landed
    /// there. Strip emits read across the `prev`/`cur` pair. Odd triangle-
    /// strip lanes swap their second and third vertex roles so winding
    /// stays front-facing; `SIMD_WIDTH` is even, so lane parity equals
    /// global primitive parity and the pattern holds in steady state.
    fn prim_source(&self, p: usize, v: usize) -> (usize, usize) {
        match self.phase {
            OptPhase::PointEmit => (self.cur, p),
            OptPhase::LineEmit => {
                let pos = 2 * p + v;
                (pos / SIMD_WIDTH, pos % SIMD_WIDTH)
            }
            OptPhase::TriEmit => {
                let pos = 3 * p + v;
                (pos / SIMD_WIDTH, pos % SIMD_WIDTH)
            }
            OptPhase::LineStripEmit => {
                let pos = p + v;
                if pos < SIMD_WIDTH {
                    (self.prev, pos)
                } else {
                    (self.cur, pos - SIMD_WIDTH)
                }
            }
            OptPhase::TriStripEmit => {
                let role = if p % 2 == 1 { [0, 2, 1][v] } else { v };
                let pos = p + role;
                if pos < SIMD_WIDTH {
                    (self.prev, pos)
                } else {
                    (self.cur, pos - SIMD_WIDTH)
                }
            }
            _ => panic!("no primitives assembled in collect phase {:?}", self.phase),
        }
    }

    fn emit(&mut self, slot: usize, out: &mut [WideVec4]) {
        let vpp = self.verts_per_prim();
        debug_assert!(out.len() >= vpp);
        for v in 0..vpp {
            for p in 0..SIMD_WIDTH {
                let (batch, lane) = self.prim_source(p, v);
                for c in 0..4 {
                    out[v].v[c].0[p] = self.store.component(batch, slot, c, lane);
                }
            }
        }
    }
}

impl PrimitiveAssembler for OptAssembler {
    fn has_work(&self) -> bool {
        self.prims_complete < self.total_prims
    }

    fn simd_vector(&self, batch: usize, slot: usize) -> &WideVec4 {
        self.store.attr(batch, slot)
    }

    fn assemble(&mut self, slot: usize, out: &mut [WideVec4]) -> bool {
        match self.phase {
            OptPhase::TriCollect0 => {
                self.stage(OptPhase::TriCollect1, 0, 0, false);
                false
            }
            OptPhase::TriCollect1 => {
                self.stage(OptPhase::TriEmit, 0, 0, false);
                false
            }
            OptPhase::TriEmit => {
                self.emit(slot, out);
                self.stage(OptPhase::TriCollect0, 0, SIMD_WIDTH as u32, true);
                true
            }
            OptPhase::TriStripStart => {
                self.stage(OptPhase::TriStripEmit, 0, 0, false);
                false
            }
            OptPhase::TriStripEmit => {
                self.emit(slot, out);
                self.stage(OptPhase::TriStripEmit, 0, SIMD_WIDTH as u32, false);
                true
            }
            OptPhase::LineCollect => {
                self.stage(OptPhase::LineEmit, 0, 0, false);
                false
            }
            OptPhase::LineEmit => {
                self.emit(slot, out);
                self.stage(OptPhase::LineCollect, 0, SIMD_WIDTH as u32, true);
                true
            }
            OptPhase::LineStripStart => {
                self.stage(OptPhase::LineStripEmit, 0, 0, false);
                false
            }
            OptPhase::LineStripEmit => {
                self.emit(slot, out);
                self.stage(OptPhase::LineStripEmit, 0, SIMD_WIDTH as u32, false);
                true
            }
            OptPhase::PointEmit => {
                self.emit(slot, out);
                self.stage(OptPhase::PointEmit, 0, SIMD_WIDTH as u32, true);
                true
            }
        }
    }

    fn assemble_single(&mut self, slot: usize, prim_index: usize, out: &mut [Vec4]) {
        let vpp = self.verts_per_prim();
        debug_assert!(out.len() >= vpp);
        debug_assert!(prim_index < SIMD_WIDTH);
        for (v, vert) in out.iter_mut().take(vpp).enumerate() {
            let (batch, lane) = self.prim_source(prim_index, v);
            *vert = self.store.attr(batch, slot).lane(lane);
        }
    }

    fn next_prim(&mut self) -> bool {
        self.phase = self.staged.phase;
        self.simd_prims = self.staged.simd_prims;
        self.prims_complete += self.staged.prims_increment;
        self.restart_pending = self.staged.ring_restart && !self.streaming;

        let mut more = false;
        if self.simd_prims > 0 {
            more = true;
            self.simd_prims -= 1;
        } else {
            self.counter = if self.restart_pending {
                0
            } else {
                self.counter + 1
            };
            self.restart_pending = false;
        }

        if !self.has_work() {
            more = false;
        }
        more
    }

    fn next_vs_output(&mut self) -> &mut [WideVec4] {
        let num_batches = self.store.num_batches();
        self.prev = self.cur;
        self.cur = self.counter as usize % num_batches;
        self.store.batch_mut(self.cur)
    }

    fn next_vs_cut_mask(&mut self) -> &mut LaneMask {
        // This variant is never used with cuts; hand back scratch so the
        // shared feed loop stays uniform.
        &mut self.scratch_mask
    }

    fn next_stream_output(&mut self) -> bool {
        self.prev = self.cur;
        self.cur = self.counter as usize % self.store.num_batches();
        self.has_work()
    }

    fn num_prims(&self) -> usize {
        let pending = self.prims_complete + self.staged.prims_increment;
        if pending > self.total_prims {
            SIMD_WIDTH - (pending - self.total_prims) as usize
        } else {
            SIMD_WIDTH
        }
    }

    fn reset(&mut self) {
        let phase = Self::initial_phase(self.topology).expect("topology validated at construction");
        self.phase = phase;
        self.staged = Staged {
            phase,
            simd_prims: 0,
            prims_increment: 0,
            ring_restart: false,
        };
        self.prims_complete = 0;
        self.simd_prims = 0;
        self.cur = 0;
        self.prev = 0;
        self.counter = 0;
        self.restart_pending = false;
    }

    fn prim_id(&self, start_id: u32) -> WideU32 {
        let batches_retired = self.prims_complete / SIMD_WIDTH as u32;
        self.prim_id_base
            .add_splat(start_id + self.prim_id_step * batches_retired)
    }
}
