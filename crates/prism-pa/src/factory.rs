//! Assembler selection and construction.

use bitflags::bitflags;
use prism_wide::{LaneMask, Vec4, WideU32, WideVec4, SIMD_WIDTH};
use tracing::debug;

use crate::assembler::PrimitiveAssembler;
use crate::cut::CutAssembler;
use crate::opt::OptAssembler;
use crate::topology::{PrimitiveTopology, MAX_VERTS_PER_PRIM};
use crate::PaError;

/// Vertex-ring capacity in batches.
///
/// The window of any supported primitive fits in `MAX_VERTS_PER_PRIM`
/// batches; the extra batch is the slack the full/empty predicate consumes,
/// so a full `SIMD_WIDTH` of six-vertex primitives can be in flight without
/// stalling the feed.
pub const RING_BATCHES: usize = MAX_VERTS_PER_PRIM + 1;

bitflags! {
    /// Draw-level switches consumed by assembler selection.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DrawFlags: u32 {
        /// The draw reads an index buffer, so strip-cut markers may occur.
        const INDEXED = 1 << 0;
        /// A geometry stage consumes the assembled primitives; adjacency
        /// vertices must be retained for it.
        const GS_ENABLED = 1 << 1;
        /// Feed cut-marked vertices through the topology handler before
        /// restarting (a geometry stage receives valid vertices on every
        /// index; a fetch stage sends garbage on cuts).
        const PROCESS_CUT_VERTS = 1 << 2;
    }
}

/// Everything assembler selection needs from the draw state.
#[derive(Clone, Copy, Debug)]
pub struct AssemblyConfig {
    pub topology: PrimitiveTopology,
    pub flags: DrawFlags,
    /// Attribute slots per vertex.
    pub num_attrs: usize,
    /// Total vertices the draw will feed.
    pub num_verts: u32,
}

/// The assembler chosen for a draw.
///
/// Indexed draws may carry strip cuts and adjacency draws need per-vertex
/// role tracking, so both take the cut-aware path (non-indexed adjacency
/// included: the optimized machine has no adjacency support). Everything
/// else takes the cheaper batch-granular machine.
pub enum PrimitiveAssembly {
    Opt(OptAssembler),
    Cut(CutAssembler),
}

impl PrimitiveAssembly {
    pub fn new(config: &AssemblyConfig) -> Result<Self, PaError> {
        if config.num_attrs == 0 {
            return Err(PaError::NoAttributes);
        }

        let indexed = config.flags.contains(DrawFlags::INDEXED);
        let gs_enabled = config.flags.contains(DrawFlags::GS_ENABLED);

        if indexed || config.topology.is_adjacency() {
            debug!(
                topology = ?config.topology,
                indexed,
                gs_enabled,
                "selecting cut-aware assembler"
            );
            let pa = CutAssembler::new(
                config.topology,
                RING_BATCHES * SIMD_WIDTH,
                config.num_attrs,
                config.num_verts,
                gs_enabled,
                config.flags.contains(DrawFlags::PROCESS_CUT_VERTS),
            )?;
            Ok(Self::Cut(pa))
        } else {
            debug!(topology = ?config.topology, "selecting optimized assembler");
            let pa = OptAssembler::new(config.topology, config.num_verts, config.num_attrs, false)?;
            Ok(Self::Opt(pa))
        }
    }

    pub fn is_cut_aware(&self) -> bool {
        matches!(self, Self::Cut(_))
    }

    /// Store-full predicate for the feed loop; the optimized ring is
    /// consumed batch-by-batch and can always accept the next one.
    pub fn is_store_full(&self) -> bool {
        match self {
            Self::Opt(_) => false,
            Self::Cut(pa) => pa.is_store_full(),
        }
    }
}

impl PrimitiveAssembler for PrimitiveAssembly {
    fn has_work(&self) -> bool {
        match self {
            Self::Opt(pa) => pa.has_work(),
            Self::Cut(pa) => pa.has_work(),
        }
    }

    fn simd_vector(&self, batch: usize, slot: usize) -> &WideVec4 {
        match self {
            Self::Opt(pa) => pa.simd_vector(batch, slot),
            Self::Cut(pa) => pa.simd_vector(batch, slot),
        }
    }

    fn assemble(&mut self, slot: usize, out: &mut [WideVec4]) -> bool {
        match self {
            Self::Opt(pa) => pa.assemble(slot, out),
            Self::Cut(pa) => pa.assemble(slot, out),
        }
    }

    fn assemble_single(&mut self, slot: usize, prim_index: usize, out: &mut [Vec4]) {
        match self {
            Self::Opt(pa) => pa.assemble_single(slot, prim_index, out),
            Self::Cut(pa) => pa.assemble_single(slot, prim_index, out),
        }
    }

    fn next_prim(&mut self) -> bool {
        match self {
            Self::Opt(pa) => pa.next_prim(),
            Self::Cut(pa) => pa.next_prim(),
        }
    }

    fn next_vs_output(&mut self) -> &mut [WideVec4] {
        match self {
            Self::Opt(pa) => pa.next_vs_output(),
            Self::Cut(pa) => pa.next_vs_output(),
        }
    }

    fn next_vs_cut_mask(&mut self) -> &mut LaneMask {
        match self {
            Self::Opt(pa) => pa.next_vs_cut_mask(),
            Self::Cut(pa) => pa.next_vs_cut_mask(),
        }
    }

    fn next_stream_output(&mut self) -> bool {
        match self {
            Self::Opt(pa) => pa.next_stream_output(),
            Self::Cut(pa) => pa.next_stream_output(),
        }
    }

    fn num_prims(&self) -> usize {
        match self {
            Self::Opt(pa) => pa.num_prims(),
            Self::Cut(pa) => pa.num_prims(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Opt(pa) => pa.reset(),
            Self::Cut(pa) => pa.reset(),
        }
    }

    fn prim_id(&self, start_id: u32) -> WideU32 {
        match self {
            Self::Opt(pa) => pa.prim_id(start_id),
            Self::Cut(pa) => pa.prim_id(start_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(topology: PrimitiveTopology, flags: DrawFlags) -> AssemblyConfig {
        AssemblyConfig {
            topology,
            flags,
            num_attrs: 2,
            num_verts: 24,
        }
    }

    #[test]
    fn indexed_draws_take_the_cut_path() {
        for topology in [
            PrimitiveTopology::PointList,
            PrimitiveTopology::TriangleStrip,
            PrimitiveTopology::TriangleStripAdj,
        ] {
            let pa = PrimitiveAssembly::new(&config(topology, DrawFlags::INDEXED)).unwrap();
            assert!(pa.is_cut_aware(), "{topology:?}");
        }
    }

    #[test]
    fn non_indexed_simple_draws_take_the_optimized_path() {
        for topology in [
            PrimitiveTopology::PointList,
            PrimitiveTopology::LineList,
            PrimitiveTopology::LineStrip,
            PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip,
        ] {
            let pa = PrimitiveAssembly::new(&config(topology, DrawFlags::empty())).unwrap();
            assert!(!pa.is_cut_aware(), "{topology:?}");
        }
    }

    #[test]
    fn non_indexed_adjacency_is_forced_cut_aware() {
        for topology in [
            PrimitiveTopology::LineListAdj,
            PrimitiveTopology::LineStripAdj,
            PrimitiveTopology::TriangleListAdj,
            PrimitiveTopology::TriangleStripAdj,
        ] {
            let pa = PrimitiveAssembly::new(&config(topology, DrawFlags::empty())).unwrap();
            assert!(pa.is_cut_aware(), "{topology:?}");
        }
    }

    #[test]
    fn zero_attributes_is_rejected() {
        let mut cfg = config(PrimitiveTopology::TriangleList, DrawFlags::empty());
        cfg.num_attrs = 0;
        assert_eq!(PrimitiveAssembly::new(&cfg).err(), Some(PaError::NoAttributes));
    }
}
