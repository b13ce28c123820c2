//! Primitive assembly over tessellation (domain shader) output.
//!
//! Domain output arrives fully indexed: three parallel index arrays, one
//! per vertex-in-primitive slot, name the vertices of every primitive up
//! front, and the topology is always a flat list of points, lines or
//! triangles. No state machine is needed; assembly is a masked gather.
//!
//! The vertex data is borrowed, not owned: it lives in the tessellation
//! stage's output buffers, laid out attribute-major. Each attribute slot
//! holds four component rows of `stride_vectors` wide vectors, so a vertex
//! index addresses lane `i % SIMD_WIDTH` of vector `i / SIMD_WIDTH` within
//! a component row.

use prism_wide::{LaneMask, Vec4, WideF32, WideU32, WideVec4, SIMD_WIDTH};

use crate::assembler::PrimitiveAssembler;
use crate::topology::PrimitiveTopology;
use crate::PaError;

pub struct TessAssembler<'a> {
    vert_data: &'a [WideF32],
    /// Wide vectors per component row.
    stride_vectors: usize,
    num_attrs: usize,

    /// Index array per vertex-in-primitive slot; slots beyond
    /// `verts_per_prim` are unused.
    indices: [&'a [u32]; 3],
    /// Shared read position into the index arrays, advanced per retired
    /// batch.
    cursor: usize,
    remaining_prims: usize,

    verts_per_prim: usize,
    prim_id_base: WideU32,
}

impl<'a> TessAssembler<'a> {
    pub fn new(
        vert_data: &'a [WideF32],
        stride_vectors: usize,
        num_attrs: usize,
        indices: [&'a [u32]; 3],
        num_prims: usize,
        topology: PrimitiveTopology,
    ) -> Result<Self, PaError> {
        if num_attrs == 0 {
            return Err(PaError::NoAttributes);
        }
        let verts_per_prim = match topology {
            PrimitiveTopology::PointList => 1,
            PrimitiveTopology::LineList => 2,
            PrimitiveTopology::TriangleList => 3,
            other => return Err(PaError::UnsupportedTessTopology(other)),
        };
        debug_assert!(vert_data.len() >= num_attrs * 4 * stride_vectors);
        Ok(Self {
            vert_data,
            stride_vectors,
            num_attrs,
            indices,
            cursor: 0,
            remaining_prims: num_prims,
            verts_per_prim,
            prim_id_base: WideU32::ZERO,
        })
    }

    /// Component value of one indexed vertex.
    #[inline]
    fn component(&self, slot: usize, component: usize, vertex: usize) -> f32 {
        let row = (slot * 4 + component) * self.stride_vectors;
        self.vert_data[row + vertex / SIMD_WIDTH].0[vertex % SIMD_WIDTH]
    }
}

impl PrimitiveAssembler for TessAssembler<'_> {
    fn has_work(&self) -> bool {
        self.remaining_prims != 0
    }

    fn simd_vector(&self, _batch: usize, _slot: usize) -> &WideVec4 {
        panic!("per-batch vector access is not supported by the tessellation assembler");
    }

    fn assemble(&mut self, slot: usize, out: &mut [WideVec4]) -> bool {
        debug_assert!(slot < self.num_attrs);
        let num_prims = self.num_prims();
        if num_prims == 0 {
            return false;
        }

        // Lanes past the remaining count gather nothing and zero-fill; the
        // index arrays are never read past the draw's primitive count.
        let mask = LaneMask::first_n(num_prims);
        debug_assert!(out.len() >= self.verts_per_prim);
        for v in 0..self.verts_per_prim {
            let idx_row = &self.indices[v][self.cursor..];
            for c in 0..4 {
                for lane in 0..SIMD_WIDTH {
                    out[v].v[c].0[lane] = if mask.bit(lane) {
                        self.component(slot, c, idx_row[lane] as usize)
                    } else {
                        0.0
                    };
                }
            }
        }
        true
    }

    fn assemble_single(&mut self, slot: usize, prim_index: usize, out: &mut [Vec4]) {
        debug_assert!(slot < self.num_attrs);
        debug_assert!(prim_index < self.num_prims());
        debug_assert!(out.len() >= self.verts_per_prim);
        for (v, vert) in out.iter_mut().take(self.verts_per_prim).enumerate() {
            let vertex = self.indices[v][self.cursor + prim_index] as usize;
            for (c, value) in vert.iter_mut().enumerate() {
                *value = self.component(slot, c, vertex);
            }
        }
    }

    fn next_prim(&mut self) -> bool {
        let consumed = self.num_prims();
        self.remaining_prims -= consumed;
        self.cursor += consumed;
        self.has_work()
    }

    fn next_vs_output(&mut self) -> &mut [WideVec4] {
        panic!("the tessellation assembler reads pre-indexed domain output, not a vertex feed");
    }

    fn next_vs_cut_mask(&mut self) -> &mut LaneMask {
        panic!("the tessellation assembler has no restart semantics");
    }

    fn next_stream_output(&mut self) -> bool {
        panic!("the tessellation assembler has no stream-output feed");
    }

    fn num_prims(&self) -> usize {
        self.remaining_prims.min(SIMD_WIDTH)
    }

    fn reset(&mut self) {
        panic!("tessellation assemblers are constructed per patch batch, not reused");
    }

    fn prim_id(&self, start_id: u32) -> WideU32 {
        self.prim_id_base.add_splat(start_id)
    }
}
