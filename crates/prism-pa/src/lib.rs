//! Primitive assembly for the software raster frontend.
//!
//! The shader stages produce vertices in batches of `SIMD_WIDTH` lanes; the
//! clipper and binner consume *primitives* (points, lines, triangles and
//! their adjacency forms). This crate sits between the two: per-topology
//! state machines group the vertex stream into primitives, up to
//! `SIMD_WIDTH` of them at a time, without copying vertex data until the
//! final per-primitive gather.
//!
//! Three assembler variants cover the frontend's input shapes:
//!
//! - [`opt::OptAssembler`]: a batch-granular state machine for draws that
//!   cannot contain strip cuts (non-indexed, non-adjacency topologies).
//! - [`cut::CutAssembler`]: a vertex-granular state machine that honors
//!   strip-cut ("primitive restart") marks and tracks the exact vertex
//!   roles adjacency topologies need.
//! - [`tess::TessAssembler`]: a flat gather over already-indexed
//!   tessellation (domain shader) output.
//!
//! [`factory::PrimitiveAssembly`] picks between the first two from the draw
//! configuration; the tessellation stage constructs the third directly.

use thiserror::Error;

pub mod assembler;
pub mod cut;
pub mod factory;
pub mod opt;
pub mod store;
pub mod tess;
pub mod topology;

pub use assembler::PrimitiveAssembler;
pub use factory::{AssemblyConfig, DrawFlags, PrimitiveAssembly};
pub use topology::{PrimitiveTopology, MAX_VERTS_PER_PRIM};

/// Construction-time configuration errors.
///
/// These cover bad draw state handed in by the caller. Contract violations
/// on the hot path (calling an operation a variant does not implement,
/// indexing past the assembled batch) are debug assertions, not errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaError {
    #[error("draw has no vertex attributes configured")]
    NoAttributes,

    #[error("vertex ring capacity {0} is not a whole number of vertex batches")]
    MisalignedRing(usize),

    #[error("topology {0:?} requires the cut-aware assembler")]
    UnsupportedOptTopology(PrimitiveTopology),

    #[error("tessellation output supports only flat list topologies, got {0:?}")]
    UnsupportedTessTopology(PrimitiveTopology),
}
