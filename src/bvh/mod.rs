//! Bounding volume hierarchy construction and traversal, and mesh
//! simplification.
//!
//! Three build strategies are offered, selected by [`SplitMethod`]:
//! top-down surface-area-heuristic (best quality, most expensive),
//! HLBVH (Morton-code radix sort into treelets built in parallel, then
//! stitched with an upper-level SAH pass — fastest for huge primitive
//! counts), and locally-ordered clustering (the fast default, a
//! Morton-order agglomerative build with no recursion).

mod build;
mod morton;
mod simplify;
mod traversal;

pub use build::{BvhAccel, BvhNode, Primitive, SplitMethod};
pub use morton::morton3;
pub use simplify::{MeshSimplifier, SimplifyTarget};
pub use traversal::{Hit, MAX_TRAVERSAL_STACK};
