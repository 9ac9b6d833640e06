//! Scene core: ECS components for loaded models, their baked distance
//! fields and surface caches, the chunk grid that indexes them in world
//! space, and the systems/passes that keep all of it up to date.

pub mod bake;
pub mod cache_file;
pub mod distance_field;
pub mod events;
pub mod grid;
pub mod mesh;
pub mod surface_cache;
pub mod transform;

pub use bake::{GlobalSdfPass, SdfBakePass, SurfaceCacheBakePass};
pub use cache_file::{
    read_sdf_cache, read_surface_cache, write_sdf_cache, write_surface_cache, SdfSubmeshRecord,
};
pub use distance_field::{DistanceField, MeshDistanceField, SDF_RESOLUTION};
pub use events::{
    GenerateSdf, GenerateSurfaceCache, ModelLoad, ModelLoadSystem, ModelTransform, SceneGridSystem,
    UpdateGlobalSdf,
};
pub use grid::{Chunk, ChunkCoord, SceneGrid, CHUNK_SIZE};
pub use mesh::{
    optimize_vertex_order, LoadedModel, Material, MaterialFactors, MaterialTextures, Mesh,
    Submesh, SubmeshMaterial,
};
pub use surface_cache::{
    SubmeshSurfaceAtlases, SurfaceCache, SURFACE_CARD_RESOLUTION, SURFACE_RESOLUTION,
};
pub use transform::Transform;
