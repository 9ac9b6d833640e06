//! Model-load and transform-change events, and the systems that react
//! to them: loading a glTF model into ECS components, and keeping the
//! scene grid in sync with entity transforms.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::concurrency::ThreadPool;
use crate::ecs::{Entity, System, World};
use crate::math::{Aabb, Mat4};
use crate::rhi::backend::GltfSource;

use super::cache_file::{read_sdf_cache, read_surface_cache};
use super::distance_field::{DistanceField, MeshDistanceField};
use super::grid::SceneGrid;
use super::mesh::optimize_vertex_order;
use super::surface_cache::SubmeshSurfaceAtlases;
use super::transform::Transform;
use super::SurfaceCache;

/// Broadcast to request that `path` be loaded and wired onto `entity` as
/// `Mesh`/`Material`/`DistanceField`/`SurfaceCache` components (spec
/// §4.9).
pub struct ModelLoad {
    pub entity: Entity,
    pub path: String,
}

/// Broadcast whenever an entity's `Transform` changes; [`SceneGridSystem`]
/// reacts by moving it between grid chunks and marking them dirty.
pub struct ModelTransform {
    pub entity: Entity,
    pub new_transform: Mat4,
}

/// Broadcast after the scene grid has been touched by a transform
/// change, so a global-SDF bake pass knows its cached merge is stale.
/// Unified onto the same `EventBus` as `ComponentAssigned<T>` rather
/// than kept as a bespoke multicast-delegate type (`SPEC_FULL.md` §10.6)
pub struct UpdateGlobalSdf;

/// Broadcast to ask a bake system to begin generating `entity`'s
/// distance field (its `DistanceField` component currently holds only a
/// BVH, no cached voxels).
pub struct GenerateSdf(pub Entity);

/// Broadcast to ask a bake system to begin capturing `entity`'s
/// surface-cache atlases.
pub struct GenerateSurfaceCache(pub Entity);

fn model_name_from_path(path: &str) -> String {
    PathBuf::from(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Loads a glTF model via a [`GltfSource`], wires the submesh data into
/// `Mesh`/`Material` components, and attaches `DistanceField`/
/// `SurfaceCache` components either from an on-disk cache (spec §6) or
/// as a pending-bake placeholder (a BVH with no voxels / empty atlases).
pub struct ModelLoadSystem {
    gltf_source: Arc<dyn GltfSource>,
    pool: Arc<ThreadPool>,
    global_entity: Entity,
    sdf_asset_dir: PathBuf,
    surface_asset_dir: PathBuf,
    pending: Arc<Mutex<Vec<(Entity, String)>>>,
}

impl ModelLoadSystem {
    pub fn new(
        gltf_source: Arc<dyn GltfSource>,
        pool: Arc<ThreadPool>,
        global_entity: Entity,
        sdf_asset_dir: PathBuf,
        surface_asset_dir: PathBuf,
    ) -> Self {
        Self {
            gltf_source,
            pool,
            global_entity,
            sdf_asset_dir,
            surface_asset_dir,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn wire_model(&self, world: &mut World, entity: Entity, path: &str) {
        let loaded = match self.gltf_source.load(path) {
            Ok(loaded) => loaded,
            Err(err) => {
                log::warn!("failed to load model '{path}': {err}");
                return;
            }
        };
        let model_name = model_name_from_path(path);

        let mut mesh = loaded.mesh;
        for submesh in &mut mesh.submeshes {
            let vertex_count = submesh.positions.len();
            submesh.indices = optimize_vertex_order(&submesh.indices, vertex_count);
        }

        let submesh_count = mesh.submeshes.len();

        let distance_field = self.load_or_build_distance_field(&mesh, &model_name, submesh_count);
        let needs_sdf_bake = distance_field.submeshes.iter().any(|m| !m.is_cached());

        let surface_cache = self.load_or_build_surface_cache(&model_name, submesh_count);
        let needs_surface_bake = surface_cache
            .submeshes
            .iter()
            .any(|s| !s.is_cached());

        let mut world_aabb = Aabb::EMPTY;
        for (submesh, field) in mesh.submeshes.iter().zip(&distance_field.submeshes) {
            let (aabb, _coord_matrix) = field.get_transformed(submesh.world_matrix);
            world_aabb = world_aabb.union(&aabb);
        }

        world.assign(entity, mesh);
        world.assign(entity, loaded.material);
        world.assign(entity, distance_field);
        world.assign(entity, surface_cache);
        world.assign(entity, Transform::default());

        if let Some(grid) = world.get_mut::<SceneGrid>(self.global_entity) {
            grid.insert(entity, world_aabb);
        }

        if needs_sdf_bake {
            world.event_bus().broadcast(&GenerateSdf(entity));
        }
        if needs_surface_bake {
            world.event_bus().broadcast(&GenerateSurfaceCache(entity));
        }
    }

    fn load_or_build_distance_field(
        &self,
        mesh: &super::mesh::Mesh,
        model_name: &str,
        submesh_count: usize,
    ) -> DistanceField {
        let path = self.sdf_asset_dir.join(format!("{model_name}.sdf"));
        match read_sdf_cache(&path, submesh_count) {
            Ok(records) => DistanceField {
                submeshes: records
                    .into_iter()
                    .map(|r| MeshDistanceField {
                        sdf_texture_name: format!("{model_name}_sdf"),
                        sdf_box: Aabb::new(r.lower, r.upper),
                        sdf_data: r.voxels,
                        bvh: None,
                    })
                    .collect(),
            },
            Err(_) => DistanceField {
                submeshes: mesh
                    .submeshes
                    .iter()
                    .map(|submesh| {
                        let mut field = MeshDistanceField::build_bvh(
                            &submesh.positions,
                            &submesh.indices,
                            &self.pool,
                        );
                        field.sdf_texture_name = format!("{model_name}_sdf");
                        field
                    })
                    .collect(),
            },
        }
    }

    fn load_or_build_surface_cache(&self, model_name: &str, submesh_count: usize) -> SurfaceCache {
        let path = self.surface_asset_dir.join(format!("{model_name}.sc"));
        match read_surface_cache(&path, submesh_count) {
            Ok(atlases) => SurfaceCache {
                submeshes: atlases,
                light_cache_name: format!("{model_name}_light"),
            },
            Err(_) => SurfaceCache {
                submeshes: (0..submesh_count).map(|_| SubmeshSurfaceAtlases {
                    color: Vec::new(),
                    normal: Vec::new(),
                    pbr: Vec::new(),
                    emissive: Vec::new(),
                }).collect(),
                light_cache_name: format!("{model_name}_light"),
            },
        }
    }
}

impl System for ModelLoadSystem {
    fn name(&self) -> &str {
        "model_load"
    }

    fn init(&mut self, world: &mut World) {
        let pending = self.pending.clone();
        world.event_bus().subscribe::<ModelLoad, _>(move |ev: &ModelLoad| {
            pending.lock().push((ev.entity, ev.path.clone()));
            true
        });
    }

    fn tick(&mut self, world: &mut World, _dt: f32) {
        let requests: Vec<(Entity, String)> = std::mem::take(&mut *self.pending.lock());
        for (entity, path) in requests {
            self.wire_model(world, entity, &path);
        }
    }
}

/// Keeps the world-level [`SceneGrid`] (held as a component on the
/// global entity) in sync with entity transforms: on `ModelTransform`,
/// removes the entity from its old chunks, inserts it into the new
/// ones, marks every touched chunk dirty, and broadcasts
/// [`UpdateGlobalSdf`] (spec §4.9).
pub struct SceneGridSystem {
    global_entity: Entity,
    pending: Arc<Mutex<Vec<(Entity, Mat4)>>>,
}

impl SceneGridSystem {
    pub fn new(global_entity: Entity) -> Self {
        Self {
            global_entity,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl System for SceneGridSystem {
    fn name(&self) -> &str {
        "scene_grid"
    }

    fn init(&mut self, world: &mut World) {
        let pending = self.pending.clone();
        world
            .event_bus()
            .subscribe::<ModelTransform, _>(move |ev: &ModelTransform| {
                pending.lock().push((ev.entity, ev.new_transform));
                true
            });
    }

    fn tick(&mut self, world: &mut World, _dt: f32) {
        let updates: Vec<(Entity, Mat4)> = std::mem::take(&mut *self.pending.lock());
        if updates.is_empty() {
            return;
        }
        for (entity, new_transform) in updates {
            let world_aabb = world
                .get::<DistanceField>(entity)
                .map(|field| {
                    field
                        .submeshes
                        .iter()
                        .fold(Aabb::EMPTY, |acc, m| acc.union(&m.get_transformed(new_transform).0))
                })
                .unwrap_or(Aabb::EMPTY);

            world.assign(entity, Transform(new_transform));
            if let Some(grid) = world.get_mut::<SceneGrid>(self.global_entity) {
                grid.update_transform(entity, world_aabb);
            }
        }
        world.event_bus().broadcast(&UpdateGlobalSdf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{EngineError, Result};
    use crate::scene::mesh::{LoadedModel, Material, Mesh, Submesh};
    use crate::math::{Vec2, Vec3};

    struct FixedGltfSource;

    impl GltfSource for FixedGltfSource {
        fn load(&self, _path: &str) -> Result<LoadedModel> {
            Ok(LoadedModel {
                mesh: Mesh {
                    submeshes: vec![Submesh {
                        positions: vec![
                            Vec3::new(0.0, 0.0, 0.0),
                            Vec3::new(1.0, 0.0, 0.0),
                            Vec3::new(0.0, 1.0, 0.0),
                        ],
                        normals: vec![Vec3::Z; 3],
                        tangents: vec![Vec3::X; 3],
                        uvs: vec![Vec2::ZERO; 3],
                        indices: vec![0, 1, 2],
                        world_matrix: Mat4::IDENTITY,
                        material_index: 0,
                    }],
                },
                material: Material {
                    submeshes: vec![Default::default()],
                },
            })
        }
    }

    struct FailingGltfSource;

    impl GltfSource for FailingGltfSource {
        fn load(&self, path: &str) -> Result<LoadedModel> {
            Err(EngineError::AssetNotFound(path.to_string()))
        }
    }

    #[test]
    fn model_load_wires_components_and_requests_sdf_bake() {
        let mut world = World::new();
        let global = world.spawn();
        world.assign(global, SceneGrid::new());

        world.add_system(ModelLoadSystem::new(
            Arc::new(FixedGltfSource),
            Arc::new(ThreadPool::new(1)),
            global,
            PathBuf::from("/nonexistent/sdf"),
            PathBuf::from("/nonexistent/sc"),
        ));

        let bake_requested = Arc::new(Mutex::new(false));
        let flag = bake_requested.clone();
        world.event_bus().subscribe::<GenerateSdf, _>(move |_| {
            *flag.lock() = true;
            true
        });

        let entity = world.spawn();
        world.event_bus().broadcast(&ModelLoad {
            entity,
            path: "model.gltf".to_string(),
        });
        world.tick(1.0 / 60.0);

        assert!(world.contains::<Mesh>(entity));
        assert!(world.contains::<Material>(entity));
        assert!(world.contains::<DistanceField>(entity));
        assert!(world.contains::<SurfaceCache>(entity));
        assert!(*bake_requested.lock());
    }

    #[test]
    fn model_load_logs_and_skips_on_source_failure() {
        let mut world = World::new();
        let global = world.spawn();
        world.assign(global, SceneGrid::new());
        world.add_system(ModelLoadSystem::new(
            Arc::new(FailingGltfSource),
            Arc::new(ThreadPool::new(1)),
            global,
            PathBuf::from("/nonexistent/sdf"),
            PathBuf::from("/nonexistent/sc"),
        ));

        let entity = world.spawn();
        world.event_bus().broadcast(&ModelLoad {
            entity,
            path: "missing.gltf".to_string(),
        });
        world.tick(1.0 / 60.0);

        assert!(!world.contains::<Mesh>(entity));
    }

    #[test]
    fn scene_grid_system_moves_entity_and_broadcasts_update() {
        let mut world = World::new();
        let global = world.spawn();
        world.assign(global, SceneGrid::new());
        world.add_system(SceneGridSystem::new(global));

        let update_seen = Arc::new(Mutex::new(false));
        let flag = update_seen.clone();
        world
            .event_bus()
            .subscribe::<UpdateGlobalSdf, _>(move |_| {
                *flag.lock() = true;
                true
            });

        let entity = world.spawn();
        world.assign(
            entity,
            DistanceField {
                submeshes: vec![MeshDistanceField {
                    sdf_texture_name: String::new(),
                    sdf_box: Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0)),
                    sdf_data: Vec::new(),
                    bvh: None,
                }],
            },
        );

        world.event_bus().broadcast(&ModelTransform {
            entity,
            new_transform: Mat4::from_translation(Vec3::new(500.0, 0.0, 0.0)),
        });
        world.tick(1.0 / 60.0);

        assert!(*update_seen.lock());
        assert!(world.contains::<Transform>(entity));
    }
}
