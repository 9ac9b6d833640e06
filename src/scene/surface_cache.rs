//! Surface-cache component: four material atlases per submesh (color,
//! normal, PBR, emissive), baked by rasterising the submesh into each
//! atlas and persisted to a `.sc` cache file (see [`super::cache_file`]).

/// Per-axis texel resolution of a single submesh's surface-cache card.
/// Recorded in the cache file header (spec §6) alongside
/// [`SURFACE_RESOLUTION`] so a mismatched cache triggers a rebuild.
pub const SURFACE_CARD_RESOLUTION: u32 = 4;
/// Texel resolution of each of the four atlases (color/normal/pbr/emissive).
pub const SURFACE_RESOLUTION: u32 = 64;

const BYTES_PER_TEXEL: usize = 4; // RGBA8

/// The four RGBA8 atlases baked for one submesh.
#[derive(Clone, Debug)]
pub struct SubmeshSurfaceAtlases {
    pub color: Vec<u8>,
    pub normal: Vec<u8>,
    pub pbr: Vec<u8>,
    pub emissive: Vec<u8>,
}

impl SubmeshSurfaceAtlases {
    /// Allocates four zeroed atlases at [`SURFACE_RESOLUTION`].
    pub fn empty() -> Self {
        let len = (SURFACE_RESOLUTION * SURFACE_RESOLUTION) as usize * BYTES_PER_TEXEL;
        Self {
            color: vec![0; len],
            normal: vec![0; len],
            pbr: vec![0; len],
            emissive: vec![0; len],
        }
    }

    pub fn is_cached(&self) -> bool {
        !self.color.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SurfaceCache {
    pub submeshes: Vec<SubmeshSurfaceAtlases>,
    pub light_cache_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_atlases_have_expected_byte_length() {
        let atlases = SubmeshSurfaceAtlases::empty();
        let expected = (SURFACE_RESOLUTION * SURFACE_RESOLUTION) as usize * BYTES_PER_TEXEL;
        assert_eq!(atlases.color.len(), expected);
        assert_eq!(atlases.normal.len(), expected);
        assert_eq!(atlases.pbr.len(), expected);
        assert_eq!(atlases.emissive.len(), expected);
        assert!(atlases.is_cached());
    }
}
