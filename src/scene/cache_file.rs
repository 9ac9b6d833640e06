//! Binary `.sdf`/`.sc` cache file codecs (spec §6).
//!
//! Both formats are little-endian, written field-by-field with a fixed
//! header record that lets a reader detect a stale-resolution cache and
//! trigger a full rebuild (`EngineError::CacheResolutionMismatch`)
//! rather than silently misinterpreting mismatched voxel data.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::errors::{EngineError, Result};
use crate::math::Vec3;

use super::distance_field::SDF_RESOLUTION;
use super::surface_cache::{SubmeshSurfaceAtlases, SURFACE_CARD_RESOLUTION, SURFACE_RESOLUTION};

/// One submesh's baked distance field, as read from or about to be
/// written to a `.sdf` cache file.
pub struct SdfSubmeshRecord {
    pub lower: Vec3,
    pub upper: Vec3,
    pub voxels: Vec<f32>,
}

fn write_u32(w: &mut impl Write, value: u32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn write_vec3(w: &mut impl Write, v: Vec3) -> Result<()> {
    w.write_all(&v.x.to_le_bytes())?;
    w.write_all(&v.y.to_le_bytes())?;
    w.write_all(&v.z.to_le_bytes())?;
    Ok(())
}

fn read_vec3(r: &mut impl Read) -> Result<Vec3> {
    let mut buf = [0u8; 12];
    r.read_exact(&mut buf)?;
    Ok(Vec3::new(
        f32::from_le_bytes(buf[0..4].try_into().unwrap()),
        f32::from_le_bytes(buf[4..8].try_into().unwrap()),
        f32::from_le_bytes(buf[8..12].try_into().unwrap()),
    ))
}

/// Writes a full `.sdf` cache file for a model: one header `u32`
/// resolution, then per-submesh `{lower, upper, voxels}`.
pub fn write_sdf_cache(path: &Path, submeshes: &[SdfSubmeshRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_u32(&mut w, SDF_RESOLUTION)?;
    for submesh in submeshes {
        write_vec3(&mut w, submesh.lower)?;
        write_vec3(&mut w, submesh.upper)?;
        let expected_len = (SDF_RESOLUTION as usize).pow(3);
        if submesh.voxels.len() != expected_len {
            return Err(EngineError::CorruptFile(format!(
                "expected {expected_len} voxels, got {}",
                submesh.voxels.len()
            )));
        }
        w.write_all(bytemuck::cast_slice(&submesh.voxels))?;
    }
    w.flush()?;
    Ok(())
}

/// Reads a `.sdf` cache file. Returns
/// [`EngineError::CacheResolutionMismatch`] (not a hard I/O error) if
/// the file's header resolution doesn't match the compile-time
/// [`SDF_RESOLUTION`] — the caller schedules a rebuild rather than
/// propagating this as fatal, per spec §7 ("a missing SDF cache
/// triggers a rebuild").
pub fn read_sdf_cache(path: &Path, submesh_count: usize) -> Result<Vec<SdfSubmeshRecord>> {
    let mut r = BufReader::new(File::open(path)?);
    let file_resolution = read_u32(&mut r)?;
    if file_resolution != SDF_RESOLUTION {
        return Err(EngineError::CacheResolutionMismatch {
            file_resolution,
            expected: SDF_RESOLUTION,
        });
    }
    let voxel_count = (SDF_RESOLUTION as usize).pow(3);
    let mut records = Vec::with_capacity(submesh_count);
    for _ in 0..submesh_count {
        let lower = read_vec3(&mut r)?;
        let upper = read_vec3(&mut r)?;
        let mut voxels = vec![0f32; voxel_count];
        let mut bytes = vec![0u8; voxel_count * std::mem::size_of::<f32>()];
        r.read_exact(&mut bytes)?;
        voxels.copy_from_slice(bytemuck::cast_slice(&bytes));
        records.push(SdfSubmeshRecord { lower, upper, voxels });
    }
    Ok(records)
}

/// Writes a full `.sc` surface-cache file: header
/// `{card_resolution, surface_resolution}`, then per-submesh four
/// atlases in `{color, normal, pbr, emissive}` order.
pub fn write_surface_cache(path: &Path, submeshes: &[SubmeshSurfaceAtlases]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_u32(&mut w, SURFACE_CARD_RESOLUTION)?;
    write_u32(&mut w, SURFACE_RESOLUTION)?;
    let expected_len = (SURFACE_RESOLUTION * SURFACE_RESOLUTION) as usize * 4;
    for submesh in submeshes {
        for atlas in [&submesh.color, &submesh.normal, &submesh.pbr, &submesh.emissive] {
            if atlas.len() != expected_len {
                return Err(EngineError::CorruptFile(format!(
                    "expected {expected_len} atlas bytes, got {}",
                    atlas.len()
                )));
            }
            w.write_all(atlas)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Reads a `.sc` surface-cache file. Returns
/// [`EngineError::CacheResolutionMismatch`] if either header dimension
/// differs from the compile-time constants.
pub fn read_surface_cache(path: &Path, submesh_count: usize) -> Result<Vec<SubmeshSurfaceAtlases>> {
    let mut r = BufReader::new(File::open(path)?);
    let card_resolution = read_u32(&mut r)?;
    let surface_resolution = read_u32(&mut r)?;
    if card_resolution != SURFACE_CARD_RESOLUTION || surface_resolution != SURFACE_RESOLUTION {
        return Err(EngineError::CacheResolutionMismatch {
            file_resolution: surface_resolution,
            expected: SURFACE_RESOLUTION,
        });
    }
    let atlas_len = (SURFACE_RESOLUTION * SURFACE_RESOLUTION) as usize * 4;
    let mut result = Vec::with_capacity(submesh_count);
    for _ in 0..submesh_count {
        let mut read_atlas = || -> Result<Vec<u8>> {
            let mut buf = vec![0u8; atlas_len];
            r.read_exact(&mut buf)?;
            Ok(buf)
        };
        result.push(SubmeshSurfaceAtlases {
            color: read_atlas()?,
            normal: read_atlas()?,
            pbr: read_atlas()?,
            emissive: read_atlas()?,
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sdf_cache_round_trips_bit_exactly() {
        let dir = std::env::temp_dir().join(format!("glint-sdf-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.sdf");

        let voxel_count = (SDF_RESOLUTION as usize).pow(3);
        let records = vec![SdfSubmeshRecord {
            lower: Vec3::new(-1.0, -1.0, -1.0),
            upper: Vec3::new(1.0, 1.0, 1.0),
            voxels: (0..voxel_count).map(|i| i as f32 * 0.5).collect(),
        }];
        write_sdf_cache(&path, &records).unwrap();

        let loaded = read_sdf_cache(&path, 1).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].lower, records[0].lower);
        assert_eq!(loaded[0].upper, records[0].upper);
        assert_eq!(loaded[0].voxels, records[0].voxels);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn sdf_cache_rejects_mismatched_resolution() {
        let dir = std::env::temp_dir().join(format!("glint-sdf-test-mismatch-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stale.sdf");
        {
            let mut w = BufWriter::new(File::create(&path).unwrap());
            write_u32(&mut w, SDF_RESOLUTION + 1).unwrap();
            w.flush().unwrap();
        }
        let result = read_sdf_cache(&path, 1);
        assert!(matches!(result, Err(EngineError::CacheResolutionMismatch { .. })));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn surface_cache_round_trips() {
        let dir = std::env::temp_dir().join(format!("glint-sc-test-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.sc");

        let atlases = SubmeshSurfaceAtlases::empty();
        write_surface_cache(&path, std::slice::from_ref(&atlases)).unwrap();
        let loaded = read_surface_cache(&path, 1).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].color.len(), atlases.color.len());

        std::fs::remove_file(&path).ok();
    }
}
