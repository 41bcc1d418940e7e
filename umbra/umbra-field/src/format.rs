//! Binary distance field blobs, little-endian.
//!
//! Version 1: `b"USDF"`, `u32` version, then the version 0 body.
//! Version 0 (legacy, no magic): `3 x i32` dimensions, `3 x f32` origin, `f32` spacing,
//! then one `f32` per voxel, x fastest.

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{UVec3, Vec3};
use render_api::RenderError;

use crate::field::DistanceField;
use crate::grid::VoxelGrid;

pub const FIELD_MAGIC: [u8; 4] = *b"USDF";
pub const FIELD_FORMAT_VERSION: u32 = 1;

const LEGACY_HEADER_BYTES: usize = 3 * 4 + 3 * 4 + 4;

pub fn write_field<W: Write>(mut w: W, field: &DistanceField) -> Result<(), RenderError> {
    w.write_all(&FIELD_MAGIC)?;
    w.write_u32::<LittleEndian>(FIELD_FORMAT_VERSION)?;
    write_body(w, field)
}

/// Headerless version 0 layout, for consumers that predate the magic.
pub fn write_legacy_field<W: Write>(w: W, field: &DistanceField) -> Result<(), RenderError> {
    write_body(w, field)
}

fn write_body<W: Write>(mut w: W, field: &DistanceField) -> Result<(), RenderError> {
    let dims = field.dimensions();
    for d in dims.to_array() {
        let d = i32::try_from(d).map_err(|_| RenderError::corrupt(format!("dimension {} exceeds i32", d)))?;
        w.write_i32::<LittleEndian>(d)?;
    }
    for o in field.origin().to_array() {
        w.write_f32::<LittleEndian>(o)?;
    }
    w.write_f32::<LittleEndian>(field.spacing())?;
    for &s in field.samples() {
        w.write_f32::<LittleEndian>(s)?;
    }
    w.flush()?;
    Ok(())
}

pub fn encode_field(field: &DistanceField) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::with_capacity(8 + LEGACY_HEADER_BYTES + field.samples().len() * 4);
    write_field(&mut bytes, field)?;
    Ok(bytes)
}

/// Decodes a version 1 blob, or a version 0 blob when the magic is absent.
pub fn decode_field(bytes: &[u8]) -> Result<DistanceField, RenderError> {
    let body = if bytes.starts_with(&FIELD_MAGIC) {
        let mut cursor = Cursor::new(&bytes[FIELD_MAGIC.len()..]);
        let version = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| RenderError::corrupt("truncated version"))?;
        if version != FIELD_FORMAT_VERSION {
            return Err(RenderError::corrupt(format!("unsupported field version {}", version)));
        }
        &bytes[FIELD_MAGIC.len() + 4..]
    } else {
        bytes
    };
    decode_body(body)
}

fn decode_body(bytes: &[u8]) -> Result<DistanceField, RenderError> {
    if bytes.len() < LEGACY_HEADER_BYTES {
        return Err(RenderError::corrupt(format!(
            "header needs {} bytes, blob has {}",
            LEGACY_HEADER_BYTES,
            bytes.len()
        )));
    }
    let mut cursor = Cursor::new(bytes);
    let mut dims = [0u32; 3];
    for d in dims.iter_mut() {
        let raw = cursor.read_i32::<LittleEndian>()?;
        if raw < 1 {
            return Err(RenderError::corrupt(format!("dimension {} < 1", raw)));
        }
        *d = raw as u32;
    }
    let mut origin = [0f32; 3];
    for o in origin.iter_mut() {
        *o = cursor.read_f32::<LittleEndian>()?;
    }
    let spacing = cursor.read_f32::<LittleEndian>()?;
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(RenderError::corrupt(format!("spacing {} is not positive", spacing)));
    }

    let count = dims.iter().map(|&d| d as u64).product::<u64>();
    let payload = (bytes.len() - LEGACY_HEADER_BYTES) as u64;
    if payload != count * 4 {
        return Err(RenderError::corrupt(format!(
            "payload is {} bytes, header declares {} samples ({} bytes)",
            payload,
            count,
            count * 4
        )));
    }

    let grid = VoxelGrid::new(Vec3::from_array(origin), spacing, UVec3::from_array(dims))
        .map_err(RenderError::corrupt)?;
    let mut samples = vec![0f32; grid.voxel_count()];
    cursor.read_f32_into::<LittleEndian>(&mut samples)?;
    DistanceField::new(grid, samples)
}

pub fn read_field<R: Read>(mut r: R) -> Result<DistanceField, RenderError> {
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;
    decode_field(&bytes)
}

pub fn save_field(path: impl AsRef<Path>, field: &DistanceField) -> Result<(), RenderError> {
    save_with(path.as_ref(), field, write_field::<BufWriter<File>>)
}

pub fn save_legacy_field(path: impl AsRef<Path>, field: &DistanceField) -> Result<(), RenderError> {
    save_with(path.as_ref(), field, write_legacy_field::<BufWriter<File>>)
}

fn save_with(
    path: &Path,
    field: &DistanceField,
    write: fn(BufWriter<File>, &DistanceField) -> Result<(), RenderError>,
) -> Result<(), RenderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    write(BufWriter::new(File::create(path)?), field)?;
    log::info!("wrote distance field {} ({} grid)", path.display(), field.dimensions());
    Ok(())
}

pub fn load_field(path: impl AsRef<Path>) -> Result<DistanceField, RenderError> {
    let path = path.as_ref();
    let field = read_field(BufReader::new(File::open(path)?))?;
    log::info!(
        "loaded distance field {}: {} grid, origin {}, spacing {}",
        path.display(),
        field.dimensions(),
        field.origin(),
        field.spacing()
    );
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_field() -> DistanceField {
        let grid = VoxelGrid::new(Vec3::new(-1.5, 0.25, 3.0), 0.5, UVec3::new(3, 2, 2)).unwrap();
        let samples = (0..12).map(|v| v as f32 * 0.25 - 1.0).collect();
        DistanceField::new(grid, samples).unwrap()
    }

    fn legacy_bytes(dims: [i32; 3], origin: [f32; 3], spacing: f32, samples: &[f32]) -> Vec<u8> {
        let mut out = Vec::new();
        for d in dims {
            out.write_i32::<LittleEndian>(d).unwrap();
        }
        for o in origin {
            out.write_f32::<LittleEndian>(o).unwrap();
        }
        out.write_f32::<LittleEndian>(spacing).unwrap();
        for &s in samples {
            out.write_f32::<LittleEndian>(s).unwrap();
        }
        out
    }

    #[test]
    fn versioned_blob_layout() {
        let field = small_field();
        let bytes = encode_field(&field).unwrap();
        assert_eq!(&bytes[..4], b"USDF");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &3i32.to_le_bytes());
        assert_eq!(bytes.len(), 8 + 28 + 12 * 4);
        let back = decode_field(&bytes).unwrap();
        assert_eq!(back.dimensions(), field.dimensions());
        assert_eq!(back.origin(), field.origin());
        assert_eq!(back.samples(), field.samples());
    }

    #[test]
    fn reads_legacy_blobs() {
        let samples: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let bytes = legacy_bytes([2, 2, 2], [0.0, 1.0, 2.0], 0.25, &samples);
        let field = decode_field(&bytes).unwrap();
        assert_eq!(field.dimensions(), UVec3::splat(2));
        assert_eq!(field.spacing(), 0.25);
        assert_eq!(field.get(1, 1, 1), Some(7.0));

        let mut written = Vec::new();
        write_legacy_field(&mut written, &field).unwrap();
        assert_eq!(written, bytes);
    }

    #[test]
    fn rejects_payload_length_mismatch() {
        let samples = [0.0f32; 8];
        let short = legacy_bytes([2, 2, 2], [0.0; 3], 1.0, &samples[..7]);
        assert!(matches!(decode_field(&short), Err(RenderError::CorruptAsset(_))));
        let mut long = legacy_bytes([2, 2, 2], [0.0; 3], 1.0, &samples);
        long.extend_from_slice(&[0, 0, 0, 0]);
        assert!(matches!(decode_field(&long), Err(RenderError::CorruptAsset(_))));
        let mut ragged = legacy_bytes([2, 2, 2], [0.0; 3], 1.0, &samples);
        ragged.pop();
        assert!(matches!(decode_field(&ragged), Err(RenderError::CorruptAsset(_))));
    }

    #[test]
    fn rejects_bad_headers() {
        let samples = [0.0f32; 4];
        let zero_dim = legacy_bytes([0, 2, 2], [0.0; 3], 1.0, &samples);
        assert!(matches!(decode_field(&zero_dim), Err(RenderError::CorruptAsset(_))));
        let negative = legacy_bytes([-4, 1, 1], [0.0; 3], 1.0, &samples);
        assert!(matches!(decode_field(&negative), Err(RenderError::CorruptAsset(_))));
        let flat = legacy_bytes([2, 2, 1], [0.0; 3], 0.0, &samples);
        assert!(matches!(decode_field(&flat), Err(RenderError::CorruptAsset(_))));
        let nan = legacy_bytes([2, 2, 1], [0.0; 3], f32::NAN, &samples);
        assert!(matches!(decode_field(&nan), Err(RenderError::CorruptAsset(_))));
        assert!(matches!(decode_field(&[1, 2, 3]), Err(RenderError::CorruptAsset(_))));
        assert!(matches!(decode_field(b"USDF"), Err(RenderError::CorruptAsset(_))));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = encode_field(&small_field()).unwrap();
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        let err = decode_field(&bytes).unwrap_err();
        assert!(err.to_string().contains("version 7"));
    }

    #[test]
    fn baked_cuboid_survives_encoding_bit_for_bit() {
        let cube = crate::mesh::Mesh::cuboid(Vec3::new(0.3, -0.2, 0.1), Vec3::new(1.25, 1.0, 1.5)).unwrap();
        let field = crate::bake::bake(&cube, 0.5, crate::bake::DEFAULT_PADDING).unwrap();
        let back = decode_field(&encode_field(&field).unwrap()).unwrap();
        assert_eq!(back.grid(), field.grid());
        assert_eq!(back.samples().len(), field.samples().len());
        for (i, (a, b)) in field.samples().iter().zip(back.samples()).enumerate() {
            assert_eq!(a.to_bits(), b.to_bits(), "sample {}", i);
        }
        assert!(field.samples().iter().any(|s| *s < 0.0));
    }

    #[test]
    fn save_and_load_through_disk() {
        let dir = std::env::temp_dir().join(format!("umbra_format_{}", std::process::id()));
        let path = dir.join("fields").join("small.usdf");
        let field = small_field();
        save_field(&path, &field).unwrap();
        let back = load_field(&path).unwrap();
        let legacy = dir.join("small_v0.usdf");
        save_legacy_field(&legacy, &field).unwrap();
        let legacy_back = load_field(&legacy).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(back.samples(), field.samples());
        assert_eq!(legacy_back.dimensions(), field.dimensions());
        assert!(matches!(load_field(dir.join("missing.usdf")), Err(RenderError::Io(_))));
    }
}
