//! # Binary Cube Records
//!
//! Fixed-size little-endian record used to exchange octree leaves between
//! processes and to checkpoint them.
//!
//! # Layout
//!
//! - [`CubeRecord`]: 20 bytes (3 x u32 position, i32 owner, u8 level, u8 type,
//!   2 padding bytes)
//! - A stream is a little-endian `u64` record count followed by the records
//! - A stream holds at most [`MAX_STREAM_CUBES`] records

use super::coordinates::CubeCoordinate;
use super::cube::{CubeType, OctreeCube, ProcNo};
use crate::error::{GeometryError, MeshError, MeshResult};
use bytemuck::{Pod, Zeroable};
use std::io::{Read, Write};

/// Largest record count accepted by [`read_cubes`].
pub const MAX_STREAM_CUBES: u64 = 1 << 32;

/// Records read per chunk, so a corrupt count cannot force a huge
/// allocation before the stream runs out.
const READ_CHUNK: usize = 4096;

/// On-disk form of an [`OctreeCube`].
///
/// ```
/// use octree_mesh::octree::CubeRecord;
///
/// assert_eq!(std::mem::size_of::<CubeRecord>(), 20);
/// ```
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct CubeRecord {
    /// Position along x.
    pub pos_x: u32,
    /// Position along y.
    pub pos_y: u32,
    /// Position along z.
    pub pos_z: u32,
    /// Owner, see [`ProcNo::to_i32`].
    pub proc_no: i32,
    /// Refinement level.
    pub level: u8,
    /// [`CubeType`] discriminant.
    pub cube_type: u8,
    /// Always zero.
    pub padding: [u8; 2],
}

impl CubeRecord {
    /// Record of `cube` in little-endian byte order.
    pub fn from_cube(cube: &OctreeCube) -> Self {
        let c = cube.coordinate();
        Self {
            pos_x: c.pos_x().to_le(),
            pos_y: c.pos_y().to_le(),
            pos_z: c.pos_z().to_le(),
            proc_no: cube.proc_no().to_i32().to_le(),
            level: c.level(),
            cube_type: cube.cube_type() as u8,
            padding: [0; 2],
        }
    }

    /// Decodes the record, validating every field.
    pub fn to_cube(&self) -> MeshResult<OctreeCube> {
        let coordinate = CubeCoordinate::new(
            u32::from_le(self.pos_x),
            u32::from_le(self.pos_y),
            u32::from_le(self.pos_z),
            self.level,
        )?;
        let cube_type = CubeType::from_u8(self.cube_type).ok_or_else(|| {
            MeshError::from(GeometryError::InvalidSurface(format!(
                "record for {coordinate} has unknown cube type {}",
                self.cube_type
            )))
        })?;
        let owner = i32::from_le(self.proc_no);
        let proc_no = ProcNo::from_i32(owner).ok_or_else(|| {
            MeshError::consistency(format!("record for {coordinate} has invalid owner {owner}"))
        })?;
        Ok(OctreeCube::from_parts(coordinate, cube_type, proc_no))
    }
}

/// Writes `cubes` as a counted record stream.
pub fn write_cubes<'a, W: Write>(
    writer: &mut W,
    cubes: impl ExactSizeIterator<Item = &'a OctreeCube>,
) -> MeshResult<()> {
    writer.write_all(&(cubes.len() as u64).to_le_bytes())?;
    let records: Vec<CubeRecord> = cubes.map(CubeRecord::from_cube).collect();
    writer.write_all(bytemuck::cast_slice(&records))?;
    Ok(())
}

/// Reads a counted record stream written by [`write_cubes`].
pub fn read_cubes<R: Read>(reader: &mut R) -> MeshResult<Vec<OctreeCube>> {
    let mut count = [0u8; 8];
    reader.read_exact(&mut count)?;
    let count = u64::from_le_bytes(count);
    if count > MAX_STREAM_CUBES {
        return Err(MeshError::consistency(format!(
            "cube stream claims {count} records, more than {MAX_STREAM_CUBES}"
        )));
    }
    let count = usize::try_from(count)
        .map_err(|_| MeshError::consistency(format!("cube stream count {count} does not fit in memory")))?;

    let mut cubes = Vec::new();
    let mut chunk = vec![CubeRecord::zeroed(); READ_CHUNK.min(count)];
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(READ_CHUNK);
        reader.read_exact(bytemuck::cast_slice_mut(&mut chunk[..n]))?;
        cubes.try_reserve(n).map_err(|e| MeshError::consistency(format!("cube stream: {e}")))?;
        for record in &chunk[..n] {
            cubes.push(record.to_cube()?);
        }
        remaining -= n;
    }
    Ok(cubes)
}
