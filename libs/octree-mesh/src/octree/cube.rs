//! Octree leaf with a classification and an owning process.

use super::coordinates::CubeCoordinate;
use crate::error::{MeshError, MeshResult};
use std::fmt;

/// Classification of a cube relative to the input surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CubeType {
    /// Not classified yet.
    Unknown = 0,
    /// Entirely outside the meshed domain.
    Outside = 1,
    /// Intersected by the surface.
    Data = 2,
    /// Entirely inside the meshed domain.
    Inside = 3,
}

impl CubeType {
    /// Decodes a stored byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CubeType::Unknown),
            1 => Some(CubeType::Outside),
            2 => Some(CubeType::Data),
            3 => Some(CubeType::Inside),
            _ => None,
        }
    }
}

/// Process owning a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcNo {
    /// Replicated on every process.
    AllProcs,
    /// Owned by a process other than the local one.
    OtherProc,
    /// Owned by the given rank.
    Rank(u16),
}

impl ProcNo {
    const ALL_PROCS: i32 = -2;
    const OTHER_PROC: i32 = -3;

    /// Stored integer form. Every rank maps to itself.
    pub fn to_i32(self) -> i32 {
        match self {
            ProcNo::AllProcs => Self::ALL_PROCS,
            ProcNo::OtherProc => Self::OTHER_PROC,
            ProcNo::Rank(r) => i32::from(r),
        }
    }

    /// Decodes the stored integer form.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            Self::ALL_PROCS => Some(ProcNo::AllProcs),
            Self::OTHER_PROC => Some(ProcNo::OtherProc),
            r => u16::try_from(r).ok().map(ProcNo::Rank),
        }
    }
}

/// Leaf of the octree: coordinate plus classification and owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctreeCube {
    coordinate: CubeCoordinate,
    cube_type: CubeType,
    proc_no: ProcNo,
}

impl OctreeCube {
    /// Unclassified cube replicated on all processes.
    pub fn new(coordinate: CubeCoordinate) -> Self {
        Self {
            coordinate,
            cube_type: CubeType::Unknown,
            proc_no: ProcNo::AllProcs,
        }
    }

    /// Rebuilds a cube from stored parts without transition checks.
    pub(crate) fn from_parts(coordinate: CubeCoordinate, cube_type: CubeType, proc_no: ProcNo) -> Self {
        Self {
            coordinate,
            cube_type,
            proc_no,
        }
    }

    /// Cube address.
    pub fn coordinate(&self) -> &CubeCoordinate {
        &self.coordinate
    }

    /// Current classification.
    pub fn cube_type(&self) -> CubeType {
        self.cube_type
    }

    /// Owning process.
    pub fn proc_no(&self) -> ProcNo {
        self.proc_no
    }

    /// Sets the owning process.
    pub fn set_proc_no(&mut self, proc_no: ProcNo) {
        self.proc_no = proc_no;
    }

    /// Reclassifies the cube.
    ///
    /// `Unknown` may become anything and a type may be set to itself. Every
    /// other transition (including back to `Unknown`) is a consistency
    /// error and leaves the cube unchanged.
    pub fn set_cube_type(&mut self, cube_type: CubeType) -> MeshResult<()> {
        let allowed = self.cube_type == CubeType::Unknown || self.cube_type == cube_type;
        if !allowed {
            return Err(MeshError::consistency(format!(
                "cube {} cannot change from {:?} to {:?}",
                self.coordinate, self.cube_type, cube_type
            )));
        }
        self.cube_type = cube_type;
        Ok(())
    }

    /// Child cube with the same owner, unclassified.
    pub(crate) fn child(&self, coordinate: CubeCoordinate) -> Self {
        Self {
            coordinate,
            cube_type: CubeType::Unknown,
            proc_no: self.proc_no,
        }
    }
}

impl fmt::Display for OctreeCube {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.coordinate, self.cube_type)
    }
}
