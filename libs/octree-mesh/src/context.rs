//! Explicit execution context for serial-only components.
//!
//! Surface extraction and layer optimisation run on one partition's local
//! data. Callers describe where they are running instead of the components
//! consulting process-wide state.

use crate::error::{MeshError, MeshResult};

/// Where a meshing step is being executed.
///
/// # Examples
/// ```
/// use octree_mesh::ExecutionContext;
/// let ctx = ExecutionContext::serial();
/// assert!(!ctx.is_parallel);
/// assert!(ctx.require_serial("extractor").is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionContext {
    /// True when running as one rank of a multi-rank job.
    pub is_parallel: bool,
    /// Rank of this process (0 when serial).
    pub rank: u32,
    /// True while the caller holds an open cross-partition communication region.
    pub comm_region_open: bool,
}

impl ExecutionContext {
    /// Single-process context.
    pub fn serial() -> Self {
        Self::default()
    }

    /// Context for one rank of a parallel run.
    pub fn parallel(rank: u32) -> Self {
        Self {
            is_parallel: true,
            rank,
            comm_region_open: false,
        }
    }

    /// Marks a communication region as open.
    pub fn with_open_comm_region(mut self) -> Self {
        self.comm_region_open = true;
        self
    }

    /// Fails unless no communication region is open.
    pub fn require_no_comm_region(&self, component: &'static str) -> MeshResult<()> {
        if self.comm_region_open {
            return Err(MeshError::ParallelContext {
                component,
                message: format!("communication region open on rank {}", self.rank),
            });
        }
        Ok(())
    }

    /// Fails unless running serially with no communication region open.
    pub fn require_serial(&self, component: &'static str) -> MeshResult<()> {
        self.require_no_comm_region(component)?;
        if self.is_parallel {
            return Err(MeshError::ParallelContext {
                component,
                message: format!("multi-rank execution (rank {})", self.rank),
            });
        }
        Ok(())
    }
}
