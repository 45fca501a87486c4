//! Pipeline configuration, built programmatically by the host rather than
//! loaded from an external file format.

use crate::types::Reg;

/// Parameters of the patch pipeline that are architectural facts rather
/// than per-instruction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Lowest GPR index the temp allocator is allowed to hand out.
    pub first_free_gpr: u8,
    /// One past the highest GPR index (exclusive upper bound of the scan).
    pub gpr_count: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            first_free_gpr: Reg::R0.num(),
            gpr_count: Reg::COUNT,
        }
    }
}
