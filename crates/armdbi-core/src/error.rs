//! Recoverable failure modes surfaced across the public API.
//!
//! Temp allocation exhaustion is deliberately not part of this type: it is
//! treated as a fatal misconfiguration (too few GPRs reserved for the
//! instrumentation load) and panics at the point of discovery, matching the
//! `LogError(...); abort();` pattern it is grounded on.

use core::fmt;

/// Failure applying a patch to a concrete exec block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// The exec block's shadow/constant pool ran out of room for another
    /// entry. The caller should flush or grow the exec block and retry.
    ShadowPoolExhausted,
    /// No rule in the table matched the instruction at `address`; the
    /// pipeline has no default behavior for it.
    NoMatchingRule { address: u64 },
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::ShadowPoolExhausted => {
                write!(f, "exec block shadow pool exhausted")
            }
            PatchError::NoMatchingRule { address } => {
                write!(f, "no patch rule matched instruction at {:#x}", address)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PatchError {}
