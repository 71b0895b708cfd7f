//! Error types for the kernel.
//!
//! Per the spec's error-handling design, the kernel distinguishes four
//! failure kinds. Only two of them are `Result`-shaped: no-path and
//! invalid-query are both represented as an empty path, never an `Err`
//! (callers must treat "no path" as data, not failure). Stale-target
//! failures in behavior-tree leaves are `BehResult::Fail`, not an error
//! either. What's left for this type are failures a *host* can hit before
//! ever calling into the turn-driven kernel: malformed grids and configs.
//!
//! Programmer errors (transitioning to a nonexistent state id, blackboard
//! type mismatches, calling `act` on an empty FSM) are invariant violations,
//! not recoverable errors — they `debug_assert!`/panic in debug builds and
//! are undefined behavior (not sanitized) in release, matching the source.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoguelikeError {
    #[error("grid tile buffer has {actual} tiles, expected width*height = {expected}")]
    InvalidGrid { expected: usize, actual: usize },

    #[error("cluster size {cluster_size} does not evenly divide grid dimension {dimension}")]
    InvalidConfig {
        cluster_size: usize,
        dimension: usize,
    },

    #[error("unrecognized tile symbol {symbol:?} at offset {offset}")]
    UnknownTileSymbol { symbol: char, offset: usize },
}

pub type Result<T> = std::result::Result<T, RoguelikeError>;
