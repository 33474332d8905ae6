//! Protocol module
//!
//! The versioned set of logical operations the engine emits. Concrete packet
//! encodings live in transport adapters outside this crate.

pub mod operation;

pub use operation::{Angle, Operation, OperationKind, RelativeDelta, ANGLE_STEPS, OPERATION_VERSION};
