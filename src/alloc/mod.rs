//! Allocation value types and the RAII reservation.
//!
//! - [`descriptor`]: AllocKind, MemorySpace, StreamId, AllocDescriptor, AllocRequest
//! - [`reservation`]: MemoryReservation ownership token

pub mod descriptor;
pub mod reservation;
