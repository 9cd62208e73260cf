//! vram-broker: device-memory brokerage for GPU compute engines.
//!
//! Standardizes how callers describe a memory request (purpose, device,
//! memory space, ordering stream, size), how a resource provider satisfies
//! it, and how the resulting allocation is released deterministically and
//! exactly once.
//!
//! - [`alloc`]: allocation descriptors and the RAII [`MemoryReservation`]
//! - [`provider`]: the [`ResourceProvider`] contract, factories, and a
//!   host-backed stub for CPU-only builds
//! - [`device`]: thread-local active-device context
//!
//! Concrete pooling and caching allocators implement [`ResourceProvider`];
//! everything above them allocates through [`MemoryReservation`] handles so
//! release on scope exit is guaranteed.

pub mod alloc;
pub mod device;
pub mod provider;

pub use alloc::descriptor::{AllocDescriptor, AllocKind, AllocRequest, MemorySpace, StreamId};
pub use alloc::reservation::MemoryReservation;
pub use device::context::{current_device, set_current_device, DeviceGuard, DeviceId};
pub use provider::factory::{FixedProviderFactory, ResourceProviderFactory};
pub use provider::resources::{AllocError, BlasHandle, ResourceProvider};
pub use provider::stub::{StubConfig, StubProvider, StubStats};
