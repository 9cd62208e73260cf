//! The resource-provider contract.
//!
//! A provider performs real allocation and deallocation and exposes
//! per-device execution resources: streams, BLAS handles, scratch budgets.
//! Concrete pooling and caching strategies live behind this trait; this layer
//! only fixes the contract they must honor.

use thiserror::Error;

use crate::alloc::descriptor::{AllocRequest, StreamId};
use crate::alloc::reservation::MemoryReservation;
use crate::device::context::{current_device, DeviceId};

/// Opaque handle to a device BLAS context.
///
/// Carried for callers that hand it to a math backend; this layer never
/// interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlasHandle(u64);

impl BlasHandle {
    pub const fn from_raw(raw: u64) -> Self {
        BlasHandle(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// Why a provider could not satisfy an allocation request.
#[derive(Error, Debug)]
pub enum AllocError {
    /// The device cannot fit the request.
    #[error("out of device memory: {request} ({available} bytes available)")]
    OutOfMemory {
        /// Diagnostic rendering of the failed request.
        request: String,
        /// Advisory bytes the provider could still grant.
        available: usize,
    },

    /// The requested device is not managed by this provider.
    #[error("device {0} not available")]
    DeviceNotAvailable(DeviceId),

    /// Backend-specific failure.
    #[error("allocation backend error: {0}")]
    Backend(String),
}

/// Per-device execution resources and the allocate/deallocate entry points.
///
/// Providers are shared across threads behind `Arc`, so every operation takes
/// `&self`; synchronizing internal state is the implementation's concern.
/// The `*_current_device` forms resolve the active device through
/// [`current_device`] at call time and delegate to the explicit forms.
pub trait ResourceProvider: Send + Sync {
    /// Stream on which `device`'s work is ordered by default.
    fn default_stream(&self, device: DeviceId) -> StreamId;

    /// Additional streams for work that may overlap the default stream.
    fn alternate_streams(&self, device: DeviceId) -> Vec<StreamId>;

    /// Stream reserved for host/device copies.
    fn async_copy_stream(&self, device: DeviceId) -> StreamId;

    /// BLAS context for `device`.
    fn blas_handle(&self, device: DeviceId) -> BlasHandle;

    /// Advisory count of scratch bytes still available on `device`.
    ///
    /// May be approximate or stale; never a guarantee that a request of this
    /// size will succeed.
    fn temp_memory_available(&self, device: DeviceId) -> usize;

    /// Whether `device` supports reduced-precision float math.
    fn supports_reduced_precision(&self, device: DeviceId) -> bool;

    /// Allocate memory for `req` in the requested space.
    ///
    /// The sole allocation entry point. A `size == 0` request is valid, not
    /// an error, and yields a pointer that must still be returned through
    /// [`dealloc_memory`](ResourceProvider::dealloc_memory).
    fn alloc_memory(&self, req: &AllocRequest) -> Result<*mut u8, AllocError>;

    /// Return memory previously obtained from
    /// [`alloc_memory`](ResourceProvider::alloc_memory) on `device`.
    ///
    /// Accepts exactly the pointers this provider returned for that device,
    /// at most once each.
    fn dealloc_memory(&self, device: DeviceId, data: *mut u8);

    /// Block the calling thread until work enqueued on `device`'s default
    /// stream up to this call has completed.
    fn sync_default_stream(&self, device: DeviceId);

    /// Full device context for backends built against the CUDA driver.
    #[cfg(feature = "cuda")]
    fn cuda_context(&self, device: DeviceId) -> std::sync::Arc<cudarc::driver::CudaContext>;

    /// [`default_stream`](ResourceProvider::default_stream) on the active device.
    fn default_stream_current_device(&self) -> StreamId {
        self.default_stream(current_device())
    }

    /// [`alternate_streams`](ResourceProvider::alternate_streams) on the active device.
    fn alternate_streams_current_device(&self) -> Vec<StreamId> {
        self.alternate_streams(current_device())
    }

    /// [`async_copy_stream`](ResourceProvider::async_copy_stream) on the active device.
    fn async_copy_stream_current_device(&self) -> StreamId {
        self.async_copy_stream(current_device())
    }

    /// [`blas_handle`](ResourceProvider::blas_handle) on the active device.
    fn blas_handle_current_device(&self) -> BlasHandle {
        self.blas_handle(current_device())
    }

    /// [`temp_memory_available`](ResourceProvider::temp_memory_available) on the active device.
    fn temp_memory_available_current_device(&self) -> usize {
        self.temp_memory_available(current_device())
    }

    /// [`supports_reduced_precision`](ResourceProvider::supports_reduced_precision) on the active device.
    fn supports_reduced_precision_current_device(&self) -> bool {
        self.supports_reduced_precision(current_device())
    }

    /// [`sync_default_stream`](ResourceProvider::sync_default_stream) on the active device.
    fn sync_default_stream_current_device(&self) {
        self.sync_default_stream(current_device())
    }

    /// [`cuda_context`](ResourceProvider::cuda_context) on the active device.
    #[cfg(feature = "cuda")]
    fn cuda_context_current_device(&self) -> std::sync::Arc<cudarc::driver::CudaContext> {
        self.cuda_context(current_device())
    }

    /// Allocate and immediately wrap the result in an owning reservation.
    ///
    /// Preferred over [`alloc_memory`](ResourceProvider::alloc_memory) for
    /// all clients: the reservation guarantees release on scope exit.
    /// Trait-object holders call [`MemoryReservation::allocate`] directly.
    fn alloc_memory_handle(
        &self,
        req: &AllocRequest,
    ) -> Result<MemoryReservation<'_>, AllocError>
    where
        Self: Sized,
    {
        MemoryReservation::allocate(self, req)
    }
}
