//! RAII ownership token for one device-memory allocation.

use std::fmt;
use std::ptr;

use crate::alloc::descriptor::{AllocRequest, StreamId};
use crate::device::context::DeviceId;
use crate::provider::resources::{AllocError, ResourceProvider};

/// Owns one allocation granted by a [`ResourceProvider`] and returns it to
/// that provider exactly once.
///
/// The provider back-reference is a plain borrow: it extends no lifetime, and
/// a reservation cannot outlive the provider that granted it. The empty
/// reservation (from [`Default`], [`MemoryReservation::empty`], or after
/// [`release`](MemoryReservation::release)) owns nothing and is always safe
/// to drop.
///
/// Reservations are move-only. `std::mem::take` transfers ownership and
/// leaves the source empty; [`assign`](MemoryReservation::assign) is the
/// checked transfer into an existing reservation.
pub struct MemoryReservation<'res> {
    provider: Option<&'res dyn ResourceProvider>,
    device: DeviceId,
    stream: StreamId,
    data: *mut u8,
    size: usize,
}

// Safety: the device pointer is an opaque token this layer never
// dereferences, and the provider reference is Send because providers are
// Sync. Mutation goes through &mut self, keeping one owner at a time.
unsafe impl Send for MemoryReservation<'_> {}

impl<'res> MemoryReservation<'res> {
    /// A reservation that owns nothing.
    pub const fn empty() -> Self {
        Self {
            provider: None,
            device: 0,
            stream: StreamId::DEFAULT,
            data: ptr::null_mut(),
            size: 0,
        }
    }

    /// Take ownership of `data`, previously obtained from `provider` for
    /// `device`.
    ///
    /// The reservation becomes the sole owner of `data`; constructing two
    /// reservations over one grant double-frees.
    pub fn new(
        provider: &'res dyn ResourceProvider,
        device: DeviceId,
        stream: StreamId,
        data: *mut u8,
        size: usize,
    ) -> Self {
        Self {
            provider: Some(provider),
            device,
            stream,
            data,
            size,
        }
    }

    /// Allocate through `provider` and take ownership of the result.
    ///
    /// The pointer is wrapped only after a successful allocation, so a failed
    /// request never reaches [`ResourceProvider::dealloc_memory`].
    pub fn allocate(
        provider: &'res dyn ResourceProvider,
        req: &AllocRequest,
    ) -> Result<Self, AllocError> {
        let data = provider.alloc_memory(req)?;
        Ok(Self::new(
            provider,
            req.descriptor.device,
            req.descriptor.stream,
            data,
            req.size,
        ))
    }

    /// Whether this reservation owns an allocation.
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
    }

    /// The owned pointer, or null for the empty reservation.
    pub fn data(&self) -> *mut u8 {
        self.data
    }

    /// Size of the owned allocation in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Device the allocation lives on.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Stream the allocation is ordered against.
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Return the allocation to its provider and reset to the empty state.
    ///
    /// Releasing an empty reservation is a no-op, so a second call never
    /// reaches the provider again.
    pub fn release(&mut self) {
        if let Some(provider) = self.provider.take() {
            provider.dealloc_memory(self.device, self.data);
            self.device = 0;
            self.stream = StreamId::DEFAULT;
            self.data = ptr::null_mut();
            self.size = 0;
        }
    }

    /// Transfer ownership of `src`'s allocation into this reservation,
    /// releasing whatever this reservation currently holds.
    ///
    /// # Panics
    ///
    /// Panics if both sides own the identical allocation (same provider,
    /// device, and pointer): two owners exist for one grant and completing
    /// the transfer would double-free.
    pub fn assign(&mut self, mut src: MemoryReservation<'res>) {
        assert!(
            !self.same_allocation(&src),
            "reservation assigned its own allocation: dev {} ptr {:p}",
            src.device,
            src.data,
        );

        self.release();
        // Taking the provider empties `src`, so its drop is a no-op.
        self.provider = src.provider.take();
        self.device = src.device;
        self.stream = src.stream;
        self.data = src.data;
        self.size = src.size;
    }

    fn same_allocation(&self, other: &MemoryReservation<'_>) -> bool {
        match (self.provider, other.provider) {
            (Some(a), Some(b)) => {
                ptr::addr_eq(a as *const dyn ResourceProvider, b as *const dyn ResourceProvider)
                    && self.device == other.device
                    && self.data == other.data
            }
            _ => false,
        }
    }
}

impl Default for MemoryReservation<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

impl Drop for MemoryReservation<'_> {
    fn drop(&mut self) {
        if let Some(provider) = self.provider {
            provider.dealloc_memory(self.device, self.data);
        }
    }
}

impl fmt::Debug for MemoryReservation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryReservation")
            .field("owned", &self.provider.is_some())
            .field("device", &self.device)
            .field("stream", &self.stream)
            .field("data", &self.data)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::descriptor::{AllocDescriptor, AllocKind, MemorySpace};
    use crate::provider::stub::StubProvider;

    fn request(device: DeviceId, size: usize) -> AllocRequest {
        AllocRequest::new(
            AllocDescriptor::new(
                AllocKind::TemporaryBuffer,
                device,
                MemorySpace::Temporary,
                StreamId::new(0x10),
            ),
            size,
        )
    }

    #[test]
    fn test_empty_reservation_is_inert() {
        let mut r = MemoryReservation::empty();
        assert!(r.is_empty());
        assert!(r.data().is_null());
        assert_eq!(r.size(), 0);

        r.release();
        r.release();
        assert!(r.is_empty());
    }

    #[test]
    fn test_take_transfers_and_empties_source() {
        let provider = StubProvider::default();
        let req = request(0, 1024);

        let mut r = provider.alloc_memory_handle(&req).unwrap();
        let data = r.data();

        let r2 = std::mem::take(&mut r);
        assert!(r.is_empty());
        assert!(r.data().is_null());
        assert_eq!(r.size(), 0);

        assert!(!r2.is_empty());
        assert_eq!(r2.data(), data);
        assert_eq!(r2.size(), 1024);
        assert_eq!(r2.device(), 0);
        assert_eq!(r2.stream(), StreamId::new(0x10));

        drop(r2);
        assert_eq!(provider.stats().total_deallocs, 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let provider = StubProvider::default();
        let mut r = provider.alloc_memory_handle(&request(0, 512)).unwrap();

        r.release();
        assert!(r.is_empty());
        r.release();

        assert_eq!(provider.stats().total_deallocs, 1);
    }

    #[test]
    fn test_assign_releases_destination_first() {
        let provider = StubProvider::default();
        let mut a = provider.alloc_memory_handle(&request(0, 256)).unwrap();
        let b = provider.alloc_memory_handle(&request(0, 256)).unwrap();
        let b_data = b.data();

        a.assign(b);
        assert_eq!(a.data(), b_data);
        assert_eq!(provider.stats().total_deallocs, 1);

        drop(a);
        assert_eq!(provider.stats().total_deallocs, 2);
    }

    #[test]
    fn test_assign_empty_source_empties_destination() {
        let provider = StubProvider::default();
        let mut a = provider.alloc_memory_handle(&request(0, 256)).unwrap();

        a.assign(MemoryReservation::empty());
        assert!(a.is_empty());
        assert_eq!(provider.stats().total_deallocs, 1);
    }

    #[test]
    #[should_panic(expected = "its own allocation")]
    fn test_assign_same_allocation_is_fatal() {
        let provider = StubProvider::default();
        let mut a = provider.alloc_memory_handle(&request(0, 256)).unwrap();

        // Forge a second owner over the same grant: the aliasing bug the
        // transfer guard exists to catch.
        let b = MemoryReservation::new(&provider, a.device(), a.stream(), a.data(), a.size());
        a.assign(b);
    }
}
