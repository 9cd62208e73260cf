//! Allocation descriptors: what is being requested, where, and why.
//!
//! Descriptors are immutable value types. The purpose tag never affects
//! correctness; providers use it for placement policy and diagnostics only.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::context::{current_device, DeviceId};

/// Semantic purpose of an allocation.
///
/// A provider may route `TemporaryBuffer` grants to a scratch arena or evict
/// them ahead of `FlatStorage`, but no purpose value changes what the
/// returned memory is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocKind {
    /// Anything not covered by the other tags.
    Other,
    /// Flat vector/row storage.
    FlatStorage,
    /// Inverted-list bucket storage.
    InvertedListStorage,
    /// Quantizer model data.
    Quantizer,
    /// Precomputed code tables for a quantizer.
    QuantizerPrecomputedCodes,
    /// Stream-scoped scratch memory.
    TemporaryBuffer,
    /// Scratch that overflowed the temporary budget.
    TemporaryOverflow,
}

impl AllocKind {
    /// All valid values, in tag order.
    pub const ALL: [AllocKind; 7] = [
        AllocKind::Other,
        AllocKind::FlatStorage,
        AllocKind::InvertedListStorage,
        AllocKind::Quantizer,
        AllocKind::QuantizerPrecomputedCodes,
        AllocKind::TemporaryBuffer,
        AllocKind::TemporaryOverflow,
    ];

    /// Stable name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            AllocKind::Other => "Other",
            AllocKind::FlatStorage => "FlatStorage",
            AllocKind::InvertedListStorage => "InvertedListStorage",
            AllocKind::Quantizer => "Quantizer",
            AllocKind::QuantizerPrecomputedCodes => "QuantizerPrecomputedCodes",
            AllocKind::TemporaryBuffer => "TemporaryBuffer",
            AllocKind::TemporaryOverflow => "TemporaryOverflow",
        }
    }

    /// Decode a raw numeric tag, if it names a valid kind.
    pub fn from_raw(raw: u32) -> Option<AllocKind> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Name for a raw numeric tag.
    ///
    /// Out-of-range values (a corrupted or foreign tag) render as `"Unknown"`
    /// rather than failing.
    pub fn label_for_raw(raw: u32) -> &'static str {
        Self::from_raw(raw).map_or("Unknown", |k| k.name())
    }
}

impl fmt::Display for AllocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where and how the memory is resident.
///
/// Determines which underlying allocation mechanism a provider must use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemorySpace {
    /// Stream-ordered scratch; reusable once work enqueued on the tagged
    /// stream up to the allocation point has retired.
    Temporary,
    /// Resident device memory.
    Device,
    /// Host/device-coherent memory.
    Unified,
}

impl MemorySpace {
    /// All valid values, in tag order.
    pub const ALL: [MemorySpace; 3] = [
        MemorySpace::Temporary,
        MemorySpace::Device,
        MemorySpace::Unified,
    ];

    /// Stable name for this space.
    pub fn name(&self) -> &'static str {
        match self {
            MemorySpace::Temporary => "Temporary",
            MemorySpace::Device => "Device",
            MemorySpace::Unified => "Unified",
        }
    }

    /// Decode a raw numeric tag, if it names a valid space.
    pub fn from_raw(raw: u32) -> Option<MemorySpace> {
        Self::ALL.get(raw as usize).copied()
    }

    /// Name for a raw numeric tag; out-of-range values render as `"Unknown"`.
    pub fn label_for_raw(raw: u32) -> &'static str {
        Self::from_raw(raw).map_or("Unknown", |s| s.name())
    }
}

impl fmt::Display for MemorySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of a device work stream.
///
/// Opaque to this layer: it is carried from the descriptor through to the
/// provider, which owns the mapping to real backend streams. Rendered in hex
/// like the pointer-sized handle it stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StreamId(u64);

impl StreamId {
    /// The default (null) stream.
    pub const DEFAULT: StreamId = StreamId(0);

    pub const fn new(raw: u64) -> Self {
        StreamId(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Immutable description of a memory request: purpose, device, space, and the
/// stream whose work ordering the allocation is tied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocDescriptor {
    /// Purpose tag, for diagnostics and provider-side policy.
    pub kind: AllocKind,

    /// Device the memory must live on.
    pub device: DeviceId,

    /// Which allocation mechanism the provider must use.
    pub space: MemorySpace,

    /// Ordering domain the allocation is synchronized against.
    pub stream: StreamId,
}

impl AllocDescriptor {
    pub fn new(kind: AllocKind, device: DeviceId, space: MemorySpace, stream: StreamId) -> Self {
        Self {
            kind,
            device,
            space,
            stream,
        }
    }

    /// Device-space descriptor on the calling thread's active device.
    ///
    /// The device is read at call time, never cached.
    pub fn device_space(kind: AllocKind, stream: StreamId) -> Self {
        Self::new(kind, current_device(), MemorySpace::Device, stream)
    }

    /// Temporary-space descriptor on the calling thread's active device.
    pub fn temporary(kind: AllocKind, stream: StreamId) -> Self {
        Self::new(kind, current_device(), MemorySpace::Temporary, stream)
    }

    /// Descriptor for an explicit space on the calling thread's active device.
    pub fn with_space(kind: AllocKind, space: MemorySpace, stream: StreamId) -> Self {
        Self::new(kind, current_device(), space, stream)
    }
}

impl fmt::Display for AllocDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type {} dev {} space {} stream {}",
            self.kind, self.device, self.space, self.stream
        )
    }
}

/// An [`AllocDescriptor`] plus the requested byte count.
///
/// `size == 0` is a legal request everywhere: providers return a valid
/// pointer and the resulting reservation reports size 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocRequest {
    /// What is being allocated, and where.
    pub descriptor: AllocDescriptor,

    /// Requested bytes.
    pub size: usize,
}

impl AllocRequest {
    pub fn new(descriptor: AllocDescriptor, size: usize) -> Self {
        Self { descriptor, size }
    }
}

impl fmt::Display for AllocRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Builds on the descriptor rendering by fixed composition.
        write!(f, "{} size {} bytes", self.descriptor, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::context::DeviceGuard;

    #[test]
    fn test_kind_labels_are_stable() {
        for (i, kind) in AllocKind::ALL.iter().enumerate() {
            let label = AllocKind::label_for_raw(i as u32);
            assert_eq!(label, kind.name());
            assert_ne!(label, "Unknown");
        }
        assert_eq!(AllocKind::TemporaryBuffer.to_string(), "TemporaryBuffer");
    }

    #[test]
    fn test_space_labels_are_stable() {
        for (i, space) in MemorySpace::ALL.iter().enumerate() {
            let label = MemorySpace::label_for_raw(i as u32);
            assert_eq!(label, space.name());
            assert_ne!(label, "Unknown");
        }
    }

    #[test]
    fn test_out_of_range_tags_render_unknown() {
        assert_eq!(AllocKind::label_for_raw(7), "Unknown");
        assert_eq!(AllocKind::label_for_raw(u32::MAX), "Unknown");
        assert!(AllocKind::from_raw(7).is_none());

        assert_eq!(MemorySpace::label_for_raw(3), "Unknown");
        assert_eq!(MemorySpace::label_for_raw(u32::MAX), "Unknown");
        assert!(MemorySpace::from_raw(3).is_none());
    }

    #[test]
    fn test_descriptor_rendering() {
        let desc = AllocDescriptor::new(
            AllocKind::FlatStorage,
            1,
            MemorySpace::Device,
            StreamId::new(0x100),
        );
        assert_eq!(
            desc.to_string(),
            "type FlatStorage dev 1 space Device stream 0x100"
        );
    }

    #[test]
    fn test_request_appends_size_to_descriptor_rendering() {
        let desc = AllocDescriptor::new(
            AllocKind::Other,
            0,
            MemorySpace::Unified,
            StreamId::DEFAULT,
        );
        for size in [0usize, 1, 4096, 1 << 33] {
            let req = AllocRequest::new(desc, size);
            assert_eq!(req.to_string(), format!("{desc} size {size} bytes"));
        }
    }

    #[test]
    fn test_helpers_pick_up_active_device() {
        let _guard = DeviceGuard::new(2);

        let dev = AllocDescriptor::device_space(AllocKind::Quantizer, StreamId::DEFAULT);
        assert_eq!(dev.device, 2);
        assert_eq!(dev.space, MemorySpace::Device);

        let tmp = AllocDescriptor::temporary(AllocKind::TemporaryBuffer, StreamId::DEFAULT);
        assert_eq!(tmp.device, 2);
        assert_eq!(tmp.space, MemorySpace::Temporary);

        let uni =
            AllocDescriptor::with_space(AllocKind::Other, MemorySpace::Unified, StreamId::DEFAULT);
        assert_eq!(uni.device, 2);
        assert_eq!(uni.space, MemorySpace::Unified);
    }

    #[test]
    fn test_helpers_resolve_device_at_call_time() {
        let a = {
            let _guard = DeviceGuard::new(1);
            AllocDescriptor::temporary(AllocKind::TemporaryBuffer, StreamId::DEFAULT)
        };
        let b = {
            let _guard = DeviceGuard::new(3);
            AllocDescriptor::temporary(AllocKind::TemporaryBuffer, StreamId::DEFAULT)
        };
        assert_eq!(a.device, 1);
        assert_eq!(b.device, 3);
    }

    #[test]
    fn test_request_serde_round_trip() {
        let req = AllocRequest::new(
            AllocDescriptor::new(
                AllocKind::InvertedListStorage,
                4,
                MemorySpace::Temporary,
                StreamId::new(42),
            ),
            8192,
        );
        let json = serde_json::to_string(&req).unwrap();
        let back: AllocRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }
}
