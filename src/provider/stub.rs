//! Host-backed provider for CPU-only builds and tests.
//!
//! Allocates from the host heap and tracks every grant, so callers can
//! exercise the full reservation lifecycle without GPU hardware. Matches a
//! real device provider at the contract level: unique pointer per grant,
//! one-shot deallocation, per-device scratch accounting, deterministic
//! stream and handle identities.

use std::alloc::{alloc, dealloc, Layout};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::resources::{AllocError, BlasHandle, ResourceProvider};
use crate::alloc::descriptor::{AllocRequest, MemorySpace, StreamId};
use crate::device::context::DeviceId;

/// Alignment for every grant; device allocators round to 256-byte boundaries
/// for coalesced access, and the stub mirrors that.
const GRANT_ALIGN: usize = 256;

/// Stream lane reserved for host/device copies.
const COPY_LANE: u64 = 0xFF;

/// Tuning knobs for [`StubProvider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubConfig {
    /// Advisory scratch budget per device in bytes.
    pub temp_memory_budget: usize,

    /// Number of alternate streams reported per device.
    pub alternate_stream_count: usize,

    /// Whether devices report reduced-precision float support.
    pub reduced_precision: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            temp_memory_budget: 64 * 1024 * 1024, // 64 MB
            alternate_stream_count: 2,
            reduced_precision: false,
        }
    }
}

/// One live grant.
#[derive(Debug)]
struct Grant {
    layout: Layout,
    size: usize,
    space: MemorySpace,
}

#[derive(Debug, Default)]
struct StubState {
    /// Live grants keyed by (device, pointer address).
    live: HashMap<(DeviceId, usize), Grant>,

    /// Every dealloc_memory call, in order.
    dealloc_log: Vec<(DeviceId, usize)>,

    /// Outstanding Temporary-space bytes per device.
    temp_in_use: HashMap<DeviceId, usize>,

    /// sync_default_stream calls per device.
    syncs: HashMap<DeviceId, u64>,

    total_allocs: u64,
    total_deallocs: u64,
    foreign_deallocs: u64,
}

/// Counters exposed for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StubStats {
    /// Successful allocations.
    pub total_allocs: u64,

    /// Deallocations of live grants.
    pub total_deallocs: u64,

    /// Deallocation calls for pointers this provider never granted (or
    /// granted and already freed). Always zero for correct callers.
    pub foreign_deallocs: u64,

    /// Grants currently outstanding.
    pub live: usize,
}

/// Host-memory [`ResourceProvider`].
pub struct StubProvider {
    config: StubConfig,
    state: Mutex<StubState>,
}

impl StubProvider {
    pub fn new(config: StubConfig) -> Self {
        Self {
            config,
            state: Mutex::new(StubState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocation/deallocation counters.
    pub fn stats(&self) -> StubStats {
        let state = self.lock();
        StubStats {
            total_allocs: state.total_allocs,
            total_deallocs: state.total_deallocs,
            foreign_deallocs: state.foreign_deallocs,
            live: state.live.len(),
        }
    }

    /// Every `dealloc_memory` call so far, as (device, pointer address).
    pub fn dealloc_log(&self) -> Vec<(DeviceId, usize)> {
        self.lock().dealloc_log.clone()
    }

    /// Number of `sync_default_stream` calls for `device`.
    pub fn sync_count(&self, device: DeviceId) -> u64 {
        self.lock().syncs.get(&device).copied().unwrap_or(0)
    }

    // Deterministic per-device stream identities, recognizable in logs:
    // device d, lane n renders as 0xd000_0000 + (d << 8) + n.
    fn stream_raw(device: DeviceId, lane: u64) -> u64 {
        0xD000_0000 + ((device as u64) << 8) + lane
    }
}

impl Default for StubProvider {
    fn default() -> Self {
        Self::new(StubConfig::default())
    }
}

impl ResourceProvider for StubProvider {
    fn default_stream(&self, device: DeviceId) -> StreamId {
        StreamId::new(Self::stream_raw(device, 0))
    }

    fn alternate_streams(&self, device: DeviceId) -> Vec<StreamId> {
        (1..=self.config.alternate_stream_count as u64)
            .map(|lane| StreamId::new(Self::stream_raw(device, lane)))
            .collect()
    }

    fn async_copy_stream(&self, device: DeviceId) -> StreamId {
        StreamId::new(Self::stream_raw(device, COPY_LANE))
    }

    fn blas_handle(&self, device: DeviceId) -> BlasHandle {
        BlasHandle::from_raw(0xB1A5_0000 + device as u64)
    }

    fn temp_memory_available(&self, device: DeviceId) -> usize {
        let state = self.lock();
        let in_use = state.temp_in_use.get(&device).copied().unwrap_or(0);
        self.config.temp_memory_budget.saturating_sub(in_use)
    }

    fn supports_reduced_precision(&self, _device: DeviceId) -> bool {
        self.config.reduced_precision
    }

    fn alloc_memory(&self, req: &AllocRequest) -> Result<*mut u8, AllocError> {
        let device = req.descriptor.device;
        let mut state = self.lock();

        if req.descriptor.space == MemorySpace::Temporary {
            let in_use = state.temp_in_use.get(&device).copied().unwrap_or(0);
            let available = self.config.temp_memory_budget.saturating_sub(in_use);
            if req.size > available {
                return Err(AllocError::OutOfMemory {
                    request: req.to_string(),
                    available,
                });
            }
        }

        // Zero-size grants are backed by one byte so every grant has a
        // unique address while the caller still sees size 0.
        let layout = Layout::from_size_align(req.size.max(1), GRANT_ALIGN)
            .map_err(|e| AllocError::Backend(e.to_string()))?;
        let data = unsafe { alloc(layout) };
        if data.is_null() {
            return Err(AllocError::OutOfMemory {
                request: req.to_string(),
                available: 0,
            });
        }

        if req.descriptor.space == MemorySpace::Temporary {
            *state.temp_in_use.entry(device).or_default() += req.size;
        }
        state.live.insert(
            (device, data as usize),
            Grant {
                layout,
                size: req.size,
                space: req.descriptor.space,
            },
        );
        state.total_allocs += 1;

        debug!(request = %req, ptr = data as usize, "Allocated host-backed device memory");
        Ok(data)
    }

    fn dealloc_memory(&self, device: DeviceId, data: *mut u8) {
        let mut state = self.lock();
        state.dealloc_log.push((device, data as usize));

        let grant = match state.live.remove(&(device, data as usize)) {
            Some(grant) => grant,
            None => {
                // Double-free or foreign pointer. Freeing it would corrupt
                // the host heap, so record the bug and keep the memory.
                state.foreign_deallocs += 1;
                error!(device, ptr = data as usize, "dealloc of unknown pointer");
                return;
            }
        };

        if grant.space == MemorySpace::Temporary {
            if let Some(in_use) = state.temp_in_use.get_mut(&device) {
                *in_use = in_use.saturating_sub(grant.size);
            }
        }
        state.total_deallocs += 1;
        unsafe { dealloc(data, grant.layout) };

        debug!(device, ptr = data as usize, size = grant.size, "Freed host-backed device memory");
    }

    fn sync_default_stream(&self, device: DeviceId) {
        // No device-side work exists; record the call so forwarding is
        // observable.
        let mut state = self.lock();
        *state.syncs.entry(device).or_default() += 1;
    }

    #[cfg(feature = "cuda")]
    fn cuda_context(&self, _device: DeviceId) -> std::sync::Arc<cudarc::driver::CudaContext> {
        unimplemented!("StubProvider is host-backed; use a CUDA provider for device contexts")
    }
}

impl Drop for StubProvider {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if !state.live.is_empty() {
            warn!(leaked = state.live.len(), "StubProvider dropped with live grants");
        }
        for ((_, addr), grant) in state.live.drain() {
            unsafe { dealloc(addr as *mut u8, grant.layout) };
        }
    }
}
