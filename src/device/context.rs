//! Thread-local active-device context.
//!
//! Every implicit-device operation in the crate (descriptor helpers, the
//! `*_current_device` provider forms) resolves the device through
//! [`current_device`] at call time. Nothing caches the value.

use std::cell::Cell;

/// Index of a compute device. Device 0 is the process default.
pub type DeviceId = usize;

thread_local! {
    static CURRENT_DEVICE: Cell<DeviceId> = const { Cell::new(0) };
}

/// The device implicit-device operations resolve against on this thread.
pub fn current_device() -> DeviceId {
    CURRENT_DEVICE.with(Cell::get)
}

/// Set the active device for the calling thread.
pub fn set_current_device(device: DeviceId) {
    CURRENT_DEVICE.with(|d| d.set(device));
}

/// Scoped active-device switch.
///
/// Sets the active device on construction and restores the previous one on
/// drop, so a callee can switch devices without disturbing its caller.
#[derive(Debug)]
pub struct DeviceGuard {
    prev: DeviceId,
}

impl DeviceGuard {
    pub fn new(device: DeviceId) -> Self {
        let prev = current_device();
        set_current_device(device);
        Self { prev }
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        set_current_device(self.prev);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_device_is_zero() {
        assert_eq!(current_device(), 0);
    }

    #[test]
    fn test_set_and_get() {
        set_current_device(3);
        assert_eq!(current_device(), 3);
        set_current_device(0);
    }

    #[test]
    fn test_guard_restores_previous_device() {
        set_current_device(1);
        {
            let _guard = DeviceGuard::new(2);
            assert_eq!(current_device(), 2);
            {
                let _inner = DeviceGuard::new(5);
                assert_eq!(current_device(), 5);
            }
            assert_eq!(current_device(), 2);
        }
        assert_eq!(current_device(), 1);
        set_current_device(0);
    }
}
