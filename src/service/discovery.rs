// SPDX-License-Identifier: GPL-3.0-only

//! Device enumeration and selection

use crate::backends::{CameraDevice, CameraPosition, CaptureBackend, DeviceType};
use tracing::debug;

/// Sort key: back wide-angle first, then other back cameras, then front
fn rank(device: &CameraDevice) -> u8 {
    let wide = device.device_type == DeviceType::WideAngle;
    match device.position {
        CameraPosition::Back if wide => 0,
        CameraPosition::Back => 1,
        CameraPosition::Front if wide => 2,
        CameraPosition::Front => 3,
        CameraPosition::External => 4,
        CameraPosition::Unspecified => 5,
    }
}

/// Order devices by preference, keeping platform order among equals
pub fn order_devices(mut devices: Vec<CameraDevice>) -> Vec<CameraDevice> {
    devices.retain(CameraDevice::is_usable);
    devices.sort_by_key(rank);
    devices
}

/// Usable devices reported by `backend`, best first
///
/// Queried fresh on every call; an empty list means no camera.
pub fn available_devices(backend: &dyn CaptureBackend) -> Vec<CameraDevice> {
    let reported = backend.discover_devices();
    let total = reported.len();
    let devices = order_devices(reported);
    debug!(
        total,
        usable = devices.len(),
        backend = %backend.kind(),
        "Devices enumerated"
    );
    devices
}

/// First device at `position`, falling back to the best device overall
pub fn preferred_device(
    devices: &[CameraDevice],
    position: Option<CameraPosition>,
) -> Option<CameraDevice> {
    position
        .and_then(|pos| devices.iter().find(|d| d.position == pos))
        .or_else(|| devices.first())
        .cloned()
}

/// Device to switch to from `current`
///
/// Prefers the best camera facing the other way; otherwise steps to the next
/// device in order, wrapping around.
pub fn next_device(devices: &[CameraDevice], current: Option<&CameraDevice>) -> Option<CameraDevice> {
    let Some(current) = current else {
        return devices.first().cloned();
    };

    let opposite = match current.position {
        CameraPosition::Back => Some(CameraPosition::Front),
        CameraPosition::Front => Some(CameraPosition::Back),
        _ => None,
    };
    if let Some(target) = opposite
        && let Some(device) = devices.iter().find(|d| d.position == target)
    {
        return Some(device.clone());
    }

    let index = devices.iter().position(|d| d.id == current.id)?;
    let next = &devices[(index + 1) % devices.len()];
    (next.id != current.id).then(|| next.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, position: CameraPosition, device_type: DeviceType) -> CameraDevice {
        CameraDevice {
            id: id.into(),
            name: id.into(),
            path: format!("/dev/{}", id),
            position,
            device_type,
            connected: true,
            suspended: false,
            has_flash: false,
            has_torch: false,
        }
    }

    #[test]
    fn test_ordering() {
        let ordered = order_devices(vec![
            device("usb", CameraPosition::External, DeviceType::External),
            device("front", CameraPosition::Front, DeviceType::WideAngle),
            device("tele", CameraPosition::Back, DeviceType::Telephoto),
            device("front-uw", CameraPosition::Front, DeviceType::UltraWide),
            device("back", CameraPosition::Back, DeviceType::WideAngle),
        ]);
        let ids: Vec<_> = ordered.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["back", "tele", "front", "front-uw", "usb"]);
    }

    #[test]
    fn test_unusable_devices_are_dropped() {
        let mut gone = device("gone", CameraPosition::Back, DeviceType::WideAngle);
        gone.connected = false;
        let mut busy = device("busy", CameraPosition::Back, DeviceType::WideAngle);
        busy.suspended = true;
        let front = device("front", CameraPosition::Front, DeviceType::WideAngle);

        let ordered = order_devices(vec![gone, busy, front]);
        assert_eq!(ordered.len(), 1);
        assert_eq!(ordered[0].id, "front");
    }

    #[test]
    fn test_ties_keep_platform_order() {
        let ordered = order_devices(vec![
            device("a", CameraPosition::External, DeviceType::External),
            device("b", CameraPosition::External, DeviceType::External),
        ]);
        assert_eq!(ordered[0].id, "a");
        assert_eq!(ordered[1].id, "b");
    }

    #[test]
    fn test_next_device_flips_facing() {
        let devices = order_devices(vec![
            device("front", CameraPosition::Front, DeviceType::WideAngle),
            device("back", CameraPosition::Back, DeviceType::WideAngle),
            device("tele", CameraPosition::Back, DeviceType::Telephoto),
        ]);
        let next = next_device(&devices, Some(&devices[0])).unwrap();
        assert_eq!(next.id, "front");
        let back = next_device(&devices, Some(&next)).unwrap();
        assert_eq!(back.id, "back");
    }

    #[test]
    fn test_next_device_wraps_without_opposite() {
        let devices = vec![
            device("a", CameraPosition::External, DeviceType::External),
            device("b", CameraPosition::External, DeviceType::External),
        ];
        assert_eq!(next_device(&devices, Some(&devices[1])).unwrap().id, "a");
        assert!(next_device(&devices[..1], Some(&devices[0])).is_none());
    }

    #[test]
    fn test_preferred_device() {
        let devices = vec![
            device("back", CameraPosition::Back, DeviceType::WideAngle),
            device("front", CameraPosition::Front, DeviceType::WideAngle),
        ];
        assert_eq!(
            preferred_device(&devices, Some(CameraPosition::Front)).unwrap().id,
            "front"
        );
        assert_eq!(
            preferred_device(&devices, Some(CameraPosition::External)).unwrap().id,
            "back"
        );
        assert!(preferred_device(&[], None).is_none());
    }
}
