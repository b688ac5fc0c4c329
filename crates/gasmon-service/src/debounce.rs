//! Alert notification debounce rule.
//!
//! A notification is sent only on the edge into ALERT: the new value must be
//! ALERT and the previous value must be missing or not ALERT. Sustained
//! alerts therefore notify once, and a WARN in between re-arms the rule.
//!
//! The status compared here is the one the device embedded in the reading.

use std::collections::HashMap;

use time::format_description::well_known::Rfc3339;

use gasmon_core::{DeviceId, Reading, Status};

/// Whether a write from `before` to `after` must trigger a notification.
///
/// ```
/// use gasmon_core::{Reading, Status};
/// use gasmon_service::debounce::should_notify;
///
/// let ok = Reading::builder().status(Status::Ok).build();
/// let alert = Reading::builder().status(Status::Alert).build();
/// assert!(should_notify(Some(&ok), Some(&alert)));
/// assert!(should_notify(None, Some(&alert)));
/// assert!(!should_notify(Some(&alert), Some(&alert)));
/// assert!(!should_notify(Some(&alert), None));
/// ```
pub fn should_notify(before: Option<&Reading>, after: Option<&Reading>) -> bool {
    let Some(after) = after else {
        return false;
    };
    after.status == Status::Alert && !before.is_some_and(|b| b.status == Status::Alert)
}

/// Text sent to the chat for an alert.
pub fn format_alert_message(device: &DeviceId, reading: &Reading) -> String {
    let mut text = format!(
        "⚠️ GAS ALERT\nDevice: {}\nIndex: {}\nADC: {}\nTS: {}",
        device, reading.index, reading.raw_value, reading.timestamp
    );
    if reading.timestamp > 0
        && let Some(at) = reading.captured_at()
        && let Ok(formatted) = at.format(&Rfc3339)
    {
        text.push_str("\nTime: ");
        text.push_str(&formatted);
    }
    text
}

/// Per-device memory of the previous latest value.
///
/// Used by the watcher, which sees a stream of values rather than
/// before/after pairs. The first value seen for a device has no previous.
#[derive(Debug, Default)]
pub struct Debouncer {
    previous: HashMap<DeviceId, Reading>,
}

impl Debouncer {
    /// Create an empty debouncer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the new value for `device` and return the one it replaces.
    ///
    /// A deleted slot (`None`) clears the memory for that device.
    pub fn observe(&mut self, device: &DeviceId, after: Option<&Reading>) -> Option<Reading> {
        match after {
            Some(reading) => self.previous.insert(device.clone(), reading.clone()),
            None => self.previous.remove(device),
        }
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_status(status: Status) -> Reading {
        Reading::builder().index(50.0).status(status).build()
    }

    fn count_notifications(statuses: &[Status]) -> usize {
        let mut before: Option<Reading> = None;
        let mut sent = 0;
        for &status in statuses {
            let after = with_status(status);
            if should_notify(before.as_ref(), Some(&after)) {
                sent += 1;
            }
            before = Some(after);
        }
        sent
    }

    #[test]
    fn test_edge_sequence_notifies_twice() {
        use Status::*;
        assert_eq!(count_notifications(&[Ok, Alert, Alert, Warn, Alert]), 2);
    }

    #[test]
    fn test_first_write_alert_notifies_once() {
        assert_eq!(count_notifications(&[Status::Alert]), 1);
        assert!(should_notify(None, Some(&with_status(Status::Alert))));
    }

    #[test]
    fn test_deleted_value_is_noop() {
        assert!(!should_notify(Some(&with_status(Status::Ok)), None));
        assert!(!should_notify(None, None));
    }

    #[test]
    fn test_unknown_status_never_notifies() {
        assert!(!should_notify(None, Some(&with_status(Status::Unknown))));
        assert!(should_notify(
            Some(&with_status(Status::Unknown)),
            Some(&with_status(Status::Alert))
        ));
    }

    #[test]
    fn test_debouncer_tracks_devices_separately() {
        let a = DeviceId::new("a").unwrap();
        let b = DeviceId::new("b").unwrap();
        let alert = with_status(Status::Alert);
        let mut debouncer = Debouncer::new();
        let mut notify = |device: &DeviceId, after: Option<&Reading>| {
            let before = debouncer.observe(device, after);
            should_notify(before.as_ref(), after)
        };

        assert!(notify(&a, Some(&alert)));
        assert!(!notify(&a, Some(&alert)));
        assert!(notify(&b, Some(&alert)));

        // Deleting the slot forgets the previous value.
        assert!(!notify(&a, None));
        assert!(notify(&a, Some(&alert)));
    }

    #[test]
    fn test_debouncer_reset() {
        let device = DeviceId::default();
        let mut debouncer = Debouncer::new();
        assert!(debouncer.observe(&device, Some(&with_status(Status::Ok))).is_none());
        assert_eq!(
            debouncer
                .observe(&device, Some(&with_status(Status::Warn)))
                .map(|r| r.status),
            Some(Status::Ok)
        );
        debouncer.reset();
        assert!(debouncer.observe(&device, None).is_none());
    }

    #[test]
    fn test_message_contents() {
        let reading = Reading::builder()
            .timestamp(1_700_000_000_000)
            .raw_value(3120.0)
            .index(76.5)
            .status(Status::Alert)
            .build();
        let text = format_alert_message(&DeviceId::default(), &reading);
        assert!(text.starts_with("⚠️ GAS ALERT\n"));
        assert!(text.contains("Device: esp32_01"));
        assert!(text.contains("Index: 76.5"));
        assert!(text.contains("ADC: 3120"));
        assert!(text.contains("TS: 1700000000000"));
        assert!(text.contains("Time: 2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_message_without_timestamp() {
        let text = format_alert_message(&DeviceId::default(), &with_status(Status::Alert));
        assert!(text.contains("TS: 0"));
        assert!(!text.contains("Time:"));
    }
}
