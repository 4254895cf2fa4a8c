//! In-memory controller for tests and offline development.
//!
//! Simulates the device: commands update per-zone status records that
//! later status queries return, failures can be scripted, and every call
//! is recorded for inspection.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{MAX_REPORTED_COLORS, PatternCommand, Rgb, ZoneStatus, format_color_list};
use crate::transport::ControllerTransport;

/// A scripted failure for the next query or send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Connect,
    Timeout,
    /// Only meaningful for queries: the body is not a zone array.
    BadResponse,
}

impl MockFailure {
    fn into_error(self) -> Error {
        match self {
            Self::Connect => Error::Connect {
                url: "http://mock/".into(),
                reason: "connection refused".into(),
            },
            Self::Timeout => Error::Timeout { timeout_secs: 10 },
            Self::BadResponse => Error::BadResponse {
                message: "expected a JSON array of zone records".into(),
                body: "<html>".into(),
            },
        }
    }
}

/// Mock controller transport.
///
/// Cheap to clone; clones share the simulated device.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockDevice>>,
}

#[derive(Debug, Default)]
struct MockDevice {
    zones: BTreeMap<u8, ZoneStatus>,
    spotlight_layouts: HashMap<u8, Vec<usize>>,
    query_failures: VecDeque<MockFailure>,
    send_failures: VecDeque<MockFailure>,
    ignored_commands: usize,
    send_delay: Duration,
    query_delay: Duration,
    sent: Vec<PatternCommand>,
    queries: usize,
    in_flight: HashMap<u8, usize>,
    max_in_flight: HashMap<u8, usize>,
}

impl MockTransport {
    /// A controller reporting `zones` all dark.
    pub fn with_zones(zones: impl IntoIterator<Item = u8>) -> Self {
        let mock = Self::default();
        {
            let mut device = mock.lock();
            for zone in zones {
                device.zones.insert(zone, ZoneStatus::off(zone));
            }
        }
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockDevice> {
        self.inner.lock().expect("mock transport lock poisoned")
    }

    /// Replace the status reported for `status.num`.
    pub fn set_status(&self, status: ZoneStatus) {
        self.lock().zones.insert(status.num, status);
    }

    /// Drop `zone` from future status responses.
    pub fn remove_zone(&self, zone: u8) {
        self.lock().zones.remove(&zone);
    }

    pub fn status(&self, zone: u8) -> Option<ZoneStatus> {
        self.lock().zones.get(&zone).cloned()
    }

    /// Report spotlight patterns on `zone` through these 0-based LED
    /// indices, the way the device truncates them.
    pub fn set_spotlight_layout(&self, zone: u8, layout: Vec<usize>) {
        self.lock().spotlight_layouts.insert(zone, layout);
    }

    pub fn fail_next_query(&self, failure: MockFailure) {
        self.lock().query_failures.push_back(failure);
    }

    pub fn fail_next_send(&self, failure: MockFailure) {
        self.lock().send_failures.push_back(failure);
    }

    /// Acknowledge the next `count` commands without applying them.
    pub fn ignore_next_commands(&self, count: usize) {
        self.lock().ignored_commands += count;
    }

    pub fn set_send_delay(&self, delay: Duration) {
        self.lock().send_delay = delay;
    }

    pub fn set_query_delay(&self, delay: Duration) {
        self.lock().query_delay = delay;
    }

    /// Every command received, in arrival order.
    pub fn sent_commands(&self) -> Vec<PatternCommand> {
        self.lock().sent.clone()
    }

    pub fn sent_for_zone(&self, zone: u8) -> Vec<PatternCommand> {
        self.lock()
            .sent
            .iter()
            .filter(|c| c.zone == zone)
            .cloned()
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.lock().queries
    }

    /// Highest number of overlapping `send_command` calls seen for `zone`.
    pub fn max_in_flight(&self, zone: u8) -> usize {
        self.lock().max_in_flight.get(&zone).copied().unwrap_or(0)
    }
}

impl MockDevice {
    fn apply(&mut self, command: &PatternCommand) {
        let reported = match self.spotlight_layouts.get(&command.zone) {
            Some(layout) if command.pattern_type == "spotlight" => layout
                .iter()
                .map(|&i| command.colors.get(i).copied().unwrap_or(Rgb::OFF))
                .take(MAX_REPORTED_COLORS)
                .collect::<Vec<_>>(),
            _ => command
                .colors
                .iter()
                .copied()
                .take(MAX_REPORTED_COLORS)
                .collect(),
        };

        let led_cnt = self.zones.get(&command.zone).and_then(|z| z.led_cnt);
        self.zones.insert(
            command.zone,
            ZoneStatus {
                num: command.zone,
                pattern: Some(command.pattern_type.clone()),
                is_on: Some(!command.is_off()),
                speed: command.speed,
                gap: command.gap,
                direction: Some(command.direction.clone()),
                number_of_colors: Some(command.num_colors),
                color_str: Some(format_color_list(&reported)),
                led_cnt,
            },
        );
    }
}

#[async_trait]
impl ControllerTransport for MockTransport {
    async fn query_status(&self) -> Result<Vec<ZoneStatus>, Error> {
        let delay = {
            let mut device = self.lock();
            device.queries += 1;
            device.query_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut device = self.lock();
        if let Some(failure) = device.query_failures.pop_front() {
            return Err(failure.into_error());
        }
        Ok(device.zones.values().cloned().collect())
    }

    async fn send_command(&self, command: &PatternCommand) -> Result<(), Error> {
        let delay = {
            let mut device = self.lock();
            let count = device.in_flight.entry(command.zone).or_default();
            *count += 1;
            let now = *count;
            let max = device.max_in_flight.entry(command.zone).or_default();
            *max = (*max).max(now);
            device.send_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut device = self.lock();
        if let Some(count) = device.in_flight.get_mut(&command.zone) {
            *count = count.saturating_sub(1);
        }
        device.sent.push(command.clone());

        if let Some(failure) = device.send_failures.pop_front() {
            return Err(failure.into_error());
        }
        if device.ignored_commands > 0 {
            device.ignored_commands -= 1;
            return Ok(());
        }
        device.apply(command);
        Ok(())
    }
}
