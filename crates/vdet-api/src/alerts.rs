//! Bounded in-memory alert log.

use std::collections::VecDeque;
use std::sync::RwLock;

use vdet_models::Alert;

/// Append-only alert store holding at most `capacity` entries.
///
/// When full, the oldest alert is evicted.
pub struct AlertStore {
    alerts: RwLock<VecDeque<Alert>>,
    capacity: usize,
}

impl AlertStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            alerts: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an alert, returning how many were evicted.
    pub fn push(&self, alert: Alert) -> usize {
        let mut alerts = match self.alerts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut evicted = 0;
        while alerts.len() >= self.capacity {
            alerts.pop_front();
            evicted += 1;
        }
        alerts.push_back(alert);
        evicted
    }

    /// All alerts in insertion order.
    pub fn list(&self) -> Vec<Alert> {
        match self.alerts.read() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
