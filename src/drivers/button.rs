//! ISR-debounced toggle button driver.
//!
//! ## Hardware
//!
//! Active-low momentary switch with internal pull-up. GPIO fires on the
//! falling edge; the ISR holds a [`ButtonHandle`] and records the raw
//! timestamp into its atomic — it performs no I/O and holds no other
//! resources.  `poll()`, called once per supervisory cycle, drains the
//! flag and applies the minimum time-since-last-edge debounce
//! threshold.  Single producer (the ISR), single consumer (the loop).

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Producer half: give this to the GPIO edge interrupt.
#[derive(Clone)]
pub struct ButtonHandle {
    edge_ms: Arc<AtomicU32>,
}

impl ButtonHandle {
    /// Record an edge.  Safe to call from interrupt context
    /// (single lock-free atomic store).
    pub fn record_edge(&self, now_ms: u32) {
        self.edge_ms.store(now_ms, Ordering::Release);
    }
}

/// Consumer half, owned by the agent.
pub struct ButtonDriver {
    edge_ms: Arc<AtomicU32>,
    debounce_ms: u32,
    last_seen_ms: u32,
    last_accepted_ms: u32,
}

impl ButtonDriver {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            edge_ms: Arc::new(AtomicU32::new(0)),
            debounce_ms,
            last_seen_ms: 0,
            last_accepted_ms: 0,
        }
    }

    /// Producer handle for ISR registration.
    pub fn handle(&self) -> ButtonHandle {
        ButtonHandle {
            edge_ms: Arc::clone(&self.edge_ms),
        }
    }

    /// Drain the edge flag.  Returns `true` when a debounced press was
    /// accepted this cycle.
    pub fn poll(&mut self) -> bool {
        let edge_ms = self.edge_ms.load(Ordering::Acquire);
        if edge_ms == 0 || edge_ms == self.last_seen_ms {
            return false;
        }
        self.last_seen_ms = edge_ms;

        let since_last = edge_ms.wrapping_sub(self.last_accepted_ms);
        if self.last_accepted_ms != 0 && since_last < self.debounce_ms {
            return false;
        }
        self.last_accepted_ms = edge_ms;
        true
    }
}
