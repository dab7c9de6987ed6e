//! Uhr-Abstraktion
//!
//! Der Sitzungsschluessel-Cache fragt die Zeit nur ueber [`Clock`] ab,
//! damit TTL-Verhalten in Tests deterministisch pruefbar ist.

use std::sync::atomic::{AtomicI64, Ordering};

/// Zeitquelle in Epoch-Sekunden
pub trait Clock: Send + Sync {
    fn jetzt(&self) -> i64;
}

/// Systemuhr (UTC)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn jetzt(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Manuell gestellte Uhr fuer Tests
#[derive(Debug, Default)]
pub struct ManualClock {
    sekunden: AtomicI64,
}

impl ManualClock {
    pub fn neu(start: i64) -> Self {
        Self {
            sekunden: AtomicI64::new(start),
        }
    }

    pub fn setzen(&self, sekunden: i64) {
        self.sekunden.store(sekunden, Ordering::SeqCst);
    }

    pub fn vorstellen(&self, sekunden: i64) {
        self.sekunden.fetch_add(sekunden, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn jetzt(&self) -> i64 {
        self.sekunden.load(Ordering::SeqCst)
    }
}
