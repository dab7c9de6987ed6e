//! efris-core – Gemeinsame Fehlertypen und Uhr-Abstraktion
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! EFRIS-Crates gemeinsam genutzt werden.

pub mod clock;
pub mod error;

// Re-Exporte fuer bequemen Zugriff
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EfrisError, FehlerArt, Result};
