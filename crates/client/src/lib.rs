//! # efris-client
//!
//! Sitzungsschluessel-Lebenszyklus, Transport und Dispatcher.
//!
//! Ablauf eines Aufrufs:
//! Dispatcher -> SessionKeyManager (Schluessel sicherstellen) -> Codec (bauen)
//! -> Transport -> Codec (entpacken) -> Aufrufer

pub mod config;
pub mod dispatcher;
pub mod session_key;
pub mod transport;

pub use config::ClientConfig;
pub use dispatcher::Dispatcher;
pub use session_key::{normalize_session_key, SessionKey, SessionKeyManager, STANDARD_TTL};
pub use transport::{HttpTransport, Transport, TransportAntwort};
