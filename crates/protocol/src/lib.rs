//! efris-protocol – Umschlag- und Schnittstellen-Definitionen
//!
//! Dieses Crate definiert den JSON-Umschlag, der jede Anfrage und Antwort
//! umhuellt, sowie die Zuordnung von Operationsnamen zu Schnittstellencodes.

pub mod envelope;
pub mod interface;

pub use envelope::{
    Absender, Data, DataDescription, Envelope, ExtendField, GlobalInfo, OfflineInvoiceException,
    ReturnStateInfo,
};
pub use interface::{InterfaceDescriptor, InterfaceRegistry, SCHLUESSELAUSTAUSCH};
