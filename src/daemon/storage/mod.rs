//!  Storage is organized through [state_storage::FileStateStorage].
//!  The basic idea is:
//!   - The whole tracker state (today's ledger and the streak) is one versioned json document.
//!   - The document is replaced atomically on every save, older layouts are migrated on load.
//!   - The in-memory copy held by the daemon is authoritative, storage is best-effort.

pub mod entities;
pub mod state_storage;
