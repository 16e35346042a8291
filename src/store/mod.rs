//! Config store subsystem.
//!
//! # Data Flow
//! ```text
//! admin handler (create/update/delete)
//!     → file.rs (lock, read full document)
//!     → model.rs (defaults, shallow merge, validation)
//!     → file.rs (rewrite full document via temp file + rename)
//!
//! proxy handler
//!     → file.rs get(id) (lock-free snapshot read)
//! ```
//!
//! # Design Decisions
//! - The store is the only owner of config state; nothing caches the list
//! - One JSON document, full rewrite per mutation (small cardinality only)
//! - Older record shapes are accepted on read, written back canonically

mod compat;
pub mod error;
pub mod file;
pub mod model;

pub use error::StoreError;
pub use file::ConfigStore;
pub use model::{ApiConfig, ApiConfigInput, CustomField, CustomFieldKind, HttpMethod};
