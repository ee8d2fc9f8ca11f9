//! Configuration registry.
//!
//! One ordered tree of settings, seeded from the host runtime and extended
//! by INI sources and explicit mappings:
//! 1. **Bootstrap** - interpreter settings, constants, extensions and
//!    already-loaded files from a [`RuntimeSnapshot`](crate::runtime::RuntimeSnapshot)
//! 2. **Parse** - INI files (searched on `include_path`), INI text, or streams
//! 3. **Put** - mappings merged directly by callers
//!
//! ## Merge Strategy
//! - Top-level mappings: shallow merge, incoming keys win
//! - Everything else: replaced outright
//!
//! ## Environment Variables
//! - `BOOTSTRAP_SCANNER_MODE` - `typed` (default) or `raw`
//! - `BOOTSTRAP_EXPORT_CONSTANTS` - Allow constant export
//! - `BOOTSTRAP_CHECK_ON_ADD_CLASS` - Default filesystem check for `add_class`
//! - `BOOTSTRAP_CLASS_EXTENSION` - Class file suffix (default: `.php`)

mod address;
mod files;
mod merge;
mod source;
mod store;
mod types;

pub use address::Address;
pub use files::{find_in_dirs, search_dirs};
pub use merge::{merge_into, shallow_merge};
pub use source::{Source, drain, parse_ini};
pub use store::ConfigStore;
pub use types::*;
