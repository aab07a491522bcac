//! File actions module.
//!
//! Removal of the redundant copies chosen by retention, with:
//! - A survivor check before every removal
//! - TOCTOU verification against the scanned size
//! - Per-file failure accounting
//!
//! ```no_run
//! use spandupe::actions::permanent_delete;
//! use std::path::Path;
//!
//! let result = permanent_delete(Path::new("/mnt/disk2/movies/x.mkv"));
//! ```

pub mod delete;

pub use delete::{
    delete_redundant, permanent_delete, validate_preserves_copy, BatchDeleteResult, DeleteError,
    DeleteResult, FileSnapshot,
};
