//! Fuzz target for upload name validation
//!
//! Arbitrary file names go through the same validation the upload endpoint
//! uses, then into in-memory storage.
//!
//! # Invariants
//!
//! - Validation NEVER panics
//! - Accepted names contain no path separator and are not `.` or `..`
//! - Accepted names round-trip through storage unchanged

#![no_main]

use libfuzzer_sys::fuzz_target;
use qkd_server::{MemoryStorage, Storage, storage::validate_name};

fuzz_target!(|data: (String, Vec<u8>)| {
    let (name, contents) = data;

    if validate_name(&name).is_err() {
        return;
    }

    assert!(!name.contains(['/', '\\', '\0']));
    assert!(name != "." && name != "..");

    let store = MemoryStorage::new();
    if store.put(&name, &contents).is_ok() {
        assert_eq!(store.get(&name).ok(), Some(contents));
    }
});
