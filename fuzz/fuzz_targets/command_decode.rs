//! Fuzz target for ClientCommand::decode
//!
//! Feeds arbitrary bytes (as lossy UTF-8) to the inbound command decoder.
//!
//! # Invariants
//!
//! - Decoding NEVER panics; invalid input returns an error
//! - Anything that decodes re-encodes, and the re-encoding decodes to the
//!   same command

#![no_main]

use libfuzzer_sys::fuzz_target;
use qkd_proto::ClientCommand;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);

    if let Ok(command) = ClientCommand::decode(&text) {
        if let Ok(encoded) = command.encode() {
            assert_eq!(ClientCommand::decode(&encoded).ok(), Some(command));
        }
    }
});
