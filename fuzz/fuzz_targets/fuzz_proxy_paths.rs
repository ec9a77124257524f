//! Fuzz testing for proxy path handling and `Accept` negotiation.
//!
//! Checks that for any input:
//!
//! - `match_prefix` and `rewrite_path` never panic
//! - A matched path rewritten with the identity mapping is unchanged
//! - A matched path rewritten to another prefix starts with that prefix
//! - `ResponseKind::from_accept` never panics on arbitrary header bytes
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_proxy_paths -- -max_total_time=60
//! ```

#![no_main]

use axum::http::HeaderValue;
use libfuzzer_sys::fuzz_target;
use petcare_bff::Config;
use petcare_bff::proxy::{match_prefix, rewrite_path};
use petcare_bff::upstream::ResponseKind;

fuzz_target!(|data: &[u8]| {
    let prefixes = Config::default().proxy_prefixes;

    if let Ok(path) = std::str::from_utf8(data) {
        if let Some(prefix) = match_prefix(path, &prefixes) {
            assert_eq!(rewrite_path(path, prefix, prefix), path);
            assert!(rewrite_path(path, prefix, "/v2").starts_with("/v2"));
        }
    }

    if let Ok(accept) = HeaderValue::from_bytes(data) {
        let _ = ResponseKind::from_accept(Some(&accept));
    }
});
