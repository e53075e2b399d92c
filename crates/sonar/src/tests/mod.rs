//! Test module for query-correctness and lifecycle tests.
//!
//! - `integration.rs`: end-to-end build/query scenarios, the serialized
//!   form, and the per-tick cache
//! - `properties.rs`: randomized brute-force equivalence and property tests

mod integration;
