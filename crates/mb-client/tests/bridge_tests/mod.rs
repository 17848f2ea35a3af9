//! Bridge integration tests
//!
//! - `common` - companion plugin mock, push feed mock, recording host
//! - `push_channel_tests` - live feed correlation, loss, and handshake
//! - `lifecycle_tests` - connect/disconnect against the companion surface
//! - `registry_tests` - registry reconciliation and reload sweeps


pub mod lifecycle_tests;
pub mod push_channel_tests;
pub mod registry_tests;
