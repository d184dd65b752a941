#![allow(dead_code, unused_imports)]

pub use emuharness_test_utils::builders;
pub use emuharness_test_utils::{free_port, init_tracing, teardown, with_timeout, with_timeout_secs};
