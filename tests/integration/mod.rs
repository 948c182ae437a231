//! Integration tests
//!
//! End-to-end behaviour of the queue, the coordinator and the store backends

mod coordinator_test;
mod file_store_test;
#[cfg(feature = "http")]
mod http_remote_test;
mod queue_test;
