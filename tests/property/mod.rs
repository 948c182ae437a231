//! Property-based tests

mod conflict_proptest;
mod merge_proptest;
