//! Unit test modules.

mod drill_run_test;
mod target_test;
