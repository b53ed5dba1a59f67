//! End-to-end registry tests

pub mod binary_tests;
pub mod client_tests;
pub mod connect_tests;
pub mod wire_tests;
