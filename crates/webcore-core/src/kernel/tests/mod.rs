pub mod bootstrap_tests;
pub mod context_tests;
