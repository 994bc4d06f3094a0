#![allow(dead_code)]

pub mod builders;
pub mod fake_api;
pub mod harness;
pub mod strategies;

pub use builders::*;
pub use fake_api::*;
pub use harness::*;
