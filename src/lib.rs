pub mod capture;
pub mod config;
pub mod link;
pub mod monitoring;
pub mod payload;
pub mod session;

pub use sfspcomm::{Phase, Role};

#[cfg(test)]
mod __test__;
