//! Utility modules for mediator scheduling

pub mod hashing;

pub use hashing::sha256;
