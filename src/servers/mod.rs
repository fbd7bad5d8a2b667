//! Server implementations
//!
//! - character: the CHARACTER port of the login flow

pub mod character;
