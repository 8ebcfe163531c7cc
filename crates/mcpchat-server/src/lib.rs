//! HTTP surface for the mcpchat turn engine
//!
//! The router is exposed as a library so tests can drive it in-process.

pub mod http;
