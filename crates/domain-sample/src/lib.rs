//! # Domain Sample Library
//!
//! This library exposes the modules of the sample backoffice for integration testing.

pub mod backoffice;
pub mod lifecycle;
pub mod model;
pub mod operations;
pub mod partner;
pub mod serializers;
pub mod settings;
pub mod store;
