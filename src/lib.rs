//! Podcopy Library
//!
//! Directory migration between Kubernetes pods through a local staging archive

pub mod input;
pub mod kube;
pub mod logger;
pub mod progress;
pub mod prompt;
pub mod transfer;
pub mod validate;
