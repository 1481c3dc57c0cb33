//! libvirt-metrics common library
pub mod collector;
pub mod error;
pub mod hypervisor;
pub mod labels;
pub mod metrics;
pub mod naming;
pub mod openmetrics;
pub mod stats;

pub use error::{Error, Result};
