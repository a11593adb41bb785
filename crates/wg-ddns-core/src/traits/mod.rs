//! Core traits for the wg-ddns system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ServiceManager`]: List units and restart them through the process supervisor
//! - [`Resolver`]: Resolve endpoint hostnames to IPv4 addresses

pub mod resolver;
pub mod service_manager;

pub use resolver::Resolver;
pub use service_manager::{JobHandle, JobMode, JobResult, ServiceManager, UnitStatus};
