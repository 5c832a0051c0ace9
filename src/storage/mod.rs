//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Page file I/O, allocation and the free-page set
//! - [`page`] - Page types, headers and typed views

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;
