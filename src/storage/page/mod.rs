//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Metadata at the start of every page
//! - [`PageType`] - Discriminator for different page formats
//! - [`PageView`] / [`PageViewMut`] - Typed interpretations of page bytes

#[allow(clippy::module_inception)]
mod page;
mod page_header;
mod view;

pub use page::Page;
pub use page_header::{PageHeader, PageType};
pub use view::{PageView, PageViewMut};
