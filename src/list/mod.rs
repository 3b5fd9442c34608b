//! List-view controller: pagination, page-scoped selection, bulk delete.

mod controller;
mod pagination;
mod selection;

pub use controller::{ListController, ListState};
pub use pagination::PageItem;
