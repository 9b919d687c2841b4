//! Value records flowing through the pipeline
//!
//! Both types are immutable once built: a `PageDescriptor` names something to
//! fetch, an `Item` is one product row destined for the record sink.

mod item;
mod page;

pub use item::{Item, RECORD_COLUMNS};
pub use page::PageDescriptor;
