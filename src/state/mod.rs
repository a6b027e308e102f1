//! Shared concurrent state helpers.

mod dashmap_ext;

pub use dashmap_ext::DashMapExt;
