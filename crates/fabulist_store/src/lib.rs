//! In-memory content store for the Fabulist storyboard engine.
//!
//! [`InMemoryContentStore`] implements every store trait from
//! `fabulist_interface` over lock-protected tables. Durable engines live
//! outside this workspace; this one backs the test suites and embedders that
//! do not need persistence.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod in_memory;

pub use in_memory::InMemoryContentStore;
