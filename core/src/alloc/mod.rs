//! Huge-page backed arenas (spec §4.2, design notes "Huge-page backed arenas").

pub mod huge_page;

pub use huge_page::{AllocFlags, HugePageArray};
