//! Tools bundled with the built-in agent profiles.

mod haircut;

pub use haircut::{HaircutStoreCalendarTool, HaircutStoreQuery};
