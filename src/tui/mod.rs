//! TUI module for terminal user interfaces

mod validation;

pub use validation::{ValidationApp, ValidationRun};
