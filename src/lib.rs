pub mod cli;
pub mod config;
pub mod dicom;
pub mod display;
pub mod display_metadata;
pub mod interaction;
pub mod layout;
pub mod overlay;
pub mod render;
pub mod store;
pub mod study;
pub mod types;
pub mod viewer;
pub mod viewport;

// Re-export commonly used items
pub use display_metadata::print_metadata;
pub use viewer::{Session, Viewer};
