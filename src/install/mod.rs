//! Change detection and atomic installation of staged artifacts.

pub mod differ;
pub mod installer;

pub use differ::content_changed;
pub use installer::install_file;
