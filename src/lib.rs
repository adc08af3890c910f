pub mod acquisition;
pub mod args;
pub mod classifier;
pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod history;
pub mod labeling;
pub mod serial_link;
pub mod store;
pub mod types;
