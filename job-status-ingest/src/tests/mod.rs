pub mod common;
pub mod updater;
