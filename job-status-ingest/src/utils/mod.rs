pub mod debounce;
pub mod logging;
pub mod signal_handler;
