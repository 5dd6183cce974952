pub mod signal_files;

pub use signal_files::{consume_signal, send_signal, write_signal};
