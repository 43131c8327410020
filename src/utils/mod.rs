pub mod error;
pub mod format;
pub mod logging;
pub mod output;

pub use error::*;
pub use output::OutputStyle;

pub fn print_success(message: &str) {
    println!("✅ {}", OutputStyle::success(message));
}

pub fn print_warning(message: &str) {
    eprintln!("⚠️  {}", OutputStyle::warning(message));
}

pub fn print_error(message: &str) {
    eprintln!("❌ {}", OutputStyle::error(message));
}
