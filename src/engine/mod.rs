pub mod filter;
pub mod scanner;

pub use filter::{FilterError, PostFilter};
pub use scanner::{ScanError, Scanner, ScannerState};
