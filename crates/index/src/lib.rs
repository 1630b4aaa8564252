pub mod batch_builder;
pub mod file_parser;
pub mod scanner;

pub use batch_builder::{BatchBuilder, archive_entry_fingerprint};
pub use file_parser::FileParser;
pub use scanner::{ScanError, Scanner};
