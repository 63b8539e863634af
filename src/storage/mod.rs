pub mod base;
pub mod file_jar;
pub mod memory_jar;
pub mod no_jar;

// Re-export the primary jar items so code outside can do
// "use crate::storage::{CookieJar, create_jar};"
pub use base::{create_jar, CookieJar};
pub use file_jar::FileJar;
pub use memory_jar::MemoryJar;
pub use no_jar::NoJar;
