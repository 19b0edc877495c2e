// Export modules for use in tests and by the binary
pub mod app;
pub mod bookmark;
pub mod document_list;
pub mod error;
pub mod library;
pub mod notification;
pub mod panic_handler;
pub mod pdf;
pub mod settings;
pub mod store;
pub mod thumbnail;
pub mod upload;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export main components
pub use app::App;
pub use document_list::{DocumentDescriptor, DocumentList};
pub use error::Error;
pub use viewer::{PageTarget, Phase, Viewer};
