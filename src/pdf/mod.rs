//! PDF rendering infrastructure
//!
//! The engine is reached through [`RenderEngine`] / [`LoadedDocument`]. The
//! viewer talks to it through a dedicated worker thread ([`engine_worker`])
//! using the request/response types in this module; thumbnails call the
//! engine directly from their own workers.

mod cancel;
mod engine;
#[cfg(feature = "pdf")]
mod mupdf_engine;
mod request;
mod retry;
mod types;
mod worker;

pub use cancel::CancelToken;
pub use engine::{EngineError, LoadedDocument, RenderEngine};
#[cfg(feature = "pdf")]
pub use mupdf_engine::{MupdfDocument, MupdfEngine};
pub use request::{EngineRequest, EngineResponse, RequestId, SessionId};
pub use retry::{RetryError, RetryPolicy};
pub use types::{DocumentInfo, PageSize, Raster};
pub use worker::{engine_worker, open_with_retry};
