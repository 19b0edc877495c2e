//! Engine worker request and response types

use std::sync::Arc;

use super::{CancelToken, DocumentInfo, EngineError, Raster};

/// Generation number of a viewing session. Bumped on every document selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to the engine worker
#[derive(Debug)]
pub enum EngineRequest {
    /// Release whatever is open and load a new document
    Open {
        session: SessionId,
        url: String,
        cancel: CancelToken,
    },

    /// Render one page of the open document
    Render {
        id: RequestId,
        session: SessionId,
        page: usize,
        scale: f32,
        cancel: CancelToken,
    },

    /// Drop the document of a session, if it is still the open one
    Release(SessionId),

    /// Shutdown the worker
    Shutdown,
}

/// Response from the engine worker
#[derive(Debug)]
pub enum EngineResponse {
    Opened {
        session: SessionId,
        info: DocumentInfo,
        attempts: u32,
    },

    OpenFailed {
        session: SessionId,
        attempts: u32,
        error: EngineError,
    },

    /// The session was superseded while loading
    OpenCancelled(SessionId),

    Rendered {
        id: RequestId,
        session: SessionId,
        page: usize,
        scale: f32,
        raster: Arc<Raster>,
    },

    RenderFailed {
        id: RequestId,
        page: usize,
        error: EngineError,
    },

    /// The render was superseded before its result could be used
    RenderCancelled(RequestId),
}
