//! Engine worker - runs in a dedicated thread
//!
//! Owns the open document of the current session. Requests are served in
//! order, so at most one load and one render run at any time.

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::{
    CancelToken, DocumentInfo, EngineError, EngineRequest, EngineResponse, LoadedDocument,
    RenderEngine, RequestId, RetryError, RetryPolicy, SessionId,
};

/// Load a document, retrying per `retry`, and read its metadata.
///
/// A document with no pages counts as a failed attempt.
pub fn open_with_retry<E: RenderEngine>(
    engine: &E,
    retry: &RetryPolicy,
    url: &str,
    cancel: &CancelToken,
) -> Result<(E::Document, DocumentInfo, u32), RetryError<EngineError>> {
    let ((doc, info), attempts) = retry.run(cancel, |attempt| {
        let opened = engine
            .open(url, cancel)
            .and_then(|doc| describe(&doc).map(|info| (doc, info)));
        if let Err(e) = &opened {
            if !e.is_cancelled() {
                warn!("Document load attempt {attempt}/{} failed: {e}", retry.max_attempts);
            }
        }
        opened
    })?;
    Ok((doc, info, attempts))
}

fn describe<D: LoadedDocument>(doc: &D) -> Result<DocumentInfo, EngineError> {
    let page_count = doc.page_count();
    if page_count == 0 {
        return Err(EngineError::Pdf("document has no pages".into()));
    }
    Ok(DocumentInfo {
        page_count,
        first_page: doc.page_size(1)?,
    })
}

/// Main worker function - runs in a dedicated thread
pub fn engine_worker<E: RenderEngine>(
    engine: Arc<E>,
    retry: RetryPolicy,
    requests: Receiver<EngineRequest>,
    responses: Sender<EngineResponse>,
) {
    let mut current: Option<(SessionId, E::Document)> = None;

    for request in requests {
        match request {
            EngineRequest::Open {
                session,
                url,
                cancel,
            } => {
                if let Some((previous, _)) = current.take() {
                    debug!("Released document of session {}", previous.0);
                }
                let response =
                    handle_open(engine.as_ref(), &retry, session, &url, &cancel, &mut current);
                let _ = responses.send(response);
            }

            EngineRequest::Render {
                id,
                session,
                page,
                scale,
                cancel,
            } => {
                let open = current
                    .as_ref()
                    .filter(|(open_session, _)| *open_session == session)
                    .map(|(_, doc)| doc);
                let response = handle_render(open, id, session, page, scale, &cancel);
                let _ = responses.send(response);
            }

            EngineRequest::Release(session) => {
                if current.as_ref().is_some_and(|(open, _)| *open == session) {
                    current = None;
                    debug!("Released document of session {}", session.0);
                }
            }

            EngineRequest::Shutdown => break,
        }
    }
}

fn handle_open<E: RenderEngine>(
    engine: &E,
    retry: &RetryPolicy,
    session: SessionId,
    url: &str,
    cancel: &CancelToken,
    current: &mut Option<(SessionId, E::Document)>,
) -> EngineResponse {
    match open_with_retry(engine, retry, url, cancel) {
        Ok(_) if cancel.is_cancelled() => EngineResponse::OpenCancelled(session),
        Ok((doc, info, attempts)) => {
            debug!(
                "Session {} opened after {attempts} attempt(s): {} pages",
                session.0, info.page_count
            );
            *current = Some((session, doc));
            EngineResponse::Opened {
                session,
                info,
                attempts,
            }
        }
        Err(RetryError::Cancelled { .. }) => EngineResponse::OpenCancelled(session),
        Err(RetryError::Exhausted { attempts, last }) => EngineResponse::OpenFailed {
            session,
            attempts,
            error: last,
        },
    }
}

fn handle_render<D: LoadedDocument>(
    doc: Option<&D>,
    id: RequestId,
    session: SessionId,
    page: usize,
    scale: f32,
    cancel: &CancelToken,
) -> EngineResponse {
    let Some(doc) = doc else {
        debug!("Render {:?} for closed session {}", id, session.0);
        return EngineResponse::RenderCancelled(id);
    };
    if cancel.is_cancelled() {
        return EngineResponse::RenderCancelled(id);
    }

    match doc.render_page(page, scale, cancel) {
        Ok(_) if cancel.is_cancelled() => EngineResponse::RenderCancelled(id),
        Ok(raster) => EngineResponse::Rendered {
            id,
            session,
            page,
            scale,
            raster: Arc::new(raster),
        },
        Err(EngineError::Cancelled) => EngineResponse::RenderCancelled(id),
        Err(error) => EngineResponse::RenderFailed { id, page, error },
    }
}
