//! HTTP/2 server push over an `h2` request stream.
//!
//! # Responsibilities
//! - Send PUSH_PROMISE frames on the primary request's stream
//! - Answer each promised stream with the asset (200) or 404
//! - Classify `h2` errors into push outcomes
//!
//! # Design Decisions
//! - Borrows the primary stream's `SendResponse` only while promises are
//!   issued; bodies go out on the promised streams, which own themselves
//! - Body writes respect stream flow control

use bytes::Bytes;
use futures_util::future::poll_fn;
use h2::server::{SendPushedResponse, SendResponse};
use h2::{Reason, SendStream};
use http::{header, Request, Response, StatusCode};
use std::cell::RefCell;

use crate::asset::AssetPath;
use crate::http::files::{FileError, StaticFiles};
use crate::http::request::Origin;
use crate::push::{PromisedPush, PushError, PushJob, PushStream};

/// `PushStream` for one primary request.
pub struct H2PushStream<'a> {
    respond: RefCell<&'a mut SendResponse<Bytes>>,
    origin: Origin,
    files: StaticFiles,
}

impl<'a> H2PushStream<'a> {
    pub fn new(respond: &'a mut SendResponse<Bytes>, origin: Origin, files: StaticFiles) -> Self {
        Self {
            respond: RefCell::new(respond),
            origin,
            files,
        }
    }
}

impl PushStream for H2PushStream<'_> {
    type Promised = H2PromisedPush;

    fn promise(&self, job: &PushJob) -> Result<H2PromisedPush, PushError> {
        let uri = self
            .origin
            .uri(&job.request_path)
            .map_err(|e| PushError::InvalidRequest(e.to_string()))?;
        let request = Request::get(uri)
            .body(())
            .map_err(|e| PushError::InvalidRequest(e.to_string()))?;

        let pushed = self
            .respond
            .borrow_mut()
            .push_request(request)
            .map_err(|e| {
                // Push disabled by SETTINGS or the primary stream is gone.
                if e.is_io() || e.is_go_away() || e.is_reset() {
                    PushError::Closed
                } else {
                    PushError::Disabled
                }
            })?;

        Ok(H2PromisedPush {
            pushed,
            path: job.path.clone(),
            files: self.files.clone(),
        })
    }
}

/// A promised stream awaiting its response.
pub struct H2PromisedPush {
    pushed: SendPushedResponse<Bytes>,
    path: AssetPath,
    files: StaticFiles,
}

impl PromisedPush for H2PromisedPush {
    async fn deliver(mut self) -> Result<(), PushError> {
        let asset = match self.files.load(&self.path).await {
            Ok(asset) => asset,
            Err(FileError::NotFound) => {
                let response = Response::builder()
                    .status(StatusCode::NOT_FOUND)
                    .body(())
                    .map_err(|e| PushError::Transport(e.to_string()))?;
                self.pushed
                    .send_response(response, true)
                    .map_err(classify)?;
                return Err(PushError::NotFound);
            }
            Err(e) => {
                self.pushed.send_reset(Reason::INTERNAL_ERROR);
                return Err(PushError::Transport(e.to_string()));
            }
        };

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, asset.content_type)
            .header(header::CACHE_CONTROL, self.files.cache_control())
            .header(header::CONTENT_LENGTH, asset.body.len())
            .body(())
            .map_err(|e| PushError::Transport(e.to_string()))?;

        let mut stream = self
            .pushed
            .send_response(response, asset.body.is_empty())
            .map_err(classify)?;
        send_body(&mut stream, asset.body).await.map_err(classify)
    }
}

/// Write `body` on `stream` within its flow-control window, then end it.
pub(crate) async fn send_body(stream: &mut SendStream<Bytes>, mut body: Bytes) -> Result<(), h2::Error> {
    while !body.is_empty() {
        stream.reserve_capacity(body.len());
        let granted = match poll_fn(|cx| stream.poll_capacity(cx)).await {
            Some(Ok(granted)) => granted,
            Some(Err(e)) => return Err(e),
            None => return Err(h2::Error::from(Reason::CANCEL)),
        };
        if granted == 0 {
            continue;
        }
        let chunk = body.split_to(granted.min(body.len()));
        stream.send_data(chunk, body.is_empty())?;
    }
    Ok(())
}

/// Map an `h2` error on a pushed stream to a push outcome.
pub(crate) fn classify(err: h2::Error) -> PushError {
    match err.reason() {
        Some(Reason::REFUSED_STREAM) | Some(Reason::CANCEL) => PushError::Refused,
        _ if err.is_io() || err.is_go_away() => PushError::Closed,
        _ => PushError::Transport(err.to_string()),
    }
}
