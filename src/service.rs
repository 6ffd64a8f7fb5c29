//! Line-oriented request handling for `savekeep serve`.
//!
//! Each request is one JSON object:
//!
//! ```text
//! {"op":"load","owner":"alice","save_id":"slot1"}
//! {"op":"action","owner":"alice","save_id":"slot1","action":{"type":"rest"}}
//! {"op":"update","owner":"alice","save_id":"slot1","record":{...}}
//! ```
//!
//! and produces exactly one JSON response line.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::game::actions::Dispatcher;
use crate::game::errors::{ErrorKind, GameError, GameResult};
use crate::game::session::SessionManager;
use crate::game::types::{Action, ActionResult, SaveRecord};
use crate::logutil::session_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Load,
    Reload,
    Fetch,
    Update,
    Flush,
    Unload,
    Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub op: Op,
    pub owner: String,
    pub save_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
    /// Replacement record for `update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<SaveRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Response {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<SaveRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ActionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    fn done() -> Self {
        Response {
            ok: true,
            ..Response::default()
        }
    }

    fn with_record(record: SaveRecord) -> Self {
        Response {
            ok: true,
            record: Some(record),
            ..Response::default()
        }
    }

    fn failed(err: &GameError) -> Self {
        Response {
            ok: false,
            error: Some(err.kind()),
            message: Some(err.to_string()),
            ..Response::default()
        }
    }
}

/// Session table plus dispatcher, shared by every request.
pub struct SaveService {
    sessions: SessionManager,
    dispatcher: Dispatcher,
}

impl SaveService {
    pub fn new(sessions: SessionManager, dispatcher: Dispatcher) -> Self {
        Self { sessions, dispatcher }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn handle(&self, request: &Request) -> Response {
        debug!(
            "request {:?} for {}",
            request.op,
            session_label(&request.owner, &request.save_id)
        );
        match self.try_handle(request) {
            Ok(response) => response,
            Err(e) => Response::failed(&e),
        }
    }

    fn try_handle(&self, req: &Request) -> GameResult<Response> {
        let (owner, save_id) = (req.owner.as_str(), req.save_id.as_str());
        match req.op {
            Op::Load => {
                self.sessions.load(owner, save_id)?;
                Ok(Response::with_record(self.sessions.fetch(owner, save_id)?))
            }
            Op::Reload => {
                self.sessions.reload(owner, save_id)?;
                Ok(Response::with_record(self.sessions.fetch(owner, save_id)?))
            }
            Op::Fetch => Ok(Response::with_record(self.sessions.fetch(owner, save_id)?)),
            Op::Update => {
                let record = req
                    .record
                    .clone()
                    .ok_or_else(|| GameError::Validation("update op requires a record".into()))?;
                self.sessions.update(owner, save_id, record)?;
                Ok(Response::with_record(self.sessions.fetch(owner, save_id)?))
            }
            Op::Flush => {
                self.sessions.flush(owner, save_id)?;
                Ok(Response::done())
            }
            Op::Unload => {
                self.sessions.unload(owner, save_id)?;
                Ok(Response::done())
            }
            Op::Action => {
                let action = req
                    .action
                    .as_ref()
                    .ok_or_else(|| GameError::Validation("action op requires an action".into()))?;
                let result = self.sessions.apply(owner, save_id, &self.dispatcher, action)?;
                Ok(Response {
                    ok: result.success,
                    result: Some(result),
                    ..Response::default()
                })
            }
        }
    }

    /// Parse one request line and render its response line.
    pub fn handle_line(&self, line: &str) -> String {
        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(&request),
            Err(e) => Response::failed(&GameError::Validation(format!("malformed request: {}", e))),
        };
        serde_json::to_string(&response).unwrap_or_else(|e| {
            format!(
                "{{\"ok\":false,\"error\":\"internal\",\"message\":\"{}\"}}",
                e.to_string().replace('"', "'")
            )
        })
    }
}
