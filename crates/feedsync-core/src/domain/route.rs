//! Route table: how each queue kind replays against the REST API.
//!
//! `QueueKind::route` is an exhaustive `match`. Adding a kind without a route
//! is a compile error, so no record can sit in a store without an endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

use super::QueueKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved HTTP call for one queue record.
///
/// The path is kept as raw segments; the transport percent-encodes them when
/// joining onto its base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    pub method: HttpMethod,
    pub segments: Vec<String>,
    pub body: Value,
}

impl ReplayRequest {
    fn new(method: HttpMethod, segments: &[&str], body: Value) -> Self {
        Self {
            method,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            body,
        }
    }

    /// Unencoded path, e.g. `/api/feedback/abc/comments`.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("payload for {queue} is missing string field `{field}`")]
    MissingField { queue: QueueKind, field: &'static str },

    #[error("payload for {queue} must be a JSON object")]
    NotAnObject { queue: QueueKind },
}

impl QueueKind {
    /// Map a queued payload to the HTTP call that delivers it.
    pub fn route(self, data: &Value) -> Result<ReplayRequest, RouteError> {
        match self {
            QueueKind::FeedbackCreate => Ok(ReplayRequest::new(
                HttpMethod::Post,
                &["api", "feedback"],
                data.clone(),
            )),
            QueueKind::FeedbackUpdate => {
                let object = data
                    .as_object()
                    .ok_or(RouteError::NotAnObject { queue: self })?;
                let id = self.string_field(data, "feedbackId")?;
                let body: Map<String, Value> = object
                    .iter()
                    .filter(|(k, _)| k.as_str() != "feedbackId")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                Ok(ReplayRequest::new(
                    HttpMethod::Put,
                    &["api", "feedback", id],
                    Value::Object(body),
                ))
            }
            QueueKind::CommentCreate => {
                let id = self.string_field(data, "feedbackId")?;
                let content = self.string_field(data, "content")?;
                Ok(ReplayRequest::new(
                    HttpMethod::Post,
                    &["api", "feedback", id, "comments"],
                    json!({ "content": content }),
                ))
            }
            QueueKind::UpvoteToggle => {
                let id = self.string_field(data, "feedbackId")?;
                Ok(ReplayRequest::new(
                    HttpMethod::Post,
                    &["api", "feedback", id, "upvote"],
                    json!({}),
                ))
            }
            QueueKind::Report => {
                let id = self.string_field(data, "feedbackId")?;
                let reason = self.string_field(data, "reason")?;
                Ok(ReplayRequest::new(
                    HttpMethod::Post,
                    &["api", "feedback", id, "report"],
                    json!({ "reason": reason }),
                ))
            }
        }
    }

    fn string_field<'a>(self, data: &'a Value, field: &'static str) -> Result<&'a str, RouteError> {
        data.get(field)
            .and_then(Value::as_str)
            .ok_or(RouteError::MissingField { queue: self, field })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(QueueKind::FeedbackCreate, json!({"title": "t", "body": "b"}), HttpMethod::Post, "/api/feedback", json!({"title": "t", "body": "b"}))]
    #[case(QueueKind::FeedbackUpdate, json!({"feedbackId": "f1", "title": "new"}), HttpMethod::Put, "/api/feedback/f1", json!({"title": "new"}))]
    #[case(QueueKind::CommentCreate, json!({"feedbackId": "abc", "content": "nice"}), HttpMethod::Post, "/api/feedback/abc/comments", json!({"content": "nice"}))]
    #[case(QueueKind::UpvoteToggle, json!({"feedbackId": "abc"}), HttpMethod::Post, "/api/feedback/abc/upvote", json!({}))]
    #[case(QueueKind::Report, json!({"feedbackId": "x", "reason": "spam"}), HttpMethod::Post, "/api/feedback/x/report", json!({"reason": "spam"}))]
    fn routes_match_endpoint_table(
        #[case] kind: QueueKind,
        #[case] data: Value,
        #[case] method: HttpMethod,
        #[case] path: &str,
        #[case] body: Value,
    ) {
        let req = kind.route(&data).unwrap();
        assert_eq!(req.method, method);
        assert_eq!(req.path(), path);
        assert_eq!(req.body, body);
    }

    #[test]
    fn comment_body_drops_extra_fields() {
        let data = json!({"feedbackId": "abc", "content": "hi", "userId": "u1"});
        let req = QueueKind::CommentCreate.route(&data).unwrap();
        assert_eq!(req.body, json!({"content": "hi"}));
    }

    #[test]
    fn missing_feedback_id_is_reported() {
        let err = QueueKind::UpvoteToggle.route(&json!({})).unwrap_err();
        assert_eq!(
            err,
            RouteError::MissingField {
                queue: QueueKind::UpvoteToggle,
                field: "feedbackId"
            }
        );
    }

    #[test]
    fn update_requires_object_payload() {
        let err = QueueKind::FeedbackUpdate.route(&json!("oops")).unwrap_err();
        assert!(matches!(err, RouteError::NotAnObject { .. }));
    }

    #[test]
    fn every_kind_has_a_route() {
        let data = json!({"feedbackId": "id", "content": "c", "reason": "r"});
        for kind in QueueKind::ALL {
            assert!(kind.route(&data).is_ok(), "{kind} has no route");
        }
    }
}
