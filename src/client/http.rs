//! [`RoomApi`] over the public HTTP surface: JSON RPC calls plus the room's
//! server-sent event feed.

use futures::{StreamExt, future::BoxFuture};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    client::{
        api::{ChangeStream, ClientError, JoinedRoom, RoomApi},
        snapshot::RoomSnapshot,
    },
    dao::models::RoomUpdate,
    dto::{
        player::{JoinRoomRequest, SubmitAnswerRequest},
        room::{RoomDetails, RoomSessionResponse, UpdateRoomRequest},
        sse::CHANGE_EVENT,
    },
    services::room_service::{AnswerSubmission, normalize_code},
    state::ChangeEvent,
};

/// Client contract spoken against a running server at `base_url`.
#[derive(Clone)]
pub struct HttpRoomApi {
    client: Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpRoomApi {
    /// Fails when `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::Rejected(format!("invalid server URL `{base_url}`: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Rejected(format!(
                "server URL `{base_url}` cannot carry a path"
            )));
        }
        let client = Client::builder()
            .build()
            .map_err(|err| ClientError::Unavailable(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, base_url })
    }

    /// `<base>/rooms/<code>/<tail..>` with the normalised code as one encoded segment.
    fn room_url(&self, code: &str, tail: &[&str]) -> Url {
        let code = normalize_code(code);
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("rooms").push(&code).extend(tail);
        }
        url
    }

    async fn send_json<B, T>(&self, method: Method, path: Url, body: Option<B>) -> Result<T, ClientError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let mut builder = self.client.request(method, path.clone());
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder
            .send()
            .await
            .map_err(|err| ClientError::Unavailable(format!("{path}: {err}")))?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| ClientError::Unavailable(format!("{path}: invalid response body: {err}")))
    }
}

async fn check_status(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.message)
        .unwrap_or_else(|_| status.to_string());
    Err(match status {
        StatusCode::NOT_FOUND => ClientError::NotFound,
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::UNPROCESSABLE_ENTITY => {
            ClientError::Rejected(message)
        }
        _ => ClientError::Unavailable(message),
    })
}

impl RoomApi for HttpRoomApi {
    fn join_room(&self, code: &str, name: &str) -> BoxFuture<'static, Result<JoinedRoom, ClientError>> {
        let api = self.clone();
        let path = self.room_url(code, &["join"]);
        let body = JoinRoomRequest {
            name: name.to_owned(),
        };
        Box::pin(async move {
            let session: RoomSessionResponse = api.send_json(Method::POST, path, Some(body)).await?;
            Ok(JoinedRoom {
                player_id: session.player.id,
                resumed: session.resumed,
                snapshot: RoomDetails {
                    room: session.room,
                    players: session.players,
                }
                .into(),
            })
        })
    }

    fn fetch_room(&self, code: &str) -> BoxFuture<'static, Result<RoomSnapshot, ClientError>> {
        let api = self.clone();
        let path = self.room_url(code, &[]);
        Box::pin(async move {
            let details: RoomDetails = api.send_json(Method::GET, path, None::<()>).await?;
            Ok(details.into())
        })
    }

    fn update_room(
        &self,
        code: &str,
        update: RoomUpdate,
    ) -> BoxFuture<'static, Result<(), ClientError>> {
        let api = self.clone();
        let path = self.room_url(code, &[]);
        Box::pin(async move {
            let _: serde_json::Value = api
                .send_json(Method::PATCH, path, Some(UpdateRoomRequest::from(update)))
                .await?;
            Ok(())
        })
    }

    fn submit_answer(
        &self,
        code: &str,
        submission: AnswerSubmission,
    ) -> BoxFuture<'static, Result<(), ClientError>> {
        let api = self.clone();
        let path = self.room_url(code, &["answer"]);
        Box::pin(async move {
            let _: serde_json::Value = api
                .send_json(Method::POST, path, Some(SubmitAnswerRequest::from(submission)))
                .await?;
            Ok(())
        })
    }

    fn subscribe(&self, code: &str) -> BoxFuture<'static, Result<ChangeStream, ClientError>> {
        let api = self.clone();
        let path = self.room_url(code, &["events"]);
        Box::pin(async move {
            let response = api
                .client
                .get(path.clone())
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await
                .map_err(|err| ClientError::Unavailable(format!("{path}: {err}")))?;
            let response = check_status(response).await?;
            debug!(path = %path, "change feed opened");

            let mut bytes = Box::pin(response.bytes_stream());
            let stream = async_stream::stream! {
                let mut decoder = SseDecoder::default();
                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(err) => {
                            warn!(path = %path, error = %err, "change feed interrupted");
                            break;
                        }
                    };
                    for frame in decoder.push(&chunk) {
                        if frame.event.as_deref() != Some(CHANGE_EVENT) {
                            continue;
                        }
                        match serde_json::from_str::<ChangeEvent>(&frame.data) {
                            Ok(change) => yield change,
                            Err(err) => warn!(path = %path, error = %err, "undecodable change event"),
                        }
                    }
                }
            };
            Ok(stream.boxed())
        })
    }
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SseFrame {
    event: Option<String>,
    data: String,
}

/// Incremental `text/event-stream` parser. Comments and unknown fields are skipped.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    frames.push(SseFrame {
                        event: self.event.take(),
                        data: self.data.join("\n"),
                    });
                }
                self.event = None;
                self.data.clear();
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = line.split_once(':').unwrap_or((line, ""));
            let value = value.strip_prefix(' ').unwrap_or(value);
            match field {
                "event" => self.event = Some(value.to_owned()),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_code_is_normalised_and_encoded_as_one_segment() {
        let api = HttpRoomApi::new("http://localhost:8080/api/").unwrap();
        assert_eq!(
            api.room_url(" ab/c?d ", &["join"]).as_str(),
            "http://localhost:8080/api/rooms/AB%2FC%3FD/join"
        );

        let api = HttpRoomApi::new("http://localhost:8080").unwrap();
        assert_eq!(
            api.room_url("abc234", &[]).as_str(),
            "http://localhost:8080/rooms/ABC234"
        );
    }

    #[test]
    fn rejects_base_urls_without_a_path() {
        assert!(matches!(
            HttpRoomApi::new("mailto:host@example.com"),
            Err(ClientError::Rejected(_))
        ));
        assert!(HttpRoomApi::new("not a url").is_err());
    }

    #[test]
    fn decodes_frames_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"event: change\nda").is_empty());
        let frames = decoder.push(b"ta: {\"a\":1}\n\n: keep-alive\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("change".into()),
                data: "{\"a\":1}".into(),
            }]
        );
    }

    #[test]
    fn handles_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push(b"data: one\r\ndata: two\r\n\r\nevent: ready\ndata: {}\n\n");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "one\ntwo");
        assert_eq!(frames[1].event.as_deref(), Some("ready"));
    }
}
