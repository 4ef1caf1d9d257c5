//! REST collaborator client over reqwest.

use async_trait::async_trait;
use huddle_chats::{
    Actor, ChatError, ChatResult, ConversationApi, ConversationKey, CreateRoomRequest, ErrorCode,
    HistoryQuery, Message, Room, TaskConversation, UpdateMessageRequest,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

const TENANT_HEADER: &str = "x-tenant-id";
const USER_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<ErrorCode>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterTaskBody<'a> {
    assignee_id: &'a str,
    assigner_id: &'a str,
}

/// Calls the gateway's REST endpoints on behalf of one actor
#[derive(Clone)]
pub struct HttpConversationApi {
    http: reqwest::Client,
    base_url: String,
    actor: Actor,
}

impl HttpConversationApi {
    pub fn new(base_url: impl Into<String>, actor: Actor) -> ChatResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("huddle-client")
            .build()
            .map_err(|err| ChatError::internal(format!("failed to build http client: {}", err)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            actor,
        })
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .header(TENANT_HEADER, &self.actor.tenant_id)
            .header(USER_HEADER, &self.actor.user_id);
        if let Some(name) = &self.actor.display_name {
            builder = builder.header(USER_NAME_HEADER, name);
        }
        builder
    }

    async fn send(&self, builder: RequestBuilder) -> ChatResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|err| ChatError::transport(format!("request failed: {}", err)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.ok();
        let message = body
            .as_ref()
            .and_then(|body| body.message.clone())
            .unwrap_or_else(|| status.to_string());
        let code = body
            .and_then(|body| body.code)
            .unwrap_or_else(|| code_for_status(status));
        debug!(%status, code = code.as_str(), "gateway rejected request");
        Err(ChatError::from_wire(code, message))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ChatResult<T> {
        self.send(builder)
            .await?
            .json()
            .await
            .map_err(|err| ChatError::transport(format!("invalid response body: {}", err)))
    }

    /// Ask the gateway to delete a room; completion arrives as `roomDeleted`.
    pub async fn delete_room(&self, room_id: &str) -> ChatResult<()> {
        self.send(self.request(Method::DELETE, &format!("/api/rooms/{}", room_id)))
            .await?;
        Ok(())
    }

    /// Register the participants of a task conversation.
    pub async fn register_task(
        &self,
        task_id: &str,
        assignee_id: &str,
        assigner_id: &str,
    ) -> ChatResult<TaskConversation> {
        let builder = self
            .request(Method::PUT, &format!("/api/tasks/{}", task_id))
            .json(&RegisterTaskBody {
                assignee_id,
                assigner_id,
            });
        self.json(builder).await
    }
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCode::Unauthorized,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::Validation,
        _ => ErrorCode::Internal,
    }
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn fetch_history(
        &self,
        key: &ConversationKey,
        query: &HistoryQuery,
    ) -> ChatResult<Vec<Message>> {
        let path = format!("/api/conversations/{}/{}/messages", key.kind, key.id);
        self.json(self.request(Method::GET, &path).query(query)).await
    }

    async fn edit_message(&self, message_id: &str, body: &str) -> ChatResult<Message> {
        let builder = self
            .request(Method::PATCH, &format!("/api/messages/{}", message_id))
            .json(&UpdateMessageRequest {
                body: body.to_string(),
            });
        self.json(builder).await
    }

    async fn delete_message(&self, message_id: &str) -> ChatResult<()> {
        self.send(self.request(Method::DELETE, &format!("/api/messages/{}", message_id)))
            .await?;
        Ok(())
    }

    async fn create_room(&self, request: &CreateRoomRequest) -> ChatResult<Room> {
        self.json(self.request(Method::POST, "/api/rooms").json(request))
            .await
    }

    async fn list_rooms(&self) -> ChatResult<Vec<Room>> {
        self.json(self.request(Method::GET, "/api/rooms")).await
    }

    async fn get_room(&self, room_id: &str) -> ChatResult<Room> {
        self.json(self.request(Method::GET, &format!("/api/rooms/{}", room_id)))
            .await
    }
}
