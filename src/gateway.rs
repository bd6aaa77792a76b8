//! Chat gateway abstraction for platform I/O.
//!
//! This module defines the `ChatGateway` trait to abstract the messaging
//! platform (sending notifications, forwarding files, membership lookups),
//! enabling testability with mock implementations. All platform payloads
//! are opaque references passed through unexamined.

use crate::domain::membership::MemberStatus;
use crate::domain::request::{AdminId, ArtifactKind, ArtifactRef, ChatId, ImageRef, MessageRef, RequestId, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Inline actions offered to a user underneath a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    /// Link to the public requests channel.
    RequestsChannel,
    /// Link prompting the user to join the required channel.
    JoinChannel,
    /// Button triggering a forced membership re-check.
    VerifyMembership,
    /// Link to a specific published post.
    ViewPost(String),
}

/// Inline triage buttons offered to admins on a request message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminButton {
    Approve,
    Reject,
    SendFile,
    PostToChannel,
    SendReason,
}

impl AdminButton {
    /// Human-readable button label.
    pub fn label(self) -> &'static str {
        match self {
            AdminButton::Approve => "Approve",
            AdminButton::Reject => "Reject",
            AdminButton::SendFile => "Send File",
            AdminButton::PostToChannel => "Post to Channel",
            AdminButton::SendReason => "Send Reason",
        }
    }

    /// Callback-data prefix; the request id is appended after an underscore.
    pub fn callback_prefix(self) -> &'static str {
        match self {
            AdminButton::Approve => "approve",
            AdminButton::Reject => "reject",
            AdminButton::SendFile => "sendfile",
            AdminButton::PostToChannel => "postchannel",
            AdminButton::SendReason => "sendreason",
        }
    }
}

/// Trait for platform I/O requested by the triage core.
///
/// This abstraction allows for different implementations (production vs.
/// testing) and keeps the core free of any wire format. All methods are
/// fire-and-forget from the core's perspective: failures are reported but
/// carry no state the core depends on, except `member_status`, whose
/// verdict feeds the membership gate.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a text notification to a user, with optional inline actions.
    async fn notify_user(&self, user: UserId, text: &str, actions: &[UserAction]) -> Result<()>;

    /// Send a private text message to an admin.
    async fn notify_admin(&self, admin: AdminId, text: &str) -> Result<()>;

    /// Post a request (its image plus a caption) to the admin channel with
    /// triage buttons. Returns a reference to the posted message so later
    /// triage steps can edit it.
    async fn notify_admin_channel(
        &self,
        request: RequestId,
        image: &ImageRef,
        caption: &str,
        buttons: &[AdminButton],
    ) -> Result<MessageRef>;

    /// Replace the caption and buttons of a previously posted admin-channel
    /// message, reflecting a triage step.
    async fn edit_admin_message(
        &self,
        message: MessageRef,
        request: RequestId,
        caption: &str,
        buttons: &[AdminButton],
    ) -> Result<()>;

    /// Deliver an artifact to a user with a caption and optional actions.
    async fn forward_artifact(
        &self,
        user: UserId,
        artifact: &ArtifactRef,
        caption: &str,
        actions: &[UserAction],
    ) -> Result<()>;

    /// Publish an artifact to the public requests channel. Returns a
    /// reference to the channel post so the core can link to it.
    async fn publish_to_channel(&self, artifact: &ArtifactRef, caption: &str)
    -> Result<MessageRef>;

    /// Authoritative membership lookup for a user in a channel.
    ///
    /// # Errors
    /// Returns an error if the platform call fails (network failure, bot
    /// lacking permission, unknown channel). The membership gate treats any
    /// error as a non-member verdict.
    async fn member_status(&self, channel: ChatId, user: UserId) -> Result<MemberStatus>;
}

// ============================================================================
// Production Implementation using the Telegram Bot API
// ============================================================================

/// Production gateway speaking the Telegram Bot API over reqwest.
#[derive(Clone)]
pub struct TelegramGateway {
    client: reqwest::Client,
    api_base: String,
    admin_channel: ChatId,
    publish_channel: ChatId,
    channel_name: String,
}

impl TelegramGateway {
    /// Create a gateway for a bot token.
    ///
    /// `channel_name` is the public username of the requests channel
    /// (without the leading `@`), used to build join/view links.
    pub fn new(
        token: &str,
        admin_channel: ChatId,
        publish_channel: ChatId,
        channel_name: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: format!("https://api.telegram.org/bot{token}"),
            admin_channel,
            publish_channel,
            channel_name: channel_name.into(),
        }
    }

    /// Invoke one Bot API method and return its `result` payload.
    async fn call(&self, method: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.api_base, method);

        tracing::debug!(method = method, "Calling Bot API");

        let response = self.client.post(&url).json(&payload).send().await.map_err(|e| {
            tracing::error!(method = method, error = %e, "Bot API request failed");
            e
        })?;

        let status = response.status().as_u16();
        let body: serde_json::Value = response.json().await?;

        if body.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let description = body
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no description");
            tracing::error!(
                method = method,
                status = status,
                description = description,
                "Bot API reported an error"
            );
            return Err(anyhow::anyhow!("Bot API {} failed: {}", method, description).into());
        }

        Ok(body.get("result").cloned().unwrap_or(serde_json::Value::Null))
    }

    fn user_keyboard(&self, actions: &[UserAction]) -> serde_json::Value {
        let rows: Vec<serde_json::Value> = actions
            .iter()
            .map(|action| {
                let button = match action {
                    UserAction::RequestsChannel => serde_json::json!({
                        "text": "\u{1F4F9} Requested Videos Channel",
                        "url": format!("https://t.me/{}", self.channel_name),
                    }),
                    UserAction::JoinChannel => serde_json::json!({
                        "text": "\u{1F4E2} Join Channel",
                        "url": format!("https://t.me/{}", self.channel_name),
                    }),
                    UserAction::VerifyMembership => serde_json::json!({
                        "text": "\u{1F504} Verify Membership",
                        "callback_data": "verify_membership",
                    }),
                    UserAction::ViewPost(url) => serde_json::json!({
                        "text": "\u{1F517} View in Channel",
                        "url": url,
                    }),
                };
                serde_json::json!([button])
            })
            .collect();
        serde_json::json!({ "inline_keyboard": rows })
    }

    fn admin_keyboard(request: RequestId, buttons: &[AdminButton]) -> serde_json::Value {
        let row: Vec<serde_json::Value> = buttons
            .iter()
            .map(|b| {
                serde_json::json!({
                    "text": b.label(),
                    "callback_data": format!("{}_{}", b.callback_prefix(), request.0),
                })
            })
            .collect();
        serde_json::json!({ "inline_keyboard": [row] })
    }

    /// Pick the Bot API send method and payload key for an artifact kind.
    fn artifact_method(kind: ArtifactKind) -> (&'static str, &'static str) {
        match kind {
            ArtifactKind::Document => ("sendDocument", "document"),
            ArtifactKind::Video => ("sendVideo", "video"),
        }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    #[tracing::instrument(skip(self, text, actions), fields(user = %user))]
    async fn notify_user(&self, user: UserId, text: &str, actions: &[UserAction]) -> Result<()> {
        let mut payload = serde_json::json!({
            "chat_id": user.0,
            "text": text,
        });
        if !actions.is_empty() {
            payload["reply_markup"] = self.user_keyboard(actions);
        }
        self.call("sendMessage", payload).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, text), fields(admin = %admin))]
    async fn notify_admin(&self, admin: AdminId, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": admin.0,
            "text": text,
        });
        self.call("sendMessage", payload).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, image, caption, buttons), fields(request = %request))]
    async fn notify_admin_channel(
        &self,
        request: RequestId,
        image: &ImageRef,
        caption: &str,
        buttons: &[AdminButton],
    ) -> Result<MessageRef> {
        let payload = serde_json::json!({
            "chat_id": self.admin_channel.0,
            "photo": image.0,
            "caption": caption,
            "reply_markup": Self::admin_keyboard(request, buttons),
        });
        let result = self.call("sendPhoto", payload).await?;
        let message_id = result
            .get("message_id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("sendPhoto result missing message_id"))?;
        Ok(MessageRef(message_id))
    }

    #[tracing::instrument(skip(self, caption, buttons), fields(request = %request))]
    async fn edit_admin_message(
        &self,
        message: MessageRef,
        request: RequestId,
        caption: &str,
        buttons: &[AdminButton],
    ) -> Result<()> {
        let mut payload = serde_json::json!({
            "chat_id": self.admin_channel.0,
            "message_id": message.0,
            "caption": caption,
        });
        if !buttons.is_empty() {
            payload["reply_markup"] = Self::admin_keyboard(request, buttons);
        }
        self.call("editMessageCaption", payload).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, artifact, caption, actions), fields(user = %user))]
    async fn forward_artifact(
        &self,
        user: UserId,
        artifact: &ArtifactRef,
        caption: &str,
        actions: &[UserAction],
    ) -> Result<()> {
        let (method, key) = Self::artifact_method(artifact.kind);
        let mut payload = serde_json::json!({
            "chat_id": user.0,
            key: artifact.file,
            "caption": caption,
        });
        if !actions.is_empty() {
            payload["reply_markup"] = self.user_keyboard(actions);
        }
        self.call(method, payload).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, artifact, caption))]
    async fn publish_to_channel(
        &self,
        artifact: &ArtifactRef,
        caption: &str,
    ) -> Result<MessageRef> {
        let (method, key) = Self::artifact_method(artifact.kind);
        let payload = serde_json::json!({
            "chat_id": self.publish_channel.0,
            key: artifact.file,
            "caption": caption,
        });
        let result = self.call(method, payload).await?;
        let message_id = result
            .get("message_id")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| anyhow::anyhow!("{} result missing message_id", method))?;
        Ok(MessageRef(message_id))
    }

    #[tracing::instrument(skip(self), fields(channel = %channel, user = %user))]
    async fn member_status(&self, channel: ChatId, user: UserId) -> Result<MemberStatus> {
        let payload = serde_json::json!({
            "chat_id": channel.0,
            "user_id": user.0,
        });
        let result = self.call("getChatMember", payload).await?;
        let status = result
            .get("status")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("getChatMember result missing status"))?;
        let status: MemberStatus = serde_json::from_value(status)?;

        tracing::info!(user = %user, status = ?status, "Membership lookup completed");

        Ok(status)
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Record of one outbound call made through the mock gateway.
#[derive(Debug, Clone)]
pub enum GatewayCall {
    NotifyUser {
        user: UserId,
        text: String,
        actions: Vec<UserAction>,
    },
    NotifyAdmin {
        admin: AdminId,
        text: String,
    },
    NotifyAdminChannel {
        request: RequestId,
        image: ImageRef,
        caption: String,
        buttons: Vec<AdminButton>,
    },
    EditAdminMessage {
        message: MessageRef,
        request: RequestId,
        caption: String,
        buttons: Vec<AdminButton>,
    },
    ForwardArtifact {
        user: UserId,
        artifact: ArtifactRef,
        caption: String,
        actions: Vec<UserAction>,
    },
    PublishToChannel {
        artifact: ArtifactRef,
        caption: String,
    },
    MemberLookup {
        channel: ChatId,
        user: UserId,
    },
}

/// Mock gateway for testing.
///
/// Records every outbound call and serves scripted membership verdicts
/// without touching the platform. Membership responses are queued per user
/// in FIFO order; a lookup with no queued response returns an error, which
/// exercises the gate's fail-closed path.
#[derive(Clone, Default)]
pub struct MockGateway {
    calls: Arc<Mutex<Vec<GatewayCall>>>,
    member_responses: Arc<Mutex<HashMap<UserId, VecDeque<Result<MemberStatus>>>>>,
    next_message_id: Arc<AtomicI64>,
}

impl MockGateway {
    /// Create a new mock gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a membership verdict (or lookup failure) for a user.
    pub fn add_member_status(&self, user: UserId, response: Result<MemberStatus>) {
        self.member_responses
            .lock()
            .entry(user)
            .or_default()
            .push_back(response);
    }

    /// Get all calls that have been made through this mock gateway.
    pub fn get_calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Clear all recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Count of authoritative membership lookups performed for a user.
    pub fn member_lookup_count(&self, user: UserId) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GatewayCall::MemberLookup { user: u, .. } if *u == user))
            .count()
    }

    /// All texts sent to a given user, in order.
    pub fn texts_sent_to(&self, user: UserId) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                GatewayCall::NotifyUser { user: u, text, .. } if *u == user => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl ChatGateway for MockGateway {
    async fn notify_user(&self, user: UserId, text: &str, actions: &[UserAction]) -> Result<()> {
        self.record(GatewayCall::NotifyUser {
            user,
            text: text.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }

    async fn notify_admin(&self, admin: AdminId, text: &str) -> Result<()> {
        self.record(GatewayCall::NotifyAdmin {
            admin,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn notify_admin_channel(
        &self,
        request: RequestId,
        image: &ImageRef,
        caption: &str,
        buttons: &[AdminButton],
    ) -> Result<MessageRef> {
        self.record(GatewayCall::NotifyAdminChannel {
            request,
            image: image.clone(),
            caption: caption.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(MessageRef(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn edit_admin_message(
        &self,
        message: MessageRef,
        request: RequestId,
        caption: &str,
        buttons: &[AdminButton],
    ) -> Result<()> {
        self.record(GatewayCall::EditAdminMessage {
            message,
            request,
            caption: caption.to_string(),
            buttons: buttons.to_vec(),
        });
        Ok(())
    }

    async fn forward_artifact(
        &self,
        user: UserId,
        artifact: &ArtifactRef,
        caption: &str,
        actions: &[UserAction],
    ) -> Result<()> {
        self.record(GatewayCall::ForwardArtifact {
            user,
            artifact: artifact.clone(),
            caption: caption.to_string(),
            actions: actions.to_vec(),
        });
        Ok(())
    }

    async fn publish_to_channel(
        &self,
        artifact: &ArtifactRef,
        caption: &str,
    ) -> Result<MessageRef> {
        self.record(GatewayCall::PublishToChannel {
            artifact: artifact.clone(),
            caption: caption.to_string(),
        });
        Ok(MessageRef(self.next_message_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn member_status(&self, channel: ChatId, user: UserId) -> Result<MemberStatus> {
        self.record(GatewayCall::MemberLookup { channel, user });

        let response = {
            let mut responses = self.member_responses.lock();
            responses.get_mut(&user).and_then(VecDeque::pop_front)
        };

        match response {
            Some(response) => response,
            None => Err(anyhow::anyhow!("No mock member status configured for user {user}").into()),
        }
    }
}
