//! Event router driving the triage workflow.
//!
//! The router consumes inbound platform events one at a time, checks the
//! membership gate for user-facing operations, mutates the ledger and the
//! admin contexts, and requests outbound notifications through the
//! gateway. It holds no execution context open across a real-world wait:
//! "waiting for an admin to reply" is ledger/context state, and the next
//! inbound event is what resumes the workflow.
//!
//! A failure while handling one event is logged and isolated; it never
//! affects other in-flight events.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BotConfig;
use crate::context::AdminContexts;
use crate::domain::context::AdminExpectation;
use crate::domain::membership::MemberStatus;
use crate::domain::request::{
    AdminId, AnyRequest, ArtifactRef, ImageRef, MessageRef, RequestId, TriageAction, UserId,
};
use crate::error::{Result, TriageError};
use crate::gate::MembershipGate;
use crate::gateway::{AdminButton, ChatGateway, UserAction};
use crate::ledger::RequestLedger;

/// One inbound event from the messaging platform.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A user submitted an image describing the file they want.
    UserSubmittedImage { user: UserId, image: ImageRef },
    /// A user sent plain text instead of an image.
    UserSentText { user: UserId },
    /// An admin pressed a triage button on an admin-channel message.
    AdminButtonPressed {
        admin: AdminId,
        button: AdminButton,
        request: RequestId,
        message: MessageRef,
    },
    /// An admin uploaded a document or video.
    AdminSentArtifact {
        admin: AdminId,
        artifact: ArtifactRef,
        caption: Option<String>,
    },
    /// An admin sent a plain text message.
    AdminSentText { admin: AdminId, text: String },
    /// The platform reported a change in a user's channel membership.
    MembershipChanged { user: UserId, status: MemberStatus },
    /// A user asked for the status of their requests.
    StatusQuery { user: UserId },
    /// A user asked for a forced membership re-check.
    ForceVerify { user: UserId },
}

/// The triage workflow engine.
///
/// Owns the ledger, the membership gate, and the admin contexts; talks to
/// the platform exclusively through the gateway.
pub struct Router<G: ChatGateway> {
    config: BotConfig,
    gateway: Arc<G>,
    ledger: RequestLedger,
    gate: MembershipGate<G>,
    contexts: AdminContexts,
}

impl<G: ChatGateway + 'static> Router<G> {
    /// Create a router over a gateway.
    pub fn new(config: BotConfig, gateway: Arc<G>) -> Self {
        let gate = MembershipGate::new(
            gateway.clone(),
            config.required_channel,
            config.membership_ttl(),
        );
        Self {
            config,
            gateway,
            ledger: RequestLedger::new(),
            gate,
            contexts: AdminContexts::new(),
        }
    }

    /// The request ledger.
    pub fn ledger(&self) -> &RequestLedger {
        &self.ledger
    }

    /// The membership gate.
    pub fn gate(&self) -> &MembershipGate<G> {
        &self.gate
    }

    /// The admin context store.
    pub fn contexts(&self) -> &AdminContexts {
        &self.contexts
    }

    /// Drain inbound events until the channel closes or shutdown is
    /// requested. Each event is handled to completion before the next one
    /// is taken; a failing event is logged and skipped.
    pub fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<InboundEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Router started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Router shutting down");
                        break;
                    }
                    event = events.recv() => {
                        match event {
                            Some(event) => {
                                if let Err(e) = self.handle(event).await {
                                    tracing::error!(error = %e, "Event handling failed");
                                }
                            }
                            None => {
                                tracing::info!("Event channel closed, router stopping");
                                break;
                            }
                        }
                    }
                }
            }
        })
    }

    /// Handle a single inbound event.
    pub async fn handle(&self, event: InboundEvent) -> Result<()> {
        match event {
            InboundEvent::UserSubmittedImage { user, image } => {
                self.handle_submission(user, image).await
            }
            InboundEvent::UserSentText { user } => self.handle_user_text(user).await,
            InboundEvent::AdminButtonPressed {
                admin,
                button,
                request,
                message,
            } => self.handle_button(admin, button, request, message).await,
            InboundEvent::AdminSentArtifact {
                admin,
                artifact,
                caption,
            } => self.handle_artifact(admin, artifact, caption).await,
            InboundEvent::AdminSentText { admin, text } => {
                self.handle_admin_text(admin, text).await
            }
            InboundEvent::MembershipChanged { user, status } => {
                self.gate.apply_change(user, status);
                Ok(())
            }
            InboundEvent::StatusQuery { user } => self.handle_status_query(user).await,
            InboundEvent::ForceVerify { user } => self.handle_force_verify(user).await,
        }
    }

    async fn handle_submission(&self, user: UserId, image: ImageRef) -> Result<()> {
        if !self.gate.is_member(user, false).await {
            return self.send_join_prompt(user).await;
        }

        let request = self.ledger.create(user, image.clone());
        let id = request.data.id;

        let caption = format!(
            "New file request from User #{user}\n\
             User ID: {user}\n\
             Request ID: {id}\n\
             Time: {}",
            request.data.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        self.gateway
            .notify_admin_channel(
                id,
                &image,
                &caption,
                &[AdminButton::Approve, AdminButton::Reject],
            )
            .await?;

        self.gateway
            .notify_user(
                user,
                &format!(
                    "\u{2705} Your request has been submitted! \
                     You'll be notified when it's processed.\nRequest ID: {id}"
                ),
                &[UserAction::RequestsChannel],
            )
            .await
    }

    async fn handle_user_text(&self, user: UserId) -> Result<()> {
        if !self.gate.is_member(user, false).await {
            return self.send_join_prompt(user).await;
        }

        self.gateway
            .notify_user(
                user,
                "Please send a screenshot or image of the video/file you're looking for. \
                 Text requests are not supported.",
                &[UserAction::RequestsChannel],
            )
            .await
    }

    async fn handle_button(
        &self,
        admin: AdminId,
        button: AdminButton,
        request: RequestId,
        message: MessageRef,
    ) -> Result<()> {
        if !self.config.is_admin(admin) {
            // Silently ignored: no information about why.
            tracing::debug!(admin = %admin, "Ignoring button press from non-admin");
            return Ok(());
        }

        match button {
            AdminButton::Approve => {
                match self
                    .ledger
                    .transition(request, TriageAction::Approve { admin })
                {
                    Ok(updated) => {
                        self.gateway
                            .edit_admin_message(
                                message,
                                request,
                                &format!(
                                    "Request {request}\n\n\u{2705} Approved by admin {admin}"
                                ),
                                &[AdminButton::SendFile, AdminButton::PostToChannel],
                            )
                            .await?;
                        self.gateway
                            .notify_user(
                                updated.requester(),
                                &format!(
                                    "\u{2705} Good news! Your request (ID: {request}) has been \
                                     approved. The admin is preparing your file and will send \
                                     it soon."
                                ),
                                &[UserAction::RequestsChannel],
                            )
                            .await
                    }
                    Err(e) => self.report_triage_failure(admin, e).await,
                }
            }
            AdminButton::Reject => {
                match self
                    .ledger
                    .transition(request, TriageAction::Reject { admin })
                {
                    Ok(updated) => {
                        self.gateway
                            .edit_admin_message(
                                message,
                                request,
                                &format!(
                                    "Request {request}\n\n\u{274C} Rejected by admin {admin}"
                                ),
                                &[AdminButton::SendReason],
                            )
                            .await?;
                        self.gateway
                            .notify_user(
                                updated.requester(),
                                &format!(
                                    "\u{274C} Your request (ID: {request}) could not be \
                                     fulfilled. An admin may provide more details soon."
                                ),
                                &[UserAction::RequestsChannel],
                            )
                            .await
                    }
                    Err(e) => self.report_triage_failure(admin, e).await,
                }
            }
            AdminButton::SendFile => {
                self.begin_follow_up(
                    admin,
                    request,
                    message,
                    AdminExpectation::AwaitingFile { request },
                    &format!("Request {request}\n\n\u{1F4E4} Waiting for file from admin {admin}..."),
                    &format!(
                        "Please send me the file for request ID: {request}.\n\
                         I'll forward it to the user who requested it."
                    ),
                )
                .await
            }
            AdminButton::PostToChannel => {
                self.begin_follow_up(
                    admin,
                    request,
                    message,
                    AdminExpectation::AwaitingChannelPost { request },
                    &format!(
                        "Request {request}\n\n\u{1F4E4} Waiting for file from admin {admin} \
                         to post to channel..."
                    ),
                    &format!(
                        "Please send me the file for request ID: {request} to post to the \
                         channel.\nYou can also include a caption for the channel post."
                    ),
                )
                .await
            }
            AdminButton::SendReason => {
                self.begin_follow_up(
                    admin,
                    request,
                    message,
                    AdminExpectation::AwaitingReason { request },
                    &format!(
                        "Request {request}\n\n\u{1F4DD} Waiting for rejection reason from \
                         admin {admin}..."
                    ),
                    &format!(
                        "Please send me the rejection reason for request ID: {request}.\n\
                         I'll forward it to the user who made the request."
                    ),
                )
                .await
            }
        }
    }

    /// Record a follow-up expectation for an admin and tell them what to
    /// send next. The ledger transition itself happens when the artifact
    /// arrives.
    async fn begin_follow_up(
        &self,
        admin: AdminId,
        request: RequestId,
        message: MessageRef,
        expectation: AdminExpectation,
        admin_channel_caption: &str,
        instruction: &str,
    ) -> Result<()> {
        if let Err(e) = self.ledger.get(request) {
            return self.report_triage_failure(admin, e).await;
        }

        self.contexts.expect(admin, expectation);

        self.gateway
            .edit_admin_message(message, request, admin_channel_caption, &[])
            .await?;
        self.gateway.notify_admin(admin, instruction).await
    }

    async fn handle_artifact(
        &self,
        admin: AdminId,
        artifact: ArtifactRef,
        caption: Option<String>,
    ) -> Result<()> {
        if !self.config.is_admin(admin) {
            return Ok(());
        }

        let Some(expectation) = self
            .contexts
            .resolve_matching(admin, AdminExpectation::wants_artifact)
        else {
            // No outstanding expectation: the upload is inert, not an error.
            tracing::debug!(admin = %admin, "Artifact with no outstanding expectation ignored");
            return Ok(());
        };

        match expectation {
            AdminExpectation::AwaitingFile { request } => {
                match self
                    .ledger
                    .transition(request, TriageAction::Fulfill { admin })
                {
                    Ok(updated) => {
                        self.gateway
                            .forward_artifact(
                                updated.requester(),
                                &artifact,
                                &format!(
                                    "\u{1F4C1} Here's the file you requested (ID: {request})!"
                                ),
                                &[UserAction::RequestsChannel],
                            )
                            .await?;
                        self.gateway
                            .notify_admin(
                                admin,
                                &format!(
                                    "\u{2705} File has been sent to the user for request ID: \
                                     {request}"
                                ),
                            )
                            .await
                    }
                    Err(e) => self.report_triage_failure(admin, e).await,
                }
            }
            AdminExpectation::AwaitingChannelPost { request } => {
                match self
                    .ledger
                    .transition(request, TriageAction::Publish { admin })
                {
                    Ok(updated) => {
                        self.publish_and_forward(admin, request, &updated, &artifact, caption)
                            .await
                    }
                    Err(e) => self.report_triage_failure(admin, e).await,
                }
            }
            // Filtered out by wants_artifact
            AdminExpectation::AwaitingReason { .. } => Ok(()),
        }
    }

    /// Publish the artifact to the requests channel, then send it to the
    /// requester with a link to the channel post.
    async fn publish_and_forward(
        &self,
        admin: AdminId,
        request: RequestId,
        updated: &AnyRequest,
        artifact: &ArtifactRef,
        caption: Option<String>,
    ) -> Result<()> {
        let requester = updated.requester();
        let channel_caption = caption.unwrap_or_else(|| {
            format!(
                "\u{1F4C1} Requested file (ID: {request})\nRequested by: User #{requester}"
            )
        });

        let post = self
            .gateway
            .publish_to_channel(artifact, &channel_caption)
            .await?;
        let link = format!("https://t.me/{}/{}", self.config.channel_name, post.0);

        self.gateway
            .forward_artifact(
                requester,
                artifact,
                &format!(
                    "\u{1F4C1} Here's the file you requested (ID: {request})!\n\
                     It's also available in our channel."
                ),
                &[UserAction::ViewPost(link)],
            )
            .await?;
        self.gateway
            .notify_admin(
                admin,
                &format!(
                    "\u{2705} File has been posted to the channel and sent to the user for \
                     request ID: {request}"
                ),
            )
            .await
    }

    async fn handle_admin_text(&self, admin: AdminId, text: String) -> Result<()> {
        if !self.config.is_admin(admin) {
            return Ok(());
        }

        let Some(AdminExpectation::AwaitingReason { request }) = self
            .contexts
            .resolve_matching(admin, AdminExpectation::wants_text)
        else {
            tracing::debug!(admin = %admin, "Admin text with no reason expectation ignored");
            return Ok(());
        };

        match self.ledger.transition(
            request,
            TriageAction::Explain {
                admin,
                reason: text.clone(),
            },
        ) {
            Ok(updated) => {
                self.gateway
                    .notify_user(
                        updated.requester(),
                        &format!(
                            "\u{274C} Your request (ID: {request}) was rejected.\n\n\
                             Reason: {text}"
                        ),
                        &[UserAction::RequestsChannel],
                    )
                    .await?;
                self.gateway
                    .notify_admin(
                        admin,
                        &format!(
                            "\u{2705} Rejection reason has been sent to the user for request \
                             ID: {request}"
                        ),
                    )
                    .await
            }
            Err(e) => self.report_triage_failure(admin, e).await,
        }
    }

    async fn handle_status_query(&self, user: UserId) -> Result<()> {
        if !self.gate.is_member(user, false).await {
            return self.send_join_prompt(user).await;
        }

        let requests = self.ledger.list_by_requester(user);
        if requests.is_empty() {
            return self
                .gateway
                .notify_user(
                    user,
                    "You don't have any pending requests.",
                    &[UserAction::RequestsChannel],
                )
                .await;
        }

        let mut message = String::from("Your requests:\n\n");
        for request in &requests {
            message.push_str(&format!(
                "Request ID: {}\nStatus: {}\nSubmitted: {}\n\n",
                request.id(),
                request.status(),
                request.data().created_at.format("%Y-%m-%d %H:%M:%S")
            ));
        }

        self.gateway
            .notify_user(user, &message, &[UserAction::RequestsChannel])
            .await
    }

    async fn handle_force_verify(&self, user: UserId) -> Result<()> {
        if self.gate.is_member(user, true).await {
            self.gateway
                .notify_user(
                    user,
                    "\u{2705} Your membership has been verified! You can now use the bot.\n\n\
                     Send me a screenshot or image of the video/file you're looking for.",
                    &[UserAction::RequestsChannel],
                )
                .await
        } else {
            self.send_join_prompt(user).await
        }
    }

    async fn send_join_prompt(&self, user: UserId) -> Result<()> {
        self.gateway
            .notify_user(
                user,
                &format!(
                    "\u{26A0} You need to join our channel to use this bot!\n\n\
                     Please join @{} and then press 'Verify Membership'.",
                    self.config.channel_name
                ),
                &[UserAction::JoinChannel, UserAction::VerifyMembership],
            )
            .await
    }

    /// Surface a triage failure to the triggering admin as a plain
    /// notification; anything else propagates as an internal error.
    async fn report_triage_failure(&self, admin: AdminId, error: TriageError) -> Result<()> {
        match error {
            e @ (TriageError::NotFound(_) | TriageError::InvalidTransition(..)) => {
                self.gateway
                    .notify_admin(admin, &format!("\u{26A0} {e}"))
                    .await
            }
            other => Err(other),
        }
    }
}
