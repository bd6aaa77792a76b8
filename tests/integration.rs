use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use triage::config::BotConfig;
use triage::domain::membership::MemberStatus;
use triage::domain::request::{
    AdminId, AnyRequest, ArtifactKind, ArtifactRef, ChatId, ImageRef, MessageRef, RequestId,
    TriageAction, UserId,
};
use triage::gateway::{AdminButton, GatewayCall, MockGateway, UserAction};
use triage::ledger::RequestLedger;
use triage::router::{InboundEvent, Router};

const ADMIN: AdminId = AdminId(1);
const CHANNEL: ChatId = ChatId(-1000);

fn test_config() -> BotConfig {
    BotConfig {
        admin_ids: HashSet::from([ADMIN]),
        required_channel: CHANNEL,
        channel_name: "reqvideos".to_string(),
        membership_ttl_secs: 3600,
    }
}

fn test_router(gateway: &Arc<MockGateway>) -> Arc<Router<MockGateway>> {
    Arc::new(Router::new(test_config(), gateway.clone()))
}

/// Submit an image as `user` and return the id the admin channel was
/// notified about.
async fn submit_image(
    router: &Router<MockGateway>,
    gateway: &MockGateway,
    user: UserId,
) -> RequestId {
    router
        .handle(InboundEvent::UserSubmittedImage {
            user,
            image: ImageRef(format!("photo-{}", user.0)),
        })
        .await
        .expect("submission failed");

    gateway
        .get_calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            GatewayCall::NotifyAdminChannel { request, .. } => Some(*request),
            _ => None,
        })
        .expect("no admin channel notification recorded")
}

fn document() -> ArtifactRef {
    ArtifactRef {
        file: "found-file-id".to_string(),
        kind: ArtifactKind::Document,
    }
}

#[test_log::test(tokio::test)]
async fn test_submission_approval_and_file_delivery() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(100);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    // User submits an image: request lands in the ledger as pending.
    let request = submit_image(&router, &gateway, user).await;
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Pending(_)
    ));
    let confirmations = gateway.texts_sent_to(user);
    assert_eq!(confirmations.len(), 1);
    assert!(confirmations[0].contains("has been submitted"));

    // Admin approves: requester is notified, admin message gets follow-ups.
    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::Approve,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Approved(_)
    ));
    assert!(
        gateway
            .texts_sent_to(user)
            .iter()
            .any(|t| t.contains("has been approved"))
    );
    let follow_up_buttons = gateway
        .get_calls()
        .iter()
        .rev()
        .find_map(|c| match c {
            GatewayCall::EditAdminMessage { buttons, .. } => Some(buttons.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(
        follow_up_buttons,
        vec![AdminButton::SendFile, AdminButton::PostToChannel]
    );

    // Admin chooses "Send File" and uploads the document.
    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::SendFile,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    router
        .handle(InboundEvent::AdminSentArtifact {
            admin: ADMIN,
            artifact: document(),
            caption: None,
        })
        .await
        .unwrap();

    // Request is completed, the artifact went to the requester, and the
    // expectation was consumed.
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Completed(_)
    ));
    assert!(gateway.get_calls().iter().any(|c| matches!(
        c,
        GatewayCall::ForwardArtifact { user: u, .. } if *u == user
    )));
    assert!(router.contexts().resolve(ADMIN).is_none());
}

#[test_log::test(tokio::test)]
async fn test_non_member_submission_is_gated() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(200);
    gateway.add_member_status(user, Ok(MemberStatus::Left));
    let router = test_router(&gateway);

    router
        .handle(InboundEvent::UserSubmittedImage {
            user,
            image: ImageRef("photo".to_string()),
        })
        .await
        .unwrap();

    // No request was created; the user got a join prompt instead.
    assert!(router.ledger().list_by_requester(user).is_empty());
    let join_prompt = gateway
        .get_calls()
        .iter()
        .find_map(|c| match c {
            GatewayCall::NotifyUser { user: u, text, actions } if *u == user => {
                Some((text.clone(), actions.clone()))
            }
            _ => None,
        })
        .expect("no join prompt sent");
    assert!(join_prompt.0.contains("join our channel"));
    assert!(join_prompt.1.contains(&UserAction::VerifyMembership));
}

#[test_log::test(tokio::test)]
async fn test_reject_with_reason_flow() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(300);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let request = submit_image(&router, &gateway, user).await;

    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::Reject,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::SendReason,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    router
        .handle(InboundEvent::AdminSentText {
            admin: ADMIN,
            text: "blurry image".to_string(),
        })
        .await
        .unwrap();

    let current = router.ledger().get(request).unwrap();
    assert!(matches!(current, AnyRequest::RejectedWithReason(_)));
    if let AnyRequest::RejectedWithReason(r) = current {
        assert_eq!(r.state.reason, "blurry image");
    }
    assert!(
        gateway
            .texts_sent_to(user)
            .iter()
            .any(|t| t.contains("Reason: blurry image"))
    );
    assert!(router.contexts().resolve(ADMIN).is_none());
}

#[test_log::test(tokio::test)]
async fn test_publish_to_channel_flow() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(400);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let request = submit_image(&router, &gateway, user).await;
    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::Approve,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::PostToChannel,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    router
        .handle(InboundEvent::AdminSentArtifact {
            admin: ADMIN,
            artifact: ArtifactRef {
                file: "found-video-id".to_string(),
                kind: ArtifactKind::Video,
            },
            caption: Some("rare find".to_string()),
        })
        .await
        .unwrap();

    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::PostedToChannel(_)
    ));

    // Published with the admin's caption, then forwarded with a post link.
    let published = gateway
        .get_calls()
        .iter()
        .find_map(|c| match c {
            GatewayCall::PublishToChannel { caption, .. } => Some(caption.clone()),
            _ => None,
        })
        .expect("nothing published");
    assert_eq!(published, "rare find");

    let forwarded_actions = gateway
        .get_calls()
        .iter()
        .find_map(|c| match c {
            GatewayCall::ForwardArtifact { user: u, actions, .. } if *u == user => {
                Some(actions.clone())
            }
            _ => None,
        })
        .expect("artifact not forwarded to requester");
    assert!(forwarded_actions.iter().any(
        |a| matches!(a, UserAction::ViewPost(url) if url.starts_with("https://t.me/reqvideos/"))
    ));
}

#[test_log::test(tokio::test)]
async fn test_concurrent_approvals_have_a_single_winner() {
    let ledger = Arc::new(RequestLedger::new());
    let request = ledger.create(UserId(1), ImageRef("photo".to_string())).data.id;

    let handles: Vec<_> = (0..2i64)
        .map(|i| {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                ledger.transition(
                    request,
                    TriageAction::Approve {
                        admin: AdminId(i + 1),
                    },
                )
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "exactly one approve must win the race");

    assert!(matches!(
        ledger.get(request).unwrap(),
        AnyRequest::Approved(_)
    ));
}

#[test_log::test(tokio::test)]
async fn test_unauthorized_button_press_is_silent() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(500);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let request = submit_image(&router, &gateway, user).await;
    gateway.clear_calls();

    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: AdminId(999),
            button: AdminButton::Approve,
            request,
            message: MessageRef(0),
        })
        .await
        .unwrap();

    // No notification of any kind, and the request is untouched.
    assert_eq!(gateway.call_count(), 0);
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Pending(_)
    ));
}

#[test_log::test(tokio::test)]
async fn test_artifact_without_expectation_is_inert() {
    let gateway = Arc::new(MockGateway::new());
    let router = test_router(&gateway);

    router
        .handle(InboundEvent::AdminSentArtifact {
            admin: ADMIN,
            artifact: document(),
            caption: None,
        })
        .await
        .unwrap();

    assert_eq!(gateway.call_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_admin_text_leaves_file_expectation_in_place() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(600);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let request = submit_image(&router, &gateway, user).await;
    for button in [AdminButton::Approve, AdminButton::SendFile] {
        router
            .handle(InboundEvent::AdminButtonPressed {
                admin: ADMIN,
                button,
                request,
                message: MessageRef(0),
            })
            .await
            .unwrap();
    }

    // A stray text message must not consume the file expectation.
    router
        .handle(InboundEvent::AdminSentText {
            admin: ADMIN,
            text: "uploading in a second".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Approved(_)
    ));

    // The artifact still resolves the request.
    router
        .handle(InboundEvent::AdminSentArtifact {
            admin: ADMIN,
            artifact: document(),
            caption: None,
        })
        .await
        .unwrap();
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Completed(_)
    ));
}

#[test_log::test(tokio::test)]
async fn test_double_approve_notifies_second_admin() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(700);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let request = submit_image(&router, &gateway, user).await;
    for _ in 0..2 {
        router
            .handle(InboundEvent::AdminButtonPressed {
                admin: ADMIN,
                button: AdminButton::Approve,
                request,
                message: MessageRef(0),
            })
            .await
            .unwrap();
    }

    // Second press hits an illegal edge and is reported to the admin.
    let warnings: Vec<String> = gateway
        .get_calls()
        .iter()
        .filter_map(|c| match c {
            GatewayCall::NotifyAdmin { admin, text } if *admin == ADMIN => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert!(warnings.iter().any(|t| t.contains("Invalid transition")));
    assert!(matches!(
        router.ledger().get(request).unwrap(),
        AnyRequest::Approved(_)
    ));
}

#[test_log::test(tokio::test)]
async fn test_status_query_lists_all_requests() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(800);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let first = submit_image(&router, &gateway, user).await;
    let second = submit_image(&router, &gateway, user).await;
    router
        .handle(InboundEvent::AdminButtonPressed {
            admin: ADMIN,
            button: AdminButton::Approve,
            request: second,
            message: MessageRef(0),
        })
        .await
        .unwrap();
    gateway.clear_calls();

    router
        .handle(InboundEvent::StatusQuery { user })
        .await
        .unwrap();

    let status_text = gateway
        .texts_sent_to(user)
        .pop()
        .expect("no status message sent");
    assert!(status_text.contains(&first.to_string()));
    assert!(status_text.contains(&second.to_string()));
    assert!(status_text.contains("Status: pending"));
    assert!(status_text.contains("Status: approved"));
}

#[test_log::test(tokio::test)]
async fn test_status_query_with_no_requests() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(900);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    router
        .handle(InboundEvent::StatusQuery { user })
        .await
        .unwrap();

    assert!(
        gateway
            .texts_sent_to(user)
            .iter()
            .any(|t| t.contains("don't have any pending requests"))
    );
}

#[test_log::test(tokio::test)]
async fn test_force_verify_bypasses_cached_verdict() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(1000);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    gateway.add_member_status(user, Ok(MemberStatus::Left));
    let router = test_router(&gateway);

    // Prime the cache with a positive verdict.
    router
        .handle(InboundEvent::StatusQuery { user })
        .await
        .unwrap();
    assert_eq!(gateway.member_lookup_count(user), 1);

    // The forced re-check sees the user has left and prompts to rejoin.
    router
        .handle(InboundEvent::ForceVerify { user })
        .await
        .unwrap();
    assert_eq!(gateway.member_lookup_count(user), 2);
    assert!(
        gateway
            .texts_sent_to(user)
            .iter()
            .any(|t| t.contains("join our channel"))
    );
}

#[test_log::test(tokio::test)]
async fn test_membership_change_event_updates_gate() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(1100);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    // Prime the cache, then the platform reports the user was kicked.
    router
        .handle(InboundEvent::StatusQuery { user })
        .await
        .unwrap();
    router
        .handle(InboundEvent::MembershipChanged {
            user,
            status: MemberStatus::Kicked,
        })
        .await
        .unwrap();

    // The pushed verdict wins without another lookup.
    router
        .handle(InboundEvent::UserSubmittedImage {
            user,
            image: ImageRef("photo".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(gateway.member_lookup_count(user), 1);
    assert!(router.ledger().list_by_requester(user).is_empty());
}

#[test_log::test(tokio::test)]
async fn test_run_loop_drains_events_until_shutdown() {
    let gateway = Arc::new(MockGateway::new());
    let user = UserId(1200);
    gateway.add_member_status(user, Ok(MemberStatus::Member));
    let router = test_router(&gateway);

    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let shutdown = tokio_util::sync::CancellationToken::new();
    let handle = router.clone().run(rx, shutdown.clone());

    tx.send(InboundEvent::UserSubmittedImage {
        user,
        image: ImageRef("photo".to_string()),
    })
    .await
    .unwrap();

    // Poll until the event has been processed (with timeout).
    let start = tokio::time::Instant::now();
    while router.ledger().list_by_requester(user).is_empty() {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "event was not processed in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.cancel();
    handle.await.unwrap();
}
