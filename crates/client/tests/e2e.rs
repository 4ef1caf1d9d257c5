use std::time::{Duration, Instant};

use huddle_chats::{Actor, ConversationKey, CreateRoomRequest, Transport};
use huddle_client::{connect_client, HuddleClient};
use huddle_gateway::{create_router, GatewayState};
use tokio::net::TcpListener;

const COOLDOWN: Duration = Duration::from_secs(2);
const TIMEOUT: Duration = Duration::from_secs(3);

async fn start_gateway() -> (String, GatewayState) {
    let state = GatewayState::in_memory();
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let router = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve gateway");
    });
    (format!("http://{}", addr), state)
}

async fn login(base_url: &str, user: &str) -> HuddleClient {
    let actor = Actor::new("t1", user).with_display_name(user.to_uppercase());
    let (client, _dispatch) = connect_client(base_url, actor, COOLDOWN, TIMEOUT)
        .await
        .expect("connect client");
    client
}

async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn room_message_reaches_both_members_once() {
    let (base_url, _state) = start_gateway().await;
    let alice = login(&base_url, "alice").await;
    let bob = login(&base_url, "bob").await;

    let room = alice
        .create_room(CreateRoomRequest {
            name: "Launch".to_string(),
            member_ids: vec!["bob".to_string()],
        })
        .await
        .expect("create room");
    let key = ConversationKey::room(room.id.clone());

    let alice_session = alice.session(key.clone());
    let bob_session = bob.session(key.clone());
    alice_session.open().await.expect("alice opens room");
    bob_session.open().await.expect("bob opens room");

    let sent = alice_session.send("hello").await.expect("send");
    assert!(sent.id.is_some());

    let mine = alice_session.messages();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].id, sent.id);

    assert!(eventually(|| bob_session.messages().len() == 1).await);
    assert_eq!(bob_session.messages()[0].id, sent.id);
    assert_eq!(bob_session.messages()[0].sender_name.as_deref(), Some("ALICE"));
}

#[tokio::test]
async fn typing_signal_shows_up_for_the_other_member() {
    let (base_url, _state) = start_gateway().await;
    let alice = login(&base_url, "alice").await;
    let bob = login(&base_url, "bob").await;

    let room = alice
        .create_room(CreateRoomRequest {
            name: "Standup".to_string(),
            member_ids: vec!["bob".to_string()],
        })
        .await
        .expect("create room");
    let key = ConversationKey::room(room.id.clone());
    let alice_session = alice.session(key.clone());
    let bob_session = bob.session(key);
    alice_session.open().await.expect("alice opens room");
    bob_session.open().await.expect("bob opens room");

    assert!(bob_session.notify_typing().expect("typing"));
    assert!(!bob_session.notify_typing().expect("typing"));

    assert!(
        eventually(|| alice_session
            .typing(Instant::now())
            .map(|entry| entry.user_id == "bob")
            .unwrap_or(false))
        .await
    );
}

#[tokio::test]
async fn deleted_room_disappears_for_live_members() {
    let (base_url, state) = start_gateway().await;
    let alice = login(&base_url, "alice").await;
    let bob = login(&base_url, "bob").await;

    let room = alice
        .create_room(CreateRoomRequest {
            name: "Temp".to_string(),
            member_ids: vec!["bob".to_string()],
        })
        .await
        .expect("create room");
    let key = ConversationKey::room(room.id.clone());

    assert_eq!(bob.refresh_rooms().await.expect("list rooms").len(), 1);
    let bob_session = bob.session(key.clone());
    bob_session.open().await.expect("bob opens room");
    assert!(bob.gateway().is_joined(&key));

    alice.delete_room(&room.id).await.expect("delete accepted");

    assert!(eventually(|| bob.rooms().is_empty()).await);
    assert!(!bob_session.is_open());
    assert!(!bob.gateway().is_joined(&key));
    assert_eq!(state.hub().member_count(&key).await, 0);
}

#[tokio::test]
async fn outsider_cannot_join_a_room() {
    let (base_url, _state) = start_gateway().await;
    let alice = login(&base_url, "alice").await;
    let mallory = login(&base_url, "mallory").await;

    let room = alice
        .create_room(CreateRoomRequest {
            name: "Private".to_string(),
            member_ids: Vec::new(),
        })
        .await
        .expect("create room");

    let session = mallory.session(ConversationKey::room(room.id.clone()));
    let err = session.open().await.expect_err("join refused");
    assert_eq!(err.code(), huddle_chats::ErrorCode::Unauthorized);
    assert!(!session.is_open());
    assert!(mallory.gateway().transport().is_connected());
}
