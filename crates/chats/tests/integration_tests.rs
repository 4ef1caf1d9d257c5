//! Client-side scenarios driven through the public API with a scripted server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use huddle_chats::{
    Actor, AckOutcome, ChatClient, ChatError, ChatResult, ClientEvent, ClientFrame,
    ClientNotification, ConversationApi, ConversationKey, ConversationSession, CreateRoomRequest,
    DeliveryState, ErrorCode, HistoryQuery, Message, Room, ServerEvent, Transport,
};

#[derive(Clone)]
struct ChannelTransport {
    frames: mpsc::UnboundedSender<ClientFrame>,
    connected: Arc<AtomicBool>,
}

impl Transport for ChannelTransport {
    fn send(&self, frame: ClientFrame) -> ChatResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ChatError::transport("not connected"));
        }
        self.frames
            .send(frame)
            .map_err(|_| ChatError::transport("connection closed"))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
struct StubApi {
    history: Arc<Mutex<Vec<Message>>>,
    rooms: Arc<Mutex<Vec<Room>>>,
    history_down: Arc<AtomicBool>,
}

#[async_trait]
impl ConversationApi for StubApi {
    async fn fetch_history(
        &self,
        key: &ConversationKey,
        _query: &HistoryQuery,
    ) -> ChatResult<Vec<Message>> {
        if self.history_down.load(Ordering::SeqCst) {
            return Err(ChatError::transport("history unavailable"));
        }
        Ok(self
            .history
            .lock()
            .unwrap()
            .iter()
            .filter(|message| &message.conversation == key)
            .cloned()
            .collect())
    }

    async fn edit_message(&self, message_id: &str, body: &str) -> ChatResult<Message> {
        let mut history = self.history.lock().unwrap();
        let message = history
            .iter_mut()
            .find(|message| message.id() == Some(message_id))
            .ok_or_else(|| ChatError::not_found("message", message_id))?;
        message.body = body.to_string();
        message.edited = true;
        Ok(message.clone())
    }

    async fn delete_message(&self, message_id: &str) -> ChatResult<()> {
        let mut history = self.history.lock().unwrap();
        let index = history
            .iter()
            .position(|message| message.id() == Some(message_id))
            .ok_or_else(|| ChatError::not_found("message", message_id))?;
        history.remove(index);
        Ok(())
    }

    async fn create_room(&self, request: &CreateRoomRequest) -> ChatResult<Room> {
        let room = Room::new("t1", "alice", request.name.clone(), request.member_ids.clone());
        self.rooms.lock().unwrap().push(room.clone());
        Ok(room)
    }

    async fn list_rooms(&self) -> ChatResult<Vec<Room>> {
        Ok(self.rooms.lock().unwrap().clone())
    }

    async fn get_room(&self, room_id: &str) -> ChatResult<Room> {
        self.rooms
            .lock()
            .unwrap()
            .iter()
            .find(|room| room.id == room_id)
            .cloned()
            .ok_or_else(|| ChatError::not_found("room", room_id))
    }
}

type TestClient = ChatClient<ChannelTransport, StubApi>;

struct Harness {
    client: TestClient,
    frames: mpsc::UnboundedReceiver<ClientFrame>,
    connected: Arc<AtomicBool>,
}

fn harness(user: &str, api: StubApi) -> Harness {
    harness_with_typing_timeout(user, api, Duration::from_millis(3_000))
}

fn harness_with_typing_timeout(user: &str, api: StubApi, typing_timeout: Duration) -> Harness {
    let (tx, rx) = mpsc::unbounded_channel();
    let connected = Arc::new(AtomicBool::new(true));
    let transport = ChannelTransport {
        frames: tx,
        connected: connected.clone(),
    };
    let actor = Actor::new("t1", user).with_display_name(user.to_uppercase());
    let client = ChatClient::new(
        actor,
        transport,
        api,
        Duration::from_millis(2_000),
        typing_timeout,
    );
    Harness {
        client,
        frames: rx,
        connected,
    }
}

impl Harness {
    async fn next_frame(&mut self) -> ClientFrame {
        tokio::time::timeout(Duration::from_secs(1), self.frames.recv())
            .await
            .expect("frame in time")
            .expect("transport open")
    }

    fn reply(&self, ack: u64, outcome: AckOutcome) {
        self.client.handle_event(ServerEvent::Ack { ack, outcome });
    }

    /// Open a session, granting the join.
    async fn open(&mut self, key: ConversationKey) -> ConversationSession<ChannelTransport, StubApi> {
        let session = self.client.session(key);
        let opening = {
            let session = session.clone();
            tokio::spawn(async move { session.open().await })
        };
        let frame = self.next_frame().await;
        assert!(matches!(frame.event, ClientEvent::Join { .. }));
        self.reply(frame.ack.unwrap(), AckOutcome::ok());
        opening.await.unwrap().unwrap();
        session
    }
}

async fn next_notification(
    notifications: &mut tokio::sync::broadcast::Receiver<ClientNotification>,
) -> ClientNotification {
    tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .expect("notification in time")
        .expect("notification channel open")
}

fn confirm(frame: &ClientFrame, id: &str, sender: &str) -> Message {
    let (key, body, temp_id) = match &frame.event {
        ClientEvent::SendRoomMessage {
            room_id,
            body,
            temp_id,
        } => (ConversationKey::room(room_id.clone()), body, temp_id),
        ClientEvent::SendMessage {
            conversation_id,
            body,
            temp_id,
        } => (ConversationKey::task(conversation_id.clone()), body, temp_id),
        other => panic!("not a send: {:?}", other),
    };
    let mut record = Message::pending(key, sender, None, body.clone(), temp_id.clone(), Utc::now());
    record.id = Some(id.to_string());
    record.delivery = DeliveryState::Sent;
    record
}

#[tokio::test]
async fn scenario_a_ack_replaces_pending_entry() {
    let mut alice = harness("alice", StubApi::default());
    let key = ConversationKey::room("r1");
    let session = alice.open(key.clone()).await;

    let sending = {
        let session = session.clone();
        tokio::spawn(async move { session.send("hello").await })
    };
    let frame = alice.next_frame().await;

    let visible = session.messages();
    assert_eq!(visible.len(), 1);
    assert!(visible[0].is_pending());
    assert_eq!(visible[0].delivery, DeliveryState::Sending);

    let record = confirm(&frame, "m1", "alice");
    alice.reply(frame.ack.unwrap(), AckOutcome::with_message(record.clone()));
    let confirmed = sending.await.unwrap().unwrap();
    assert_eq!(confirmed.id(), Some("m1"));

    let visible = session.messages();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id(), Some("m1"));
    assert_eq!(visible[0].delivery, DeliveryState::Sent);

    // The same record echoed as a broadcast changes nothing.
    alice
        .client
        .handle_event(ServerEvent::RoomMessageReceived { message: record });
    assert_eq!(session.messages().len(), 1);
}

#[tokio::test]
async fn scenario_b_room_member_receives_message_without_sending() {
    let mut alice = harness("alice", StubApi::default());
    let mut bob = harness("bob", StubApi::default());
    let key = ConversationKey::room("r1");
    let alice_session = alice.open(key.clone()).await;
    let bob_session = bob.open(key.clone()).await;

    let sending = {
        let session = alice_session.clone();
        tokio::spawn(async move { session.send("hi").await })
    };
    let frame = alice.next_frame().await;
    let record = confirm(&frame, "m1", "alice");

    alice.reply(frame.ack.unwrap(), AckOutcome::with_message(record.clone()));
    bob.client
        .handle_event(ServerEvent::RoomMessageReceived { message: record });
    sending.await.unwrap().unwrap();

    let seen = bob_session.messages();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].body, "hi");
    assert_eq!(seen[0].sender_id, "alice");
}

#[tokio::test]
async fn scenario_c_room_deleted_clears_local_room() {
    let api = StubApi::default();
    let mut room = Room::new("t1", "alice", "Design", vec!["bob".to_string()]);
    room.id = "r1".into();
    api.rooms.lock().unwrap().push(room);

    let mut bob = harness("bob", api);
    bob.client.refresh_rooms().await.unwrap();
    assert_eq!(bob.client.rooms().len(), 1);

    let key = ConversationKey::room("r1");
    let session = bob.open(key.clone()).await;
    assert!(bob.client.gateway().is_joined(&key));

    let mut notifications = bob.client.subscribe();
    bob.client.handle_event(ServerEvent::RoomDeleted {
        room_id: "r1".into(),
    });

    assert!(bob.client.rooms().is_empty());
    assert!(!session.is_open());
    assert!(!bob.client.gateway().is_joined(&key));
    assert_eq!(
        notifications.recv().await.unwrap(),
        ClientNotification::RoomDeleted {
            room_id: "r1".into()
        }
    );
}

#[tokio::test]
async fn scenario_d_typing_within_cooldown_emits_once() {
    let mut alice = harness("alice", StubApi::default());
    let mut bob = harness("bob", StubApi::default());
    let key = ConversationKey::room("r1");
    let alice_session = alice.open(key.clone()).await;
    bob.open(key.clone()).await;

    let start = Instant::now();
    assert!(alice_session.notify_typing_at(start).unwrap());
    assert!(!alice_session
        .notify_typing_at(start + Duration::from_millis(800))
        .unwrap());

    let mut notifications = bob.client.subscribe();
    let frame = alice.next_frame().await;
    match frame.event {
        ClientEvent::RoomTyping {
            room_id,
            user_id,
            user_name,
        } => bob.client.handle_event_at(
            ServerEvent::RoomTyping {
                room_id,
                user_id,
                user_name,
            },
            start,
        ),
        other => panic!("expected roomTyping, got {:?}", other),
    }
    assert!(alice.frames.try_recv().is_err());

    assert_eq!(
        notifications.try_recv().unwrap(),
        ClientNotification::TypingChanged {
            key: key.clone(),
            user_id: Some("alice".into())
        }
    );
    assert!(notifications.try_recv().is_err());
    assert_eq!(
        bob.client.typing(&key, start).map(|entry| entry.user_id),
        Some("alice".to_string())
    );
    assert!(bob.client.typing(&key, start + Duration::from_secs(3)).is_none());
}

#[tokio::test]
async fn rejected_send_leaves_pending_entry_untouched() {
    let mut alice = harness("alice", StubApi::default());
    let session = alice.open(ConversationKey::task("42")).await;

    let sending = {
        let session = session.clone();
        tokio::spawn(async move { session.send("hello").await })
    };
    let frame = alice.next_frame().await;
    alice.reply(
        frame.ack.unwrap(),
        AckOutcome::Error {
            code: ErrorCode::Persistence,
            message: "disk full".into(),
        },
    );

    let err = sending.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Persistence);
    let visible = session.messages();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].delivery, DeliveryState::Sending);

    let temp_id = visible[0].temp_id.clone().unwrap();
    session.mark_failed(&temp_id).unwrap();
    assert_eq!(session.messages()[0].delivery, DeliveryState::Failed);
}

#[tokio::test]
async fn disconnect_fails_inflight_send_and_drops_membership() {
    let mut alice = harness("alice", StubApi::default());
    let key = ConversationKey::room("r1");
    let session = alice.open(key.clone()).await;

    let sending = {
        let session = session.clone();
        tokio::spawn(async move { session.send("hello").await })
    };
    alice.next_frame().await;

    alice.connected.store(false, Ordering::SeqCst);
    alice.client.handle_disconnected();

    let err = sending.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Transport);
    assert!(!alice.client.gateway().is_joined(&key));
    assert_eq!(session.messages()[0].delivery, DeliveryState::Sending);

    let offline = session.send("again").await.unwrap_err();
    assert_eq!(offline.code(), ErrorCode::Transport);
}

#[tokio::test]
async fn refused_join_keeps_session_closed() {
    let mut carol = harness("carol", StubApi::default());
    let session = carol.client.session(ConversationKey::task("42"));
    let opening = {
        let session = session.clone();
        tokio::spawn(async move { session.open().await })
    };
    let frame = carol.next_frame().await;
    carol.reply(
        frame.ack.unwrap(),
        AckOutcome::Error {
            code: ErrorCode::Unauthorized,
            message: "not a participant".into(),
        },
    );

    let err = opening.await.unwrap().unwrap_err();
    assert!(matches!(err, ChatError::Unauthorized { .. }));
    assert!(!session.is_open());
    assert!(carol.client.gateway().memberships().is_empty());
}

#[tokio::test]
async fn edit_and_delete_go_through_the_api() {
    let api = StubApi::default();
    let key = ConversationKey::room("r1");
    for (id, seconds) in [("m1", 1), ("m2", 2), ("m3", 3)] {
        let mut message = Message::pending(
            key.clone(),
            "alice",
            None,
            format!("body {}", id),
            format!("t-{}", id),
            Utc::now() - chrono::Duration::seconds(10 - seconds),
        );
        message.id = Some(id.into());
        message.delivery = DeliveryState::Sent;
        api.history.lock().unwrap().push(message);
    }

    let mut alice = harness("alice", api);
    let session = alice.open(key).await;
    assert_eq!(session.messages().len(), 3);

    let edited = session.edit("m2", "revised").await.unwrap();
    assert!(edited.edited);
    let visible = session.messages();
    assert_eq!(visible[1].id(), Some("m2"));
    assert_eq!(visible[1].body, "revised");
    assert!(visible[1].edited);

    session.delete("m1").await.unwrap();
    assert_eq!(session.messages().len(), 2);
    assert!(session.delete("m1").await.unwrap_err().is_not_found());
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn close_leaves_channel_and_late_records_are_ignored() {
    let mut alice = harness("alice", StubApi::default());
    let key = ConversationKey::room("r1");
    let session = alice.open(key.clone()).await;

    session.close().unwrap();
    let frame = alice.next_frame().await;
    assert!(matches!(frame.event, ClientEvent::Leave { .. }));
    assert!(frame.ack.is_none());

    let mut late = Message::pending(key.clone(), "bob", None, "late", "t", Utc::now());
    late.id = Some("m9".into());
    alice
        .client
        .handle_event(ServerEvent::RoomMessageReceived { message: late });
    assert!(alice.client.messages(&key).is_none());

    // Closing again sends nothing.
    session.close().unwrap();
    assert!(alice.frames.try_recv().is_err());
}

#[tokio::test]
async fn running_client_clears_typing_after_timeout() {
    let bob = harness_with_typing_timeout("bob", StubApi::default(), Duration::from_millis(100));
    let key = ConversationKey::room("r1");
    let mut notifications = bob.client.subscribe();

    let (events, inbound) = mpsc::channel(8);
    let running = tokio::spawn(bob.client.clone().run(inbound));
    events
        .send(ServerEvent::RoomTyping {
            room_id: "r1".into(),
            user_id: "alice".into(),
            user_name: Some("ALICE".into()),
        })
        .await
        .unwrap();

    assert_eq!(
        next_notification(&mut notifications).await,
        ClientNotification::TypingChanged {
            key: key.clone(),
            user_id: Some("alice".into())
        }
    );
    assert_eq!(
        next_notification(&mut notifications).await,
        ClientNotification::TypingChanged {
            key: key.clone(),
            user_id: None
        }
    );
    assert!(bob.client.typing(&key, Instant::now()).is_none());

    drop(events);
    running.await.unwrap();
    assert_eq!(next_notification(&mut notifications).await, ClientNotification::Disconnected);
}

#[tokio::test]
async fn failed_history_load_leaves_the_channel() {
    let api = StubApi::default();
    api.history_down.store(true, Ordering::SeqCst);
    let mut alice = harness("alice", api);
    let key = ConversationKey::room("r1");

    let session = alice.client.session(key.clone());
    let opening = {
        let session = session.clone();
        tokio::spawn(async move { session.open().await })
    };
    let frame = alice.next_frame().await;
    assert!(matches!(frame.event, ClientEvent::Join { .. }));
    alice.reply(frame.ack.unwrap(), AckOutcome::ok());

    let err = opening.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Transport);
    assert!(!session.is_open());
    assert!(!alice.client.gateway().is_joined(&key));
    let frame = alice.next_frame().await;
    assert!(matches!(frame.event, ClientEvent::Leave { .. }));
}

#[tokio::test]
async fn read_receipt_updates_the_local_list() {
    let api = StubApi::default();
    let key = ConversationKey::room("r1");
    let mut message = Message::pending(key.clone(), "bob", None, "ping", "t-m1", Utc::now());
    message.id = Some("m1".into());
    message.delivery = DeliveryState::Sent;
    api.history.lock().unwrap().push(message);

    let mut alice = harness("alice", api);
    let session = alice.open(key.clone()).await;
    let mut notifications = alice.client.subscribe();

    session.mark_read("m1").unwrap();
    let frame = alice.next_frame().await;
    assert!(matches!(frame.event, ClientEvent::RoomMessageRead { .. }));
    assert_eq!(session.messages()[0].delivery, DeliveryState::Read);
    assert_eq!(
        notifications.try_recv().unwrap(),
        ClientNotification::ConversationChanged { key: key.clone() }
    );

    // A receipt that does not advance the state publishes nothing.
    session.mark_delivered("m1").unwrap();
    alice.next_frame().await;
    assert_eq!(session.messages()[0].delivery, DeliveryState::Read);
    assert!(notifications.try_recv().is_err());
}
