use anyhow::Context;
use clap::{Parser, Subcommand};
use huddle_chats::{ConversationKey, NewMessage, Room, TaskConversation};
use huddle_config::load as load_config;
use huddle_gateway::create_router;
use huddle_runtime::{telemetry, BackendServices};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

const SEED_TENANT: &str = "demo";

#[derive(Parser)]
#[command(name = "huddle-server")]
#[command(about = "Huddle chat gateway (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and websocket server
    Serve,
    /// Dump tasks, rooms, and messages from the database
    DumpData,
    /// Remove all conversations from the database
    ClearData,
    /// Seed the database with a demo task and room
    SeedData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(&config, services).await,
        Commands::DumpData => dump_data(&services).await,
        Commands::ClearData => clear_data(&services).await,
        Commands::SeedData => seed_data(&services).await,
    }
}

async fn run_server(
    config: &huddle_config::AppConfig,
    services: BackendServices,
) -> anyhow::Result<()> {
    info!("starting Huddle gateway");

    let app = create_router(services.gateway.clone());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(huddle_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("gateway shut down");
    Ok(())
}

async fn dump_data(services: &BackendServices) -> anyhow::Result<()> {
    info!("dumping conversations from database");

    let tasks = sqlx::query(
        r#"
        SELECT tenant_id, task_id, assignee_id, assigner_id, updated_at
        FROM tasks
        ORDER BY tenant_id, task_id
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch tasks")?;

    println!("=== TASKS ===");
    if tasks.is_empty() {
        println!("No tasks found in database");
    } else {
        println!("Found {} tasks:", tasks.len());
        println!(
            "{:<12} {:<24} {:<16} {:<16} {:<32}",
            "Tenant", "Task ID", "Assignee", "Assigner", "Updated At"
        );
        println!("{}", "-".repeat(104));

        for task in tasks {
            let tenant_id: String = task.get("tenant_id");
            let task_id: String = task.get("task_id");
            let assignee_id: String = task.get("assignee_id");
            let assigner_id: String = task.get("assigner_id");
            let updated_at: String = task.get("updated_at");

            println!(
                "{:<12} {:<24} {:<16} {:<16} {:<32}",
                tenant_id, task_id, assignee_id, assigner_id, updated_at
            );
        }
    }

    println!("\n=== ROOMS ===");
    let rooms = sqlx::query(
        r#"
        SELECT r.tenant_id, r.id, r.name, r.creator_id, r.created_at,
               (SELECT COUNT(*) FROM room_members m
                 WHERE m.tenant_id = r.tenant_id AND m.room_id = r.id) AS members
        FROM rooms r
        ORDER BY r.created_at ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch rooms")?;

    if rooms.is_empty() {
        println!("No rooms found in database");
    } else {
        println!("Found {} rooms:", rooms.len());
        println!(
            "{:<12} {:<26} {:<24} {:<16} {:<8} {:<32}",
            "Tenant", "Room ID", "Name", "Creator", "Members", "Created At"
        );
        println!("{}", "-".repeat(122));

        for room in rooms {
            let tenant_id: String = room.get("tenant_id");
            let id: String = room.get("id");
            let name: String = room.get("name");
            let creator_id: String = room.get("creator_id");
            let members: i64 = room.get("members");
            let created_at: String = room.get("created_at");

            println!(
                "{:<12} {:<26} {:<24} {:<16} {:<8} {:<32}",
                tenant_id, id, name, creator_id, members, created_at
            );
        }
    }

    println!("\n=== MESSAGES ===");
    let messages = sqlx::query(
        r#"
        SELECT id, conversation_kind, conversation_id, sender_id, body, delivery, edited, created_at
        FROM messages
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch messages")?;

    if messages.is_empty() {
        println!("No messages found in database");
    } else {
        println!("Found {} messages:", messages.len());
        println!(
            "{:<26} {:<6} {:<26} {:<16} {:<40} {:<10} {:<7} {:<32}",
            "ID", "Kind", "Conversation", "Sender", "Body (truncated)", "Delivery", "Edited", "Created At"
        );
        println!("{}", "-".repeat(170));

        for message in messages {
            let id: String = message.get("id");
            let kind: String = message.get("conversation_kind");
            let conversation_id: String = message.get("conversation_id");
            let sender_id: String = message.get("sender_id");
            let body: String = message.get("body");
            let delivery: String = message.get("delivery");
            let edited: bool = message.get("edited");
            let created_at: String = message.get("created_at");

            println!(
                "{:<26} {:<6} {:<26} {:<16} {:<40} {:<10} {:<7} {:<32}",
                id,
                kind,
                conversation_id,
                sender_id,
                truncate(&body, 37),
                delivery,
                edited,
                created_at
            );
        }
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

async fn clear_data(services: &BackendServices) -> anyhow::Result<()> {
    info!("clearing all conversations from database");

    let mut tx = services
        .db_pool
        .begin()
        .await
        .context("failed to start transaction")?;

    let messages_deleted = sqlx::query("DELETE FROM messages")
        .execute(&mut *tx)
        .await
        .context("failed to delete messages")?;

    // Members go with their rooms.
    let rooms_deleted = sqlx::query("DELETE FROM rooms")
        .execute(&mut *tx)
        .await
        .context("failed to delete rooms")?;

    let tasks_deleted = sqlx::query("DELETE FROM tasks")
        .execute(&mut *tx)
        .await
        .context("failed to delete tasks")?;

    tx.commit().await.context("failed to commit")?;

    println!("Database cleared:");
    println!("- {} messages deleted", messages_deleted.rows_affected());
    println!("- {} rooms deleted", rooms_deleted.rows_affected());
    println!("- {} tasks deleted", tasks_deleted.rows_affected());

    Ok(())
}

async fn seed_data(services: &BackendServices) -> anyhow::Result<()> {
    info!("seeding database with demo conversations");

    let repository = services.gateway.repository();

    let task = repository
        .upsert_task(TaskConversation {
            tenant_id: SEED_TENANT.to_string(),
            task_id: "task-onboarding".to_string(),
            assignee_id: "alice".to_string(),
            assigner_id: "bob".to_string(),
        })
        .await
        .context("failed to insert demo task")?;

    let room = repository
        .create_room(Room::new(
            SEED_TENANT,
            "alice",
            "General",
            ["bob".to_string(), "carol".to_string()],
        ))
        .await
        .context("failed to insert demo room")?;

    let seeded = [
        (ConversationKey::task(task.task_id.clone()), "bob", "Can you pick this up today?"),
        (ConversationKey::task(task.task_id.clone()), "alice", "On it."),
        (ConversationKey::room(room.id.clone()), "alice", "Welcome to the room!"),
        (ConversationKey::room(room.id.clone()), "carol", "Glad to be here."),
    ];

    for (conversation, sender, body) in seeded {
        repository
            .create_message(NewMessage {
                tenant_id: SEED_TENANT.to_string(),
                conversation,
                sender_id: sender.to_string(),
                sender_name: None,
                body: body.to_string(),
                temp_id: None,
                attachment: None,
            })
            .await
            .context("failed to insert demo message")?;
    }

    println!("Database seeded for tenant '{SEED_TENANT}':");
    println!("- task {} (alice, bob)", task.task_id);
    println!("- room {} '{}' (alice, bob, carol)", room.id, room.name);
    println!("- 4 messages created");
    println!("Run 'dump-data' to see the inserted data");

    Ok(())
}
