use std::process::ExitCode;
use std::sync::Arc;

use sketchboard::config::Config;
use sketchboard::medium::LocalHub;
use sketchboard::registry::{BoardEntry, BoardRegistry, MemoryRegistry};
use sketchboard::session::{NullRenderer, Session, SessionError};
use sketchboard::shape::{Point, PropertyChange};
use sketchboard::store::Direction;
use uuid::Uuid;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "demo failed");
            ExitCode::FAILURE
        }
    }
}

/// Two clients editing one in-process board.
async fn run(config: Config) -> Result<(), SessionError> {
    let hub = Arc::new(LocalHub::new(config.channel_capacity));
    let registry = MemoryRegistry::new();
    let board_id = Uuid::new_v4();
    for user in ["ada", "grace"] {
        registry.upsert(user, BoardEntry { board_id, name: "Demo".into(), image_url: None }).await?;
    }

    let peer = Config { client_id: Uuid::new_v4(), ..config.clone() };
    let mut ada = Session::join(hub.clone(), &registry, "ada", board_id, &config, Box::new(NullRenderer)).await?;
    let mut grace = Session::join(hub.clone(), &registry, "grace", board_id, &peer, Box::new(NullRenderer)).await?;

    let rect = ada.create_named("rectangle", Point::new(40.0, 40.0), None).await;
    let label = ada.create_named("text", Point::new(60.0, 200.0), Some("hello")).await;
    grace.pump();

    if let Some(id) = rect {
        grace.modify(&[id], PropertyChange::Fill("#3b82f6".into())).await;
        grace.bring(&[id], Direction::Front).await;
    }
    grace.move_cursor(120.0, 80.0).await;
    grace.react(120.0, 80.0, "👍").await;
    ada.pump();

    if let Some(id) = label {
        ada.delete(&[id]).await;
    }
    grace.pump();

    for shape in grace.board().store().paint_order() {
        tracing::info!(object_id = %shape.object_id, kind = %shape.kind, fill = ?shape.style.fill, "shape");
    }
    let subscribers = hub.subscriber_count(board_id).await;
    tracing::info!(
        subscribers,
        ada = ada.board().store().len(),
        grace = grace.board().store().len(),
        reactions = ada.presence().reactions().len(),
        "boards converged"
    );

    ada.leave().await;
    grace.leave().await;
    Ok(())
}
