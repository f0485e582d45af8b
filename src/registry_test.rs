use uuid::Uuid;

use super::*;

fn entry(name: &str) -> BoardEntry {
    BoardEntry { board_id: Uuid::new_v4(), name: name.into(), image_url: None }
}

#[tokio::test]
async fn list_keeps_insertion_order() {
    let registry = MemoryRegistry::new();
    let (a, b) = (entry("Roadmap"), entry("Sketches"));
    registry.upsert("user-1", a.clone()).await.unwrap();
    registry.upsert("user-1", b.clone()).await.unwrap();

    assert_eq!(registry.list("user-1").await, vec![a, b]);
    assert!(registry.list("user-2").await.is_empty());
}

#[tokio::test]
async fn upsert_replaces_same_board_id() {
    let registry = MemoryRegistry::new();
    let mut board = entry("Draft");
    registry.upsert("u", board.clone()).await.unwrap();
    board.image_url = Some("https://img.example/1.png".into());
    registry.upsert("u", board.clone()).await.unwrap();

    let boards = registry.list("u").await;
    assert_eq!(boards.len(), 1);
    assert_eq!(boards[0].image_url.as_deref(), Some("https://img.example/1.png"));
}

#[tokio::test]
async fn resolve_is_scoped_to_user() {
    let registry = MemoryRegistry::new();
    let board = entry("Mine");
    registry.upsert("owner", board.clone()).await.unwrap();

    assert_eq!(registry.resolve("owner", board.board_id).await.unwrap(), board);
    assert!(matches!(
        registry.resolve("someone-else", board.board_id).await,
        Err(RegistryError::BoardNotFound { .. })
    ));
}

#[tokio::test]
async fn blank_names_are_rejected() {
    let registry = MemoryRegistry::new();
    assert_eq!(registry.upsert("u", entry("  ")).await, Err(RegistryError::EmptyName));

    let board = entry("Ok");
    registry.upsert("u", board.clone()).await.unwrap();
    assert_eq!(registry.rename("u", board.board_id, "").await, Err(RegistryError::EmptyName));
}

#[tokio::test]
async fn rename_set_image_and_remove() {
    let registry = MemoryRegistry::new();
    let board = entry("Old");
    registry.upsert("u", board.clone()).await.unwrap();

    registry.rename("u", board.board_id, "New").await.unwrap();
    registry
        .set_image("u", board.board_id, Some("thumb.png".into()))
        .await
        .unwrap();
    let resolved = registry.resolve("u", board.board_id).await.unwrap();
    assert_eq!(resolved.name, "New");
    assert_eq!(resolved.image_url.as_deref(), Some("thumb.png"));

    let removed = registry.remove("u", board.board_id).await.unwrap();
    assert_eq!(removed.board_id, board.board_id);
    assert!(registry.remove("u", board.board_id).await.is_err());
}

#[test]
fn entry_wire_shape() {
    let board = BoardEntry { board_id: Uuid::nil(), name: "B".into(), image_url: Some("i".into()) };
    let value = serde_json::to_value(&board).unwrap();
    assert_eq!(value["boardId"], serde_json::json!(Uuid::nil()));
    assert_eq!(value["imageUrl"], "i");
}
