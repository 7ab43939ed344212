//! Integration tests for the scribe CLI commands.
//!
//! These drive `execute` end to end against real RocksDB and Tantivy
//! directories.

use std::io::Write;

use tempfile::TempDir;

use scribe_daemon::{execute, open_service, Commands};
use scribe_types::{Category, Entity, EntityType, Post, SearchCriteria, Settings, Tag};

fn settings_in(temp: &TempDir) -> Settings {
    Settings {
        db_path: temp.path().join("db").to_string_lossy().to_string(),
        search_index_path: temp.path().join("index").to_string_lossy().to_string(),
        ..Default::default()
    }
}

fn write_fixture(temp: &TempDir) -> std::path::PathBuf {
    let entities: Vec<Entity> = vec![
        Category::new(1, "Systems").into(),
        Tag::new(1, "rust").into(),
        Post::new(1, "Ownership explained", "Borrowing without tears")
            .with_tags(vec![1])
            .with_category(1)
            .into(),
        Post::new(2, "Async in practice", "Futures and executors").into(),
    ];
    let path = temp.path().join("fixture.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    for entity in &entities {
        writeln!(file, "{}", serde_json::to_string(entity).unwrap()).unwrap();
    }
    path
}

#[tokio::test]
async fn test_import_then_rebuild_then_search() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);
    let fixture = write_fixture(&temp);

    execute(
        Commands::Import {
            file: fixture,
            index: false,
        },
        settings.clone(),
    )
    .await
    .unwrap();
    execute(Commands::Rebuild, settings.clone()).await.unwrap();
    execute(Commands::Status, settings.clone()).await.unwrap();

    let (_storage, service) = open_service(&settings).unwrap();
    let results = service.search(&SearchCriteria::new("ownership")).await;
    assert_eq!(results.total, 1);
    assert_eq!(results.hits[0].entity_id, 1);

    let status = service.get_index_status().await;
    assert_eq!(status.entity_stats[&EntityType::Post].database_count, 2);
    assert_eq!(status.entity_stats[&EntityType::Post].search_engine_count, 2);
}

#[tokio::test]
async fn test_index_remove_and_cleanup_commands() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);
    let fixture = write_fixture(&temp);

    execute(
        Commands::Import {
            file: fixture,
            index: true,
        },
        settings.clone(),
    )
    .await
    .unwrap();

    execute(
        Commands::Remove {
            entity_type: EntityType::Post,
            id: 2,
        },
        settings.clone(),
    )
    .await
    .unwrap();
    execute(Commands::Cleanup, settings.clone()).await.unwrap();
    execute(Commands::Optimize, settings.clone()).await.unwrap();

    let (storage, service) = open_service(&settings).unwrap();
    assert!(storage.find_search_index(EntityType::Post, 2).unwrap().is_none());
    let results = service
        .search(&SearchCriteria::new("async").with_entity_type(EntityType::Post))
        .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_stats_and_sync_on_empty_store() {
    let temp = TempDir::new().unwrap();
    let settings = settings_in(&temp);

    execute(Commands::Stats, settings.clone()).await.unwrap();
    execute(Commands::Sync { all_types: true }, settings.clone())
        .await
        .unwrap();
}
