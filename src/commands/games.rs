//! Games command implementation

use crate::error::Result;
use crate::meta::{Game, MetaDb, RulebookStatus};
use serde::Serialize;

/// A game with rulebook counts
#[derive(Debug, Clone, Serialize)]
pub struct GameInfo {
    #[serde(flatten)]
    pub game: Game,
    pub rulebooks: usize,
    pub processed: usize,
}

/// List every game with its rulebook counts
pub async fn cmd_list_games(db: &MetaDb) -> Result<Vec<GameInfo>> {
    let games = db.list_games().await?;
    let mut result = Vec::with_capacity(games.len());

    for game in games {
        let rulebooks = db.list_rulebooks(game.game_id).await?;
        let processed = rulebooks
            .iter()
            .filter(|r| r.processing_status == RulebookStatus::Processed.as_str())
            .count();
        result.push(GameInfo {
            rulebooks: rulebooks.len(),
            processed,
            game,
        });
    }

    Ok(result)
}

pub fn print_games(games: &[GameInfo]) {
    if games.is_empty() {
        println!("No games yet. Ingest a rulebook with 'boardgame-rag ingest'.");
        return;
    }

    println!("\n🎲 Games\n");
    for info in games {
        println!(
            "{:>4}  {}  ({} rulebooks, {} processed)",
            info.game.game_id, info.game.title, info.rulebooks, info.processed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::{NewGame, NewRulebook};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_games_counts_rulebooks() {
        let dir = TempDir::new().unwrap();
        let db = MetaDb::new(&dir.path().join("meta.db")).await.unwrap();
        let catan = db.insert_game(&NewGame::titled("Catan")).await.unwrap();
        db.insert_game(&NewGame::titled("Azul")).await.unwrap();
        db.try_insert_rulebook(&NewRulebook {
            game_id: catan.game_id,
            original_filename: "catan.pdf".to_string(),
            storage_path: "/tmp/catan.pdf".to_string(),
            file_hash: "abc".to_string(),
        })
        .await
        .unwrap();

        let games = cmd_list_games(&db).await.unwrap();
        let catan_info = games.iter().find(|g| g.game.title == "Catan").unwrap();
        assert_eq!(catan_info.rulebooks, 1);
        assert_eq!(catan_info.processed, 0);
        let azul_info = games.iter().find(|g| g.game.title == "Azul").unwrap();
        assert_eq!(azul_info.rulebooks, 0);
    }
}
