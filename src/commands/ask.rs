//! Ask command implementation

use crate::error::Result;
use crate::retrieve::{citations, Citation, RetrievalEngine, RetrievedChunk};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AskResult {
    pub game_id: i64,
    pub question: String,
    pub citations: Vec<Citation>,
    pub passages: Vec<RetrievedChunk>,
}

/// Retrieve the passages that answer `question` for a game
pub async fn cmd_ask(engine: &RetrievalEngine, game_id: i64, question: &str, k: Option<usize>) -> Result<AskResult> {
    let passages = engine.retrieve(question, game_id, k).await?;
    Ok(AskResult {
        game_id,
        question: question.trim().to_string(),
        citations: citations(&passages),
        passages,
    })
}

/// Print passages to console
pub fn print_ask_result(result: &AskResult) {
    println!("\n🎲 Question: {}\n", result.question);

    if result.passages.is_empty() {
        println!("No processed rulebooks matched for game {}.", result.game_id);
        return;
    }

    for (i, p) in result.passages.iter().enumerate() {
        println!(
            "{}. [score: {:.3}] rulebook {} page {}",
            i + 1,
            p.score,
            p.rulebook_id,
            p.page_number
        );
        let preview: String = p.text.chars().take(200).collect();
        let ellipsis = if p.text.chars().count() > 200 { "..." } else { "" };
        println!("   {}{}\n", preview.trim().replace('\n', " "), ellipsis);
    }

    let cited: Vec<String> = result
        .citations
        .iter()
        .map(|c| format!("rulebook {} p.{}", c.rulebook_id, c.page))
        .collect();
    println!("Citations: {}", cited.join(", "));
}
