//! SQLite schema definition

/// SQL schema for the metadata database
pub const SCHEMA_SQL: &str = r#"
-- Games: one row per board game
CREATE TABLE IF NOT EXISTS games (
    game_id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL UNIQUE,
    bgg_id INTEGER UNIQUE,
    description TEXT,
    cover_image_url TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Rulebooks: uploaded PDF files and their processing status
CREATE TABLE IF NOT EXISTS rulebooks (
    rulebook_id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id INTEGER NOT NULL REFERENCES games(game_id) ON DELETE CASCADE,
    original_filename TEXT NOT NULL,
    storage_path TEXT NOT NULL,
    file_hash TEXT NOT NULL,
    processing_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (processing_status IN ('pending', 'processing', 'processed', 'failed')),
    page_count INTEGER,
    chunk_count INTEGER,
    embedding_model TEXT,
    error_message TEXT,
    vectors_purged INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    processed_date TEXT
);

-- Chunks: provenance for every vector written to the index
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    rulebook_id INTEGER NOT NULL REFERENCES rulebooks(rulebook_id) ON DELETE CASCADE,
    game_id INTEGER NOT NULL,
    chunk_index INTEGER NOT NULL,
    page_number INTEGER NOT NULL,
    chunk_text TEXT NOT NULL,
    char_start INTEGER NOT NULL,
    char_end INTEGER NOT NULL,
    chunk_hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(rulebook_id, chunk_index)
);

-- Users: administrative accounts
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Chat history: append-only question/answer transcript per session
CREATE TABLE IF NOT EXISTS chat_history (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    game_id INTEGER NOT NULL REFERENCES games(game_id),
    user_id INTEGER REFERENCES users(user_id),
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    citations_json TEXT
);

-- Game submissions: user requests to add a game
CREATE TABLE IF NOT EXISTS game_submissions (
    submission_id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_title TEXT NOT NULL,
    user_description TEXT,
    submitted_rulebook_path TEXT,
    submission_status TEXT NOT NULL DEFAULT 'Pending Review',
    submitted_by_user_id INTEGER REFERENCES users(user_id),
    submitted_at TEXT NOT NULL,
    admin_notes TEXT
);

-- At most one live rulebook per (game, content)
CREATE UNIQUE INDEX IF NOT EXISTS idx_rulebooks_game_hash_live
    ON rulebooks(game_id, file_hash) WHERE processing_status != 'failed';

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_rulebooks_game ON rulebooks(game_id);
CREATE INDEX IF NOT EXISTS idx_rulebooks_status ON rulebooks(processing_status);
CREATE INDEX IF NOT EXISTS idx_chunks_rulebook ON chunks(rulebook_id);
CREATE INDEX IF NOT EXISTS idx_chunks_game ON chunks(game_id);
CREATE INDEX IF NOT EXISTS idx_chat_session ON chat_history(session_id, timestamp);
"#;
