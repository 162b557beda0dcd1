//! Break point detection for chunking

/// Priority levels for break points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BreakPriority {
    /// Word boundary (lowest)
    Word = 1,
    /// Sentence boundary
    Sentence = 2,
    /// Paragraph boundary (highest)
    Paragraph = 3,
}

/// A potential break point in text
#[derive(Debug, Clone)]
pub struct BreakPoint {
    /// Byte position where the next chunk may start
    pub position: usize,
    /// Priority of this break point
    pub priority: BreakPriority,
}

impl BreakPoint {
    pub fn new(position: usize, priority: BreakPriority) -> Self {
        Self { position, priority }
    }
}

const SENTENCE_ENDINGS: [&str; 6] = [". ", ".\n", "? ", "?\n", "! ", "!\n"];

/// Find potential break points in the text, sorted by position.
///
/// When several kinds share a position the strongest one wins.
pub fn find_break_points(text: &str) -> Vec<BreakPoint> {
    let mut points = Vec::new();

    for (i, c) in text.char_indices() {
        if c == ' ' || c == '\n' {
            points.push(BreakPoint::new(i + 1, BreakPriority::Word));
        }
    }

    for ending in SENTENCE_ENDINGS {
        for (i, _) in text.match_indices(ending) {
            points.push(BreakPoint::new(i + ending.len(), BreakPriority::Sentence));
        }
    }

    for (i, _) in text.match_indices("\n\n") {
        points.push(BreakPoint::new(i + 2, BreakPriority::Paragraph));
    }

    // Strongest first within a position, so dedup keeps it
    points.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| b.priority.cmp(&a.priority))
    });
    points.dedup_by_key(|p| p.position);

    points
}

/// Ensure a position is on a valid UTF-8 character boundary, moving backwards
pub fn ensure_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    let mut adjusted = pos;
    while adjusted > 0 && !text.is_char_boundary(adjusted) {
        adjusted -= 1;
    }
    adjusted
}

/// Smallest character boundary strictly after `pos`
pub fn next_char_boundary(text: &str, pos: usize) -> usize {
    let mut adjusted = pos + 1;
    while adjusted < text.len() && !text.is_char_boundary(adjusted) {
        adjusted += 1;
    }
    adjusted.min(text.len())
}

/// Pick the end of a chunk starting at `start`.
///
/// Looks for the strongest break in the second half of the window, preferring
/// the latest one among equals, and falls back to a hard cut at the window
/// edge.
pub fn find_best_break(
    text: &str,
    start: usize,
    window: usize,
    break_points: &[BreakPoint],
) -> usize {
    let hard_end = ensure_char_boundary(text, start + window);
    let min_pos = start + window / 2;

    let best = break_points
        .iter()
        .filter(|p| p.position > min_pos && p.position <= hard_end)
        .max_by_key(|p| (p.priority, p.position));

    match best {
        Some(point) => point.position,
        None if hard_end > start => hard_end,
        // Window narrower than one character
        None => next_char_boundary(text, start),
    }
}
