//! Bounded chat-history buffer.
//!
//! Holds the recent turns of the active chat context, capped at
//! [`HISTORY_CAP`] entries. Turns arrive alternately (user then assistant),
//! so eviction drops from the head in pairs and never leaves a dangling
//! half-exchange. Persistence is local (not synced) and best-effort: a
//! failed write is logged, a failed read degrades to an empty buffer.

use std::fs;
use std::path::PathBuf;

use shared::chat::ChatTurn;

pub const HISTORY_CAP: usize = 20;

fn history_path() -> Option<PathBuf> {
    let proj = directories::ProjectDirs::from("com.local", "TextLens", "TextLens")?;
    let _ = fs::create_dir_all(proj.data_local_dir());
    Some(proj.data_local_dir().join("chat_history.json"))
}

fn load_or_empty(path: Option<&PathBuf>) -> Vec<ChatTurn> {
    let Some(path) = path else {
        return Vec::new();
    };
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path).map_err(anyhow::Error::from).and_then(|raw| {
        serde_json::from_str::<Vec<ChatTurn>>(&raw).map_err(anyhow::Error::from)
    }) {
        Ok(turns) => turns,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "chat history unreadable, starting empty");
            Vec::new()
        }
    }
}

pub struct HistoryBuffer {
    path: Option<PathBuf>,
    turns: Vec<ChatTurn>,
}

impl HistoryBuffer {
    /// Open the buffer at the platform-local data location.
    pub fn open() -> Self {
        Self::with_path(history_path())
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self::with_path(Some(path))
    }

    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        let turns = load_or_empty(path.as_ref());
        Self { path, turns }
    }

    /// Append one turn, evicting the oldest pair once the cap is exceeded.
    pub fn append(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
        self.trim();
        self.persist();
    }

    /// Append a completed user/assistant exchange.
    pub fn append_exchange(
        &mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) {
        self.turns.push(ChatTurn::user(user));
        self.turns.push(ChatTurn::assistant(assistant));
        self.trim();
        self.persist();
    }

    pub fn get_all(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.persist();
    }

    fn trim(&mut self) {
        while self.turns.len() > HISTORY_CAP {
            self.turns.drain(0..2);
        }
    }

    fn persist(&self) {
        let Some(path) = &self.path else { return };
        let json = match serde_json::to_string_pretty(&self.turns) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "chat history not serializable");
                return;
            }
        };
        if let Err(e) = fs::write(path, json) {
            tracing::warn!(path = %path.display(), error = %e, "chat history write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cap_holds_over_long_sequences() {
        let mut buffer = HistoryBuffer::in_memory();
        for i in 0..30 {
            buffer.append_exchange(format!("q{i}"), format!("a{i}"));
            assert!(buffer.len() <= HISTORY_CAP);
            assert_eq!(buffer.len() % 2, 0);
        }
        assert_eq!(buffer.len(), HISTORY_CAP);
    }

    #[test]
    fn test_single_turn_is_allowed() {
        let mut buffer = HistoryBuffer::in_memory();
        buffer.append(ChatTurn::user("only one"));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_eviction_drops_exactly_the_oldest_pair() {
        let mut buffer = HistoryBuffer::in_memory();
        for i in 0..10 {
            buffer.append_exchange(format!("q{i}"), format!("a{i}"));
        }
        assert_eq!(buffer.len(), HISTORY_CAP);

        buffer.append_exchange("q10", "a10");
        let turns = buffer.get_all();
        assert_eq!(turns.len(), HISTORY_CAP);
        // q0/a0 are gone; q1 is now at the head and q10 at the tail.
        assert_eq!(turns[0], ChatTurn::user("q1"));
        assert_eq!(turns[1], ChatTurn::assistant("a1"));
        assert_eq!(turns[18], ChatTurn::user("q10"));
        assert_eq!(turns[19], ChatTurn::assistant("a10"));
    }

    #[test]
    fn test_clear_empties_the_buffer() {
        let mut buffer = HistoryBuffer::in_memory();
        buffer.append_exchange("q", "a");
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        {
            let mut buffer = HistoryBuffer::at_path(path.clone());
            buffer.append_exchange("hello", "hi there");
        }
        let reopened = HistoryBuffer::at_path(path);
        assert_eq!(
            reopened.get_all(),
            &[ChatTurn::user("hello"), ChatTurn::assistant("hi there")]
        );
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        fs::write(&path, "[{broken").unwrap();
        let buffer = HistoryBuffer::at_path(path);
        assert!(buffer.is_empty());
    }
}
