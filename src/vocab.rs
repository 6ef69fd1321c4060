// Copyright 2024-2026 Caption-Core Contributors
// SPDX-License-Identifier: Apache-2.0

//! Caption vocabulary loaded from a word-counts file.
//!
//! Each line holds `word count`; a word's id is its line index. The start,
//! end and unknown words are looked up by name, and the unknown word is
//! appended when the file does not list it.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::decode::TokenId;
use crate::model::SpecialTokens;

pub const START_WORD: &str = "<S>";
pub const END_WORD: &str = "</S>";
pub const UNKNOWN_WORD: &str = "<UNK>";

/// Errors raised while loading a vocabulary.
#[derive(Debug, Error)]
pub enum VocabError {
    #[error("Failed to read vocabulary file: {0}")]
    Io(String),
    #[error("Line {line}: expected `word count`, got {content:?}")]
    MalformedLine { line: usize, content: String },
    #[error("Word {word:?} appears more than once")]
    Duplicate { word: String },
    #[error("Vocabulary is missing required word {0}")]
    MissingWord(&'static str),
}

/// Bidirectional word/id mapping.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    words: Vec<String>,
    ids: HashMap<String, TokenId>,
    start_id: TokenId,
    end_id: TokenId,
    unk_id: TokenId,
}

impl Vocabulary {
    /// Build from words in id order. Must contain [`START_WORD`] and
    /// [`END_WORD`]; [`UNKNOWN_WORD`] is appended if absent.
    pub fn from_words<I, W>(words: I) -> Result<Self, VocabError>
    where
        I: IntoIterator<Item = W>,
        W: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        let mut ids = HashMap::new();
        for word in words {
            let word = word.into();
            if ids.insert(word.clone(), list.len() as TokenId).is_some() {
                return Err(VocabError::Duplicate { word });
            }
            list.push(word);
        }

        let start_id = *ids.get(START_WORD).ok_or(VocabError::MissingWord(START_WORD))?;
        let end_id = *ids.get(END_WORD).ok_or(VocabError::MissingWord(END_WORD))?;
        let unk_id = match ids.get(UNKNOWN_WORD) {
            Some(&id) => id,
            None => {
                let id = list.len() as TokenId;
                list.push(UNKNOWN_WORD.to_string());
                ids.insert(UNKNOWN_WORD.to_string(), id);
                id
            }
        };

        Ok(Self {
            words: list,
            ids,
            start_id,
            end_id,
            unk_id,
        })
    }

    /// Parse word-counts text. Blank lines are ignored; counts are checked
    /// for shape but otherwise unused.
    pub fn from_word_counts(content: &str) -> Result<Self, VocabError> {
        let mut words = Vec::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (word, count) = match (parts.next(), parts.next(), parts.next()) {
                (Some(w), Some(c), None) => (w, c),
                _ => {
                    return Err(VocabError::MalformedLine {
                        line: idx + 1,
                        content: raw.to_string(),
                    })
                }
            };
            if count.parse::<u64>().is_err() {
                return Err(VocabError::MalformedLine {
                    line: idx + 1,
                    content: raw.to_string(),
                });
            }
            words.push(word.to_string());
        }
        Self::from_words(words)
    }

    pub fn from_file(path: &Path) -> Result<Self, VocabError> {
        let content = std::fs::read_to_string(path).map_err(|e| VocabError::Io(e.to_string()))?;
        Self::from_word_counts(&content)
    }

    /// Id of `word`, or the unknown-word id.
    pub fn word_to_id(&self, word: &str) -> TokenId {
        self.ids.get(word).copied().unwrap_or(self.unk_id)
    }

    /// Word for `id`, or the unknown word for out-of-range ids.
    pub fn id_to_word(&self, id: TokenId) -> &str {
        self.words
            .get(id as usize)
            .map_or(UNKNOWN_WORD, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn start_id(&self) -> TokenId {
        self.start_id
    }

    pub fn end_id(&self) -> TokenId {
        self.end_id
    }

    pub fn unk_id(&self) -> TokenId {
        self.unk_id
    }

    pub fn special_tokens(&self) -> SpecialTokens {
        SpecialTokens::new(self.start_id, self.end_id)
    }

    /// Render a decoded sequence as text, dropping start and end tokens.
    pub fn caption_text(&self, sequence: &[TokenId]) -> String {
        sequence
            .iter()
            .filter(|&&id| id != self.start_id && id != self.end_id)
            .map(|&id| self.id_to_word(id))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_word_is_appended() {
        let vocab = Vocabulary::from_words(["<S>", "</S>", "a"]).unwrap();
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.unk_id(), 3);
        assert_eq!(vocab.word_to_id("zebra"), 3);
    }

    #[test]
    fn listed_unknown_word_is_reused() {
        let vocab = Vocabulary::from_words(["<UNK>", "<S>", "</S>"]).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.unk_id(), 0);
        assert_eq!(vocab.special_tokens(), SpecialTokens::new(1, 2));
    }

    #[test]
    fn missing_end_word_is_an_error() {
        let err = Vocabulary::from_words(["<S>", "a"]).unwrap_err();
        assert!(matches!(err, VocabError::MissingWord(END_WORD)));
    }

    #[test]
    fn duplicate_word_is_an_error() {
        let err = Vocabulary::from_words(["<S>", "</S>", "a", "a"]).unwrap_err();
        assert!(matches!(err, VocabError::Duplicate { .. }));
    }
}
