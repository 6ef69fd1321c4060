//! Fuzz target for word-counts vocabulary parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use caption_core::vocab::Vocabulary;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(vocab) = Vocabulary::from_word_counts(text) {
            assert_eq!(vocab.id_to_word(vocab.unk_id()), "<UNK>");
        }
    }
});
