//! Fuzz target for scripted model loading.
//!
//! Arbitrary bytes parsed as a script must never panic, and any script that
//! loads must decode without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use caption_core::decode::{BeamSearchConfig, BeamSearchDecoder};
use caption_core::model::{ScriptedModel, SpecialTokens};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(model) = ScriptedModel::from_json(text) else {
        return;
    };
    let Ok(decoder) =
        BeamSearchDecoder::new(model, SpecialTokens::new(0, 1), BeamSearchConfig::new(3, 8))
    else {
        return;
    };
    // Errors are fine; panics are not.
    let _ = decoder.generate(0);
});
