//! Proptest generators for property-based testing.

use proptest::prelude::*;

use threatvault_core::{CapabilityKey, ModelId, TokenPad};
use uuid::Uuid;

/// Generate a capability key.
pub fn capability_key() -> impl Strategy<Value = CapabilityKey> {
    any::<[u8; 32]>().prop_map(CapabilityKey::from_bytes)
}

/// Generate a token pad.
pub fn token_pad() -> impl Strategy<Value = TokenPad> {
    any::<[u8; 32]>().prop_map(TokenPad::from_bytes)
}

/// Generate a model id.
pub fn model_id() -> impl Strategy<Value = ModelId> {
    any::<u128>().prop_map(|n| ModelId::from_uuid(Uuid::from_u128(n)))
}

/// Generate a UTF-8 document of up to `max_chars` characters.
pub fn model_document(max_chars: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(any::<char>(), 0..=max_chars).prop_map(|chars| chars.into_iter().collect())
}

/// Generate a YAML-looking document.
pub fn yaml_document() -> impl Strategy<Value = String> {
    (
        "[A-Za-z][A-Za-z0-9 ]{0,40}",
        prop::collection::vec("[a-z_]{1,12}", 0..10),
    )
        .prop_map(|(title, assets)| {
            let mut doc = format!("title: {}\ntechnical_assets:\n", title);
            for asset in assets {
                doc.push_str(&format!("  {}:\n    id: {}\n", asset, asset));
            }
            doc
        })
}

/// Generate a change reason, including hostile ones.
pub fn change_reason() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Model Import".to_string()),
        Just("../../escape".to_string()),
        "[ -~]{0,40}",
        any::<String>(),
    ]
}
