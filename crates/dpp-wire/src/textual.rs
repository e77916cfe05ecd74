//! YAML interchange form for the diagnostic tool belt.
//!
//! `Message` already carries the field names and declaration order the
//! binary codec uses, so the textual form is just `serde_yaml` applied
//! to the same type: no hand-written grammar to keep in sync with the
//! binary layout.

use serde::{de::DeserializeOwned, Serialize};

/// Render any wire type (typically a [`crate::Message`]) to its YAML form.
pub fn to_yaml<T: Serialize>(value: &T) -> serde_yaml::Result<String> {
    serde_yaml::to_string(value)
}

/// Parse a wire type back out of its YAML form.
pub fn from_yaml<T: DeserializeOwned>(text: &str) -> serde_yaml::Result<T> {
    serde_yaml::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ErrorCode, Message, Response};

    #[test]
    fn textual_round_trip_preserves_enum_names() {
        let msg = Message::Response(Response {
            response_to: 7,
            error_code: ErrorCode::BadSourceMask,
        });
        let text = to_yaml(&msg).expect("serialize");
        assert!(text.contains("BadSourceMask"));
        let back: Message = from_yaml(&text).expect("deserialize");
        assert_eq!(back, msg);
    }

    #[test]
    fn textual_round_trip_unit_variant() {
        let msg = Message::Abort;
        let text = to_yaml(&msg).expect("serialize");
        let back: Message = from_yaml(&text).expect("deserialize");
        assert_eq!(back, msg);
    }
}
