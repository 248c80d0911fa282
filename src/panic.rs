//! Panic payload formatting.

use std::any::Any;

/// Render a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_owned()
    } else {
        format!("{payload:?}")
    }
}

#[cfg(test)]
mod tests {
    use std::panic::catch_unwind;

    use rstest::rstest;

    use super::panic_message;

    #[rstest]
    #[case::literal(catch_unwind(|| panic!("static text")), "static text")]
    #[case::formatted(catch_unwind(|| panic!("code {}", 7)), "code 7")]
    fn payload_text_is_recovered(#[case] caught: std::thread::Result<()>, #[case] expected: &str) {
        let payload = caught.expect_err("closure panics");
        assert_eq!(panic_message(payload.as_ref()), expected);
    }

    #[test]
    fn opaque_payloads_fall_back_to_debug() {
        let payload = catch_unwind(|| std::panic::panic_any(42_u8)).expect_err("closure panics");
        assert_eq!(panic_message(payload.as_ref()), "Any { .. }");
    }
}
