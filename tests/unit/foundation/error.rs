use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ForgeError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        ForgeError::capability("x")
            .to_string()
            .contains("capability error:")
    );
    assert!(
        ForgeError::extraction("x")
            .to_string()
            .contains("extraction error:")
    );
    assert!(
        ForgeError::pipeline("x")
            .to_string()
            .contains("pipeline error:")
    );
    assert!(ForgeError::store("x").to_string().contains("store error:"));
    assert!(
        ForgeError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ForgeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn user_message_hides_pipeline_detail() {
    let err = ForgeError::pipeline("ffmpeg exited with status 1: /tmp/x/in.webm: Invalid data");
    let msg = err.user_message();
    assert!(!msg.contains("/tmp"));
    assert!(!msg.is_empty());

    let err = ForgeError::validation("File is larger than 200 MB.");
    assert_eq!(err.user_message(), "File is larger than 200 MB.");
}

#[test]
fn cancelled_is_detectable() {
    assert!(ForgeError::Cancelled.is_cancelled());
    assert!(!ForgeError::validation("x").is_cancelled());
}
