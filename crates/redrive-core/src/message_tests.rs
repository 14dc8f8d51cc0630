//! Tests for message types.

use super::*;

#[test]
fn test_message_id_generation_is_unique() {
    let id1 = MessageId::new();
    let id2 = MessageId::new();

    assert_ne!(id1, id2);
    assert!(!id1.as_str().is_empty());
}

#[test]
fn test_message_id_from_str() {
    let id: MessageId = "5fea7756-0ea4-451a-a703-a558b933e274".parse().unwrap();
    assert_eq!(id.as_str(), "5fea7756-0ea4-451a-a703-a558b933e274");
    assert_eq!(id.to_string(), "5fea7756-0ea4-451a-a703-a558b933e274");

    assert!("".parse::<MessageId>().is_err());
}

#[test]
fn test_receipt_handle_rejects_empty() {
    assert!(ReceiptHandle::new(String::new()).is_err());
    assert_eq!(
        ReceiptHandle::new("AQEBwJnK".to_string()).unwrap().as_str(),
        "AQEBwJnK"
    );
}

#[test]
fn test_receipt_handle_debug_is_truncated() {
    let handle = ReceiptHandle::new("AQEBwJnKyrHigUMZj6rYigCgxlaS3SLy0a".to_string()).unwrap();
    let debug = format!("{:?}", handle);

    assert!(debug.starts_with("ReceiptHandle(AQEBwJnK"));
    assert!(!debug.contains("yrHigUMZj6rYigCgxlaS3SLy0a"));
}

#[test]
fn test_message_builder() {
    let id: MessageId = "msg-1".parse().unwrap();
    let message = Message::new(r#"{"order":42}"#)
        .with_id(id.clone())
        .with_attribute("x-correlation-id", "abc")
        .with_receipt_handle(ReceiptHandle::new("rh-1".to_string()).unwrap());

    assert_eq!(message.id, id);
    assert_eq!(message.content, r#"{"order":42}"#);
    assert_eq!(
        message.attributes.get("x-correlation-id").map(String::as_str),
        Some("abc")
    );
    assert_eq!(
        message.receipt_handle.as_ref().map(ReceiptHandle::as_str),
        Some("rh-1")
    );
}
