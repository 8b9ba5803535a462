use super::*;

#[test]
fn encoding_is_lossless() {
    let bytes = [0u8, 1, 2, 254, 255, 42];
    let attachment = encode("report.pdf", &bytes);

    assert_eq!(attachment.name, "report.pdf");
    assert!(attachment
        .data
        .starts_with("data:application/octet-stream;base64,"));
    assert_eq!(decode(&attachment).expect("decode"), bytes);
}

#[test]
fn decode_rejects_payload_without_data_url_prefix() {
    let attachment = FileAttachment {
        name: "x".to_string(),
        data: "bm90IGEgZGF0YSB1cmw=".to_string(),
    };
    assert!(matches!(
        decode(&attachment),
        Err(AttachmentError::MalformedEncoding)
    ));
}

#[test]
fn decode_rejects_invalid_base64() {
    let attachment = FileAttachment {
        name: "x".to_string(),
        data: "data:application/octet-stream;base64,@@not-base64@@".to_string(),
    };
    assert!(matches!(
        decode(&attachment),
        Err(AttachmentError::InvalidBase64(_))
    ));
}

#[tokio::test]
async fn read_and_encode_round_trips_a_real_file() {
    let path = std::env::temp_dir().join(format!("attach-encode-{}.bin", std::process::id()));
    tokio::fs::write(&path, b"binary\x00contents")
        .await
        .expect("write temp file");

    let attachment = read_and_encode("contents.bin", &path)
        .await
        .expect("read and encode");
    tokio::fs::remove_file(&path).await.ok();

    assert_eq!(attachment.name, "contents.bin");
    assert_eq!(decode(&attachment).expect("decode"), b"binary\x00contents");
}

#[tokio::test]
async fn read_failure_is_typed_and_names_the_file() {
    let missing = std::env::temp_dir().join("attach-missing-does-not-exist.bin");
    let err = read_and_encode("gone.bin", &missing)
        .await
        .expect_err("must fail");

    match err {
        AttachmentError::Read { name, .. } => assert_eq!(name, "gone.bin"),
        other => panic!("unexpected error: {other:?}"),
    }
}
