//! End-to-end tests for the file transfer client

use std::time::Duration;
use viamon_core::core::codec;
use viamon_core::core::file_transfer::{FileTransferClient, TransferConfig, TransferError};
use viamon_core::core::transport::{MemoryTransport, TransportTrait};

fn test_config() -> TransferConfig {
    TransferConfig {
        response_timeout: Duration::from_millis(200),
        data_timeout: Duration::from_millis(200),
    }
}

async fn connected_memory() -> MemoryTransport {
    let mut t = MemoryTransport::new();
    t.connect().await.unwrap();
    t
}

#[tokio::test]
async fn download_roundtrip_recovers_original_bytes() {
    for len in [0usize, 1, 4106] {
        let payload: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        let t = connected_memory().await;

        let mut response = format!("FILE_START\ndata.bin\n{len}\n");
        for line in codec::hex_dump(&payload) {
            response.push_str(&line);
            response.push('\n');
        }
        response.push_str("FILE_END\n");
        t.push_incoming(response.as_bytes());

        let mut client = FileTransferClient::new(Box::new(t), test_config());
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("data.bin");
        let download = client.get_file("data.bin", &dest).await.unwrap();

        assert!(download.warning.is_none(), "unexpected warning for len {len}");
        assert_eq!(download.actual, len);
        assert_eq!(std::fs::read(&dest).unwrap(), payload);
    }
}

#[tokio::test]
async fn size_mismatch_is_warning_and_file_still_written() {
    let payload: Vec<u8> = vec![0x5A; 4100];
    let t = connected_memory().await;

    // Device declares 4106 but only 4100 bytes follow.
    let mut response = String::from("FILE_START\nspectrum.bin\n4106\n");
    for line in codec::hex_dump(&payload) {
        response.push_str(&line);
        response.push('\n');
    }
    response.push_str("FILE_END\n");
    t.push_incoming(response.as_bytes());

    let mut client = FileTransferClient::new(Box::new(t), test_config());
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("spectrum.bin");
    let download = client.get_file("spectrum.bin", &dest).await.unwrap();

    assert!(matches!(
        download.warning,
        Some(TransferError::SizeMismatch {
            declared: 4106,
            actual: 4100
        })
    ));
    assert_eq!(std::fs::read(&dest).unwrap().len(), 4100);
}

#[tokio::test]
async fn odd_hex_digit_count_fails_and_writes_nothing() {
    let t = connected_memory().await;
    t.push_incoming(b"FILE_START\nbad.bin\n2\nABC\nFILE_END\n");

    let mut client = FileTransferClient::new(Box::new(t), test_config());
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("bad.bin");
    let err = client.get_file("bad.bin", &dest).await.unwrap_err();

    assert!(matches!(err, TransferError::Decode(_)));
    assert!(!dest.exists());
}

#[tokio::test]
async fn timeout_does_not_poison_the_next_command() {
    let t = connected_memory().await;
    let feeder = t.feeder();
    let mut client = FileTransferClient::new(Box::new(t), test_config());

    // First command: no response at all.
    let err = client.list_files().await.unwrap_err();
    assert!(matches!(err, TransferError::Timeout(_)));

    // Second command succeeds on the same connection.
    feeder.push(b"LIST_START\nspectrum.csv,4106\nLIST_END\n");
    let files = client.list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "spectrum.csv");
    assert_eq!(files[0].size, 4106);
}

#[tokio::test]
async fn payload_split_across_chunks_and_whitespace_insensitive() {
    let t = connected_memory().await;
    t.script([
        b"FILE_START\nf.bin\n4\n".as_slice(),
        b"DE AD".as_slice(),
        b" BE".as_slice(),
        b" EF\nFILE_END\n".as_slice(),
    ]);

    let mut client = FileTransferClient::new(Box::new(t), test_config());
    let tmp = tempfile::tempdir().unwrap();
    let dest = tmp.path().join("f.bin");
    let download = client.get_file("f.bin", &dest).await.unwrap();

    assert_eq!(download.actual, 4);
    assert_eq!(std::fs::read(&dest).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

#[tokio::test]
async fn commands_are_newline_terminated_ascii() {
    let t = connected_memory().await;
    t.push_incoming(b"LIST_START\nLIST_END\n");
    let sent = t.sent_probe();
    let feeder = t.feeder();
    let mut client = FileTransferClient::new(Box::new(t), test_config());

    client.list_files().await.unwrap();
    assert_eq!(sent.text(), "LIST_FILES\n");

    feeder.push(b"FILE_START\nf.bin\n1\nAB\nFILE_END\n");
    let tmp = tempfile::tempdir().unwrap();
    client.get_file("f.bin", &tmp.path().join("f.bin")).await.unwrap();
    assert_eq!(sent.text(), "LIST_FILES\nGET_FILE f.bin\n");
}
