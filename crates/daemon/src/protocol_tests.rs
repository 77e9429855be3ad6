// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use yare::parameterized;

#[test]
fn request_carries_type_tag() {
    let request = Request::Redeem {
        customer: "gid://shopify/Customer/42".to_string(),
        reward_id: RewardId::new("five"),
    };

    let encoded = encode(&request).expect("encode failed");
    let json: serde_json::Value = serde_json::from_slice(&encoded).expect("valid json");

    assert_eq!(json["type"], "Redeem");
    assert_eq!(json["reward_id"], "five");
    assert_eq!(decode::<Request>(&encoded).expect("decode failed"), request);
}

#[test]
fn history_since_is_optional_on_the_wire() {
    let decoded: Request =
        decode(br#"{"type":"History","customer":"cus-1"}"#).expect("decode failed");
    assert_eq!(
        decoded,
        Request::History {
            customer: "cus-1".to_string(),
            since: None,
        }
    );
}

#[parameterized(
    accrual = { Job::Accrual, "accrual" },
    offers = { Job::Offers, "offers" },
    reconcile = { Job::Reconcile, "reconcile" },
    backfill = { Job::Backfill, "backfill" },
    audit = { Job::Audit, "audit" },
)]
fn job_names_match_wire_form(job: Job, name: &str) {
    assert_eq!(job.name(), name);
    let encoded = encode(&job).expect("encode failed");
    assert_eq!(encoded, format!("\"{}\"", name).into_bytes());
}

#[test]
fn job_report_is_tagged_by_job() {
    let response = Response::JobDone {
        report: JobReport::Accrual(AccrualReport {
            processed: 4,
            updated: 3,
            skipped: 1,
            failed: 0,
        }),
    };

    let encoded = encode(&response).expect("encode failed");
    let json: serde_json::Value = serde_json::from_slice(&encoded).expect("valid json");

    assert_eq!(json["report"]["job"], "accrual");
    assert_eq!(json["report"]["updated"], 3);
    assert_eq!(decode::<Response>(&encoded).expect("decode failed"), response);
}

#[test]
fn unknown_request_type_is_rejected() {
    let result: Result<Request, _> = decode(br#"{"type":"Teleport"}"#);
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");
    assert_eq!(read_back, data);
}

#[tokio::test]
async fn empty_stream_reads_as_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn oversized_length_prefix_is_refused() {
    let mut bytes = u32::MAX.to_be_bytes().to_vec();
    bytes.extend_from_slice(b"{}");
    let mut cursor = std::io::Cursor::new(bytes);

    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn request_round_trips_over_a_duplex_stream() {
    let (mut client, mut server) = tokio::io::duplex(1024);
    let request = Request::Adjust {
        customer: "cus-1".to_string(),
        change: -25,
        reason: "correction".to_string(),
        adjustment_id: "adj-9".to_string(),
    };

    write_message(&mut client, &encode(&request).expect("encode failed"))
        .await
        .expect("write failed");
    let received = read_request(&mut server, DEFAULT_TIMEOUT)
        .await
        .expect("read failed");

    assert_eq!(received, request);
}

#[tokio::test]
async fn read_request_times_out_on_silence() {
    let (_client, mut server) = tokio::io::duplex(64);
    let result = read_request(&mut server, Duration::from_millis(10)).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
