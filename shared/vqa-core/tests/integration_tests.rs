use tokio_test::{assert_err, assert_ok};
use vqa_core::{format_timestamp, parse_timestamp, RawSegment, Transcript, TranscriptSegment};

#[test]
fn test_transcript_lines_round_through_formatting() {
    let transcript = Transcript::new(vec![
        TranscriptSegment::new(0.0, 5.0, "Hello"),
        TranscriptSegment::new(5.0, 10.0, "world today"),
        TranscriptSegment::new(61.0, 65.0, "goodbye"),
    ]);

    assert_eq!(
        transcript.to_lines(),
        "[0:00] Hello\n[0:05] world today\n[1:01] goodbye"
    );
    assert_eq!(transcript.total_duration(), 65.0);
}

#[test]
fn test_unordered_overlapping_input_is_tolerated() {
    let transcript = Transcript::new(vec![
        TranscriptSegment::new(30.0, 45.0, "late"),
        TranscriptSegment::new(0.0, 40.0, "long opener"),
        TranscriptSegment::new(10.0, 12.0, "overlapped"),
    ]);

    let starts: Vec<f64> = transcript.iter().map(|s| s.start).collect();
    assert_eq!(starts, vec![0.0, 10.0, 30.0]);
    // first match wins when segments overlap
    assert_eq!(transcript.index_at(11.0), Some(0));
}

#[test]
fn test_raw_entries_from_scraped_captions() {
    // UI-scraped captions carry only start timestamps
    let raw: Vec<RawSegment> = ["0:00", "0:04", "0:09"]
        .iter()
        .zip(["intro", "<b>middle</b>", "outro"])
        .map(|(ts, text)| RawSegment::new(parse_timestamp(ts).unwrap(), text))
        .collect();

    let transcript = Transcript::from_raw(raw);
    let segments = transcript.segments();

    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].end, 4.0);
    assert_eq!(segments[1].text, "middle");
    assert_eq!(segments[2].end, 14.0);
}

#[test]
fn test_timestamp_helpers() {
    assert_ok!(parse_timestamp("12:34"));
    assert_err!(parse_timestamp("twelve"));
    assert_eq!(format_timestamp(754.9), "12:34");
}

#[test]
fn test_invalid_json_is_an_error_not_a_panic() {
    assert_err!(Transcript::from_json("{not json"));
    let empty = assert_ok!(Transcript::from_json("[]"));
    assert!(empty.is_empty());
}

#[test]
fn test_one_bad_caption_entry_keeps_the_rest() {
    let json = r#"[
        {"start": 0.0, "dur": 2.0, "text": "good one"},
        {"start": "0:05", "dur": 2.0, "text": "timestamp start"},
        {"start": 3.0, "text": 42},
        {"start": 10.0, "dur": 2.0, "text": "last"}
    ]"#;

    let transcript = assert_ok!(Transcript::from_json(json));

    assert_eq!(
        transcript.to_lines(),
        "[0:00] good one\n[0:05] timestamp start\n[0:10] last"
    );
    assert_eq!(transcript.total_duration(), 12.0);
}
