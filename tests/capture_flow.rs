//! End-to-end tests for the session capture engine

use viamon_core::core::session::{CaptureEvent, EngineConfig, SessionEngine};
use viamon_core::core::simulator::InstrumentSimulator;
use viamon_core::core::sink::SessionSink;

fn engine_in(dir: &std::path::Path) -> SessionEngine {
    let sink = SessionSink::derived(dir, "VIA.20251108.1845");
    SessionEngine::new(sink, EngineConfig::default())
}

/// Feed a byte stream in chunks of the given size, then finish.
fn feed_chunked(engine: &mut SessionEngine, stream: &[u8], chunk: usize) -> Vec<CaptureEvent> {
    let mut events = Vec::new();
    for part in stream.chunks(chunk) {
        events.extend(engine.feed(part));
    }
    events.extend(engine.finish());
    events
}

#[test]
fn minimal_hex_cycle_yields_sentinel_txt_and_no_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_in(tmp.path());
    engine.feed(b"Reading full 4106-byte measurement...\n20 00\nFull 4106 bytes received\n");
    engine.finish();

    let txt = tmp.path().join("VIA.20251108.1845.01.txt");
    let body = std::fs::read_to_string(&txt).unwrap();
    assert_eq!(body, "===VIA START===\n20 00\n===VIA STOP===\n");
    assert!(!tmp.path().join("VIA.20251108.1845.01.csv").exists());
}

#[test]
fn txt_line_count_matches_captured_hex_lines() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_in(tmp.path());

    let mut stream = String::from("Reading full 4106-byte measurement...\n");
    let hex_lines: Vec<String> = (0..40).map(|i| format!("{i:02X} {:02X}", i + 1)).collect();
    for line in &hex_lines {
        stream.push_str(line);
        stream.push('\n');
    }
    stream.push_str("Full 4106 bytes received\n");

    feed_chunked(&mut engine, stream.as_bytes(), 7);

    let body = std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.txt")).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.first(), Some(&"===VIA START==="));
    assert_eq!(lines.last(), Some(&"===VIA STOP==="));
    let captured = &lines[1..lines.len() - 1];
    assert_eq!(captured.len(), hex_lines.len());
    for (captured, expected) in captured.iter().zip(&hex_lines) {
        assert_eq!(captured, expected);
    }
}

#[test]
fn csv_cycle_row_count_and_header() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_in(tmp.path());

    let stream = "CSV DATA OUTPUT:\nPixel,Intensity\n0,10\n1,20\nnoise in between\n2,30\nEND CSV DATA\n";
    engine.feed(stream.as_bytes());
    engine.finish();

    let body = std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.csv")).unwrap();
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "Pixel,Intensity");
    // Three valid int,int rows; the header and noise lines contribute none.
    assert_eq!(lines.len(), 4);
}

#[test]
fn same_stream_twice_produces_identical_files() {
    let stream = InstrumentSimulator::new(42).measurement_cycle();

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut a = engine_in(dir_a.path());
    let mut b = engine_in(dir_b.path());

    // Different chunkings of the same bytes must not change the output.
    feed_chunked(&mut a, stream.as_bytes(), 13);
    feed_chunked(&mut b, stream.as_bytes(), 512);

    for name in ["VIA.20251108.1845.01.txt", "VIA.20251108.1845.01.csv"] {
        let file_a = std::fs::read(dir_a.path().join(name)).unwrap();
        let file_b = std::fs::read(dir_b.path().join(name)).unwrap();
        assert_eq!(file_a, file_b, "artifact {name} differs");
    }
}

#[test]
fn full_simulator_cycle_produces_expected_counts() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_in(tmp.path());
    let stream = InstrumentSimulator::new(7).measurement_cycle();
    feed_chunked(&mut engine, stream.as_bytes(), 64);

    let txt = std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.txt")).unwrap();
    // 4106 bytes at 16 per line is 257 hex lines, plus two sentinels.
    assert_eq!(txt.lines().count(), 257 + 2);

    let csv = std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.01.csv")).unwrap();
    // Header plus one row per pixel.
    assert_eq!(csv.lines().count(), 2048 + 1);
}

#[test]
fn spurious_restart_discards_and_recovers() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_in(tmp.path());

    let stream = "Starting Measurement #1\n\
                  Reading full 4106-byte measurement\n\
                  AA BB\n\
                  Starting Measurement #2\n\
                  Reading full 4106-byte measurement\n\
                  CC DD\n\
                  Full 4106 bytes received\n\
                  Measurement Complete!\n";
    let events = feed_chunked(&mut engine, stream.as_bytes(), 11);

    assert!(events
        .iter()
        .any(|e| matches!(e, CaptureEvent::MeasurementDiscarded { .. })));

    // Only the second measurement produced an artifact.
    assert!(!tmp.path().join("VIA.20251108.1845.01.txt").exists());
    let body = std::fs::read_to_string(tmp.path().join("VIA.20251108.1845.02.txt")).unwrap();
    assert!(body.contains("CC DD"));
    assert!(!body.contains("AA BB"));
}

#[test]
fn session_log_is_verbatim() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = SessionSink::open_at(tmp.path(), "20251108.1845").unwrap();
    let dir = sink.dir().to_path_buf();
    let mut engine = SessionEngine::new(sink, EngineConfig::default());

    let stream = "chatter\nReading full 4106-byte measurement\n20 00\nFull 4106 bytes received\n";
    for part in stream.as_bytes().chunks(9) {
        engine.feed(part);
    }
    engine.finish();

    let log = std::fs::read_to_string(dir.join("VIA.20251108.1845.log")).unwrap();
    assert_eq!(log, stream);
}

#[test]
fn two_measurement_log_extracts_two_artifact_pairs() {
    let tmp = tempfile::tempdir().unwrap();
    let mut sim = InstrumentSimulator::new(3);
    let log = format!("{}{}", sim.measurement_cycle(), sim.measurement_cycle());

    let mut engine = engine_in(tmp.path());
    feed_chunked(&mut engine, log.as_bytes(), 256);

    for name in [
        "VIA.20251108.1845.01.txt",
        "VIA.20251108.1845.01.csv",
        "VIA.20251108.1845.02.txt",
        "VIA.20251108.1845.02.csv",
    ] {
        assert!(tmp.path().join(name).exists(), "missing {name}");
    }
}
