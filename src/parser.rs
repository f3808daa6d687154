//! Decoder for SPaT (signal phase and timing) logs.
//!
//! A log holds one JSON document per line. Each document nests
//! `message[].data[].intersections[].phases[].phaseStates[]`; every phase
//! state becomes one [`RawSignalEvent`]. Lines that are not valid JSON and
//! states missing a required field are skipped and counted.

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::signal::types::RawSignalEvent;

#[derive(Debug, Deserialize)]
struct SpatDocument {
    #[serde(default)]
    message: Vec<SpatMessage>,
}

#[derive(Debug, Deserialize)]
struct SpatMessage {
    #[serde(default)]
    data: Vec<SpatData>,
}

#[derive(Debug, Deserialize)]
struct SpatData {
    #[serde(default)]
    intersections: Vec<SpatIntersection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpatIntersection {
    region_id: Option<u32>,
    node_id: Option<u32>,
    #[serde(default)]
    phases: Vec<SpatPhase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpatPhase {
    phase_id: Option<u32>,
    #[serde(default)]
    phase_states: Vec<SpatPhaseState>,
}

#[derive(Debug, Deserialize)]
struct SpatPhaseState {
    light: Option<i64>,
    #[serde(rename = "startUTCTime")]
    start_utc_time: Option<i64>,
    #[serde(rename = "likelyEndUTCTime")]
    likely_end_utc_time: Option<i64>,
}

/// Counts reported while decoding a log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub lines: usize,
    pub malformed_lines: usize,
    pub incomplete_states: usize,
    pub filtered_states: usize,
    pub events: usize,
}

/// Decodes one JSON line, appending its phase states to `out`.
///
/// `phases` restricts decoding to the listed phase ids; an empty slice keeps
/// every phase.
///
/// # Errors
///
/// Returns an error if the line is not a valid SPaT document.
pub fn parse_line(
    line: &str,
    phases: &[u32],
    out: &mut Vec<RawSignalEvent>,
    stats: &mut DecodeStats,
) -> Result<()> {
    let doc: SpatDocument = serde_json::from_str(line)?;

    for intersection in doc.message.iter().flat_map(|m| &m.data).flat_map(|d| &d.intersections) {
        for phase in &intersection.phases {
            for state in &phase.phase_states {
                let (Some(region_id), Some(node_id), Some(phase_id)) =
                    (intersection.region_id, intersection.node_id, phase.phase_id)
                else {
                    stats.incomplete_states += 1;
                    continue;
                };
                let (Some(light_code), Some(start_ms), Some(end_ms)) =
                    (state.light, state.start_utc_time, state.likely_end_utc_time)
                else {
                    stats.incomplete_states += 1;
                    continue;
                };

                if !phases.is_empty() && !phases.contains(&phase_id) {
                    stats.filtered_states += 1;
                    continue;
                }

                out.push(RawSignalEvent {
                    region_id,
                    node_id,
                    phase_id,
                    light_code,
                    start_ms,
                    end_ms,
                });
                stats.events += 1;
            }
        }
    }

    Ok(())
}

/// Decodes every non-empty line of a log.
///
/// # Errors
///
/// Only read failures are errors; malformed lines are skipped.
pub fn parse_log<R: BufRead>(reader: R, phases: &[u32]) -> Result<(Vec<RawSignalEvent>, DecodeStats)> {
    let mut events = Vec::new();
    let mut stats = DecodeStats::default();

    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes.with_context(|| format!("failed to read log line {}", idx + 1))?;
        let Ok(line) = std::str::from_utf8(&bytes) else {
            stats.lines += 1;
            stats.malformed_lines += 1;
            debug!(line = idx + 1, "Skipping SPaT line that is not UTF-8");
            continue;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        stats.lines += 1;
        if let Err(e) = parse_line(line, phases, &mut events, &mut stats) {
            stats.malformed_lines += 1;
            debug!(line = idx + 1, error = %e, "Skipping malformed SPaT line");
        }
    }

    Ok((events, stats))
}

/// Opens a SPaT log on disk, decompressing `.gz` files on the fly.
#[tracing::instrument(skip(phases))]
pub fn read_log(path: &str, phases: &[u32]) -> Result<Vec<RawSignalEvent>> {
    let file = File::open(path).with_context(|| format!("failed to open SPaT log '{path}'"))?;

    let reader: Box<dyn Read> = if Path::new(path).extension().and_then(|e| e.to_str()) == Some("gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let (events, stats) = parse_log(BufReader::new(reader), phases)?;

    info!(
        lines = stats.lines,
        malformed_lines = stats.malformed_lines,
        incomplete_states = stats.incomplete_states,
        filtered_states = stats.filtered_states,
        events = stats.events,
        "SPaT log decoded"
    );

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::env;
    use std::fs;
    use std::io::Write;

    const LINE: &str = r#"{"message":[{"data":[{"intersections":[{"regionId":323,"nodeId":12,"phases":[{"phaseId":1,"phaseStates":[{"light":3,"startUTCTime":1741305600000,"likelyEndUTCTime":1741305630000},{"light":5,"startUTCTime":1741305630000,"likelyEndUTCTime":1741305660000}]},{"phaseId":2,"phaseStates":[{"light":7,"startUTCTime":1741305600000,"likelyEndUTCTime":1741305603000}]}]}]}]}]}"#;

    #[test]
    fn test_parse_line_extracts_all_states() {
        let mut out = Vec::new();
        let mut stats = DecodeStats::default();
        parse_line(LINE, &[], &mut out, &mut stats).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(stats.events, 3);
        assert_eq!(
            out[0],
            RawSignalEvent {
                region_id: 323,
                node_id: 12,
                phase_id: 1,
                light_code: 3,
                start_ms: 1_741_305_600_000,
                end_ms: 1_741_305_630_000,
            }
        );
        assert_eq!(out[2].phase_id, 2);
        assert_eq!(out[2].light_code, 7);
    }

    #[test]
    fn test_parse_line_phase_filter() {
        let mut out = Vec::new();
        let mut stats = DecodeStats::default();
        parse_line(LINE, &[2], &mut out, &mut stats).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(stats.filtered_states, 2);
    }

    #[test]
    fn test_parse_line_skips_incomplete_states() {
        let line = r#"{"message":[{"data":[{"intersections":[{"regionId":1,"nodeId":2,"phases":[{"phaseId":3,"phaseStates":[{"light":3,"startUTCTime":1000},{"light":5,"startUTCTime":1000,"likelyEndUTCTime":9000}]}]}]}]}]}"#;
        let mut out = Vec::new();
        let mut stats = DecodeStats::default();
        parse_line(line, &[], &mut out, &mut stats).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(stats.incomplete_states, 1);
    }

    #[test]
    fn test_parse_log_skips_malformed_lines() {
        let input = format!("{LINE}\n\nnot json at all\n{{\"message\": 5}}\n{LINE}\n");
        let (events, stats) = parse_log(input.as_bytes(), &[]).unwrap();

        assert_eq!(events.len(), 6);
        assert_eq!(stats.lines, 4);
        assert_eq!(stats.malformed_lines, 2);
    }

    #[test]
    fn test_parse_log_skips_non_utf8_line() {
        let mut input = Vec::new();
        input.extend_from_slice(LINE.as_bytes());
        input.extend_from_slice(b"\n\xff\xfex\n");
        input.extend_from_slice(LINE.as_bytes());
        input.extend_from_slice(b"\r\n");

        let (events, stats) = parse_log(&input[..], &[]).unwrap();

        assert_eq!(events.len(), 6);
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.malformed_lines, 1);
    }

    #[test]
    fn test_document_without_message_is_empty() {
        let (events, stats) = parse_log("{}\n".as_bytes(), &[]).unwrap();
        assert!(events.is_empty());
        assert_eq!(stats.malformed_lines, 0);
    }

    #[test]
    fn test_read_log_gzip() {
        let path = format!("{}/signal_resilience_test_spat.txt.gz", env::temp_dir().display());
        let _ = fs::remove_file(&path);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        writeln!(encoder, "{LINE}").unwrap();
        fs::write(&path, encoder.finish().unwrap()).unwrap();

        let events = read_log(&path, &[]).unwrap();
        assert_eq!(events.len(), 3);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_read_log_missing_file() {
        assert!(read_log("/nonexistent/spat.txt", &[]).is_err());
    }
}
