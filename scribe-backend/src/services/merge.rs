//! Stage output merging
//!
//! The primary stage supplies segments, text and language. An attribution
//! stage supplies speaker turns which are aligned onto the primary segments
//! by time overlap. Whichever stage produced more segments is treated as the
//! finer-grained one and its boundaries win:
//! - primary finer (or equal): each segment gets the speaker it overlaps most
//! - attribution finer: segments are split at turn boundaries, words are
//!   apportioned to the pieces by duration

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Segment, StageJob, StageRole};

/// Merge errors
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No result from a primary stage")]
    MissingPrimary,

    #[error("Malformed {stage} result: {message}")]
    Malformed { stage: String, message: String },
}

#[derive(Debug, Deserialize)]
struct TranscriptionOutput {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    segments: Vec<Segment>,
    #[serde(default)]
    language: Option<String>,
}

/// One speaker turn from the attribution stage
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpeakerTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

#[derive(Debug, Deserialize)]
struct AttributionOutput {
    #[serde(alias = "turns", alias = "speakers")]
    segments: Vec<SpeakerTurn>,
}

/// Merged content of all stages, ready for a ResultDocument
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTranscript {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
}

fn decode<T: serde::de::DeserializeOwned>(job: &StageJob, result: &Value) -> Result<T, MergeError> {
    serde_json::from_value(result.clone()).map_err(|e| MergeError::Malformed {
        stage: job.stage.clone(),
        message: e.to_string(),
    })
}

/// Merge completed stage jobs into one transcript
pub fn merge_stage_results(jobs: &[StageJob]) -> Result<MergedTranscript, MergeError> {
    let (primary_job, primary_result) = jobs
        .iter()
        .filter(|job| job.role == StageRole::Primary)
        .find_map(|job| job.result.as_ref().map(|result| (job, result)))
        .ok_or(MergeError::MissingPrimary)?;

    let output: TranscriptionOutput = decode(primary_job, primary_result)?;

    let text = output
        .text
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            output
                .segments
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        });

    let language = output
        .language
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    let mut segments = output.segments;
    for job in jobs.iter().filter(|job| job.role == StageRole::Attribution) {
        if let Some(result) = &job.result {
            let attribution: AttributionOutput = decode(job, result)?;
            segments = align_speakers(segments, &attribution.segments);
        }
    }

    Ok(MergedTranscript {
        text,
        segments,
        language,
    })
}

/// Overlap of two time ranges in seconds, zero when disjoint
fn overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

/// Speaker with the largest overlap with `[start, end)`; first wins ties
fn dominant_speaker(start: f64, end: f64, turns: &[SpeakerTurn]) -> Option<String> {
    let mut best: Option<(&SpeakerTurn, f64)> = None;
    for turn in turns {
        let shared = overlap(start, end, turn.start, turn.end);
        if shared > 0.0 && best.map_or(true, |(_, most)| shared > most) {
            best = Some((turn, shared));
        }
    }
    best.map(|(turn, _)| turn.speaker.clone())
}

/// Attach speakers to `segments` using `turns`
pub fn align_speakers(segments: Vec<Segment>, turns: &[SpeakerTurn]) -> Vec<Segment> {
    if turns.is_empty() {
        return segments;
    }

    if segments.len() >= turns.len() {
        segments
            .into_iter()
            .map(|mut segment| {
                segment.speaker = dominant_speaker(segment.start, segment.end, turns);
                segment
            })
            .collect()
    } else {
        segments
            .into_iter()
            .flat_map(|segment| split_at_turns(segment, turns))
            .collect()
    }
}

/// Split one segment at every turn boundary strictly inside it
fn split_at_turns(mut segment: Segment, turns: &[SpeakerTurn]) -> Vec<Segment> {
    let mut cuts: Vec<f64> = turns
        .iter()
        .flat_map(|t| [t.start, t.end])
        .filter(|&b| b > segment.start && b < segment.end)
        .collect();
    cuts.sort_by(f64::total_cmp);
    cuts.dedup();

    let words: Vec<&str> = segment.text.split_whitespace().collect();
    if cuts.is_empty() || words.is_empty() {
        segment.speaker = dominant_speaker(segment.start, segment.end, turns);
        return vec![segment];
    }

    let mut bounds = Vec::with_capacity(cuts.len() + 2);
    bounds.push(segment.start);
    bounds.extend(cuts);
    bounds.push(segment.end);

    let duration = segment.duration();
    let mut pieces: Vec<Segment> = Vec::new();
    let mut pending_start: Option<f64> = None;
    let mut taken = 0usize;

    for window in bounds.windows(2) {
        let (start, end) = (window[0], window[1]);
        let upto = (((end - segment.start) / duration) * words.len() as f64).round() as usize;
        let upto = upto.clamp(taken, words.len());
        let piece_words = &words[taken..upto];
        taken = upto;

        if piece_words.is_empty() {
            // No words land here; stretch the neighbouring piece over the gap
            match pieces.last_mut() {
                Some(last) => last.end = end,
                None => pending_start = pending_start.or(Some(start)),
            }
            continue;
        }

        let speaker = dominant_speaker(start, end, turns);
        let text = piece_words.join(" ");
        match pieces.last_mut() {
            Some(last) if last.speaker == speaker => {
                last.end = end;
                last.text.push(' ');
                last.text.push_str(&text);
            }
            _ => pieces.push(Segment {
                start: pending_start.take().unwrap_or(start),
                end,
                text,
                speaker,
            }),
        }
    }

    pieces
}
