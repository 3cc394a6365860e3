use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

pub mod config;
pub mod error;
pub mod scoring;

pub use config::{EvaluationConfig, MatchStrategy, ToleranceConfig, VelocityConfig};
pub use error::{EvalError, Side};
pub use scoring::analyzer::{evaluate, evaluate_tracks};
pub use scoring::types::{EvaluationReport, Match, MatchResult, Metrics, Note, NoteTrack, OneOrMany};

use scoring::arrays::ArrayMatchParams;
use scoring::types::TempoEvent;

fn from_js<T: DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Missing (null/undefined) values fall back to the type's default.
fn from_js_or_default<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_null() || value.is_undefined() {
        Ok(T::default())
    } else {
        from_js(value)
    }
}

/// Compare an estimated note list with a reference note list.
#[wasm_bindgen]
pub fn evaluate_transcription(
    reference_js: JsValue,
    estimated_js: JsValue,
    config_js: JsValue,
) -> Result<JsValue, JsValue> {
    let reference: Vec<Note> = from_js(reference_js)?;
    let estimated: Vec<Note> = from_js(estimated_js)?;
    let config: EvaluationConfig = from_js_or_default(config_js)?;

    let report = scoring::analyzer::evaluate(&reference, &estimated, &config)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Same as `evaluate_transcription`, taking `{notes, tempo_events}` tracks.
#[wasm_bindgen]
pub fn evaluate_transcription_tracks(
    reference_js: JsValue,
    estimated_js: JsValue,
    config_js: JsValue,
) -> Result<JsValue, JsValue> {
    let reference: NoteTrack = from_js(reference_js)?;
    let estimated: NoteTrack = from_js(estimated_js)?;
    let config: EvaluationConfig = from_js_or_default(config_js)?;

    let report = scoring::analyzer::evaluate_tracks(&reference, &estimated, &config)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&report).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Array-style matching. Returns `[[ref_index, est_index], ...]`.
#[wasm_bindgen]
pub fn match_note_arrays(
    ref_intervals_js: JsValue,
    ref_pitches: &[f64],
    est_intervals_js: JsValue,
    est_pitches: &[f64],
    params_js: JsValue,
) -> Result<JsValue, JsValue> {
    let ref_intervals: Vec<[f64; 2]> = from_js(ref_intervals_js)?;
    let est_intervals: Vec<[f64; 2]> = from_js(est_intervals_js)?;
    let params: ArrayMatchParams = from_js_or_default(params_js)?;

    let matching = scoring::arrays::match_notes(
        &ref_intervals,
        ref_pitches,
        &est_intervals,
        est_pitches,
        &params,
    )
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_wasm_bindgen::to_value(&matching).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Array-style note metrics as Float64Array [precision, recall, f_measure, avg_overlap_ratio].
#[wasm_bindgen]
pub fn note_prf_overlap(
    ref_intervals_js: JsValue,
    ref_pitches: &[f64],
    est_intervals_js: JsValue,
    est_pitches: &[f64],
    params_js: JsValue,
    beta: Option<f64>,
) -> Result<js_sys::Float64Array, JsValue> {
    let ref_intervals: Vec<[f64; 2]> = from_js(ref_intervals_js)?;
    let est_intervals: Vec<[f64; 2]> = from_js(est_intervals_js)?;
    let params: ArrayMatchParams = from_js_or_default(params_js)?;

    let scores = scoring::arrays::precision_recall_f1_overlap(
        &ref_intervals,
        ref_pitches,
        &est_intervals,
        est_pitches,
        &params,
        beta.unwrap_or(1.0),
    )
    .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let arr = js_sys::Float64Array::new_with_length(4);
    arr.set_index(0, scores.precision);
    arr.set_index(1, scores.recall);
    arr.set_index(2, scores.f_measure);
    arr.set_index(3, scores.avg_overlap_ratio);
    Ok(arr)
}

/// Starting tempo of a tempo map, clamped to [20, 300] BPM, 120 when absent.
#[wasm_bindgen]
pub fn extract_tempo(tempo_events_js: JsValue) -> Result<f64, JsValue> {
    let events: Vec<TempoEvent> = from_js_or_default(tempo_events_js)?;
    Ok(scoring::intervals::extract_tempo(&events))
}
