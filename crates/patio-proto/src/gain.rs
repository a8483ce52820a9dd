//! Output-gain curve shared by the volume slider and the dB readout.
//!
//! The slider is split at its midpoint: the lower half spans
//! `MIN_GAIN_DB..0 dB` linearly, the upper half spans `0..max_gain dB`.
//! Only the percentage goes over the wire; the dB value is display-only.

/// Gain at 0% on the slider.
pub const MIN_GAIN_DB: f64 = -40.0;

/// Used when the server has not reported `maxGain` yet.
pub const DEFAULT_MAX_GAIN_DB: f64 = 10.0;

/// Slider percentage (0..=100) → gain in dB.
pub fn slider_to_db(percent: f64, max_gain: f64) -> f64 {
    let p = percent.clamp(0.0, 100.0);
    let max_gain = max_gain.max(0.0);
    if p <= 50.0 {
        MIN_GAIN_DB + (p / 50.0) * -MIN_GAIN_DB
    } else {
        ((p - 50.0) / 50.0) * max_gain
    }
}

/// Gain in dB → slider percentage (0..=100).
pub fn db_to_slider(db: f64, max_gain: f64) -> f64 {
    let max_gain = max_gain.max(0.0);
    if db <= 0.0 {
        let db = db.max(MIN_GAIN_DB);
        (db - MIN_GAIN_DB) / -MIN_GAIN_DB * 50.0
    } else if max_gain == 0.0 {
        50.0
    } else {
        50.0 + (db.min(max_gain) / max_gain) * 50.0
    }
}

/// Format a gain for display, e.g. `+3.5 dB`.
pub fn format_db(db: f64) -> String {
    if db > 0.0 {
        format!("+{:.1} dB", db)
    } else {
        format!("{:.1} dB", db)
    }
}
