use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Years of slack within which a corrected prediction still counts as right.
pub const CORRECT_TOLERANCE_YEARS: u32 = 2;

/// Raw `/predict` response body.
///
/// Every field defaults so that an error payload carrying only `detail`
/// still deserializes; a present `detail` means the call failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predicted_age: f64,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A prediction as the flow consumes it, confidence normalized to percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub predicted_age: u32,
    /// Confidence percentage, 0-100.
    pub confidence: f32,
}

impl Prediction {
    /// Backends disagree on the confidence scale (0-1 ratio vs 0-100
    /// percent); values at or below 1.0 are treated as ratios.
    pub fn from_wire(raw: &PredictResponse) -> Self {
        let confidence = if raw.confidence <= 1.0 {
            raw.confidence * 100.0
        } else {
            raw.confidence
        };
        Self {
            predicted_age: raw.predicted_age.round().max(0.0) as u32,
            confidence: (confidence as f32).clamp(0.0, 100.0),
        }
    }
}

/// One `/feedback` record; sent best-effort, never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub predicted_age: u32,
    pub actual_age: u32,
    pub is_correct: bool,
    pub confidence: f32,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// The user confirmed the prediction as-is.
    pub fn accepted(predicted_age: u32, confidence: f32) -> Self {
        Self {
            predicted_age,
            actual_age: predicted_age,
            is_correct: true,
            confidence,
            timestamp: Utc::now(),
        }
    }

    /// The user supplied their true age; correctness is derived from the
    /// distance between prediction and truth.
    pub fn corrected(predicted_age: u32, actual_age: u32, confidence: f32) -> Self {
        Self {
            predicted_age,
            actual_age,
            is_correct: predicted_age.abs_diff(actual_age) <= CORRECT_TOLERANCE_YEARS,
            confidence,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(predicted_age: f64, confidence: f64) -> PredictResponse {
        PredictResponse {
            predicted_age,
            confidence,
            age_group: None,
            detail: None,
        }
    }

    #[test]
    fn keeps_percent_confidence_as_is() {
        let p = Prediction::from_wire(&wire(34.0, 82.0));
        assert_eq!(p.predicted_age, 34);
        assert_eq!(p.confidence, 82.0);
    }

    #[test]
    fn scales_ratio_confidence_to_percent() {
        let p = Prediction::from_wire(&wire(34.0, 0.82));
        assert!((p.confidence - 82.0).abs() < 0.001);
    }

    #[test]
    fn clamps_out_of_range_confidence() {
        assert_eq!(Prediction::from_wire(&wire(34.0, 140.0)).confidence, 100.0);
        assert_eq!(Prediction::from_wire(&wire(34.0, -3.0)).confidence, 0.0);
    }

    #[test]
    fn error_payload_deserializes_with_detail_only() {
        let raw: PredictResponse =
            serde_json::from_str(r#"{"detail":"no face detected"}"#).expect("parse");
        assert_eq!(raw.detail.as_deref(), Some("no face detected"));
        assert_eq!(raw.predicted_age, 0.0);
    }

    #[test]
    fn corrected_record_applies_tolerance() {
        assert!(FeedbackRecord::corrected(34, 34, 82.0).is_correct);
        assert!(FeedbackRecord::corrected(34, 32, 82.0).is_correct);
        assert!(FeedbackRecord::corrected(34, 36, 82.0).is_correct);
        assert!(!FeedbackRecord::corrected(34, 31, 82.0).is_correct);
        assert!(!FeedbackRecord::corrected(34, 40, 82.0).is_correct);
    }

    #[test]
    fn feedback_record_serializes_snake_case_fields() {
        let json = serde_json::to_value(FeedbackRecord::accepted(34, 82.0)).expect("serialize");
        assert_eq!(json["predicted_age"], 34);
        assert_eq!(json["actual_age"], 34);
        assert_eq!(json["is_correct"], true);
        assert!(json["timestamp"].is_string());
    }
}
