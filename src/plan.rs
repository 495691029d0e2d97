use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Ack,
    AskFollowup,
    ShareStory,
    Reflect,
    AnswerQuestion,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Ack => "ack",
            Intent::AskFollowup => "ask_followup",
            Intent::ShareStory => "share_story",
            Intent::Reflect => "reflect",
            Intent::AnswerQuestion => "answer_question",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Playful,
    Caring,
    Neutral,
    Enthusiastic,
}

impl Tone {
    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Playful => "playful",
            Tone::Caring => "caring",
            Tone::Neutral => "neutral",
            Tone::Enthusiastic => "enthusiastic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseLength {
    Minimal,
    Short,
    Medium,
}

impl ResponseLength {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseLength::Minimal => "minimal",
            ResponseLength::Short => "short",
            ResponseLength::Medium => "medium",
        }
    }
}

/// Response strategy decision for one backlog evaluation. Ephemeral,
/// recomputed every cycle, never mutates the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub should_respond: bool,
    pub intent: Intent,
    pub tone: Tone,
    pub response_length: ResponseLength,
    pub topic: String,
    pub hint: String,
}

impl Plan {
    /// Fixed fallback used when the planning call fails or returns junk.
    /// The loop must never crash on a single bad decision cycle.
    pub fn safe_default() -> Self {
        Self {
            should_respond: true,
            intent: Intent::Ack,
            tone: Tone::Neutral,
            response_length: ResponseLength::Short,
            topic: "general".to_string(),
            hint: "be brief and friendly".to_string(),
        }
    }

    /// Field-by-field repair of a raw planning payload. Missing fields and
    /// unknown enum values collapse to the documented defaults rather than
    /// erroring out.
    pub fn repair(raw: &Value) -> Self {
        let defaults = Self::safe_default();

        let should_respond = match raw.get("should_respond") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => {
                matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1")
            }
            _ => defaults.should_respond,
        };

        Self {
            should_respond,
            intent: enum_field(raw, "intent").unwrap_or(defaults.intent),
            tone: enum_field(raw, "tone").unwrap_or(defaults.tone),
            response_length: enum_field(raw, "response_length")
                .unwrap_or(defaults.response_length),
            topic: string_field(raw, "topic").unwrap_or(defaults.topic),
            hint: string_field(raw, "hint").unwrap_or(defaults.hint),
        }
    }
}

fn enum_field<T: serde::de::DeserializeOwned>(raw: &Value, key: &str) -> Option<T> {
    raw.get(key)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn string_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Final yes/no on emitting a reply. A plan that declines always holds; a
/// minimal-ack plan is additionally suppressed at random so the agent does
/// not mechanically ack every trivial message. Randomness is injectable for
/// deterministic tests.
pub struct ResponseGate {
    suppress_probability: f64,
    rng: Box<dyn RngCore + Send>,
}

impl ResponseGate {
    pub fn new(suppress_probability: f64) -> Self {
        Self::with_rng(suppress_probability, StdRng::from_entropy())
    }

    pub fn with_rng(suppress_probability: f64, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            suppress_probability,
            rng: Box::new(rng),
        }
    }

    pub fn should_send(&mut self, plan: &Plan) -> bool {
        if !plan.should_respond {
            return false;
        }
        if plan.intent == Intent::Ack && plan.response_length == ResponseLength::Minimal {
            return self.rng.gen::<f64>() >= self.suppress_probability;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;
    use serde_json::json;

    #[test]
    fn repair_accepts_a_valid_plan() {
        let raw = json!({
            "should_respond": false,
            "intent": "answer_question",
            "tone": "caring",
            "response_length": "medium",
            "topic": "weekend",
            "hint": "mention the trip"
        });
        let plan = Plan::repair(&raw);
        assert!(!plan.should_respond);
        assert_eq!(plan.intent, Intent::AnswerQuestion);
        assert_eq!(plan.tone, Tone::Caring);
        assert_eq!(plan.response_length, ResponseLength::Medium);
        assert_eq!(plan.topic, "weekend");
        assert_eq!(plan.hint, "mention the trip");
    }

    #[test]
    fn repair_fixes_missing_and_invalid_fields() {
        let raw = json!({
            "should_respond": "yes",
            "intent": "celebrate",
            "tone": 7
        });
        let plan = Plan::repair(&raw);
        assert!(plan.should_respond);
        assert_eq!(plan.intent, Intent::Ack);
        assert_eq!(plan.tone, Tone::Neutral);
        assert_eq!(plan.response_length, ResponseLength::Short);
        assert_eq!(plan.topic, "general");
    }

    #[test]
    fn repair_of_empty_payload_is_the_safe_default() {
        assert_eq!(Plan::repair(&json!({})), Plan::safe_default());
    }

    #[test]
    fn declined_plan_never_passes_the_gate() {
        let mut gate = ResponseGate::with_rng(0.0, StepRng::new(u64::MAX, 0));
        let plan = Plan {
            should_respond: false,
            ..Plan::safe_default()
        };
        assert!(!gate.should_send(&plan));
    }

    #[test]
    fn non_minimal_plans_always_pass_when_approved() {
        // Suppression probability 1.0 would kill any randomized branch.
        let mut gate = ResponseGate::with_rng(1.0, StepRng::new(0, 0));
        assert!(gate.should_send(&Plan::safe_default()));
    }

    #[test]
    fn minimal_ack_is_suppressed_or_passed_by_the_rng() {
        let minimal_ack = Plan {
            intent: Intent::Ack,
            response_length: ResponseLength::Minimal,
            ..Plan::safe_default()
        };

        // StepRng at zero draws 0.0, below the threshold: suppressed.
        let mut gate = ResponseGate::with_rng(0.5, StepRng::new(0, 0));
        assert!(!gate.should_send(&minimal_ack));

        // StepRng at max draws ~1.0, above the threshold: passes.
        let mut gate = ResponseGate::with_rng(0.5, StepRng::new(u64::MAX, 0));
        assert!(gate.should_send(&minimal_ack));
    }
}
