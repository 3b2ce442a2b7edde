//! Core types — Mood, StateValue, well-known state keys.

use serde::{Deserialize, Serialize};

// ── Well-known continuum keys ──

pub const KEY_MOOD: &str = "mood";
pub const KEY_ENERGY: &str = "energy";
pub const KEY_FOCUS: &str = "focus";
pub const KEY_CONTEXT_MODE: &str = "context_mode";
pub const KEY_LAST_INPUT: &str = "last_input";

pub const ENERGY_MIN: i64 = 0;
pub const ENERGY_MAX: i64 = 100;

/// Clamp any energy reading into the valid range.
pub fn clamp_energy(value: i64) -> i64 {
    value.clamp(ENERGY_MIN, ENERGY_MAX)
}

// ── Mood ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Neutral,
    Calm,
    Happy,
    Sad,
    Irritated,
    Anxious,
    LowEnergy,
    Warm,
    Focused,
    Supportive,
}

/// Every mood in the closed vocabulary, in declaration order.
pub const MOODS: &[Mood] = &[
    Mood::Neutral,
    Mood::Calm,
    Mood::Happy,
    Mood::Sad,
    Mood::Irritated,
    Mood::Anxious,
    Mood::LowEnergy,
    Mood::Warm,
    Mood::Focused,
    Mood::Supportive,
];

impl Mood {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Calm => "calm",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Irritated => "irritated",
            Mood::Anxious => "anxious",
            Mood::LowEnergy => "low_energy",
            Mood::Warm => "warm",
            Mood::Focused => "focused",
            Mood::Supportive => "supportive",
        }
    }

    /// Parse a mood name. Case-insensitive, surrounding whitespace ignored.
    pub fn parse(name: &str) -> Option<Mood> {
        let wanted = name.trim().to_ascii_lowercase();
        MOODS.iter().copied().find(|m| m.as_str() == wanted)
    }

    /// Negative or depleted moods that the pulse loop stabilizes back to calm.
    pub fn needs_stabilization(&self) -> bool {
        matches!(self, Mood::Sad | Mood::Irritated | Mood::LowEnergy)
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── State values ──

/// A value held in the state store. The store is heterogeneous, so values are a closed
/// tagged union rather than an untyped blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Mood(Mood),
    Structured(serde_json::Value),
}

impl StateValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            StateValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_mood(&self) -> Option<Mood> {
        match self {
            StateValue::Mood(m) => Some(*m),
            _ => None,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            StateValue::Text(_) => "text",
            StateValue::Integer(_) => "integer",
            StateValue::Float(_) => "float",
            StateValue::Bool(_) => "bool",
            StateValue::Mood(_) => "mood",
            StateValue::Structured(_) => "structured",
        }
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateValue::Text(s) => write!(f, "{}", s),
            StateValue::Integer(n) => write!(f, "{}", n),
            StateValue::Float(x) => write!(f, "{}", x),
            StateValue::Bool(b) => write!(f, "{}", b),
            StateValue::Mood(m) => write!(f, "{}", m),
            StateValue::Structured(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::Text(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::Text(s)
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        StateValue::Integer(n)
    }
}

impl From<i32> for StateValue {
    fn from(n: i32) -> Self {
        StateValue::Integer(n as i64)
    }
}

impl From<f64> for StateValue {
    fn from(x: f64) -> Self {
        StateValue::Float(x)
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<Mood> for StateValue {
    fn from(m: Mood) -> Self {
        StateValue::Mood(m)
    }
}

impl From<serde_json::Value> for StateValue {
    fn from(v: serde_json::Value) -> Self {
        StateValue::Structured(v)
    }
}
