//! Event, EventType, EventPayload — everything that travels over the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{Mood, StateValue};

pub const PRIORITY_MIN: u8 = 0;
pub const PRIORITY_MAX: u8 = 10;
pub const PRIORITY_DEFAULT: u8 = 5;

/// Semantic category of an event. Closed set; `Custom` carries a name in its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StateChange,
    EmotionalPulse,
    RuntimePulse,
    MoodChange,
    EnergyChange,
    InputReceived,
    OutputGenerated,
    VoiceStateChange,
    MemoryUpdate,
    Error,
    Custom,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventType::StateChange => "state_change",
            EventType::EmotionalPulse => "emotional_pulse",
            EventType::RuntimePulse => "runtime_pulse",
            EventType::MoodChange => "mood_change",
            EventType::EnergyChange => "energy_change",
            EventType::InputReceived => "input_received",
            EventType::OutputGenerated => "output_generated",
            EventType::VoiceStateChange => "voice_state_change",
            EventType::MemoryUpdate => "memory_update",
            EventType::Error => "error",
            EventType::Custom => "custom",
        };
        f.write_str(name)
    }
}

// ── Payloads ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChangeData {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<StateValue>,
    pub new_value: StateValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalPulseData {
    pub pulse_count: u64,
    pub mood: Option<Mood>,
    pub energy: Option<i64>,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PulsePhase {
    /// Emitted at the end of every pulse.
    Tick,
    /// Emitted once by `stop()` with the total pulse count.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimePulseData {
    pub pulse_count: u64,
    pub phase: PulsePhase,
    pub mood: Option<Mood>,
    pub energy: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodChangeData {
    pub old: Option<Mood>,
    pub new: Mood,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyChangeData {
    pub old: Option<i64>,
    pub new: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceStateData {
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUpdateData {
    pub key: String,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    /// Component whose handler or callback failed.
    pub component: String,
    pub message: String,
    /// Id of the event whose delivery failed, if the failure happened inside `publish`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_event: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomData {
    pub name: String,
    pub data: serde_json::Value,
}

/// Payload of an event. The variant determines the event's [`EventType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    StateChange(StateChangeData),
    EmotionalPulse(EmotionalPulseData),
    RuntimePulse(RuntimePulseData),
    MoodChange(MoodChangeData),
    EnergyChange(EnergyChangeData),
    InputReceived(TextData),
    OutputGenerated(TextData),
    VoiceStateChange(VoiceStateData),
    MemoryUpdate(MemoryUpdateData),
    Error(ErrorData),
    Custom(CustomData),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::StateChange(_) => EventType::StateChange,
            EventPayload::EmotionalPulse(_) => EventType::EmotionalPulse,
            EventPayload::RuntimePulse(_) => EventType::RuntimePulse,
            EventPayload::MoodChange(_) => EventType::MoodChange,
            EventPayload::EnergyChange(_) => EventType::EnergyChange,
            EventPayload::InputReceived(_) => EventType::InputReceived,
            EventPayload::OutputGenerated(_) => EventType::OutputGenerated,
            EventPayload::VoiceStateChange(_) => EventType::VoiceStateChange,
            EventPayload::MemoryUpdate(_) => EventType::MemoryUpdate,
            EventPayload::Error(_) => EventType::Error,
            EventPayload::Custom(_) => EventType::Custom,
        }
    }
}

// ── Event ──

/// An immutable event. Fields are only readable; the `with_*` methods return a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    timestamp: DateTime<Utc>,
    source: String,
    priority: u8,
    #[serde(flatten)]
    payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            priority: PRIORITY_DEFAULT,
            payload,
        }
    }

    /// Shorthand for an error event.
    pub fn error(
        source: impl Into<String>,
        component: impl Into<String>,
        message: impl Into<String>,
        failed_event: Option<Uuid>,
    ) -> Self {
        Event::new(
            source,
            EventPayload::Error(ErrorData {
                component: component.into(),
                message: message.into(),
                failed_event,
            }),
        )
        .with_priority(8)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Copy with a different priority (clamped to 0–10).
    pub fn with_priority(&self, priority: u8) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority: priority.clamp(PRIORITY_MIN, PRIORITY_MAX),
            ..self.clone()
        }
    }

    pub fn with_source(&self, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            ..self.clone()
        }
    }

    pub fn with_payload(&self, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload,
            ..self.clone()
        }
    }

    /// Serialize to `{"id", "timestamp", "source", "priority", "type", "data"}`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
