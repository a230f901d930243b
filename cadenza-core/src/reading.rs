//! Sensor Readings as Bounded Field Maps
//!
//! ## Overview
//!
//! A [`Reading`] is one capture of the environmental sensor: a mapping from
//! measured channel ([`Field`]) to value, plus the monotonic capture
//! timestamp. Readings are immutable once produced and flow unchanged from
//! the sensor collaborator through the differencer to the transport payload.
//!
//! ## Why a map and not a struct?
//!
//! The field set is closed, but not every capture carries every field: a
//! sensor in low-power mode may skip the gas heater, and derived readings
//! (derivatives, jerks) only carry the fields both inputs had. A bounded
//! `heapless` map keeps that flexibility without heap allocation and keeps
//! the documented missing-field rule (difference against zero) explicit
//! instead of buried in struct defaults.
//!
//! ## Memory Model
//!
//! ```text
//! Reading layout:
//! ├── values: FnvIndexMap<Field, f32, 8>  (fixed capacity, inline)
//! └── timestamp: 8 bytes
//! ```
//!
//! Capacity 8 leaves headroom over the four BME68x channels without a
//! resize path; inserting the closed field set can never overflow.

use heapless::FnvIndexMap;

use crate::time::Timestamp;

/// Maximum number of fields a reading can carry (power of two for the map)
pub const MAX_FIELDS: usize = 8;

/// Measured channels of the environmental sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum Field {
    /// Ambient temperature
    Temperature = 0,
    /// Barometric pressure
    Pressure = 1,
    /// Relative humidity
    Humidity = 2,
    /// Gas resistance (slow-responding channel, usually excluded from norms)
    Gas = 3,
}

impl Field {
    /// All fields, in canonical payload order
    pub const ALL: [Field; 4] = [
        Field::Temperature,
        Field::Pressure,
        Field::Humidity,
        Field::Gas,
    ];

    /// Get human-readable name (also the payload key)
    pub const fn name(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Pressure => "pressure",
            Field::Humidity => "humidity",
            Field::Gas => "gas",
        }
    }

    /// Get expected unit of measurement
    pub const fn unit(&self) -> &'static str {
        match self {
            Field::Temperature => "°C",
            Field::Pressure => "hPa",
            Field::Humidity => "%",
            Field::Gas => "kΩ",
        }
    }
}

/// One immutable sensor capture: field values plus capture timestamp
#[derive(Debug, Clone)]
pub struct Reading {
    values: FnvIndexMap<Field, f32, MAX_FIELDS>,
    timestamp: Timestamp,
}

impl Reading {
    /// Create an empty reading at the given capture time
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            values: FnvIndexMap::new(),
            timestamp,
        }
    }

    /// Builder-style field insert
    ///
    /// The closed field set can never exceed [`MAX_FIELDS`], so the map
    /// insert cannot fail; a repeated field keeps the latest value.
    pub fn with(mut self, field: Field, value: f32) -> Self {
        let _ = self.values.insert(field, value);
        self
    }

    /// Capture timestamp in milliseconds since agent epoch
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Value of one field, if present in this capture
    pub fn get(&self, field: Field) -> Option<f32> {
        self.values.get(&field).copied()
    }

    /// Number of fields carried
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the reading carries no fields
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(field, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (Field, f32)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    /// Per-field difference against an older reading
    ///
    /// For every field in `self`, subtracts the older reading's value;
    /// a field absent from the older reading differences against `0`
    /// (documented carry-over from the original calculator, not a defect
    /// to silently repair). The result keeps this reading's timestamp.
    pub fn difference_from(&self, older: &Reading) -> Reading {
        let mut out = Reading::new(self.timestamp);
        for (field, value) in self.iter() {
            out = out.with(field, value - older.get(field).unwrap_or(0.0));
        }
        out
    }

    /// Euclidean norm over a chosen subset of fields
    ///
    /// Fields absent from this reading contribute nothing. Callers exclude
    /// noisy or slow channels (typically [`Field::Gas`]) before taking the
    /// norm; that filter is a caller decision, not a reading property.
    pub fn magnitude_over(&self, fields: &[Field]) -> f32 {
        let sum_sq: f32 = fields
            .iter()
            .filter_map(|f| self.get(*f))
            .map(|v| v * v)
            .sum();
        libm::sqrtf(sum_sq)
    }

    /// JSON data payload: all fields plus `timestamp` in seconds
    ///
    /// Shape: `{"temperature": .., "pressure": .., "humidity": .., "gas": ..,
    /// "timestamp": <seconds since agent epoch>}`.
    #[cfg(feature = "std")]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut object = serde_json::Map::new();
        for (field, value) in self.iter() {
            object.insert(field.name().into(), serde_json::json!(value));
        }
        object.insert(
            "timestamp".into(),
            serde_json::json!(crate::time::to_payload_secs(self.timestamp)),
        );
        serde_json::Value::Object(object).to_string().into_bytes()
    }

    /// JSON payload of the field values only (auxiliary topics carry no
    /// timestamp)
    #[cfg(feature = "std")]
    pub fn to_values_payload(&self) -> Vec<u8> {
        let mut object = serde_json::Map::new();
        for (field, value) in self.iter() {
            object.insert(field.name().into(), serde_json::json!(value));
        }
        serde_json::Value::Object(object).to_string().into_bytes()
    }
}
