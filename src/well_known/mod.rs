//! The `google.protobuf` well-known types.
//!
//! This module provides the static descriptors for the well-known message
//! types, plus bridge types mapping `Timestamp` and `Duration` to and from
//! their natural runtime representations and their canonical textual forms.
//! The JSON codec special-cases all of these by full name.

mod datetime;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time;

use crate::descriptor::{EnumDescriptor, FieldDescriptor, MessageDescriptor, ProtoType};
use crate::message::DynamicMessage;
use crate::value::{MapKey, Value};

const NANOS_PER_SECOND: i32 = 1_000_000_000;
const NANOS_MAX: i32 = NANOS_PER_SECOND - 1;

const PACKAGE: &str = "google.protobuf";

/// A point in time, as seconds and nanoseconds since the Unix epoch.
///
/// The JSON form is an RFC 3339 string with a `Z` suffix, available through
/// the `Display` and `FromStr` impls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp {
    pub seconds: i64,
    /// Non-negative fractions of a second at nanosecond resolution, counting
    /// forward in time even for timestamps before the epoch.
    pub nanos: i32,
}

impl Timestamp {
    /// Brings the timestamp to its canonical form: `nanos` in
    /// `[0, 999,999,999]`, counting forward from `seconds`.
    ///
    /// A timestamp whose canonical form would fall outside the `i64`
    /// seconds range saturates at the nearest representable instant.
    pub fn normalize(&mut self) {
        // Split the nanos into whole seconds of carry plus a non-negative
        // remainder; euclidean division gives the remainder the sign the
        // canonical form wants.
        let carry = i64::from(self.nanos.div_euclid(NANOS_PER_SECOND));
        let nanos = self.nanos.rem_euclid(NANOS_PER_SECOND);
        match self.seconds.checked_add(carry) {
            Some(seconds) => {
                self.seconds = seconds;
                self.nanos = nanos;
            }
            None if carry < 0 => {
                self.seconds = i64::MIN;
                self.nanos = 0;
            }
            None => {
                self.seconds = i64::MAX;
                self.nanos = NANOS_MAX;
            }
        }
    }

    /// Creates a timestamp at the start of the provided UTC date.
    pub fn date(year: i64, month: u8, day: u8) -> Result<Timestamp, TimestampError> {
        Timestamp::date_time(year, month, day, 0, 0, 0)
    }

    /// Creates a timestamp at the provided UTC date and time.
    pub fn date_time(
        year: i64,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Timestamp, TimestampError> {
        let date_time = datetime::DateTime {
            year,
            month,
            day,
            hour,
            minute,
            second,
            nanos: 0,
        };

        if date_time.is_valid() {
            Ok(Timestamp::from(date_time))
        } else {
            Err(TimestampError::InvalidDateTime)
        }
    }

    /// Converts the timestamp into its dynamic message form.
    pub fn to_message(self) -> DynamicMessage {
        let mut message = DynamicMessage::new(timestamp());
        message.set("seconds", Value::Int64(self.seconds));
        message.set("nanos", Value::Int32(self.nanos));
        message
    }

    /// Reads a timestamp out of its dynamic message form. Returns `None`
    /// when the message is not a `google.protobuf.Timestamp`.
    pub fn from_message(message: &DynamicMessage) -> Option<Timestamp> {
        if message.descriptor().full_name() != timestamp().full_name() {
            return None;
        }
        message.descriptor().field_by_name("seconds")?;
        message.descriptor().field_by_name("nanos")?;
        Some(Timestamp {
            seconds: message.get("seconds").and_then(Value::as_i64).unwrap_or(0),
            nanos: message.get("nanos").and_then(Value::as_i32).unwrap_or(0),
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut copy = *self;
        copy.normalize();
        write!(f, "{}", datetime::DateTime::from(copy))
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    fn from_str(s: &str) -> Result<Timestamp, TimestampError> {
        datetime::parse_timestamp(s).ok_or(TimestampError::Parse)
    }
}

impl From<time::SystemTime> for Timestamp {
    fn from(system_time: time::SystemTime) -> Timestamp {
        match system_time.duration_since(time::UNIX_EPOCH) {
            Ok(since) => Timestamp {
                seconds: since.as_secs() as i64,
                nanos: since.subsec_nanos() as i32,
            },
            Err(error) => {
                // Before the epoch: count the distance backwards, then
                // renormalize so nanos counts forward again.
                let before = error.duration();
                let mut timestamp = Timestamp {
                    seconds: -(before.as_secs() as i64),
                    nanos: -(before.subsec_nanos() as i32),
                };
                timestamp.normalize();
                timestamp
            }
        }
    }
}

impl TryFrom<Timestamp> for time::SystemTime {
    type Error = TimestampError;

    fn try_from(timestamp: Timestamp) -> Result<time::SystemTime, TimestampError> {
        let mut normalized = timestamp;
        normalized.normalize();

        let whole = time::Duration::from_secs(normalized.seconds.unsigned_abs());
        let base = if normalized.seconds >= 0 {
            time::UNIX_EPOCH.checked_add(whole)
        } else {
            time::UNIX_EPOCH.checked_sub(whole)
        };

        base.and_then(|at| at.checked_add(time::Duration::from_nanos(normalized.nanos as u64)))
            .ok_or(TimestampError::OutOfSystemRange(timestamp))
    }
}

/// A timestamp handling error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimestampError {
    /// A [`Timestamp`] that does not fit in a `SystemTime` on this platform.
    OutOfSystemRange(Timestamp),
    /// The input was not an RFC 3339 date-time.
    Parse,
    /// The date or time components do not name a real instant.
    InvalidDateTime,
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::OutOfSystemRange(timestamp) => {
                write!(f, "timestamp {} does not fit in a SystemTime", timestamp)
            }
            TimestampError::Parse => write!(f, "expected an RFC 3339 date-time"),
            TimestampError::InvalidDateTime => write!(f, "date or time component out of range"),
        }
    }
}

impl std::error::Error for TimestampError {}

/// A signed span of time, as seconds and nanoseconds.
///
/// The JSON form is a decimal seconds count with an `s` suffix, available
/// through the `Display` and `FromStr` impls. When both are non-zero,
/// `seconds` and `nanos` carry the same sign.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Duration {
    pub seconds: i64,
    pub nanos: i32,
}

impl Duration {
    /// Brings the duration to its canonical form: `nanos` within
    /// `(-1e9, 1e9)` and sharing the sign of `seconds` whenever both are
    /// non-zero.
    ///
    /// A duration whose canonical form would fall outside the `i64` seconds
    /// range saturates at the nearest representable span.
    pub fn normalize(&mut self) {
        // The span as a single nanosecond count; i128 holds the full
        // i64-seconds range with room to spare. Truncating division leaves
        // the remainder with the sign of the whole span, which is exactly
        // the canonical sign rule.
        let total =
            i128::from(self.seconds) * i128::from(NANOS_PER_SECOND) + i128::from(self.nanos);
        let seconds = total / i128::from(NANOS_PER_SECOND);

        if seconds > i128::from(i64::MAX) {
            self.seconds = i64::MAX;
            self.nanos = NANOS_MAX;
        } else if seconds < i128::from(i64::MIN) {
            self.seconds = i64::MIN;
            self.nanos = -NANOS_MAX;
        } else {
            self.seconds = seconds as i64;
            self.nanos = (total % i128::from(NANOS_PER_SECOND)) as i32;
        }
    }

    /// Converts the duration into its dynamic message form.
    pub fn to_message(self) -> DynamicMessage {
        let mut message = DynamicMessage::new(duration());
        message.set("seconds", Value::Int64(self.seconds));
        message.set("nanos", Value::Int32(self.nanos));
        message
    }

    /// Reads a duration out of its dynamic message form. Returns `None`
    /// when the message is not a `google.protobuf.Duration`.
    pub fn from_message(message: &DynamicMessage) -> Option<Duration> {
        if message.descriptor().full_name() != duration().full_name() {
            return None;
        }
        message.descriptor().field_by_name("seconds")?;
        message.descriptor().field_by_name("nanos")?;
        Some(Duration {
            seconds: message.get("seconds").and_then(Value::as_i64).unwrap_or(0),
            nanos: message.get("nanos").and_then(Value::as_i32).unwrap_or(0),
        })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut copy = *self;
        copy.normalize();
        if copy.seconds < 0 || copy.nanos < 0 {
            write!(f, "-")?;
        }
        write!(f, "{}", copy.seconds.unsigned_abs())?;

        // Subseconds use the smallest of 0, 3, 6, or 9 digits that is
        // lossless.
        let nanos = copy.nanos.unsigned_abs();
        if nanos == 0 {
            write!(f, "s")
        } else if nanos % 1_000_000 == 0 {
            write!(f, ".{:03}s", nanos / 1_000_000)
        } else if nanos % 1_000 == 0 {
            write!(f, ".{:06}s", nanos / 1_000)
        } else {
            write!(f, ".{:09}s", nanos)
        }
    }
}

impl FromStr for Duration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Duration, DurationError> {
        datetime::parse_duration(s).ok_or(DurationError::Parse)
    }
}

impl TryFrom<time::Duration> for Duration {
    type Error = DurationError;

    /// Converts a `std::time::Duration`. The std type counts seconds in a
    /// `u64`, so spans past `i64::MAX` seconds do not fit.
    fn try_from(span: time::Duration) -> Result<Duration, DurationError> {
        let Ok(seconds) = i64::try_from(span.as_secs()) else {
            return Err(DurationError::OutOfRange);
        };
        // Non-negative seconds with sub-second nanos is already canonical.
        Ok(Duration {
            seconds,
            nanos: span.subsec_nanos() as i32,
        })
    }
}

impl TryFrom<Duration> for time::Duration {
    type Error = DurationError;

    /// Converts to a `std::time::Duration`, which cannot represent negative
    /// spans. The error carries the magnitude of the rejected span.
    fn try_from(duration: Duration) -> Result<time::Duration, DurationError> {
        let mut duration = duration;
        duration.normalize();
        if duration.seconds < 0 || duration.nanos < 0 {
            return Err(DurationError::Negative(time::Duration::new(
                duration.seconds.unsigned_abs(),
                duration.nanos.unsigned_abs(),
            )));
        }
        Ok(time::Duration::new(
            duration.seconds as u64,
            duration.nanos as u32,
        ))
    }
}

/// A duration handling error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DurationError {
    /// The input was not a decimal seconds count with an `s` suffix.
    Parse,
    /// A negative span, which `std::time::Duration` cannot hold. The
    /// payload carries its magnitude.
    Negative(time::Duration),
    /// A span outside the representable seconds range.
    OutOfRange,
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationError::Parse => {
                write!(f, "expected a decimal seconds count with an `s` suffix")
            }
            DurationError::Negative(magnitude) => {
                write!(
                    f,
                    "negative duration ({:?} long) does not fit in a std::time::Duration",
                    magnitude,
                )
            }
            DurationError::OutOfRange => write!(f, "duration seconds overflow an i64"),
        }
    }
}

impl std::error::Error for DurationError {}

// === Descriptors ===

fn well_known(full_name: &'static str, fields: Vec<FieldDescriptor>) -> MessageDescriptor {
    MessageDescriptor::new(full_name, fields).expect("well-known type descriptor")
}

macro_rules! well_known_descriptor {
    ($(#[$meta:meta])* $name:ident, $full_name:literal, [$($field:expr),* $(,)?]) => {
        $(#[$meta])*
        pub fn $name() -> &'static MessageDescriptor {
            static DESCRIPTOR: OnceLock<MessageDescriptor> = OnceLock::new();
            DESCRIPTOR.get_or_init(|| well_known($full_name, vec![$($field),*]))
        }
    };
}

well_known_descriptor!(
    /// `google.protobuf.Timestamp`.
    timestamp,
    "google.protobuf.Timestamp",
    [
        FieldDescriptor::scalar(1, "seconds", ProtoType::Int64),
        FieldDescriptor::scalar(2, "nanos", ProtoType::Int32),
    ]
);

well_known_descriptor!(
    /// `google.protobuf.Duration`.
    duration,
    "google.protobuf.Duration",
    [
        FieldDescriptor::scalar(1, "seconds", ProtoType::Int64),
        FieldDescriptor::scalar(2, "nanos", ProtoType::Int32),
    ]
);

well_known_descriptor!(
    /// `google.protobuf.Empty`.
    empty,
    "google.protobuf.Empty",
    []
);

well_known_descriptor!(
    /// `google.protobuf.FieldMask`.
    field_mask,
    "google.protobuf.FieldMask",
    [FieldDescriptor::scalar(1, "paths", ProtoType::String).repeated()]
);

well_known_descriptor!(
    /// `google.protobuf.Struct`.
    r#struct,
    "google.protobuf.Struct",
    [FieldDescriptor::map(1, "fields", ProtoType::String, ProtoType::Message)
        .message_type(value)]
);

well_known_descriptor!(
    /// `google.protobuf.Value`.
    value,
    "google.protobuf.Value",
    [
        FieldDescriptor::enumeration(1, "null_value", null_value).in_oneof("kind"),
        FieldDescriptor::scalar(2, "number_value", ProtoType::Double).in_oneof("kind"),
        FieldDescriptor::scalar(3, "string_value", ProtoType::String).in_oneof("kind"),
        FieldDescriptor::scalar(4, "bool_value", ProtoType::Bool).in_oneof("kind"),
        FieldDescriptor::message(5, "struct_value", r#struct).in_oneof("kind"),
        FieldDescriptor::message(6, "list_value", list_value).in_oneof("kind"),
    ]
);

well_known_descriptor!(
    /// `google.protobuf.ListValue`.
    list_value,
    "google.protobuf.ListValue",
    [FieldDescriptor::message(1, "values", value).repeated()]
);

well_known_descriptor!(
    /// `google.protobuf.DoubleValue`.
    double_value,
    "google.protobuf.DoubleValue",
    [FieldDescriptor::scalar(1, "value", ProtoType::Double)]
);

well_known_descriptor!(
    /// `google.protobuf.FloatValue`.
    float_value,
    "google.protobuf.FloatValue",
    [FieldDescriptor::scalar(1, "value", ProtoType::Float)]
);

well_known_descriptor!(
    /// `google.protobuf.Int64Value`.
    int64_value,
    "google.protobuf.Int64Value",
    [FieldDescriptor::scalar(1, "value", ProtoType::Int64)]
);

well_known_descriptor!(
    /// `google.protobuf.UInt64Value`.
    uint64_value,
    "google.protobuf.UInt64Value",
    [FieldDescriptor::scalar(1, "value", ProtoType::Uint64)]
);

well_known_descriptor!(
    /// `google.protobuf.Int32Value`.
    int32_value,
    "google.protobuf.Int32Value",
    [FieldDescriptor::scalar(1, "value", ProtoType::Int32)]
);

well_known_descriptor!(
    /// `google.protobuf.UInt32Value`.
    uint32_value,
    "google.protobuf.UInt32Value",
    [FieldDescriptor::scalar(1, "value", ProtoType::Uint32)]
);

well_known_descriptor!(
    /// `google.protobuf.BoolValue`.
    bool_value,
    "google.protobuf.BoolValue",
    [FieldDescriptor::scalar(1, "value", ProtoType::Bool)]
);

well_known_descriptor!(
    /// `google.protobuf.StringValue`.
    string_value,
    "google.protobuf.StringValue",
    [FieldDescriptor::scalar(1, "value", ProtoType::String)]
);

well_known_descriptor!(
    /// `google.protobuf.BytesValue`.
    bytes_value,
    "google.protobuf.BytesValue",
    [FieldDescriptor::scalar(1, "value", ProtoType::Bytes)]
);

/// `google.protobuf.NullValue`.
pub fn null_value() -> &'static EnumDescriptor {
    static DESCRIPTOR: EnumDescriptor = EnumDescriptor {
        full_name: "google.protobuf.NullValue",
        values: &[("NULL_VALUE", 0)],
    };
    &DESCRIPTOR
}

/// Whether the full name names one of the nine wrapper types.
pub(crate) fn is_wrapper(full_name: &str) -> bool {
    matches!(
        full_name,
        "google.protobuf.DoubleValue"
            | "google.protobuf.FloatValue"
            | "google.protobuf.Int64Value"
            | "google.protobuf.UInt64Value"
            | "google.protobuf.Int32Value"
            | "google.protobuf.UInt32Value"
            | "google.protobuf.BoolValue"
            | "google.protobuf.StringValue"
            | "google.protobuf.BytesValue"
    )
}

// === Struct / Value / ListValue bridge ===

/// Builds a `google.protobuf.Value` message from any JSON value.
pub fn json_to_value(json: &serde_json::Value) -> DynamicMessage {
    let mut message = DynamicMessage::new(value());
    match json {
        serde_json::Value::Null => message.set("null_value", Value::Enum(0)),
        serde_json::Value::Bool(item) => message.set("bool_value", Value::Bool(*item)),
        serde_json::Value::Number(number) => message.set(
            "number_value",
            Value::Double(number.as_f64().unwrap_or_default()),
        ),
        serde_json::Value::String(text) => {
            message.set("string_value", Value::String(text.clone()))
        }
        serde_json::Value::Array(items) => {
            message.set("list_value", Value::Message(json_to_list(items)))
        }
        serde_json::Value::Object(entries) => {
            message.set("struct_value", Value::Message(json_to_struct(entries)))
        }
    }
    message
}

/// Renders a `google.protobuf.Value` message as a JSON value. An unset
/// `kind` renders as `null`.
pub fn value_to_json(message: &DynamicMessage) -> serde_json::Value {
    match message.which_oneof("kind") {
        Some(("number_value", member)) => member
            .as_f64()
            .and_then(serde_json::Number::from_f64)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Some(("string_value", member)) => {
            serde_json::Value::String(member.as_str().unwrap_or_default().to_string())
        }
        Some(("bool_value", member)) => {
            serde_json::Value::Bool(member.as_bool().unwrap_or_default())
        }
        Some(("struct_value", member)) => member
            .as_message()
            .map_or(serde_json::Value::Null, struct_to_json),
        Some(("list_value", member)) => member
            .as_message()
            .map_or(serde_json::Value::Null, list_to_json),
        _ => serde_json::Value::Null,
    }
}

/// Builds a `google.protobuf.Struct` message from a JSON object.
pub fn json_to_struct(entries: &serde_json::Map<String, serde_json::Value>) -> DynamicMessage {
    let mut fields = BTreeMap::new();
    for (key, value) in entries {
        fields.insert(
            MapKey::String(key.clone()),
            Value::Message(json_to_value(value)),
        );
    }
    let mut message = DynamicMessage::new(r#struct());
    message.set("fields", Value::Map(fields));
    message
}

/// Renders a `google.protobuf.Struct` message as a JSON object.
pub fn struct_to_json(message: &DynamicMessage) -> serde_json::Value {
    let mut entries = serde_json::Map::new();
    if message.descriptor().field_by_name("fields").is_none() {
        return serde_json::Value::Object(entries);
    }
    if let Value::Map(fields) = message.get_or_default("fields") {
        for (key, value) in &fields {
            if let Value::Message(value) = value {
                entries.insert(key.to_string(), value_to_json(value));
            }
        }
    }
    serde_json::Value::Object(entries)
}

/// Builds a `google.protobuf.ListValue` message from a JSON array.
pub fn json_to_list(items: &[serde_json::Value]) -> DynamicMessage {
    let values: Vec<Value> = items
        .iter()
        .map(|item| Value::Message(json_to_value(item)))
        .collect();
    let mut message = DynamicMessage::new(list_value());
    message.set("values", Value::Repeated(values));
    message
}

/// Renders a `google.protobuf.ListValue` message as a JSON array.
pub fn list_to_json(message: &DynamicMessage) -> serde_json::Value {
    let mut items = Vec::new();
    if message.descriptor().field_by_name("values").is_none() {
        return serde_json::Value::Array(items);
    }
    if let Value::Repeated(values) = message.get_or_default("values") {
        for value in &values {
            if let Value::Message(value) = value {
                items.push(value_to_json(value));
            }
        }
    }
    serde_json::Value::Array(items)
}
