//! Concrete payloads produced by materialization

mod display;
mod impls;

use serde::{Deserialize, Serialize};

/// A materialized value.
///
/// Payloads are what `compute()` returns and what `CreateValue` accepts for
/// non-computation data. They are plain data: functions never appear here.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    // ═══════════════════════════════════════════════════════════════════
    // Scalars
    // ═══════════════════════════════════════════════════════════════════
    /// Boolean scalar
    Bool(bool),

    /// 32-bit signed integer scalar
    Int32(i32),

    /// 64-bit signed integer scalar
    Int64(i64),

    /// 32-bit floating point scalar
    Float32(#[serde(with = "wire_float")] f32),

    /// 64-bit floating point scalar
    Float64(#[serde(with = "wire_float")] f64),

    /// String scalar
    String(String),

    // ═══════════════════════════════════════════════════════════════════
    // Composites
    // ═══════════════════════════════════════════════════════════════════
    /// Ordered elements, each optionally named
    Tuple(Vec<(Option<String>, Payload)>),
}

/// JSON has no literal for infinities or NaN, so those travel as the
/// strings `"inf"`, `"-inf"` and `"nan"`; finite values stay numbers.
mod wire_float {
    use serde::de::{self, Deserializer, Unexpected};
    use serde::{Deserialize, Serializer};

    pub trait WireFloat: Copy {
        fn widen(self) -> f64;
        fn narrow(value: f64) -> Self;
        fn serialize_finite<S: Serializer>(self, serializer: S) -> Result<S::Ok, S::Error>;
    }

    impl WireFloat for f32 {
        fn widen(self) -> f64 {
            f64::from(self)
        }

        fn narrow(value: f64) -> Self {
            value as f32
        }

        fn serialize_finite<S: Serializer>(self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_f32(self)
        }
    }

    impl WireFloat for f64 {
        fn widen(self) -> f64 {
            self
        }

        fn narrow(value: f64) -> Self {
            value
        }

        fn serialize_finite<S: Serializer>(self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_f64(self)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Tag(String),
    }

    pub fn serialize<S, F>(value: &F, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        F: WireFloat,
    {
        let wide = value.widen();
        if wide.is_nan() {
            serializer.serialize_str("nan")
        } else if wide == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if wide == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            value.serialize_finite(serializer)
        }
    }

    pub fn deserialize<'de, D, F>(deserializer: D) -> Result<F, D::Error>
    where
        D: Deserializer<'de>,
        F: WireFloat,
    {
        let wide = match Repr::deserialize(deserializer)? {
            Repr::Number(n) => n,
            Repr::Tag(tag) => match tag.as_str() {
                "nan" => f64::NAN,
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                other => {
                    return Err(de::Error::invalid_value(
                        Unexpected::Str(other),
                        &"a number, \"inf\", \"-inf\" or \"nan\"",
                    ))
                }
            },
        };
        Ok(F::narrow(wide))
    }
}
