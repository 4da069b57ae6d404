//! Display and Debug implementations for Payload

use std::fmt;

use super::*;

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Bool(b) => write!(f, "{}", b),
            Payload::Int32(n) => write!(f, "{}", n),
            Payload::Int64(n) => write!(f, "{}i64", n),
            Payload::Float32(n) => write!(f, "{:?}", n),
            Payload::Float64(n) => write!(f, "{:?}f64", n),
            Payload::String(s) => write!(f, "{:?}", s),
            Payload::Tuple(elements) => write_tuple(f, elements, |f, p| write!(f, "{:?}", p)),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display drops dtype suffixes and string quotes
        match self {
            Payload::Bool(b) => write!(f, "{}", b),
            Payload::Int32(n) => write!(f, "{}", n),
            Payload::Int64(n) => write!(f, "{}", n),
            Payload::Float32(n) => write!(f, "{}", n),
            Payload::Float64(n) => write!(f, "{}", n),
            Payload::String(s) => write!(f, "{}", s),
            Payload::Tuple(elements) => write_tuple(f, elements, |f, p| write!(f, "{}", p)),
        }
    }
}

/// Write `<a=1,2>` style tuple notation.
fn write_tuple(
    f: &mut fmt::Formatter<'_>,
    elements: &[(Option<String>, Payload)],
    mut write_element: impl FnMut(&mut fmt::Formatter<'_>, &Payload) -> fmt::Result,
) -> fmt::Result {
    write!(f, "<")?;
    for (i, (name, value)) in elements.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        if let Some(name) = name {
            write!(f, "{}=", name)?;
        }
        write_element(f, value)?;
    }
    write!(f, ">")
}
