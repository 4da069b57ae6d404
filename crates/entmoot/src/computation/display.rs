//! Compact notation for computations

use std::fmt;

use super::*;

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Computation::Data { value, .. } => write!(f, "{}", value),
            Computation::Reference { name, .. } => write!(f, "{}", name),
            Computation::Lambda { parameter, body } => match parameter {
                Some(p) => write!(f, "({} -> {})", p.name, body),
                None => write!(f, "( -> {})", body),
            },
            Computation::Call { function, argument } => match argument {
                Some(arg) => write!(f, "{}({})", function, arg),
                None => write!(f, "{}()", function),
            },
            Computation::Tuple(elements) => {
                write!(f, "<")?;
                for (i, (name, element)) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match name {
                        Some(name) => write!(f, "{}={}", name, element)?,
                        None => write!(f, "{}", element)?,
                    }
                }
                write!(f, ">")
            }
            Computation::Selection { source, selection } => {
                write!(f, "{}{}", source, selection)
            }
            Computation::Intrinsic(intrinsic) => write!(f, "{}", intrinsic),
        }
    }
}
