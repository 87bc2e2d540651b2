//! Conversion and Variable Binding
//!
//! After the pipeline accepts a value string it is written into the options
//! map and, when the flag was bound, converted into the caller's variable.
//! [`Binding<T>`] is the shared handle the caller keeps; the parser holds a
//! type-erased clone and assigns through it.
//!
//! Chained flags bind to `Vec<T>`; the stored value uses `|` as the element
//! separator, so conversion splits on `|` regardless of the delimiter the
//! user typed.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::ParseError;

/// Conversion from the parser's stored string into a typed value.
pub trait FromArgValue: Sized {
    /// Name shown in conversion diagnostics.
    const TYPE_NAME: &'static str;

    fn from_arg_value(raw: &str) -> Result<Self, ParseError>;

    /// Assign a single element of an indexed slice (`flag.N`). Scalar types
    /// reject this; `Vec<T>` extends itself as needed.
    fn assign_index(&mut self, index: usize, raw: &str) -> Result<(), ParseError> {
        let _ = index;
        Err(ParseError::ConversionFailed {
            value: raw.to_string(),
            target: Self::TYPE_NAME,
        })
    }
}

fn conversion_error(raw: &str, target: &'static str) -> ParseError {
    ParseError::ConversionFailed {
        value: raw.to_string(),
        target,
    }
}

impl FromArgValue for String {
    const TYPE_NAME: &'static str = "string";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        Ok(raw.to_string())
    }
}

impl FromArgValue for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        match raw.trim() {
            "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
            "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
            _ => Err(conversion_error(raw, Self::TYPE_NAME)),
        }
    }
}

macro_rules! impl_from_arg_value_numeric {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromArgValue for $ty {
                const TYPE_NAME: &'static str = $name;

                fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
                    raw.trim()
                        .parse::<$ty>()
                        .map_err(|_| conversion_error(raw, Self::TYPE_NAME))
                }
            }
        )*
    };
}

impl_from_arg_value_numeric! {
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", i128 => "i128",
    isize => "isize",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64", u128 => "u128",
    usize => "usize",
    f32 => "f32", f64 => "f64",
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];
const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

impl FromArgValue for NaiveDate {
    const TYPE_NAME: &'static str = "date";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| conversion_error(raw, Self::TYPE_NAME))
    }
}

impl FromArgValue for NaiveTime {
    const TYPE_NAME: &'static str = "time";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        TIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| conversion_error(raw, Self::TYPE_NAME))
    }
}

impl FromArgValue for NaiveDateTime {
    const TYPE_NAME: &'static str = "datetime";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.naive_local());
        }
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .ok_or_else(|| conversion_error(raw, Self::TYPE_NAME))
    }
}

impl FromArgValue for DateTime<FixedOffset> {
    const TYPE_NAME: &'static str = "datetime";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|_| conversion_error(raw, Self::TYPE_NAME))
    }
}

impl<T: FromArgValue + Default> FromArgValue for Vec<T> {
    const TYPE_NAME: &'static str = "list";

    fn from_arg_value(raw: &str) -> Result<Self, ParseError> {
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        raw.split('|').map(T::from_arg_value).collect()
    }

    fn assign_index(&mut self, index: usize, raw: &str) -> Result<(), ParseError> {
        while self.len() <= index {
            self.push(T::default());
        }
        self[index] = T::from_arg_value(raw)?;
        Ok(())
    }
}

/// Shared handle to an externally-owned variable the parser writes through.
pub struct Binding<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Binding<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(initial)),
        }
    }

    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }
}

impl<T: Clone> Binding<T> {
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for Binding<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Default> Default for Binding<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Binding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Binding({:?})", self.inner.borrow())
    }
}

/// Type-erased assignment interface the parser stores per flag key.
pub(crate) trait AnyBinding {
    fn assign(&self, raw: &str) -> Result<(), ParseError>;
    fn assign_index(&self, index: usize, raw: &str) -> Result<(), ParseError>;
}

impl<T: FromArgValue + 'static> AnyBinding for Binding<T> {
    fn assign(&self, raw: &str) -> Result<(), ParseError> {
        *self.inner.borrow_mut() = T::from_arg_value(raw)?;
        Ok(())
    }

    fn assign_index(&self, index: usize, raw: &str) -> Result<(), ParseError> {
        self.inner.borrow_mut().assign_index(index, raw)
    }
}
