//! Flag Descriptors
//!
//! A [`Flag`] describes one named option: its type, default, validators,
//! filters, dependencies and optional positional slot. Descriptors are built
//! with chained `with_*` methods and handed to the parser for registration.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::pipeline::validators::Validator;

/// How a flag consumes tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlagType {
    /// Unspecified. Normalized to [`FlagType::Single`] at registration.
    #[default]
    Empty,
    /// Takes exactly one value token.
    Single,
    /// Takes a delimited list; repeats accumulate.
    Chained,
    /// Boolean presence flag; optionally consumes a trailing boolean token.
    Standalone,
    /// The value is a path whose file contents become the flag's value.
    File,
}

impl FlagType {
    /// Whether this flag expects a value token after its name.
    pub fn takes_value(&self) -> bool {
        !matches!(self, FlagType::Standalone)
    }
}

/// A pattern the flag's value must match, with a human description used in
/// diagnostics and completion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedValue {
    pub pattern: String,
    pub description: String,
}

impl AcceptedValue {
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}

/// Marks a flag as secure: its value is prompted for on the terminal (echo
/// disabled) after the main parse when not supplied on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SecurePrompt {
    pub prompt: String,
}

/// String transformation applied before or after validation.
pub type FilterFn = Arc<dyn Fn(&str) -> String>;

/// Predicate consulted during validation; returning `(true, message)` makes
/// the flag required with the given message.
pub type RequiredIfFn = Arc<dyn Fn(&crate::parser::Parser) -> (bool, String)>;

/// Descriptor for a single flag.
#[derive(Clone, Default)]
pub struct Flag {
    pub name: String,
    pub short: Option<String>,
    pub flag_type: FlagType,
    pub description: String,
    pub description_key: Option<String>,
    /// Translation key for the flag name itself.
    pub name_key: Option<String>,
    pub default_value: Option<String>,
    pub required: bool,
    pub required_if: Option<RequiredIfFn>,
    pub accepted_values: Vec<AcceptedValue>,
    pub validators: Vec<Validator>,
    pub pre_filter: Option<FilterFn>,
    pub post_filter: Option<FilterFn>,
    /// Depended-on flag name → allowed values (empty ⇒ presence suffices).
    pub depends_on: IndexMap<String, Vec<String>>,
    /// Positional slot index within the owning command context.
    pub position: Option<usize>,
    /// Declared element count for indexed slice access (`name.0`, `name.1`).
    pub capacity: Option<usize>,
    pub secure: Option<SecurePrompt>,
    pub(crate) id: u64,
}

impl Flag {
    pub fn new(name: impl Into<String>) -> Self {
        Flag {
            name: name.into(),
            ..Flag::default()
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn with_type(mut self, flag_type: FlagType) -> Self {
        self.flag_type = flag_type;
        self
    }

    pub fn standalone(self) -> Self {
        self.with_type(FlagType::Standalone)
    }

    pub fn chained(self) -> Self {
        self.with_type(FlagType::Chained)
    }

    pub fn file(self) -> Self {
        self.with_type(FlagType::File)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_description_key(mut self, key: impl Into<String>) -> Self {
        self.description_key = Some(key.into());
        self
    }

    pub fn with_name_key(mut self, key: impl Into<String>) -> Self {
        self.name_key = Some(key.into());
        self
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn required_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&crate::parser::Parser) -> (bool, String) + 'static,
    {
        self.required_if = Some(Arc::new(predicate));
        self
    }

    pub fn with_accepted_values(mut self, values: Vec<AcceptedValue>) -> Self {
        self.accepted_values = values;
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators.extend(validators);
        self
    }

    pub fn with_pre_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.pre_filter = Some(Arc::new(filter));
        self
    }

    pub fn with_post_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> String + 'static,
    {
        self.post_filter = Some(Arc::new(filter));
        self
    }

    /// Declare that this flag depends on `flag` having one of `allowed`
    /// values. An empty list means presence of `flag` suffices.
    pub fn depends_on(mut self, flag: impl Into<String>, allowed: Vec<String>) -> Self {
        self.depends_on.insert(flag.into(), allowed);
        self
    }

    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn secure(mut self, prompt: impl Into<String>) -> Self {
        self.secure = Some(SecurePrompt {
            prompt: prompt.into(),
        });
        self
    }

    /// Stable identifier assigned at registration.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("short", &self.short)
            .field("flag_type", &self.flag_type)
            .field("default_value", &self.default_value)
            .field("required", &self.required)
            .field("position", &self.position)
            .field("capacity", &self.capacity)
            .field("secure", &self.secure.is_some())
            .field("validators", &self.validators.len())
            .field("depends_on", &self.depends_on)
            .finish()
    }
}
