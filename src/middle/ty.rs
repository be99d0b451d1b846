use strum::Display;

/// The value types of the language. There is no separate "unknown" type: a
/// binding nobody has constrained yet is an `I32`, and the first other type
/// it receives replaces it for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ValueType {
    /// 1, -20
    #[default]
    I32,
    /// true, false
    Bool,
    /// "hello"
    String,
    /// void
    Void,
}

impl ValueType {
    pub const DEFAULT: Self = Self::I32;

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }

    /// Refinement rule used by every binding: a default slot takes whatever
    /// it receives, a concrete slot only accepts itself. Returns `None` on
    /// conflict.
    pub fn refine(self, incoming: Self) -> Option<Self> {
        if self.is_default() || incoming == self {
            Some(incoming)
        } else {
            None
        }
    }

    /// Symmetric version of [`ValueType::refine`] where either side may
    /// still be the default
    pub fn unify(self, other: Self) -> Option<Self> {
        if self.is_default() {
            Some(other)
        } else if other.is_default() || other == self {
            Some(self)
        } else {
            None
        }
    }

    /// Source text of the value a function of this type returns when its
    /// body never does so explicitly
    pub fn zero_value(self) -> &'static str {
        match self {
            ValueType::I32 => "0",
            ValueType::Bool => "0",
            ValueType::String => "",
            ValueType::Void => "void",
        }
    }
}
