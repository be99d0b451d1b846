use std::sync::{PoisonError, RwLock};

use hashbrown::HashMap;
use once_cell::sync::Lazy;

#[derive(Debug, Default)]
struct Strings {
    values: Vec<&'static str>,
    indices: HashMap<&'static str, u32>,
}

/// Process-wide string table backing [`InternedSymbol`]
#[derive(Debug, Default)]
pub struct InterningTable {
    strings: RwLock<Strings>,
}

pub static INTERNING_TABLE: Lazy<InterningTable> = Lazy::new(Default::default);

impl InterningTable {
    pub fn get(&self, index: u32) -> Option<&'static str> {
        let strings = self.strings.read().unwrap_or_else(PoisonError::into_inner);

        strings.values.get(index as usize).copied()
    }

    pub fn insert_if_absent(&self, string: &str) -> u32 {
        if let Some(index) = self.index_of(string) {
            return index;
        }

        let mut strings = self.strings.write().unwrap_or_else(PoisonError::into_inner);

        // Another writer may have won the race between the read and write locks
        if let Some(index) = strings.indices.get(string) {
            return *index;
        }

        let value: &'static str = Box::leak(string.to_owned().into_boxed_str());
        let index = strings.values.len() as u32;

        strings.values.push(value);
        strings.indices.insert(value, index);

        index
    }

    pub fn index_of(&self, string: &str) -> Option<u32> {
        let strings = self.strings.read().unwrap_or_else(PoisonError::into_inner);

        strings.indices.get(string).copied()
    }
}

/// An index into the string interning table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InternedSymbol(u32);

impl InternedSymbol {
    pub fn new(value: &str) -> Self {
        Self(INTERNING_TABLE.insert_if_absent(value))
    }

    pub fn value(&self) -> &'static str {
        // Entries are never removed, so every constructed symbol resolves
        INTERNING_TABLE.get(self.0).unwrap_or_default()
    }
}

impl core::fmt::Debug for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.value())
    }
}

impl core::fmt::Display for InternedSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_strings_share_a_symbol() {
        let a = InternedSymbol::new("counter");
        let b = InternedSymbol::new("counter");
        let c = InternedSymbol::new("other");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.value(), "counter");
        assert_eq!(c.to_string(), "other");
    }
}
