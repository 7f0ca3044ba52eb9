//! Persisted per-bus port status.
//!
//! One entry per logical bus number, kept whether or not the backend
//! currently offers that endpoint, so settings survive devices coming and
//! going. Lists only ever grow.

use sequin_core::ClockMode;
use serde::{Deserialize, Serialize};

/// Value stored for one bus, plus what was last known about the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortStatus<T> {
    pub value: T,
    pub available: bool,
    pub name: String,
}

/// Values that can fill a gap in a [`StatusList`].
pub trait StatusValue: Copy {
    const PLACEHOLDER_NAME: &'static str;
    const LABEL: &'static str;

    fn placeholder() -> Self;
}

impl StatusValue for ClockMode {
    const PLACEHOLDER_NAME: &'static str = "Null clock";
    const LABEL: &'static str = "clock";

    fn placeholder() -> Self {
        ClockMode::Disabled
    }
}

impl StatusValue for bool {
    const PLACEHOLDER_NAME: &'static str = "Null input";
    const LABEL: &'static str = "input";

    fn placeholder() -> Self {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusList<T> {
    entries: Vec<PortStatus<T>>,
}

pub type ClockList = StatusList<ClockMode>;
pub type InputList = StatusList<bool>;

impl<T> Default for StatusList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: StatusValue> StatusList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the list from configured values; endpoints are not known yet.
    pub fn from_values(values: &[T]) -> Self {
        Self {
            entries: values
                .iter()
                .map(|&value| PortStatus {
                    value,
                    available: false,
                    name: String::new(),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, bus: usize) -> Option<T> {
        self.entries.get(bus).map(|e| e.value)
    }

    pub fn entry(&self, bus: usize) -> Option<&PortStatus<T>> {
        self.entries.get(bus)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortStatus<T>> {
        self.entries.iter()
    }

    pub fn values(&self) -> Vec<T> {
        self.entries.iter().map(|e| e.value).collect()
    }

    /// Stores `value` for `bus`, growing the list with placeholders if needed.
    pub fn save(&mut self, bus: usize, value: T) {
        self.grow_to(bus);
        self.entries[bus].value = value;
    }

    pub fn set_available(&mut self, bus: usize, available: bool) {
        self.grow_to(bus);
        self.entries[bus].available = available;
    }

    pub fn set_name(&mut self, bus: usize, name: impl Into<String>) {
        self.grow_to(bus);
        self.entries[bus].name = name.into();
    }

    fn grow_to(&mut self, bus: usize) {
        while self.entries.len() <= bus {
            let missing = self.entries.len();
            if missing < bus {
                tracing::warn!("{} list: missing bus {}, filled with placeholder", T::LABEL, missing);
            }
            self.entries.push(PortStatus {
                value: T::placeholder(),
                available: false,
                name: T::PLACEHOLDER_NAME.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_grows_with_placeholders() {
        let mut clocks = ClockList::new();
        clocks.save(3, ClockMode::Pos);

        assert_eq!(clocks.len(), 4);
        assert_eq!(clocks.get(3), Some(ClockMode::Pos));
        for bus in 0..3 {
            let entry = clocks.entry(bus).unwrap();
            assert_eq!(entry.value, ClockMode::Disabled);
            assert_eq!(entry.name, "Null clock");
            assert!(!entry.available);
        }
    }

    #[test]
    fn test_save_never_truncates() {
        let mut inputs = InputList::from_values(&[true, true, true]);
        inputs.save(0, false);
        assert_eq!(inputs.values(), vec![false, true, true]);
        assert_eq!(inputs.get(7), None);
    }

    #[test]
    fn test_set_available_grows() {
        let mut inputs = InputList::new();
        inputs.set_available(1, true);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs.entry(0).unwrap().name, "Null input");
        assert!(inputs.entry(1).unwrap().available);
    }

    #[test]
    fn test_bincode_round_trip() {
        let mut clocks = ClockList::from_values(&[ClockMode::On, ClockMode::Off]);
        clocks.set_name(0, "synth:in");
        clocks.save(4, ClockMode::Mod);

        let bytes = bincode::serialize(&clocks).unwrap();
        let back: ClockList = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, clocks);
    }
}
