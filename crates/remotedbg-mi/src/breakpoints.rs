//! Breakpoint registry
//!
//! Bidirectional map between GDB breakpoint numbers and the masked
//! locations clients address breakpoints by. Entries exist only between
//! insert acknowledgment and delete acknowledgment.

use remotedbg_core::Breakpoint;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct BreakpointRegistry {
    by_number: HashMap<String, Breakpoint>,
    by_location: HashMap<(String, u32), String>,
}

impl BreakpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acknowledged insert
    pub fn record(&mut self, number: impl Into<String>, breakpoint: Breakpoint) {
        let number = number.into();
        self.by_location
            .insert((breakpoint.file.clone(), breakpoint.line), number.clone());
        self.by_number.insert(number, breakpoint);
    }

    /// GDB number for a masked location
    pub fn number_for(&self, breakpoint: &Breakpoint) -> Option<&str> {
        self.by_location
            .get(&(breakpoint.file.clone(), breakpoint.line))
            .map(String::as_str)
    }

    /// Masked location for a GDB number (used when classifying stops)
    pub fn location_for(&self, number: &str) -> Option<&Breakpoint> {
        self.by_number.get(number)
    }

    /// Drop both directions after an acknowledged delete
    pub fn remove(&mut self, number: &str) -> Option<Breakpoint> {
        let breakpoint = self.by_number.remove(number)?;
        self.by_location
            .remove(&(breakpoint.file.clone(), breakpoint.line));
        Some(breakpoint)
    }

    pub fn clear(&mut self) {
        self.by_number.clear();
        self.by_location.clear();
    }

    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_number.is_empty()
    }
}
