//! Interned, reference-counted strings.
//!
//! Creating a string whose content is already live returns the existing
//! handle with one more reference, so equal content implies equal handles.

use rustc_hash::FxHashMap;

use qirt_hal::{Pauli, QubitId, ResultId, ResultValue};

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::StringId;
use crate::range::Range;

struct Entry {
    text: String,
    refs: i64,
}

#[derive(Default)]
pub(crate) struct StringTable {
    by_content: FxHashMap<String, StringId>,
    entries: FxHashMap<u64, Entry>,
}

impl StringTable {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, id: StringId) -> RtResult<&Entry> {
        self.entries
            .get(&id.0)
            .ok_or(RuntimeError::ReleasedObject(id.key()))
    }
}

/// Fixed notation with 17 fractional digits, trailing zeros trimmed but
/// at least one fractional digit kept.
pub fn format_double(value: f64) -> String {
    let mut text = format!("{value:.17}");
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').len();
        text.truncate(trimmed);
        if text.ends_with('.') {
            text.push('0');
        }
    }
    text
}

impl Runtime {
    /// Intern `text`.
    pub fn string_create(&mut self, text: &str) -> StringId {
        if let Some(&id) = self.strings.by_content.get(text) {
            if let Some(entry) = self.strings.entries.get_mut(&id.0) {
                entry.refs += 1;
                return id;
            }
        }
        let id = StringId(self.next_id());
        self.strings.by_content.insert(text.to_owned(), id);
        self.strings.entries.insert(
            id.0,
            Entry {
                text: text.to_owned(),
                refs: 1,
            },
        );
        id
    }

    pub fn string_get_data(&self, string: StringId) -> RtResult<&str> {
        Ok(&self.strings.get(string)?.text)
    }

    /// Length in bytes.
    pub fn string_get_length(&self, string: StringId) -> RtResult<usize> {
        Ok(self.strings.get(string)?.text.len())
    }

    pub fn string_update_reference_count(
        &mut self,
        string: impl Into<Option<StringId>>,
        increment: i32,
    ) -> RtResult<()> {
        let Some(string) = string.into() else {
            return Ok(());
        };
        if increment == 0 {
            return Ok(());
        }
        let entry = self
            .strings
            .entries
            .get_mut(&string.0)
            .ok_or(RuntimeError::ReleasedObject(string.key()))?;
        let refs = entry.refs + i64::from(increment);
        if refs < 0 {
            return Err(RuntimeError::NegativeReferenceCount {
                object: string.key(),
                count: refs,
            });
        }
        entry.refs = refs;
        if refs == 0 {
            if let Some(entry) = self.strings.entries.remove(&string.0) {
                self.strings.by_content.remove(&entry.text);
            }
        }
        Ok(())
    }

    pub fn string_concatenate(&mut self, left: StringId, right: StringId) -> RtResult<StringId> {
        let joined = format!(
            "{}{}",
            self.string_get_data(left)?,
            self.string_get_data(right)?
        );
        Ok(self.string_create(&joined))
    }

    /// Handle comparison; interning makes it content equality.
    pub fn string_equal(&self, left: StringId, right: StringId) -> bool {
        left == right
    }

    pub fn int_to_string(&mut self, value: i64) -> StringId {
        self.string_create(&value.to_string())
    }

    pub fn double_to_string(&mut self, value: f64) -> StringId {
        self.string_create(&format_double(value))
    }

    pub fn bool_to_string(&mut self, value: bool) -> StringId {
        self.string_create(if value { "true" } else { "false" })
    }

    pub fn pauli_to_string(&mut self, pauli: Pauli) -> StringId {
        self.string_create(&pauli.to_string())
    }

    pub fn range_to_string(&mut self, range: Range) -> StringId {
        self.string_create(&range.to_string())
    }

    pub fn result_to_string(&mut self, result: ResultId) -> RtResult<StringId> {
        match self.driver.result_value(result)? {
            ResultValue::Zero => Ok(self.string_create("Zero")),
            ResultValue::One => Ok(self.string_create("One")),
            ResultValue::Pending => Err(RuntimeError::ResultPending),
        }
    }

    pub fn qubit_to_string(&mut self, qubit: QubitId) -> StringId {
        let text = self.driver.qubit_to_string(qubit);
        self.string_create(&text)
    }

    /// Reference count of a live string.
    pub fn string_reference_count(&self, string: StringId) -> RtResult<i64> {
        Ok(self.strings.get(string)?.refs)
    }
}
