//! Qubit and measurement-result pass-through to the driver.
//!
//! Results are issued by the driver but reference counted here. A result
//! the runtime has never shared is not recorded and implicitly has one
//! reference.

use qirt_hal::{QubitId, ResultId};
use tracing::trace;

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::{ObjectKey, ObjectKind};

impl Runtime {
    pub fn qubit_allocate(&mut self) -> RtResult<QubitId> {
        Ok(self.driver.allocate_qubit()?)
    }

    pub fn qubit_release(&mut self, qubit: QubitId) -> RtResult<()> {
        Ok(self.driver.release_qubit(qubit)?)
    }

    pub fn result_get_zero(&self) -> ResultId {
        self.driver.use_zero()
    }

    pub fn result_get_one(&self) -> ResultId {
        self.driver.use_one()
    }

    /// Identical handles are equal; otherwise the driver compares values.
    pub fn result_equal(&self, r1: ResultId, r2: ResultId) -> RtResult<bool> {
        if r1 == r2 {
            return Ok(true);
        }
        Ok(self.driver.are_equal_results(r1, r2)?)
    }

    pub fn result_update_reference_count(
        &mut self,
        result: ResultId,
        increment: i32,
    ) -> RtResult<()> {
        if increment == 0 {
            return Ok(());
        }
        let current = self.results.get(&result).copied().unwrap_or(1);
        let refs = current + i64::from(increment);
        if refs < 0 {
            return Err(RuntimeError::NegativeReferenceCount {
                object: ObjectKey::new(ObjectKind::Result, result.0),
                count: refs,
            });
        }
        match refs {
            0 => {
                self.results.remove(&result);
                trace!(%result, "Releasing result");
                self.driver.release_result(result)?;
            }
            1 => {
                self.results.remove(&result);
            }
            _ => {
                self.results.insert(result, refs);
            }
        }
        Ok(())
    }

    /// Runtime-side reference count of a result.
    pub fn result_reference_count(&self, result: ResultId) -> i64 {
        self.results.get(&result).copied().unwrap_or(1)
    }
}
