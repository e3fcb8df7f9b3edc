//! Per-layer metrics report.
//!
//! One header row followed by one row per layer:
//!
//! ```text
//! layer_id<sep>name<sep><op>...
//! <start time><sep><barrier name><sep><count>...
//! ```
//!
//! Operation columns are sorted by id, so the report does not depend on
//! the order operations were traced in.

use std::io::{self, Write};

use crate::config::TracerConfig;
use crate::tracer::Tracer;

impl Tracer {
    /// Write the layer metrics to `out`.
    ///
    /// Cells of operations absent from a layer are empty, or `0` when
    /// `print_zero` is set.
    pub fn print_layer_metrics(
        &self,
        out: &mut dyn Write,
        separator: &str,
        print_zero: bool,
    ) -> io::Result<()> {
        let ops: Vec<_> = self.seen_operations().collect();

        write!(out, "layer_id{separator}name")?;
        for &op in &ops {
            write!(out, "{separator}{}", self.op_name(op))?;
        }
        writeln!(out)?;

        let zero = if print_zero { "0" } else { "" };
        for layer in self.layers() {
            let barrier = layer.barrier.map(|op| self.op_name(op)).unwrap_or_default();
            write!(out, "{}{separator}{barrier}", layer.start_time)?;
            for &op in &ops {
                match layer.operations.get(&op) {
                    Some(count) => write!(out, "{separator}{count}")?,
                    None => write!(out, "{separator}{zero}")?,
                }
            }
            writeln!(out)?;
        }
        Ok(())
    }

    /// The layer metrics as a string, formatted per `config`.
    pub fn layer_metrics(&self, config: &TracerConfig) -> String {
        let mut out = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = self.print_layer_metrics(
            &mut out,
            &config.metrics_separator,
            config.print_zero_metrics,
        );
        String::from_utf8_lossy(&out).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use qirt_hal::Driver;

    use super::*;

    #[test]
    fn test_empty_report() {
        let tracer = Tracer::new(1);
        let config = TracerConfig::default();
        assert_eq!(tracer.layer_metrics(&config), "layer_id\tname\n");
    }

    #[test]
    fn test_report_counts_repeated_ops() {
        let mut tracer = Tracer::new(3);
        let q = tracer.allocate_qubit().unwrap();
        tracer.trace_single_qubit_op(7, 1, q).unwrap();
        tracer.trace_single_qubit_op(7, 1, q).unwrap();

        let config = TracerConfig {
            metrics_separator: ";".into(),
            ..TracerConfig::default()
        };
        assert_eq!(tracer.layer_metrics(&config), "layer_id;name;7\n0;;2\n");
    }
}
