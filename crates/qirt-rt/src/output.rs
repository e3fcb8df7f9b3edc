//! Message output and user-level failure.
//!
//! Messages go to the innermost redirected sink, or to stdout when nothing
//! is redirected.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::context::Runtime;
use crate::error::{RtResult, RuntimeError};
use crate::object::StringId;

pub(crate) struct OutputSink {
    stdout: io::Stdout,
    redirects: Vec<Box<dyn Write>>,
}

impl Default for OutputSink {
    fn default() -> Self {
        Self {
            stdout: io::stdout(),
            redirects: Vec::new(),
        }
    }
}

impl OutputSink {
    fn current(&mut self) -> &mut dyn Write {
        match self.redirects.last_mut() {
            Some(sink) => sink.as_mut(),
            None => &mut self.stdout,
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        self.current().flush()
    }

    fn depth(&self) -> usize {
        self.redirects.len()
    }
}

/// Token for a pushed output sink. Give it back with [`restore`](Self::restore).
#[must_use = "a redirected sink stays active until restored"]
#[derive(Debug)]
pub struct OutputRedirect {
    depth: usize,
}

impl OutputRedirect {
    /// Pop the redirected sink and return it.
    ///
    /// Redirections nest; restoring out of order is a
    /// [`RuntimeError::OutputRedirect`].
    pub fn restore(self, runtime: &mut Runtime) -> RtResult<Box<dyn Write>> {
        if runtime.output.depth() != self.depth {
            return Err(RuntimeError::OutputRedirect(format!(
                "output redirect restored at depth {} while depth {} is active",
                self.depth,
                runtime.output.depth()
            )));
        }
        runtime.output.flush()?;
        runtime
            .output
            .redirects
            .pop()
            .ok_or_else(|| RuntimeError::OutputRedirect("no output redirect is active".into()))
    }
}

/// In-memory sink whose contents can be read after the runtime is done
/// writing to it.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    buffer: Rc<RefCell<Vec<u8>>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that appends to this buffer.
    pub fn sink(&self) -> Box<dyn Write> {
        Box::new(self.clone())
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.borrow()).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Runtime {
    /// Send messages to `sink` until the returned token is restored.
    pub fn redirect_output(&mut self, sink: Box<dyn Write>) -> OutputRedirect {
        self.output.redirects.push(sink);
        OutputRedirect {
            depth: self.output.depth(),
        }
    }

    /// Run `f` with messages sent to `sink`. The sink is removed on every
    /// exit path.
    pub fn with_output<R>(
        &mut self,
        sink: Box<dyn Write>,
        f: impl FnOnce(&mut Runtime) -> RtResult<R>,
    ) -> RtResult<R> {
        let redirect = self.redirect_output(sink);
        let result = f(self);
        let restored = redirect.restore(self);
        let value = result?;
        restored?;
        Ok(value)
    }

    /// Write a string followed by a newline to the current sink.
    pub fn message(&mut self, message: StringId) -> RtResult<()> {
        let text = self.string_get_data(message)?.to_owned();
        writeln!(self.output.current(), "{text}")?;
        Ok(())
    }

    /// User-level failure with the given message.
    pub fn fail<T>(&self, message: StringId) -> RtResult<T> {
        let text = self.string_get_data(message)?;
        Err(RuntimeError::Failure(text.to_owned()))
    }
}
