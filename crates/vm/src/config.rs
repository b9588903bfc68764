use std::cell::RefCell;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;

/// The interpreter's host streams: a line-oriented input source and a
/// line-oriented output sink.
pub struct VmConfig {
    istream: Box<dyn BufRead>,
    ostream: Box<dyn Write>,
}

impl VmConfig {
    pub fn basic() -> VmConfig {
        VmConfig {
            istream: Box::new(BufReader::new(io::stdin())),
            ostream: Box::new(io::stdout()),
        }
    }

    pub fn new(istream: Box<dyn BufRead>, ostream: Box<dyn Write>) -> VmConfig {
        VmConfig { istream, ostream }
    }

    pub fn write(&mut self, value: impl fmt::Display) {
        let _ = write!(self.ostream, "{}", value);
        let _ = self.ostream.flush();
    }

    pub fn write_line(&mut self, value: impl fmt::Display) {
        let _ = writeln!(self.ostream, "{}", value);
    }

    /// One line of input without its terminator, or `None` at end of input.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();

        match self.istream.read_line(&mut line) {
            Ok(0) | Err(_) => None,

            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }

                Some(line)
            }
        }
    }
}

impl Default for VmConfig {
    fn default() -> Self {
        Self::basic()
    }
}

/// A cloneable in-memory sink, handy for capturing interpreter output.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    data: Rc<RefCell<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> SharedBuffer {
        SharedBuffer::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.borrow_mut().extend_from_slice(buf);

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
