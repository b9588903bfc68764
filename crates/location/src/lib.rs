use derive_more::Display;

#[derive(Debug, Display, PartialEq, Eq, Clone, Copy)]
#[display(fmt = "{line}:{column}")]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Location {
        Location { line, column }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}
