use std::fmt;

use crate::{level::Level, metadata::Metadata};

/// Call site that produced a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub function: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
        }
    }
}

/// `function @ file:line`
impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}:{}", self.function, self.file, self.line)
    }
}

/// A log record as handed over by the logging facade.
///
/// Records carry no timestamp; the handler stamps one when it renders.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub level: Level,
    pub message: String,
    pub metadata: Option<Metadata>,
    pub location: SourceLocation,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            level,
            message: message.into(),
            metadata: None,
            location,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Build a [`SourceLocation`] for the current call site.
#[macro_export]
macro_rules! location {
    () => {
        $crate::record::SourceLocation::new(file!(), module_path!(), line!())
    };
}
