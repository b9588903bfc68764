use ss_location::Location;

use derive_more::{Display, Error};

#[derive(Error, Display, Debug, Clone)]
pub enum SsError {
    #[display(fmt = "{location} -> {content}")]
    Compile { location: Location, content: String },

    #[display(fmt = "{content}")]
    Runtime { content: String },
}

impl SsError {
    pub fn compile(location: Location, content: String) -> SsError {
        SsError::Compile { location, content }
    }

    pub fn runtime(content: String) -> SsError {
        SsError::Runtime { content }
    }

    pub fn unable_to(op: &str) -> SsError {
        SsError::runtime(format!("unable to {} invalid types", op))
    }

    pub fn undefined(name: &str) -> SsError {
        SsError::runtime(format!("variable '{}' is undefined", name))
    }

    pub fn already_defined(name: &str) -> SsError {
        SsError::runtime(format!("variable '{}' is already defined", name))
    }
}
