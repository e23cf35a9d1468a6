use std::{
    error::Error,
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};

/// A problem with the input imagery that makes it impossible to build a valid cube.
///
/// These are always fatal, and the message always names the file that caused the problem.
#[derive(Debug, Clone)]
pub struct InputFormatError {
    pub path: PathBuf,
    pub msg: String,
}

impl InputFormatError {
    pub fn new<P: AsRef<Path>, S: Into<String>>(path: P, msg: S) -> Self {
        InputFormatError {
            path: path.as_ref().to_path_buf(),
            msg: msg.into(),
        }
    }
}

impl Display for InputFormatError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}: {}", self.path.display(), self.msg)
    }
}

impl Error for InputFormatError {}

/// A stored search could not be loaded back into memory.
#[derive(Debug, Clone, Copy)]
pub struct StoreError {
    pub msg: &'static str,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for StoreError {}
