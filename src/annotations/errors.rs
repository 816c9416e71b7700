use crate::dex::FormatError;
pub use crate::runtime::ResolutionError;

/// Failure of an annotation query
///
/// Not finding an annotation (or a member, or an element) is never an error: those come back as
/// `Ok(None)` or `Ok(false)`.
#[derive(Debug)]
pub enum Error {
    /// The container bytes are malformed
    Format(FormatError),

    /// An eager query could not resolve a type
    Resolution(ResolutionError),

    IoError(std::io::Error),
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Error {
        Error::Format(err)
    }
}

impl From<ResolutionError> for Error {
    fn from(err: ResolutionError) -> Error {
        Error::Resolution(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
