//! Entry point error types.

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The trigger event is not a JSON object.
    #[display("invalid trigger event")]
    Event,
    #[display("invalid configuration")]
    Config,
    /// A configured backend could not be constructed.
    #[display("could not set up {_0}")]
    Setup(#[error(not(source))] &'static str),
    #[display("run failed")]
    Pipeline,
}
