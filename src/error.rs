use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not open {_0}")]
    Open(#[error(not(source))] String),
    #[display("text extraction is configured but unavailable")]
    Extractor,
    #[display("gathering failed")]
    Gather,
    #[display("building the lookup failed")]
    Lookup,
    #[display("task `{_0}` failed")]
    Task(#[error(not(source))] String),
    #[display("could not write output")]
    Output,
}
