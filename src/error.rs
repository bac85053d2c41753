use derive_more::{Display, Error};

pub type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

#[derive(Clone, Copy, Debug, Display, Error, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("could not set up the HTTP client")]
    Remote,
    #[display("could not open the target directory")]
    Target,
    #[display("cache operation failed")]
    Cache,
    #[display("cache is disabled or could not be opened")]
    CacheUnavailable,
    #[display("synchronisation failed")]
    Sync,
}
