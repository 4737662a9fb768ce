use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Every slot in the slab is handed out.
    #[error("element slab exhausted")]
    Exhausted,
    /// The queue already holds as many elements as its endpoint allows.
    #[error("queue limit of {limit} elements reached")]
    QueueLimit { limit: usize },
}

/// Returned by `Endpoint::send` when only a prefix of the bytes could be queued.
///
/// The queued prefix is still transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("queued {queued} of {requested} bytes")]
pub struct SendError {
    pub queued: usize,
    pub requested: usize,
    #[source]
    pub cause: Error,
}

/// The device accepted fewer bytes than it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transport write incomplete")]
pub struct WriteIncomplete;
