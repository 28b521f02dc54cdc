use thiserror::Error;

#[derive(Error, Debug)]
pub enum AmbulanceError {
    #[error("Booking not found: {0}")]
    NotFound(String),

    /// Accept attempted on a booking that is no longer `requested`. This is
    /// the expected outcome of losing the accept race, not a hard error.
    #[error("Already accepted")]
    AlreadyHandled,

    #[error("Persistence failure: {0}")]
    Persistence(String),
}
