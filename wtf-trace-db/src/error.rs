use thiserror::Error;
use wtf_trace_cff::CffErr;
use wtf_trace_types::{CodecErr, SignatureErr};

#[derive(Error, Debug)]
pub enum DbErr {
    #[error("CffErr: {0}")]
    CffErr(#[from] CffErr),
    #[error("CodecErr: {0}")]
    CodecErr(#[from] CodecErr),
    #[error("SignatureErr: {0}")]
    SignatureErr(#[from] SignatureErr),
    #[error("Undefined event type: {0}")]
    UndefinedEventType(String),
    #[error("Invalid event `{event}`: {reason}")]
    InvalidEvent { event: String, reason: String },
    #[error("Event data received before the file header")]
    NotInitialized,
    #[error("Source has already been initialized")]
    AlreadyInitialized,
    #[error("Already inserting events")]
    AlreadyInserting,
    #[error("Not inserting events")]
    NotInserting,
}

pub type DbResult<T> = Result<T, DbErr>;

impl DbErr {
    pub(crate) fn invalid_event<S: Into<String>, R: Into<String>>(event: S, reason: R) -> Self {
        Self::InvalidEvent {
            event: event.into(),
            reason: reason.into(),
        }
    }
}
