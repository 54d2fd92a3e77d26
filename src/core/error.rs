use thiserror::Error;

/// Failure of one external adapter call. The pipeline stringifies these
/// into `Step.error`; the variants keep the failure kind and the owning
/// service inspectable up to that point.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The service answered with a non-success response.
    #[error("{service} returned {status}: {body}")]
    Remote {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Network-level failure before any response arrived.
    #[error("{service} transport failure: {cause}")]
    Transport {
        service: &'static str,
        cause: String,
    },

    /// The response arrived but could not be decoded.
    #[error("{service} response could not be parsed: {detail}")]
    Parse {
        service: &'static str,
        detail: String,
    },

    /// Malformed caller-side input, e.g. a channel string that is
    /// neither a channel URL nor a raw channel id.
    #[error("invalid {field}: {detail}")]
    InvalidInput { field: &'static str, detail: String },

    /// A step ran without the upstream result it depends on. Guards the
    /// engine against an unhandled combination of preconditions.
    #[error("step {step} is missing its input from an earlier step")]
    MissingStepInput { step: &'static str },

    #[error("{service} timed out after {seconds}s")]
    Timeout { service: &'static str, seconds: u64 },
}

pub type AdapterResult<T> = Result<T, AdapterError>;

impl AdapterError {
    /// Map a reqwest failure into the transport/timeout kinds.
    pub fn from_reqwest(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout {
                service,
                seconds: crate::core::adapters::CALL_TIMEOUT_SECS,
            }
        } else {
            AdapterError::Transport {
                service,
                cause: err.to_string(),
            }
        }
    }
}
