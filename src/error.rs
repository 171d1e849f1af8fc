use thiserror::Error;

#[derive(Error, Debug)]
pub enum BarError {
    #[error("invalid job payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("foo-service request failed: {0}")]
    FooRequest(#[from] reqwest::Error),

    #[error("foo-service returned HTTP {0}")]
    FooStatus(u16),

    #[error("foo-service response malformed: {0}")]
    FooResponse(#[from] quick_xml::DeError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, BarError>;
