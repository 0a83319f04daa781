use thiserror::Error;

/// No engine is registered for the kind of element being dispatched.
///
/// This is the one structural failure of the layout engine: it marks a construct the
/// layout tree does not understand and is surfaced to the caller instead of dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no layout engine handles `{kind}` (element uid {uid})")]
pub struct LookupError {
    pub kind: String,
    pub uid: u32,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("layout lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid layout structure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

impl LookupError {
    pub fn new(kind: impl Into<String>, uid: u32) -> Self {
        LookupError {
            kind: kind.into(),
            uid,
        }
    }
}
