use crate::bookmark::BookmarkError;
use crate::pdf::EngineError;
use crate::store::StoreError;

/// Failures surfaced to the user.
///
/// Every variant is scoped to one component and leaves the action that
/// produced it retryable.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("listing documents: {0}")]
    List(#[source] StoreError),

    #[error("signing URL for {key}: {source}")]
    SignUrl {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("{0} is not in the document list")]
    NotListed(String),

    #[error("loading document after {attempts} attempt(s): {source}")]
    Load {
        attempts: u32,
        #[source]
        source: EngineError,
    },

    #[error("rendering page {page}: {source}")]
    Render {
        page: usize,
        #[source]
        source: EngineError,
    },

    #[error("uploading {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("{media_type} is not a PDF")]
    InvalidMediaType { media_type: String },

    #[error("no file selected")]
    NoFileSelected,

    #[error("bookmark: {0}")]
    Bookmark(#[from] BookmarkError),
}

impl Error {
    /// Text shown to the user for this failure
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::List(_) => "Failed to load PDFs. Please try again later.",
            Self::SignUrl { .. } | Self::NotListed(_) => "Failed to open PDF. Please try again.",
            Self::Load { .. } => {
                "Failed to load PDF. Please check if the file is valid or try again later."
            }
            Self::Render { .. } => "Failed to render page. Please try again.",
            Self::Upload { .. } => "Failed to upload file. Please try again.",
            Self::InvalidMediaType { .. } => "Please select a valid PDF file",
            Self::NoFileSelected => "Please select a PDF file first",
            Self::Bookmark(_) => "Failed to save bookmark",
        }
    }
}
