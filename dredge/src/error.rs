use facet::Facet;

/// Errors that abort a find before the tree is touched.
#[derive(Facet, Debug)]
#[facet(derive(Error))]
#[repr(u8)]
pub enum FindError {
    /// pattern produced a zero-length match at offset {offset}
    ZeroLengthMatch { offset: usize },

    /// invalid pattern: {message}
    InvalidPattern { message: String },

    /// invalid configuration: {message}
    Config { message: String },
}

impl From<regex::Error> for FindError {
    fn from(err: regex::Error) -> Self {
        FindError::InvalidPattern {
            message: err.to_string(),
        }
    }
}
