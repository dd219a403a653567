//! Decoded response head.

use crate::http::headercodec::HeaderFields;

/// Status line and headers of one attempt's response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    /// Protocol token from the status line, e.g. `HTTP/1.1`.
    pub version: String,
    /// Numeric status, 0 when the status line could not be parsed.
    pub status: u16,
    /// Reason phrase, possibly empty.
    pub message: String,
    pub headers: HeaderFields,
}

impl ResponseHead {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// The `Location` header, matched without regard to case.
    pub fn location(&self) -> Option<&str> {
        self.headers.get_ignore_ascii_case("Location")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let mut head = ResponseHead {
            status: 200,
            ..Default::default()
        };
        assert!(head.is_success());
        assert!(!head.is_redirection());

        head.status = 204;
        assert!(!head.is_success());

        head.status = 308;
        assert!(head.is_redirection());
        head.status = 400;
        assert!(!head.is_redirection());
    }

    #[test]
    fn test_location_any_case() {
        let mut head = ResponseHead::default();
        head.headers.insert("location", "/next");
        assert_eq!(head.location(), Some("/next"));
    }
}
