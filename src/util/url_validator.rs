use thiserror::Error;
use url::Url;

/// Why a link from entry data may not be handed to the system opener.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),

    #[error("URL contains credentials")]
    EmbeddedCredentials,
}

/// Validate a link before opening it in the user's browser.
///
/// Entry URLs and image sources come from arbitrary feeds, so anything that
/// is not plain http(s) (e.g. `file://` or `javascript:`) is refused, as are
/// URLs carrying a username or password.
///
/// # Examples
///
/// ```
/// use reflux::util::validate_url_for_open;
///
/// assert!(validate_url_for_open("https://example.com/post").is_ok());
/// assert!(validate_url_for_open("file:///etc/passwd").is_err());
/// ```
pub fn validate_url_for_open(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(UrlValidationError::EmbeddedCredentials);
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url_for_open("https://example.com/feed.xml").is_ok());
        assert!(validate_url_for_open("http://news.example.org").is_ok());
        assert!(validate_url_for_open("  https://example.com/padded  ").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url_for_open("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(validate_url_for_open("javascript:alert(1)").is_err());
    }

    #[test]
    fn test_relative_rejected() {
        assert!(matches!(
            validate_url_for_open("/images/a.png"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_credentials_rejected() {
        assert!(matches!(
            validate_url_for_open("https://user:pw@example.com/"),
            Err(UrlValidationError::EmbeddedCredentials)
        ));
    }
}
