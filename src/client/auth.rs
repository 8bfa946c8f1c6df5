use base64::Engine;
use eyre::Result;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// Credentials sent with every request to the data endpoint
#[derive(Clone, PartialEq)]
pub enum Auth {
    /// Use an API key authentication via headers
    Apikey(String),
    /// Use username and password authentication via Basic Auth headers
    Basic(String, String),
    /// Don't use any authentication
    None,
}

impl Auth {
    /// Pick credentials from the environment
    ///
    /// - `MDS_APIKEY` wins when set
    /// - otherwise `MDS_USERNAME` + `MDS_PASSWORD`
    /// - otherwise no authentication
    pub fn from_env() -> Self {
        if let Ok(apikey) = std::env::var("MDS_APIKEY") {
            Self::Apikey(apikey)
        } else if let (Ok(username), Ok(password)) = (
            std::env::var("MDS_USERNAME"),
            std::env::var("MDS_PASSWORD"),
        ) {
            Self::Basic(username, password)
        } else {
            Self::None
        }
    }

    /// Add the matching `Authorization` header, if any
    pub fn apply(&self, headers: &mut HeaderMap) -> Result<()> {
        match self {
            Self::Basic(username, password) => {
                let credentials = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, password));
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Basic {}", credentials))?,
                );
            }
            Self::Apikey(apikey) => {
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("ApiKey {}", apikey))?,
                );
            }
            Self::None => {}
        }
        Ok(())
    }
}

// Keep secrets out of debug logs
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl std::fmt::Display for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apikey(_) => write!(f, "Apikey"),
            Self::Basic(_, _) => write!(f, "Basic"),
            Self::None => write!(f, "None"),
        }
    }
}
