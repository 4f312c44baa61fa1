/// Failures of one acquisition or download attempt.
#[derive(thiserror::Error, Debug)]
pub enum GrabError {
    /// The poll cycle ran out of attempts.
    #[error("no model URL discovered after {attempts} attempts")]
    NotFound { attempts: u32 },

    /// The page navigated away while the attempt was running.
    #[error("view changed while acquiring the model")]
    Superseded,

    /// Another acquisition or download is already running.
    #[error("an acquisition is already in flight")]
    Busy,

    #[error("{0}")]
    Fetch(String),

    #[error("could not save {filename}: {reason}")]
    Save { filename: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type GrabResult<T> = Result<T, GrabError>;

impl GrabError {
    /// Text for the blocking alert, if this failure is shown to the user.
    pub fn notice(&self) -> Option<String> {
        match self {
            GrabError::NotFound { .. } => {
                Some("Error downloading model. Please refresh and try again.".to_owned())
            }
            GrabError::Fetch(reason) | GrabError::Save { reason, .. } => {
                Some(format!("Error downloading model: {reason}"))
            }
            GrabError::Superseded | GrabError::Busy | GrabError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices() {
        let timeout = GrabError::NotFound { attempts: 30 };
        assert_eq!(
            timeout.notice().as_deref(),
            Some("Error downloading model. Please refresh and try again.")
        );

        let fetch = GrabError::Fetch("HTTP 404 Not Found".into());
        assert_eq!(
            fetch.notice().as_deref(),
            Some("Error downloading model: HTTP 404 Not Found")
        );

        assert!(GrabError::Superseded.notice().is_none());
        assert!(GrabError::Busy.notice().is_none());
    }
}
