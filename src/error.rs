//! Error types for mixer definition handling.

use thiserror::Error;

/// Rejection of a streamed mixer text message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixerLoadError {
    /// Safety is off and the FMU is armed; definitions are frozen in flight
    #[error("mixer change refused while safety off and FMU armed")]
    Armed,

    /// A mix is executing; the edit was not applied
    #[error("mixer busy, retry")]
    Busy,

    /// Buffered text would exceed the text buffer; the current load is abandoned
    #[error("mixer text buffer overflow")]
    Overflow,
}

impl MixerLoadError {
    /// Whether the sender should resend the same message later
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Armed | Self::Busy)
    }

    /// Status word reported back to the delivery channel (0 = processed)
    pub fn status_code(self) -> u16 {
        1
    }
}

/// Status word for a loader result: 0 when processed, non-zero otherwise.
pub fn load_status(result: Result<(), MixerLoadError>) -> u16 {
    match result {
        Ok(()) => 0,
        Err(e) => e.status_code(),
    }
}

/// Why a mixer description could not be taken from the text buffer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MixerParseError {
    /// More text is needed before the description can be parsed
    #[error("mixer description incomplete")]
    Incomplete,

    /// The description is complete but not understood
    #[error("mixer description malformed")]
    Malformed,

    /// The mixer group has no room for another mixer
    #[error("mixer group full")]
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_overflow_is_final() {
        assert!(MixerLoadError::Armed.is_retryable());
        assert!(MixerLoadError::Busy.is_retryable());
        assert!(!MixerLoadError::Overflow.is_retryable());
    }

    #[test]
    fn status_words() {
        assert_eq!(load_status(Ok(())), 0);
        assert_ne!(load_status(Err(MixerLoadError::Busy)), 0);
        assert_ne!(load_status(Err(MixerLoadError::Overflow)), 0);
    }
}
