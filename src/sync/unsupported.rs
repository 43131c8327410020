use crate::core::data::PromptRecord;
use crate::core::scope::ScopeRoot;
use crate::core::traits::{Capabilities, PromptSink, WriteOutcome};
use crate::utils::error::SyncError;
use async_trait::async_trait;

const NOTE: &str = "support is planned for a future release";

/// Placeholder for a recognised platform that has no writer yet.
///
/// [`PromptSink::check`] fails, so jobs targeting it are rejected before
/// their source is ever contacted.
pub struct UnsupportedSink {
    name: String,
    platform: &'static str,
}

impl UnsupportedSink {
    pub fn new(name: &str, platform: &'static str) -> Self {
        Self {
            name: name.to_string(),
            platform,
        }
    }

    fn error(&self) -> SyncError {
        SyncError::PlatformNotSupported {
            platform: self.platform.to_string(),
            note: NOTE.to_string(),
        }
    }
}

#[async_trait]
impl PromptSink for UnsupportedSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::unscoped(false)
    }

    fn check(&self) -> Result<(), SyncError> {
        Err(self.error())
    }

    async fn write(&self, _record: &PromptRecord, _scope: &ScopeRoot) -> Result<WriteOutcome, SyncError> {
        Err(self.error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorKind;

    #[test]
    fn test_check_reports_platform() {
        let sink = UnsupportedSink::new("ws", "windsurf");
        let err = sink.check().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PlatformNotSupported);
        assert!(err.to_string().contains("windsurf"));
    }
}
