//! navigation
//!
//! Full-page redirects.
//!
//! A web app leaves the page for the authorization server on login and
//! logout. Outside a browser the same step means handing a URL to
//! something that can show it: the system browser, the terminal, or a
//! test recorder.

use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Errors from navigation.
#[derive(Debug, Clone, Error)]
#[error("cannot navigate to '{url}': {message}")]
pub struct NavigationError {
    /// Target URL
    pub url: String,
    /// Failure reason
    pub message: String,
}

/// Something that can take the user to a URL.
pub trait Navigator: Send + Sync {
    /// Navigate away to `url`.
    fn navigate(&self, url: &str) -> Result<(), NavigationError>;
}

/// Opens URLs in the system browser.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl Navigator for SystemBrowser {
    fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        tracing::info!(%url, "opening browser");
        open::that(url).map_err(|e| NavigationError {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// Prints URLs for the user to open by hand.
#[derive(Debug, Default)]
pub struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        println!("Open this URL to continue: {}", url);
        Ok(())
    }
}

/// Records navigations instead of performing them.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every URL navigated to, oldest first.
    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent URL navigated to.
    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, url: &str) -> Result<(), NavigationError> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_navigator_keeps_order() {
        let navigator = RecordingNavigator::new();
        navigator.navigate("https://login.example.com/authorize").unwrap();
        navigator.navigate("https://login.example.com/logout").unwrap();

        assert_eq!(navigator.visited().len(), 2);
        assert_eq!(
            navigator.last().as_deref(),
            Some("https://login.example.com/logout")
        );
    }

    #[test]
    fn error_names_url() {
        let err = NavigationError {
            url: "https://x".into(),
            message: "no browser".into(),
        };
        assert!(err.to_string().contains("https://x"));
        assert!(err.to_string().contains("no browser"));
    }
}
