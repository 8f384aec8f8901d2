//! A caller-owned stack of error records.
//!
//! Failures can be pushed onto an [`ErrorChain`] one at a time with
//! [`ErrorChain::raise`], or a whole [`BolnotesError`] and its causes can be
//! flattened with [`ErrorChain::from_error`]. The most recent record is the
//! top of the chain; each record's predecessor is the one below it.

use std::error::Error as _;
use std::fmt;

use log::debug;
use serde::Serialize;

use crate::BolnotesError;

/// One record in an [`ErrorChain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainLink {
    pub message: String,
    /// Operating-system error text captured when the link was raised.
    pub system_error: Option<String>,
}

impl fmt::Display for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.system_error {
            Some(system) => write!(f, "{} ({system})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorChain {
    // Bottom first; the last element is the top.
    links: Vec<ChainLink>,
    raised: bool,
}

impl ErrorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a chain from `err` and every error reachable through
    /// [`source`](std::error::Error::source). The outermost error ends up on
    /// top, the root cause at the bottom.
    pub fn from_error(err: &BolnotesError) -> Self {
        Self::from_source_chain(err)
    }

    /// Like [`from_error`](Self::from_error) for any error type.
    ///
    /// When an error's message already ends with its source's message (as
    /// for I/O failures), the source becomes that link's `system_error`
    /// instead of a link of its own.
    pub fn from_source_chain(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut links = Vec::new();
        let mut current = Some(err);
        while let Some(e) = current {
            let message = e.to_string();
            let source = e.source();
            let inner = source.map(|s| s.to_string()).unwrap_or_default();
            if !inner.is_empty() && message.len() > inner.len() && message.ends_with(&inner) {
                let head = message[..message.len() - inner.len()].trim_end_matches([':', ' ']);
                links.push(ChainLink {
                    message: head.to_string(),
                    system_error: Some(inner),
                });
                current = source.and_then(|s| s.source());
            } else {
                links.push(ChainLink {
                    message,
                    system_error: None,
                });
                current = source;
            }
        }

        let mut chain = Self::new();
        for link in links.into_iter().rev() {
            chain.push(link);
        }
        chain
    }

    /// Pushes a new record on top of the chain and returns it.
    pub fn raise(&mut self, message: impl Into<String>) -> &ChainLink {
        self.push(ChainLink {
            message: message.into(),
            system_error: None,
        })
    }

    /// Like [`raise`](Self::raise), also recording the last system error.
    pub fn raise_system(
        &mut self,
        message: impl Into<String>,
        system_error: impl fmt::Display,
    ) -> &ChainLink {
        self.push(ChainLink {
            message: message.into(),
            system_error: Some(system_error.to_string()),
        })
    }

    fn push(&mut self, link: ChainLink) -> &ChainLink {
        debug!("error raised: {link}");
        self.raised = true;
        self.links.push(link);
        // Non-empty after the push.
        &self.links[self.links.len() - 1]
    }

    /// Removes the top record and returns the new top, if any.
    pub fn pop(&mut self) -> Option<&ChainLink> {
        self.links.pop();
        self.links.last()
    }

    pub fn top(&self) -> Option<&ChainLink> {
        self.links.last()
    }

    /// Drops every record and resets the raised flag.
    pub fn clear(&mut self) {
        self.links.clear();
        self.raised = false;
    }

    /// Returns whether anything was raised since the last call, and resets
    /// the flag.
    pub fn take_raised(&mut self) -> bool {
        std::mem::take(&mut self.raised)
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Iterates from the top of the chain down to the oldest record.
    pub fn iter(&self) -> impl Iterator<Item = &ChainLink> + '_ {
        self.links.iter().rev()
    }

    /// Renders the chain, one record per line, top first. Records below the
    /// top are prefixed with `caused by:`.
    pub fn report(&self) -> String {
        let mut out = String::new();
        for (i, link) in self.iter().enumerate() {
            if i > 0 {
                out.push_str("\n  caused by: ");
            }
            out.push_str(&link.to_string());
        }
        out
    }
}

impl fmt::Display for ErrorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_and_pop() {
        let mut chain = ErrorChain::new();
        assert!(chain.is_empty());
        chain.raise("low level");
        let top = chain.raise("high level");
        assert_eq!(top.message, "high level");
        assert_eq!(chain.len(), 2);

        let new_top = chain.pop().unwrap();
        assert_eq!(new_top.message, "low level");
        assert!(chain.pop().is_none());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_take_raised_resets() {
        let mut chain = ErrorChain::new();
        assert!(!chain.take_raised());
        chain.raise("oops");
        assert!(chain.take_raised());
        assert!(!chain.take_raised());

        chain.clear();
        assert!(chain.is_empty());
        assert!(!chain.take_raised());
    }

    #[test]
    fn test_system_error_in_display() {
        let mut chain = ErrorChain::new();
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        let link = chain.raise_system("cannot save notes.bol", &err);
        let text = link.to_string();
        assert!(text.starts_with("cannot save notes.bol ("));
        assert!(link.system_error.is_some());
    }

    #[test]
    fn test_from_error_orders_outermost_first() {
        let err = BolnotesError::InvalidFormat("bad magic".to_string())
            .context("failed to open document x.bol");
        let chain = ErrorChain::from_error(&err);

        let messages: Vec<_> = chain.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "failed to open document x.bol");
        assert!(messages[1].contains("bad magic"));

        let report = chain.report();
        assert!(report.starts_with("failed to open document x.bol"));
        assert!(report.contains("caused by:"));
    }

    #[test]
    fn test_from_error_folds_io_source_into_system_error() {
        let err = BolnotesError::Io {
            offset: 20,
            source: std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
        };
        let os_text = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).to_string();
        let chain = ErrorChain::from_error(&err);
        assert_eq!(chain.len(), 1);

        let top = chain.top().unwrap();
        assert_eq!(top.message, "I/O error at offset 20");
        assert_eq!(top.system_error.as_deref(), Some(os_text.as_str()));
        assert_eq!(chain.report().matches(os_text.as_str()).count(), 1);
    }

    #[test]
    fn test_from_error_context_over_file_error() {
        let err = BolnotesError::from(std::io::Error::from(std::io::ErrorKind::NotFound))
            .context("failed to open document x.bol");
        let chain = ErrorChain::from_error(&err);
        let links: Vec<_> = chain.iter().collect();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].message, "failed to open document x.bol");
        assert_eq!(links[1].message, "File error");
        assert!(links[1].system_error.is_some());
    }

    #[test]
    fn test_clear_resets_raised_flag() {
        let mut chain = ErrorChain::new();
        chain.raise("first");
        chain.clear();
        assert!(chain.is_empty());
        assert!(!chain.take_raised());

        chain.raise("second");
        assert!(chain.take_raised());
    }
}
