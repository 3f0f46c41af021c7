//! Offset/limit pagination envelopes.

use serde::Serialize;

const DEFAULT_PAGE_LIMIT: u32 = 20;
const MAX_PAGE_LIMIT: u32 = 100;

/// Offset/limit window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Limit actually sent to storage: `0` means the default, values above the
    /// maximum are clamped.
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            0 => DEFAULT_PAGE_LIMIT,
            value if value > MAX_PAGE_LIMIT => MAX_PAGE_LIMIT,
            value => value,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_LIMIT)
    }
}

/// One page of results plus the size of the full, unpaginated set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PageRequest;

    #[test]
    fn effective_limit_defaults_zero_and_clamps_large_values() {
        assert_eq!(PageRequest::new(0, 0).effective_limit(), 20);
        assert_eq!(PageRequest::new(0, 7).effective_limit(), 7);
        assert_eq!(PageRequest::new(0, 5_000).effective_limit(), 100);
    }
}
