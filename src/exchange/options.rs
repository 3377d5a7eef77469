//! Configuration of an exchange.

use crate::algs::communicator::CommTag;
use serde::{Deserialize, Serialize};

/// Tags for the internal messages of one exchange. Each hash uses six
/// consecutive tags, the fence two.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeCommTags {
    pub source_hash: CommTag,
    pub destination_hash: CommTag,
    pub fence: CommTag,
    pub collect: CommTag,
}

impl ExchangeCommTags {
    pub const fn from_base(base: CommTag) -> Self {
        Self {
            source_hash: base,
            destination_hash: base.offset(8),
            fence: base.offset(16),
            collect: base.offset(24),
        }
    }
}

impl Default for ExchangeCommTags {
    fn default() -> Self {
        Self::from_base(CommTag::new(0x4F00))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeOptions {
    pub tags: ExchangeCommTags,
    /// Log create/update/destroy status lines from rank 0.
    pub log_status: bool,
}

impl Default for ExchangeOptions {
    fn default() -> Self {
        Self {
            tags: ExchangeCommTags::default(),
            log_status: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_do_not_overlap() {
        let t = ExchangeCommTags::from_base(CommTag::new(100));
        assert_eq!(t.destination_hash.as_u16() - t.source_hash.as_u16(), 8);
        assert_eq!(t.collect.as_u16(), 124);
    }
}
