//! Dotted position codes (`1`, `1.2`, `1.2.3`).

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// A hierarchical position code. Segments are 1-based sibling positions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WbsCode(Vec<u32>);

impl WbsCode {
    /// Code of the `index`-th (0-based) root.
    #[must_use]
    pub fn root(index: usize) -> Self {
        Self(vec![position(index)])
    }

    /// Code of the `index`-th (0-based) child of this code.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(position(index));
        Self(segments)
    }

    /// `1.2` for `1.2.3`, `None` for a root code.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self.0.len() {
            0 | 1 => None,
            len => Some(Self(self.0[..len - 1].to_vec())),
        }
    }

    /// Number of segments minus one, so roots are at depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    #[must_use]
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Last segment, used to order imported siblings.
    #[must_use]
    pub fn last(&self) -> u32 {
        self.0.last().copied().unwrap_or(0)
    }

    /// `true` when `prefix` is this code or one of its ancestors, compared by
    /// whole segments (`1.2` matches `1.2.3`, not `1.20`).
    #[must_use]
    pub fn starts_with(&self, prefix: &WbsCode) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

fn position(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |i| i.saturating_add(1))
}

impl fmt::Display for WbsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for WbsCode {
    type Err = EngineError;

    /// Parses `1.2.3`. Surrounding whitespace and one trailing dot are
    /// tolerated; empty or non-numeric segments are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidCode(s.to_string());
        let trimmed = s.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(invalid());
        }
        trimmed
            .split('.')
            .map(|segment| {
                let segment = segment.trim();
                if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                segment.parse::<u32>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl TryFrom<String> for WbsCode {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WbsCode> for String {
    fn from(value: WbsCode) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_and_prints_codes() {
        let root = WbsCode::root(0);
        let child = root.child(1).child(0);
        assert_eq!(root.to_string(), "1");
        assert_eq!(child.to_string(), "1.2.1");
        assert_eq!(child.depth(), 2);
        assert_eq!(child.parent().map(|c| c.to_string()).as_deref(), Some("1.2"));
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn parses_loose_input() {
        assert_eq!(" 1.02.3. ".parse::<WbsCode>().unwrap().to_string(), "1.2.3");
        assert!("".parse::<WbsCode>().is_err());
        assert!("1..2".parse::<WbsCode>().is_err());
        assert!("A.1".parse::<WbsCode>().is_err());
    }

    #[test]
    fn prefix_matches_whole_segments() {
        let code: WbsCode = "1.20.1".parse().unwrap();
        assert!(code.starts_with(&"1.20".parse().unwrap()));
        assert!(!code.starts_with(&"1.2".parse().unwrap()));
    }
}
