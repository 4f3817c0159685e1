//! Title codes and the title matcher.
//!
//! The upstream `title` field is free text. [`parse_titles`] turns it into a set of
//! recognised codes; [`is_titled_player`] decides whether a record counts as titled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::TitleSepError;
use crate::types::PlayerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Title {
    GM,
    IM,
    FM,
    CM,
    NM,
    WGM,
    WIM,
    WFM,
    WCM,
}

impl Title {
    pub const ALL: [Title; 9] = [
        Title::GM,
        Title::IM,
        Title::FM,
        Title::CM,
        Title::NM,
        Title::WGM,
        Title::WIM,
        Title::WFM,
        Title::WCM,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Title::GM => "GM",
            Title::IM => "IM",
            Title::FM => "FM",
            Title::CM => "CM",
            Title::NM => "NM",
            Title::WGM => "WGM",
            Title::WIM => "WIM",
            Title::WFM => "WFM",
            Title::WCM => "WCM",
        }
    }

    /// Exact (already uppercased) token lookup.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == token)
    }

    fn name_prefix(&self) -> String {
        format!("{} ", self.as_str())
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Title {
    type Err = TitleSepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| TitleSepError::InvalidInput(format!("unknown title code: {s}")))
    }
}

/// Filter of acceptable titles. Never empty: an empty input means "any title".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TitleSet(BTreeSet<Title>);

impl TitleSet {
    pub fn all() -> Self {
        Self(Title::ALL.iter().copied().collect())
    }

    pub fn new<I: IntoIterator<Item = Title>>(titles: I) -> Self {
        let set: BTreeSet<Title> = titles.into_iter().collect();
        if set.is_empty() {
            Self::all()
        } else {
            Self(set)
        }
    }

    /// Parse a comma/space separated list such as `"GM, IM"`.
    pub fn parse_list(input: &str) -> Result<Self, TitleSepError> {
        let titles = input
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(Title::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(titles))
    }

    pub fn contains(&self, title: Title) -> bool {
        self.0.contains(&title)
    }

    pub fn is_all(&self) -> bool {
        self.0.len() == Title::ALL.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Title> + '_ {
        self.0.iter().copied()
    }

    /// Canonical sorted key used for search-outcome caching, e.g. `GM,IM`.
    pub fn cache_key(&self) -> String {
        let mut codes: Vec<&str> = self.0.iter().map(|t| t.as_str()).collect();
        codes.sort_unstable();
        codes.join(",")
    }
}

impl Default for TitleSet {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for TitleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            f.write_str("all titles")
        } else {
            f.write_str(&self.cache_key())
        }
    }
}

/// Recognised title codes in a raw title string.
///
/// Tokens are split on `/`, `,` and whitespace. When no token is a known code the
/// trimmed string is scanned for any code it equals or contains, which catches
/// concatenated values such as `"GMIM"`.
pub fn parse_titles(raw: &str) -> BTreeSet<Title> {
    let normalized = raw.trim().to_ascii_uppercase();
    if normalized.is_empty() {
        return BTreeSet::new();
    }

    let tokens: BTreeSet<Title> = normalized
        .split(|c: char| c == '/' || c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(Title::from_token)
        .collect();
    if !tokens.is_empty() {
        return tokens;
    }

    Title::ALL
        .iter()
        .copied()
        .filter(|t| normalized == t.as_str() || normalized.contains(t.as_str()))
        .collect()
}

/// Whether `record` denotes a titled player.
///
/// With `exact` the record must carry a title in `titles`. Without it any
/// non-empty title string counts, even one with no recognised code: this is the
/// permissive heuristic used when any title at all should end a branch.
/// The name prefix (`"GM "`, ...) is only consulted when the title field is empty.
pub fn is_titled_player(record: Option<&PlayerRecord>, titles: &TitleSet, exact: bool) -> bool {
    let Some(record) = record else {
        return false;
    };

    if !record.title.trim().is_empty() {
        if !exact {
            return true;
        }
        return parse_titles(&record.title)
            .into_iter()
            .any(|t| titles.contains(t));
    }

    Title::ALL
        .iter()
        .filter(|t| !exact || titles.contains(**t))
        .any(|t| record.full_name.starts_with(&t.name_prefix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, name: &str) -> PlayerRecord {
        PlayerRecord {
            code: "1".into(),
            full_name: name.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    fn gm_only() -> TitleSet {
        TitleSet::new([Title::GM])
    }

    #[test]
    fn multi_title_string_matches_member() {
        let r = record("IM/GM", "Someone");
        assert!(is_titled_player(Some(&r), &gm_only(), true));
    }

    #[test]
    fn womens_title_is_not_open_title() {
        let r = record("WGM", "Someone");
        assert!(!is_titled_player(Some(&r), &gm_only(), true));
        assert!(is_titled_player(Some(&r), &TitleSet::all(), true));
    }

    #[test]
    fn parse_splits_on_separators() {
        let parsed = parse_titles(" im, fm / cm ");
        assert_eq!(
            parsed.into_iter().collect::<Vec<_>>(),
            vec![Title::IM, Title::FM, Title::CM]
        );
    }

    #[test]
    fn parse_falls_back_to_substring_scan() {
        let parsed = parse_titles("GMIM");
        assert!(parsed.contains(&Title::GM));
        assert!(parsed.contains(&Title::IM));
        assert!(parse_titles("Arbiter").is_empty());
    }

    #[test]
    fn unparsed_title_counts_only_when_permissive() {
        let r = record("Arbiter", "Someone");
        assert!(is_titled_player(Some(&r), &TitleSet::all(), false));
        assert!(!is_titled_player(Some(&r), &TitleSet::all(), true));
    }

    #[test]
    fn name_prefix_used_only_without_title() {
        let r = record("", "IM Jones, Alan");
        assert!(is_titled_player(Some(&r), &TitleSet::all(), true));
        assert!(!is_titled_player(Some(&r), &gm_only(), true));
        assert!(is_titled_player(Some(&r), &gm_only(), false));

        let r = record("", "Imogen Smith");
        assert!(!is_titled_player(Some(&r), &TitleSet::all(), false));
    }

    #[test]
    fn absent_record_is_never_titled() {
        assert!(!is_titled_player(None, &TitleSet::all(), false));
    }

    #[test]
    fn empty_filter_means_all_titles() {
        assert!(TitleSet::new([]).is_all());
        assert!(TitleSet::parse_list("").unwrap().is_all());
        assert_eq!(TitleSet::parse_list("im,gm").unwrap().cache_key(), "GM,IM");
        assert!(TitleSet::parse_list("XX").is_err());
    }
}
