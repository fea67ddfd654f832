//! Visibility and modifier keywords.
//!
//! `Modifier` derives `Ord` in canonical write order, so a `BTreeSet` of
//! modifiers always iterates in the order the writer emits them.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared visibility of a class or member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    PackagePrivate,
    Private,
}

impl Visibility {
    /// Keyword as written in signature files (`None` for package-private).
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            Visibility::Public => Some("public"),
            Visibility::Protected => Some("protected"),
            Visibility::Private => Some("private"),
            Visibility::PackagePrivate => None,
        }
    }

    /// Parse a visibility keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            "internal" => Some(Visibility::PackagePrivate),
            _ => None,
        }
    }

    /// Whether items with this visibility are part of an API surface.
    pub fn is_api(self) -> bool {
        matches!(self, Visibility::Public | Visibility::Protected)
    }

    /// Name used by the JDiff `visibility` attribute.
    pub fn jdiff_name(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
            Visibility::PackagePrivate => "",
        }
    }
}

/// Non-visibility modifier keyword.
///
/// Variant order is the canonical write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Default,
    Static,
    Final,
    Abstract,
    Sealed,
    Transient,
    Volatile,
    Synchronized,
    Native,
    Strictfp,
    Fun,
    Data,
    Value,
    Inline,
    Infix,
    Operator,
    Suspend,
}

impl Modifier {
    /// All modifiers, in canonical order.
    pub const ALL: [Modifier; 17] = [
        Modifier::Default,
        Modifier::Static,
        Modifier::Final,
        Modifier::Abstract,
        Modifier::Sealed,
        Modifier::Transient,
        Modifier::Volatile,
        Modifier::Synchronized,
        Modifier::Native,
        Modifier::Strictfp,
        Modifier::Fun,
        Modifier::Data,
        Modifier::Value,
        Modifier::Inline,
        Modifier::Infix,
        Modifier::Operator,
        Modifier::Suspend,
    ];

    /// Keyword as written in signature files.
    pub fn keyword(self) -> &'static str {
        match self {
            Modifier::Default => "default",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
            Modifier::Sealed => "sealed",
            Modifier::Transient => "transient",
            Modifier::Volatile => "volatile",
            Modifier::Synchronized => "synchronized",
            Modifier::Native => "native",
            Modifier::Strictfp => "strictfp",
            Modifier::Fun => "fun",
            Modifier::Data => "data",
            Modifier::Value => "value",
            Modifier::Inline => "inline",
            Modifier::Infix => "infix",
            Modifier::Operator => "operator",
            Modifier::Suspend => "suspend",
        }
    }

    /// Parse a modifier keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        Modifier::ALL.into_iter().find(|m| m.keyword() == word)
    }

    /// Modifiers that are only written in compatibility mode.
    pub fn is_compat_only(self) -> bool {
        matches!(
            self,
            Modifier::Default | Modifier::Synchronized | Modifier::Native | Modifier::Strictfp
        )
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Visibility plus the set of modifier keywords of one item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierSet {
    pub visibility: Visibility,
    flags: BTreeSet<Modifier>,
}

impl ModifierSet {
    /// Create a modifier set with the given visibility and no flags.
    pub fn new(visibility: Visibility) -> Self {
        ModifierSet {
            visibility,
            flags: BTreeSet::new(),
        }
    }

    /// Builder-style flag insertion.
    pub fn with(mut self, modifier: Modifier) -> Self {
        self.flags.insert(modifier);
        self
    }

    pub fn insert(&mut self, modifier: Modifier) {
        self.flags.insert(modifier);
    }

    pub fn remove(&mut self, modifier: Modifier) {
        self.flags.remove(&modifier);
    }

    pub fn has(&self, modifier: Modifier) -> bool {
        self.flags.contains(&modifier)
    }

    pub fn is_static(&self) -> bool {
        self.has(Modifier::Static)
    }

    pub fn is_final(&self) -> bool {
        self.has(Modifier::Final)
    }

    pub fn is_abstract(&self) -> bool {
        self.has(Modifier::Abstract)
    }

    /// Modifier flags in canonical order.
    pub fn flags(&self) -> impl Iterator<Item = Modifier> + '_ {
        self.flags.iter().copied()
    }

    /// Render keywords in canonical order: visibility, then flags.
    ///
    /// Compat-only flags are skipped unless `compat` is set.
    pub fn keywords(&self, compat: bool) -> Vec<&'static str> {
        let mut words = Vec::new();
        if let Some(vis) = self.visibility.keyword() {
            words.push(vis);
        }
        words.extend(
            self.flags()
                .filter(|m| compat || !m.is_compat_only())
                .map(Modifier::keyword),
        );
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_canonical_regardless_of_insertion_order() {
        let mut set = ModifierSet::new(Visibility::Public);
        set.insert(Modifier::Abstract);
        set.insert(Modifier::Final);
        set.insert(Modifier::Static);
        assert_eq!(set.keywords(false), vec!["public", "static", "final", "abstract"]);
    }

    #[test]
    fn compat_only_flags_are_filtered() {
        let set = ModifierSet::new(Visibility::Protected)
            .with(Modifier::Synchronized)
            .with(Modifier::Native)
            .with(Modifier::Final);
        assert_eq!(set.keywords(false), vec!["protected", "final"]);
        assert_eq!(
            set.keywords(true),
            vec!["protected", "final", "synchronized", "native"]
        );
    }

    #[test]
    fn keyword_round_trip() {
        for m in Modifier::ALL {
            assert_eq!(Modifier::from_keyword(m.keyword()), Some(m));
        }
        assert_eq!(Modifier::from_keyword("deprecated"), None);
    }

    #[test]
    fn package_private_has_no_keyword() {
        let set = ModifierSet::new(Visibility::PackagePrivate).with(Modifier::Static);
        assert_eq!(set.keywords(false), vec!["static"]);
        assert!(!Visibility::PackagePrivate.is_api());
    }
}
