//! Version ordering for index release lists.
//!
//! Versions are ordered newest first. Numeric versions compare component by
//! component, then by their PEP 440 suffix: dev releases sort below alpha,
//! beta and rc, which sort below the final release, which sorts below its
//! post releases. A `+local` label sorts just above the same public version.
//! Anything that does not start with a number falls back to a plain string
//! comparison and sorts after every numeric version.

use std::cmp::Ordering;

/// Parsed form of a version string used only for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionKey {
    Numeric { release: Vec<u64>, suffix: Suffix },
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Alpha,
    Beta,
    Candidate,
}

/// Pre-release position. Variant order is the sort order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum PreRelease {
    /// A tail that is not a PEP 440 suffix, compared as text.
    Unrecognised(String),
    /// `1.0.dev1`: below every alpha of the same release.
    DevOnly,
    Tagged(Phase, u64),
    Final,
}

/// Dev marker. A version without one sorts above the same version with one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Dev {
    Marked(u64),
    Unmarked,
}

/// Whatever trails the numeric release, e.g. `rc1` in `2.0.0rc1`.
/// Field order is the comparison order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Suffix {
    pre: PreRelease,
    post: Option<u64>,
    dev: Dev,
    local: Option<String>,
}

impl Suffix {
    const FINAL: Suffix = Suffix {
        pre: PreRelease::Final,
        post: None,
        dev: Dev::Unmarked,
        local: None,
    };

    fn from_tail(tail: &str) -> Self {
        let tail = tail.to_ascii_lowercase();
        let (public, local) = match tail.split_once('+') {
            Some((public, local)) => (public, Some(local.to_string())),
            None => (tail.as_str(), None),
        };

        match Self::parse_public(public) {
            Some(mut suffix) => {
                suffix.local = local;
                suffix
            }
            None => Suffix {
                pre: PreRelease::Unrecognised(tail.clone()),
                ..Suffix::FINAL
            },
        }
    }

    /// Parses `rc1`, `.post2`, `a1.dev3`, `-1` and friends. `None` when the
    /// tail is not made of PEP 440 segments.
    fn parse_public(public: &str) -> Option<Self> {
        let mut suffix = Suffix::FINAL;
        let mut rest = public;

        loop {
            let had_separator = rest.starts_with(['.', '-', '_']);
            rest = rest.trim_start_matches(['.', '-', '_']);
            if rest.is_empty() {
                break;
            }

            let word_len =
                rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()).len();
            let (word, after_word) = rest.split_at(word_len);
            // `rc.1` and `post-2` put a separator between the tag and its number.
            let after_word = match after_word.strip_prefix(['.', '-', '_']) {
                Some(next) if !word.is_empty() && next.starts_with(|c: char| c.is_ascii_digit()) => {
                    next
                }
                _ => after_word,
            };
            let digits_len =
                after_word.len() - after_word.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            let (digits, after_digits) = after_word.split_at(digits_len);
            let number = if digits.is_empty() {
                0
            } else {
                digits.parse::<u64>().ok()?
            };

            match word {
                "a" | "alpha" => suffix.set_pre(Phase::Alpha, number)?,
                "b" | "beta" => suffix.set_pre(Phase::Beta, number)?,
                "c" | "rc" | "pre" | "preview" => suffix.set_pre(Phase::Candidate, number)?,
                "post" | "rev" | "r" => suffix.set_post(number)?,
                "dev" => {
                    if suffix.dev != Dev::Unmarked {
                        return None;
                    }
                    suffix.dev = Dev::Marked(number);
                }
                // `1.0-1` is an implicit post release.
                "" if had_separator && !digits.is_empty() => suffix.set_post(number)?,
                _ => return None,
            }
            rest = after_digits;
        }

        if suffix.dev != Dev::Unmarked && suffix.pre == PreRelease::Final && suffix.post.is_none() {
            suffix.pre = PreRelease::DevOnly;
        }
        Some(suffix)
    }

    fn set_pre(&mut self, phase: Phase, number: u64) -> Option<()> {
        if self.pre != PreRelease::Final || self.post.is_some() || self.dev != Dev::Unmarked {
            return None;
        }
        self.pre = PreRelease::Tagged(phase, number);
        Some(())
    }

    fn set_post(&mut self, number: u64) -> Option<()> {
        if self.post.is_some() || self.dev != Dev::Unmarked {
            return None;
        }
        self.post = Some(number);
        Some(())
    }
}

impl VersionKey {
    fn parse(version: &str) -> Self {
        let trimmed = version.trim();
        let body = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

        let mut release = Vec::new();
        let mut rest = body;
        loop {
            let digits = rest.len() - rest.trim_start_matches(|c: char| c.is_ascii_digit()).len();
            if digits == 0 {
                break;
            }
            let Ok(number) = rest[..digits].parse::<u64>() else {
                return VersionKey::Text(trimmed.to_string());
            };
            release.push(number);
            rest = &rest[digits..];

            // Continue only across a dot followed by another number.
            match rest.strip_prefix('.') {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        if release.is_empty() {
            VersionKey::Text(trimmed.to_string())
        } else {
            VersionKey::Numeric {
                release,
                suffix: Suffix::from_tail(rest),
            }
        }
    }
}

fn compare_release(a: &[u64], b: &[u64]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                VersionKey::Numeric {
                    release: ra,
                    suffix: sa,
                },
                VersionKey::Numeric {
                    release: rb,
                    suffix: sb,
                },
            ) => compare_release(ra, rb).then_with(|| sa.cmp(sb)),
            (VersionKey::Numeric { .. }, VersionKey::Text(_)) => Ordering::Greater,
            (VersionKey::Text(_), VersionKey::Numeric { .. }) => Ordering::Less,
            (VersionKey::Text(a), VersionKey::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compares two version strings, oldest first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionKey::parse(a).cmp(&VersionKey::parse(b))
}

/// Sorts versions newest first.
pub fn sort_versions_desc(versions: &mut [String]) {
    versions.sort_by(|a, b| compare_versions(b, a));
}
