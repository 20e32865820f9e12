//! Routing table from pre-separation stems to main-separator stems.
//!
//! The table is built from the stem names a model bundle declares. Each
//! stem gets a default [`MergeTarget`] guessed from its name, and one stem
//! is chosen as the audio that feeds the main separator.

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::{ConvertError, Result};

/// Main-separator stem a pre-separation stem is merged into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergeTarget {
    None,
    Vocals,
    Drums,
    Bass,
    Other,
    Guitar,
    Piano,
}

impl MergeTarget {
    pub const ALL: [MergeTarget; 7] = [
        MergeTarget::None,
        MergeTarget::Vocals,
        MergeTarget::Drums,
        MergeTarget::Bass,
        MergeTarget::Other,
        MergeTarget::Guitar,
        MergeTarget::Piano,
    ];

    /// File stem of the main-separator output this target refers to.
    pub fn stem_name(self) -> Option<&'static str> {
        match self {
            MergeTarget::None => None,
            MergeTarget::Vocals => Some("vocals"),
            MergeTarget::Drums => Some("drums"),
            MergeTarget::Bass => Some("bass"),
            MergeTarget::Other => Some("other"),
            MergeTarget::Guitar => Some("guitar"),
            MergeTarget::Piano => Some("piano"),
        }
    }
}

impl fmt::Display for MergeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem_name().unwrap_or("none"))
    }
}

impl FromStr for MergeTarget {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        MergeTarget::ALL
            .into_iter()
            .find(|t| t.to_string() == wanted)
            .ok_or_else(|| ConvertError::Settings(format!("unknown merge target `{s}`")))
    }
}

/// Guesses where a pre-separation stem belongs from its name.
pub fn default_target(stem: &str) -> MergeTarget {
    let lower = stem.to_lowercase();
    if lower.contains("speech") || lower.contains("vocal") {
        MergeTarget::Vocals
    } else if lower.contains("drum") {
        MergeTarget::Drums
    } else if lower.contains("bass") {
        MergeTarget::Bass
    } else if lower.contains("guitar") {
        MergeTarget::Guitar
    } else if lower.contains("piano") {
        MergeTarget::Piano
    } else {
        MergeTarget::None
    }
}

/// Two-pass lookup: exact key first, then the first key (in map order)
/// containing `wanted` as a substring.
pub fn resolve_stem<'a, V>(map: &'a BTreeMap<String, V>, wanted: &str) -> Option<(&'a str, &'a V)> {
    if let Some((k, v)) = map.get_key_value(wanted) {
        return Some((k.as_str(), v));
    }
    map.iter()
        .find(|(k, _)| k.contains(wanted))
        .map(|(k, v)| (k.as_str(), v))
}

const FALLBACK_PRIMARY: &str = "music";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StemRouting {
    primary: String,
    routes: Vec<(String, MergeTarget)>,
}

impl StemRouting {
    /// Builds the default table for a bundle's declared stems, keeping their order.
    pub fn from_stems<S: AsRef<str>>(stems: &[S]) -> Self {
        let primary = if stems.iter().any(|s| s.as_ref() == FALLBACK_PRIMARY) {
            FALLBACK_PRIMARY.to_string()
        } else {
            stems
                .first()
                .map(|s| s.as_ref().to_string())
                .unwrap_or_else(|| FALLBACK_PRIMARY.to_string())
        };

        let routes = stems
            .iter()
            .map(|s| (s.as_ref().to_string(), default_target(s.as_ref())))
            .collect();

        Self { primary, routes }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn set_primary(&mut self, stem: &str) -> Result<()> {
        let idx = self.position(stem)?;
        self.primary = self.routes[idx].0.clone();
        Ok(())
    }

    pub fn set_target(&mut self, stem: &str, target: MergeTarget) -> Result<()> {
        let idx = self.position(stem)?;
        self.routes[idx].1 = target;
        Ok(())
    }

    pub fn target(&self, stem: &str) -> Option<MergeTarget> {
        self.position(stem).ok().map(|idx| self.routes[idx].1)
    }

    /// All routes in declared stem order, including `None` targets.
    pub fn routes(&self) -> impl Iterator<Item = (&str, MergeTarget)> {
        self.routes.iter().map(|(s, t)| (s.as_str(), *t))
    }

    pub fn has_merges(&self) -> bool {
        self.routes.iter().any(|(_, t)| *t != MergeTarget::None)
    }

    fn position(&self, stem: &str) -> Result<usize> {
        self.routes
            .iter()
            .position(|(s, _)| s == stem)
            .or_else(|| {
                self.routes
                    .iter()
                    .position(|(s, _)| s.eq_ignore_ascii_case(stem))
            })
            .ok_or_else(|| ConvertError::UnknownStem {
                stem: stem.to_string(),
            })
    }
}
