use serde::{Deserialize, Serialize};

/// The fixed set of mood labels an entry can carry.
///
/// Declaration order is significant: aggregation buckets and chart labels
/// follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Joyful,
    Sad,
    Angry,
    Calm,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Joyful, Mood::Sad, Mood::Angry, Mood::Calm];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Joyful => "joyful",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Calm => "calm",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Joyful => "😊",
            Self::Sad => "😢",
            Self::Angry => "😡",
            Self::Calm => "😌",
        }
    }

    /// Slot of this mood in `Mood::ALL`
    pub fn index(&self) -> usize {
        match self {
            Self::Joyful => 0,
            Self::Sad => 1,
            Self::Angry => 2,
            Self::Calm => 3,
        }
    }

    /// Parse a stored mood label. Accepts the lowercase label in any case and
    /// the emoji form older clients wrote. Anything else is unrecognized.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(raw) || m.emoji() == raw)
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            format!(
                "{} is not a mood. Use one of: joyful, sad, angry, calm.",
                s
            )
        })
    }
}
