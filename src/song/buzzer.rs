//! Output channels of the buzzer board.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of physical buzzers on the board.
pub const CHANNEL_COUNT: usize = 3;

/// One of the board's monophonic output lines, or `None` for unassigned notes.
///
/// Serialized by symbolic name (`"NONE"`, `"BUZZER_1"`, ...), never by value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Buzzer {
    #[default]
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "BUZZER_1")]
    Buzzer1,
    #[serde(rename = "BUZZER_2")]
    Buzzer2,
    #[serde(rename = "BUZZER_3")]
    Buzzer3,
}

impl Buzzer {
    /// Every variant, in declaration order.
    pub const ALL: [Buzzer; 4] = [
        Buzzer::None,
        Buzzer::Buzzer1,
        Buzzer::Buzzer2,
        Buzzer::Buzzer3,
    ];

    /// The physical channels, in the fixed order used by the scheduler and
    /// the device protocol.
    pub const CHANNELS: [Buzzer; CHANNEL_COUNT] =
        [Buzzer::Buzzer1, Buzzer::Buzzer2, Buzzer::Buzzer3];

    /// Position in [`Buzzer::ALL`].
    pub fn index(self) -> usize {
        match self {
            Buzzer::None => 0,
            Buzzer::Buzzer1 => 1,
            Buzzer::Buzzer2 => 2,
            Buzzer::Buzzer3 => 3,
        }
    }

    /// Position in [`Buzzer::CHANNELS`], `None` for the unassigned variant.
    pub fn channel_index(self) -> Option<usize> {
        match self {
            Buzzer::None => None,
            other => Some(other.index() - 1),
        }
    }

    /// Symbolic name used by the interchange format.
    pub fn name(self) -> &'static str {
        match self {
            Buzzer::None => "NONE",
            Buzzer::Buzzer1 => "BUZZER_1",
            Buzzer::Buzzer2 => "BUZZER_2",
            Buzzer::Buzzer3 => "BUZZER_3",
        }
    }
}

impl fmt::Display for Buzzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Buzzer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" | "0" => Ok(Buzzer::None),
            "BUZZER_1" | "1" => Ok(Buzzer::Buzzer1),
            "BUZZER_2" | "2" => Ok(Buzzer::Buzzer2),
            "BUZZER_3" | "3" => Ok(Buzzer::Buzzer3),
            other => Err(format!("unknown buzzer '{}'", other)),
        }
    }
}

/// Buzzer selector for contexts that accept "any channel".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuzzerFilter {
    #[default]
    Any,
    Only(Buzzer),
}

impl BuzzerFilter {
    pub fn matches(self, buzzer: Buzzer) -> bool {
        match self {
            BuzzerFilter::Any => true,
            BuzzerFilter::Only(wanted) => wanted == buzzer,
        }
    }
}

impl FromStr for BuzzerFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("any") {
            return Ok(BuzzerFilter::Any);
        }
        s.parse().map(BuzzerFilter::Only)
    }
}

/// Note count per buzzer, indexed by [`Buzzer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuzzerUsage([usize; 4]);

impl BuzzerUsage {
    pub fn record(&mut self, buzzer: Buzzer) {
        self.0[buzzer.index()] += 1;
    }

    pub fn total(&self) -> usize {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Buzzer, usize)> + '_ {
        Buzzer::ALL.iter().map(|b| (*b, self.0[b.index()]))
    }
}

impl Index<Buzzer> for BuzzerUsage {
    type Output = usize;

    fn index(&self, buzzer: Buzzer) -> &usize {
        &self.0[buzzer.index()]
    }
}

impl IndexMut<Buzzer> for BuzzerUsage {
    fn index_mut(&mut self, buzzer: Buzzer) -> &mut usize {
        &mut self.0[buzzer.index()]
    }
}

impl std::ops::AddAssign for BuzzerUsage {
    fn add_assign(&mut self, other: Self) {
        for (mine, theirs) in self.0.iter_mut().zip(other.0) {
            *mine += theirs;
        }
    }
}
