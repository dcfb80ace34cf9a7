use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SizingError;

/// Canonical stats group: the join key across every data source.
///
/// Names are matched exactly (after trimming). Anything outside this set is
/// rejected at parse time so a typo in a mapping table fails the run up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Brandy,
    Gin,
    Vodka,
    Liqueurs,
    Whisky,
    Rum,
    Cane,
    Tequila,
    OtherSpirits,
    Beer,
    SparklingWine,
    StillWine,
    WineAperitif,
    FortifiedWine,
    FortifiedWine1,
    FortifiedWine2,
    CiderAndRtds,
    Ciders,
    Fabs,
    OtherFlavouredBeverages,
}

impl Category {
    pub const ALL: [Category; 20] = [
        Self::Brandy,
        Self::Gin,
        Self::Vodka,
        Self::Liqueurs,
        Self::Whisky,
        Self::Rum,
        Self::Cane,
        Self::Tequila,
        Self::OtherSpirits,
        Self::Beer,
        Self::SparklingWine,
        Self::StillWine,
        Self::WineAperitif,
        Self::FortifiedWine,
        Self::FortifiedWine1,
        Self::FortifiedWine2,
        Self::CiderAndRtds,
        Self::Ciders,
        Self::Fabs,
        Self::OtherFlavouredBeverages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brandy => "Brandy",
            Self::Gin => "Gin",
            Self::Vodka => "Vodka",
            Self::Liqueurs => "Liqueurs",
            Self::Whisky => "Whisky",
            Self::Rum => "Rum",
            Self::Cane => "Cane",
            Self::Tequila => "Tequila",
            Self::OtherSpirits => "Other Spirits",
            Self::Beer => "Beer",
            Self::SparklingWine => "Sparkling Wine",
            Self::StillWine => "Still Wine",
            Self::WineAperitif => "Wine Aperitif",
            Self::FortifiedWine => "Fortified Wine",
            Self::FortifiedWine1 => "Fortified Wine 1",
            Self::FortifiedWine2 => "Fortified Wine 2",
            Self::CiderAndRtds => "CIDER & RTDs",
            Self::Ciders => "Ciders",
            Self::Fabs => "FABs",
            Self::OtherFlavouredBeverages => "Other Flavoured Beverages",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SizingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| SizingError::UnknownCategory(name.to_string()))
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// Via String so the same impl works for TOML table keys and values.
impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}
