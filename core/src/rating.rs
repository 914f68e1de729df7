use serde::{Deserialize, Serialize};

/// Sentiment attached to a listing or a tag ("balcony" is positive, "busy
/// road" is negative). Shared by properties and tags so exported tag values
/// round-trip without a separate scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Positive => "positive",
            Rating::Neutral => "neutral",
            Rating::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Apartment,
    House,
    Studio,
    Room,
    #[default]
    Other,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Apartment => "apartment",
            PropertyKind::House => "house",
            PropertyKind::Studio => "studio",
            PropertyKind::Room => "room",
            PropertyKind::Other => "other",
        }
    }
}

impl std::fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_serializes_lowercase() {
        let json = serde_json::to_string(&Rating::Positive).expect("serialize rating");
        assert_eq!(json, "\"positive\"");

        let parsed: Rating = serde_json::from_str("\"negative\"").expect("parse rating");
        assert_eq!(parsed, Rating::Negative);
    }

    #[test]
    fn defaults_are_neutral_and_other() {
        assert_eq!(Rating::default(), Rating::Neutral);
        assert_eq!(PropertyKind::default(), PropertyKind::Other);
    }
}
