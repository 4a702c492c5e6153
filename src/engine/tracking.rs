use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Myanmar Standard Time, UTC+06:30. No daylight saving.
const REGION_OFFSET_MINUTES: i64 = 6 * 60 + 30;

pub const DEFAULT_PREFIX: &str = "MDY";

const PREFIX_LEN: usize = 3;
const TIMESTAMP_LEN: usize = 12;
const SUFFIX_LEN: usize = 2;
const TRACKING_ID_LEN: usize = PREFIX_LEN + TIMESTAMP_LEN + SUFFIX_LEN;

/// Lowercase needles per city, scanned in order; the first hit decides the prefix.
const CITY_PREFIXES: &[(&[&str], &str)] = &[
    (&["mandalay", "曼德勒"], "MDY"),
    (&["pyin oo lwin", "pyinoolwin", "maymyo", "彬乌伦"], "POL"),
    (&["yangon", "仰光"], "YGN"),
    (&["naypyidaw", "nay pyi taw", "内比都"], "NPW"),
    (&["taunggyi", "东枝"], "TGI"),
    (&["lashio", "腊戌"], "LSO"),
    (&["muse", "木姐"], "MSE"),
];

#[derive(Debug, Clone, Error, PartialEq)]
#[error("malformed tracking id: {0}")]
pub struct MalformedTrackingId(pub String);

/// `PPPYYYYMMDDHHmmRR`: city prefix, region civil time to the minute, two random digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingId(String);

impl TrackingId {
    pub fn parse(raw: &str) -> Result<Self, MalformedTrackingId> {
        let bytes = raw.as_bytes();
        let well_formed = bytes.len() == TRACKING_ID_LEN
            && bytes[..PREFIX_LEN].iter().all(u8::is_ascii_uppercase)
            && bytes[PREFIX_LEN..].iter().all(u8::is_ascii_digit);

        if well_formed {
            Ok(Self(raw.to_string()))
        } else {
            Err(MalformedTrackingId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn prefix(&self) -> &str {
        &self.0[..PREFIX_LEN]
    }

    /// Same prefix and minute, fresh random digits. Used after a key conflict.
    pub fn regenerate_suffix<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let stem = &self.0[..PREFIX_LEN + TIMESTAMP_LEN];
        Self(format!("{stem}{}", random_suffix(rng)))
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackingId {
    type Error = MalformedTrackingId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TrackingId::parse(&value)
    }
}

impl From<TrackingId> for String {
    fn from(value: TrackingId) -> Self {
        value.0
    }
}

pub fn city_prefix(sender_address: &str) -> &'static str {
    let haystack = sender_address.to_lowercase();

    CITY_PREFIXES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| haystack.contains(needle)))
        .map(|(_, prefix)| *prefix)
        .unwrap_or(DEFAULT_PREFIX)
}

pub fn generate<R: Rng + ?Sized>(
    sender_address: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> TrackingId {
    let civil = now.naive_utc() + Duration::minutes(REGION_OFFSET_MINUTES);

    TrackingId(format!(
        "{}{}{}",
        city_prefix(sender_address),
        civil.format("%Y%m%d%H%M"),
        random_suffix(rng)
    ))
}

fn random_suffix<R: Rng + ?Sized>(rng: &mut R) -> String {
    let first: u8 = rng.gen_range(0..10);
    let second: u8 = rng.gen_range(0..10);
    format!("{first}{second}")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn timestamp_is_rendered_in_myanmar_time() {
        // 18:00 UTC on new year's eve is 00:30 the next day in Mandalay.
        let now = Utc.with_ymd_and_hms(2024, 12, 31, 18, 0, 0).unwrap();
        let id = generate("No.1, 72nd St, Mandalay", now, &mut rng());

        assert_eq!(id.prefix(), "MDY");
        assert_eq!(&id.as_str()[3..15], "202501010030");
        assert!(TrackingId::parse(id.as_str()).is_ok());
    }

    #[test]
    fn prefix_comes_from_first_matching_city() {
        assert_eq!(city_prefix("32nd St, Mandalay"), "MDY");
        assert_eq!(city_prefix("Sule Pagoda Rd, YANGON"), "YGN");
        assert_eq!(city_prefix("仰光市"), "YGN");
        assert_eq!(city_prefix("Main Rd, Pyin Oo Lwin"), "POL");
        assert_eq!(city_prefix("Bogyoke Rd, Lashio"), "LSO");
        assert_eq!(city_prefix("Museum Rd, Mandalay"), "MDY");
        assert_eq!(city_prefix("Somewhere unknown"), DEFAULT_PREFIX);
        assert_eq!(city_prefix(""), DEFAULT_PREFIX);
    }

    #[test]
    fn regenerated_suffix_keeps_prefix_and_minute() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 0).unwrap();
        let mut rng = rng();
        let id = generate("Taunggyi", now, &mut rng);
        let retry = id.regenerate_suffix(&mut rng);

        assert_eq!(&retry.as_str()[..15], &id.as_str()[..15]);
        assert!(TrackingId::parse(retry.as_str()).is_ok());
    }

    #[test]
    fn parse_rejects_malformed_ids() {
        assert!(TrackingId::parse("MDY20250101003012").is_ok());
        assert!(TrackingId::parse("mdy20250101003012").is_err());
        assert!(TrackingId::parse("MDY2025010100301").is_err());
        assert!(TrackingId::parse("MD120250101003012").is_err());
        assert!(TrackingId::parse("MDY2025010100301X").is_err());
    }

    #[test]
    fn tracking_id_serializes_as_plain_string() {
        let id = TrackingId::parse("YGN20250101003012").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), "YGN20250101003012");
        assert!(serde_json::from_value::<TrackingId>(serde_json::json!("bogus")).is_err());
    }
}
