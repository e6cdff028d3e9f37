//! Queue provenance
//!
//! Describes where the current queue came from. Persisted as a short text
//! token (`playlist:42`, `search:albums:night drive`, ...). Decoding is
//! lenient on purpose: anything unparseable becomes [`QueueSource::Unknown`]
//! so a format change never blocks session restore.

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Which search backend produced a search-based queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchVariant {
    Audios,
    Artists,
    Albums,
}

impl SearchVariant {
    fn as_str(self) -> &'static str {
        match self {
            SearchVariant::Audios => "audios",
            SearchVariant::Artists => "artists",
            SearchVariant::Albums => "albums",
        }
    }
}

impl FromStr for SearchVariant {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audios" => Ok(SearchVariant::Audios),
            "artists" => Ok(SearchVariant::Artists),
            "albums" => Ok(SearchVariant::Albums),
            _ => Err(()),
        }
    }
}

/// Where the current queue came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum QueueSource {
    #[default]
    Unknown,
    SingleAudio,
    Artist,
    Album,
    Playlist(i64),
    SearchQuery {
        value: String,
        variant: SearchVariant,
    },
    Downloads,
}

impl QueueSource {
    /// Decode a persisted token, falling back to `Unknown`
    pub fn decode(token: Option<&str>) -> Self {
        token
            .and_then(|t| t.parse().ok())
            .unwrap_or(QueueSource::Unknown)
    }

    /// Text for UI captions, if the source carries one
    pub fn display_value(&self) -> Option<&str> {
        match self {
            QueueSource::SearchQuery { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for QueueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueSource::Unknown => f.write_str("unknown"),
            QueueSource::SingleAudio => f.write_str("single"),
            QueueSource::Artist => f.write_str("artist"),
            QueueSource::Album => f.write_str("album"),
            QueueSource::Playlist(id) => write!(f, "playlist:{id}"),
            QueueSource::SearchQuery { value, variant } => {
                write!(f, "search:{}:{value}", variant.as_str())
            }
            QueueSource::Downloads => f.write_str("downloads"),
        }
    }
}

impl FromStr for QueueSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let kind = parts.next().ok_or(())?;
        let source = match kind {
            "unknown" => QueueSource::Unknown,
            "single" => QueueSource::SingleAudio,
            "artist" => QueueSource::Artist,
            "album" => QueueSource::Album,
            "downloads" => QueueSource::Downloads,
            "playlist" => {
                let id = parts.next().ok_or(())?.parse().map_err(|_| ())?;
                QueueSource::Playlist(id)
            }
            "search" => {
                let variant = parts.next().ok_or(())?.parse()?;
                let value = parts.next().ok_or(())?.to_string();
                QueueSource::SearchQuery { value, variant }
            }
            _ => return Err(()),
        };
        Ok(source)
    }
}

impl Serialize for QueueSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QueueSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LenientSourceVisitor)
    }
}

struct LenientSourceVisitor;

impl<'de> Visitor<'de> for LenientSourceVisitor {
    type Value = QueueSource;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a queue source token")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(QueueSource::decode(Some(v)))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(QueueSource::Unknown)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(QueueSource::Unknown)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(QueueSource::Unknown)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<Self::Value, E> {
        Ok(QueueSource::Unknown)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<Self::Value, E> {
        Ok(QueueSource::Unknown)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<Self::Value, E> {
        Ok(QueueSource::Unknown)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(QueueSource::Unknown)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(QueueSource::Unknown)
    }
}
