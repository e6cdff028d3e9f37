//! Catalog loading for the terminal host

use serde::Deserialize;
use soul_session::{AudioMetadata, CatalogResolver};
use std::path::Path;
use std::time::Duration;

/// One catalog entry as stored on disk
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    title: String,
    #[serde(default)]
    artist: String,
    #[serde(default)]
    album: Option<String>,
    #[serde(default)]
    duration_secs: Option<u64>,
    #[serde(default)]
    uri: Option<String>,
}

impl From<CatalogEntry> for AudioMetadata {
    fn from(entry: CatalogEntry) -> Self {
        let mut audio = AudioMetadata::new(entry.id, entry.title);
        audio.artist = entry.artist;
        audio.album = entry.album;
        audio.duration = entry.duration_secs.map(Duration::from_secs);
        if let Some(uri) = entry.uri {
            audio.uri = uri;
        }
        audio
    }
}

/// Parse a JSON array of catalog entries
pub fn parse(data: &str) -> anyhow::Result<Vec<AudioMetadata>> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(data)?;
    Ok(entries.into_iter().map(AudioMetadata::from).collect())
}

/// Load the catalog at `path`, or the demo catalog when no path is given
pub async fn load(path: Option<&Path>) -> anyhow::Result<CatalogResolver> {
    let audios = match path {
        Some(path) => {
            let data = tokio::fs::read_to_string(path).await?;
            parse(&data)?
        }
        None => demo(),
    };
    tracing::info!("Catalog loaded: {} entries", audios.len());
    Ok(CatalogResolver::new(audios))
}

/// Short tracks so queue transitions are visible quickly
fn demo() -> Vec<AudioMetadata> {
    [
        ("t1", "Opening", 20),
        ("t2", "Second Wind", 25),
        ("t3", "Interlude", 12),
        ("t4", "Long Road", 40),
        ("t5", "Closing", 18),
    ]
    .into_iter()
    .map(|(id, title, secs)| {
        let mut audio = AudioMetadata::new(id, title);
        audio.artist = "Demo Artist".to_string();
        audio.album = Some("Demo Album".to_string());
        audio.duration = Some(Duration::from_secs(secs));
        audio
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries_with_optional_fields() {
        let audios = parse(
            r#"[
                {"id": "a", "title": "Alpha", "artist": "X", "duration_secs": 90},
                {"id": "b", "title": "Beta", "uri": "https://cdn/b.mp3"}
            ]"#,
        )
        .unwrap();

        assert_eq!(audios.len(), 2);
        assert_eq!(audios[0].artist, "X");
        assert_eq!(audios[0].duration, Some(Duration::from_secs(90)));
        assert_eq!(audios[0].uri, "a");
        assert_eq!(audios[1].uri, "https://cdn/b.mp3");
        assert_eq!(audios[1].duration, None);
    }

    #[test]
    fn rejects_malformed_catalog() {
        assert!(parse("{\"id\": \"a\"}").is_err());
    }

    #[tokio::test]
    async fn demo_catalog_when_no_path() {
        let catalog = load(None).await.unwrap();
        assert_eq!(catalog.len(), 5);
    }
}
