//! XSPF playlist output.
//!
//! Tracks are emitted in the order of the harvested items. A track whose
//! probe produced nothing still appears, carrying only its `location`.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::{Component, Path};
use tracing::info;

use crate::config::OutputTarget;
use crate::model::{HarvestResult, MediaItem, TagRecord};

pub const XSPF_NAMESPACE: &str = "http://xspf.org/ns/0/";

/// One `<track>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XspfTrack {
    pub location: String,
    pub tags: TagRecord,
}

/// An assembled playlist, ready to serialize.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XspfPlaylist {
    pub title: Option<String>,
    pub tracks: Vec<XspfTrack>,
}

impl XspfPlaylist {
    /// Pairs items with their results by ordinal. Items without a result get
    /// a location-only track.
    pub fn assemble(
        items: &[MediaItem],
        results: &[HarvestResult],
        location_prefix: &str,
        title: Option<String>,
    ) -> Self {
        let tags_by_ordinal: HashMap<usize, &TagRecord> = results
            .iter()
            .map(|result| (result.ordinal, result.outcome.tags()))
            .collect();

        let mut ordered: Vec<&MediaItem> = items.iter().collect();
        ordered.sort_by_key(|item| item.ordinal);

        let tracks = ordered
            .into_iter()
            .map(|item| XspfTrack {
                location: format!("{}{}", location_prefix, encode_location(&item.path)),
                tags: tags_by_ordinal
                    .get(&item.ordinal)
                    .map(|tags| (*tags).clone())
                    .unwrap_or_default(),
            })
            .collect();

        Self { title, tracks }
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(xml, "<playlist xmlns=\"{}\" version=\"1\">", XSPF_NAMESPACE);
        if let Some(title) = &self.title {
            element(&mut xml, 1, "title", title);
        }
        if self.tracks.is_empty() {
            xml.push_str("  <trackList />\n");
        } else {
            xml.push_str("  <trackList>\n");
            for track in &self.tracks {
                xml.push_str("    <track>\n");
                element(&mut xml, 3, "location", &track.location);
                let tags = &track.tags;
                if let Some(title) = &tags.title {
                    element(&mut xml, 3, "title", title);
                }
                if let Some(artist) = &tags.artist {
                    element(&mut xml, 3, "creator", artist);
                }
                if let Some(album) = &tags.album {
                    element(&mut xml, 3, "album", album);
                }
                if let Some(num) = tags.track_number {
                    element(&mut xml, 3, "trackNum", &num.to_string());
                }
                if let Some(ms) = tags.duration_millis {
                    element(&mut xml, 3, "duration", &ms.to_string());
                }
                xml.push_str("    </track>\n");
            }
            xml.push_str("  </trackList>\n");
        }
        xml.push_str("</playlist>\n");
        xml
    }

    /// Writes the document to stdout or a file.
    pub fn write_to(&self, target: &OutputTarget) -> std::io::Result<()> {
        let xml = self.to_xml();
        match target {
            OutputTarget::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(xml.as_bytes())?;
                out.flush()
            }
            OutputTarget::File(path) => {
                std::fs::write(path, xml)?;
                info!(path = %path.display(), tracks = self.tracks.len(), "Playlist written");
                Ok(())
            }
        }
    }
}

fn element(xml: &mut String, depth: usize, name: &str, text: &str) {
    let _ = writeln!(
        xml,
        "{}<{name}>{}</{name}>",
        "  ".repeat(depth),
        escape_text(text),
        name = name
    );
}

pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Percent-encodes a path segment by segment, keeping `/` separators.
pub fn encode_location(path: &Path) -> String {
    let mut segments = Vec::new();
    let mut absolute = false;
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            Component::CurDir => {}
            Component::ParentDir => segments.push("..".to_string()),
            Component::Normal(part) => {
                segments.push(urlencoding::encode(&part.to_string_lossy()).into_owned())
            }
            Component::Prefix(prefix) => {
                segments.push(prefix.as_os_str().to_string_lossy().into_owned())
            }
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HarvestOutcome, MissReason};
    use std::path::PathBuf;

    #[test]
    fn test_encode_location() {
        assert_eq!(
            encode_location(Path::new("./Music/AC DC/01 #1.flac")),
            "Music/AC%20DC/01%20%231.flac"
        );
        assert_eq!(encode_location(Path::new("../up/a.mp3")), "../up/a.mp3");
        assert_eq!(encode_location(Path::new("/srv/m/ä.mp3")), "/srv/m/%C3%A4.mp3");
    }

    #[test]
    fn test_assemble_failed_item_keeps_location() {
        let items = MediaItem::from_paths(["a.mp3", "b c.mp3"]);
        let results = vec![
            HarvestResult {
                ordinal: 0,
                outcome: HarvestOutcome::Tagged(TagRecord {
                    title: Some("A".to_string()),
                    duration_millis: Some(125_400),
                    ..TagRecord::default()
                }),
            },
            HarvestResult {
                ordinal: 1,
                outcome: HarvestOutcome::missing(MissReason::TimedOut),
            },
        ];

        let playlist = XspfPlaylist::assemble(&items, &results, "file://", None);
        assert_eq!(playlist.tracks.len(), 2);
        assert_eq!(playlist.tracks[0].location, "file://a.mp3");
        assert_eq!(playlist.tracks[0].tags.duration_millis, Some(125_400));
        assert_eq!(playlist.tracks[1].location, "file://b%20c.mp3");
        assert!(playlist.tracks[1].tags.is_empty());
    }

    #[test]
    fn test_current_dir_scan_joins_prefix_cleanly() {
        let items = MediaItem::from_paths(["./a b.mp3", "./Disc 1/c.ogg"]);
        let results = vec![
            HarvestResult {
                ordinal: 0,
                outcome: HarvestOutcome::missing(MissReason::Disabled),
            },
            HarvestResult {
                ordinal: 1,
                outcome: HarvestOutcome::missing(MissReason::Disabled),
            },
        ];

        let playlist = XspfPlaylist::assemble(&items, &results, "http://host/m/", None);
        assert_eq!(playlist.tracks[0].location, "http://host/m/a%20b.mp3");
        assert_eq!(playlist.tracks[1].location, "http://host/m/Disc%201/c.ogg");
    }

    #[test]
    fn test_to_xml_layout() {
        let playlist = XspfPlaylist {
            title: Some("Mix & Match".to_string()),
            tracks: vec![XspfTrack {
                location: "a.mp3".to_string(),
                tags: TagRecord {
                    title: Some("<A>".to_string()),
                    artist: Some("Band".to_string()),
                    album: None,
                    track_number: Some(2),
                    duration_millis: Some(1000),
                },
            }],
        };

        let expected = "\
<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<playlist xmlns=\"http://xspf.org/ns/0/\" version=\"1\">
  <title>Mix &amp; Match</title>
  <trackList>
    <track>
      <location>a.mp3</location>
      <title>&lt;A&gt;</title>
      <creator>Band</creator>
      <trackNum>2</trackNum>
      <duration>1000</duration>
    </track>
  </trackList>
</playlist>
";
        assert_eq!(playlist.to_xml(), expected);
    }

    #[test]
    fn test_empty_playlist() {
        let xml = XspfPlaylist::default().to_xml();
        assert!(xml.contains("<trackList />"));
        assert!(!xml.contains("<title>"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xspf");
        let playlist = XspfPlaylist::assemble(
            &[MediaItem::new(0, PathBuf::from("x.ogg"))],
            &[],
            "",
            None,
        );
        playlist.write_to(&OutputTarget::File(path.clone())).unwrap();
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("<location>x.ogg</location>"));
    }
}
