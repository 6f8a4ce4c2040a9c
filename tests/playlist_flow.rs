//! Scan → harvest → XSPF, with probing disabled so no external tool is needed.

use std::fs;
use std::sync::Arc;

use xspf_harvester::harvest::formats::XspfPlaylist;
use xspf_harvester::harvest::{FfprobeInvoker, HarvestCoordinator, TerminalProgress};
use xspf_harvester::{HarvestConfig, MediaScanner, MissReason};

#[tokio::test]
async fn test_locations_only_playlist() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("Side A")).unwrap();
    fs::write(dir.path().join("Side A/01 Intro.flac"), b"").unwrap();
    fs::write(dir.path().join("Side A/02 Outro.mp3"), b"").unwrap();
    fs::write(dir.path().join("Side A/cover.jpg"), b"").unwrap();

    let config = HarvestConfig {
        metadata: false,
        location_prefix: "file://".to_string(),
        title: Some("Side A".to_string()),
        ..HarvestConfig::default()
    };
    config.validate().unwrap();

    let items = MediaScanner::new(&config.extensions).scan(dir.path()).unwrap();
    assert_eq!(items.len(), 2);

    // The probe binary is never spawned in this mode.
    let coordinator = HarvestCoordinator::new(
        FfprobeInvoker::new("/nonexistent/ffprobe"),
        config.concurrency,
    )
    .unwrap()
    .with_metadata(config.metadata);
    let progress = Arc::new(TerminalProgress::new(items.len(), std::io::sink()));

    let results = coordinator
        .harvest(items.clone(), Arc::clone(&progress))
        .await
        .unwrap();
    assert_eq!(progress.completed(), 2);
    assert!(results
        .iter()
        .all(|r| r.outcome.miss_reason() == Some(MissReason::Disabled)));

    let playlist = XspfPlaylist::assemble(
        &items,
        &results,
        &config.location_prefix,
        config.title.clone(),
    );
    let xml = playlist.to_xml();

    let intro = xml.find("01%20Intro.flac").unwrap();
    let outro = xml.find("02%20Outro.mp3").unwrap();
    assert!(intro < outro);
    assert!(xml.contains("Side%20A/01%20Intro.flac</location>"));
    assert!(xml.contains("<title>Side A</title>"));
    assert!(!xml.contains("cover.jpg"));
    assert!(!xml.contains("<duration>"));
    assert_eq!(xml.matches("<location>file://").count(), 2);
}
