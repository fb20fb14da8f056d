use reelgen_domain::ReelError;
use reelgen_infrastructure::{ExportBundler, PreviewAsset};
use reelgen_testing_utils::ReelBuilder;
use std::io::{Cursor, Read};

fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).unwrap();
    contents
}

#[test]
fn test_single_reel_bundle_contents() {
    let reel = ReelBuilder::new().with_id("r1").build();
    let before = reel.clone();
    let bytes = ExportBundler::export_reel(&reel).unwrap();

    let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    assert_eq!(archive.len(), 3);

    let caption = String::from_utf8(read_entry(&bytes, "caption-r1.txt")).unwrap();
    assert_eq!(
        caption,
        format!("{}\n\n{}", reel.caption, reel.hashtags.join(" "))
    );

    let overlay: serde_json::Value =
        serde_json::from_slice(&read_entry(&bytes, "overlay-r1.json")).unwrap();
    assert_eq!(overlay["version"], "1.0");
    assert_eq!(overlay["duration"], 15);

    let video = read_entry(&bytes, "reel-r1.mp4");
    assert_eq!(video, PreviewAsset::placeholder_bytes().unwrap());

    assert_eq!(reel, before);
}

#[test]
fn test_batch_bundle_takes_first_three() {
    let reels: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|id| ReelBuilder::new().with_id(id).build())
        .collect();
    let bytes = ExportBundler::export_batch(&reels).unwrap();

    let archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
    assert_eq!(archive.len(), 9);
    let names: Vec<&str> = archive.file_names().collect();
    assert!(names.contains(&"a/video.mp4"));
    assert!(names.contains(&"c/overlay.json"));
    assert!(!names.iter().any(|n| n.starts_with("d/")));

    let caption = String::from_utf8(read_entry(&bytes, "b/caption.txt")).unwrap();
    assert!(caption.contains("\n\n#"));
}

#[test]
fn test_batch_bundle_rejects_empty_input() {
    assert!(matches!(
        ExportBundler::export_batch(&[]),
        Err(ReelError::Validation(_))
    ));
}
