use pixbench::corpus::{collect_files, dedup};

mod helper;
use helper::TestRig;

#[test]
fn collection_filters_extensions_and_empty_files() {
    let rig = TestRig::new();
    rig.image("a.png", b"A");
    rig.image("b.JPG", b"B");
    rig.image("deep/nested/c.bmp", b"C");
    rig.image("readme.md", b"not an image");
    rig.image("zero.png", b"");

    let mut names: Vec<String> = collect_files(&rig.corpus)
        .unwrap()
        .into_iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["a.png", "b.JPG", "c.bmp"]);
}

#[test]
fn identical_content_under_different_names_yields_one_record() {
    let rig = TestRig::new();
    let first = rig.image("a.png", b"SAME-BYTES");
    rig.image("sub/b.png", b"SAME-BYTES");

    let unique = dedup(vec![first.clone(), rig.corpus.join("sub/b.png")]);
    assert_eq!(unique.len(), 1);
    // First-seen order decides which duplicate survives.
    assert_eq!(unique[0].path, first);
}

#[test]
fn equal_sizes_with_different_content_are_distinct() {
    let rig = TestRig::new();
    let a = rig.image("a.png", b"AAAA");
    let b = rig.image("b.png", b"BBBB");

    let unique = dedup(vec![a, b]);
    assert_eq!(unique.len(), 2);
    assert_ne!(unique[0].hash, unique[1].hash);
    assert_eq!(unique[0].size, unique[1].size);
}

#[test]
fn colliding_base_names_stay_distinct_in_the_testbed() {
    let rig = TestRig::new();
    let a = rig.image("x/cat.png", b"FIRST-CAT");
    let b = rig.image("y/cat.png", b"SECOND-CAT-BYTES");

    let unique = dedup(vec![a, b]);
    assert_eq!(unique.len(), 2);
    assert_eq!(unique[0].name, "cat.png");
    assert_eq!(unique[1].name, "cat-1.png");
}
