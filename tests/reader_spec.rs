use std::fs;
use std::io::Cursor;

use byteorder::{LittleEndian, WriteBytesExt};
use kw6_reader::{Kw6Error, Kw6Version, Position, Reader, Slice};

/// Frame indices carried by the three positions of the sample file.
const FRAMES: [u64; 3] = [100, 105, 110];

/// Grayscale fill bytes, one per camera: position 0 carries 10 and 20,
/// position 1 carries 30 and 40, position 2 carries 50 and 60.
fn fills_for(position: usize) -> [u8; 2] {
    let base = (position as u8 * 2 + 1) * 10;
    [base, base + 10]
}

fn push_doubles(buf: &mut Vec<u8>, values: &[f64]) {
    for v in values {
        buf.write_f64::<LittleEndian>(*v).expect("write double");
    }
}

fn push_camera(buf: &mut Vec<u8>, camera_index: u32, fill: u8) {
    let mut fields = vec![
        1.0,
        camera_index as f64,
        0.2,
        0.1,
        0.0,
        0.0,
        2.0,
        2.0,
        1.0,
        0.5,
        0.0,
        0.0,
        4.0,
        4.0,
    ];
    fields.extend([0.0; 20]);
    push_doubles(buf, &fields);
    buf.extend(std::iter::repeat(fill).take(16));
}

fn push_position(buf: &mut Vec<u8>, frame_index: u64, time: f64, fills: &[u8]) {
    let n_frame_bytes = (6 * 8 + fills.len() * (34 * 8 + 16)) as f64;
    push_doubles(
        buf,
        &[
            n_frame_bytes,
            1.0,
            frame_index as f64,
            time,
            frame_index as f64 * 10.0,
            fills.len() as f64,
        ],
    );
    for (cam, fill) in fills.iter().enumerate() {
        push_camera(buf, cam as u32, *fill);
    }
}

/// Builds the standard three-position sample file, returning the bytes and
/// the byte offset of each position.
fn sample_file_with_offsets() -> (Vec<u8>, Vec<u64>) {
    let mut buf = b"KW6FileClassVer1.0 ".to_vec();
    let mut offsets = Vec::new();
    for (i, frame) in FRAMES.iter().enumerate() {
        offsets.push(buf.len() as u64);
        push_position(&mut buf, *frame, i as f64 * 0.1, &fills_for(i));
    }
    (buf, offsets)
}

fn sample_file() -> Vec<u8> {
    sample_file_with_offsets().0
}

fn sample_reader() -> Reader<Cursor<Vec<u8>>> {
    Reader::from_stream(Cursor::new(sample_file())).expect("open sample")
}

fn frames_of(positions: &[Position]) -> Vec<u64> {
    positions.iter().map(|p| p.header.frame_index).collect()
}

#[test]
fn reads_file_header() {
    let reader = sample_reader();
    assert_eq!(reader.header.version, Kw6Version::V1);
    assert_eq!(reader.header.version_string, "KW6FileClassVer1.0");
}

#[test]
fn counts_positions() {
    let mut reader = sample_reader();
    assert_eq!(reader.num_positions().expect("count"), 3);
    assert_eq!(reader.num_positions().expect("recount"), 3);
}

#[test]
fn decodes_position_images() {
    let mut reader = sample_reader();
    let position = reader.get(1).expect("get position 1");
    assert_eq!(position.header.frame_index, 105);
    assert_eq!(position.header.camera_count, 2);
    assert_eq!(position.cameras.len(), 2);
    for (cam, expected_fill) in position.cameras.iter().zip(fills_for(1)) {
        assert_eq!(cam.image.width(), 4);
        assert_eq!(cam.image.height(), 4);
        assert_eq!(cam.image.channels(), 1);
        assert!(cam.image.pixels().iter().all(|&p| p == expected_fill));
    }
    assert_eq!(position.cameras[0].header.camera_index, 0);
    assert_eq!(position.cameras[1].header.camera_index, 1);
}

#[test]
fn repeated_reads_are_identical() {
    let mut reader = sample_reader();
    let first = reader.get(0).expect("first read");
    let second = reader.get(0).expect("second read");
    assert_eq!(first, second);
}

#[test]
fn negative_indices_count_from_end() {
    let mut reader = sample_reader();
    let last = reader.get(-1).expect("get -1");
    assert_eq!(last.header.frame_index, 110);
    let first = reader.get(-3).expect("get -3");
    assert_eq!(first.header.frame_index, 100);
}

#[test]
fn out_of_range_indices_report_total() {
    let mut reader = sample_reader();
    let err = reader.get(3).unwrap_err();
    assert!(matches!(
        err,
        Kw6Error::IndexOutOfRange { index: 3, count: 3 }
    ));
    let err = reader.get(8).unwrap_err();
    assert!(matches!(
        err,
        Kw6Error::IndexOutOfRange { index: 8, count: 3 }
    ));
    let err = reader.get(-4).unwrap_err();
    assert!(matches!(
        err,
        Kw6Error::IndexOutOfRange {
            index: -4,
            count: 3
        }
    ));
}

#[test]
fn index_grows_lazily() {
    let mut reader = sample_reader();
    assert_eq!(reader.positions_discovered(), 0);
    reader.get(0).expect("get 0");
    assert_eq!(reader.positions_discovered(), 1);
    reader.get(2).expect("get 2");
    assert_eq!(reader.positions_discovered(), 3);
}

#[test]
fn forward_slices_select_in_order() {
    let mut reader = sample_reader();
    let positions = reader.get_slice(0..2).expect("slice 0..2");
    assert_eq!(frames_of(&positions), [100, 105]);

    let all = reader.get_slice(Slice::default()).expect("full slice");
    assert_eq!(frames_of(&all), FRAMES);

    let stepped = reader
        .get_slice(Slice {
            step: 2,
            ..Slice::default()
        })
        .expect("step 2");
    assert_eq!(frames_of(&stepped), [100, 110]);
}

#[test]
fn forward_slice_clamps_past_end() {
    let mut reader = sample_reader();
    let positions = reader.get_slice(1..99).expect("slice 1..99");
    assert_eq!(frames_of(&positions), [105, 110]);
}

#[test]
fn negative_slice_bounds_count_from_end() {
    let mut reader = sample_reader();
    let positions = reader
        .get_slice(Slice {
            start: Some(-2),
            ..Slice::default()
        })
        .expect("slice -2..");
    assert_eq!(frames_of(&positions), [105, 110]);
}

#[test]
fn reverse_slice_selects_backwards() {
    let mut reader = sample_reader();
    let positions = reader
        .get_slice(Slice {
            step: -1,
            ..Slice::default()
        })
        .expect("reverse slice");
    assert_eq!(frames_of(&positions), [110, 105, 100]);
}

#[test]
fn slice_step_zero_rejected() {
    let mut reader = sample_reader();
    let err = reader
        .get_slice(Slice {
            step: 0,
            ..Slice::default()
        })
        .unwrap_err();
    assert!(matches!(err, Kw6Error::InvalidSlice));
}

#[test]
fn get_many_serves_arbitrary_order() {
    let mut reader = sample_reader();
    let positions = reader.get_many(&[2, 0]).expect("get_many");
    assert_eq!(frames_of(&positions), [110, 100]);

    let repeated = reader.get_many(&[1, 1, -1]).expect("get_many repeated");
    assert_eq!(frames_of(&repeated), [105, 105, 110]);
}

#[test]
fn frame_lookup_finds_position() {
    let mut reader = sample_reader();
    let position = reader.get_by_frame(105).expect("frame 105");
    assert_eq!(position.header.frame_index, 105);
}

#[test]
fn frame_lookup_rejects_missing_frame() {
    let mut reader = sample_reader();
    assert!(matches!(
        reader.get_by_frame(104).unwrap_err(),
        Kw6Error::FrameNotFound(104)
    ));
    assert!(matches!(
        reader.get_by_frame(111).unwrap_err(),
        Kw6Error::FrameNotFound(111)
    ));
}

#[test]
fn iterates_all_positions() {
    let mut reader = sample_reader();
    let positions: Vec<Position> = reader
        .iter_positions()
        .map(|r| r.expect("position ok"))
        .collect();
    assert_eq!(frames_of(&positions), FRAMES);
}

#[test]
fn iteration_restarts_from_memoized_offsets() {
    let mut reader = sample_reader();
    assert_eq!(reader.iter_positions().count(), 3);
    assert_eq!(reader.positions_discovered(), 3);
    let positions: Vec<Position> = reader
        .iter_positions()
        .map(|r| r.expect("position ok"))
        .collect();
    assert_eq!(frames_of(&positions), FRAMES);
}

#[test]
fn truncated_tail_still_serves_leading_positions() {
    let mut bytes = sample_file();
    bytes.truncate(bytes.len() - 5);
    let mut reader = Reader::from_stream(Cursor::new(bytes)).expect("open truncated");

    let mut iter = reader.iter_positions();
    assert_eq!(
        iter.next().expect("first").expect("ok").header.frame_index,
        100
    );
    assert_eq!(
        iter.next().expect("second").expect("ok").header.frame_index,
        105
    );
    let err = iter.next().expect("third yields error").unwrap_err();
    assert!(matches!(err, Kw6Error::Truncated { .. }));
    assert!(iter.next().is_none(), "iterator must fuse after an error");

    assert_eq!(reader.get(0).expect("get 0").header.frame_index, 100);
    assert_eq!(reader.get(1).expect("get 1").header.frame_index, 105);
    assert!(matches!(
        reader.get(2).unwrap_err(),
        Kw6Error::Truncated { .. }
    ));
}

#[test]
fn missing_camera_records_detected() {
    let mut bytes = b"KW6FileClassVer1.0 ".to_vec();
    // Declares three cameras but carries only two.
    push_doubles(&mut bytes, &[672.0, 1.0, 100.0, 0.0, 1000.0, 3.0]);
    push_camera(&mut bytes, 0, 10);
    push_camera(&mut bytes, 1, 20);

    let mut reader = Reader::from_stream(Cursor::new(bytes)).expect("open");
    let err = reader.get(0).unwrap_err();
    match err {
        Kw6Error::SizeMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, 3);
            assert_eq!(found, 2);
        }
        other => panic!("expected SizeMismatch, got {:?}", other),
    }
}

#[test]
fn empty_stream_rejected() {
    let err = Reader::from_stream(Cursor::new(Vec::new())).unwrap_err();
    assert!(matches!(err, Kw6Error::Truncated { offset: 0, .. }));
}

#[test]
fn header_only_file_has_no_positions() {
    let mut reader =
        Reader::from_stream(Cursor::new(b"KW6FileClassVer1.0 ".to_vec())).expect("open");
    assert_eq!(reader.num_positions().expect("count"), 0);
    assert!(matches!(
        reader.get(0).unwrap_err(),
        Kw6Error::IndexOutOfRange { index: 0, count: 0 }
    ));
    assert!(reader.iter_positions().next().is_none());
}

#[test]
fn unknown_version_rejected_at_open() {
    let err = Reader::from_stream(Cursor::new(b"KW6FileClassVer2.0 ".to_vec())).unwrap_err();
    assert!(matches!(err, Kw6Error::UnsupportedVersion(_)));
}

fn sidecar_xml(offsets: &[u64]) -> String {
    let mut xml = String::from("<kw6Header>\n");
    for (offset, frame) in offsets.iter().zip(FRAMES) {
        xml.push_str(&format!(
            "<kw6Index>\nkw6Byte = \"{}\"\nkw6Pos = \"{}\"\n</kw6Index>\n",
            offset,
            frame * 10
        ));
    }
    xml.push_str("</kw6Header>\n");
    xml
}

fn write_sidecar_fixture(xml: &str) -> (tempfile::TempDir, std::path::PathBuf, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let kw6_path = dir.path().join("sample.kw6");
    let hdr_path = dir.path().join("sample.hdr");
    fs::write(&kw6_path, sample_file()).expect("write kw6");
    fs::write(&hdr_path, xml).expect("write hdr");
    (dir, kw6_path, hdr_path)
}

#[test]
fn sidecar_seeds_offset_table() {
    let (_dir, kw6_path, hdr_path) = {
        let (_, offsets) = sample_file_with_offsets();
        write_sidecar_fixture(&sidecar_xml(&offsets))
    };
    let mut reader = Reader::open_with_sidecar(&kw6_path, &hdr_path).expect("open with sidecar");

    // All but the last sidecar entry become table rows up front.
    assert_eq!(reader.positions_discovered(), 2);
    assert_eq!(reader.get(2).expect("get 2").header.frame_index, 110);
    assert_eq!(reader.num_positions().expect("count"), 3);
    assert_eq!(
        reader.get_by_frame(105).expect("frame 105").header.frame_index,
        105
    );
}

#[test]
fn sidecar_with_wrong_first_offset_rejected() {
    let (_, offsets) = sample_file_with_offsets();
    let mut shifted = offsets.clone();
    shifted[0] += 1;
    let (_dir, kw6_path, hdr_path) = write_sidecar_fixture(&sidecar_xml(&shifted));
    let err = Reader::open_with_sidecar(&kw6_path, &hdr_path).unwrap_err();
    assert!(matches!(err, Kw6Error::InvalidSidecar(_)));
}

#[test]
fn sidecar_with_duplicate_offsets_rejected() {
    let (_, offsets) = sample_file_with_offsets();
    let mut doubled = offsets.clone();
    doubled[1] = doubled[0];
    let (_dir, kw6_path, hdr_path) = write_sidecar_fixture(&sidecar_xml(&doubled));
    let err = Reader::open_with_sidecar(&kw6_path, &hdr_path).unwrap_err();
    assert!(matches!(err, Kw6Error::InvalidSidecar(_)));
}

#[test]
fn sidecar_with_garbage_entry_rejected() {
    let xml = "<kw6Header>\n<kw6Index>\nnot an assignment\n</kw6Index>\n</kw6Header>\n";
    let (_dir, kw6_path, hdr_path) = write_sidecar_fixture(xml);
    let err = Reader::open_with_sidecar(&kw6_path, &hdr_path).unwrap_err();
    assert!(matches!(err, Kw6Error::InvalidSidecar(_)));
}

#[test]
fn images_export_as_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut reader = sample_reader();
    let position = reader.get(0).expect("get 0");

    let path = dir.path().join("100_0.png");
    position.cameras[0].image.save(&path).expect("save png");

    let reloaded = image::open(&path).expect("reload png").to_luma8();
    assert_eq!(reloaded.width(), 4);
    assert_eq!(reloaded.height(), 4);
    assert!(reloaded.pixels().all(|p| p.0[0] == 10));
}

#[test]
fn image_save_to_missing_directory_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut reader = sample_reader();
    let position = reader.get(0).expect("get 0");
    let path = dir.path().join("missing").join("out.png");
    assert!(position.cameras[0].image.save(path).is_err());
}
