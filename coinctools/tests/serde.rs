use coinctools::group::EventGrouper;
use coinctools::{de, ser, Tag};
use std::io::Cursor;

fn tags(raw: &[(i64, u8)]) -> Vec<Tag> {
    raw.iter().map(|&(time, channel)| Tag { time, channel }).collect()
}

#[test]
fn event_file_format() {
    let stream = tags(&[
        (100, 1), (105, 2),
        (300, 1), (301, 2), (302, 3), (303, 4),
        (500, 2), (502, 4),
        (900, 3),
    ]);
    let mut g = EventGrouper::new(50);
    let mut wtr = ser::EventWriter::new(Vec::new()).unwrap();
    g.process_with(&stream, |e| {
        if e.accepted {
            wtr.write(e).unwrap();
        }
    });
    let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();

    assert_eq!(
        out,
        "#timestamp  channel\n100 105\n300 301 302 303\n500 502\n"
    );

    let events = de::events(Cursor::new(out.as_bytes())).unwrap();
    assert_eq!(events, vec![vec![100, 105], vec![300, 301, 302, 303], vec![500, 502]]);
}

#[test]
fn empty_event_file_is_just_the_header() {
    let wtr = ser::EventWriter::new(Vec::new()).unwrap();
    let out = wtr.into_inner().unwrap();
    assert_eq!(out, b"#timestamp  channel\n");
    assert!(de::events(Cursor::new(out)).unwrap().is_empty());
}

#[test]
fn concatenated_zstd_frames() {
    let a = tags(&[(1, 1), (2, 2), (3, 5)]);
    let b = tags(&[(10, 3), (-4, 4)]);

    let mut buf = Vec::new();
    ser::tsv_zst(&mut buf, &a).unwrap();
    ser::tsv_zst(&mut buf, &b).unwrap();

    let back = de::tsv_zst(Cursor::new(buf)).unwrap();
    assert_eq!(back, [a, b].concat());
}

#[test]
fn tsv_is_channel_then_time() {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_writer(Vec::new());
    ser::tsv(&mut wtr, &tags(&[(42, 3)])).unwrap();
    let out = String::from_utf8(wtr.into_inner().unwrap()).unwrap();
    assert_eq!(out, "3\t42\n");
}

#[test]
fn tag_files_by_extension() {
    let dir = std::env::temp_dir().join(format!("coinctools-serde-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let t = tags(&[(5, 1), (6, 2), (7, 8)]);

    let plain = dir.join("run.tsv");
    std::fs::write(&plain, "1\t5\n2\t6\n8\t7\n").unwrap();
    assert_eq!(de::tags_file(&plain).unwrap(), t);

    let packed = dir.join("run.tsv.zst");
    let mut f = std::fs::File::create(&packed).unwrap();
    ser::tsv_zst(&mut f, &t).unwrap();
    drop(f);
    assert_eq!(de::tags_file(&packed).unwrap(), t);

    assert!(de::tags_file(&dir.join("missing.tsv")).is_err());
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn short_tag_rows_are_errors() {
    let dir = std::env::temp_dir().join(format!("coinctools-short-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let plain = dir.join("short.tsv");
    std::fs::write(&plain, "1\n2\n").unwrap();
    let e = de::tags_file(&plain).unwrap_err();
    assert!(format!("{:#}", e).contains("missing time column"));

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .from_reader(Cursor::new("3\tnot a time\n"));
    assert!(de::tsv(&mut rdr).is_err());

    std::fs::remove_dir_all(&dir).unwrap();
}
