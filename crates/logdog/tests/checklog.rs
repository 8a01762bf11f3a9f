use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::NamedTempFile;

use logdog::{
    Checklog, LogdogError, Merger, OutputFormat, Result, Source, TemplateFormat, TimeSafeMerger,
    TimestampField,
};

const PATTERN: &str = r"^(?P<ts>.{15}) (?P<host>\S+) (?P<prog>[^\[:]+)(\[(?P<pid>\d+)\])?: (?P<msg>.*)$";
const TS_FORMAT: &str = "%b %d %H:%M:%S";

fn testlog_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/testlog.txt")
}

fn testlog_lines() -> Vec<String> {
    std::fs::read_to_string(testlog_path())
        .unwrap()
        .split_inclusive('\n')
        .map(str::to_string)
        .collect()
}

/// Year-less fixture timestamps are resolved against a fixed "now".
fn reference() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 18)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn open_source(path: &Path) -> Source {
    Source::open(path, PATTERN)
        .unwrap()
        .with_field("ts", TimestampField::with_reference(TS_FORMAT, reference()).unwrap())
}

fn reopen(source: &mut Source, path: &Path) {
    source.set_reader(BufReader::new(File::open(path).unwrap()));
}

/// One checklog pass: merge, skip up to the watermark, render, advance the
/// watermark.
fn checklog(sources: &mut [Source], output: &OutputFormat, state: &mut Option<NaiveDateTime>) -> Vec<String> {
    let merged = TimeSafeMerger::new(sources);
    let mut pass = Checklog::new(merged, output, *state);
    let lines = pass.by_ref().collect::<Result<Vec<_>>>().unwrap();
    *state = pass.watermark();
    lines
}

#[test]
fn test_single_file_returned_unchanged() {
    let mut sources = vec![open_source(&testlog_path())];
    let mut state = None;

    let result = checklog(&mut sources, &OutputFormat::Original, &mut state);
    assert_eq!(result, testlog_lines());
}

#[test]
fn test_custom_output() {
    let mut sources = vec![open_source(&testlog_path())];
    let output = OutputFormat::Template(
        TemplateFormat::new("%(ts)s test\n")
            .unwrap()
            .with_field("ts", TimestampField::new(TS_FORMAT).unwrap()),
    );
    let mut state = None;

    let expected: Vec<String> = testlog_lines()
        .iter()
        .map(|l| format!("{} test\n", &l[..15]))
        .collect();
    assert_eq!(checklog(&mut sources, &output, &mut state), expected);
}

#[test]
fn test_several_files_merge_back_into_original_order() {
    let lines = testlog_lines();

    for seed in 0..5u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut files: Vec<NamedTempFile> = (0..3).map(|_| NamedTempFile::new().unwrap()).collect();
        for line in &lines {
            let pick = rng.random_range(0..files.len());
            files[pick].write_all(line.as_bytes()).unwrap();
        }
        for file in &mut files {
            file.flush().unwrap();
        }

        let mut sources: Vec<Source> = files.iter().map(|f| open_source(f.path())).collect();
        let mut state = None;
        let result = checklog(&mut sources, &OutputFormat::Original, &mut state);
        assert_eq!(result, lines, "seed {}", seed);
    }
}

#[test]
fn test_merged_output_is_non_decreasing() {
    let lines = testlog_lines();
    let mut files: Vec<NamedTempFile> = (0..4).map(|_| NamedTempFile::new().unwrap()).collect();
    // every line lands in two sources, so equal timestamps meet in the merge
    for (i, line) in lines.iter().enumerate() {
        files[i % 4].write_all(line.as_bytes()).unwrap();
        files[(i + 1) % 4].write_all(line.as_bytes()).unwrap();
    }
    for file in &mut files {
        file.flush().unwrap();
    }

    let mut sources: Vec<Source> = files.iter().map(|f| open_source(f.path())).collect();
    let records = Merger::new(&mut sources).collect::<Result<Vec<_>>>().unwrap();
    assert_eq!(records.len(), lines.len() * 2);

    let stamps: Vec<NaiveDateTime> = records.iter().map(|r| r.timestamp("ts").unwrap()).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_save_state_only_new_records_on_rerun() {
    let lines = testlog_lines();
    let mut file = NamedTempFile::new().unwrap();
    for line in &lines[..5] {
        file.write_all(line.as_bytes()).unwrap();
    }
    file.flush().unwrap();

    let mut sources = vec![open_source(file.path())];
    let mut state = None;
    assert_eq!(checklog(&mut sources, &OutputFormat::Original, &mut state), lines[..5]);

    reopen(&mut sources[0], file.path());
    let result = checklog(&mut sources, &OutputFormat::Original, &mut state);
    assert!(result.is_empty());

    for line in &lines[5..] {
        file.write_all(line.as_bytes()).unwrap();
    }
    file.flush().unwrap();

    reopen(&mut sources[0], file.path());
    let result = checklog(&mut sources, &OutputFormat::Original, &mut state);
    assert_eq!(result, lines[5..]);
}

#[test]
fn test_accepts_empty_files() {
    let file = NamedTempFile::new().unwrap();
    let mut sources = vec![open_source(file.path())];
    let mut state = None;

    assert!(checklog(&mut sources, &OutputFormat::Original, &mut state).is_empty());
    assert_eq!(state, None);
}

#[test]
fn test_unparsable_line_aborts_without_losing_earlier_output() {
    let lines = testlog_lines();
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(lines[0].as_bytes()).unwrap();
    file.write_all(lines[1].as_bytes()).unwrap();
    file.write_all(b"this is not syslog\n").unwrap();
    file.write_all(lines[2].as_bytes()).unwrap();
    file.flush().unwrap();

    let mut sources = vec![open_source(file.path())];
    let output = OutputFormat::Original;
    let mut pass = Checklog::new(TimeSafeMerger::new(&mut sources), &output, None);

    assert_eq!(pass.next().unwrap().unwrap(), lines[0]);
    let err = pass.next().unwrap().unwrap_err();
    assert!(matches!(err, LogdogError::InvalidPattern { .. }));
    assert!(pass.next().is_none());
    assert!(pass.failed());
}

#[test]
fn test_race_condition_only_new_lines_near_same_time() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();
    let logger = |msg: &str| -> String {
        let line = format!("{} alpha test: {}\n", Local::now().format(TS_FORMAT), msg);
        let mut out = OpenOptions::new().append(true).open(&path).unwrap();
        out.write_all(line.as_bytes()).unwrap();
        out.flush().unwrap();
        line
    };

    let mut sources = vec![Source::open(&path, PATTERN)
        .unwrap()
        .with_field("ts", TimestampField::new(TS_FORMAT).unwrap())];
    let mut state = None;

    let mut expected = vec![logger("hello1")];
    let mut result = checklog(&mut sources, &OutputFormat::Original, &mut state);

    expected.push(logger("hello2"));
    reopen(&mut sources[0], &path);
    result.extend(checklog(&mut sources, &OutputFormat::Original, &mut state));

    assert_eq!(result, expected);
}
