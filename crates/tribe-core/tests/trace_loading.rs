//! Loading trace files from disk.

use std::io::Write;

use tempfile::NamedTempFile;
use tribe_common::{Error, ErrorCategory};
use tribe_core::{InitialTopics, InputData};

fn write_trace(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn loads_two_gap_trace() {
    let file = write_trace(
        "0.1\t4.0\tana\thome\twork\tgym\n\
         0.3\t1.0\tbob\twork\twork\thome\n\
         \n\
         0.2\t2.5\tana\tgym\thome\tbar\n",
    );
    let data = InputData::load(file.path(), 3, InitialTopics::Random, 1).unwrap();

    assert_eq!(data.n_events(), 3);
    assert_eq!(data.trace.memory_size(), 2);
    assert_eq!(data.trace.path_len(), 3);
    assert_eq!(data.n_hypers(), 2);
    assert_eq!(data.n_sites(), 4);
    // Sorted by the final gap.
    assert_eq!(data.trace.stamp(0), 1.0);
    assert_eq!(data.trace.stamp(2), 4.0);
    assert_eq!(data.trace.hyper(0), data.hyper2id["bob"]);
    data.counts.check_marginals().unwrap();
    assert_eq!(data.stamps.total(), 3);
}

#[test]
fn mixed_memory_sizes_rejected_with_line_number() {
    let file = write_trace("1.0\tana\thome\twork\n\n0.5\t1.0\tana\thome\twork\tgym\n");
    let err = InputData::load(file.path(), 2, InitialTopics::Random, 1).unwrap_err();
    assert!(matches!(err, Error::InvalidTrace { line: 3, .. }), "{err}");
    assert_eq!(err.category(), ErrorCategory::Data);
}

#[test]
fn empty_file_rejected() {
    let file = write_trace("\n\n");
    let err = InputData::load(file.path(), 2, InitialTopics::Random, 1).unwrap_err();
    assert_eq!(err.code(), 20);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = InputData::load(&dir.path().join("nope.tsv"), 2, InitialTopics::Random, 1).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
}
