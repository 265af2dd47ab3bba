// SPDX-License-Identifier: MIT
//! File-backed source and sink tests

use std::io::Write;

use binary_converter::{
    BinaryCodeBuilder, BinaryCodeReader, BinaryConverter, ByteSink, ByteSource, ConverterError,
    FileSink, FileSource, TypeDescriptor, TypeRegistry, Value, Visibility,
};
use tempfile::{NamedTempFile, TempDir};

fn converter() -> BinaryConverter {
    let mut types = TypeRegistry::new();
    types
        .register(
            TypeDescriptor::builder("io.Record")
                .field("key", Visibility::Public)
                .field("payload", Visibility::Private),
        )
        .unwrap();
    BinaryConverter::builder().types(types).build().unwrap()
}

fn record(converter: &BinaryConverter) -> Value {
    let record = converter.types().instantiate("io.Record").unwrap();
    record.set("key", "alpha").unwrap();
    record.set("payload", vec![1u8, 2, 3, 4, 5]).unwrap();
    Value::Object(record)
}

#[test]
fn test_encode_to_file_and_back() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("record.bin");
    let converter = converter();
    let value = record(&converter);

    converter.encode_to_file(&value, &path).unwrap();
    let on_disk = std::fs::read(&path).unwrap();
    assert_eq!(on_disk, converter.encode_to_vec(&value).unwrap());

    assert_eq!(converter.decode_from_file(&path).unwrap(), value);
}

#[test]
fn test_reader_over_file_source_seeks_backwards() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[113, 25, 45, 79, 13, 51]).unwrap();
    file.flush().unwrap();

    let source = FileSource::open(file.path()).unwrap();
    let mut reader = BinaryCodeReader::new(source);
    reader.move_byte_pointer(4).unwrap();
    assert_eq!(reader.read_next_byte().unwrap(), 13);
    reader.move_byte_pointer(-4).unwrap();
    assert_eq!(reader.read_next_byte().unwrap(), 25);
    assert_eq!(reader.remaining_bits(), Some(32));
}

#[test]
fn test_file_sink_receives_builder_bits() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bits.bin");

    let mut builder = BinaryCodeBuilder::new();
    builder.append_bits(&[1, 1, 0, 1]).unwrap();
    builder.append_byte(0xF0);

    let mut sink = FileSink::create(&path).unwrap();
    builder.write_to(&mut sink).unwrap();
    assert_eq!(sink.written(), 2);
    sink.close().unwrap();
    assert!(sink.is_closed());

    assert_eq!(std::fs::read(&path).unwrap(), builder.to_bytes());
}

#[test]
fn test_file_source_reports_end() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&[7]).unwrap();
    file.flush().unwrap();

    let mut source = FileSource::open(file.path()).unwrap();
    assert!(!source.end_of_source());
    assert_eq!(source.next_byte().unwrap(), 7);
    assert!(source.end_of_source());
    assert!(source.next_byte().is_err());

    source.close();
    assert!(source.is_closed());
}

#[test]
fn test_truncated_file_fails_and_releases_handle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.bin");
    let converter = converter();
    let bytes = converter.encode_to_vec(&record(&converter)).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

    let err = converter.decode_from_file(&path).unwrap_err();
    assert!(err.is_end_of_source());

    // the handle is gone, so the file can be replaced and read again
    std::fs::write(&path, &bytes).unwrap();
    assert!(converter.decode_from_file(&path).is_ok());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = converter()
        .decode_from_file(dir.path().join("absent.bin"))
        .unwrap_err();
    assert!(matches!(err, ConverterError::Read(_)));
    assert!(!err.is_end_of_source());
}

#[test]
fn test_encode_into_sink_trait_object() {
    let converter = converter();
    let value = record(&converter);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sink.bin");

    {
        let mut sink = FileSink::create(&path).unwrap();
        let dyn_sink: &mut dyn ByteSink = &mut sink;
        converter.encode_to_sink(&value, &mut &mut *dyn_sink).unwrap();
    }

    assert_eq!(converter.decode_from_file(&path).unwrap(), value);
}
