// SPDX-License-Identifier: MIT
//! End-to-end round trips over a small document model

use std::sync::{Arc, OnceLock};

use binary_converter::{
    BinaryCodeBuilder, BinaryCodeReader, BinaryConverter, ConverterCategory, ConverterError,
    MethodReceiver, ObjectRef, TypeDescriptor, TypeMethod, TypeRegistry, Value, Visibility,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn model() -> BinaryConverter {
    init_tracing();
    let mut types = TypeRegistry::new();
    types
        .register(
            TypeDescriptor::builder("docs.Entity")
                .field("id", Visibility::Private)
                .field("created", Visibility::Protected)
                .field("name", Visibility::Public),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::builder("docs.Document")
                .extends("docs.Entity")
                .field("id", Visibility::Private)
                .field("title", Visibility::Protected)
                .field("tags", Visibility::Public),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::builder("docs.Report")
                .extends("docs.Document")
                .field("pages", Visibility::Public)
                .field("checksum", Visibility::Private)
                .field("author", Visibility::Public)
                .field("reviewer", Visibility::Public),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::builder("docs.Person")
                .field("name", Visibility::Public)
                .field("parent", Visibility::Public),
        )
        .unwrap();
    types
        .register(
            TypeDescriptor::builder("docs.Settings")
                .serializable()
                .field("theme", Visibility::Public)
                .field("zoom", Visibility::Private),
        )
        .unwrap();
    BinaryConverter::builder().types(types).build().unwrap()
}

fn person(converter: &BinaryConverter, name: &str) -> ObjectRef {
    let person = converter.types().instantiate("docs.Person").unwrap();
    person.set("name", name).unwrap();
    person
}

fn report(converter: &BinaryConverter) -> ObjectRef {
    let report = converter.types().instantiate("docs.Report").unwrap();
    report.set("pages", 42u16).unwrap();
    report.set("checksum", vec![0xDEu8, 0xAD, 0xBE, 0xEF]).unwrap();
    report.set("author", person(converter, "Ada")).unwrap();
    report.set("title", "Quarterly").unwrap();
    report
        .set("tags", vec![Value::from("finance"), Value::from(2024i32)])
        .unwrap();
    report.set("name", "q3-report").unwrap();
    report.set("created", 1_700_000_000i64).unwrap();
    report.set_at("docs.Document", "id", 7u32).unwrap();
    report.set_at("docs.Entity", "id", 99u64).unwrap();
    report
}

#[test]
fn test_multi_level_inheritance_round_trip() {
    let converter = model();
    let value = Value::Object(report(&converter));

    let bytes = converter.encode_to_vec(&value).unwrap();
    let decoded = converter.decode(&bytes).unwrap();
    assert_eq!(decoded, value);

    let object = decoded.as_object().unwrap();
    assert_eq!(object.get_at("docs.Document", "id"), Some(Value::from(7u32)));
    assert_eq!(object.get_at("docs.Entity", "id"), Some(Value::from(99u64)));
    assert_eq!(object.get("created"), Some(Value::from(1_700_000_000i64)));
    assert!(!object.ptr_eq(value.as_object().unwrap()));
}

#[test]
fn test_null_and_scalars_round_trip() {
    let converter = model();
    for value in [
        Value::Null,
        Value::from(i32::MIN),
        Value::from(i32::MAX),
        Value::from(u64::MAX),
        Value::from(-1i8),
        Value::from('ß'),
        Value::from(f32::MIN_POSITIVE),
        Value::from(f64::NAN),
    ] {
        let bytes = converter.encode_to_vec(&value).unwrap();
        assert_eq!(converter.decode(&bytes).unwrap(), value);
    }
}

#[test]
fn test_self_reference_raises_loop_error() {
    let converter = model();
    let node = person(&converter, "loop");
    node.set("parent", node.clone()).unwrap();

    match converter.encode(&Value::Object(node.clone())) {
        Err(ConverterError::InfiniteEncodingLoop { object }) => {
            assert!(object.as_object().unwrap().ptr_eq(&node));
        }
        other => panic!("expected a loop error, got {:?}", other),
    }
}

#[test]
fn test_indirect_cycle_raises_loop_error() {
    let converter = model();
    let a = person(&converter, "a");
    let b = person(&converter, "b");
    a.set("parent", b.clone()).unwrap();
    b.set("parent", a.clone()).unwrap();

    assert!(matches!(
        converter.encode(&Value::Object(a)),
        Err(ConverterError::InfiniteEncodingLoop { .. })
    ));
}

#[test]
fn test_shared_sibling_reference_is_encoded_twice() {
    let converter = model();
    let report = report(&converter);
    let shared = person(&converter, "Grace");
    report.set("author", shared.clone()).unwrap();
    report.set("reviewer", shared).unwrap();

    let value = Value::Object(report);
    let decoded = converter.decode(&converter.encode_to_vec(&value).unwrap()).unwrap();
    assert_eq!(decoded, value);

    let object = decoded.as_object().unwrap();
    let author = object.get("author").unwrap();
    let reviewer = object.get("reviewer").unwrap();
    assert_eq!(author, reviewer);
    assert!(!author.as_object().unwrap().ptr_eq(reviewer.as_object().unwrap()));
}

#[test]
fn test_same_converter_encodes_again_after_a_loop_error() {
    let converter = model();
    let looped = person(&converter, "loop");
    looped.set("parent", looped.clone()).unwrap();
    assert!(converter.encode(&Value::Object(looped)).is_err());

    let fine = Value::Object(person(&converter, "fine"));
    let bytes = converter.encode_to_vec(&fine).unwrap();
    assert_eq!(converter.decode(&bytes).unwrap(), fine);
}

#[test]
fn test_serializable_type_goes_through_opaque_codec() {
    let converter = model();
    let settings = converter.types().instantiate("docs.Settings").unwrap();
    settings.set("theme", "dark").unwrap();
    settings.set("zoom", 1.25f32).unwrap();
    let value = Value::Object(settings);

    assert_eq!(
        converter.encoder_category_for(&value).unwrap(),
        Some(ConverterCategory::Opaque)
    );
    let builder = converter.encode(&value).unwrap();
    assert!(builder.bit_string().starts_with("10"));
    assert_eq!(converter.decode(builder.to_bytes()).unwrap(), value);
}

#[test]
fn test_byte_string_length_boundaries() {
    let converter = model();
    // tag, prefixed "bytes" name, then the payload size class
    let name_bits = 2 + 8 + 5 * 8;
    for (len, prefix_bytes) in [(255usize, 1usize), (256, 2), (65_535, 2), (65_536, 3)] {
        let value = Value::from(vec![0xA5u8; len]);
        let builder = converter.encode(&value).unwrap();
        assert_eq!(
            builder.bit_size(),
            2 + name_bits + 2 + prefix_bytes * 8 + len * 8,
            "length {}",
            len
        );
        assert_eq!(converter.decode(builder.to_bytes()).unwrap(), value);
    }
}

#[test]
fn test_type_methods_with_instance_receivers() {
    let mut types = TypeRegistry::new();
    types
        .register(
            TypeDescriptor::builder("gfx.Color")
                .field("rgb", Visibility::Private)
                .type_encoder(TypeMethod::encoder(
                    "to_rgb",
                    MethodReceiver::Instance,
                    |receiver, _| {
                        let color = receiver.and_then(Value::as_object).ok_or("no receiver")?;
                        match color.get("rgb") {
                            Some(Value::Primitive(p)) => match p {
                                binary_converter::Primitive::U32(rgb) => {
                                    Ok(rgb.to_le_bytes()[..3].to_vec())
                                }
                                _ => Err("rgb is not a u32".into()),
                            },
                            _ => Err("rgb missing".into()),
                        }
                    },
                ))
                .type_decoder(TypeMethod::decoder(
                    "from_rgb",
                    MethodReceiver::Instance,
                    |receiver, bytes| {
                        let instance = receiver.ok_or("no receiver")?.clone();
                        let color = instance.as_object().ok_or("not an object")?;
                        if bytes.len() != 3 {
                            return Err("expected three bytes".into());
                        }
                        let rgb = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
                        color.set("rgb", rgb)?;
                        Ok(instance)
                    },
                )),
        )
        .unwrap();
    let converter = BinaryConverter::builder().types(types).build().unwrap();

    let color = converter.types().instantiate("gfx.Color").unwrap();
    color.set("rgb", 0x00FF_8800u32).unwrap();
    let value = Value::Object(color);

    let builder = converter.encode(&value).unwrap();
    // tag, prefixed "gfx.Color", prefixed three-byte payload
    assert_eq!(builder.bit_size(), 2 + 2 + 8 + 9 * 8 + 2 + 8 + 3 * 8);
    assert_eq!(converter.decode(builder.to_bytes()).unwrap(), value);
    assert_eq!(
        converter.decoder_category_for("gfx.Color").unwrap(),
        ConverterCategory::TypeMethod
    );
}

#[test]
fn test_global_type_converters() {
    let descriptor_slot: Arc<OnceLock<Arc<TypeDescriptor>>> = Arc::new(OnceLock::new());
    let slot = Arc::clone(&descriptor_slot);

    let mut types = TypeRegistry::new();
    let money = types
        .register(
            TypeDescriptor::builder("fin.Money")
                .field("cents", Visibility::Private)
                .global_encoder(|value| {
                    let cents = value
                        .as_object()
                        .and_then(|o| o.get("cents"))
                        .and_then(|v| v.as_primitive())
                        .ok_or("cents missing")?;
                    match cents {
                        binary_converter::Primitive::I64(c) => Ok(c.to_le_bytes().to_vec()),
                        _ => Err("cents is not an i64".into()),
                    }
                })
                .global_decoder(move |bytes| {
                    let descriptor = slot.get().ok_or("type not ready")?;
                    let raw: [u8; 8] = bytes.try_into()?;
                    let money = ObjectRef::uninitialized(Arc::clone(descriptor));
                    money.set("cents", i64::from_le_bytes(raw))?;
                    Ok(Value::Object(money))
                }),
        )
        .unwrap();
    descriptor_slot.set(Arc::clone(&money)).unwrap();

    let converter = BinaryConverter::builder().types(types).build().unwrap();
    let amount = ObjectRef::uninitialized(money);
    amount.set("cents", -1234i64).unwrap();
    let value = Value::Object(amount);

    assert_eq!(
        converter.encoder_category_for(&value).unwrap(),
        Some(ConverterCategory::TypeGlobal)
    );
    let bytes = converter.encode_to_vec(&value).unwrap();
    assert_eq!(converter.decode(&bytes).unwrap(), value);
}

#[test]
fn test_runtime_default_converter_overrides_builtin() {
    let mut converter = model();
    converter.add_default_encoder("string", |value| {
        Ok(value.as_text().unwrap_or_default().to_uppercase().into_bytes())
    });
    converter.add_default_decoder("string", |bytes| {
        Ok(Value::Text(String::from_utf8(bytes.to_vec())?))
    });

    let bytes = converter.encode_to_vec(&Value::from("quiet")).unwrap();
    assert_eq!(converter.decode(&bytes).unwrap(), Value::from("QUIET"));

    assert!(converter.remove_default_encoder("string"));
    assert!(converter.remove_default_decoder("string"));
    let bytes = converter.encode_to_vec(&Value::from("quiet")).unwrap();
    assert_eq!(converter.decode(&bytes).unwrap(), Value::from("quiet"));
}

#[test]
fn test_converter_function_failure_is_reported() {
    let mut converter = model();
    converter.add_custom_encoder("docs.Person", |_| Err("refused".into()));

    let err = converter
        .encode(&Value::Object(person(&converter, "x")))
        .unwrap_err();
    assert!(matches!(
        err,
        ConverterError::ConverterFunction {
            category: ConverterCategory::Custom,
            ..
        }
    ));
    assert!(err.to_string().contains("refused"));
}

#[test]
fn test_several_values_share_one_stream() {
    let converter = model();
    let values = [
        Value::from(1u8),
        Value::Null,
        Value::Object(person(&converter, "Linus")),
        Value::from("tail"),
    ];

    let mut builder = BinaryCodeBuilder::new();
    for value in &values {
        converter
            .encode_with(value, ConverterCategory::Any, &mut builder)
            .unwrap();
    }

    let mut reader = BinaryCodeReader::from_slice(builder.to_bytes());
    for value in &values {
        assert_eq!(
            &converter
                .decode_with(&mut reader, ConverterCategory::Any)
                .unwrap(),
            value
        );
    }
}

#[test]
fn test_truncated_input_is_end_of_source() {
    let converter = model();
    let bytes = converter
        .encode_to_vec(&Value::Object(report(&converter)))
        .unwrap();
    let err = converter.decode(&bytes[..bytes.len() / 2]).unwrap_err();
    assert!(err.is_end_of_source());
}

#[test]
fn test_exclusive_value_rejects_primitive_filter() {
    let converter = model();
    let bytes = converter
        .encode_to_vec(&Value::Object(person(&converter, "x")))
        .unwrap();
    let mut reader = BinaryCodeReader::from_slice(&bytes);
    assert!(matches!(
        converter.decode_with(&mut reader, ConverterCategory::Primitive),
        Err(ConverterError::NoConverter { .. })
    ));
}
