use criterion::{black_box, criterion_group, criterion_main, Criterion};
use docgrid_core::repo::ConfigBuilder;
use docgrid_core::serialization::{CompressionType, SerializerOptions};
use docgrid_core::types::{MapValue, WeightedSetValue};
use docgrid_core::{Document, DocumentDeserializer, DocumentId, DocumentSerializer, DocumentTypeRepo, FieldValue};

fn repo() -> DocumentTypeRepo {
    let mut builder = ConfigBuilder::new();
    let mut doc = builder.document("article", 1);
    let string = doc.primitive("string");
    let int = doc.primitive("int");
    let tags = doc.weighted_set(string, false, false);
    let counts = doc.map(string, int);
    doc.field("title", string).field("body", string).field("tags", tags).field("counts", counts);
    builder.into_repo().expect("bench repo")
}

fn article(repo: &DocumentTypeRepo) -> Document {
    let doc_type = repo.document_type("article").expect("article type");
    let mut doc = Document::new(doc_type, DocumentId::parse("id:bench:article::1").expect("id"));
    let field = |name: &str| doc_type.field(name).expect("field").clone();

    let mut tags = WeightedSetValue::new();
    let mut counts = MapValue::new();
    for i in 0..32 {
        tags.insert(format!("tag{}", i).into(), i);
        counts.insert(format!("term{}", i).into(), (i * 7).into());
    }
    doc.set(&field("title"), "Benchmarking the document codec");
    doc.set(&field("body"), "lorem ipsum dolor sit amet ".repeat(100));
    doc.set(&field("tags"), FieldValue::WeightedSet(tags));
    doc.set(&field("counts"), FieldValue::Map(counts));
    doc
}

fn criterion_benchmark(c: &mut Criterion) {
    let repo = repo();
    let doc = article(&repo);
    let plain = DocumentSerializer::new(&repo);
    let lz4 = DocumentSerializer::new(&repo)
        .with_options(SerializerOptions { compression: CompressionType::Lz4, ..Default::default() });
    let encoded = plain.serialize(&doc).expect("serialize");
    let compressed = lz4.serialize(&doc).expect("serialize");
    let deserializer = DocumentDeserializer::new(&repo);

    c.bench_function("serialize", |b| b.iter(|| plain.serialize(black_box(&doc))));
    c.bench_function("serialize_lz4", |b| b.iter(|| lz4.serialize(black_box(&doc))));
    c.bench_function("deserialize_lazy", |b| b.iter(|| deserializer.deserialize(black_box(encoded.clone()))));
    c.bench_function("deserialize_lz4_lazy", |b| {
        b.iter(|| deserializer.deserialize(black_box(compressed.clone())))
    });
    c.bench_function("deserialize_materialize", |b| {
        b.iter(|| {
            let mut decoded = deserializer.deserialize(encoded.clone()).expect("deserialize");
            decoded.materialize(&repo.fixed(decoded.doc_type())).expect("materialize");
            decoded
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
