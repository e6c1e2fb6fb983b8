use criterion::{black_box, criterion_group, criterion_main, Criterion};
use feed_codec::{from_document, to_document, Document};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Serialize, Deserialize)]
struct Channel {
    title: String,
    link: Option<String>,
    #[serde(default)]
    item: Vec<Item>,
}

#[derive(Serialize, Deserialize)]
struct Item {
    title: String,
    guid: Option<String>,
    description: Option<String>,
    #[serde(default)]
    category: Vec<String>,
}

fn channel_xml(items: usize) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<channel><title>Bench</title><link>https://example.com/</link>");
    for i in 0..items {
        write!(
            xml,
            "<item><title>Item {i}</title><guid>urn:{i}</guid>\
             <description><![CDATA[<p>Body &amp; more {i}</p>]]></description>\
             <category>a</category><category>b</category></item>"
        )
        .unwrap();
    }
    xml.push_str("</channel>");
    xml
}

macro_rules! bench {
    ($items:literal, $name:ident, $func:path) => {
        fn $name(c: &mut Criterion) {
            let xml = channel_xml($items);
            c.bench_function(stringify!($name), |b| b.iter(|| $func(&xml)));
        }
    };
}

fn parse(xml: &str) {
    let doc = Document::parse_str(xml).unwrap();
    black_box(doc);
}
bench!(10, tiny_parse, parse);
bench!(1000, medium_parse, parse);
bench!(20000, large_parse, parse);

fn decode(xml: &str) {
    let doc = Document::parse_str(xml).unwrap();
    let channel: Channel = from_document(&doc).unwrap();
    black_box(channel);
}
bench!(10, tiny_decode, decode);
bench!(1000, medium_decode, decode);

fn encode(xml: &str) {
    let doc = Document::parse_str(xml).unwrap();
    let channel: Channel = from_document(&doc).unwrap();
    let written = to_document(&channel, "channel").unwrap().write_str().unwrap();
    black_box(written);
}
bench!(1000, medium_encode, encode);

criterion_group! {
    name = tiny;
    config = Criterion::default().sample_size(200);
    targets = tiny_parse, tiny_decode
}

criterion_group!(medium, medium_parse, medium_decode, medium_encode);

criterion_group! {
    name = large;
    config = Criterion::default().sample_size(50);
    targets = large_parse
}

criterion_main!(tiny, medium, large);
