use feed_codec::{Document, Error, ReadOptions};

#[test]
fn test_entities_are_unescaped() {
    let xml = r#"<item title="a &lt; b &amp; &quot;c&quot;">x &gt; y &#38; &#x3C;z</item>"#;
    let doc = Document::parse_str(xml).unwrap();
    let root = doc.root();
    assert_eq!(root.attribute(&doc, "title"), Some(r#"a < b & "c""#));
    assert_eq!(root.text(&doc), Some("x > y & <z"));
}

#[test]
fn test_closing_tag_mismatch_err() {
    // no closing tag
    let xml = "<img>";
    let doc = Document::parse_str(xml);
    assert!(matches!(doc.unwrap_err(), Error::Unexpected { .. }));

    // closing tag mismatch
    let xml = "<a><img>Te</a>xt</img>";
    let doc = Document::parse_str(xml);
    assert!(matches!(doc.unwrap_err(), Error::Unexpected { .. }));

    // no opening tag
    let xml = "</abc>";
    let doc = Document::parse_str(xml);
    assert!(matches!(doc.unwrap_err(), Error::Unexpected { .. }));

    // no element at all
    let xml = "<?xml version=\"1.0\"?>\n<!-- nothing here -->";
    let doc = Document::parse_str(xml);
    assert!(matches!(doc.unwrap_err(), Error::Unexpected { .. }));
}

#[test]
fn test_trailing_content() {
    let xml = "<rss><channel/></rss>\n</rss>garbage<more/>";
    let doc = Document::parse_str(xml).unwrap();
    assert_eq!(doc.len(), 2);
    assert_eq!(doc.root().name(&doc), "rss");

    let strict = ReadOptions {
        ignore_trailing_content: false,
        ..ReadOptions::default()
    };
    let doc = Document::parse_str_with_opts(xml, strict);
    assert!(matches!(doc.unwrap_err(), Error::Unexpected { .. }));
}

#[test]
fn test_invalid_cdata_bytes() {
    let mut xml = b"<rss><channel><description><![CDATA[ok ".to_vec();
    xml.extend_from_slice(&[0xc3, 0x28]);
    xml.extend_from_slice(b"]]></description></channel></rss>");
    match Document::parse_bytes(&xml) {
        Err(Error::CdataDecoding { path }) => assert_eq!(path, "rss/channel/description"),
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn test_encodings() {
    let utf16be: Vec<u8> = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a>ü</a>"
        .encode_utf16()
        .flat_map(|unit| unit.to_be_bytes())
        .collect();
    let doc = Document::parse_bytes(&utf16be).unwrap();
    assert_eq!(doc.root().text(&doc), Some("ü"));

    let mut utf8_bom = vec![0xef, 0xbb, 0xbf];
    utf8_bom.extend_from_slice("<a>ü</a>".as_bytes());
    let doc = Document::parse_bytes(&utf8_bom).unwrap();
    assert_eq!(doc.root().text(&doc), Some("ü"));

    let unknown = b"<?xml version=\"1.0\" encoding=\"x-unknown\"?><a/>";
    assert!(matches!(
        Document::parse_bytes(unknown).unwrap_err(),
        Error::CannotDecode
    ));
}

#[test]
fn test_parse_reader() {
    let xml = "<feed><title>From a reader</title></feed>";
    let doc = Document::parse_reader(xml.as_bytes()).unwrap();
    let title = doc.root().find(&doc, "title").unwrap();
    assert_eq!(title.text(&doc), Some("From a reader"));
}

#[test]
fn test_xhtml_keeps_markup() {
    let xml = r#"<entry>
    <summary type="xhtml">
        <div xmlns="http://www.w3.org/1999/xhtml"><a href="/x?a=1&amp;b=2">1 &lt; 2</a><br/></div>
    </summary>
    <content type="html">&lt;p&gt;escaped&lt;/p&gt;</content>
</entry>"#;
    let doc = Document::parse_str(xml).unwrap();
    let summary = doc.root().find(&doc, "summary").unwrap();
    assert!(summary.is_xhtml(&doc));
    assert!(!summary.has_children(&doc));
    assert_eq!(
        summary.text(&doc),
        Some(r#"<div xmlns="http://www.w3.org/1999/xhtml"><a href="/x?a=1&amp;b=2">1 &lt; 2</a><br></br></div>"#)
    );
    let content = doc.root().find(&doc, "content").unwrap();
    assert!(!content.is_xhtml(&doc));
    assert_eq!(content.text(&doc), Some("<p>escaped</p>"));
}
