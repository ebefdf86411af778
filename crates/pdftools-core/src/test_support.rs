//! Fixture documents shared by the unit tests

use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};

/// Create a simple PDF with N letter-size pages whose content shows
/// `<prefix>-Page-<n>`, so tests can tell pages apart after a transform.
pub fn create_test_pdf(num_pages: u32, prefix: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Courier".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter(vec![(
        "Font",
        Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
    )]));

    let mut page_ids = Vec::new();

    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new(
                    "Tf",
                    vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                ),
                Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                Operation::new(
                    "Tj",
                    vec![Object::String(
                        format!("{}-Page-{}", prefix, i + 1).into_bytes(),
                        lopdf::StringFormat::Literal,
                    )],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id =
            doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

        let page = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            ),
            ("Resources", Object::Reference(resources_id)),
            ("Contents", Object::Reference(content_id)),
        ]);
        let page_id = doc.add_object(page);
        page_ids.push(page_id);
    }

    let pages = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(num_pages as i64)),
        (
            "Kids",
            Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
        ),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog = Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]);
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// For each page, the fixture page number found in its content
pub fn page_labels(doc: &Document, prefix: &str) -> Vec<u32> {
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).unwrap();
            let text = String::from_utf8_lossy(&content);
            let marker = format!("({}-Page-", prefix);
            let start = text.find(&marker).expect("page label missing") + marker.len();
            let end = start + text[start..].find(')').unwrap();
            text[start..end].parse().unwrap()
        })
        .collect()
}

/// Content of a page as text (streams decompressed)
pub fn page_text(doc: &Document, page_number: u32) -> String {
    let page_id = doc.get_pages()[&page_number];
    String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned()
}

/// Add a one-entry outline whose destination is `page_number`
pub fn with_outline_to_page(mut doc: Document, page_number: u32) -> Document {
    let page_id = doc.get_pages()[&page_number];
    let outlines_id = doc.new_object_id();

    let item_id = doc.add_object(Dictionary::from_iter(vec![
        (
            "Title",
            Object::String(b"Chapter".to_vec(), lopdf::StringFormat::Literal),
        ),
        ("Parent", Object::Reference(outlines_id)),
        (
            "Dest",
            Object::Array(vec![
                Object::Reference(page_id),
                Object::Name(b"Fit".to_vec()),
            ]),
        ),
    ]));
    doc.objects.insert(
        outlines_id,
        Object::Dictionary(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Outlines".to_vec())),
            ("First", Object::Reference(item_id)),
            ("Last", Object::Reference(item_id)),
            ("Count", Object::Integer(1)),
        ])),
    );

    let catalog_id = doc.trailer.get(b"Root").unwrap().as_reference().unwrap();
    doc.get_dictionary_mut(catalog_id)
        .unwrap()
        .set("Outlines", Object::Reference(outlines_id));
    doc
}
