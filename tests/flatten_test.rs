//! End-to-end behavior of the flattening engine

use dtsxrows::flatten::{CHILD_FIELD, PARENT_FIELD, ROOT_TYPE, TEXT_TYPE, VALUE_FIELD};
use dtsxrows::{flatten_document, FlattenError, Row};

fn rows(input: &[u8]) -> Vec<Row> {
    flatten_document("pkg.dtsx", input, 0).expect("flatten failed").rows
}

fn parent_links(rows: &[Row]) -> Vec<&Row> {
    rows.iter().filter(|r| r.is_parent_link()).collect()
}

#[test]
fn nested_element_with_attribute_and_text() {
    let rows = rows(b"<root attr=\"1\"><child>text</child></root>");

    let expected: Vec<(u64, &str, u32, &str, &str, &str)> = vec![
        (1, "root", 0, PARENT_FIELD, "0", ROOT_TYPE),
        (1, "root", 1, "attr", "1", ""),
        (1, "root", 2, CHILD_FIELD, "2", "child"),
        (2, "child", 0, PARENT_FIELD, "1", "root"),
        (2, "child", 1, CHILD_FIELD, "3", TEXT_TYPE),
        (3, TEXT_TYPE, 0, PARENT_FIELD, "2", "child"),
        (3, TEXT_TYPE, 1, VALUE_FIELD, "text", ""),
    ];

    let actual: Vec<_> = rows
        .iter()
        .map(|r| {
            (
                r.item_id,
                r.item_type.as_str(),
                r.field_id,
                r.field_name.as_str(),
                r.value.as_str(),
                r.linked_item_type.as_str(),
            )
        })
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn sibling_empty_elements() {
    let rows = rows(b"<root><a/><b/></root>");

    let children: Vec<_> = rows
        .iter()
        .filter(|r| r.item_id == 1 && r.is_child_link())
        .collect();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].field_id, 1);
    assert_eq!(children[0].value, "2");
    assert_eq!(children[0].linked_item_type, "a");
    assert_eq!(children[1].field_id, 2);
    assert_eq!(children[1].value, "3");
    assert_eq!(children[1].linked_item_type, "b");

    // a and b: exactly one identity row each, nothing else
    for (id, name) in [(2u64, "a"), (3u64, "b")] {
        let own: Vec<_> = rows.iter().filter(|r| r.item_id == id && r.item_type == name).collect();
        assert_eq!(own.len(), 1, "{} should only have its identity row", name);
        assert!(own[0].is_parent_link());
        assert_eq!(own[0].value, "1");
    }
}

#[test]
fn extra_closing_tag_is_structural_error() {
    let err = flatten_document("bad.dtsx", b"<root><a/></root></stray>", 0).unwrap_err();
    match err {
        FlattenError::Malformed { message, .. } => {
            assert!(message.contains("stray"), "unexpected message: {}", message)
        }
        other => panic!("expected Malformed, got {:?}", other),
    }
}

#[test]
fn seeded_counter_keeps_batch_ids_unique() {
    let first = flatten_document("one.dtsx", b"<r><a/><b/></r>", 0).unwrap();
    let second = flatten_document("two.dtsx", b"<r><a/><b/></r>", first.last_item_id).unwrap();

    let first_ids: Vec<u64> = parent_links(&first.rows).iter().map(|r| r.item_id).collect();
    let second_ids: Vec<u64> = parent_links(&second.rows).iter().map(|r| r.item_id).collect();

    assert!(second_ids.iter().all(|id| *id > first.last_item_id));
    assert!(first_ids.iter().all(|id| !second_ids.contains(id)));
}

#[test]
fn item_ids_strictly_increasing_and_unique() {
    let rows = rows(
        b"<r x=\"1\"><m><inner>t1</inner></m><m>t2</m><e/><c><![CDATA[<sub><leaf/></sub>]]></c></r>",
    );
    let ids: Vec<u64> = parent_links(&rows).iter().map(|r| r.item_id).collect();
    for pair in ids.windows(2) {
        assert!(pair[0] < pair[1], "ids not strictly increasing: {:?}", ids);
    }
}

#[test]
fn parent_child_link_symmetry() {
    let rows = rows(b"<r><a><b>t</b></a><c/><d><![CDATA[<e/>]]></d></r>");

    for identity in parent_links(&rows) {
        if identity.value == "0" {
            continue; // document root has no parent-side child row
        }
        let parent_id: u64 = identity.value.parse().unwrap();
        let back: Vec<_> = rows
            .iter()
            .filter(|r| {
                r.item_id == parent_id
                    && r.is_child_link()
                    && r.value == identity.item_id.to_string()
            })
            .collect();
        assert_eq!(
            back.len(),
            1,
            "item {} should appear in exactly one _child_ row of its parent",
            identity.item_id
        );
        assert_eq!(back[0].linked_item_type, identity.item_type);
    }
}

#[test]
fn determinism() {
    let input: &[u8] =
        b"<r a=\"1\" b=\"2\"><x>text</x><y><![CDATA[<nested attr='v'/>]]></y><z><![CDATA[prose]]></z></r>";
    let first = flatten_document("same.dtsx", input, 0).unwrap();
    let second = flatten_document("same.dtsx", input, 0).unwrap();
    assert_eq!(first.rows, second.rows);
    assert_eq!(first.last_item_id, second.last_item_id);
}

#[test]
fn attribute_rows_follow_source_order_without_gaps() {
    let rows = rows(b"<r zeta=\"z\" alpha=\"a\" mid=\"m\"/>");
    let attrs: Vec<_> = rows.iter().filter(|r| r.field_id >= 1).collect();
    let got: Vec<(u32, &str)> = attrs.iter().map(|r| (r.field_id, r.field_name.as_str())).collect();
    assert_eq!(got, vec![(1, "zeta"), (2, "alpha"), (3, "mid")]);
}

#[test]
fn cdata_with_nested_document_flattens_inline() {
    let inline = rows(b"<p><a><b/></a></p>");
    let cdata = rows(b"<p><![CDATA[<a><b/></a>]]></p>");
    assert_eq!(inline, cdata, "CDATA sub-document should flatten as if inline");
}

#[test]
fn cdata_with_prose_becomes_text_item() {
    let rows = rows(b"<p><![CDATA[hello, not xml]]></p>");
    let value: Vec<_> = rows.iter().filter(|r| r.field_name == VALUE_FIELD).collect();
    assert_eq!(value.len(), 1);
    assert_eq!(value[0].item_type, TEXT_TYPE);
    assert_eq!(value[0].value, "hello, not xml");

    // The TEXT item is wired to <p> both ways
    let text_id = value[0].item_id;
    assert!(rows
        .iter()
        .any(|r| r.item_id == 1 && r.is_child_link() && r.value == text_id.to_string()));
}

#[test]
fn cdata_document_with_attributes_and_text() {
    let rows = rows(b"<p><![CDATA[<mid a=\"1\"><leaf>text</leaf></mid>]]></p>");
    let names: Vec<&str> = parent_links(&rows).iter().map(|r| r.item_type.as_str()).collect();
    assert_eq!(names, vec!["p", "mid", "leaf", TEXT_TYPE]);

    // The sub-document's attribute and text land like inline content
    assert!(rows.iter().any(|r| r.field_name == "a" && r.value == "1"));
    assert!(rows.iter().any(|r| r.field_name == VALUE_FIELD && r.value == "text"));
}

#[test]
fn document_name_constant_across_rows() {
    let doc = flatten_document("only.dtsx", b"<r><a>t</a></r>", 0).unwrap();
    assert!(doc.rows.iter().all(|r| r.document == "only.dtsx"));
}
