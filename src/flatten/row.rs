//! The flattened row model
//!
//! One `Row` per fact about a document item: its parent linkage, one of its
//! attributes, a child reference, or a text value. Rows are plain data;
//! every behavior lives in the engine that emits them.

use serde::{Deserialize, Serialize};

/// `field_name` of the row carrying an item's parent linkage
pub const PARENT_FIELD: &str = "_parent_id";

/// `field_name` of a row referencing one direct child of an item
pub const CHILD_FIELD: &str = "_child_";

/// `field_name` of the row carrying a TEXT item's literal content
pub const VALUE_FIELD: &str = "value";

/// `item_type` marker for text pseudo-elements
pub const TEXT_TYPE: &str = "TEXT";

/// `item_type` marker meaning "no parent" in a root item's parent link
pub const ROOT_TYPE: &str = "root";

/// Reserved `field_id` of the parent-linkage row
pub const PARENT_FIELD_ID: u32 = 0;

/// One flattened fact about a document item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Name of the source document; constant across one parse
    pub document: String,
    /// Synthetic identifier of the element or text node this row describes
    pub item_id: u64,
    /// Element tag name, `TEXT` for text nodes
    pub item_type: String,
    /// Distinguishes rows sharing an `item_id`: 0 = parent link,
    /// 1.. = attributes, child references and text values
    pub field_id: u32,
    /// `_parent_id`, `_child_`, `value`, or an attribute name
    pub field_name: String,
    /// Parent id, child id, attribute value or literal text, as text
    pub value: String,
    /// For linkage rows, the `item_type` of the item on the other end
    /// (`root` for a root item's parent link); empty otherwise
    pub linked_item_type: String,
}

impl Row {
    /// Whether this row is the item's parent-linkage row
    pub fn is_parent_link(&self) -> bool {
        self.field_id == PARENT_FIELD_ID && self.field_name == PARENT_FIELD
    }

    /// Whether this row references a direct child of the item
    pub fn is_child_link(&self) -> bool {
        self.field_name == CHILD_FIELD
    }
}
