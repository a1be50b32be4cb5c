//! # Local Identifiers
//!
//! Documents created offline get a local id that can never collide with an
//! ERP-assigned name:
//!
//! ```text
//! LOCAL-SINV-9f1c2d3e4b5a46c78d9e0f1a2b3c4d5e
//! └─┬─┘ └─┬┘ └──────────────┬───────────────┘
//!   │     │                 └── UUID v4 (simple form)
//!   │     └── doc-type prefix
//!   └── namespace
//! ```
//!
//! The local id stays the primary key after the first successful push; the
//! ERP name is stored beside it in `remote_name`.

use uuid::Uuid;

use crate::doctype::DocType;

pub const LOCAL_ID_NAMESPACE: &str = "LOCAL-";

/// Generates a fresh local id for a document of `doc_type`.
pub fn new_local_id(doc_type: DocType) -> String {
    format!(
        "{}{}-{}",
        LOCAL_ID_NAMESPACE,
        doc_type.local_prefix().unwrap_or("DOC"),
        Uuid::new_v4().simple()
    )
}

/// Row id for line records (items, taxes, payments, references).
pub fn new_line_id() -> String {
    Uuid::new_v4().to_string()
}

/// True for ids minted by [`new_local_id`].
pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_NAMESPACE)
}
