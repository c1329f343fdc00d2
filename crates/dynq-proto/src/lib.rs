//! dynq request and response types.
//!
//! This crate defines the backend-agnostic vocabulary used to ask the dynq engine
//! for documents: filter trees, sort specifications, field selections, join
//! requests, and the paginated result shape.
//!
//! # Modules
//!
//! - [`filter`] - Filter tree and operator set
//! - [`sort`] - Sort specification
//! - [`select`] - Field selection
//! - [`find`] - Read request arguments
//! - [`result`] - Paginated result shape
//! - [`cursor`] - Opaque continuation tokens
//! - [`error`] - Protocol error types

pub mod cursor;
pub mod error;
pub mod filter;
pub mod find;
pub mod result;
pub mod select;
pub mod sort;

pub use cursor::Cursor;
pub use error::Error;

// Re-export commonly used types at crate root
pub use filter::{FilterNode, LeafNode, LogicalNode, LogicalOp, Operator};
pub use find::{CountArgs, FindArgs, FindOneArgs, JoinConfig, JoinQuery};
pub use result::{Document, PaginatedDocs};
pub use select::{Select, SelectMode};
pub use sort::{SortDirection, SortSpec, SortTerm};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_args_builder() {
        let filter = FilterNode::from_json(&json!({"status": {"equals": "published"}}))
            .unwrap()
            .unwrap();

        let args = FindArgs::new("posts")
            .with_filter(filter)
            .with_sort(SortTerm::desc("createdAt"))
            .with_select(Select::fields(["title"]))
            .join("author")
            .with_limit(2)
            .with_page(3)
            .with_locale("en");

        assert_eq!(args.collection, "posts");
        assert!(args.filter.is_some());
        assert_eq!(args.sort.primary(), Some(&SortTerm::desc("createdAt")));
        assert!(args.joins.contains_key("author"));
        assert_eq!(args.limit, Some(2));
        assert_eq!(args.page, 3);
        assert!(args.pagination);
    }
}
