pub mod comment_tree;
pub mod engagement;
pub mod error;
pub mod session;
pub mod thread_store;
