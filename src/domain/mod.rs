pub mod comment;
pub mod engagement;
pub mod post;
