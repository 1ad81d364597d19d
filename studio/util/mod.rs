pub mod form;
pub mod html;
pub mod multipart;
pub mod sse;
