//! Byte-level scanning shared by the XML tokenizer

pub mod cursor;

pub use cursor::Cursor;
