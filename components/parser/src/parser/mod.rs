pub use cursor::Cursor;

pub mod core;
pub mod cursor;
pub mod helper;
pub mod string;

/// Grammar production that consumes a prefix of the cursor.
pub trait Parser<'a> {
    type Attribute;
    type Error;

    fn parse(&self, cursor: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error>;
}
