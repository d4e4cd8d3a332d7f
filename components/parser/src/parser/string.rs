use crate::parser::{Cursor, Parser};

pub fn lit(lit: &'static str) -> Lit {
    Lit { lit }
}

pub struct Lit {
    lit: &'static str,
}

impl<'a> Parser<'a> for Lit {
    type Attribute = ();
    type Error = ();

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        if !cur.has_next_str(self.lit) {
            Err(())
        } else {
            Ok(((), cur.advance(self.lit.len())))
        }
    }
}

/// Single character matching `predicate`.
pub fn chars<P: Fn(char) -> bool>(predicate: P) -> Chars<P> {
    Chars { predicate }
}

pub struct Chars<P: Fn(char) -> bool> {
    predicate: P,
}

impl<'a, P: Fn(char) -> bool> Parser<'a> for Chars<P> {
    type Attribute = char;
    type Error = ();

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
        match cur.next_char() {
            Some(c) if (self.predicate)(c) => Ok((c, cur.advance(c.len_utf8()))),
            _ => Err(()),
        }
    }
}
