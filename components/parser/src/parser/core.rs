use std::marker::PhantomData;

use crate::parser::{Cursor, Parser};

/// Returns the text consumed by `parser` instead of its attribute.
#[inline]
pub fn raw<'a, T: 'a + Parser<'a>>(parser: T) -> Raw<'a, T> {
    Raw(parser, PhantomData)
}

pub struct Raw<'a, T: Parser<'a>>(T, PhantomData<&'a T>);

impl<'a, T: Parser<'a>> Parser<'a> for Raw<'a, T> {
    type Attribute = &'a str;
    type Error = T::Error;

    fn parse(&self, start: Cursor<'a>) -> Result<(&'a str, Cursor<'a>), T::Error> {
        let (_, end) = self.0.parse(start)?;
        Ok(start.advance2(end.offset() - start.offset()))
    }
}

pub fn optional<'a, T: Parser<'a>>(parser: T) -> Optional<T> {
    Optional(parser)
}

pub struct Optional<T>(T);

impl<'a, T: Parser<'a>> Parser<'a> for Optional<T> {
    type Attribute = Option<T::Attribute>;
    type Error = T::Error;

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), T::Error> {
        match self.0.parse(cur) {
            Ok((attr, cur)) => Ok((Some(attr), cur)),
            Err(_) => Ok((None, cur)),
        }
    }
}

pub fn kleene<'a, T: Parser<'a>>(parser: T) -> Kleene<T> {
    Kleene(parser)
}

pub struct Kleene<T>(T);

impl<'a, T: Parser<'a>> Parser<'a> for Kleene<T> {
    type Attribute = Vec<T::Attribute>;
    type Error = T::Error;

    fn parse(&self, mut cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), T::Error> {
        let mut res = vec![];
        while let Ok((attr, cursor)) = self.0.parse(cur) {
            if cursor.offset() == cur.offset() {
                break;
            }
            cur = cursor;
            res.push(attr);
        }
        Ok((res, cur))
    }
}

/// One or more repetitions of `parser`.
pub fn plus<'a, T: Parser<'a>>(parser: T) -> Plus<T> {
    Plus(parser)
}

pub struct Plus<T>(T);

impl<'a, T: Parser<'a>> Parser<'a> for Plus<T> {
    type Attribute = Vec<T::Attribute>;
    type Error = T::Error;

    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), T::Error> {
        let (first, cur) = self.0.parse(cur)?;
        let (mut rest, cur) = Kleene(&self.0).parse(cur)?;
        rest.insert(0, first);
        Ok((rest, cur))
    }
}

impl<'a, T: Parser<'a>> Parser<'a> for &T {
    type Attribute = T::Attribute;
    type Error = T::Error;

    #[inline]
    fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), T::Error> {
        T::parse(*self, cur)
    }
}

macro_rules! def_seq {
    ($($i:tt: $t:ident),+ $(,)?) => {
        impl<
                'a,
                $($t: Parser<'a, Error = E>),*,
                E,
            > Parser<'a> for ($($t),*,)
        {
            type Attribute = ($($t::Attribute),*,);
            type Error = E;

            #[allow(non_snake_case)]
            fn parse(&self, cur: Cursor<'a>) -> Result<(Self::Attribute, Cursor<'a>), Self::Error> {
                $(let ($t, cur) = self.$i.parse(cur)?;)*
                Ok((($($t),*,), cur))
            }
        }
    };
}

def_seq!(0: T1, 1: T2);
def_seq!(0: T1, 1: T2, 2: T3);

#[cfg(test)]
mod tests {
    use crate::parser::core::{kleene, optional, plus, raw};
    use crate::parser::string::{chars, lit};
    use crate::parser::{Cursor, Parser};

    #[test]
    fn raw_returns_consumed_text() {
        let (text, rest) = raw((lit("1."), kleene(chars(|c: char| c.is_ascii_digit()))))
            .parse(Cursor::new("1.10'"))
            .unwrap();
        assert_eq!("1.10", text);
        assert_eq!("'", rest.rest());
    }

    #[test]
    fn optional_does_not_consume_on_error() {
        let (attr, rest) = optional(lit("SYSTEM")).parse(Cursor::new("PUBLIC")).unwrap();
        assert_eq!(None, attr);
        assert_eq!(0, rest.offset());
    }

    #[test]
    fn plus_needs_one_match() {
        let digits = plus(chars(|c: char| c.is_ascii_digit()));
        assert!(digits.parse(Cursor::new("x")).is_err());
        let (attr, rest) = digits.parse(Cursor::new("42;")).unwrap();
        assert_eq!(vec!['4', '2'], attr);
        assert_eq!(";", rest.rest());
    }
}
