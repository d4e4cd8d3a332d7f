/// Read position inside a borrowed text.
///
/// The offset is counted in bytes from the start of the text the cursor was
/// created for, so it stays meaningful after the cursor is copied around.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Cursor<'a> {
    rest: &'a str,
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            rest: input,
            offset: 0,
        }
    }

    /// Cursor that starts `offset` bytes into `input`.
    pub fn at(input: &'a str, offset: usize) -> Self {
        Self {
            rest: &input[offset..],
            offset,
        }
    }

    pub fn next_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    pub fn next_byte(&self, i: usize) -> Option<u8> {
        self.rest.as_bytes().get(i).copied()
    }

    #[inline]
    pub fn has_next_byte(&self, pat: u8) -> bool {
        self.rest.as_bytes().first() == Some(&pat)
    }

    #[inline]
    pub fn has_next_str(&self, pat: impl AsRef<str>) -> bool {
        self.rest.starts_with(pat.as_ref())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn rest(&self) -> &'a str {
        self.rest
    }

    pub fn rest_bytes(&self) -> &'a [u8] {
        self.rest.as_bytes()
    }

    pub fn is_at_end(&self) -> bool {
        self.rest.is_empty()
    }

    pub fn advance(&self, bytes: usize) -> Self {
        self.advance2(bytes).1
    }

    pub fn advance2(&self, bytes: usize) -> (&'a str, Self) {
        let (consumed, rest) = self.rest.split_at(bytes);
        (
            consumed,
            Self {
                rest,
                offset: self.offset + bytes,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn advance_keeps_absolute_offset() {
        let cursor = Cursor::at("<a>&x;</a>", 3);
        let (consumed, cursor) = cursor.advance2(3);
        assert_eq!("&x;", consumed);
        assert_eq!(6, cursor.offset());
        assert_eq!("</a>", cursor.rest());
    }
}
