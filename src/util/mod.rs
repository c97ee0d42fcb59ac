#[inline]
pub fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic()
}

#[inline]
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
