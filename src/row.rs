//! The one record type the engine stores.
//!
//! A row is a u32 id plus two fixed-width, NUL-padded byte fields. Its
//! serialized form is exactly [`ROW_SIZE`] bytes: little-endian id, then
//! the raw username and email bytes.

use std::fmt;

use crate::config::{
    EMAIL_OFFSET, EMAIL_SIZE, ID_OFFSET, ID_SIZE, ROW_SIZE, USERNAME_OFFSET, USERNAME_SIZE,
};
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: [u8; USERNAME_SIZE],
    pub email: [u8; EMAIL_SIZE],
}

impl Row {
    /// Build a row from user input, rejecting over-long fields.
    pub fn new(id: u32, username: &str, email: &str) -> Result<Self, ParseError> {
        if username.len() > USERNAME_SIZE || email.len() > EMAIL_SIZE {
            return Err(ParseError::StringTooLong);
        }

        let mut row = Row {
            id,
            username: [0; USERNAME_SIZE],
            email: [0; EMAIL_SIZE],
        };
        row.username[..username.len()].copy_from_slice(username.as_bytes());
        row.email[..email.len()].copy_from_slice(email.as_bytes());
        Ok(row)
    }

    /// Serialize into a leaf cell's value slot. `buf` must be exactly
    /// [`ROW_SIZE`] bytes.
    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        buf[ID_OFFSET..ID_OFFSET + ID_SIZE].copy_from_slice(&self.id.to_le_bytes());
        buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE].copy_from_slice(&self.username);
        buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE].copy_from_slice(&self.email);
    }

    /// Deserialize from a leaf cell's value slot.
    pub fn read_from(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), ROW_SIZE);
        let mut id_bytes = [0u8; ID_SIZE];
        id_bytes.copy_from_slice(&buf[ID_OFFSET..ID_OFFSET + ID_SIZE]);

        let mut row = Row {
            id: u32::from_le_bytes(id_bytes),
            username: [0; USERNAME_SIZE],
            email: [0; EMAIL_SIZE],
        };
        row.username
            .copy_from_slice(&buf[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]);
        row.email
            .copy_from_slice(&buf[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]);
        row
    }

    pub fn username(&self) -> String {
        field_to_string(&self.username)
    }

    pub fn email(&self) -> String {
        field_to_string(&self.email)
    }
}

fn field_to_string(field: &[u8]) -> String {
    String::from_utf8_lossy(field)
        .trim_matches(char::from(0))
        .to_string()
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.id, self.username(), self.email())
    }
}
