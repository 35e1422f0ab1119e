//! Command envelope shared by the CoLa protocol family
//!
//! A command is a byte buffer laid out as
//!
//! ```text
//! 's' <type: 2 ASCII> ' ' <name> [' ' <parameters, big-endian>]
//! ```
//!
//! The leading `'s'` marker only matters to CoLa-B framing. The CoLa2 session
//! handler strips it before transmission and puts it back on responses, so
//! callers always see the same shape. Device faults come back as `sFA`
//! followed directly by a big-endian u16 error code.

use super::header::read_u16_be;

/// Leading framing marker
pub const MARKER: u8 = b's';

/// Offset of the two-letter command type
const TYPE_OFFSET: usize = 1;
/// Offset of the first byte after the type and its separator
const NAME_OFFSET: usize = 4;

/// Command / answer kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    /// Read variable (`RN`)
    ReadVariable,
    /// Write variable (`WN`)
    WriteVariable,
    /// Method invocation (`MN`)
    MethodInvocation,
    /// Read answer (`RA`)
    ReadAnswer,
    /// Write answer (`WA`)
    WriteAnswer,
    /// Method answer (`AN`)
    MethodAnswer,
    /// Device-reported fault (`FA`)
    Error,
    Unknown,
}

impl CommandType {
    /// Two-letter wire code
    pub fn code(self) -> &'static [u8; 2] {
        match self {
            CommandType::ReadVariable => b"RN",
            CommandType::WriteVariable => b"WN",
            CommandType::MethodInvocation => b"MN",
            CommandType::ReadAnswer => b"RA",
            CommandType::WriteAnswer => b"WA",
            CommandType::MethodAnswer => b"AN",
            CommandType::Error => b"FA",
            CommandType::Unknown => b"??",
        }
    }
}

impl From<&[u8]> for CommandType {
    fn from(code: &[u8]) -> Self {
        match code {
            b"RN" => CommandType::ReadVariable,
            b"WN" => CommandType::WriteVariable,
            b"MN" => CommandType::MethodInvocation,
            b"RA" => CommandType::ReadAnswer,
            b"WA" => CommandType::WriteAnswer,
            b"AN" => CommandType::MethodAnswer,
            b"FA" => CommandType::Error,
            _ => CommandType::Unknown,
        }
    }
}

/// Opaque command buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    buffer: Vec<u8>,
}

impl Command {
    pub fn new(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }

    /// The result of a discarded (desynchronised) response
    pub fn empty() -> Self {
        Self::default()
    }

    /// False for the empty command returned on protocol desync
    pub fn is_valid(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn command_type(&self) -> CommandType {
        self.buffer
            .get(TYPE_OFFSET..TYPE_OFFSET + 2)
            .map_or(CommandType::Unknown, CommandType::from)
    }

    /// Variable or method name, if present
    pub fn name(&self) -> Option<&str> {
        if self.command_type() == CommandType::Error {
            return None;
        }
        let rest = self.buffer.get(NAME_OFFSET..)?;
        let end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
        std::str::from_utf8(&rest[..end]).ok().filter(|s| !s.is_empty())
    }

    /// Bytes following the name and its separator
    pub fn parameters(&self) -> &[u8] {
        let Some(rest) = self.buffer.get(NAME_OFFSET..) else {
            return &[];
        };
        match rest.iter().position(|&b| b == b' ') {
            Some(space) => &rest[space + 1..],
            None => &[],
        }
    }

    /// Device error code carried by an `sFA` answer
    pub fn error_code(&self) -> Option<u16> {
        if self.command_type() != CommandType::Error {
            return None;
        }
        read_u16_be(&self.buffer, TYPE_OFFSET + 2)
    }
}

/// Builder for outbound commands
///
/// ```
/// use drishti_io::protocol::{CommandBuilder, CommandType};
///
/// let cmd = CommandBuilder::new(CommandType::WriteVariable, "frontendMode")
///     .parameter_u8(1)
///     .build();
/// assert_eq!(cmd.as_bytes(), b"sWN frontendMode \x01");
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    buffer: Vec<u8>,
    has_parameters: bool,
}

impl CommandBuilder {
    pub fn new(kind: CommandType, name: &str) -> Self {
        let mut buffer = Vec::with_capacity(NAME_OFFSET + name.len() + 8);
        buffer.push(MARKER);
        buffer.extend_from_slice(kind.code());
        buffer.push(b' ');
        buffer.extend_from_slice(name.as_bytes());
        Self {
            buffer,
            has_parameters: false,
        }
    }

    pub fn read_variable(name: &str) -> Self {
        Self::new(CommandType::ReadVariable, name)
    }

    pub fn write_variable(name: &str) -> Self {
        Self::new(CommandType::WriteVariable, name)
    }

    pub fn method(name: &str) -> Self {
        Self::new(CommandType::MethodInvocation, name)
    }

    fn separator(&mut self) {
        if !self.has_parameters {
            self.buffer.push(b' ');
            self.has_parameters = true;
        }
    }

    pub fn parameter_bytes(mut self, bytes: &[u8]) -> Self {
        self.separator();
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn parameter_u8(self, value: u8) -> Self {
        self.parameter_bytes(&[value])
    }

    pub fn parameter_u16(self, value: u16) -> Self {
        self.parameter_bytes(&value.to_be_bytes())
    }

    pub fn parameter_u32(self, value: u32) -> Self {
        self.parameter_bytes(&value.to_be_bytes())
    }

    pub fn parameter_i32(self, value: i32) -> Self {
        self.parameter_bytes(&value.to_be_bytes())
    }

    /// Length-prefixed (u16 BE) string, the CoLa-B flex string encoding
    pub fn parameter_flex_string(self, value: &str) -> Self {
        let len = value.len() as u16;
        self.parameter_u16(len).parameter_bytes(value.as_bytes())
    }

    pub fn build(self) -> Command {
        Command::new(self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_from() {
        assert_eq!(CommandType::from(&b"RA"[..]), CommandType::ReadAnswer);
        assert_eq!(CommandType::from(&b"FA"[..]), CommandType::Error);
        assert_eq!(CommandType::from(&b"XX"[..]), CommandType::Unknown);
    }

    #[test]
    fn test_builder_without_parameters() {
        let cmd = CommandBuilder::read_variable("DeviceIdent").build();
        assert_eq!(cmd.as_bytes(), b"sRN DeviceIdent");
        assert_eq!(cmd.command_type(), CommandType::ReadVariable);
        assert_eq!(cmd.name(), Some("DeviceIdent"));
        assert!(cmd.parameters().is_empty());
    }

    #[test]
    fn test_builder_parameters_are_big_endian() {
        let cmd = CommandBuilder::method("SetAccessMode")
            .parameter_u8(3)
            .parameter_u32(0xF4724744)
            .build();
        assert_eq!(cmd.name(), Some("SetAccessMode"));
        assert_eq!(cmd.parameters(), &[3, 0xF4, 0x72, 0x47, 0x44]);
    }

    #[test]
    fn test_flex_string() {
        let cmd = CommandBuilder::write_variable("name")
            .parameter_flex_string("Ex")
            .build();
        assert_eq!(cmd.parameters(), &[0x00, 0x02, b'E', b'x']);
    }

    #[test]
    fn test_error_answer() {
        let cmd = Command::new(vec![b's', b'F', b'A', 0x00, 0x0A]);
        assert_eq!(cmd.command_type(), CommandType::Error);
        assert_eq!(cmd.error_code(), Some(10));
        assert_eq!(cmd.name(), None);
    }

    #[test]
    fn test_empty_command_is_invalid() {
        let cmd = Command::empty();
        assert!(!cmd.is_valid());
        assert_eq!(cmd.command_type(), CommandType::Unknown);
        assert_eq!(cmd.error_code(), None);
        assert!(cmd.parameters().is_empty());
    }
}
