pub mod addr;
pub mod message;

use std::fmt;

/// TUIC protocol major version carried as the first byte of every frame.
pub const VERSION: u8 = 5;

// Command is an enum for the TUIC command byte. Only the UDP relay
// commands are relayed here; the remaining commands belong to the
// connection's command channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Command(pub u8);

pub const COMMAND_PACKET: Command = Command(0x02);
pub const COMMAND_DISSOCIATE: Command = Command(0x03);

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let others = format!("Unknown Command: {}", self.0);
        let s = match *self {
            COMMAND_PACKET => "PACKET",
            COMMAND_DISSOCIATE => "DISSOCIATE",
            _ => others.as_str(),
        };
        write!(f, "{s}")
    }
}
