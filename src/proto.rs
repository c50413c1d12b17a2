//! Wire messages exchanged with the badge service.
//!
//! Every request, reply and broadcast is a [`Packet`]: a command name plus a
//! positional list of 32-bit integers and UTF-8 strings. The positional
//! schema of each command is fixed; see `ipc::request` and
//! `ipc::subscriber` for the per-command layouts.

use prost::{Enumeration, Message, Oneof};

/// Direction/role of a packet on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
#[repr(i32)]
pub enum PacketKind {
    /// Client to service, expects a reply.
    Request = 0,
    /// Service to client, answers a request.
    Reply = 1,
    /// Service to subscribers, unsolicited.
    Notify = 2,
}

/// A single framed message.
#[derive(Clone, PartialEq, Message)]
pub struct Packet {
    #[prost(enumeration = "PacketKind", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub command: String,
    #[prost(message, repeated, tag = "3")]
    pub args: Vec<Arg>,
}

/// One positional argument.
#[derive(Clone, PartialEq, Message)]
pub struct Arg {
    #[prost(oneof = "ArgValue", tags = "1, 2")]
    pub value: Option<ArgValue>,
}

#[derive(Clone, PartialEq, Oneof)]
pub enum ArgValue {
    #[prost(sint32, tag = "1")]
    Int(i32),
    #[prost(string, tag = "2")]
    Str(String),
}

impl Arg {
    pub fn int(value: i32) -> Self {
        Self {
            value: Some(ArgValue::Int(value)),
        }
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self {
            value: Some(ArgValue::Str(value.into())),
        }
    }

    /// Signature character: `i` for integers, `s` for strings.
    fn type_char(&self) -> Option<char> {
        match self.value {
            Some(ArgValue::Int(_)) => Some('i'),
            Some(ArgValue::Str(_)) => Some('s'),
            None => None,
        }
    }
}

impl Packet {
    fn with_kind(kind: PacketKind, command: impl Into<String>, args: Vec<Arg>) -> Self {
        Self {
            kind: kind as i32,
            command: command.into(),
            args,
        }
    }

    pub fn request(command: impl Into<String>, args: Vec<Arg>) -> Self {
        Self::with_kind(PacketKind::Request, command, args)
    }

    pub fn reply(command: impl Into<String>, args: Vec<Arg>) -> Self {
        Self::with_kind(PacketKind::Reply, command, args)
    }

    pub fn notify(command: impl Into<String>, args: Vec<Arg>) -> Self {
        Self::with_kind(PacketKind::Notify, command, args)
    }

    /// Integer argument at `index`, if present and an integer.
    pub fn int_at(&self, index: usize) -> Option<i32> {
        match self.args.get(index)?.value {
            Some(ArgValue::Int(v)) => Some(v),
            _ => None,
        }
    }

    /// String argument at `index`, if present and a string.
    pub fn str_at(&self, index: usize) -> Option<&str> {
        match &self.args.get(index)?.value {
            Some(ArgValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Signature of the argument list, e.g. `"isi"`.
    ///
    /// Arguments with no value are rendered as `?`.
    pub fn signature(&self) -> String {
        self.args
            .iter()
            .map(|a| a.type_char().unwrap_or('?'))
            .collect()
    }

    /// True if the leading arguments match `expected` (trailing extras allowed).
    pub fn matches(&self, expected: &str) -> bool {
        self.args.len() >= expected.len()
            && self
                .args
                .iter()
                .zip(expected.chars())
                .all(|(arg, want)| arg.type_char() == Some(want))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_accessors() {
        let packet = Packet::notify(
            "set_badge_count_notify",
            vec![Arg::int(2), Arg::str("org.example.app"), Arg::int(5)],
        );
        assert_eq!(packet.kind(), PacketKind::Notify);
        assert_eq!(packet.int_at(0), Some(2));
        assert_eq!(packet.str_at(1), Some("org.example.app"));
        assert_eq!(packet.int_at(2), Some(5));
        assert_eq!(packet.int_at(1), None);
        assert_eq!(packet.str_at(3), None);
    }

    #[test]
    fn test_signature_matching() {
        let packet = Packet::reply("set_noti_property", vec![Arg::int(0), Arg::int(1)]);
        assert_eq!(packet.signature(), "ii");
        assert!(packet.matches("i"));
        assert!(packet.matches("ii"));
        assert!(!packet.matches("is"));
        assert!(!packet.matches("iii"));
    }

    #[test]
    fn test_empty_arg_never_matches() {
        let packet = Packet::reply("get_badge_count", vec![Arg { value: None }]);
        assert_eq!(packet.signature(), "?");
        assert!(!packet.matches("i"));
    }

    #[test]
    fn test_decode_preserves_layout() {
        let packet = Packet::request(
            "insert_badge",
            vec![Arg::str("a"), Arg::str("b"), Arg::str("c")],
        );
        let decoded = Packet::decode(packet.encode_to_vec().as_slice()).unwrap();
        assert_eq!(decoded.kind(), PacketKind::Request);
        assert_eq!(decoded.signature(), "sss");
        assert_eq!(decoded.str_at(2), Some("c"));
    }
}
