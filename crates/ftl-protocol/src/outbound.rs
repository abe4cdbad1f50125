//! Robot-to-client lines

use bytes::{BufMut, BytesMut};

/// A line sent from the robot host to the client
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// D:<channel>:<1|0>
    DigitalInput { channel: u32, value: bool },

    /// A:<channel>:<value>
    AnalogInput { channel: u32, value: f64 },

    /// S:<type>: <message>
    Status { status_type: String, message: String },
}

impl Outbound {
    pub fn digital(channel: u32, value: bool) -> Self {
        Outbound::DigitalInput { channel, value }
    }

    pub fn analog(channel: u32, value: f64) -> Self {
        Outbound::AnalogInput { channel, value }
    }

    pub fn status(status_type: impl Into<String>, message: impl Into<String>) -> Self {
        Outbound::Status {
            status_type: status_type.into(),
            message: message.into(),
        }
    }

    /// Encode the line, including its terminator
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }

    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Outbound::DigitalInput { channel, value } => {
                buf.put_slice(b"D:");
                buf.put_slice(channel.to_string().as_bytes());
                buf.put_slice(if *value { b":1" } else { b":0" });
            }
            Outbound::AnalogInput { channel, value } => {
                buf.put_slice(b"A:");
                buf.put_slice(channel.to_string().as_bytes());
                buf.put_u8(b':');
                buf.put_slice(value.to_string().as_bytes());
            }
            Outbound::Status { status_type, message } => {
                buf.put_slice(b"S:");
                buf.put_slice(status_type.as_bytes());
                buf.put_slice(b": ");
                buf.put_slice(message.as_bytes());
            }
        }
        buf.put_u8(b'\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_digital() {
        assert_eq!(Outbound::digital(3, true).encode().as_ref(), b"D:3:1\n");
        assert_eq!(Outbound::digital(12, false).encode().as_ref(), b"D:12:0\n");
    }

    #[test]
    fn test_encode_analog() {
        assert_eq!(Outbound::analog(7, 3.5).encode().as_ref(), b"A:7:3.5\n");
        assert_eq!(Outbound::analog(0, 1.0).encode().as_ref(), b"A:0:1\n");
        assert_eq!(Outbound::analog(1, -0.25).encode().as_ref(), b"A:1:-0.25\n");
    }

    #[test]
    fn test_encode_status() {
        let line = Outbound::status("battery", "low: 11.2V").encode();
        assert_eq!(line.as_ref(), b"S:battery: low: 11.2V\n");
    }

    #[test]
    fn test_encode_into_appends() {
        let mut buf = BytesMut::new();
        Outbound::digital(1, true).encode_into(&mut buf);
        Outbound::digital(2, false).encode_into(&mut buf);
        assert_eq!(buf.as_ref(), b"D:1:1\nD:2:0\n");
    }
}
