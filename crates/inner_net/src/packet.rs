//! Binary packet codec for the inner network.
//!
//! A [`Packet`] is an ordered byte buffer with a two-byte opcode prefix and
//! positional primitive fields. There is no per-field tagging: the byte
//! layout written by the producer must exactly match the read order of the
//! consumer, per the message catalogue in [`crate::messages`].
//!
//! Wire framing is `[u16 LE length][opcode1][opcode2][payload]`, where the
//! length counts every byte *after* the length field itself. The transport
//! layer strips the length prefix before a packet is constructed for decode.

use crate::error::PacketError;

/// Size of the frame length prefix on the wire.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Size of the opcode prefix at the start of every packet body.
pub const OPCODES_SIZE: usize = 2;

/// Largest frame body (opcodes + payload) the 16-bit length prefix can carry.
pub const MAX_FRAME_BODY: usize = u16::MAX as usize;

/// An inner-network packet: opcode prefix plus positional fields.
///
/// Created either for outbound send (built field-by-field, then finalized
/// with [`Packet::into_frame`]) or for inbound decode (constructed from a
/// received frame body, fields consumed by sequential reads). A packet is
/// exclusively owned by one send or one decode operation.
#[derive(Debug, Clone)]
pub struct Packet {
    buf: Vec<u8>,
    cursor: usize,
}

impl Packet {
    /// Starts a writable packet whose first two bytes are the opcode path.
    pub fn new(opcodes: [u8; 2]) -> Self {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&opcodes);
        Self {
            buf,
            cursor: OPCODES_SIZE,
        }
    }

    /// Constructs a packet over a received frame body (length prefix already
    /// stripped by the transport). The read cursor starts after the opcodes.
    pub fn from_frame_body(body: Vec<u8>) -> Result<Self, PacketError> {
        if body.len() < OPCODES_SIZE {
            return Err(PacketError::MissingOpcodes { len: body.len() });
        }
        Ok(Self {
            buf: body,
            cursor: OPCODES_SIZE,
        })
    }

    /// Protocol layer selector (first opcode byte).
    pub fn first_opcode(&self) -> u8 {
        self.buf[0]
    }

    /// Message kind within the layer (second opcode byte).
    pub fn second_opcode(&self) -> u8 {
        self.buf[1]
    }

    /// Total body length, opcodes included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes left between the read cursor and the end of the body.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// Finalizes the packet for transmission, prefixing the body with its
    /// little-endian 16-bit length.
    pub fn into_frame(self) -> Result<Vec<u8>, PacketError> {
        if self.buf.len() > MAX_FRAME_BODY {
            return Err(PacketError::Oversize {
                len: self.buf.len(),
                max: MAX_FRAME_BODY,
            });
        }
        let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + self.buf.len());
        frame.extend_from_slice(&(self.buf.len() as u16).to_le_bytes());
        frame.extend_from_slice(&self.buf);
        Ok(frame)
    }

    // ------------------------------------------------------------------
    // Writers: append-only, little-endian.
    // ------------------------------------------------------------------

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Booleans travel as a single byte, zero meaning false.
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Strings travel as a `u16 LE` byte length followed by UTF-8 bytes.
    /// Oversized strings are truncated at the field limit.
    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(u16::MAX as usize);
        self.buf.extend_from_slice(&(len as u16).to_le_bytes());
        self.buf.extend_from_slice(&bytes[..len]);
    }

    /// Raw bytes, no length prefix; the consumer knows the count.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    /// Date-times travel as `i64 LE` milliseconds since the Unix epoch.
    pub fn write_timestamp(&mut self, unix_millis: i64) {
        self.write_i64(unix_millis);
    }

    // ------------------------------------------------------------------
    // Readers: sequential, cursor-advancing, bounds-checked.
    // ------------------------------------------------------------------

    fn take(&mut self, needed: usize) -> Result<&[u8], PacketError> {
        if self.remaining() < needed {
            return Err(PacketError::Truncated {
                offset: self.cursor,
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.cursor..self.cursor + needed];
        self.cursor += needed;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, PacketError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u16(&mut self) -> Result<u16, PacketError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, PacketError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64, PacketError> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_string(&mut self) -> Result<String, PacketError> {
        let offset = self.cursor;
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PacketError::InvalidString { offset })
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, PacketError> {
        Ok(self.take(count)?.to_vec())
    }

    pub fn read_timestamp(&mut self) -> Result<i64, PacketError> {
        self.read_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_round_trip_in_write_order() {
        let mut p = Packet::new([0x01, 0x02]);
        p.write_u8(0xab);
        p.write_i16(-7);
        p.write_i32(123_456);
        p.write_i64(-9_876_543_210);
        p.write_bool(true);
        p.write_string("bob");
        p.write_bytes(&[1, 2, 3, 4]);

        let frame = p.into_frame().expect("frame should encode");
        let body_len = u16::from_le_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(body_len, frame.len() - LENGTH_PREFIX_SIZE);

        let mut d = Packet::from_frame_body(frame[LENGTH_PREFIX_SIZE..].to_vec())
            .expect("body should parse");
        assert_eq!(d.first_opcode(), 0x01);
        assert_eq!(d.second_opcode(), 0x02);
        assert_eq!(d.read_u8().unwrap(), 0xab);
        assert_eq!(d.read_i16().unwrap(), -7);
        assert_eq!(d.read_i32().unwrap(), 123_456);
        assert_eq!(d.read_i64().unwrap(), -9_876_543_210);
        assert!(d.read_bool().unwrap());
        assert_eq!(d.read_string().unwrap(), "bob");
        assert_eq!(d.read_bytes(4).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(d.remaining(), 0);
    }

    #[test]
    fn read_past_end_is_an_error_not_a_panic() {
        let mut p = Packet::from_frame_body(vec![0x01, 0x02, 0xff]).unwrap();
        assert_eq!(p.read_u8().unwrap(), 0xff);
        let err = p.read_i32().expect_err("read past end should fail");
        assert!(matches!(err, PacketError::Truncated { .. }));
    }

    #[test]
    fn body_without_opcodes_is_rejected() {
        let err = Packet::from_frame_body(vec![0x01]).expect_err("one byte is not enough");
        assert!(matches!(err, PacketError::MissingOpcodes { len: 1 }));
    }

    #[test]
    fn string_length_prefix_is_bounds_checked() {
        // Claims 200 bytes of string data but carries only 2.
        let mut p = Packet::from_frame_body(vec![0x00, 0x00, 200, 0, b'h', b'i']).unwrap();
        let err = p.read_string().expect_err("truncated string should fail");
        assert!(matches!(err, PacketError::Truncated { .. }));
    }
}
