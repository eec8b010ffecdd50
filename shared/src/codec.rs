//! Length-prefixed framing: `[u32 little-endian length][payload]`.

use thiserror::Error;

pub const LENGTH_PREFIX: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("{buffered} unread bytes exceed buffer limit of {max}")]
    Overflow { buffered: usize, max: usize },
}

/// Prefixes a payload with its little-endian length.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// The bare player id the server writes right after accepting a connection.
pub fn encode_player_id(player_id: u32) -> [u8; LENGTH_PREFIX] {
    player_id.to_le_bytes()
}

pub fn decode_player_id(bytes: [u8; LENGTH_PREFIX]) -> u32 {
    u32::from_le_bytes(bytes)
}

/// Reassembles frames from an arbitrarily chunked byte stream.
///
/// Bytes are appended with [`FrameReader::extend`]; [`FrameReader::next_frame`] yields
/// each complete payload once it is fully buffered.
#[derive(Debug)]
pub struct FrameReader {
    buffer: Vec<u8>,
    /// Declared length of the message currently being read, once its prefix is consumed.
    pending: Option<usize>,
    max_frame_len: usize,
}

impl FrameReader {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            pending: None,
            max_frame_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Largest complete frame on the wire, prefix included.
    pub fn capacity(&self) -> usize {
        self.max_frame_len + LENGTH_PREFIX
    }

    /// Like [`FrameReader::extend`], but refuses to hold more than two full frames of
    /// unread bytes. A caller that drains frames between reads never gets near it.
    pub fn try_extend(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        let max = self.capacity() * 2;
        let buffered = self.buffer.len() + bytes.len();
        if buffered > max {
            return Err(FrameError::Overflow { buffered, max });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    pub fn in_message(&self) -> bool {
        self.pending.is_some()
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.pending.is_none() && self.buffer.len() >= LENGTH_PREFIX {
            let mut prefix = [0u8; LENGTH_PREFIX];
            prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX]);
            let len = u32::from_le_bytes(prefix) as usize;
            if len > self.max_frame_len {
                return Err(FrameError::TooLarge {
                    len,
                    max: self.max_frame_len,
                });
            }
            self.buffer.drain(..LENGTH_PREFIX);
            self.pending = Some(len);
        }

        match self.pending {
            Some(len) if self.buffer.len() >= len => {
                self.pending = None;
                Ok(Some(self.buffer.drain(..len).collect()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_has_le_prefix() {
        let frame = encode_frame(&[9, 8, 7]);
        assert_eq!(frame, vec![3, 0, 0, 0, 9, 8, 7]);
    }

    #[test]
    fn test_reader_handles_split_prefix_and_payload() {
        let mut reader = FrameReader::new(1024);
        let frame = encode_frame(b"hello");

        reader.extend(&frame[..2]);
        assert_eq!(reader.next_frame().unwrap(), None);
        assert!(!reader.in_message());

        reader.extend(&frame[2..6]);
        assert_eq!(reader.next_frame().unwrap(), None);
        assert!(reader.in_message());

        reader.extend(&frame[6..]);
        assert_eq!(reader.next_frame().unwrap(), Some(b"hello".to_vec()));
        assert!(!reader.in_message());
        assert_eq!(reader.buffered(), 0);
    }

    #[test]
    fn test_reader_yields_back_to_back_frames() {
        let mut reader = FrameReader::new(1024);
        let mut bytes = encode_frame(b"one");
        bytes.extend(encode_frame(b""));
        bytes.extend(encode_frame(b"three"));
        reader.extend(&bytes);

        assert_eq!(reader.next_frame().unwrap(), Some(b"one".to_vec()));
        assert_eq!(reader.next_frame().unwrap(), Some(Vec::new()));
        assert_eq!(reader.next_frame().unwrap(), Some(b"three".to_vec()));
        assert_eq!(reader.next_frame().unwrap(), None);
    }

    #[test]
    fn test_reader_rejects_oversized_prefix() {
        let mut reader = FrameReader::new(16);
        reader.extend(&(17u32).to_le_bytes());
        assert_eq!(
            reader.next_frame(),
            Err(FrameError::TooLarge { len: 17, max: 16 })
        );
    }

    #[test]
    fn test_try_extend_caps_unread_bytes() {
        let mut reader = FrameReader::new(8);
        assert_eq!(reader.capacity(), 12);
        assert!(reader.try_extend(&[0u8; 24]).is_ok());
        assert_eq!(
            reader.try_extend(&[0u8; 1]),
            Err(FrameError::Overflow {
                buffered: 25,
                max: 24
            })
        );
        assert_eq!(reader.buffered(), 24);
    }

    #[test]
    fn test_player_id_bytes() {
        assert_eq!(encode_player_id(258), [2, 1, 0, 0]);
        assert_eq!(decode_player_id([2, 1, 0, 0]), 258);
    }
}
