use crate::error::AppError;

pub const BYTES_PER_PIXEL: usize = 3;

/// Row-major RGB bytes, no alpha. Dimensions are not stored; readers assume a square.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    bytes: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixel_count(&self) -> usize {
        self.bytes.len() / BYTES_PER_PIXEL
    }

    /// Side of the largest square that fits the buffer's whole pixels.
    pub fn side(&self) -> usize {
        self.pixel_count().isqrt()
    }

    /// The side length and the bytes that make up the square. Anything past
    /// `side * side` pixels is dropped, including a partial trailing pixel.
    pub fn square(&self) -> (usize, &[u8]) {
        let side = self.side();
        (side, &self.bytes[..side * side * BYTES_PER_PIXEL])
    }
}

/// Lowercase hex, two characters per byte.
pub fn encode_hex(buffer: &PixelBuffer) -> String {
    hex::encode(buffer.as_bytes())
}

pub fn decode_hex(blob: &str) -> Result<PixelBuffer, AppError> {
    if blob.len() % 2 != 0 {
        return Err(AppError::Format(format!(
            "hex blob has odd length {}",
            blob.len()
        )));
    }

    hex::decode(blob)
        .map(PixelBuffer::new)
        .map_err(|err| AppError::Format(format!("invalid hex blob: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{decode_hex, encode_hex, PixelBuffer};
    use crate::error::AppError;

    fn square_buffer(side: usize) -> PixelBuffer {
        let bytes = (0..side * side * 3).map(|i| (i * 31 % 256) as u8).collect();
        PixelBuffer::new(bytes)
    }

    #[test]
    fn square_buffers_survive_the_hex_trip() {
        for side in [1, 2, 17, 200] {
            let buffer = square_buffer(side);
            let blob = encode_hex(&buffer);
            assert_eq!(blob.len(), buffer.as_bytes().len() * 2);

            let decoded = decode_hex(&blob).unwrap();
            assert_eq!(decoded, buffer);
            assert_eq!(decoded.side(), side);
        }
    }

    #[test]
    fn encoding_is_lowercase_and_decoding_accepts_either_case() {
        let buffer = PixelBuffer::new(vec![0xAB, 0x0C, 0xFF]);
        assert_eq!(encode_hex(&buffer), "ab0cff");
        assert_eq!(decode_hex("AB0CFF").unwrap(), buffer);
    }

    #[test]
    fn odd_length_is_a_format_error() {
        for blob in ["a", "abc", "ab0cf"] {
            assert!(matches!(decode_hex(blob), Err(AppError::Format(_))));
        }
    }

    #[test]
    fn non_hex_characters_are_a_format_error() {
        assert!(matches!(decode_hex("zz"), Err(AppError::Format(_))));
    }

    #[test]
    fn trailing_bytes_are_dropped_from_the_square() {
        // 4 whole pixels plus 2 stray bytes -> 2x2
        let buffer = PixelBuffer::new(vec![7; 14]);
        let (side, rgb) = buffer.square();
        assert_eq!(side, 2);
        assert_eq!(rgb.len(), 12);

        // 5 pixels -> floor(sqrt(5)) = 2, the fifth pixel is dropped
        let buffer = PixelBuffer::new(vec![1; 15]);
        assert_eq!(buffer.square().0, 2);
        assert_eq!(buffer.square().1.len(), 12);

        let buffer = PixelBuffer::new(vec![1, 2]);
        assert_eq!(buffer.square(), (0, &[][..]));
    }
}
