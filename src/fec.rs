// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reed-Solomon forward error correction over the 28-byte `header || data`
//! block, producing a 32-byte codeword with 4 parity bytes. Corrects up to 2
//! byte errors per frame.

use crate::constants::FEC_SYMBOLS;
use reed_solomon::{Decoder, Encoder};

/// Encodes a 28-byte `header || data` block into a 32-byte RS codeword.
///
/// # Panics
///
/// Panics if `message` is not exactly `28 - FEC_SYMBOLS + FEC_SYMBOLS` bytes;
/// callers in this crate always pass a block built by [`crate::frame`].
#[must_use]
pub fn encode_fec(message: &[u8]) -> Vec<u8> {
    let encoder = Encoder::new(FEC_SYMBOLS);
    encoder.encode(message).to_vec()
}

/// Decodes a Reed-Solomon codeword, correcting up to 2 byte errors.
///
/// Returns the corrected message (parity stripped) and the number of
/// corrected byte errors, or `-1` if correction capacity was exceeded.
#[must_use]
pub fn decode_fec(codeword: &[u8]) -> (Vec<u8>, i32) {
    let decoder = Decoder::new(FEC_SYMBOLS);
    match decoder.correct_err_count(codeword, None) {
        Ok((corrected, errors)) => {
            let message_len = codeword.len() - FEC_SYMBOLS;
            let corrected: &[u8] = &corrected;
            (corrected[..message_len].to_vec(), errors as i32)
        }
        Err(_) => (codeword.to_vec(), -1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_message() -> Vec<u8> {
        (0..28u8).collect()
    }

    #[test]
    fn test_round_trip_no_errors() {
        let message = sample_message();
        let codeword = encode_fec(&message);
        assert_eq!(codeword.len(), 32);
        let (decoded, errors) = decode_fec(&codeword);
        assert_eq!(decoded, message);
        assert_eq!(errors, 0);
    }

    #[rstest::rstest]
    #[case(0)]
    #[case(5)]
    #[case(31)]
    pub fn test_single_byte_flip_corrects(#[case] flip_at: usize) {
        let message = sample_message();
        let mut codeword = encode_fec(&message);
        codeword[flip_at] ^= 0xFF;
        let (decoded, errors) = decode_fec(&codeword);
        assert_eq!(decoded, message);
        assert!(errors >= 1);
    }

    #[test]
    fn test_two_byte_flips_correct() {
        let message = sample_message();
        let mut codeword = encode_fec(&message);
        codeword[2] ^= 0xFF;
        codeword[20] ^= 0x01;
        let (decoded, errors) = decode_fec(&codeword);
        assert_eq!(decoded, message);
        assert!(errors >= 1);
    }

    #[test]
    fn test_excessive_errors_reported_uncorrectable() {
        let message = sample_message();
        let mut codeword = encode_fec(&message);
        for b in codeword.iter_mut().take(6) {
            *b ^= 0xFF;
        }
        let (_decoded, errors) = decode_fec(&codeword);
        assert_eq!(errors, -1);
    }
}
