//! ByteRange arithmetic for PDF signatures.
//!
//! A PDF signature covers the whole file except the `/Contents` placeholder
//! itself, expressed as `[offset1 length1 offset2 length2]`. The placeholder
//! is a hex string (angle brackets included) whose size is fixed when the
//! signature field is reserved; the byte range must exclude exactly those
//! bytes, no more and no less, or viewers reject the signature.

use crate::error::{Error, Result};

/// Size in file bytes of the `/Contents` placeholder for a DER signature of
/// the given estimated size: two hex digits per byte plus the brackets.
pub fn placeholder_size(estimated_signature_size: usize) -> usize {
    estimated_signature_size * 2 + 2
}

/// Compute the byte range for a file of `file_size` whose placeholder
/// (opening `<` included) starts at `contents_offset`.
pub fn compute(file_size: usize, contents_offset: usize, placeholder: usize) -> [i64; 4] {
    let after_sig = (contents_offset + placeholder) as i64;
    [
        0,
        contents_offset as i64,
        after_sig,
        file_size as i64 - after_sig,
    ]
}

/// Check that a byte range starts at zero, ends at the file size, and has
/// no overlap between its two spans.
pub fn validate(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
    let [offset1, length1, offset2, length2] = *byte_range;
    if offset1 != 0 {
        return Err(Error::MalformedPdf(format!(
            "byte range must start at 0, got {}",
            offset1
        )));
    }
    if offset2 + length2 != file_size as i64 {
        return Err(Error::MalformedPdf(format!(
            "byte range must end at file size {}, got {}",
            file_size,
            offset2 + length2
        )));
    }
    if length1 > offset2 || length1 < 0 || length2 < 0 {
        return Err(Error::MalformedPdf(
            "byte range spans overlap or are negative".to_string(),
        ));
    }
    Ok(())
}

/// Concatenate the two byte-range spans: the exact bytes the signature
/// covers.
pub fn extract(data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
    let [offset1, length1, offset2, length2] = *byte_range;
    let end1 = (offset1 + length1) as usize;
    let end2 = (offset2 + length2) as usize;
    if end1 > data.len() || end2 > data.len() || offset1 < 0 || offset2 < 0 {
        return Err(Error::MalformedPdf(format!(
            "byte range {:?} exceeds file size {}",
            byte_range,
            data.len()
        )));
    }

    let mut out = Vec::with_capacity((length1 + length2) as usize);
    out.extend_from_slice(&data[offset1 as usize..end1]);
    out.extend_from_slice(&data[offset2 as usize..end2]);
    Ok(out)
}

/// Write the DER signature into the reserved placeholder, hex-encoded and
/// zero-padded to the placeholder width.
pub fn insert_signature(
    data: &mut [u8],
    contents_offset: usize,
    placeholder: usize,
    signature: &[u8],
) -> Result<()> {
    let hex_len = signature.len() * 2;
    if hex_len + 2 > placeholder {
        return Err(Error::Signing(format!(
            "signature ({} bytes) exceeds reserved placeholder ({} bytes)",
            signature.len(),
            (placeholder - 2) / 2
        )));
    }
    if contents_offset + placeholder > data.len() {
        return Err(Error::MalformedPdf(
            "placeholder extends past end of file".to_string(),
        ));
    }

    let region = &mut data[contents_offset..contents_offset + placeholder];
    region[0] = b'<';
    region[placeholder - 1] = b'>';
    let hex = bytes_to_hex(signature);
    region[1..1 + hex_len].copy_from_slice(hex.as_bytes());
    for b in &mut region[1 + hex_len..placeholder - 1] {
        *b = b'0';
    }
    Ok(())
}

/// Uppercase hex encoding.
fn bytes_to_hex(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8] = b"0123456789ABCDEF";
    let mut hex = String::with_capacity(bytes.len() * 2);
    for &byte in bytes {
        hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
        hex.push(HEX_CHARS[(byte & 0x0F) as usize] as char);
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_size() {
        assert_eq!(placeholder_size(1024), 2050);
    }

    #[test]
    fn test_compute_and_validate() {
        let range = compute(1000, 400, 100);
        assert_eq!(range, [0, 400, 500, 500]);
        validate(&range, 1000).unwrap();
    }

    #[test]
    fn test_validate_rejects_gap() {
        // second span ends before the file does
        assert!(validate(&[0, 100, 150, 40], 200).is_err());
        // does not start at zero
        assert!(validate(&[5, 100, 150, 50], 200).is_err());
        // spans overlap
        assert!(validate(&[0, 160, 150, 50], 200).is_err());
    }

    #[test]
    fn test_extract() {
        let data = b"AAABBBCCC";
        assert_eq!(extract(data, &[0, 3, 6, 3]).unwrap(), b"AAACCC");
        assert!(extract(data, &[0, 3, 6, 10]).is_err());
    }

    #[test]
    fn test_insert_signature() {
        let mut data = b"XX<00000000>YY".to_vec();
        insert_signature(&mut data, 2, 10, &[0xAB, 0xCD]).unwrap();
        assert_eq!(&data, b"XX<ABCD0000>YY");
    }

    #[test]
    fn test_insert_signature_too_large() {
        let mut data = b"XX<00000000>YY".to_vec();
        let err = insert_signature(&mut data, 2, 10, &[0; 5]).unwrap_err();
        assert!(matches!(err, Error::Signing(_)));
    }
}
