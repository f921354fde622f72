//! XML Encoding Detection and Conversion
//!
//! Detects UTF-16 input based on BOM or byte patterns and converts it to
//! UTF-8 for parsing. DTSX packages saved by SQL Server tooling are
//! frequently UTF-16, so this runs on every document before tokenization.

/// Detected encoding of XML input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl XmlEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return XmlEncoding::Utf8;
        }

        // Check for BOM
        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => XmlEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => XmlEncoding::Utf16Be,
            // UTF-8 BOM: 0xEF 0xBB 0xBF (detected but treated as UTF-8)
            (0xEF, 0xBB) if input.len() >= 3 && input[2] == 0xBF => XmlEncoding::Utf8,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => XmlEncoding::Utf16Be,
            (b'<', 0x00) => XmlEncoding::Utf16Le,
            _ => XmlEncoding::Utf8,
        }
    }
}

/// Convert possibly-UTF-16 bytes to UTF-8
///
/// Returns the input unchanged (minus any UTF-8 BOM) if already UTF-8.
pub fn convert_to_utf8(input: Vec<u8>) -> Result<Vec<u8>, String> {
    match XmlEncoding::detect(&input) {
        XmlEncoding::Utf8 => {
            // Skip UTF-8 BOM if present
            if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
                Ok(input[3..].to_vec())
            } else {
                Ok(input)
            }
        }
        XmlEncoding::Utf16Le => convert_utf16_to_utf8(&input, &[0xFF, 0xFE], u16::from_le_bytes),
        XmlEncoding::Utf16Be => convert_utf16_to_utf8(&input, &[0xFE, 0xFF], u16::from_be_bytes),
    }
}

/// Convert UTF-16 (either endianness) to UTF-8
fn convert_utf16_to_utf8(
    input: &[u8],
    bom: &[u8],
    from_bytes: fn([u8; 2]) -> u16,
) -> Result<Vec<u8>, String> {
    let start = if input.starts_with(bom) { 2 } else { 0 };
    let bytes = &input[start..];

    if bytes.len() % 2 != 0 {
        return Err("invalid UTF-16: odd number of bytes".to_string());
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| from_bytes([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&code_units)
        .map(|s| s.into_bytes())
        .map_err(|e| format!("invalid UTF-16: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf8() {
        assert_eq!(XmlEncoding::detect(b"<root/>"), XmlEncoding::Utf8);
        assert_eq!(XmlEncoding::detect(b"<?xml"), XmlEncoding::Utf8);
    }

    #[test]
    fn test_detect_utf16_le_bom() {
        assert_eq!(XmlEncoding::detect(&[0xFF, 0xFE, b'<', 0x00]), XmlEncoding::Utf16Le);
    }

    #[test]
    fn test_detect_utf16_be_bom() {
        assert_eq!(XmlEncoding::detect(&[0xFE, 0xFF, 0x00, b'<']), XmlEncoding::Utf16Be);
    }

    #[test]
    fn test_detect_utf16_without_bom() {
        assert_eq!(XmlEncoding::detect(&[b'<', 0x00, b'r', 0x00]), XmlEncoding::Utf16Le);
        assert_eq!(XmlEncoding::detect(&[0x00, b'<', 0x00, b'r']), XmlEncoding::Utf16Be);
    }

    #[test]
    fn test_convert_utf16_le() {
        let utf16_le = vec![0xFF, 0xFE, b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>', 0x00];
        assert_eq!(convert_to_utf8(utf16_le).unwrap(), b"<r/>");
    }

    #[test]
    fn test_convert_utf16_be() {
        let utf16_be = vec![0xFE, 0xFF, 0x00, b'<', 0x00, b'r', 0x00, b'/', 0x00, b'>'];
        assert_eq!(convert_to_utf8(utf16_be).unwrap(), b"<r/>");
    }

    #[test]
    fn test_utf8_passthrough() {
        let utf8 = b"<root>hello</root>".to_vec();
        assert_eq!(convert_to_utf8(utf8.clone()).unwrap(), utf8);
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let with_bom = [&[0xEF, 0xBB, 0xBF][..], b"<r/>"].concat();
        assert_eq!(convert_to_utf8(with_bom).unwrap(), b"<r/>");
    }
}
