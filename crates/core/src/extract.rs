use crate::BackpackError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const BADGE_KEYWORD: &[u8] = b"openbadges";

/// Result of parsing an uploaded badge image: the assertion retrieval URL
/// recovered from the embedded metadata, plus the untouched image bytes for
/// later storage.
#[derive(Debug, Clone)]
pub struct ExtractedBadge {
    pub assertion_url: String,
    pub image: Vec<u8>,
}

/// Parses an uploaded file and recovers the embedded assertion URL.
///
/// Baked badge images carry the URL in a `tEXt` or uncompressed `iTXt` chunk
/// keyed `openbadges`. Pure parse, no side effects.
pub fn extract_badge(bytes: &[u8]) -> Result<ExtractedBadge, BackpackError> {
    if bytes.is_empty() {
        return Err(BackpackError::EmptyUpload);
    }

    let assertion_url = extract_assertion_url(bytes)?;
    Ok(ExtractedBadge {
        assertion_url,
        image: bytes.to_vec(),
    })
}

fn extract_assertion_url(bytes: &[u8]) -> Result<String, BackpackError> {
    if bytes.len() < PNG_SIGNATURE.len() || bytes[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(BackpackError::MalformedImage(
            "not a PNG image".to_string(),
        ));
    }

    // Chunk layout: 4-byte big-endian length, 4-byte type, data, 4-byte CRC.
    // The CRC is not verified; a corrupt text chunk surfaces as a missing or
    // unparseable keyword instead.
    let mut offset = PNG_SIGNATURE.len();
    while offset + 8 <= bytes.len() {
        let length =
            u32::from_be_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
                as usize;
        let chunk_type = &bytes[offset + 4..offset + 8];

        let data_start = offset + 8;
        let data_end = data_start
            .checked_add(length)
            .filter(|end| end + 4 <= bytes.len())
            .ok_or_else(|| BackpackError::MalformedImage("truncated chunk".to_string()))?;
        let data = &bytes[data_start..data_end];

        let payload = match chunk_type {
            b"tEXt" => parse_text_chunk(data),
            b"iTXt" => parse_itxt_chunk(data)?,
            b"IEND" => break,
            _ => None,
        };

        if let Some(payload) = payload {
            let url = std::str::from_utf8(payload)
                .map_err(|_| {
                    BackpackError::MalformedImage("badge metadata is not UTF-8".to_string())
                })?
                .trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(BackpackError::MalformedImage(
                    "embedded badge reference is not a URL".to_string(),
                ));
            }
            return Ok(url.to_string());
        }

        offset = data_end + 4;
    }

    Err(BackpackError::MalformedImage(
        "no badge metadata found in image".to_string(),
    ))
}

/// `tEXt`: keyword, NUL, latin-1 text.
fn parse_text_chunk(data: &[u8]) -> Option<&[u8]> {
    let nul = data.iter().position(|b| *b == 0)?;
    if &data[..nul] != BADGE_KEYWORD {
        return None;
    }
    Some(&data[nul + 1..])
}

/// `iTXt`: keyword, NUL, compression flag, compression method, language tag,
/// NUL, translated keyword, NUL, UTF-8 text.
fn parse_itxt_chunk(data: &[u8]) -> Result<Option<&[u8]>, BackpackError> {
    let nul = match data.iter().position(|b| *b == 0) {
        Some(n) => n,
        None => return Ok(None),
    };
    if &data[..nul] != BADGE_KEYWORD {
        return Ok(None);
    }

    let rest = &data[nul + 1..];
    if rest.len() < 2 {
        return Err(BackpackError::MalformedImage(
            "truncated badge metadata".to_string(),
        ));
    }
    if rest[0] != 0 {
        return Err(BackpackError::MalformedImage(
            "compressed badge metadata is not supported".to_string(),
        ));
    }

    // Skip language tag and translated keyword.
    let mut cursor = &rest[2..];
    for _ in 0..2 {
        let nul = cursor.iter().position(|b| *b == 0).ok_or_else(|| {
            BackpackError::MalformedImage("truncated badge metadata".to_string())
        })?;
        cursor = &cursor[nul + 1..];
    }

    Ok(Some(cursor))
}


#[cfg(test)]
mod tests {
    use super::test_support::{baked_png, push_chunk};
    use super::*;

    #[test]
    fn empty_upload_rejected() {
        assert!(matches!(
            extract_badge(&[]),
            Err(BackpackError::EmptyUpload)
        ));
    }

    #[test]
    fn non_png_rejected() {
        assert!(matches!(
            extract_badge(b"GIF89a definitely not a png"),
            Err(BackpackError::MalformedImage(_))
        ));
    }

    #[test]
    fn extracts_url_from_text_chunk() {
        let png = baked_png("https://issuer.test/assertions/42");
        let extracted = extract_badge(&png).unwrap();
        assert_eq!(extracted.assertion_url, "https://issuer.test/assertions/42");
        assert_eq!(extracted.image, png);
    }

    #[test]
    fn extracts_url_from_itxt_chunk() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        push_chunk(&mut png, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]);
        let mut text = b"openbadges\0".to_vec();
        text.extend_from_slice(&[0, 0]); // uncompressed
        text.extend_from_slice(b"\0\0"); // empty language tag + translated keyword
        text.extend_from_slice(b"https://issuer.test/assertions/7");
        push_chunk(&mut png, b"iTXt", &text);
        push_chunk(&mut png, b"IEND", &[]);

        let extracted = extract_badge(&png).unwrap();
        assert_eq!(extracted.assertion_url, "https://issuer.test/assertions/7");
    }

    #[test]
    fn compressed_itxt_rejected() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        let mut text = b"openbadges\0".to_vec();
        text.extend_from_slice(&[1, 0]); // compressed flag set
        text.extend_from_slice(b"\0\0deadbeef");
        push_chunk(&mut png, b"iTXt", &text);
        push_chunk(&mut png, b"IEND", &[]);

        assert!(matches!(
            extract_badge(&png),
            Err(BackpackError::MalformedImage(_))
        ));
    }

    #[test]
    fn png_without_badge_chunk_rejected() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        push_chunk(&mut png, b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]);
        push_chunk(&mut png, b"IEND", &[]);

        assert!(matches!(
            extract_badge(&png),
            Err(BackpackError::MalformedImage(_))
        ));
    }

    #[test]
    fn non_url_payload_rejected() {
        let png = baked_png("not-a-url");
        assert!(matches!(
            extract_badge(&png),
            Err(BackpackError::MalformedImage(_))
        ));
    }

    #[test]
    fn truncated_chunk_rejected() {
        let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        png.extend_from_slice(&1000u32.to_be_bytes());
        png.extend_from_slice(b"tEXt");
        png.extend_from_slice(b"short");

        assert!(matches!(
            extract_badge(&png),
            Err(BackpackError::MalformedImage(_))
        ));
    }
}
