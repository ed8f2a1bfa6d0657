//! # Metadata Module
//!
//! EXIF handling on both ends of the pipeline.
//!
//! ## Reading
//! - Orientation (tag 0x0112), used by the normalizer to upright images
//!
//! ## Writing
//! A small text template (artist, copyright, description, user comment)
//! serialized as an EXIF APP1 segment into accepted JPEG outputs. Empty
//! fields are not written.

use exif::experimental::Writer;
use exif::{Field, In, Reader, Tag, Value};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::TransformError;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP0: [u8; 2] = [0xFF, 0xE0];
const APP1: [u8; 2] = [0xFF, 0xE1];
const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";
/// Character code prefix required in front of an ASCII UserComment
const ASCII_COMMENT_PREFIX: &[u8; 8] = b"ASCII\0\0\0";

/// Text fields embedded into accepted outputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataTemplate {
    pub artist: String,
    pub copyright: String,
    pub description: String,
    pub user_comment: String,
}

impl MetadataTemplate {
    /// True when no field would be written
    pub fn is_empty(&self) -> bool {
        self.artist.is_empty()
            && self.copyright.is_empty()
            && self.description.is_empty()
            && self.user_comment.is_empty()
    }

    fn fields(&self) -> Vec<Field> {
        let ascii = |tag: Tag, text: &str| Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        };

        let mut fields = Vec::new();
        if !self.artist.is_empty() {
            fields.push(ascii(Tag::Artist, &self.artist));
        }
        if !self.copyright.is_empty() {
            fields.push(ascii(Tag::Copyright, &self.copyright));
        }
        if !self.description.is_empty() {
            fields.push(ascii(Tag::ImageDescription, &self.description));
        }
        if !self.user_comment.is_empty() {
            let mut comment = ASCII_COMMENT_PREFIX.to_vec();
            comment.extend_from_slice(self.user_comment.as_bytes());
            fields.push(Field {
                tag: Tag::UserComment,
                ifd_num: In::PRIMARY,
                value: Value::Undefined(comment, 0),
            });
        }
        fields
    }
}

/// Read the EXIF orientation (1-8) from raw image bytes.
/// Returns 1 (upright) if there is no EXIF data or no orientation tag.
pub fn read_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return 1,
    };

    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Rotate/flip so the image displays upright
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Insert the template into an encoded JPEG as an EXIF APP1 segment.
///
/// The segment goes right after SOI (or after a leading JFIF APP0). An
/// empty template returns the input unchanged.
pub fn embed_exif(jpeg: &[u8], template: &MetadataTemplate) -> Result<Vec<u8>, TransformError> {
    if template.is_empty() {
        return Ok(jpeg.to_vec());
    }
    if jpeg.len() < 4 || jpeg[..2] != SOI {
        return Err(TransformError::Metadata("not a JPEG stream".to_string()));
    }

    let fields = template.fields();
    let mut writer = Writer::new();
    for field in &fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer
        .write(&mut tiff, false)
        .map_err(|e| TransformError::Metadata(e.to_string()))?;
    let tiff = tiff.into_inner();

    // Segment length counts itself (2 bytes) but not the marker
    let segment_len = 2 + EXIF_HEADER.len() + tiff.len();
    if segment_len > u16::MAX as usize {
        return Err(TransformError::Metadata(format!(
            "EXIF block of {} bytes does not fit in one segment",
            segment_len
        )));
    }

    let insert_at = app1_insert_offset(jpeg);
    let mut out = Vec::with_capacity(jpeg.len() + segment_len + 2);
    out.extend_from_slice(&jpeg[..insert_at]);
    out.extend_from_slice(&APP1);
    out.extend_from_slice(&(segment_len as u16).to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[insert_at..]);
    Ok(out)
}

fn app1_insert_offset(jpeg: &[u8]) -> usize {
    if jpeg.len() >= 6 && jpeg[2..4] == APP0 {
        let len = u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        let end = 4 + len;
        if end <= jpeg.len() {
            return end;
        }
    }
    2
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{Rgb, RgbImage};

    fn tiny_jpeg() -> Vec<u8> {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 80, 40]));
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode_image(&img)
            .unwrap();
        out
    }

    fn ascii_field(exif: &exif::Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(parts) => parts
                .first()
                .map(|p| String::from_utf8_lossy(p).to_string()),
            _ => None,
        }
    }

    #[test]
    fn empty_template_leaves_bytes_alone() {
        let jpeg = tiny_jpeg();
        let out = embed_exif(&jpeg, &MetadataTemplate::default()).unwrap();
        assert_eq!(out, jpeg);
    }

    #[test]
    fn embedded_fields_read_back() {
        let template = MetadataTemplate {
            artist: "Jane Doe".to_string(),
            copyright: "CC-BY".to_string(),
            description: String::new(),
            user_comment: "curated".to_string(),
        };
        let out = embed_exif(&tiny_jpeg(), &template).unwrap();

        let exif = Reader::new()
            .read_from_container(&mut Cursor::new(&out))
            .unwrap();
        assert_eq!(ascii_field(&exif, Tag::Artist).as_deref(), Some("Jane Doe"));
        assert_eq!(ascii_field(&exif, Tag::Copyright).as_deref(), Some("CC-BY"));
        assert!(exif.get_field(Tag::ImageDescription, In::PRIMARY).is_none());
        assert!(exif.get_field(Tag::UserComment, In::PRIMARY).is_some());

        // still decodes as an image
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 16);
    }

    #[test]
    fn non_jpeg_input_is_rejected() {
        let template = MetadataTemplate {
            artist: "x".to_string(),
            ..Default::default()
        };
        assert!(embed_exif(b"\x89PNG\r\n\x1a\n", &template).is_err());
    }

    #[test]
    fn orientation_defaults_to_upright() {
        assert_eq!(read_orientation(&tiny_jpeg()), 1);
        assert_eq!(read_orientation(b"garbage"), 1);
    }

    #[test]
    fn orientation_six_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 10));
        let rotated = apply_orientation(img, 6);
        assert_eq!((rotated.width(), rotated.height()), (10, 40));
    }
}
