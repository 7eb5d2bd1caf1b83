//! PDF text and page-image extraction using lopdf and pdf-extract.

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use lopdf::{Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{PdfType, Result};
use crate::error::PdfError;

/// A loaded PDF document.
pub struct PdfExtractor {
    document: Document,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Load a PDF from bytes, decrypting empty-password PDFs.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut document = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let raw_data = if document.is_encrypted() {
            if document.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes.
            let mut decrypted = Vec::new();
            document
                .save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        let page_count = document.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        Ok(Self { document, raw_data })
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Extract the embedded text of the whole document.
    pub fn extract_text(&self) -> Result<String> {
        pdf_extract::extract_text_from_mem(&self.raw_data)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))
    }

    /// Classify the document by its text and image content.
    pub fn analyze(&self, min_text_length: usize) -> PdfType {
        let has_text = self
            .extract_text()
            .map(|t| t.trim().len() >= min_text_length)
            .unwrap_or(false);
        let has_images = self.first_page_image().is_ok();

        let pdf_type = match (has_text, has_images) {
            (true, false) => PdfType::Text,
            (false, true) => PdfType::Image,
            (true, true) => PdfType::Hybrid,
            (false, false) => PdfType::Empty,
        };

        debug!(
            "PDF analysis: has_text={}, has_images={} -> {:?}",
            has_text, has_images, pdf_type
        );
        pdf_type
    }

    /// Encoded image of the first page.
    ///
    /// JPEG streams are returned as stored; raw RGB/gray samples are
    /// re-encoded as PNG.
    pub fn first_page_image(&self) -> Result<Vec<u8>> {
        let pages = self.document.get_pages();
        let page_id = *pages.values().next().ok_or(PdfError::NoPages)?;

        self.page_image_objects(page_id)
            .into_iter()
            .find_map(|obj| self.encode_image_object(obj))
            .ok_or(PdfError::NoImage)
    }

    fn page_image_objects(&self, page_id: ObjectId) -> Vec<&Object> {
        let doc = &self.document;
        let Some(resources) = self.page_resources(page_id) else {
            return Vec::new();
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return Vec::new();
        };
        let Ok((_, Object::Dictionary(xobjects))) = doc.dereference(xobjects) else {
            return Vec::new();
        };

        xobjects
            .iter()
            .filter_map(|(_, obj)| doc.dereference(obj).ok().map(|(_, obj)| obj))
            .collect()
    }

    /// Resources of a page, following `Parent` inheritance.
    fn page_resources(&self, node_id: ObjectId) -> Option<&lopdf::Dictionary> {
        let doc = &self.document;
        let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
            return None;
        };

        if let Ok(resources) = dict.get(b"Resources") {
            if let Ok((_, Object::Dictionary(resources))) = doc.dereference(resources) {
                return Some(resources);
            }
        }

        match dict.get(b"Parent") {
            Ok(Object::Reference(parent_id)) => self.page_resources(*parent_id),
            _ => None,
        }
    }

    fn encode_image_object(&self, obj: &Object) -> Option<Vec<u8>> {
        let Object::Stream(stream) = obj else {
            return None;
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
            return None;
        }

        let width = dimension(dict.get(b"Width").ok()?)?;
        let height = dimension(dict.get(b"Height").ok()?)?;
        trace!("Found image object: {}x{}", width, height);

        let filter = dict.get(b"Filter").ok().and_then(|f| match f {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        });

        match filter {
            Some(b"DCTDecode") => return Some(stream.content.clone()),
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Unsupported image filter");
                return None;
            }
            _ => {}
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());

        let color_space = dict
            .get(b"ColorSpace")
            .ok()
            .and_then(|o| match o {
                Object::Name(name) => Some(name.as_slice()),
                Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
                Object::Reference(r) => self
                    .document
                    .get_object(*r)
                    .ok()
                    .and_then(|o| o.as_name().ok()),
                _ => None,
            })
            .unwrap_or(b"DeviceRGB");

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);
        if bits != 8 {
            trace!("Unsupported bits per component: {}", bits);
            return None;
        }

        let image = raw_to_image(&data, width, height, color_space)?;
        let mut encoded = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .ok()?;
        Some(encoded)
    }
}

/// A positive image dimension; anything else marks the image as unusable.
fn dimension(obj: &Object) -> Option<u32> {
    u32::try_from(obj.as_i64().ok()?).ok().filter(|d| *d > 0)
}

fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let rgb_len = pixels.checked_mul(3)?;

    let rgba: Vec<u8> = match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= rgb_len => data[..rgb_len]
            .chunks(3)
            .flat_map(|c| [c[0], c[1], c[2], 255])
            .collect(),
        b"DeviceGray" | b"G" if data.len() >= pixels => data[..pixels]
            .iter()
            .flat_map(|&g| [g, g, g, 255])
            .collect(),
        _ => {
            trace!(
                "Could not decode image: data_len={}, colorspace={:?}",
                data.len(),
                String::from_utf8_lossy(color_space)
            );
            return None;
        }
    };

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::PdfConfig;
    use crate::pdf::{prepare, PdfSource};
    use lopdf::{dictionary, Stream};

    fn image_pdf(image: Stream) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(image);
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"q 100 0 0 100 0 0 cm /Im0 Do Q".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_invalid_pdf() {
        assert!(matches!(
            PdfExtractor::load(b"not a pdf"),
            Err(PdfError::Parse(_))
        ));
    }

    #[test]
    fn test_jpeg_page_image_returned_as_stored() {
        let jpeg = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10, 0xff, 0xd9];
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg.clone(),
        );
        let extractor = PdfExtractor::load(&image_pdf(stream)).unwrap();
        assert_eq!(extractor.page_count(), 1);
        assert_eq!(extractor.first_page_image().unwrap(), jpeg);
    }

    #[test]
    fn test_raw_gray_image_encoded_as_png() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0, 64, 128, 255],
        );
        let pdf = image_pdf(stream);

        let config = PdfConfig {
            prefer_embedded_text: false,
            ..PdfConfig::default()
        };
        let source = prepare(&pdf, &config).unwrap();
        let PdfSource::Scanned(png) = source else {
            panic!("expected a scanned page");
        };
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 2));
    }

    #[test]
    fn test_invalid_image_dimensions_are_rejected() {
        for (width, height) in [(-1, -1), (0, 4), (4, 0), (i64::from(u32::MAX) + 1, 1)] {
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width,
                    "Height" => height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                },
                vec![0; 12],
            );
            let pdf = image_pdf(stream);
            let config = PdfConfig {
                prefer_embedded_text: false,
                ..PdfConfig::default()
            };
            assert!(
                matches!(prepare(&pdf, &config), Err(PdfError::NoImage)),
                "{}x{}",
                width,
                height
            );
        }
    }

    #[test]
    fn test_huge_dimensions_do_not_overflow() {
        assert!(raw_to_image(&[0; 12], u32::MAX, u32::MAX, b"DeviceRGB").is_none());
        assert!(raw_to_image(&[0; 12], u32::MAX, 2, b"DeviceGray").is_none());
    }

    #[test]
    fn test_raw_image_too_short() {
        assert!(raw_to_image(&[1, 2, 3], 2, 2, b"DeviceRGB").is_none());
        assert!(raw_to_image(&[1, 2, 3, 4], 2, 2, b"DeviceGray").is_some());
    }
}
