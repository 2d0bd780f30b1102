use crate::types::*;
use image::{DynamicImage, GenericImageView, ImageFormat};
use lopdf::{Dictionary, Document as PdfDocument, Object, ObjectId};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, Str};
use std::collections::BTreeMap;
use std::io::Cursor;

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;

const TEXT_LEFT: f32 = 40.0;
const TEXT_TOP: f32 = 800.0;
const TEXT_BOTTOM: f32 = 40.0;
const FONT_SIZE: f32 = 12.0;
const LEADING: f32 = 14.4;

pub struct PdfProcessor;

/// Sequential object ids for a `pdf_writer::Pdf`.
struct RefAllocator(i32);

impl RefAllocator {
    fn new() -> Self {
        Self(1)
    }

    fn alloc(&mut self) -> Ref {
        let id = Ref::new(self.0);
        self.0 += 1;
        id
    }
}

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }

    /// Compress every unfiltered stream and drop unreferenced objects.
    pub fn optimize_pdf(&self, content: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let mut doc = PdfDocument::load_mem(content)?;

        let pruned = doc.prune_objects();
        let emptied = doc.delete_zero_length_streams();
        doc.compress();

        let mut output = Vec::new();
        doc.save_to(&mut output)?;

        log::info!(
            "PDF optimized: {} -> {} bytes ({} objects pruned, {} empty streams removed)",
            content.len(),
            output.len(),
            pruned.len(),
            emptied.len()
        );
        Ok(output)
    }

    /// Concatenate the pages of every input, in order, into one document.
    ///
    /// Each page is detached from its source page tree, carrying along any
    /// attributes it inherited from there, and hung under a single new tree.
    pub fn merge_pdfs(&self, inputs: &[&[u8]]) -> Result<Vec<u8>, ConversionError> {
        if inputs.is_empty() {
            return Err(ConversionError::InvalidContent {
                message: "no PDF documents to merge".to_string(),
            });
        }

        let mut max_id = 1;
        let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
        let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

        for content in inputs {
            let mut doc = PdfDocument::load_mem(content)?;
            doc.renumber_objects_with(max_id);
            max_id = doc.max_id + 1;

            for page_id in doc.get_pages().into_values() {
                pages.push((page_id, detach_page(&doc, page_id)?));
            }
            objects.extend(doc.objects);
        }

        let mut merged = PdfDocument::with_version("1.5");
        let mut catalog: Option<(ObjectId, Dictionary)> = None;

        for (object_id, object) in objects {
            let type_name = object.type_name().unwrap_or_default().to_string();
            match type_name.as_str() {
                "Catalog" => {
                    if catalog.is_none() {
                        catalog = Some((object_id, object.as_dict()?.clone()));
                    }
                }
                "Pages" | "Page" | "Outlines" | "Outline" => {}
                _ => {
                    merged.objects.insert(object_id, object);
                }
            }
        }

        let (catalog_id, mut catalog) = catalog.ok_or_else(|| ConversionError::InvalidContent {
            message: "document has no catalog".to_string(),
        })?;

        let tree_id = (max_id, 0);
        let page_count = pages.len();
        let mut kids = Vec::with_capacity(page_count);
        for (page_id, mut page) in pages {
            page.set("Parent", tree_id);
            merged.objects.insert(page_id, Object::Dictionary(page));
            kids.push(Object::Reference(page_id));
        }

        let mut tree = Dictionary::new();
        tree.set("Type", "Pages");
        tree.set("Count", page_count as i64);
        tree.set("Kids", kids);
        merged.objects.insert(tree_id, Object::Dictionary(tree));

        catalog.set("Pages", tree_id);
        catalog.remove(b"Outlines");
        merged.objects.insert(catalog_id, Object::Dictionary(catalog));

        merged.trailer.set("Root", catalog_id);
        merged.max_id = max_id;
        merged.renumber_objects();
        merged.compress();

        let mut output = Vec::new();
        merged.save_to(&mut output)?;

        log::info!(
            "Merged {} PDFs ({} pages): {} bytes",
            inputs.len(),
            page_count,
            output.len()
        );
        Ok(output)
    }

    /// One page per image, sized to the pixel dimensions at 72 dpi, with the
    /// image embedded as a JPEG stream.
    pub fn create_pdf_from_image(&self, image_content: &[u8]) -> Result<Vec<u8>, ConversionError> {
        let img = image::load_from_memory(image_content)?;
        let (width, height) = img.dimensions();

        let mut jpeg = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut jpeg, ImageFormat::Jpeg)?;
        let jpeg = jpeg.into_inner();

        let mut refs = RefAllocator::new();
        let catalog_id = refs.alloc();
        let tree_id = refs.alloc();
        let page_id = refs.alloc();
        let image_id = refs.alloc();
        let content_id = refs.alloc();
        let image_name = Name(b"Im1");

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id).kids([page_id]).count(1);

        let (page_width, page_height) = (width as f32, height as f32);
        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, page_width, page_height));
        page.parent(tree_id);
        page.contents(content_id);
        page.resources().x_objects().pair(image_name, image_id);
        page.finish();

        let mut image = pdf.image_xobject(image_id, &jpeg);
        image.filter(Filter::DctDecode);
        image.width(width as i32);
        image.height(height as i32);
        image.color_space().device_rgb();
        image.bits_per_component(8);
        image.finish();

        let mut content = Content::new();
        content.save_state();
        content.transform([page_width, 0.0, 0.0, page_height, 0.0, 0.0]);
        content.x_object(image_name);
        content.restore_state();
        pdf.stream(content_id, &content.finish());

        let pdf_bytes = pdf.finish();
        log::info!("Created PDF from {}x{} image: {} bytes", width, height, pdf_bytes.len());
        Ok(pdf_bytes)
    }

    /// Lay out one line per entry in Helvetica 12pt on A4 pages.
    pub fn create_text_pdf(&self, lines: &[String]) -> Result<Vec<u8>, ConversionError> {
        let lines_per_page = (((TEXT_TOP - TEXT_BOTTOM) / LEADING) as usize) + 1;
        let chunks: Vec<&[String]> = if lines.is_empty() {
            vec![lines]
        } else {
            lines.chunks(lines_per_page).collect()
        };

        let mut refs = RefAllocator::new();
        let catalog_id = refs.alloc();
        let tree_id = refs.alloc();
        let font_id = refs.alloc();
        let font_name = Name(b"F1");

        let page_ids: Vec<(Ref, Ref)> = chunks.iter().map(|_| (refs.alloc(), refs.alloc())).collect();

        let mut pdf = Pdf::new();
        pdf.catalog(catalog_id).pages(tree_id);
        pdf.pages(tree_id)
            .kids(page_ids.iter().map(|(page_id, _)| *page_id))
            .count(page_ids.len() as i32);
        pdf.type1_font(font_id)
            .base_font(Name(b"Helvetica"))
            .encoding_predefined(Name(b"WinAnsiEncoding"));

        for (chunk, (page_id, content_id)) in chunks.iter().zip(&page_ids) {
            let mut page = pdf.page(*page_id);
            page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT));
            page.parent(tree_id);
            page.contents(*content_id);
            page.resources().fonts().pair(font_name, font_id);
            page.finish();

            // One text object per line so extractors see line boundaries.
            let mut content = Content::new();
            for (index, line) in chunk.iter().enumerate() {
                let encoded = encode_win_ansi(line);
                content.begin_text();
                content.set_font(font_name, FONT_SIZE);
                content.next_line(TEXT_LEFT, TEXT_TOP - index as f32 * LEADING);
                content.show(Str(&encoded));
                content.end_text();
            }
            pdf.stream(*content_id, &content.finish());
        }

        let pdf_bytes = pdf.finish();
        log::info!(
            "Created text PDF: {} lines on {} pages, {} bytes",
            lines.len(),
            page_ids.len(),
            pdf_bytes.len()
        );
        Ok(pdf_bytes)
    }

    /// Text of every page, in page order.
    pub fn extract_page_text(&self, content: &[u8]) -> Result<Vec<String>, ConversionError> {
        let doc = PdfDocument::load_mem(content)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            pages.push(doc.extract_text(&[number])?);
        }

        log::info!("Extracted text from {} PDF pages", pages.len());
        Ok(pages)
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Page attributes a page may take from its ancestors in the page tree.
const INHERITED_PAGE_KEYS: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Upper bound on page tree depth; also stops cyclic `Parent` chains.
const MAX_TREE_DEPTH: usize = 64;

/// Copy of a page dictionary with its inherited attributes made explicit.
fn detach_page(doc: &PdfDocument, page_id: ObjectId) -> Result<Dictionary, ConversionError> {
    let mut page = doc.get_dictionary(page_id)?.clone();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
            break;
        };
        for key in INHERITED_PAGE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    page.remove(b"Parent");
    Ok(page)
}

/// Map text to the WinAnsi code page used by the standard Helvetica font.
/// Latin-1 characters pass through; anything else becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use lopdf::content::{Content as PageContent, Operation};
    use lopdf::{dictionary, Stream};

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 64]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Jpeg)
            .expect("encode jpeg");
        out.into_inner()
    }

    fn media_box(doc: &PdfDocument, page_id: ObjectId) -> Vec<f32> {
        doc.get_dictionary(page_id)
            .and_then(|page| page.get(b"MediaBox"))
            .and_then(Object::as_array)
            .expect("media box on page")
            .iter()
            .map(|o| match o {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r as f32,
                other => panic!("unexpected media box entry {other:?}"),
            })
            .collect()
    }

    fn page_boxes(pdf: &[u8]) -> Vec<Vec<f32>> {
        let doc = PdfDocument::load_mem(pdf).expect("reload");
        doc.get_pages()
            .into_values()
            .map(|page_id| media_box(&doc, page_id))
            .collect()
    }

    /// One-page PDF whose size and fonts live on the page tree, not the page.
    fn inherited_page_pdf(width: i64, height: i64, label: &str) -> Vec<u8> {
        let mut doc = PdfDocument::with_version("1.5");
        let tree_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = PageContent {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 50.into()]),
                Operation::new("Tj", vec![Object::string_literal(label)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().expect("encode")));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => tree_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            tree_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => tree_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    #[test]
    fn image_page_matches_pixel_size() {
        let pdf = PdfProcessor::new()
            .create_pdf_from_image(&sample_jpeg(120, 80))
            .expect("pdf");
        assert_eq!(page_boxes(&pdf), [vec![0.0, 0.0, 120.0, 80.0]]);
    }

    #[test]
    fn merge_keeps_every_page_in_order() {
        let processor = PdfProcessor::new();
        let first = processor.create_pdf_from_image(&sample_jpeg(10, 10)).expect("pdf");
        let second = processor
            .create_text_pdf(&["one".to_string(), "two".to_string()])
            .expect("pdf");
        let third = processor.create_pdf_from_image(&sample_jpeg(20, 30)).expect("pdf");

        let merged = processor
            .merge_pdfs(&[&first, &second, &third])
            .expect("merge");
        assert_eq!(
            page_boxes(&merged),
            [
                vec![0.0, 0.0, 10.0, 10.0],
                vec![0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT],
                vec![0.0, 0.0, 20.0, 30.0],
            ]
        );
    }

    #[test]
    fn merge_carries_attributes_inherited_from_the_page_tree() {
        let processor = PdfProcessor::new();
        let letter = inherited_page_pdf(612, 792, "Letter page");
        let a3 = inherited_page_pdf(842, 1191, "A3 page");

        let merged = processor.merge_pdfs(&[&letter, &a3]).expect("merge");
        assert_eq!(
            page_boxes(&merged),
            [vec![0.0, 0.0, 612.0, 792.0], vec![0.0, 0.0, 842.0, 1191.0]]
        );

        let doc = PdfDocument::load_mem(&merged).expect("reload");
        let pages = doc.get_pages();
        for page_id in pages.values() {
            let page = doc.get_dictionary(*page_id).expect("page");
            assert!(page.has(b"Resources"));
            let parent = page.get(b"Parent").and_then(Object::as_reference).expect("parent");
            let tree = doc.get_dictionary(parent).expect("tree");
            assert!(!tree.has(b"MediaBox"));
            assert_eq!(tree.get(b"Count").and_then(Object::as_i64).expect("count"), 2);
        }

        let text = processor.extract_page_text(&merged).expect("extract");
        assert!(text[0].contains("Letter page"));
        assert!(text[1].contains("A3 page"));
    }

    #[test]
    fn merge_requires_input() {
        assert!(PdfProcessor::new().merge_pdfs(&[]).is_err());
    }

    #[test]
    fn long_text_spills_onto_new_pages() {
        let lines: Vec<String> = (0..120).map(|i| format!("line {i}")).collect();
        let pdf = PdfProcessor::new().create_text_pdf(&lines).expect("pdf");
        let doc = PdfDocument::load_mem(&pdf).expect("reload");
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn empty_text_yields_one_blank_page() {
        let pdf = PdfProcessor::new().create_text_pdf(&[]).expect("pdf");
        let doc = PdfDocument::load_mem(&pdf).expect("reload");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn extracts_text_written_by_text_pdf() {
        let processor = PdfProcessor::new();
        let pdf = processor
            .create_text_pdf(&["Hello world".to_string()])
            .expect("pdf");
        let pages = processor.extract_page_text(&pdf).expect("extract");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("Hello world"));
    }

    #[test]
    fn optimize_keeps_pages() {
        let processor = PdfProcessor::new();
        let pdf = processor
            .create_text_pdf(&vec!["compress me".to_string(); 30])
            .expect("pdf");
        let optimized = processor.optimize_pdf(&pdf).expect("optimize");
        assert!(optimized.len() < pdf.len());
        let doc = PdfDocument::load_mem(&optimized).expect("reload");
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn win_ansi_replaces_unmappable_characters() {
        assert_eq!(encode_win_ansi("a\tb"), b"a b");
        assert_eq!(encode_win_ansi("é"), vec![0xe9]);
        assert_eq!(encode_win_ansi("日"), b"?");
    }

    #[test]
    fn rejects_non_pdf() {
        assert!(matches!(
            PdfProcessor::new().optimize_pdf(b"not a pdf"),
            Err(ConversionError::Pdf(_))
        ));
    }
}
