//! 页面规范化
//!
//! 把已接收的文件转换为统一的页面表示（一个 lopdf 文档 + 有序页面）：
//! - PDF 页面原样保留，页树上继承的属性下沉到每一页
//! - 栅格图片去除透明通道（合成到白底），编码为 JPEG 后包装成单页文档

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::encryption;
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::error::Rejection;
use super::intake::MediaKind;

/// 图片页的 JPEG 质量
const JPEG_QUALITY: u8 = 90;

/// 页树上可被子节点继承的属性
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// 缺失 MediaBox 时的兜底尺寸（US Letter）
const DEFAULT_MEDIA_BOX: [i64; 4] = [0, 0, 612, 792];

const MAX_TREE_DEPTH: usize = 64;

/// 单个文件规范化后的页面集合
#[derive(Debug)]
pub struct NormalizedPages {
    pub document: Document,
    pub page_count: u32,
}

/// 按媒体类别分派
pub fn normalize(kind: MediaKind, data: &[u8]) -> Result<NormalizedPages, Rejection> {
    match kind {
        MediaKind::Pdf => normalize_pdf(data),
        MediaKind::Image => normalize_image(data),
    }
}

/// PDF 路径：解析文档，页面顺序保持不变
pub fn normalize_pdf(data: &[u8]) -> Result<NormalizedPages, Rejection> {
    let mut document =
        Document::load_mem(data).map_err(|e| Rejection::CorruptDocument(e.to_string()))?;

    if document.is_encrypted() {
        open_with_empty_password(&mut document)?;
    }

    let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(Rejection::ZeroPageDocument);
    }

    for page_id in &page_ids {
        push_down_inherited(&mut document, *page_id)
            .map_err(|e| Rejection::CorruptDocument(e.to_string()))?;
    }

    Ok(NormalizedPages {
        document,
        page_count: page_ids.len() as u32,
    })
}

/// 对象内容的加密方式，取自 `/CF /StdCF /CFM`，缺省为 RC4（V1/V2 文档没有 `/CF`）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectCipher {
    Identity,
    Rc4,
    Aes,
}

struct EncryptionSettings {
    dictionary_id: ObjectId,
    cipher: ObjectCipher,
    encrypt_metadata: bool,
}

impl EncryptionSettings {
    fn read(document: &Document) -> Option<Self> {
        let dictionary_id = document
            .trailer
            .get(b"Encrypt")
            .and_then(Object::as_reference)
            .ok()?;
        let dictionary = document.get_dictionary(dictionary_id).ok()?;

        // 密码校验只比较 /U 的前 16 字节
        if let Ok(user_hash) = dictionary.get(b"U").and_then(Object::as_str) {
            if user_hash.len() < 16 {
                return None;
            }
        }

        let method = dictionary
            .get(b"CF")
            .and_then(Object::as_dict)
            .and_then(|filters| filters.get(b"StdCF"))
            .and_then(Object::as_dict)
            .and_then(|filter| filter.get(b"CFM"))
            .and_then(Object::as_name);
        let cipher = match method {
            Ok(name) if name == b"AESV2" => ObjectCipher::Aes,
            Ok(name) if name == b"None" => ObjectCipher::Identity,
            _ => ObjectCipher::Rc4,
        };

        let encrypt_metadata = dictionary
            .get(b"EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        Some(Self {
            dictionary_id,
            cipher,
            encrypt_metadata,
        })
    }

    fn skips(&self, id: ObjectId, object: &Object) -> bool {
        if id == self.dictionary_id {
            return true;
        }
        let type_name = object.type_name().ok();
        type_name == Some(b"XRef".as_slice())
            || (!self.encrypt_metadata && type_name == Some(b"Metadata".as_slice()))
    }
}

/// 用空用户密码打开加密文档
///
/// 只设置了所有者密码（权限限制）的文档可以直接解密；
/// 需要用户密码或使用不支持的加密方案时返回 [`Rejection::EncryptedDocument`]。
fn open_with_empty_password(document: &mut Document) -> Result<(), Rejection> {
    let settings = EncryptionSettings::read(document).ok_or(Rejection::EncryptedDocument)?;
    let key = encryption::get_encryption_key(&*document, "", true)
        .map_err(|_| Rejection::EncryptedDocument)?;

    for (&id, object) in document.objects.iter_mut() {
        if settings.skips(id, object) {
            continue;
        }
        decrypt_in_place(&key, id, object, settings.cipher);
    }

    document.trailer.remove(b"Encrypt");
    Ok(())
}

/// 字符串与流内容按所属间接对象的编号解密，嵌套在字典和数组中的字符串同样处理
fn decrypt_in_place(key: &[u8], id: ObjectId, object: &mut Object, cipher: ObjectCipher) {
    match object {
        Object::String(content, _) => {
            if let Some(plain) = decrypt_bytes(key, id, content, cipher) {
                *content = plain;
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                decrypt_in_place(key, id, value, cipher);
            }
            if let Some(plain) = decrypt_bytes(key, id, &stream.content, cipher) {
                stream.set_content(plain);
            }
        }
        Object::Dictionary(dictionary) => {
            for (_, value) in dictionary.iter_mut() {
                decrypt_in_place(key, id, value, cipher);
            }
        }
        Object::Array(items) => {
            for item in items.iter_mut() {
                decrypt_in_place(key, id, item, cipher);
            }
        }
        _ => {}
    }
}

fn decrypt_bytes(key: &[u8], id: ObjectId, data: &[u8], cipher: ObjectCipher) -> Option<Vec<u8>> {
    let aes = match cipher {
        ObjectCipher::Identity => return None,
        ObjectCipher::Rc4 => false,
        ObjectCipher::Aes => {
            // 16 字节 IV 之后至少一个完整分组
            if data.len() < 32 || data.len() % 16 != 0 {
                return None;
            }
            true
        }
    };
    let sealed = Object::String(data.to_vec(), StringFormat::Literal);
    encryption::decrypt_object(key, id, &sealed, aes).ok()
}

/// 把父节点上的可继承属性复制到页面本身
fn push_down_inherited(document: &mut Document, page_id: ObjectId) -> lopdf::Result<()> {
    let inherited = inherited_attributes(document, page_id)?;
    let page = document.get_object_mut(page_id)?.as_dict_mut()?;

    for (key, value) in inherited {
        page.set(key, value);
    }
    if !page.has(b"MediaBox") {
        let media_box: Vec<Object> = DEFAULT_MEDIA_BOX.iter().map(|v| Object::Integer(*v)).collect();
        page.set("MediaBox", media_box);
    }
    Ok(())
}

fn inherited_attributes(
    document: &Document,
    page_id: ObjectId,
) -> lopdf::Result<Vec<(Vec<u8>, Object)>> {
    let page = document.get_dictionary(page_id)?;
    let mut missing: Vec<&[u8]> = INHERITABLE_KEYS
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let node = document.get_dictionary(node_id)?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    Ok(found)
}

/// 图片路径：解码、去透明、编码并包装为单页文档
pub fn normalize_image(data: &[u8]) -> Result<NormalizedPages, Rejection> {
    let decoded =
        image::load_from_memory(data).map_err(|e| Rejection::CorruptImage(e.to_string()))?;
    let flattened = flatten_onto_white(&decoded);
    let (width, height) = flattened.dimensions();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&flattened)
        .map_err(|e| Rejection::ImageEncode(e.to_string()))?;

    let document = image_page_document(width, height, jpeg)
        .map_err(|e| Rejection::ImageEncode(e.to_string()))?;

    Ok(NormalizedPages {
        document,
        page_count: 1,
    })
}

/// 带透明通道（RGBA/LA 及其 16 位变体）的图片按 alpha 合成到白底，其余直接转 RGB8
pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        canvas.put_pixel(x, y, Rgb([over_white(r, a), over_white(g, a), over_white(b, a)]));
    }
    canvas
}

fn over_white(channel: u8, alpha: u8) -> u8 {
    let alpha = u32::from(alpha);
    ((u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
}

/// 72 dpi：页面尺寸（pt）等于像素尺寸
fn image_page_document(width: u32, height: u32, jpeg: Vec<u8>) -> lopdf::Result<Document> {
    let (w, h) = (i64::from(width), i64::from(height));
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let image_id = document.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => w,
            "Height" => h,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Integer(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(h),
                    Object::Integer(0),
                    Object::Integer(0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = document.add_object(Stream::new(dictionary! {}, content.encode()?));

    let media_box = vec![
        Object::Integer(0),
        Object::Integer(0),
        Object::Integer(w),
        Object::Integer(h),
    ];
    let page_id = document.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => media_box,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    document.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);

    Ok(document)
}
