//! DOM access: reading inputs, alerts, downloads and image previews

use js_sys::{Array, Uint8Array};
use pdftools_core::{Delivery, InputFile, OutputFile, PdfToolsError};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, Document, Element, HtmlAnchorElement, HtmlImageElement,
    HtmlInputElement, HtmlSelectElement, Url,
};

pub fn document() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("No document"))
}

pub fn element(id: &str) -> Result<Element, JsValue> {
    document()?
        .get_element_by_id(id)
        .ok_or_else(|| JsValue::from_str(&format!("Missing element #{}", id)))
}

/// Read every file picked in a file input, in selection order
pub async fn read_files(input_id: &str) -> Result<Vec<InputFile>, JsValue> {
    let input: HtmlInputElement = element(input_id)?.dyn_into()?;
    let Some(list) = input.files() else {
        return Ok(Vec::new());
    };

    let mut files = Vec::with_capacity(list.length() as usize);
    for i in 0..list.length() {
        let Some(file) = list.get(i) else { continue };
        let buffer = JsFuture::from(file.array_buffer()).await?;
        let bytes = Uint8Array::new(&buffer).to_vec();
        files.push(InputFile::new(file.name(), file.type_(), bytes));
    }
    Ok(files)
}

/// Current value of a text input or select
pub fn field_value(id: &str) -> Result<String, JsValue> {
    let element = element(id)?;
    if let Some(select) = element.dyn_ref::<HtmlSelectElement>() {
        return Ok(select.value());
    }
    let input: HtmlInputElement = element.dyn_into()?;
    Ok(input.value())
}

pub fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}

fn blob_url(file: &OutputFile) -> Result<String, JsValue> {
    let parts = Array::new();
    parts.push(&Uint8Array::from(file.bytes.as_slice()));

    let options = BlobPropertyBag::new();
    options.set_type(&file.mime_type);
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options)?;

    Url::create_object_url_with_blob(&blob)
}

/// Save a file through a temporary `<a download>` link
pub fn download(file: &OutputFile) -> Result<(), JsValue> {
    let url = blob_url(file)?;
    let link: HtmlAnchorElement = document()?.create_element("a")?.dyn_into()?;
    link.set_href(&url);
    link.set_download(&file.file_name);
    link.click();
    Url::revoke_object_url(&url)
}

/// Show an image file inside `container`
pub fn append_preview(container: &Element, file: &OutputFile) -> Result<(), JsValue> {
    let url = blob_url(file)?;
    let img: HtmlImageElement = document()?.create_element("img")?.dyn_into()?;
    img.set_src(&url);
    img.set_alt(&file.file_name);
    container.append_child(&img)?;
    Ok(())
}

/// Remove every preview from `container`, releasing their object URLs.
/// Returns how many URLs were revoked.
pub fn clear_preview(container: &Element) -> Result<usize, JsValue> {
    let images = container.query_selector_all("img")?;
    let mut revoked = 0;
    for i in 0..images.length() {
        let Some(img) = images
            .item(i)
            .and_then(|node| node.dyn_into::<HtmlImageElement>().ok())
        else {
            continue;
        };
        let src = img.src();
        if src.starts_with("blob:") {
            Url::revoke_object_url(&src)?;
            revoked += 1;
        }
    }
    container.set_inner_html("");
    Ok(revoked)
}

fn delivery_error(e: JsValue) -> PdfToolsError {
    let message = e.as_string().unwrap_or_else(|| format!("{:?}", e));
    PdfToolsError::Delivery(message)
}

/// Downloads each output as soon as it is produced
pub struct BrowserDownload;

impl Delivery for BrowserDownload {
    fn deliver(&mut self, file: OutputFile) -> Result<(), PdfToolsError> {
        tracing::debug!(file = %file.file_name, bytes = file.bytes.len(), "downloading");
        download(&file).map_err(delivery_error)
    }
}

/// Shows each image in a preview area, then downloads it
pub struct PreviewAndDownload {
    pub container: Element,
}

impl Delivery for PreviewAndDownload {
    fn deliver(&mut self, file: OutputFile) -> Result<(), PdfToolsError> {
        append_preview(&self.container, &file).map_err(delivery_error)?;
        BrowserDownload.deliver(file)
    }
}
