//! WASM bindings for the PDF toolbox
//!
//! The page has one button per operation. [`bind_ui`] attaches a click
//! handler to each; a click reads the bound inputs, runs the operation
//! through the core dispatcher and downloads the results.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, {
//!     bind_ui,
//!     run_operation,
//!     initialize_pdfium_render,
//! } from './pkg/pdftools_wasm.js';
//! import PDFiumModule from './pdfium.js';
//!
//! const wasm = await init();
//!
//! // PDF to images renders through PDFium, which is bound on the first
//! // render. Hand the PDFium module over before that run.
//! const pdfium = await PDFiumModule();
//! initialize_pdfium_render(pdfium, wasm, false);
//!
//! bind_ui();                       // or bind_ui('{"raster_scale": 1.0}')
//!
//! // Headless use: outputs come back instead of being downloaded
//! const outputs = run_operation("rotate", [{ name, mimeType, bytes }], { number: "90" });
//! for (const { fileName, mimeType, bytes } of outputs) { ... }
//! ```

pub mod browser;
pub mod handlers;
mod logging;

use js_sys::{Array, Object, Reflect, Uint8Array};
use pdftools_core::{
    Collected, Dispatcher, InputFile, OperationKind, OutputFile, PdfToolsError, RawForm,
    ToolConfig,
};
use wasm_bindgen::prelude::*;

pub use handlers::bind_ui;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    logging::init();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Page count, version and metadata of a PDF, for showing file details
#[wasm_bindgen]
pub fn describe_pdf(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let info = pdftools_core::describe(bytes).map_err(to_js_error)?;

    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Run one operation without touching the page.
///
/// `files` is an array of `{ name, mimeType, bytes }`; `fields` holds the
/// optional `text`, `number`, `list` and `choice` values. Returns an array of
/// `{ fileName, mimeType, bytes }` with `bytes` as a `Uint8Array`.
#[wasm_bindgen]
pub fn run_operation(kind: &str, files: JsValue, fields: JsValue) -> Result<Array, JsValue> {
    let kind: OperationKind = kind.parse().map_err(to_js_error)?;
    let form = form_from_js(files, fields)?;

    let dispatcher = Dispatcher::new(ToolConfig::default(), handlers::default_rasterizer());
    let mut outputs = Collected::new();
    dispatcher
        .run(kind, form, &mut outputs)
        .map_err(to_js_error)?;

    let result = Array::new();
    for output in outputs.into_files() {
        result.push(&output_to_js(&output)?);
    }
    Ok(result)
}

fn form_from_js(files: JsValue, fields: JsValue) -> Result<RawForm, JsValue> {
    let mut form: RawForm = if fields.is_undefined() || fields.is_null() {
        RawForm::default()
    } else {
        serde_wasm_bindgen::from_value(fields)
            .map_err(|e| JsValue::from_str(&format!("Invalid fields: {}", e)))?
    };

    if !files.is_undefined() && !files.is_null() {
        form.files = Array::from(&files)
            .iter()
            .map(|file| input_from_js(&file))
            .collect::<Result<_, _>>()?;
    }
    Ok(form)
}

fn input_from_js(file: &JsValue) -> Result<InputFile, JsValue> {
    let name = Reflect::get(file, &"name".into())?
        .as_string()
        .unwrap_or_default();
    let mime_type = Reflect::get(file, &"mimeType".into())?
        .as_string()
        .unwrap_or_default();
    let bytes = Reflect::get(file, &"bytes".into())?;
    if bytes.is_undefined() {
        return Err(JsValue::from_str(&format!("File {} has no bytes", name)));
    }
    Ok(InputFile::new(name, mime_type, Uint8Array::new(&bytes).to_vec()))
}

fn output_to_js(output: &OutputFile) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"fileName".into(), &output.file_name.as_str().into())?;
    Reflect::set(&obj, &"mimeType".into(), &output.mime_type.as_str().into())?;
    Reflect::set(
        &obj,
        &"bytes".into(),
        &Uint8Array::from(output.bytes.as_slice()),
    )?;
    Ok(obj.into())
}

pub(crate) fn to_js_error(e: PdfToolsError) -> JsValue {
    JsValue::from_str(&e.to_string())
}
