//! Button wiring: one click handler per operation

use std::rc::Rc;

use pdftools_core::{
    validate, Delivery, Dispatcher, OperationKind, PageRasterizer, PdfToolsError,
    PdfiumRasterizer, RawForm, ToolConfig,
};
use tracing::{debug, error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::browser::{self, BrowserDownload, PreviewAndDownload};

/// Element ids read by one operation's button
struct Binding {
    kind: OperationKind,
    button: &'static str,
    input: &'static str,
    text: Option<&'static str>,
    number: Option<&'static str>,
    list: Option<&'static str>,
    choice: Option<&'static str>,
    preview: Option<&'static str>,
}

impl Binding {
    const fn files(kind: OperationKind, button: &'static str, input: &'static str) -> Self {
        Binding {
            kind,
            button,
            input,
            text: None,
            number: None,
            list: None,
            choice: None,
            preview: None,
        }
    }
}

static BINDINGS: [Binding; 11] = [
    Binding::files(OperationKind::Merge, "merge-btn", "merge-input"),
    Binding::files(OperationKind::Split, "split-btn", "split-input"),
    Binding {
        preview: Some("pdf-to-images-output"),
        ..Binding::files(
            OperationKind::PdfToImages,
            "pdf-to-images-btn",
            "pdf-to-images-input",
        )
    },
    Binding {
        text: Some("watermark-text"),
        number: Some("watermark-angle"),
        ..Binding::files(OperationKind::Watermark, "watermark-btn", "watermark-input")
    },
    Binding::files(OperationKind::Compress, "compress-btn", "compress-input"),
    Binding {
        number: Some("rotate-degree"),
        ..Binding::files(OperationKind::Rotate, "rotate-btn", "rotate-input")
    },
    Binding {
        list: Some("rearrange-order"),
        ..Binding::files(OperationKind::Rearrange, "rearrange-btn", "rearrange-input")
    },
    Binding {
        choice: Some("page-number-position"),
        ..Binding::files(
            OperationKind::PageNumbers,
            "page-numbers-btn",
            "page-numbers-input",
        )
    },
    Binding::files(OperationKind::Flatten, "flatten-btn", "flatten-input"),
    Binding::files(
        OperationKind::ImagesToPdf,
        "image-to-pdf-btn",
        "image-to-pdf-input",
    ),
    Binding {
        list: Some("remove-pages-list"),
        ..Binding::files(
            OperationKind::RemovePages,
            "remove-pages-btn",
            "remove-pages-input",
        )
    },
];

/// Renderer for PDF to images. PDFium is bound on the first render, so the
/// page must hand its PDFium module to `initialize_pdfium_render` before
/// the first pdf-to-images run, not necessarily before [`bind_ui`].
pub fn default_rasterizer() -> Box<dyn PageRasterizer> {
    Box::new(PdfiumRasterizer::new())
}

/// Attach click handlers to every operation button on the page.
///
/// `config_json` optionally overrides [`ToolConfig`] defaults. Buttons
/// missing from the page are skipped with a warning.
#[wasm_bindgen]
pub fn bind_ui(config_json: Option<String>) -> Result<(), JsValue> {
    let config = match config_json {
        Some(json) => ToolConfig::from_json(&json).map_err(crate::to_js_error)?,
        None => ToolConfig::default(),
    };
    let dispatcher = Rc::new(Dispatcher::new(config, default_rasterizer()));

    for binding in BINDINGS.iter() {
        let button = match browser::element(binding.button) {
            Ok(button) => button,
            Err(_) => {
                warn!(button = binding.button, "button not found, skipping");
                continue;
            }
        };

        let dispatcher = Rc::clone(&dispatcher);
        let on_click = Closure::<dyn FnMut(web_sys::Event)>::new(move |_event: web_sys::Event| {
            let dispatcher = Rc::clone(&dispatcher);
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(e) = handle_click(&dispatcher, binding).await {
                    report(binding.kind, e);
                }
            });
        });

        button.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref())?;
        // The page owns the listener for its whole lifetime
        on_click.forget();
    }
    Ok(())
}

async fn read_form(binding: &Binding) -> Result<RawForm, PdfToolsError> {
    let files = browser::read_files(binding.input)
        .await
        .map_err(|e| PdfToolsError::Decode(js_message(&e)))?;

    let value = |id: Option<&str>| -> Result<String, PdfToolsError> {
        match id {
            Some(id) => browser::field_value(id).map_err(|e| PdfToolsError::Decode(js_message(&e))),
            None => Ok(String::new()),
        }
    };

    Ok(RawForm {
        files,
        text: value(binding.text)?,
        number: value(binding.number)?,
        list: value(binding.list)?,
        choice: value(binding.choice)?,
    })
}

async fn handle_click(dispatcher: &Dispatcher, binding: &Binding) -> Result<(), PdfToolsError> {
    let form = read_form(binding).await?;
    let request = validate(binding.kind, form)?;

    let mut delivery: Box<dyn Delivery> = match binding.preview {
        Some(id) => {
            let container =
                browser::element(id).map_err(|e| PdfToolsError::Delivery(js_message(&e)))?;
            let revoked = browser::clear_preview(&container)
                .map_err(|e| PdfToolsError::Delivery(js_message(&e)))?;
            debug!(revoked, "cleared previous previews");
            Box::new(PreviewAndDownload { container })
        }
        None => Box::new(BrowserDownload),
    };

    dispatcher.execute(request, delivery.as_mut())?;
    Ok(())
}

fn report(kind: OperationKind, e: PdfToolsError) {
    if e.is_validation() {
        browser::alert(&e.to_string());
    } else {
        error!(operation = %kind, error = %e, "operation failed");
        browser::alert(&format!("Processing failed: {}", e));
    }
}

fn js_message(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}
