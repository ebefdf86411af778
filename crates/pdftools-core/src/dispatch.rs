//! Operation dispatch table
//!
//! Every [`OperationKind`] maps to one handler. A handler loads its inputs,
//! runs the transform, saves and hands each output to the delivery sink.
//!
//! ```ignore
//! let dispatcher = Dispatcher::new(ToolConfig::default(), Box::new(UnavailableRasterizer));
//! let mut outputs = Collected::new();
//! let report = dispatcher.run(OperationKind::Rotate, form, &mut outputs)?;
//! ```

use std::collections::BTreeMap;

use lopdf::Document;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::command::{OperationKind, TransformRequest};
use crate::config::ToolConfig;
use crate::delivery::{Delivery, OutputFile, Tally};
use crate::document::{load_pdf, load_pdfs, page_count, save_pdf, SaveOptions};
use crate::error::PdfToolsError;
use crate::images::images_to_pdf;
use crate::merge::merge_documents;
use crate::overlay::{encode_win_ansi, page_numbers, watermark};
use crate::pages::{rearrange_pages, remove_pages, resize_pages, rotate_pages};
use crate::raster::{rasterize, PageRasterizer};
use crate::split::split_each;
use crate::validation::{validate, RawForm};

/// Runs one validated request
pub type Handler =
    fn(&Context, TransformRequest, &mut dyn Delivery) -> Result<(), PdfToolsError>;

/// Shared state handed to every handler
pub struct Context {
    pub config: ToolConfig,
    pub rasterizer: Box<dyn PageRasterizer>,
}

/// Summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub operation: OperationKind,
    pub outputs: usize,
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
}

pub struct Dispatcher {
    context: Context,
    handlers: BTreeMap<OperationKind, Handler>,
}

impl Dispatcher {
    /// Table with the built-in handler for every operation
    pub fn new(config: ToolConfig, rasterizer: Box<dyn PageRasterizer>) -> Self {
        let mut dispatcher = Self {
            context: Context { config, rasterizer },
            handlers: BTreeMap::new(),
        };

        dispatcher.register(OperationKind::Merge, handle_merge);
        dispatcher.register(OperationKind::Split, handle_split);
        dispatcher.register(OperationKind::PdfToImages, handle_pdf_to_images);
        dispatcher.register(OperationKind::Watermark, handle_watermark);
        dispatcher.register(OperationKind::Compress, handle_compress);
        dispatcher.register(OperationKind::Rotate, handle_rotate);
        dispatcher.register(OperationKind::Rearrange, handle_rearrange);
        dispatcher.register(OperationKind::PageNumbers, handle_page_numbers);
        dispatcher.register(OperationKind::Flatten, handle_flatten);
        dispatcher.register(OperationKind::ImagesToPdf, handle_images_to_pdf);
        dispatcher.register(OperationKind::RemovePages, handle_remove_pages);

        dispatcher
    }

    /// Replace the rasterizer, e.g. once a renderer has been bound
    pub fn with_rasterizer(mut self, rasterizer: Box<dyn PageRasterizer>) -> Self {
        self.context.rasterizer = rasterizer;
        self
    }

    /// Install or replace the handler for `kind`
    pub fn register(&mut self, kind: OperationKind, handler: Handler) {
        self.handlers.insert(kind, handler);
    }

    pub fn handler(&self, kind: OperationKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }

    pub fn kinds(&self) -> impl Iterator<Item = OperationKind> + '_ {
        self.handlers.keys().copied()
    }

    /// Validate raw form input, then execute it
    pub fn run(
        &self,
        kind: OperationKind,
        form: RawForm,
        delivery: &mut dyn Delivery,
    ) -> Result<RunReport, PdfToolsError> {
        let request = validate(kind, form).map_err(|e| {
            warn!(operation = %kind, error = %e, "rejected input");
            e
        })?;
        self.execute(request, delivery)
    }

    /// Run an already validated request
    pub fn execute(
        &self,
        request: TransformRequest,
        delivery: &mut dyn Delivery,
    ) -> Result<RunReport, PdfToolsError> {
        let kind = request.kind();
        let handler = self.handler(kind).ok_or_else(|| {
            PdfToolsError::Operation(format!("No handler registered for {}", kind))
        })?;

        let input_size_bytes = request.input_size_bytes();
        info!(
            operation = %kind,
            files = request.files().len(),
            bytes = input_size_bytes,
            "running operation"
        );

        let mut tally = Tally::new(delivery);
        let result = handler(&self.context, request, &mut tally);
        let (outputs, output_size_bytes) = (tally.outputs, tally.bytes);

        match result {
            Ok(()) => {
                info!(operation = %kind, outputs, bytes = output_size_bytes, "operation finished");
                Ok(RunReport {
                    operation: kind,
                    outputs,
                    input_size_bytes,
                    output_size_bytes,
                })
            }
            Err(e) => {
                if e.is_validation() {
                    warn!(operation = %kind, outputs, error = %e, "rejected input");
                } else {
                    error!(operation = %kind, outputs, error = %e, "operation failed");
                }
                Err(e)
            }
        }
    }
}

fn output_name(kind: OperationKind) -> Result<&'static str, PdfToolsError> {
    kind.output_name()
        .ok_or_else(|| PdfToolsError::Operation(format!("{} has no single output", kind)))
}

fn deliver_pdf(
    delivery: &mut dyn Delivery,
    file_name: impl Into<String>,
    doc: &mut Document,
    options: SaveOptions,
) -> Result<(), PdfToolsError> {
    let bytes = save_pdf(doc, options)?;
    delivery.deliver(OutputFile::pdf(file_name, bytes))
}

/// Load the input, apply `transform` in place and deliver the result under
/// the operation's output name
fn transform_one(
    ctx: &Context,
    kind: OperationKind,
    bytes: &[u8],
    delivery: &mut dyn Delivery,
    transform: impl FnOnce(&mut Document) -> Result<(), PdfToolsError>,
) -> Result<(), PdfToolsError> {
    let mut doc = load_pdf(bytes)?;
    debug!(operation = %kind, pages = page_count(&doc), "loaded document");
    transform(&mut doc)?;
    deliver_pdf(delivery, output_name(kind)?, &mut doc, ctx.config.save)
}

/// Like [`transform_one`] for transforms that build a new document
fn rebuild_one(
    ctx: &Context,
    kind: OperationKind,
    bytes: &[u8],
    delivery: &mut dyn Delivery,
    transform: impl FnOnce(&Document) -> Result<Document, PdfToolsError>,
) -> Result<(), PdfToolsError> {
    let doc = load_pdf(bytes)?;
    debug!(operation = %kind, pages = page_count(&doc), "loaded document");
    let mut result = transform(&doc)?;
    deliver_pdf(delivery, output_name(kind)?, &mut result, ctx.config.save)
}

fn unexpected(kind: OperationKind, request: &TransformRequest) -> PdfToolsError {
    PdfToolsError::Operation(format!(
        "{} handler received a {} request",
        kind,
        request.kind()
    ))
}

fn handle_merge(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let files = match request {
        TransformRequest::Merge { files } => files,
        other => return Err(unexpected(OperationKind::Merge, &other)),
    };
    let docs = load_pdfs(&files)?;
    let mut merged = merge_documents(docs)?;
    deliver_pdf(
        delivery,
        output_name(OperationKind::Merge)?,
        &mut merged,
        ctx.config.save,
    )
}

fn handle_split(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let file = match request {
        TransformRequest::Split { file } => file,
        other => return Err(unexpected(OperationKind::Split, &other)),
    };
    let doc = load_pdf(&file.bytes)?;
    for part in split_each(&doc) {
        let (page, mut part) = part?;
        debug!(page, "split page");
        deliver_pdf(
            delivery,
            format!("split_page_{}.pdf", page),
            &mut part,
            ctx.config.save,
        )?;
    }
    Ok(())
}

fn handle_pdf_to_images(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let file = match request {
        TransformRequest::PdfToImages { file } => file,
        other => return Err(unexpected(OperationKind::PdfToImages, &other)),
    };
    // Rejects garbage and encrypted input the same way every other operation does
    let doc = load_pdf(&file.bytes)?;
    debug!(pages = page_count(&doc), "rasterizing");
    rasterize(
        ctx.rasterizer.as_ref(),
        &file.bytes,
        ctx.config.raster_scale,
        delivery,
    )?;
    Ok(())
}

fn handle_watermark(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let (file, text, angle) = match request {
        TransformRequest::Watermark { file, text, angle } => (file, text, angle),
        other => return Err(unexpected(OperationKind::Watermark, &other)),
    };
    encode_win_ansi(&text)?;
    transform_one(ctx, OperationKind::Watermark, &file.bytes, delivery, |doc| {
        watermark(doc, &text, angle, &ctx.config.watermark)
    })
}

fn handle_compress(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let file = match request {
        TransformRequest::Compress { file } => file,
        other => return Err(unexpected(OperationKind::Compress, &other)),
    };
    transform_one(ctx, OperationKind::Compress, &file.bytes, delivery, |doc| {
        resize_pages(doc, ctx.config.resize_factor)
    })
}

fn handle_rotate(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let (file, degrees) = match request {
        TransformRequest::Rotate { file, degrees } => (file, degrees),
        other => return Err(unexpected(OperationKind::Rotate, &other)),
    };
    if degrees % 90 != 0 {
        return Err(PdfToolsError::Validation(format!(
            "Rotation must be a multiple of 90, got {}",
            degrees
        )));
    }
    transform_one(ctx, OperationKind::Rotate, &file.bytes, delivery, |doc| {
        rotate_pages(doc, degrees)
    })
}

fn handle_rearrange(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let (file, order) = match request {
        TransformRequest::Rearrange { file, order } => (file, order),
        other => return Err(unexpected(OperationKind::Rearrange, &other)),
    };
    rebuild_one(ctx, OperationKind::Rearrange, &file.bytes, delivery, |doc| {
        rearrange_pages(doc, &order)
    })
}

fn handle_page_numbers(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let (file, position) = match request {
        TransformRequest::PageNumbers { file, position } => (file, position),
        other => return Err(unexpected(OperationKind::PageNumbers, &other)),
    };
    transform_one(ctx, OperationKind::PageNumbers, &file.bytes, delivery, |doc| {
        page_numbers(doc, position, ctx.config.page_number_font_size)
    })
}

fn handle_flatten(
    _ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let file = match request {
        TransformRequest::Flatten { file } => file,
        other => return Err(unexpected(OperationKind::Flatten, &other)),
    };
    let mut doc = load_pdf(&file.bytes)?;
    deliver_pdf(
        delivery,
        output_name(OperationKind::Flatten)?,
        &mut doc,
        SaveOptions::flattened(),
    )
}

fn handle_images_to_pdf(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let files = match request {
        TransformRequest::ImagesToPdf { files } => files,
        other => return Err(unexpected(OperationKind::ImagesToPdf, &other)),
    };
    let mut doc = images_to_pdf(&files)?;
    deliver_pdf(
        delivery,
        output_name(OperationKind::ImagesToPdf)?,
        &mut doc,
        ctx.config.save,
    )
}

fn handle_remove_pages(
    ctx: &Context,
    request: TransformRequest,
    delivery: &mut dyn Delivery,
) -> Result<(), PdfToolsError> {
    let (file, pages) = match request {
        TransformRequest::RemovePages { file, pages } => (file, pages),
        other => return Err(unexpected(OperationKind::RemovePages, &other)),
    };
    rebuild_one(ctx, OperationKind::RemovePages, &file.bytes, delivery, |doc| {
        remove_pages(doc, &pages)
    })
}
