use educe::Educe;
use folio::{
    graphics::trans::{logic_device_to_device, LogicDeviceToDeviceSpace},
    page::Page,
};
use image::RgbaImage;
use log::debug;
use tiny_skia::{Color, Pixmap};

mod annot;
mod error;
mod glyph;
mod group;
mod into_skia;
mod render;
mod shading;

use annot::AppearancePlacement;
use render::{Render, State};

#[derive(Debug, Educe, Clone, Copy)]
#[educe(Default)]
pub struct PageDimension {
    #[educe(Default = 1.0)]
    zoom: f32,
    width: f32,
    height: f32,
}

impl PageDimension {
    pub fn update(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn canvas_width(&self) -> u32 {
        (self.width * self.zoom) as u32
    }

    pub fn canvas_height(&self) -> u32 {
        (self.height * self.zoom) as u32
    }

    pub fn logic_device_to_device(&self) -> LogicDeviceToDeviceSpace {
        logic_device_to_device(self.height, self.zoom)
    }
}

/// Option for Render
#[derive(Debug, Educe, Clone)]
#[educe(Default)]
pub struct RenderOption {
    #[educe(Default(expression = "Color::WHITE"))]
    background_color: Color,
    dimension: PageDimension,
}

impl RenderOption {
    pub fn create_canvas(&self) -> Pixmap {
        let (w, h) = (
            self.dimension.canvas_width() as u64,
            self.dimension.canvas_height() as u64,
        );
        if w * h > 1024 * 1024 * 100 {
            panic!("page size too large: {}x{}", w, h);
        }

        let mut r = Pixmap::new(w as u32, h as u32).unwrap();
        if self.background_color.is_opaque() {
            r.fill(self.background_color);
        }
        r
    }
}

#[derive(Educe)]
#[educe(Default(new))]
pub struct RenderOptionBuilder(RenderOption);

impl RenderOptionBuilder {
    pub fn zoom(mut self, zoom: f32) -> Self {
        self.0.dimension.zoom = zoom;
        self
    }

    pub fn page_size(mut self, width: f32, height: f32) -> Self {
        self.0.dimension.update(width, height);
        self
    }

    pub fn background_color(mut self, color: Color) -> Self {
        self.0.background_color = color;
        self
    }

    pub fn build(self) -> RenderOption {
        self.0
    }
}

/// Straight alpha copy of the canvas.
pub fn to_image(canvas: Pixmap) -> RgbaImage {
    let (w, h) = (canvas.width(), canvas.height());
    let data = canvas
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    RgbaImage::from_raw(w, h, data).unwrap()
}

pub fn render_page(page: &Page, option: RenderOptionBuilder) -> Pixmap {
    render_steps(page, option, None)
}

/// Render the page content, then the visible annotations on top of it.
/// `steps` truncates the content stream, for bisecting a bad page.
pub fn render_steps(page: &Page, option: RenderOptionBuilder, steps: Option<usize>) -> Pixmap {
    let (mut width, mut height) = (page.width, page.height);
    // if page is empty, use default A4 size
    if width == 0.0 || height == 0.0 {
        width = 597.6;
        height = 842.4;
    }
    let option = option.page_size(width, height).build();
    let mut canvas = option.create_canvas();
    let state = State::new(option.dimension.logic_device_to_device());
    let mut renderer = Render::new(&mut canvas, state);
    let ops = match steps {
        Some(n) => &page.content[..n.min(page.content.len())],
        None => &page.content[..],
    };
    renderer.run(ops);

    for annotation in &page.annotations {
        if annotation.hidden {
            continue;
        }
        let Some(appearance) = &annotation.appearance else {
            debug!("annotation without appearance stream skipped");
            continue;
        };
        let Some(placement) =
            AppearancePlacement::compute(&annotation.rect, &appearance.b_box, appearance.matrix)
        else {
            continue;
        };
        renderer.run_annotation(&placement, &appearance.ops);
    }
    drop(renderer);
    canvas
}
