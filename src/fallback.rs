//! Static stand-in for widgets that cannot render.
//!
//! When a host cannot render, or a session loses its context, the container
//! receives a gradient panel instead of a canvas. The panel is inserted at
//! most once per session; later requests leave the container alone.

use std::cell::Cell;

use log::info;

/// Host element a widget attaches to. Methods take `&self` because the host
/// owns the element and callbacks may hold shared references to it.
pub trait Container {
    /// Rendered size in CSS pixels.
    fn client_size(&self) -> (u32, u32);

    /// Remove every child, including a canvas that was partially set up.
    fn clear_children(&self);

    fn insert_html(&self, html: &str);
}

/// Content of the static panel.
#[derive(Clone, Debug, PartialEq)]
pub struct FallbackMarkup {
    pub label: Option<String>,
    pub caption: Option<String>,
    /// Opacity of the whole panel.
    pub opacity: f32,
    /// Alpha of the radial glow at the centre.
    pub glow: f32,
}

impl Default for FallbackMarkup {
    fn default() -> Self {
        Self {
            label: None,
            caption: None,
            opacity: 0.3,
            glow: 0.05,
        }
    }
}

impl FallbackMarkup {
    pub fn labelled(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn to_html(&self) -> String {
        let mut html = format!(
            "<div class=\"absolute inset-0 bg-gradient-to-br from-slate-900 via-slate-800 to-slate-900 opacity-{} pointer-events-none\">\
             <div class=\"absolute inset-0 bg-[radial-gradient(circle_at_50%_50%,rgba(120,119,198,{}),transparent_50%)]\"></div>",
            (self.opacity.clamp(0.0, 1.0) * 100.0).round() as u32,
            self.glow.clamp(0.0, 1.0),
        );
        if self.label.is_some() || self.caption.is_some() {
            html.push_str("<div class=\"flex items-center justify-center h-full\"><div class=\"text-center\">");
            if let Some(label) = &self.label {
                html.push_str(&format!(
                    "<div class=\"text-4xl md:text-6xl font-bold text-gradient mb-4\">{}</div>",
                    escape(label)
                ));
            }
            if let Some(caption) = &self.caption {
                html.push_str(&format!(
                    "<p class=\"text-gray-400 text-sm\">{}</p>",
                    escape(caption)
                ));
            }
            html.push_str("</div></div>");
        }
        html.push_str("</div>");
        html
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Inserts the fallback panel once per session.
#[derive(Debug, Default)]
pub struct FallbackRenderer {
    engaged: Cell<bool>,
}

impl FallbackRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.get()
    }

    /// Replace the container content with the panel. Returns `false` if the
    /// panel is already showing.
    pub fn render(&self, container: &dyn Container, markup: &FallbackMarkup) -> bool {
        if self.engaged.replace(true) {
            return false;
        }
        container.clear_children();
        container.insert_html(&markup.to_html());
        info!("fallback panel engaged");
        true
    }
}

#[cfg(target_arch = "wasm32")]
pub use web::ElementContainer;

#[cfg(target_arch = "wasm32")]
mod web {
    use super::Container;

    /// A DOM element used as widget container.
    #[derive(Clone, Debug)]
    pub struct ElementContainer(pub web_sys::Element);

    impl Container for ElementContainer {
        fn client_size(&self) -> (u32, u32) {
            (
                self.0.client_width().max(0) as u32,
                self.0.client_height().max(0) as u32,
            )
        }

        fn clear_children(&self) {
            while let Some(child) = self.0.first_child() {
                if self.0.remove_child(&child).is_err() {
                    break;
                }
            }
        }

        fn insert_html(&self, html: &str) {
            if let Err(e) = self.0.insert_adjacent_html("beforeend", html) {
                log::error!("could not insert fallback markup: {:?}", e);
            }
        }
    }
}
