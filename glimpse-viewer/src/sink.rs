//! Terminal rendering sink using ratatui-image.
//!
//! Picks the best graphics protocol the terminal supports:
//! Sixel, Kitty, iTerm2, or a halfblocks fallback that works in any
//! terminal with 24-bit colour. Protocol detection must happen
//! before raw mode is enabled, so [`TerminalSink::new`] queries the
//! terminal first and only then takes it over.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use image::{DynamicImage, ImageBuffer, Rgb, Rgba};
use ratatui::DefaultTerminal;
use ratatui::widgets::{Block, Borders};
use ratatui_image::StatefulImage;
use ratatui_image::picker::{Picker, ProtocolType};

use glimpse_core::{FrameSink, GlimpseError, PixelFormat, RawImage};

/// [`FrameSink`] that draws decoded frames into the terminal and
/// quits on `q` or Esc.
pub struct TerminalSink {
    terminal: DefaultTerminal,
    picker: Picker,
}

impl TerminalSink {
    /// Query terminal capabilities, then enter the alternate screen.
    ///
    /// `force_protocol` skips detection ("sixel", "kitty", "iterm2",
    /// "halfblocks"); anything else, including "auto", detects.
    pub fn new(force_protocol: &str) -> Result<Self, GlimpseError> {
        let picker = match force_protocol.to_lowercase().as_str() {
            "sixel" => forced_picker(ProtocolType::Sixel),
            "kitty" => forced_picker(ProtocolType::Kitty),
            "iterm2" | "iterm" => forced_picker(ProtocolType::Iterm2),
            "halfblocks" | "half" | "text" => Picker::halfblocks(),
            _ => Picker::from_query_stdio().unwrap_or_else(|_| Picker::halfblocks()),
        };

        let terminal = ratatui::init();
        Ok(Self { terminal, picker })
    }

    /// The protocol frames will be rendered with.
    pub fn protocol_type(&self) -> ProtocolType {
        self.picker.protocol_type()
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        ratatui::restore();
    }
}

impl FrameSink for TerminalSink {
    fn render(&mut self, image: &RawImage, title: &str) -> Result<(), GlimpseError> {
        let dynamic = to_dynamic(image)?;
        let mut protocol = self.picker.new_resize_protocol(dynamic);

        self.terminal
            .draw(|frame| {
                let block = Block::default()
                    .title(format!(" {title} (q to quit) "))
                    .borders(Borders::ALL);
                let inner = block.inner(frame.area());
                frame.render_widget(block, frame.area());
                frame.render_stateful_widget(StatefulImage::default(), inner, &mut protocol);
            })
            .map_err(|e| GlimpseError::Render(e.to_string()))?;

        Ok(())
    }

    fn poll_quit(&mut self) -> Result<bool, GlimpseError> {
        while event::poll(Duration::ZERO).map_err(|e| GlimpseError::Render(e.to_string()))? {
            let ev = event::read().map_err(|e| GlimpseError::Render(e.to_string()))?;
            if let Event::Key(key) = ev {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn forced_picker(protocol: ProtocolType) -> Picker {
    let mut picker = Picker::halfblocks();
    picker.set_protocol_type(protocol);
    picker
}

fn to_dynamic(image: &RawImage) -> Result<DynamicImage, GlimpseError> {
    match image.format {
        PixelFormat::Rgba8 => {
            let buf: ImageBuffer<Rgba<u8>, Vec<u8>> =
                ImageBuffer::from_raw(image.width, image.height, image.data.clone())
                    .ok_or(GlimpseError::InvalidImage("rgba buffer too short"))?;
            Ok(DynamicImage::ImageRgba8(buf))
        }
        PixelFormat::Rgb8 => {
            let buf: ImageBuffer<Rgb<u8>, Vec<u8>> =
                ImageBuffer::from_raw(image.width, image.height, image.data.clone())
                    .ok_or(GlimpseError::InvalidImage("rgb buffer too short"))?;
            Ok(DynamicImage::ImageRgb8(buf))
        }
    }
}
