use crate::render::Raster;
use crate::render::surface::{TextAlign, TextRun};
use anyhow::{Context, Result};
use crossterm::{cursor, execute};
use std::io::{IsTerminal, Write};
use viuer::{Config as ViuerConfig, print};

/// Terminal size requested for the image, in character cells
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSize {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Print a rendered frame; returns the (columns, rows) it occupied
pub fn print_frame(raster: &Raster, size: TerminalSize) -> Result<(u32, u32)> {
    let is_tty = std::io::stdout().is_terminal();

    let (config_width, config_height) = match (size.width, size.height) {
        (Some(w), ..) => (Some(w), None),
        (None, Some(h)) => (None, Some(h)),
        (None, None) => (Some(48), None),
    };

    let config = ViuerConfig {
        width: config_width,
        height: config_height,
        absolute_offset: false,
        use_kitty: is_tty,
        use_iterm: is_tty,
        use_sixel: is_tty,
        ..Default::default()
    };

    std::io::stdout()
        .flush()
        .context("Failed to flush stdout")?;

    print(&raster.to_image(), &config).context("Failed to display image")
}

/// Overlay text of a frame, top to bottom
pub fn print_texts(texts: &[TextRun]) {
    let mut sorted: Vec<&TextRun> = texts.iter().collect();
    sorted.sort_by(|a, b| {
        a.position
            .y
            .total_cmp(&b.position.y)
            .then(a.position.x.total_cmp(&b.position.x))
    });

    for run in sorted {
        let marker = match run.align {
            TextAlign::Left => ' ',
            TextAlign::Right => '>',
        };
        println!("{marker} {}", run.text);
    }
}

/// Move the cursor back up over `rows` printed lines so the next frame
/// overwrites the previous one
pub fn rewind(rows: u32) -> Result<()> {
    if rows == 0 || !std::io::stdout().is_terminal() {
        return Ok(());
    }
    let rows = u16::try_from(rows).unwrap_or(u16::MAX);
    execute!(std::io::stdout(), cursor::MoveToPreviousLine(rows))
        .context("Failed to move the cursor")
}
