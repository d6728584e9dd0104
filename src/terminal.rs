use crate::runtime::mode::Mode;
use crate::ui::{Line, Style};
use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
};
use std::io::{self, Write};

const FALLBACK_WIDTH: usize = 100;
const MIN_WIDTH: usize = 20;

/// Current terminal width in columns, or a fallback when stdout is not a
/// terminal.
pub fn width() -> usize {
    crossterm::terminal::size()
        .map(|(columns, _)| usize::from(columns))
        .unwrap_or(FALLBACK_WIDTH)
        .max(MIN_WIDTH)
}

pub fn style_color(style: Style) -> Color {
    match style {
        Style::User => Color::Cyan,
        Style::Assistant => Color::Reset,
        Style::Reasoning | Style::Meta => Color::DarkGrey,
        Style::Tool => Color::Blue,
        Style::Blocked => Color::Yellow,
        Style::Error => Color::Red,
    }
}

pub fn write_lines<W: Write>(out: &mut W, lines: &[Line]) -> io::Result<()> {
    for line in lines {
        if line.style == Style::Assistant {
            queue!(out, Print(&line.text), Print("\n"))?;
            continue;
        }
        if line.style == Style::Reasoning {
            queue!(out, SetAttribute(Attribute::Italic))?;
        }
        queue!(
            out,
            SetForegroundColor(style_color(line.style)),
            Print(&line.text),
            ResetColor,
            SetAttribute(Attribute::Reset),
            Print("\n")
        )?;
    }
    out.flush()
}

pub fn print_lines(lines: &[Line]) -> io::Result<()> {
    write_lines(&mut io::stdout().lock(), lines)
}

/// Writes streamed assistant text without a trailing newline.
pub fn print_delta(delta: &str) -> io::Result<()> {
    let mut out = io::stdout().lock();
    queue!(out, Print(delta))?;
    out.flush()
}

pub fn print_prompt(mode: Mode) -> io::Result<()> {
    let color = match mode {
        Mode::ReadOnly => Color::Green,
        Mode::FullAccess => Color::Magenta,
    };
    let mut out = io::stdout().lock();
    queue!(
        out,
        SetForegroundColor(color),
        Print(format!("[{mode}]")),
        ResetColor,
        Print(" › ")
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_lines_keeps_text_and_order() {
        let mut out = Vec::new();
        write_lines(
            &mut out,
            &[
                Line::new(Style::User, "> hello"),
                Line::new(Style::Assistant, "hi"),
            ],
        )
        .unwrap();
        let written = String::from_utf8(out).unwrap();
        let user = written.find("> hello").unwrap();
        let assistant = written.find("hi\n").unwrap();
        assert!(user < assistant);
        assert!(written.contains('\u{1b}'));
    }

    #[test]
    fn test_width_has_a_floor() {
        assert!(width() >= MIN_WIDTH);
    }
}
