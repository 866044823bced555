use console::style;

use crate::model::Status;

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn dim(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> console::StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Color for a build status in tables.
pub fn status_color(status: &Status) -> Option<comfy_table::Color> {
    use comfy_table::Color;

    match status {
        Status::Success => Some(Color::Green),
        Status::Failed => Some(Color::Red),
        Status::Running | Status::Pending => Some(Color::Yellow),
        Status::Cancelled | Status::Skipped => Some(Color::DarkGrey),
        Status::Other(_) => None,
    }
}
