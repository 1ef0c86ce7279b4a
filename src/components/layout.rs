//! Layout calculations for the UI

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Main screen layout areas
pub struct MainLayout {
    pub header: Rect,
    pub filters: Option<Rect>,
    pub search: Option<Rect>,
    pub table: Rect,
    pub status: Option<Rect>,
    pub help: Rect,
}

/// Calculate centered popup area
pub fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_x = area.x + (area.width.saturating_sub(width)) / 2;
    let popup_y = area.y + (area.height.saturating_sub(height)) / 2;

    Rect::new(
        popup_x,
        popup_y,
        width.min(area.width),
        height.min(area.height),
    )
}

/// Calculate main screen layout
///
/// Header, optional filter strip, optional search bar, the table, an
/// optional status line and the help bar, top to bottom.
pub fn calculate_main_layout(area: Rect, has_filters: bool, has_search: bool, has_status: bool) -> MainLayout {
    let mut constraints = vec![Constraint::Length(3)];
    if has_filters {
        constraints.push(Constraint::Length(1));
    }
    if has_search {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(0));
    if has_status {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Length(3));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = chunks.iter().copied();
    let mut take = || next.next().unwrap_or_default();

    let header = take();
    let filters = has_filters.then(&mut take);
    let search = has_search.then(&mut take);
    let table = take();
    let status = has_status.then(&mut take);
    let help = take();

    MainLayout {
        header,
        filters,
        search,
        table,
        status,
        help,
    }
}

/// Pad or cut `text` to exactly `width` terminal columns
///
/// Cut text ends in an ellipsis. Wide characters count double.
pub fn fit_to_width(text: &str, width: usize) -> String {
    let text_width = text.width();
    if text_width <= width {
        return format!("{}{}", text, " ".repeat(width - text_width));
    }
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width - 1 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    used += 1;
    out.push_str(&" ".repeat(width.saturating_sub(used)));
    out
}
