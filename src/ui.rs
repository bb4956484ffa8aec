use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table, Wrap,
    },
};

use crate::coordinator::Mode;
use crate::model::UIData;

pub const CMDLINE_HEIGHT: usize = 2;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const MATCH_STYLE: Style = Style::new().fg(Color::Black).bg(Color::Yellow);
const CURRENT_MATCH_STYLE: Style = Style::new().fg(Color::Black).bg(Color::LightRed);

pub fn draw(uidata: &UIData, frame: &mut Frame) {
    let [grid_area, input_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    draw_grid(uidata, frame, grid_area);
    draw_input_line(uidata, frame, input_area);
    draw_status_line(uidata, frame, status_area);

    if uidata.show_popup {
        draw_popup(uidata, frame);
    }
}

/// Both modes render as a grid: the table view with one column per
/// visible dataset column, the record view with a field and a value
/// column.
fn draw_grid(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let [table_area, scrollbar_area] = Layout::horizontal([
        Constraint::Min(1),
        Constraint::Length(SCROLLBAR_WIDTH as u16),
    ])
    .areas(area);

    if uidata.table.is_empty() {
        let hint = Paragraph::new("No data loaded. Press q to quit.".dark_gray());
        frame.render_widget(hint, table_area);
        return;
    }

    let window_rows = uidata.table.first().map(|c| c.data.len()).unwrap_or(0);
    let header = Row::new(
        uidata
            .table
            .iter()
            .map(|column| Cell::from(Span::from(column.name.clone()).bold())),
    );
    let rows = (0..window_rows).map(|ridx| {
        Row::new(uidata.table.iter().enumerate().map(|(cidx, column)| {
            let mut style = Style::default();
            if uidata.highlights.contains(&(ridx, cidx)) {
                style = MATCH_STYLE;
            }
            if uidata.current_match == Some((ridx, cidx)) {
                style = CURRENT_MATCH_STYLE;
            }
            if ridx == uidata.selected_row && cidx == uidata.selected_column {
                style = style.add_modifier(Modifier::REVERSED);
            } else if ridx == uidata.selected_row {
                style = style.add_modifier(Modifier::BOLD);
            }
            Cell::from(column.data[ridx].clone()).style(style)
        }))
    });
    let widths = uidata
        .table
        .iter()
        .map(|column| Constraint::Length(column.width as u16));

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(COLUMN_WIDTH_MARGIN as u16);
    frame.render_widget(table, table_area);

    if uidata.mode == Mode::Table && uidata.nrows > 0 {
        let mut state = ScrollbarState::new(uidata.nrows)
            .position(uidata.offset_row + uidata.selected_row);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut state,
        );
    }
}

fn draw_input_line(uidata: &UIData, frame: &mut Frame, area: Rect) {
    if uidata.active_cmdinput {
        let line = Line::from(vec![
            "/".bold(),
            Span::from(uidata.cmdinput.input.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        frame.set_cursor_position(Position::new(
            area.x + 1 + uidata.cmdinput.cursor_pos as u16,
            area.y,
        ));
    } else {
        let tag = match uidata.mode {
            Mode::Table => " TABLE ",
            Mode::Record => " RECORD ",
        };
        let line = Line::from(vec![
            Span::from(uidata.name.clone()).bold(),
            " ".into(),
            tag.reversed(),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }
}

fn draw_status_line(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let position = match uidata.mode {
        Mode::Record if uidata.nrows > 0 => {
            format!("Record {} of {}", uidata.abs_selected_row + 1, uidata.nrows)
        }
        Mode::Record => "No records".to_string(),
        Mode::Table => format!("{} rows, {} columns", uidata.nrows, uidata.ncols),
    };
    frame.render_widget(Paragraph::new(uidata.status_message.clone()), area);
    frame.render_widget(
        Paragraph::new(position.dark_gray()).alignment(Alignment::Right),
        area,
    );
}

fn draw_popup(uidata: &UIData, frame: &mut Frame) {
    let area = popup_area(frame.area(), 70, 80);
    frame.render_widget(Clear, area);
    let block = Block::bordered()
        .title(Line::from(" rv ".bold()).centered())
        .border_set(border::THICK);
    let popup = Paragraph::new(uidata.popup_message.clone())
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(popup, area);
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
