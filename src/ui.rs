use std::time::Duration;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::CMDMode;
use crate::model::{Model, UIData};

pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const SERIAL_COLUMN_WIDTH: u16 = 6;
pub const CMDLINE_HEIGHT: u16 = 1;
const STATUS_MESSAGE_TIMEOUT: Duration = Duration::from_secs(5);

const LOGIN_WIDTH: u16 = 50;
const LOGIN_HEIGHT: u16 = 7;

pub struct DashboardUI {
    status_timeout: Duration,
}

fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn fixed_rect(r: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + (r.width - width) / 2,
        y: r.y + (r.height - height) / 2,
        width,
        height,
    }
}

impl DashboardUI {
    pub fn new() -> Self {
        Self {
            status_timeout: STATUS_MESSAGE_TIMEOUT,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [title_area, table_area, footer_area, cmd_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        self.draw_title(uidata, frame, title_area);
        self.draw_table(uidata, frame, table_area);
        self.draw_footer(uidata, frame, footer_area);

        if uidata.show_login {
            self.draw_login(uidata, frame);
        } else {
            self.draw_cmdline(uidata, frame, cmd_area);
        }

        if uidata.show_popup {
            self.draw_popup(uidata, frame);
        }
    }

    fn draw_title(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::from(format!(" {} ", uidata.name)).bold()];
        if !uidata.search_term.is_empty() {
            spans.push(Span::from(format!(" search: {} ", uidata.search_term)).yellow());
        }
        if uidata.loading {
            spans.push(Span::from(" Loading... ").cyan());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_set(border::PLAIN);

        if uidata.rows.is_empty() {
            let text = if uidata.loading {
                "Loading..."
            } else {
                "No data found"
            };
            let placeholder = Paragraph::new(text).centered().block(block);
            frame.render_widget(placeholder, area);
            return;
        }

        let header = Row::new(
            std::iter::once(Cell::from("S.NO"))
                .chain(uidata.columns.iter().map(|c| Cell::from(c.name.as_str()))),
        )
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow));

        let rows = uidata.rows.iter().enumerate().map(|(ridx, row)| {
            let serial = Cell::from(format!("{}", uidata.serial_start + ridx));
            Row::new(
                std::iter::once(serial).chain(row.iter().map(|c| Cell::from(c.as_str()))),
            )
        });

        let widths = std::iter::once(Constraint::Length(SERIAL_COLUMN_WIDTH)).chain(
            uidata
                .columns
                .iter()
                .map(|c| Constraint::Length(c.width as u16)),
        );

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan));

        // Column 0 is the serial number.
        let mut state = TableState::default()
            .with_selected(Some(uidata.selected_row))
            .with_selected_column(Some(uidata.selected_column + 1));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_footer(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let footer = Line::from(vec![
            Span::from(format!(
                " Page {} of {} ",
                uidata.current_page,
                std::cmp::max(uidata.total_pages, 1)
            ))
            .bold(),
            Span::from(format!(
                "| {} records | {} per page | ? help ",
                uidata.total_matches, uidata.page_size
            )),
        ]);
        frame.render_widget(Paragraph::new(footer), area);
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        match uidata.cmd_mode {
            Some(mode) if uidata.active_cmdinput => {
                let prompt = mode.prompt();
                let line = Line::from(vec![
                    Span::from(prompt).bold(),
                    Span::from(uidata.cmdinput.display(mode.is_secret())),
                ]);
                frame.render_widget(Paragraph::new(line), area);
                let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
                frame.set_cursor_position(Position::new(x.min(area.right()), area.y));
            }
            _ => {
                let message = if uidata.last_status_message_update.elapsed() < self.status_timeout {
                    uidata.status_message.as_str()
                } else {
                    ""
                };
                frame.render_widget(Paragraph::new(message).italic(), area);
            }
        }
    }

    fn draw_login(&self, uidata: &UIData, frame: &mut Frame) {
        let area = fixed_rect(frame.area(), LOGIN_WIDTH, LOGIN_HEIGHT);
        frame.render_widget(Clear, area);
        let block = Block::bordered()
            .title(Line::from(" Login ".bold()).centered())
            .title_bottom(Line::from(" <Enter> next  <Esc> back ").centered())
            .border_set(border::THICK);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let input = &uidata.cmdinput;
        let (email, password) = match uidata.cmd_mode {
            Some(CMDMode::LoginPassword) => (uidata.login_email.clone(), input.display(true)),
            _ => (input.input.clone(), String::new()),
        };
        let mut lines = vec![
            Line::from(vec![Span::from(CMDMode::LoginEmail.prompt()).bold(), email.into()]),
            Line::from(vec![
                Span::from(CMDMode::LoginPassword.prompt()).bold(),
                password.into(),
            ]),
        ];
        if !uidata.status_message.is_empty()
            && uidata.last_status_message_update.elapsed() < self.status_timeout
        {
            lines.push(Line::from(""));
            lines.push(Line::from(uidata.status_message.as_str()).red());
        }
        frame.render_widget(Paragraph::new(Text::from(lines)), inner);

        let (row, prompt) = match uidata.cmd_mode {
            Some(CMDMode::LoginPassword) => (1, CMDMode::LoginPassword.prompt()),
            _ => (0, CMDMode::LoginEmail.prompt()),
        };
        let x = inner.x + (prompt.chars().count() + input.curser_pos) as u16;
        frame.set_cursor_position(Position::new(x.min(inner.right()), inner.y + row));
    }

    fn draw_popup(&self, uidata: &UIData, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 60, 70);
        frame.render_widget(Clear, area);
        let block = Block::bordered()
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::ROUNDED);
        let popup = Paragraph::new(uidata.popup_message.as_str())
            .wrap(Wrap { trim: false })
            .block(block);
        frame.render_widget(popup, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_rect_stays_inside_small_areas() {
        let area = Rect::new(0, 0, 30, 4);
        let rect = fixed_rect(area, LOGIN_WIDTH, LOGIN_HEIGHT);
        assert_eq!(rect, Rect::new(0, 0, 30, 4));

        let rect = fixed_rect(Rect::new(0, 0, 100, 20), 50, 10);
        assert_eq!(rect, Rect::new(25, 5, 50, 10));
    }
}
