use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState},
};

use crate::model::{Model, UIData};

pub const COLUMN_WIDTH_MARGIN: usize = 2;
pub const MAX_COLUMN_WIDTH: usize = 40;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGH: u16 = 1;

#[derive(Debug, Default)]
pub struct TableUI {
    table_state: TableState,
}

impl TableUI {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [table_area, footer_area, cmdline_area] = Layout::vertical([
            Constraint::Min(TABLE_HEADER_HEIGHT + 2),
            Constraint::Length(1),
            Constraint::Length(CMDLINE_HEIGH),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        frame.render_widget(Paragraph::new(TableUI::footer(uidata)), footer_area);
        self.draw_cmdline(uidata, frame, cmdline_area);

        if uidata.show_popup {
            TableUI::draw_popup(uidata, frame);
        }
    }

    fn title(uidata: &UIData) -> Line<'_> {
        let mut spans = vec![
            Span::from(format!(" {} ", uidata.name)).bold(),
            Span::from("│ stage: "),
            Span::from(uidata.filter.label()).yellow(),
            Span::from(" "),
        ];
        if uidata.loading {
            spans.push(Span::from("⟳ ").cyan());
        }
        Line::from(spans)
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let header = Row::new(
            uidata
                .columns
                .iter()
                .map(|c| Cell::from(c.name.as_str())),
        )
        .style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Yellow))
        .height(TABLE_HEADER_HEIGHT);

        let rows = (0..uidata.nrows).map(|ridx| {
            Row::new(
                uidata
                    .columns
                    .iter()
                    .map(|c| Cell::from(c.data.get(ridx).map(String::as_str).unwrap_or(""))),
            )
        });
        let widths = uidata
            .columns
            .iter()
            .map(|c| Constraint::Length(c.width as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::bordered()
                    .title(TableUI::title(uidata))
                    .border_set(border::PLAIN),
            )
            .row_highlight_style(Style::default().bg(Color::DarkGray))
            .cell_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

        if uidata.nrows == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(uidata.selected_row));
        }
        self.table_state.select_column(Some(uidata.selected_column));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn footer(uidata: &UIData) -> Line<'_> {
        let control = |label: &'static str, disabled: bool| {
            if disabled {
                Span::from(label).dark_gray()
            } else {
                Span::from(label).blue().bold()
            }
        };
        let total = uidata
            .total_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());

        Line::from(vec![
            control(" ‹ Previous <p> ", uidata.previous_disabled),
            Span::from(format!(
                " Page {} of {} ({} customers) ",
                uidata.page_number, uidata.total_pages, total
            )),
            control(" <n> Next › ", uidata.next_disabled),
            Span::from(" Help <?> ").dark_gray(),
        ])
        .centered()
    }

    fn draw_cmdline(&self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = uidata.cmd_mode.map(|m| m.prompt()).unwrap_or("> ");
            let line = Line::from(vec![
                Span::from(prompt).bold(),
                Span::from(uidata.cmdinput.input.as_str()),
            ]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(1)), area.y));
        } else if let Some(error) = &uidata.error_message {
            let line = Line::from(Span::from(error.as_str()).white().on_red());
            frame.render_widget(Paragraph::new(line), area);
        } else {
            let line = Line::from(Span::from(uidata.status_message.as_str()).italic());
            frame.render_widget(Paragraph::new(line), area);
        }
    }

    fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
        let [area] = Layout::horizontal([Constraint::Length(width)])
            .flex(Flex::Center)
            .areas(area);
        let [area] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        area
    }

    fn draw_popup(uidata: &UIData, frame: &mut Frame) {
        let lines: Vec<Line> = uidata.popup_message.lines().map(Line::from).collect();
        let width = lines.iter().map(|l| l.width()).max().unwrap_or(0) as u16 + 4;
        let height = lines.len() as u16 + 2;
        let area = TableUI::popup_area(frame.area(), width, height);

        let block = Block::bordered()
            .title(Line::from(" Help ".bold()).centered())
            .title_bottom(Line::from(" <Esc> ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }
}
