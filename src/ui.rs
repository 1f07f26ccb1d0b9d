use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table},
};

use crate::domain::{CmdMode, TabConfig};
use crate::inputter::InputResult;
use crate::model::UIData;
use crate::schema::ValueType;

pub const CMDLINE_HEIGH: u16 = 1;
pub const FOOTER_HEIGHT: u16 = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;
const CURSER: char = '▏';

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
}

impl TableUI {
    pub fn new(cfg: &TabConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
        }
    }

    pub fn draw(&self, uidata: &UIData, frame: &mut Frame<'_>) {
        let [table_area, cmdline_area, footer_area] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(CMDLINE_HEIGH),
            Constraint::Length(FOOTER_HEIGHT),
        ])
        .areas(frame.area());

        self.draw_table(uidata, frame, table_area);
        frame.render_widget(Self::cmdline(uidata), cmdline_area);
        frame.render_widget(Self::footer(uidata), footer_area);

        if uidata.show_popup {
            let area = popup_area(frame.area(), 70, 80);
            frame.render_widget(Clear, area);
            frame.render_widget(
                Paragraph::new(Text::from(uidata.popup_message.as_str())).block(
                    Block::bordered()
                        .title(Line::from(" Help ".bold()).centered())
                        .title_bottom(Line::from(" <Esc> to close ").centered())
                        .border_set(border::THICK),
                ),
                area,
            );
        }
    }

    fn draw_table(&self, uidata: &UIData, frame: &mut Frame<'_>, area: Rect) {
        let title = if uidata.name.is_empty() {
            Line::from(" tabedit ".bold())
        } else {
            Line::from(format!(" {} ", uidata.name).bold())
        };
        let block = Block::bordered().title(title.centered());

        let header = Row::new(
            uidata
                .headers
                .iter()
                .map(|h| Cell::from(h.as_str()))
                .collect::<Vec<Cell<'_>>>(),
        )
        .style(Style::new().bold().underlined());

        let rows: Vec<Row<'_>> = if uidata.rows.is_empty() {
            vec![Row::new(vec![Cell::from("No results.".italic())])]
        } else {
            uidata
                .rows
                .iter()
                .enumerate()
                .map(|(ridx, row)| {
                    let cells = row.iter().enumerate().map(|(cidx, text)| {
                        let selected = ridx == uidata.selected_row && cidx == uidata.selected_column;
                        match (&uidata.editing, selected) {
                            (Some(input), true) => Cell::from(with_curser(input))
                                .style(Style::new().add_modifier(Modifier::REVERSED).yellow()),
                            (None, true) => Cell::from(text.as_str())
                                .style(Style::new().add_modifier(Modifier::REVERSED)),
                            _ => Cell::from(text.as_str()),
                        }
                    });
                    Row::new(cells.collect::<Vec<Cell<'_>>>())
                })
                .collect()
        };

        let widths = self.column_widths(uidata);
        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(block);
        frame.render_widget(table, area);
    }

    fn column_widths(&self, uidata: &UIData) -> Vec<Constraint> {
        if uidata.rows.is_empty() {
            return vec![Constraint::Fill(1)];
        }
        uidata
            .headers
            .iter()
            .enumerate()
            .map(|(cidx, header)| {
                let data_width = uidata
                    .rows
                    .iter()
                    .filter_map(|r| r.get(cidx))
                    .map(|s| s.chars().count())
                    .max()
                    .unwrap_or(0);
                let width = match uidata.column_types.get(cidx) {
                    Some(ValueType::Boolean) => std::cmp::max(header.chars().count(), 3),
                    _ => std::cmp::max(header.chars().count(), data_width) + COLUMN_WIDTH_MARGIN,
                };
                Constraint::Length(std::cmp::min(width, self.max_column_width) as u16)
            })
            .collect()
    }

    fn cmdline(uidata: &UIData) -> Paragraph<'_> {
        match (&uidata.cmdinput, uidata.cmd_mode) {
            (Some(input), Some(CmdMode::OpenFile)) => Paragraph::new(Line::from(vec![
                "Open file: ".blue().bold(),
                Span::raw(with_curser(input)),
            ])),
            _ => Paragraph::new(Line::from(uidata.status_message.as_str().yellow())),
        }
    }

    fn footer(uidata: &UIData) -> Paragraph<'_> {
        let mut spans = vec![
            " Rows per page: ".into(),
            uidata.page_size.to_string().bold(),
            "  Page ".into(),
            format!("{} of {}", uidata.page_index + 1, uidata.page_count).bold(),
        ];
        if uidata.can_go_previous {
            spans.push(" <p".dark_gray());
        }
        if uidata.can_go_next {
            spans.push(" n>".dark_gray());
        }
        spans.push(format!("  {} rows", uidata.nrows).into());
        if uidata.modified {
            spans.push("  [modified]".red());
        }
        spans.push("  Help ".into());
        spans.push("<?>".blue().bold());
        Paragraph::new(Line::from(spans))
    }
}

fn with_curser(input: &InputResult) -> String {
    let mut text = input.input.clone();
    let idx = text
        .char_indices()
        .nth(input.curser_pos)
        .map(|(byte_idx, _)| byte_idx)
        .unwrap_or(text.len());
    text.insert(idx, CURSER);
    text
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [area] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);
    let [area] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(ratatui::layout::Flex::Center)
        .areas(area);
    area
}
