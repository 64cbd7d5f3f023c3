// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};

use super::app::App;
use super::widgets::{centered_rect, create_help_widget, emphasis_style, progress_bar};
use crate::focus::{FocusKey, ListId};
use crate::player::PlaybackState;
use crate::viewport::{RowEmphasis, visible_range};

const EPG_CARD_WIDTH: u16 = 26;

pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Footer
        ])
        .split(size);

    draw_header(frame, app, chunks[0]);
    draw_content(frame, app, chunks[1]);
    draw_footer(frame, app, chunks[2]);

    if app.focus.snapshot().is_fullscreen() {
        draw_fullscreen_overlay(frame, app, size);
    }

    if app.show_help {
        draw_help_overlay(frame, size);
    }

    if let Some(message) = &app.loading {
        draw_loading_overlay(frame, size, message);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let header_text = match app.current_category.and_then(|i| app.categories.get(i)) {
        Some(category) => format!("Nimbus | {} | {}", app.account, category.category_name),
        None => format!("Nimbus | {}", app.account),
    };

    let header = Paragraph::new(header_text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Blue)),
        );

    frame.render_widget(header, area);
}

fn draw_content(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(26), // Categories
            Constraint::Length(40), // Channels
            Constraint::Min(40),    // Detail
        ])
        .split(area);

    draw_categories(frame, app, chunks[0]);
    draw_channels(frame, app, chunks[1]);
    draw_detail(frame, app, chunks[2]);
}

fn column_block(title: &str, active: bool) -> Block<'_> {
    let border = if active { Color::Yellow } else { Color::White };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(format!(" {} ", title))
}

fn focus_in(app: &App, prefix: &str) -> bool {
    app.focus
        .snapshot()
        .current_focus
        .as_ref()
        .is_some_and(|key| key.index_for(prefix).is_some())
}

fn draw_categories(frame: &mut Frame, app: &App, area: Rect) {
    let block = column_block("Categories", focus_in(app, "category"));
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let count = app.categories.len();
    if count == 0 {
        return;
    }

    let focused = app.focused_index(ListId::Categories, "category");
    let range = visible_range(focused, count, inner_area.height, 1);
    let visible = range.len();

    let items: Vec<ListItem> = range
        .map(|index| {
            let category = &app.categories[index];
            let marker = if app.is_focused(&FocusKey::category(index)) {
                " ▶ "
            } else if app.current_category == Some(index) {
                " • "
            } else {
                "   "
            };
            let style = emphasis_style(RowEmphasis::for_row(index, focused, count, visible));
            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::raw(category.category_name.clone()),
            ]))
            .style(style)
        })
        .collect();

    frame.render_widget(List::new(items), inner_area);

    if count > visible {
        draw_scrollbar(frame, inner_area, focused.saturating_sub(visible / 2), count, visible);
    }
}

fn draw_channels(frame: &mut Frame, app: &App, area: Rect) {
    let active = focus_in(app, "channel-item") || focus_in(app, "favorite");
    let block = column_block("Channels", active);
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let count = app.channels.len();
    if count == 0 {
        let message = if app.current_category.is_some() {
            "No channels"
        } else {
            "Select a category"
        };
        let empty_msg = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty_msg, inner_area);
        return;
    }

    let focused = app.focused_index(ListId::Channels, "channel-item");
    let range = visible_range(focused, count, inner_area.height, 1);
    let visible = range.len();
    let snapshot = app.focus.snapshot();

    let items: Vec<ListItem> = range
        .map(|index| {
            let channel = &app.channels[index];
            let marker = if app.is_focused(&FocusKey::channel_item(index)) {
                " ▶ "
            } else if snapshot.is_selected(channel.stream_id) {
                " ● "
            } else {
                "   "
            };
            let star = if app.is_favorite(channel.stream_id) {
                "★"
            } else {
                "☆"
            };
            let star_style = if app.is_focused(&FocusKey::favorite_toggle(index)) {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::REVERSED)
            } else {
                Style::default().fg(Color::Yellow)
            };
            let number = channel
                .num
                .map(|n| format!("{:>4} ", n))
                .unwrap_or_default();

            ListItem::new(Line::from(vec![
                Span::raw(marker),
                Span::raw(number),
                Span::raw(channel.name.clone()),
                Span::raw(" "),
                Span::styled(star, star_style),
            ]))
            .style(emphasis_style(RowEmphasis::for_row(
                index, focused, count, visible,
            )))
        })
        .collect();

    frame.render_widget(List::new(items), inner_area);

    if count > visible {
        draw_scrollbar(frame, inner_area, focused.saturating_sub(visible / 2), count, visible);
    }
}

fn draw_detail(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Preview
            Constraint::Length(3), // Days
            Constraint::Length(7), // EPG
            Constraint::Min(3),    // Logs
        ])
        .split(area);

    draw_preview(frame, app, chunks[0]);
    draw_days(frame, app, chunks[1]);
    draw_epg(frame, app, chunks[2]);
    draw_logs_panel(frame, app, chunks[3]);
}

fn playback_line(state: &PlaybackState) -> Line<'static> {
    if let Some(err) = &state.last_error {
        Line::from(format!("⚠ {}", err.banner())).style(Style::default().fg(Color::Red))
    } else if state.is_loading {
        Line::from("⏳ Buffering...").style(Style::default().fg(Color::Yellow))
    } else if state.url.is_some() {
        Line::from("▶ Playing").style(Style::default().fg(Color::Green))
    } else {
        Line::from("Stopped").style(Style::default().fg(Color::DarkGray))
    }
}

fn draw_preview(frame: &mut Frame, app: &App, area: Rect) {
    let block = column_block("Preview", app.is_focused(&FocusKey::preview()));
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let Some(channel) = &app.focus.snapshot().selected_channel else {
        let empty_msg = Paragraph::new("No channel selected")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty_msg, inner_area);
        return;
    };

    let mut lines = vec![
        Line::from(channel.name.clone())
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        playback_line(&app.player.state()),
    ];
    if let Some(program) = app.epg.current_program() {
        lines.push(Line::from(format!(
            "Now: {} ({})",
            program.title,
            program.time_range()
        )));
    }
    lines.push(
        Line::from("Enter: fullscreen").style(Style::default().fg(Color::DarkGray)),
    );

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), inner_area);
}

fn draw_days(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Guide ");
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let mut spans = Vec::new();
    for day in &app.days {
        let mut style = if day.offset == app.selected_day {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        if app.is_focused(&FocusKey::day(day.offset)) {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(format!(" {} ", day.label), style));
        spans.push(Span::raw(" "));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), inner_area);
}

fn draw_epg(frame: &mut Frame, app: &App, area: Rect) {
    let programs = app.epg.programs();

    if programs.is_empty() {
        let (message, color) = if app.epg.is_loading() {
            ("Loading guide...".to_string(), Color::DarkGray)
        } else if let Some(err) = app.epg.last_error() {
            let hint = if err.is_retryable() { " | r: Retry" } else { "" };
            (format!("⚠ {}{}", err.banner(), hint), Color::Red)
        } else if app.focus.snapshot().selected_channel.is_some() {
            ("No programs".to_string(), Color::DarkGray)
        } else {
            (String::new(), Color::DarkGray)
        };
        let empty_msg = Paragraph::new(message)
            .style(Style::default().fg(color))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        frame.render_widget(empty_msg, area);
        return;
    }

    let focused = app.focused_index(ListId::Epg, "program");
    let range = visible_range(focused, programs.len(), area.width, EPG_CARD_WIDTH);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(range.clone().map(|_| Constraint::Length(EPG_CARD_WIDTH)))
        .split(area);

    for (slot, index) in range.enumerate() {
        let program = &programs[index];
        let border = if app.is_focused(&FocusKey::program(index)) {
            Color::Yellow
        } else if program.is_live {
            Color::Green
        } else {
            Color::DarkGray
        };

        let mut lines = vec![
            Line::from(program.title.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
        ];
        if let Some(progress) = program.progress {
            let width = EPG_CARD_WIDTH.saturating_sub(4) as usize;
            lines.push(
                Line::from(progress_bar(progress, width)).style(Style::default().fg(Color::Green)),
            );
        } else {
            lines.push(
                Line::from(format!("{} min", program.duration_minutes))
                    .style(Style::default().fg(Color::DarkGray)),
            );
        }
        if !program.description.is_empty() {
            lines.push(
                Line::from(program.description.clone()).style(Style::default().fg(Color::Gray)),
            );
        }

        let card = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(format!(" {} ", program.time_range())),
        );
        frame.render_widget(card, columns[slot]);
    }
}

fn draw_logs_panel(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Logs ");

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    if app.logs.is_empty() {
        return;
    }

    let visible_count = inner_area.height as usize;
    let start = app.logs.len().saturating_sub(visible_count);

    let log_lines: Vec<Line> = app.logs[start..]
        .iter()
        .map(|(time, msg)| {
            Line::from(format!("{} {}", time.format("%H:%M:%S"), msg))
                .style(Style::default().fg(Color::Gray))
        })
        .collect();

    frame.render_widget(Paragraph::new(log_lines).wrap(Wrap { trim: true }), inner_area);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect) {
    let footer_text = if let Some(msg) = &app.status_message {
        msg.clone()
    } else if app.focus.snapshot().is_fullscreen() {
        " ↑↓: Channel | Esc: Back to preview | q: Quit ".to_string()
    } else {
        " ↑↓←→: Navigate | Enter: Select | f: Favorite | Esc: Back | ?: Help | q: Quit "
            .to_string()
    };

    let style = if app.status_message.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let footer = Paragraph::new(footer_text)
        .style(style)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray)),
        );

    frame.render_widget(footer, area);
}

fn draw_scrollbar(frame: &mut Frame, area: Rect, offset: usize, total: usize, visible: usize) {
    if total <= visible || area.height == 0 {
        return;
    }

    let scrollbar_height = area.height as usize;
    let scrollbar_pos = (offset * scrollbar_height) / total;
    let scrollbar_size = ((visible * scrollbar_height) / total).max(1);

    let mut scrollbar_chars = vec!['│'; scrollbar_height];
    for i in scrollbar_chars
        .iter_mut()
        .skip(scrollbar_pos)
        .take(scrollbar_size)
    {
        *i = '█';
    }

    let scrollbar_lines: Vec<Line> = scrollbar_chars
        .into_iter()
        .map(|c| Line::from(c.to_string()))
        .collect();
    let scrollbar = Paragraph::new(scrollbar_lines).style(Style::default().fg(Color::DarkGray));

    let scrollbar_area = Rect {
        x: area.x + area.width.saturating_sub(1),
        y: area.y,
        width: 1,
        height: area.height,
    };

    frame.render_widget(scrollbar, scrollbar_area);
}

fn draw_fullscreen_overlay(frame: &mut Frame, app: &App, area: Rect) {
    let overlay_area = centered_rect(70, 50, area);
    frame.render_widget(Clear, overlay_area);

    let snapshot = app.focus.snapshot();
    let name = snapshot
        .selected_channel
        .as_ref()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" {} ", name));
    let inner_area = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(inner_area);

    let mut lines = vec![Line::from(""), playback_line(&app.player.state()), Line::from("")];
    match app.epg.current_program() {
        Some(program) => {
            lines.push(
                Line::from(program.title.clone())
                    .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            );
            lines.push(Line::from(program.time_range()).style(Style::default().fg(Color::Gray)));
            if !program.description.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(program.description.clone()));
            }
        }
        None => lines.push(
            Line::from("No guide information").style(Style::default().fg(Color::DarkGray)),
        ),
    }

    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        chunks[0],
    );

    if let Some(progress) = app.epg.current_program().and_then(|p| p.progress) {
        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::DarkGray)),
            )
            .gauge_style(Style::default().fg(Color::Green))
            .percent(progress.clamp(0.0, 100.0) as u16);
        frame.render_widget(gauge, chunks[1]);
    }
}

fn draw_help_overlay(frame: &mut Frame, area: Rect) {
    let help_area = centered_rect(60, 80, area);
    frame.render_widget(Clear, help_area);
    frame.render_widget(create_help_widget(), help_area);
}

fn draw_loading_overlay(frame: &mut Frame, area: Rect, message: &str) {
    let loading_area = centered_rect(40, 20, area);
    frame.render_widget(Clear, loading_area);

    let loading = Paragraph::new(vec![
        Line::from(""),
        Line::from("⏳ Loading...").style(Style::default().fg(Color::Yellow)),
        Line::from(""),
        Line::from(message.to_string()).style(Style::default().fg(Color::Gray)),
    ])
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Please Wait "),
    )
    .alignment(Alignment::Center);

    frame.render_widget(loading, loading_area);
}
