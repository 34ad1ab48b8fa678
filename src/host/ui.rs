use chrono::{Local, Utc};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use super::HostApp;
use crate::gateway::Gateway;
use crate::session::SessionPhase;

const ACCENT: Color = Color::Cyan;
const WARN: Color = Color::Yellow;
const ALERT: Color = Color::Red;
const MUTED: Color = Color::DarkGray;

pub fn draw<G: Gateway>(f: &mut Frame, app: &HostApp<G>) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" rollcall — attendance session ")
        .border_style(Style::default().fg(ACCENT));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let has_status = app.status_message.is_some();
    let constraints = if has_status {
        vec![
            Constraint::Length(3), // Header
            Constraint::Length(1), // Status
            Constraint::Min(8),    // Body
            Constraint::Length(1), // Footer
        ]
    } else {
        vec![
            Constraint::Length(3), // Header
            Constraint::Min(9),    // Body
            Constraint::Length(1), // Footer
        ]
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    let mut idx = 0;
    draw_header(f, app, chunks[idx]);
    idx += 1;

    if has_status {
        draw_status(f, app, chunks[idx]);
        idx += 1;
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55), // QR + manual code
            Constraint::Percentage(45), // Check-in list
        ])
        .split(chunks[idx]);
    draw_qr_panel(f, app, body[0]);
    draw_scan_log(f, app, body[1]);
    idx += 1;

    draw_footer(f, chunks[idx]);

    if app.confirm_deactivate {
        draw_confirm_popup(f, area);
    }
}

fn draw_header<G: Gateway>(f: &mut Frame, app: &HostApp<G>, area: Rect) {
    let (countdown, countdown_style) = match app.controller.phase() {
        SessionPhase::Active { .. } => (
            app.controller.countdown_label(Utc::now()),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        SessionPhase::Expired { .. } => (
            "Expired".to_string(),
            Style::default().fg(ALERT).add_modifier(Modifier::BOLD),
        ),
        _ => ("Closed".to_string(), Style::default().fg(MUTED)),
    };

    let mut lines = vec![Line::from(vec![
        Span::styled("Time left: ", Style::default().fg(MUTED)),
        Span::styled(countdown, countdown_style),
    ])];

    if let Some(session) = app.controller.session() {
        lines.push(Line::from(vec![
            Span::styled("Class ", Style::default().fg(MUTED)),
            Span::raw(session.class_id.clone()),
            Span::styled("  ·  ", Style::default().fg(MUTED)),
            Span::raw(session.attendance_date.to_string()),
            Span::styled("  ·  ", Style::default().fg(MUTED)),
            Span::raw(format!("{} min window", session.validity_minutes)),
        ]));
    }

    f.render_widget(Paragraph::new(lines), area);
}

fn draw_status<G: Gateway>(f: &mut Frame, app: &HostApp<G>, area: Rect) {
    if let Some(message) = &app.status_message {
        f.render_widget(
            Paragraph::new(message.as_str()).style(Style::default().fg(WARN)),
            area,
        );
    }
}

fn draw_qr_panel<G: Gateway>(f: &mut Frame, app: &HostApp<G>, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Scan to check in ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = if app.qr_rows.is_empty() {
        vec![Line::from(Span::styled(
            "QR image unavailable",
            Style::default().fg(MUTED),
        ))]
    } else {
        app.qr_rows.iter().map(|row| Line::from(row.clone())).collect()
    };

    if let Some(code) = app.manual_code() {
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Manual code: ", Style::default().fg(MUTED)),
            Span::styled(
                code.to_string(),
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center),
        inner,
    );
}

fn draw_scan_log<G: Gateway>(f: &mut Frame, app: &HostApp<G>, area: Rect) {
    let entries = app.controller.scan_log();
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Check-ins ({}) ", entries.len()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines: Vec<Line> = if entries.is_empty() {
        vec![Line::from(Span::styled(
            "No check-ins yet",
            Style::default().fg(MUTED),
        ))]
    } else {
        entries
            .iter()
            .map(|entry| {
                Line::from(vec![
                    Span::styled(
                        format!("{:<12}", entry.matric_no),
                        Style::default().fg(ACCENT),
                    ),
                    Span::raw(format!("{:<24}", entry.display_name())),
                    Span::styled(
                        entry
                            .scan_time
                            .with_timezone(&Local)
                            .format("%H:%M:%S")
                            .to_string(),
                        Style::default().fg(MUTED),
                    ),
                ])
            })
            .collect()
    };

    f.render_widget(Paragraph::new(lines), inner);
}

fn draw_footer(f: &mut Frame, area: Rect) {
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" d ", Style::default().fg(ACCENT)),
            Span::styled("deactivate  ", Style::default().fg(MUTED)),
            Span::styled(" r ", Style::default().fg(ACCENT)),
            Span::styled("refresh log  ", Style::default().fg(MUTED)),
            Span::styled(" q ", Style::default().fg(ACCENT)),
            Span::styled("quit", Style::default().fg(MUTED)),
        ])),
        area,
    );
}

fn draw_confirm_popup(f: &mut Frame, area: Rect) {
    let popup = centered_rect(62, 4, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Deactivate session ")
        .border_style(Style::default().fg(WARN));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    f.render_widget(
        Paragraph::new(vec![
            Line::from("End this session early? Students can no longer check in."),
            Line::from(Span::styled(
                "y: deactivate    any other key: keep running",
                Style::default().fg(MUTED),
            )),
        ])
        .alignment(Alignment::Center),
        inner,
    );
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
