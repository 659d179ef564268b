use crate::app::App;
use crate::audio::MediaElement;
use crate::controller::PlaybackState;
use ratatui::prelude::*;
use ratatui::widgets::{BarChart, Block, Borders, Clear, Gauge, Paragraph, Wrap};
use std::time::Instant;

#[derive(Clone, Copy)]
struct Palette {
    bg: Color,
    panel_bg: Color,
    border: Color,
    text: Color,
    muted: Color,
    accent: Color,
    alert: Color,
    liked: Color,
    bars: Color,
    popup_bg: Color,
}

const PALETTE: Palette = Palette {
    bg: Color::Rgb(22, 17, 33),
    panel_bg: Color::Rgb(33, 26, 50),
    border: Color::Rgb(118, 96, 168),
    text: Color::Rgb(236, 228, 250),
    muted: Color::Rgb(164, 152, 190),
    accent: Color::Rgb(255, 183, 138),
    alert: Color::Rgb(249, 174, 88),
    liked: Color::Rgb(255, 110, 150),
    bars: Color::Rgb(141, 204, 255),
    popup_bg: Color::Rgb(40, 32, 62),
};

pub fn draw(frame: &mut Frame, app: &App, media: &dyn MediaElement, now: Instant) {
    let colors = PALETTE;
    frame.render_widget(
        Block::default().style(Style::default().bg(colors.bg)),
        frame.area(),
    );

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(4),
        ])
        .split(frame.area());

    draw_header(frame, app, vertical[0], &colors);
    draw_track(frame, app, vertical[1], &colors);
    draw_progress(frame, app, media, vertical[2], &colors);
    draw_visualizer(frame, app, vertical[3], &colors);
    draw_footer(frame, app, vertical[4], now, &colors);

    if let Some(platform) = app.instructions {
        draw_instructions(frame, app, platform.instructions(app.strings), &colors);
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect, colors: &Palette) {
    let counter = app
        .controller
        .as_ref()
        .map(|controller| controller.counter_label())
        .unwrap_or_else(|| String::from("0 / 0"));

    let mut spans = vec![
        Span::styled(
            app.strings.app_title,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("  |  ", Style::default().fg(colors.muted)),
        Span::styled(
            format!("{} {counter}", app.strings.track_counter),
            Style::default().fg(colors.text),
        ),
    ];
    if let Some(category) = &app.category {
        spans.push(Span::styled("  |  ", Style::default().fg(colors.muted)));
        spans.push(Span::styled(
            category.as_str(),
            Style::default().fg(colors.alert),
        ));
    }

    frame.render_widget(
        Paragraph::new(Line::from(spans)).block(panel_block("", colors)),
        area,
    );
}

fn draw_track(frame: &mut Frame, app: &App, area: Rect, colors: &Palette) {
    let lines = match app.current_track() {
        Some(track) => {
            let (marker, marker_color) = if app.current_liked() {
                ("♥ ", colors.liked)
            } else {
                ("♡ ", colors.muted)
            };
            vec![
                Line::from(vec![
                    Span::styled(marker, Style::default().fg(marker_color)),
                    Span::styled(
                        track.display_title(),
                        Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(Span::styled(
                    track.artist.clone().unwrap_or_default(),
                    Style::default().fg(colors.muted),
                )),
            ]
        }
        None => vec![Line::from(Span::styled("-", Style::default().fg(colors.muted)))],
    };

    frame.render_widget(
        Paragraph::new(lines)
            .block(panel_block("", colors))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_progress(
    frame: &mut Frame,
    app: &App,
    media: &dyn MediaElement,
    area: Rect,
    colors: &Palette,
) {
    let report = app
        .controller
        .as_ref()
        .map(|controller| controller.report())
        .unwrap_or_else(|| crate::progress::report(0.0, None));
    let volume = (media.volume() * 100.0).round() as u16;
    let label = format!(
        "{}   {} {volume}%",
        report.label(),
        app.strings.volume
    );

    let gauge = Gauge::default()
        .block(panel_block("", colors))
        .gauge_style(Style::default().fg(colors.accent).bg(colors.panel_bg))
        .ratio((report.percent / 100.0).clamp(0.0, 1.0))
        .label(Span::styled(label, Style::default().fg(colors.text)));
    frame.render_widget(gauge, area);
}

fn draw_visualizer(frame: &mut Frame, app: &App, area: Rect, colors: &Palette) {
    let block = panel_block("", colors);
    if !app.visualizer.is_active() {
        frame.render_widget(block, area);
        return;
    }

    let inner_width = usize::from(area.width.saturating_sub(2));
    let levels = app.visualizer.levels();
    let bar_width = (inner_width / levels.len().max(1)).saturating_sub(1).max(1) as u16;
    let data: Vec<(&str, u64)> = levels
        .iter()
        .map(|level| ("", (level * 100.0).round() as u64))
        .collect();

    let chart = BarChart::default()
        .block(block)
        .bar_width(bar_width)
        .bar_gap(1)
        .max(100)
        .bar_style(Style::default().fg(colors.bars))
        .value_style(Style::default().fg(colors.bars).bg(colors.bars))
        .data(data.as_slice());
    frame.render_widget(chart, area);
}

fn draw_footer(frame: &mut Frame, app: &App, area: Rect, now: Instant, colors: &Palette) {
    let blocked = app
        .controller
        .as_ref()
        .is_some_and(|controller| controller.state() == PlaybackState::Blocked);
    let status_color = if blocked { colors.alert } else { colors.text };

    let mut status = vec![Span::styled(
        app.status_text(),
        Style::default().fg(status_color),
    )];
    if app.prompter.button_visible(now) {
        status.push(Span::styled("   ", Style::default()));
        status.push(Span::styled(
            app.strings.install_button,
            Style::default()
                .fg(colors.accent)
                .add_modifier(Modifier::BOLD),
        ));
    }

    let footer = Paragraph::new(vec![
        Line::from(status),
        Line::from(Span::styled(
            app.strings.key_help,
            Style::default().fg(colors.muted),
        )),
    ])
    .block(panel_block("", colors));
    frame.render_widget(footer, area);
}

fn draw_instructions(frame: &mut Frame, app: &App, text: &str, colors: &Palette) {
    let popup = centered_rect(frame.area(), 60, 40);
    frame.render_widget(Clear, popup);

    let body = Paragraph::new(vec![
        Line::from(Span::styled(text, Style::default().fg(colors.text))),
        Line::from(""),
        Line::from(Span::styled(
            app.strings.close_hint,
            Style::default().fg(colors.muted),
        )),
    ])
    .wrap(Wrap { trim: true })
    .block(
        panel_block(app.strings.install_title, colors).style(Style::default().bg(colors.popup_bg)),
    );
    frame.render_widget(body, popup);
}

fn panel_block<'a>(title: &'a str, colors: &Palette) -> Block<'a> {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors.border))
        .style(Style::default().bg(colors.panel_bg));
    if title.is_empty() {
        return block;
    }
    block.title(Span::styled(
        format!(" {title} "),
        Style::default().fg(colors.text).add_modifier(Modifier::BOLD),
    ))
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::tests::{FakeMedia, playlist};
    use crate::i18n::Locale;
    use crate::install::{InstallPrompter, Platform};
    use crate::likes::LikeStore;
    use crate::visualizer::Visualizer;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use tempfile::tempdir;

    fn rendered(app: &App, media: &FakeMedia) -> String {
        let mut terminal = Terminal::new(TestBackend::new(90, 24)).expect("terminal");
        terminal
            .draw(|frame| draw(frame, app, media, Instant::now()))
            .expect("draw");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn renders_track_counter_and_status() {
        let dir = tempdir().expect("tempdir");
        let mut app = App::new(
            Ok(playlist(3, false, true)),
            LikeStore::load(&dir.path().join("likes.json")),
            InstallPrompter::new(Platform::Linux, false),
            Visualizer::new(None),
            Locale::En.strings(),
        );
        let mut media = FakeMedia::default();
        app.start(&mut media, false, None);

        let screen = rendered(&app, &media);
        assert!(screen.contains("Lofi Radio"));
        assert!(screen.contains("track 1 / 3"));
        assert!(screen.contains("♡ Track"));
        assert!(screen.contains("Loading..."));
        assert!(screen.contains("0:00 / --:--"));
    }

    #[test]
    fn renders_instructions_popup() {
        let dir = tempdir().expect("tempdir");
        let mut app = App::new(
            Ok(playlist(1, false, true)),
            LikeStore::load(&dir.path().join("likes.json")),
            InstallPrompter::new(Platform::Linux, false),
            Visualizer::new(None),
            Locale::En.strings(),
        );
        app.instructions = Some(Platform::Linux);

        let screen = rendered(&app, &FakeMedia::default());
        assert!(screen.contains("Install app"));
        assert!(screen.contains("Esc - got it"));
    }
}
