use crate::catalog::StreamSource;
use crate::config::AppConfig;
use crate::embed::{embed_url, validate_locator};
use crate::error::AppError;
use crate::methods::ConnectionMethod;
use crate::panels::{CommentaryFeed, CommentaryItem, HighlightItem, HighlightReel, PanelEvent, PanelTasks};
use crate::playback::{MediaBackend, MediaEvent, PlaybackController, PlaybackSession, PlaybackState};
use crate::player::{FfmpegBackend, Transport};
use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::info;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Focus {
    Catalog,
    Highlights,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ToastLevel {
    Info,
    Warning,
}

#[derive(Debug)]
struct Toast {
    text: String,
    level: ToastLevel,
    expires: Instant,
}

#[derive(Debug, Default)]
struct Toasts {
    items: VecDeque<Toast>,
}

impl Toasts {
    fn push(&mut self, level: ToastLevel, text: impl Into<String>, now: Instant) {
        self.items.push_back(Toast {
            text: text.into(),
            level,
            expires: now + TOAST_TTL,
        });
    }

    fn prune(&mut self, now: Instant) {
        self.items.retain(|t| t.expires > now);
    }

    fn current(&self) -> Option<&Toast> {
        self.items.back()
    }
}

pub struct UIState {
    sources: Vec<StreamSource>,
    catalog: ListState,
    highlight_list: ListState,
    focus: Focus,
    input: Option<String>,
    commentary: CommentaryFeed,
    highlights: HighlightReel,
    toasts: Toasts,
    spinner: usize,
    saved_volume: Option<f32>,
    last_volume_change: Instant,
}

impl UIState {
    fn new(catalog: Result<Vec<StreamSource>, AppError>, now: Instant) -> Self {
        let mut toasts = Toasts::default();
        let sources = match catalog {
            Ok(sources) => {
                if sources.is_empty() {
                    toasts.push(
                        ToastLevel::Warning,
                        "Catalog has no playable streams. Press 'u' to enter a URL.",
                        now,
                    );
                }
                sources
            }
            Err(e) => {
                toasts.push(
                    ToastLevel::Warning,
                    format!("{}. Press 'u' to enter a URL.", e),
                    now,
                );
                Vec::new()
            }
        };

        let mut catalog = ListState::default();
        if !sources.is_empty() {
            catalog.select(Some(0));
        }

        Self {
            sources,
            catalog,
            highlight_list: ListState::default(),
            focus: Focus::Catalog,
            input: None,
            commentary: CommentaryFeed::default(),
            highlights: HighlightReel::default(),
            toasts,
            spinner: 0,
            saved_volume: None,
            last_volume_change: now.checked_sub(Duration::from_secs(60)).unwrap_or(now),
        }
    }

    fn tick(&mut self, now: Instant) {
        self.spinner = (self.spinner + 1) % SPINNER.len();
        self.toasts.prune(now);
    }

    fn apply_panel_event(&mut self, event: PanelEvent, session: &PlaybackSession) {
        match event {
            PanelEvent::Commentary(text) => self.commentary.push(CommentaryItem {
                minute: (session.current_time / 60.0).floor() as u32,
                text,
            }),
            PanelEvent::Highlight(label) => {
                self.highlights.push(HighlightItem {
                    label,
                    at: session.current_time,
                });
                if self.highlight_list.selected().is_none() {
                    self.highlight_list.select(Some(0));
                }
            }
        }
    }

    /// Returns true when the user asked to quit.
    fn on_key<B: MediaBackend + Transport>(
        &mut self,
        code: KeyCode,
        controller: &mut PlaybackController<B>,
        now: Instant,
    ) -> bool {
        if let Some(input) = self.input.as_mut() {
            match code {
                KeyCode::Esc => self.input = None,
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Char(c) => input.push(c),
                KeyCode::Enter => match validate_locator(input) {
                    Ok(url) => {
                        self.input = None;
                        controller.load(&url, "Custom stream");
                    }
                    Err(e) => self.toasts.push(ToastLevel::Warning, e.to_string(), now),
                },
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('u') => self.input = Some(String::new()),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Catalog => Focus::Highlights,
                    Focus::Highlights => Focus::Catalog,
                }
            }
            KeyCode::Up => self.move_selection(-1),
            KeyCode::Down => self.move_selection(1),
            KeyCode::Enter => match self.focus {
                Focus::Catalog => {
                    if let Some(source) = self.catalog.selected().and_then(|i| self.sources.get(i)) {
                        info!(id = %source.id, "catalog selection");
                        controller.load(&source.url, &source.title);
                    }
                }
                Focus::Highlights => {
                    if let Some(item) = self
                        .highlight_list
                        .selected()
                        .and_then(|i| self.highlights.get(i))
                    {
                        controller.seek(item.at);
                        self.toasts.push(
                            ToastLevel::Info,
                            format!("Jumped to {} ({})", item.label, format_time(item.at)),
                            now,
                        );
                    }
                }
            },
            KeyCode::Char('r') => controller.retry(),
            KeyCode::Char('n') => controller.next_method(),
            KeyCode::Char('s') => controller.stop(),
            KeyCode::Char(' ') => {
                let backend = controller.backend_mut();
                if backend.is_paused() {
                    backend.play();
                } else {
                    backend.pause();
                }
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let backend = controller.backend_mut();
                backend.set_volume((backend.volume() + 0.1).min(2.0));
                self.last_volume_change = now;
            }
            KeyCode::Char('-') => {
                let backend = controller.backend_mut();
                backend.set_volume((backend.volume() - 0.1).max(0.0));
                self.last_volume_change = now;
            }
            KeyCode::Char('m') => {
                let backend = controller.backend_mut();
                let current_volume = backend.volume();
                if current_volume > 0.0 {
                    self.saved_volume = Some(current_volume);
                    backend.set_volume(0.0);
                } else {
                    backend.set_volume(self.saved_volume.unwrap_or(0.5));
                }
                self.last_volume_change = now;
            }
            _ => {}
        }
        false
    }

    fn move_selection(&mut self, delta: isize) {
        let (state, len) = match self.focus {
            Focus::Catalog => (&mut self.catalog, self.sources.len()),
            Focus::Highlights => (&mut self.highlight_list, self.highlights.len()),
        };
        if len == 0 {
            return;
        }
        let current = state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1) as usize;
        state.select(Some(next));
    }
}

pub async fn run_ui(
    config: &AppConfig,
    catalog: Result<Vec<StreamSource>, AppError>,
    mut controller: PlaybackController<FfmpegBackend>,
    mut media_rx: mpsc::UnboundedReceiver<MediaEvent>,
    session_rx: watch::Receiver<PlaybackSession>,
) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (panel_tx, mut panel_rx) = mpsc::unbounded_channel();
    let mut panels = PanelTasks::spawn(
        config.commentary_interval(),
        config.highlight_interval(),
        panel_tx,
    );
    let mut ui_state = UIState::new(catalog, Instant::now());
    let methods = controller.methods();

    loop {
        while let Ok(event) = media_rx.try_recv() {
            controller.handle_event(event);
        }

        let session = session_rx.borrow().clone();
        while let Ok(event) = panel_rx.try_recv() {
            ui_state.apply_panel_event(event, &session);
        }
        ui_state.tick(Instant::now());

        let paused = controller.backend().is_paused();
        let volume = controller.backend().volume();

        terminal.draw(|f| draw(f, &mut ui_state, &session, methods, paused, volume))?;

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if ui_state.on_key(key.code, &mut controller, Instant::now()) {
                    break;
                }
            }
        }
    }

    info!(generation = controller.generation(), "shutting down");
    panels.shutdown();
    controller.stop();

    disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn draw(
    f: &mut Frame,
    ui_state: &mut UIState,
    session: &PlaybackSession,
    methods: &[ConnectionMethod],
    paused: bool,
    volume: f32,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(f.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage(30),
                Constraint::Percentage(40),
                Constraint::Percentage(30),
            ]
            .as_ref(),
        )
        .split(rows[0]);

    draw_catalog(f, columns[0], ui_state);
    draw_player(f, columns[1], ui_state, session, methods, paused, volume);
    draw_panels(f, columns[2], ui_state);

    let toast = match ui_state.toasts.current() {
        Some(t) => Line::from(Span::styled(
            format!(" {}", t.text),
            match t.level {
                ToastLevel::Info => Style::default().fg(Color::Cyan),
                ToastLevel::Warning => Style::default().fg(Color::Yellow),
            },
        )),
        None => Line::from(""),
    };
    f.render_widget(Paragraph::new(toast), rows[1]);

    let help = Line::from(Span::styled(
        " ↑/↓ select  Enter play/seek  Tab focus  u url  r retry  n next method  s stop  Space pause  +/- volume  m mute  q quit",
        Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
    ));
    f.render_widget(Paragraph::new(help), rows[2]);
}

fn focused_border(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    }
}

fn draw_catalog(f: &mut Frame, area: Rect, ui_state: &mut UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)].as_ref())
        .split(area);

    let items: Vec<ListItem> = if ui_state.sources.is_empty() {
        vec![ListItem::new(Span::styled(
            "no streams available",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        ui_state
            .sources
            .iter()
            .map(|s| {
                let mut spans = Vec::new();
                if s.live {
                    spans.push(Span::styled(
                        "● LIVE ",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    ));
                }
                spans.push(Span::raw(s.title.clone()));
                if let Some(category) = &s.category {
                    spans.push(Span::styled(
                        format!("  [{}]", category),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect()
    };

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Streams ")
                .border_style(focused_border(ui_state.focus == Focus::Catalog)),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("➤ ");
    f.render_stateful_widget(list, chunks[0], &mut ui_state.catalog);

    let (text, style) = match &ui_state.input {
        Some(input) => (format!("{}▏", input), Style::default().fg(Color::White)),
        None => (
            "press 'u' to enter an .m3u8 URL".to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    };
    let input = Paragraph::new(Span::styled(text, style)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(" Custom URL ")
            .border_style(focused_border(ui_state.input.is_some())),
    );
    f.render_widget(input, chunks[1]);
}

fn draw_player(
    f: &mut Frame,
    area: Rect,
    ui_state: &UIState,
    session: &PlaybackSession,
    methods: &[ConnectionMethod],
    paused: bool,
    volume: f32,
) {
    let method_name = methods
        .get(session.method_index)
        .map(|m| m.name)
        .unwrap_or("-");

    let mut lines = vec![];

    lines.push(Line::from(vec![
        Span::styled("Title:  ", Style::default().fg(Color::Cyan)),
        Span::styled(
            if session.title.is_empty() {
                "Nothing selected".to_string()
            } else {
                session.title.clone()
            },
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    if let Some(url) = &session.current_url {
        lines.push(Line::from(Span::styled(
            url.clone(),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(""));

    let status = match session.state {
        PlaybackState::Idle => Span::styled(
            "Idle, pick a stream",
            Style::default().fg(Color::Gray),
        ),
        PlaybackState::Loading { .. } => Span::styled(
            format!("{} Connecting via {}", SPINNER[ui_state.spinner], method_name),
            Style::default().fg(Color::Yellow),
        ),
        PlaybackState::Playing { .. } if paused => Span::styled(
            format!("⏸ Paused ({})", method_name),
            Style::default().fg(Color::Yellow),
        ),
        PlaybackState::Playing { .. } => Span::styled(
            format!("▶ Playing via {}", method_name),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        PlaybackState::FatalError { method } => Span::styled(
            format!("✗ {} failed", methods.get(method).map(|m| m.name).unwrap_or("-")),
            Style::default().fg(Color::Red),
        ),
        PlaybackState::Ended { .. } => Span::styled(
            "■ Stream ended",
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        ),
        PlaybackState::AllMethodsFailed => Span::styled(
            "✗ All connection methods failed",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
    };
    lines.push(Line::from(vec![Span::raw("Status: "), status]));

    let total = session
        .duration
        .map(format_time)
        .unwrap_or_else(|| "LIVE".to_string());
    lines.push(Line::from(vec![
        Span::raw("Time:   "),
        Span::styled(
            format!("{} / {}", format_time(session.current_time), total),
            Style::default().fg(Color::White),
        ),
    ]));
    lines.push(Line::from(""));

    let volume_recently_changed =
        ui_state.last_volume_change.elapsed() < Duration::from_secs(2);
    lines.push(Line::from(vec![
        if volume_recently_changed {
            Span::styled("🔊 ", Style::default().fg(Color::Yellow))
        } else {
            Span::raw("")
        },
        Span::styled("Volume: ", Style::default().fg(Color::Magenta)),
        Span::styled(
            format!("{:.0}%", volume * 100.0),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    lines.push(Line::from(volume_bar(volume)));

    if session.has_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            session.error_message.clone().unwrap_or_default(),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::from(vec![
            Span::styled("  r", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" : retry   "),
            Span::styled("n", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::raw(" : next method"),
        ]));
        if let Some(url) = &session.current_url {
            lines.push(Line::from(Span::styled(
                format!("Open in browser: {}", embed_url(url)),
                Style::default().fg(Color::Gray),
            )));
        }
    } else if session.is_loading {
        if let Some(last) = &session.error_message {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                format!("previous attempt: {}", last),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let border = if session.has_error { Color::Red } else { Color::Cyan };
    let player = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(" ☆ Now Showing ☆ ")
            .title_alignment(Alignment::Center)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(player, area);
}

fn draw_panels(f: &mut Frame, area: Rect, ui_state: &mut UIState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(area);

    let commentary: Vec<Line> = if ui_state.commentary.is_empty() {
        vec![Line::from(Span::styled(
            "waiting for kick-off...",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        ui_state
            .commentary
            .items()
            .map(|c| {
                Line::from(vec![
                    Span::styled(format!("{:>3}' ", c.minute), Style::default().fg(Color::Magenta)),
                    Span::raw(c.text.clone()),
                ])
            })
            .collect()
    };
    let commentary = Paragraph::new(commentary).wrap(Wrap { trim: true }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(format!(" AI Commentary ({}) ", ui_state.commentary.len()))
            .border_style(Style::default().fg(Color::Magenta)),
    );
    f.render_widget(commentary, chunks[0]);

    let items: Vec<ListItem> = if ui_state.highlights.is_empty() {
        vec![ListItem::new(Span::styled(
            "no highlights yet",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        ui_state
            .highlights
            .items()
            .iter()
            .map(|h| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{} ", format_time(h.at)),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::raw(h.label.clone()),
                ]))
            })
            .collect()
    };
    let highlights = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(" Highlights ")
                .border_style(focused_border(ui_state.focus == Focus::Highlights)),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("➤ ");
    f.render_stateful_widget(highlights, chunks[1], &mut ui_state.highlight_list);
}

fn format_time(secs: f64) -> String {
    let total = if secs.is_finite() { secs.max(0.0) as u64 } else { 0 };
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn volume_bar(volume: f32) -> String {
    let bar_length = 20;
    let filled = ((volume.clamp(0.0, 1.0) * bar_length as f32) as usize).min(bar_length);

    let mut bar = String::from("│");
    for i in 0..bar_length {
        bar.push(match i {
            _ if i >= filled => '·',
            _ if i < bar_length * 60 / 100 => '▓',
            _ if i < bar_length * 80 / 100 => '▒',
            _ => '░',
        });
    }
    bar.push('│');
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::CONNECTION_METHODS;
    use crate::playback::tests::MockBackend;
    use crate::playback::MediaEventKind;

    impl Transport for MockBackend {
        fn pause(&mut self) {}
        fn play(&mut self) {}
        fn is_paused(&self) -> bool {
            false
        }
        fn set_volume(&mut self, _vol: f32) {}
        fn volume(&self) -> f32 {
            0.5
        }
    }

    fn sources() -> Vec<StreamSource> {
        vec![
            StreamSource {
                id: "a".into(),
                title: "Alpha".into(),
                url: "https://example.com/a.m3u8".into(),
                category: None,
                live: true,
            },
            StreamSource {
                id: "b".into(),
                title: "Beta".into(),
                url: "https://example.com/b.m3u8".into(),
                category: Some("Tennis".into()),
                live: false,
            },
        ]
    }

    fn setup(
        catalog: Result<Vec<StreamSource>, AppError>,
    ) -> (UIState, PlaybackController<MockBackend>, Instant) {
        let now = Instant::now();
        let (controller, _rx) = PlaybackController::new(MockBackend::default(), CONNECTION_METHODS);
        (UIState::new(catalog, now), controller, now)
    }

    fn type_text(state: &mut UIState, c: &mut PlaybackController<MockBackend>, text: &str, now: Instant) {
        for ch in text.chars() {
            state.on_key(KeyCode::Char(ch), c, now);
        }
    }

    #[test]
    fn catalog_failure_leaves_manual_entry_with_warning() {
        let (state, _c, _) = setup(Err(AppError::CatalogFetchFailed("timeout".into())));
        assert!(state.sources.is_empty());
        let toast = state.toasts.current().unwrap();
        assert_eq!(toast.level, ToastLevel::Warning);
        assert!(toast.text.contains("catalog fetch failed: timeout"));
    }

    #[test]
    fn enter_on_catalog_loads_selected_source() {
        let (mut state, mut c, now) = setup(Ok(sources()));
        state.on_key(KeyCode::Down, &mut c, now);
        state.on_key(KeyCode::Enter, &mut c, now);
        assert_eq!(c.session().title, "Beta");
        assert_eq!(c.backend().attached[0].url, "https://example.com/b.m3u8");
    }

    #[test]
    fn selection_stays_in_bounds() {
        let (mut state, mut c, now) = setup(Ok(sources()));
        for _ in 0..5 {
            state.on_key(KeyCode::Down, &mut c, now);
        }
        assert_eq!(state.catalog.selected(), Some(1));
        for _ in 0..5 {
            state.on_key(KeyCode::Up, &mut c, now);
        }
        assert_eq!(state.catalog.selected(), Some(0));
    }

    #[test]
    fn invalid_custom_url_is_rejected_without_state_change() {
        let (mut state, mut c, now) = setup(Ok(vec![]));
        state.on_key(KeyCode::Char('u'), &mut c, now);
        type_text(&mut state, &mut c, "https://example.com/clip.mp4", now);
        state.on_key(KeyCode::Enter, &mut c, now);

        assert_eq!(c.session().state, PlaybackState::Idle);
        assert!(c.backend().attached.is_empty());
        assert!(state.input.is_some());
        assert!(state.toasts.current().unwrap().text.contains(".m3u8"));
    }

    #[test]
    fn valid_custom_url_starts_loading() {
        let (mut state, mut c, now) = setup(Ok(vec![]));
        state.on_key(KeyCode::Char('u'), &mut c, now);
        // 'q' while typing is text, not quit
        assert!(!state.on_key(KeyCode::Char('q'), &mut c, now));
        state.on_key(KeyCode::Backspace, &mut c, now);
        type_text(&mut state, &mut c, "https://example.com/live.m3u8", now);
        state.on_key(KeyCode::Enter, &mut c, now);

        assert!(state.input.is_none());
        assert_eq!(c.session().state, PlaybackState::Loading { method: 0 });
        assert_eq!(c.session().title, "Custom stream");
    }

    #[test]
    fn highlight_enter_seeks_to_its_timestamp() {
        let (mut state, mut c, now) = setup(Ok(sources()));
        state.on_key(KeyCode::Enter, &mut c, now);
        c.handle_event(MediaEvent::new(c.generation(), MediaEventKind::ManifestParsed));
        c.handle_event(MediaEvent::new(
            c.generation(),
            MediaEventKind::TimeUpdate { current: 125.0 },
        ));

        let session = c.session().clone();
        state.apply_panel_event(PanelEvent::Highlight("Goal".into()), &session);
        state.apply_panel_event(PanelEvent::Commentary("Corner".into()), &session);
        assert_eq!(state.commentary.items().next().unwrap().minute, 2);

        state.on_key(KeyCode::Tab, &mut c, now);
        state.on_key(KeyCode::Enter, &mut c, now);
        assert_eq!(c.backend().seeks, vec![125.0]);
        assert!(state.toasts.current().unwrap().text.contains("02:05"));
    }

    #[test]
    fn retry_and_next_method_keys_drive_controller() {
        let (mut state, mut c, now) = setup(Ok(sources()));
        state.on_key(KeyCode::Enter, &mut c, now);
        state.on_key(KeyCode::Char('n'), &mut c, now);
        assert_eq!(c.session().state, PlaybackState::Loading { method: 1 });
        state.on_key(KeyCode::Char('r'), &mut c, now);
        assert_eq!(c.session().state, PlaybackState::Loading { method: 0 });
        state.on_key(KeyCode::Char('s'), &mut c, now);
        assert_eq!(c.session().state, PlaybackState::Idle);
        assert!(state.on_key(KeyCode::Char('q'), &mut c, now));
    }

    #[test]
    fn toasts_expire() {
        let now = Instant::now();
        let mut toasts = Toasts::default();
        toasts.push(ToastLevel::Info, "hello", now);
        toasts.prune(now + Duration::from_secs(1));
        assert!(toasts.current().is_some());
        toasts.prune(now + TOAST_TTL + Duration::from_millis(1));
        assert!(toasts.current().is_none());
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_time(0.0), "00:00");
        assert_eq!(format_time(125.9), "02:05");
        assert_eq!(format_time(5400.0), "1:30:00");
        assert_eq!(format_time(-3.0), "00:00");
    }

    #[test]
    fn volume_bar_fills_proportionally() {
        let bar = volume_bar(0.5);
        assert_eq!(bar.chars().filter(|c| *c == '·').count(), 10);
        assert_eq!(volume_bar(0.0).chars().filter(|c| *c == '·').count(), 20);
    }
}
