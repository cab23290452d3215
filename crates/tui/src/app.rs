use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use tokio::{sync::mpsc, time};
use tracing::{debug, error, info};
use wmm_core::{
    journal::{self, JournalDirectory, JournalTail},
    config, AppConfig, SharedTracker, Trips,
};

const TICK_RATE: Duration = Duration::from_millis(250);

enum AppEvent {
    Input(Event),
    Tick,
}

/// Terminal panel showing the stack advertisement and hauling summary.
pub struct StackApp {
    config: AppConfig,
    journals: JournalDirectory,
    tracker: SharedTracker,
    tail: JournalTail,
    changes_rx: Option<mpsc::Receiver<()>>,
    status: String,
    should_quit: bool,
}

impl StackApp {
    pub fn new(
        config: AppConfig,
        journals: JournalDirectory,
        tracker: SharedTracker,
        tail: JournalTail,
    ) -> Self {
        let status = format!("Tracking {} open missions", tracker.open_count());
        Self {
            config,
            journals,
            tracker,
            tail,
            changes_rx: None,
            status,
            should_quit: false,
        }
    }

    pub fn attach_journal_changes(&mut self, receiver: mpsc::Receiver<()>) {
        self.changes_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_input_thread(event_tx);

        let mut changes_rx = self.changes_rx.take();
        let mut poll = time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            if let Some(rx) = changes_rx.as_mut() {
                let mut changes_closed = false;
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    maybe_change = rx.recv() => {
                        match maybe_change {
                            Some(()) => self.poll_journal(),
                            None => changes_closed = true,
                        }
                    }
                    _ = poll.tick() => self.poll_journal(),
                }
                if changes_closed {
                    changes_rx = None;
                }
            } else {
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    _ = poll.tick() => self.poll_journal(),
                }
            }
        }

        restore_terminal(&mut terminal)?;
        Ok(())
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Input(Event::Key(key))) => {
                self.handle_key(key);
                true
            }
            Some(AppEvent::Input(_)) | Some(AppEvent::Tick) => true,
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('r') => self.rescan(),
            KeyCode::Char('e') => self.export_advertisement(),
            _ => {}
        }
    }

    fn export_advertisement(&mut self) {
        let path = config::advertisement_path();
        let advert = self.tracker.advertisement();
        match advert.export(&path) {
            Ok(()) => {
                info!(
                    path = %path.display(),
                    stacks = advert.stacks().len(),
                    "advertisement exported"
                );
                self.status = format!("Advertisement saved to {}", path.display());
            }
            Err(err) => {
                error!("advertisement export failed: {err:#}");
                self.status = format!("Export failed: {err}");
            }
        }
    }

    fn poll_journal(&mut self) {
        match self.tail.poll() {
            Ok(records) if records.is_empty() => {}
            Ok(records) => {
                let stats = self.tracker.replay(&records);
                debug!(applied = stats.applied, total = stats.total(), "journal tail");
                if stats.applied > 0 {
                    self.status = format!(
                        "{} · {} open missions",
                        Local::now().format("%H:%M:%S"),
                        self.tracker.open_count()
                    );
                }
            }
            Err(err) => {
                error!("journal poll failed: {err:#}");
                self.status = format!("Journal read failed: {err}");
            }
        }
    }

    fn rescan(&mut self) {
        let rebuilt = SharedTracker::default();
        let result = journal::replay_window(
            &rebuilt,
            &self.journals,
            Local::now().date_naive(),
            self.config.retention_days,
        )
        .and_then(|replay| Ok((replay.tail(self.journals.clone())?, replay)));
        match result {
            Ok((tail, replay)) => {
                self.tracker.reset(rebuilt.snapshot());
                self.tail = tail;
                info!(applied = replay.stats.applied, "journals rescanned");
                self.status = format!(
                    "Rescanned {} days · {} open missions",
                    self.config.retention_days,
                    self.tracker.open_count()
                );
            }
            Err(err) => {
                error!("rescan failed: {err:#}");
                self.status = format!("Rescan failed: {err}");
            }
        }
    }

    fn draw(&mut self, frame: &mut Frame) {
        let advert = self.tracker.advertisement().to_string();
        let advert_height = advert.lines().count().max(1) as u16 + 2;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(advert_height),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.size());

        self.render_status(frame, chunks[0]);
        render_text(frame, chunks[1], "Advertisement", &advert);
        self.render_haul(frame, chunks[2]);

        let help = Paragraph::new(Line::from(vec![
            Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" rescan  "),
            Span::styled("e", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" export ad  "),
            Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" quit"),
        ]))
        .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, chunks[3]);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let capacity = match self.tracker.capacity() {
            0 => "unknown".to_string(),
            units => format!("{units} t"),
        };
        let journal = self
            .tail
            .current()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "no journal".to_string());
        let line = Line::from(vec![
            Span::styled(self.status.clone(), Style::default().fg(Color::Cyan)),
            Span::raw(format!("  ·  capacity {capacity}  ·  {journal}")),
        ]);
        let paragraph = Paragraph::new(line)
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn render_haul(&self, frame: &mut Frame, area: Rect) {
        let summary = self.tracker.haul_summary();
        let mut lines = Vec::new();
        for (system, stations) in summary.systems() {
            lines.push(Line::from(Span::styled(
                system.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for (station, commodities) in stations {
                lines.push(Line::from(format!("  {station}")));
                for (commodity, haul) in commodities {
                    let trips = match haul.trips {
                        Trips::Estimated(trips) => Span::raw(format!("[{trips} trips]")),
                        Trips::Unbounded => Span::styled(
                            "[? trips]",
                            Style::default().fg(Color::Yellow),
                        ),
                    };
                    lines.push(Line::from(vec![
                        Span::raw(format!("    {commodity}: {} ", haul.units)),
                        trips,
                    ]));
                }
            }
        }
        if lines.is_empty() {
            lines.push(Line::from("Nothing to haul"));
        }
        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Hauling Summary"))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }
}

fn render_text(frame: &mut Frame, area: Rect, title: &str, text: &str) {
    let lines: Vec<Line> = text.lines().map(|line| Line::from(line.to_string())).collect();
    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || loop {
        match event::poll(TICK_RATE) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(AppEvent::Input(evt)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.blocking_send(AppEvent::Tick).is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
