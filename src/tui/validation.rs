//! TUI for a validation batch with progress display

use crate::proxy::{ClassificationResult, ClassifiedSet, Endpoint, ProtocolClass, Validator};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::sync::mpsc::{error::TryRecvError, Receiver};
use tokio::time::Duration;
use tracing::info;

/// Maximum number of recent endpoints to keep for display
const MAX_RECENT: usize = 100;

/// What the TUI collected before it exited
#[derive(Debug)]
pub struct ValidationRun {
    pub set: ClassifiedSet,
    /// False when the operator quit before every endpoint was checked
    pub completed: bool,
}

/// Validation TUI application state
pub struct ValidationApp {
    /// Endpoints to check; taken when the batch starts
    endpoints: Vec<Endpoint>,
    validator: Validator,
    total: usize,
    checked: usize,
    /// Results grouped so far
    set: ClassifiedSet,
    /// Recent classified endpoints (newest at the back)
    recent_working: VecDeque<ClassificationResult>,
    /// Recent unknown endpoints (newest at the back)
    recent_unknown: VecDeque<ClassificationResult>,
    /// Selected list (0 = working, 1 = unknown)
    selected_list: usize,
    list_state: ListState,
    status_message: String,
    is_complete: bool,
    should_quit: bool,
}

impl ValidationApp {
    pub fn new(endpoints: Vec<Endpoint>, validator: Validator) -> Self {
        let total = endpoints.len();
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            endpoints,
            validator,
            total,
            checked: 0,
            set: ClassifiedSet::new(),
            recent_working: VecDeque::new(),
            recent_unknown: VecDeque::new(),
            selected_list: 0,
            list_state,
            status_message: "Starting validation... Press 'q' to quit.".to_string(),
            is_complete: total == 0,
            should_quit: false,
        }
    }

    /// Run the TUI until the operator quits, returning what was classified
    pub async fn run(mut self) -> Result<ValidationRun> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal).await;

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result?;
        if !self.is_complete {
            info!(checked = self.checked, total = self.total, "validation interrupted");
        }
        Ok(ValidationRun {
            set: self.set,
            completed: self.is_complete,
        })
    }

    async fn run_app<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let endpoints = std::mem::take(&mut self.endpoints);
        let mut rx = self.validator.validate_stream(endpoints);

        loop {
            terminal.draw(|f| self.ui(f))?;

            // Handle key events with a short timeout
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        if self.should_quit {
                            // Keep results that finished before the key press
                            self.drain(&mut rx);
                            break;
                        }
                    }
                }
            }

            self.drain(&mut rx);
        }

        Ok(())
    }

    /// Record whatever finished since the last frame
    fn drain(&mut self, rx: &mut Receiver<ClassificationResult>) {
        while !self.is_complete {
            match rx.try_recv() {
                Ok(result) => self.record(result),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.finish(),
            }
        }
    }

    fn record(&mut self, result: ClassificationResult) {
        self.checked += 1;

        let recent = if result.protocol_class() == ProtocolClass::Unknown {
            &mut self.recent_unknown
        } else {
            &mut self.recent_working
        };
        recent.push_back(result.clone());
        if recent.len() > MAX_RECENT {
            recent.pop_front();
        }
        self.set.insert(result);

        let percentage = self.checked * 100 / self.total.max(1);
        self.status_message = format!(
            "Checking... {}% ({}/{}) | Working: {} | Unknown: {}",
            percentage,
            self.checked,
            self.total,
            self.working_count(),
            self.set.count(ProtocolClass::Unknown)
        );
    }

    fn finish(&mut self) {
        self.is_complete = true;
        self.status_message = format!(
            "Complete! Checked: {} | Working: {} | Unknown: {} | Press 'q' to save and quit",
            self.checked,
            self.working_count(),
            self.set.count(ProtocolClass::Unknown)
        );
    }

    fn working_count(&self) -> usize {
        self.set.total() - self.set.count(ProtocolClass::Unknown)
    }

    fn handle_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.selected_list = (self.selected_list + 1) % 2;
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(i) if i + 1 < len => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let len = self.selected_len();
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn selected_len(&self) -> usize {
        if self.selected_list == 0 {
            self.recent_working.len()
        } else {
            self.recent_unknown.len()
        }
    }

    fn class_summary(&self) -> String {
        ProtocolClass::ALL
            .iter()
            .map(|class| format!("{}: {}", class, self.set.count(*class)))
            .collect::<Vec<_>>()
            .join("  |  ")
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Length(3), // Progress bar
                Constraint::Length(3), // Per-class counts
                Constraint::Min(0),    // Endpoint lists
                Constraint::Length(3), // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new("Proxy Validation")
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress = (self.checked * 100 / self.total.max(1)) as u16;
        let progress_label = format!("{}/{} ({}%)", self.checked, self.total, progress);
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress.min(100))
            .label(progress_label);
        f.render_widget(gauge, chunks[1]);

        let counts = Paragraph::new(self.class_summary())
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("By protocol"));
        f.render_widget(counts, chunks[2]);

        let list_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[3]);

        let working_count = self.working_count();
        let unknown_count = self.set.count(ProtocolClass::Unknown);

        Self::render_list(
            f,
            list_chunks[0],
            "Working",
            &self.recent_working,
            working_count,
            self.selected_list == 0,
            Color::Green,
            if self.selected_list == 0 { Some(&mut self.list_state) } else { None },
        );

        Self::render_list(
            f,
            list_chunks[1],
            "Unknown",
            &self.recent_unknown,
            unknown_count,
            self.selected_list == 1,
            Color::Red,
            if self.selected_list == 1 { Some(&mut self.list_state) } else { None },
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[4]);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_list(
        f: &mut Frame,
        area: Rect,
        title: &str,
        results: &VecDeque<ClassificationResult>,
        total_count: usize,
        is_selected: bool,
        color: Color,
        list_state: Option<&mut ListState>,
    ) {
        let items: Vec<ListItem> = results
            .iter()
            .rev() // Show newest first
            .map(|result| {
                let content = match result.response_time_ms {
                    Some(time) => format!("{} [{}] ({}ms)", result.endpoint, result.protocol_class(), time),
                    None => format!("{} ({})", result.endpoint, result.outcome),
                };
                ListItem::new(content).style(Style::default().fg(color))
            })
            .collect();

        let block_title = format!("{} ({})", title, total_count);
        let border_style = if is_selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(block_title)
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        if let Some(state) = list_state {
            f.render_stateful_widget(list, area, state);
        } else {
            f.render_widget(list, area);
        }
    }
}
