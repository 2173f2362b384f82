//! Application state and TUI event loop
//!
//! Manages the application state and handles user input for the
//! package table, search box, chart and export.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tracing::{debug, warn};

use super::chart::{chart_bars, render_chart};
use crate::aggregate::{filter_records, PackageRecord, Snapshot, SortKey, Summary};
use crate::export::export_csv;
use crate::scan::{ScanEvent, ScanWorker};

/// How long to wait for input before checking the scan channel again
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Virtual scroll state for efficient rendering of large tables
#[derive(Debug, Default, Clone)]
pub struct VirtualScrollState {
    /// First visible row index
    pub offset: usize,
    /// Number of visible rows in the viewport
    pub viewport_height: usize,
}

impl VirtualScrollState {
    /// Create a new virtual scroll state
    pub fn new() -> Self {
        Self {
            offset: 0,
            viewport_height: 0,
        }
    }

    /// Update the viewport height
    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height;
    }

    /// Calculate the visible range for the current offset and total items
    pub fn visible_range(&self, total: usize) -> (usize, usize) {
        if total == 0 || self.viewport_height == 0 {
            return (0, 0);
        }
        let start = self.offset.min(total - 1);
        let end = (start + self.viewport_height).min(total);
        (start, end)
    }

    /// Update offset to ensure selection is visible
    pub fn ensure_visible(&mut self, selected: usize, total: usize) {
        if total == 0 || self.viewport_height == 0 {
            self.offset = 0;
            return;
        }

        // If selection is above visible area, scroll up
        if selected < self.offset {
            self.offset = selected;
        }
        // If selection is below visible area, scroll down
        else if selected >= self.offset + self.viewport_height {
            self.offset = selected.saturating_sub(self.viewport_height - 1);
        }
    }
}

/// Where the current snapshot stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// No snapshot has been requested yet
    Idle,
    /// A pass is running; a previous snapshot may still be shown
    Scanning,
    /// The latest snapshot is on screen
    Ready,
    /// The environment could not be queried; no snapshot is shown
    Failed(String),
}

/// Application state
pub struct App {
    /// Latest completed snapshot
    snapshot: Option<Snapshot>,
    /// Filtered and sorted records currently displayed
    pub view: Vec<PackageRecord>,
    /// Currently selected row in `view`
    pub selected_index: usize,
    /// Whether the application should quit
    pub should_quit: bool,
    /// Table state for ratatui
    table_state: TableState,
    /// Whether search mode is active
    pub search_active: bool,
    /// Current search query
    pub search_query: String,
    /// Table sort order
    pub sort_key: SortKey,
    /// Virtual scroll state for large environments
    pub scroll_state: VirtualScrollState,
    /// Scan progress
    pub status: ScanStatus,
    /// One-line feedback shown in the footer (export result etc.)
    pub message: Option<String>,
    /// Bars in the chart
    top_n: usize,
    /// Export target for the `e` key
    export_path: PathBuf,
}

impl App {
    /// Create an empty application; the snapshot arrives from a scan
    pub fn new(top_n: usize, export_path: PathBuf) -> Self {
        Self {
            snapshot: None,
            view: Vec::new(),
            selected_index: 0,
            should_quit: false,
            table_state: TableState::default(),
            search_active: false,
            search_query: String::new(),
            sort_key: SortKey::default(),
            scroll_state: VirtualScrollState::new(),
            status: ScanStatus::Idle,
            message: None,
            top_n,
            export_path,
        }
    }

    /// The snapshot on screen, if any
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Replace the current snapshot wholesale
    pub fn set_snapshot(&mut self, snapshot: Snapshot) {
        if !snapshot.failures().is_empty() {
            debug!(
                "Snapshot has {} unreadable entries counted as 0 bytes",
                snapshot.failures().len()
            );
        }
        self.snapshot = Some(snapshot);
        self.status = ScanStatus::Ready;
        self.refresh_view();
    }

    /// Apply a message from the scan worker
    pub fn apply_scan_event(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Started => self.status = ScanStatus::Scanning,
            ScanEvent::Finished(snapshot) => self.set_snapshot(snapshot),
            ScanEvent::Failed(reason) => {
                warn!("Scan failed: {}", reason);
                self.snapshot = None;
                self.status = ScanStatus::Failed(reason);
                self.refresh_view();
            }
            ScanEvent::Cancelled => {
                self.status = if self.snapshot.is_some() {
                    ScanStatus::Ready
                } else {
                    ScanStatus::Idle
                };
            }
        }
    }

    /// Rebuild the displayed rows from the snapshot, query and sort key
    pub fn refresh_view(&mut self) {
        self.view = match &self.snapshot {
            Some(snapshot) => {
                let mut records = filter_records(snapshot.records(), &self.search_query);
                self.sort_key.apply(&mut records);
                records
            }
            None => Vec::new(),
        };

        // Ensure selected index is valid
        if self.view.is_empty() {
            self.selected_index = 0;
        } else if self.selected_index >= self.view.len() {
            self.selected_index = self.view.len() - 1;
        }
        self.table_state.select(Some(self.selected_index));
    }

    /// Totals over the displayed rows
    pub fn summary(&self) -> Summary {
        Summary::of(&self.view)
    }

    /// Move selection to the next row
    pub fn select_next(&mut self) {
        let total = self.view.len();
        if total > 0 {
            self.selected_index = (self.selected_index + 1).min(total - 1);
            self.sync_selection();
        }
    }

    /// Move selection to the previous row
    pub fn select_previous(&mut self) {
        if !self.view.is_empty() && self.selected_index > 0 {
            self.selected_index -= 1;
            self.sync_selection();
        }
    }

    /// Move selection down by a page
    pub fn page_down(&mut self) {
        let total = self.view.len();
        if total > 0 {
            let page_size = self.scroll_state.viewport_height.max(1);
            self.selected_index = (self.selected_index + page_size).min(total - 1);
            self.sync_selection();
        }
    }

    /// Move selection up by a page
    pub fn page_up(&mut self) {
        if !self.view.is_empty() {
            let page_size = self.scroll_state.viewport_height.max(1);
            self.selected_index = self.selected_index.saturating_sub(page_size);
            self.sync_selection();
        }
    }

    /// Jump to the first row
    pub fn select_first(&mut self) {
        if !self.view.is_empty() {
            self.selected_index = 0;
            self.scroll_state.offset = 0;
            self.sync_selection();
        }
    }

    /// Jump to the last row
    pub fn select_last(&mut self) {
        if !self.view.is_empty() {
            self.selected_index = self.view.len() - 1;
            self.sync_selection();
        }
    }

    fn sync_selection(&mut self) {
        self.table_state.select(Some(self.selected_index));
        self.scroll_state
            .ensure_visible(self.selected_index, self.view.len());
    }

    /// The record under the cursor
    pub fn selected(&self) -> Option<&PackageRecord> {
        self.view.get(self.selected_index)
    }

    /// Signal that the application should quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Start search mode
    pub fn start_search(&mut self) {
        self.search_active = true;
        self.search_query.clear();
        self.refresh_view();
    }

    /// Clear search and return to normal mode
    pub fn clear_search(&mut self) {
        self.search_active = false;
        self.search_query.clear();
        self.selected_index = 0;
        self.scroll_state.offset = 0;
        self.refresh_view();
    }

    /// Add a character to the search query
    pub fn search_push(&mut self, c: char) {
        self.search_query.push(c);
        self.update_filter();
    }

    /// Remove the last character from the search query
    pub fn search_pop(&mut self) {
        self.search_query.pop();
        self.update_filter();
    }

    /// Update the filtered view based on the current search query
    fn update_filter(&mut self) {
        self.selected_index = 0;
        self.scroll_state.offset = 0;
        self.refresh_view();
    }

    /// Switch to the next sort order
    pub fn cycle_sort(&mut self) {
        self.sort_key = self.sort_key.next();
        self.refresh_view();
    }

    /// Mark the start of a refresh requested by the user
    pub fn begin_scan(&mut self) {
        self.status = ScanStatus::Scanning;
        self.message = None;
    }

    /// Write the displayed rows to the configured CSV path
    ///
    /// Failures are reported in the footer; the snapshot is untouched.
    pub fn export_view(&mut self) {
        if self.snapshot.is_none() {
            self.message = Some("Nothing to export yet".to_string());
            return;
        }
        self.message = Some(match export_csv(&self.view, &self.export_path) {
            Ok(()) => format!(
                "Exported {} packages to {}",
                self.view.len(),
                self.export_path.display()
            ),
            Err(e) => {
                warn!("{}", e);
                format!("Export failed: {}", e)
            }
        });
    }
}

/// Run the TUI application
///
/// Starts the first scan, then redraws until the user quits. Scan results
/// are picked up between input polls.
pub fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    worker: &mut ScanWorker,
) -> io::Result<()> {
    if worker.request_refresh() {
        app.begin_scan();
    }

    loop {
        while let Some(scan_event) = worker.try_recv() {
            app.apply_scan_event(scan_event);
        }

        terminal.draw(|frame| render(frame, app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if app.search_active {
                        // Search mode key handling
                        match key.code {
                            KeyCode::Esc => app.clear_search(),
                            KeyCode::Enter => {
                                // Exit search mode but keep the filter active
                                app.search_active = false;
                            }
                            KeyCode::Backspace => app.search_pop(),
                            KeyCode::Char(c) => app.search_push(c),
                            KeyCode::Down | KeyCode::Tab => app.select_next(),
                            KeyCode::Up | KeyCode::BackTab => app.select_previous(),
                            _ => {}
                        }
                    } else {
                        // Normal mode key handling
                        match key.code {
                            KeyCode::Char('q') => app.quit(),
                            KeyCode::Esc => {
                                if !app.search_query.is_empty() {
                                    // Clear the filter but stay in normal mode
                                    app.clear_search();
                                } else {
                                    app.quit();
                                }
                            }
                            KeyCode::Char('/') => app.start_search(),
                            KeyCode::Char('j') | KeyCode::Down => app.select_next(),
                            KeyCode::Char('k') | KeyCode::Up => app.select_previous(),
                            KeyCode::PageDown | KeyCode::Char('d') => app.page_down(),
                            KeyCode::PageUp | KeyCode::Char('u') => app.page_up(),
                            KeyCode::Home | KeyCode::Char('g') => app.select_first(),
                            KeyCode::End | KeyCode::Char('G') => app.select_last(),
                            KeyCode::Char('s') => app.cycle_sort(),
                            KeyCode::Char('e') => app.export_view(),
                            KeyCode::Char('r') => {
                                if worker.request_refresh() {
                                    app.begin_scan();
                                } else {
                                    app.message = Some("A scan is already running".to_string());
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
        }

        if app.should_quit {
            worker.cancel();
            return Ok(());
        }
    }
}

/// Render the application UI
fn render(frame: &mut Frame, app: &mut App) {
    // Determine if search bar is visible
    let show_search = app.search_active || !app.search_query.is_empty();

    let mut constraints = vec![
        Constraint::Length(3), // Header
        Constraint::Length(3), // Summary
    ];
    if show_search {
        constraints.push(Constraint::Length(3)); // Search bar
    }
    constraints.push(Constraint::Min(0)); // Table + chart
    constraints.push(Constraint::Length(3)); // Footer

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    render_header(frame, chunks[0]);
    render_summary(frame, app, chunks[1]);

    let body = if show_search {
        render_search_bar(frame, app, chunks[2]);
        chunks[3]
    } else {
        chunks[2]
    };
    let footer = chunks[chunks.len() - 1];

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(body);

    render_table(frame, app, columns[0]);
    render_chart(frame, columns[1], &chart_bars(&app.view, app.top_n));
    render_footer(frame, app, footer);
}

/// Render the header
fn render_header(frame: &mut Frame, area: Rect) {
    let header = Paragraph::new("viperview - Python Package Analyzer")
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

/// Render the summary line for the displayed rows
fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = match &app.status {
        ScanStatus::Failed(reason) => (format!("Error: {}", reason), Color::Red),
        ScanStatus::Idle => ("No scan yet - press r to scan".to_string(), Color::DarkGray),
        ScanStatus::Scanning if app.snapshot.is_none() => {
            ("Scanning installed packages...".to_string(), Color::Yellow)
        }
        _ => (app.summary().to_string(), Color::White),
    };

    let summary = Paragraph::new(text)
        .style(Style::default().fg(color))
        .alignment(ratatui::layout::Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(summary, area);
}

/// Render the search bar
fn render_search_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (border_color, title) = if app.search_active {
        (Color::Yellow, "Search (Enter to confirm, Esc to cancel)")
    } else {
        (Color::Gray, "Filter (/ to edit, Esc to clear)")
    };

    let search_display = format!("/{}", app.search_query);
    let cursor = if app.search_active { "_" } else { "" };

    let result_count = if !app.search_query.is_empty() {
        format!(" ({} matches)", app.view.len())
    } else {
        String::new()
    };

    let content = Line::from(vec![
        Span::styled(&search_display, Style::default().fg(Color::White)),
        Span::styled(cursor, Style::default().fg(Color::Yellow).add_modifier(Modifier::SLOW_BLINK)),
        Span::styled(&result_count, Style::default().fg(Color::DarkGray)),
    ]);

    let search_bar = Paragraph::new(content)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    frame.render_widget(search_bar, area);
}

/// Render the package table with virtual scrolling
///
/// Only the visible rows are built, so large environments stay responsive.
fn render_table(frame: &mut Frame, app: &mut App, area: Rect) {
    let total = app.view.len();

    // Borders (2) and header row (1)
    let viewport_height = (area.height as usize).saturating_sub(3);
    app.scroll_state.set_viewport_height(viewport_height);
    app.scroll_state.ensure_visible(app.selected_index, total);
    let (start_idx, end_idx) = app.scroll_state.visible_range(total);

    let rows: Vec<Row> = app.view[start_idx..end_idx]
        .iter()
        .map(|record| {
            let name = Line::from(highlight_matches(&record.name, &app.search_query, Color::Green));
            Row::new(vec![
                Cell::from(name),
                Cell::from(record.version.clone()).style(Style::default().fg(Color::Gray)),
                Cell::from(record.pretty_size()).style(Style::default().fg(Color::Yellow)),
                Cell::from(record.location.to_string_lossy().into_owned())
                    .style(Style::default().fg(Color::DarkGray)),
            ])
        })
        .collect();

    // Adjust table selection to be relative to visible window
    app.table_state
        .select((total > 0).then(|| app.selected_index.saturating_sub(start_idx)));

    let title = if app.status == ScanStatus::Scanning {
        "Packages (scanning...)".to_string()
    } else if !app.search_query.is_empty() {
        format!("Packages (filtered: {} matches, sort: {})", total, app.sort_key)
    } else if total > viewport_height {
        format!(
            "Packages ({}-{} of {}, sort: {})",
            start_idx + 1,
            end_idx,
            total,
            app.sort_key
        )
    } else {
        format!("Packages ({}, sort: {})", total, app.sort_key)
    };

    let header = Row::new(vec!["Package", "Version", "Size", "Location"]).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let widths = [
        Constraint::Percentage(28),
        Constraint::Percentage(14),
        Constraint::Percentage(14),
        Constraint::Percentage(44),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Gray)),
        )
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("► ");

    frame.render_stateful_widget(table, area, &mut app.table_state);
}

/// Highlight the first case-insensitive occurrence of `query` in `text`
fn highlight_matches(text: &str, query: &str, base_color: Color) -> Vec<Span<'static>> {
    let base = Style::default().fg(base_color);
    let chars: Vec<char> = text.chars().collect();
    let lowered: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();
    let needle: Vec<char> = query
        .chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect();

    if needle.is_empty() || needle.len() > lowered.len() {
        return vec![Span::styled(text.to_string(), base)];
    }

    let Some(start) = lowered
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
    else {
        return vec![Span::styled(text.to_string(), base)];
    };
    let end = start + needle.len();

    let mut result = Vec::new();
    let before: String = chars[..start].iter().collect();
    let matched: String = chars[start..end].iter().collect();
    let after: String = chars[end..].iter().collect();

    if !before.is_empty() {
        result.push(Span::styled(before, base));
    }
    result.push(Span::styled(
        matched,
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    ));
    if !after.is_empty() {
        result.push(Span::styled(after, base));
    }
    result
}

/// Render the footer with help text or the latest status message
fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = if let Some(message) = &app.message {
        Line::from(Span::styled(message.clone(), Style::default().fg(Color::Cyan)))
    } else if app.search_active {
        // Search mode help
        Line::from(vec![
            Span::styled("Type", Style::default().fg(Color::Yellow)),
            Span::raw(" to search  "),
            Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
            Span::raw(" Navigate  "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(" Confirm  "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(" Cancel"),
        ])
    } else {
        Line::from(vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(" Search  "),
            Span::styled("j/k", Style::default().fg(Color::Yellow)),
            Span::raw(" Nav  "),
            Span::styled("d/u", Style::default().fg(Color::Yellow)),
            Span::raw(" Page  "),
            Span::styled("g/G", Style::default().fg(Color::Yellow)),
            Span::raw(" Top/Bot  "),
            Span::styled("s", Style::default().fg(Color::Yellow)),
            Span::raw(" Sort  "),
            Span::styled("e", Style::default().fg(Color::Yellow)),
            Span::raw(" Export CSV  "),
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(" Refresh  "),
            Span::styled("q", Style::default().fg(Color::Yellow)),
            Span::raw(" Quit"),
        ])
    };

    let footer = Paragraph::new(help_text)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}
