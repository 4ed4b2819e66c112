// /////////////////////////////////////////////////////////////////////////////
// cpm
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # TUI adapter (`TuiEdit`)
//!
//! A thin `ratatui`/`crossterm` render loop: this module owns terminal
//! setup/teardown, key-to-use-case dispatch, and the quit guard chain of
//! §4.12. All tree mutation and search logic lives in
//! `crate::application::use_cases` — nothing here inspects a `Node` or
//! walks the document directly.

use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Terminal;
use thiserror::Error;

use crate::application::session::Session;
use crate::application::use_cases::{self, UseCaseError};

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("terminal i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    UseCase(#[from] UseCaseError),
}

/// What the user was last asked and what they answered, for the quit guard
/// chain (§4.12: "ask to quit?", "no recipients", "no secret key", "data
/// changed — save?").
enum Mode {
    Browsing,
    /// Single-line text entry, tagged by what it's for.
    Prompt { purpose: Prompt, input: String },
    ConfirmQuit,
}

enum Prompt {
    AddChild,
    RenameChild(String),
    SetComment(String),
}

pub struct Editor<'s, 'a> {
    session: &'s mut Session<'a>,
    selected: usize,
    mode: Mode,
    status: String,
}

impl<'s, 'a> Editor<'s, 'a> {
    pub fn new(session: &'s mut Session<'a>) -> Self {
        Self {
            session,
            selected: 0,
            mode: Mode::Browsing,
            status: String::new(),
        }
    }

    /// Runs the `TuiEdit` loop (§4.12) until the user quits, driving a
    /// real terminal. Returns whether a save happened on the way out.
    pub fn run(&mut self) -> Result<bool, TuiError> {
        enable_raw_mode()?;
        io::stdout().execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        io::stdout().execute(LeaveAlternateScreen)?;
        result
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<bool, TuiError> {
        loop {
            terminal.draw(|frame| self.draw(frame))?;

            let Event::Key(key) = event::read()? else { continue };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match &self.mode {
                Mode::Browsing => {
                    if let Some(saved) = self.handle_browse_key(key.code)? {
                        return Ok(saved);
                    }
                }
                Mode::Prompt { .. } => self.handle_prompt_key(key.code)?,
                Mode::ConfirmQuit => {
                    if let Some(saved) = self.handle_confirm_key(key.code)? {
                        return Ok(saved);
                    }
                }
            }
        }
    }

    fn handle_browse_key(&mut self, code: KeyCode) -> Result<Option<bool>, TuiError> {
        let children = self.children();
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < children.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(label) = children.get(self.selected) {
                    self.session.navigate_down(label).map_err(UseCaseError::from)?;
                    self.selected = 0;
                }
            }
            KeyCode::Backspace => {
                let _ = self.session.navigate_up();
                self.selected = 0;
            }
            KeyCode::Char('a') => {
                self.mode = Mode::Prompt { purpose: Prompt::AddChild, input: String::new() };
            }
            KeyCode::Char('r') => {
                if let Some(label) = children.get(self.selected) {
                    self.mode = Mode::Prompt {
                        purpose: Prompt::RenameChild(label.clone()),
                        input: label.clone(),
                    };
                }
            }
            KeyCode::Char('c') => {
                if let Some(label) = children.get(self.selected) {
                    self.mode = Mode::Prompt {
                        purpose: Prompt::SetComment(label.clone()),
                        input: String::new(),
                    };
                }
            }
            KeyCode::Char('d') => {
                if let Some(label) = children.get(self.selected).cloned() {
                    use_cases::delete_node(self.session, &label)?;
                    self.selected = self.selected.min(children.len().saturating_sub(2));
                }
            }
            KeyCode::Char('s') => {
                self.status = "select a passphrase callback path to save (wired by main)".to_string();
            }
            KeyCode::Char('q') => {
                if !self.session.data_changed() {
                    return Ok(Some(false));
                }
                self.mode = Mode::ConfirmQuit;
            }
            _ => {}
        }
        Ok(None)
    }

    fn handle_prompt_key(&mut self, code: KeyCode) -> Result<(), TuiError> {
        let Mode::Prompt { purpose, input } = &mut self.mode else { return Ok(()) };
        match code {
            KeyCode::Esc => {
                self.mode = Mode::Browsing;
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => {
                input.push(c);
            }
            KeyCode::Enter => {
                let input = input.clone();
                let mut warning = None;
                match purpose {
                    Prompt::AddChild => use_cases::add_node(self.session, &input)?,
                    Prompt::RenameChild(old) => use_cases::rename_node(self.session, old, &input)?,
                    Prompt::SetComment(label) => {
                        warning = use_cases::set_comment(self.session, label, &input)?;
                    }
                }
                if let Some(warning) = warning {
                    self.status = warning;
                }
                self.mode = Mode::Browsing;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_confirm_key(&mut self, code: KeyCode) -> Result<Option<bool>, TuiError> {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Ok(Some(true)),
            KeyCode::Char('n') | KeyCode::Char('N') => Ok(Some(false)),
            KeyCode::Esc | KeyCode::Char('c') => {
                self.mode = Mode::Browsing;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn children(&mut self) -> Vec<String> {
        self.session.list_children()
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(frame.area());

        let children = self.children();
        let items: Vec<ListItem> = children.iter().map(|c| ListItem::new(c.as_str())).collect();
        let mut state = ListState::default();
        if !children.is_empty() {
            state.select(Some(self.selected.min(children.len() - 1)));
        }

        let title = if self.session.read_only() { " cpm (read-only) " } else { " cpm " };
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
        frame.render_stateful_widget(list, layout[0], &mut state);

        let status_text = match &self.mode {
            Mode::Prompt { input, .. } => format!("> {input}"),
            Mode::ConfirmQuit => "data changed — save? (y/n/esc to cancel)".to_string(),
            Mode::Browsing => self.status.clone(),
        };
        let status = Paragraph::new(Line::from(status_text)).style(Style::default().fg(Color::Yellow));
        frame.render_widget(status, layout[1]);
    }
}
