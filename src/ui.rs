//! TUI
//!
//! Features:
//! - Tool palette with fuzzy filter (Enter drops the tool into the goal)
//! - Goal composer with tool pills
//! - Live agent log, pinned to the newest line
//! - Start / Stop / Pause-Resume controls mirroring the cached run state
//! - Correction input for a running agent

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthChar;

use crate::app::{AppEvent, Command, Console, Focus};
use crate::composer::Segment;
use crate::state::{NoticeLevel, RunState};

const PILL_MAX_WIDTH: usize = 24;

// ═══════════════════════════════════════════════════════════════
// MAIN LOOP
// ═══════════════════════════════════════════════════════════════

/// Run the interactive console until the user quits
pub async fn run_tui(mut console: Console, mut rx: mpsc::Receiver<AppEvent>, server: &str) -> Result<()> {
    let mut terminal = setup_terminal()?;
    console.boot();
    let result = run_tui_loop(&mut terminal, &mut console, &mut rx, server).await;
    restore_terminal(terminal)?;
    result
}

async fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    console: &mut Console,
    rx: &mut mpsc::Receiver<AppEvent>,
    server: &str,
) -> Result<()> {
    let mut tick: usize = 0;

    while !console.should_quit() {
        tick = tick.wrapping_add(1);

        // Apply finished background work
        while let Ok(ev) = rx.try_recv() {
            console.apply(ev);
        }

        terminal.draw(|f| render(f, console, server, tick))?;

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let has_notice = console.state().notice().is_some();
                    if let Some(cmd) = map_key(console.focus(), has_notice, key) {
                        console.handle(cmd);
                    }
                }
                Event::Paste(text) => console.handle(Command::Paste(text)),
                _ => {}
            }
        }

        // Let spawned requests make progress between frames
        tokio::task::yield_now().await;
    }

    Ok(())
}

/// Translate a key press into a console command
pub fn map_key(focus: Focus, has_notice: bool, key: KeyEvent) -> Option<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global controls
    match key.code {
        KeyCode::Char('c') if ctrl => return Some(Command::Quit),
        KeyCode::Char('s') if ctrl => return Some(Command::Start),
        KeyCode::Char('x') if ctrl => return Some(Command::Stop),
        KeyCode::Char('p') if ctrl => return Some(Command::TogglePause),
        KeyCode::Char('r') if ctrl => return Some(Command::RefreshStatus),
        KeyCode::Char('t') if ctrl => return Some(Command::LoadTools),
        KeyCode::Tab => return Some(Command::FocusNext),
        KeyCode::Esc if has_notice => return Some(Command::DismissNotice),
        KeyCode::Esc => return Some(Command::Quit),
        _ => {}
    }

    if ctrl {
        return match (focus, key.code) {
            (Focus::Composer, KeyCode::Char('d')) => Some(Command::DismissPill),
            (Focus::Composer, KeyCode::Char('l')) => Some(Command::ClearGoal),
            _ => None,
        };
    }

    match focus {
        Focus::Composer => match key.code {
            KeyCode::Char(c) => Some(Command::InsertText(c.to_string())),
            KeyCode::Enter => Some(Command::InsertText("\n".into())),
            KeyCode::Backspace => Some(Command::Backspace),
            KeyCode::Delete => Some(Command::Delete),
            KeyCode::Left => Some(Command::CaretLeft),
            KeyCode::Right => Some(Command::CaretRight),
            KeyCode::Home => Some(Command::CaretHome),
            KeyCode::End => Some(Command::CaretEnd),
            _ => None,
        },
        Focus::Palette => match key.code {
            KeyCode::Enter => Some(Command::DropSelected),
            KeyCode::Up => Some(Command::PaletteUp),
            KeyCode::Down => Some(Command::PaletteDown),
            KeyCode::Char(c) => Some(Command::FilterPush(c)),
            KeyCode::Backspace => Some(Command::FilterPop),
            _ => None,
        },
        Focus::Correction => match key.code {
            KeyCode::Enter => Some(Command::Correct),
            KeyCode::Char(c) => Some(Command::CorrectionPush(c)),
            KeyCode::Backspace => Some(Command::CorrectionPop),
            _ => None,
        },
    }
}

// ═══════════════════════════════════════════════════════════════
// RENDERING
// ═══════════════════════════════════════════════════════════════

pub fn render(f: &mut Frame, console: &Console, server: &str, tick: usize) {
    let state = console.state();
    let banner_height = if state.paused_panel_visible() { 1 } else { 0 };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),             // Header
            Constraint::Length(banner_height), // Paused banner
            Constraint::Min(8),                // Palette | composer + log
            Constraint::Length(3),             // Correction input
            Constraint::Length(1),             // Notice
            Constraint::Length(1),             // Controls
        ])
        .split(f.size());

    render_header(f, console, server, tick, rows[0]);

    if state.paused_panel_visible() {
        let banner = Paragraph::new(" PAUSED: edit the goal, then ^P resumes the agent with it")
            .style(Style::default().fg(Color::Black).bg(Color::Yellow));
        f.render_widget(banner, rows[1]);
    }

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(20)])
        .split(rows[2]);

    render_palette(f, console, columns[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(3)])
        .split(columns[1]);

    render_composer(f, console, right[0]);
    render_log(f, state.log(), right[1]);
    render_correction(f, console, rows[3]);
    render_notice(f, console, rows[4]);
    render_controls(f, console, rows[5]);
}

fn focus_block(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).border_style(style).title(title)
}

fn render_header(f: &mut Frame, console: &Console, server: &str, tick: usize, area: Rect) {
    let state = console.state();
    let run_style = match state.run() {
        RunState::Idle => Style::default().fg(Color::DarkGray),
        RunState::Running => Style::default().fg(Color::Green),
        RunState::Paused => Style::default().fg(Color::Yellow),
    };

    let mut spans = vec![
        Span::raw(" Agent: "),
        Span::styled(state.run().name(), run_style.add_modifier(Modifier::BOLD)),
    ];
    if console.is_polling() {
        spans.push(Span::styled("  ● live log", Style::default().fg(Color::Green)));
    }
    if let Some(pending) = state.pending() {
        spans.push(Span::raw(format!("  {} {}...", spinner_char(tick), pending.name())));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(format!("steer | {}", server)));
    f.render_widget(header, area);
}

fn render_palette(f: &mut Frame, console: &Console, area: Rect) {
    let catalog = console.catalog();
    let rows = console.palette();

    let items: Vec<ListItem> = rows
        .iter()
        .filter_map(|r| {
            let tool = catalog.get(*r)?;
            let title = &catalog.categories()[r.category].title;
            Some(ListItem::new(Line::from(vec![
                Span::styled(format!("{} › ", title), Style::default().fg(Color::DarkGray)),
                Span::raw(tool.name.clone()),
            ])))
        })
        .collect();

    let title = if console.filter().is_empty() {
        format!("Tools ({})", catalog.len())
    } else {
        format!("Tools /{} ({}/{})", console.filter(), rows.len(), catalog.len())
    };

    let mut list_state = ListState::default();
    if !rows.is_empty() {
        list_state.select(Some(console.selected().min(rows.len() - 1)));
    }

    let list = List::new(items)
        .block(focus_block(title, console.focus() == Focus::Palette))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, &mut list_state);
}

/// Composer content as styled lines, caret drawn when focused
pub fn composer_lines(console: &Console) -> Vec<Line<'static>> {
    let doc = console.goal();
    let show_caret = console.focus() == Focus::Composer;
    let caret = doc.caret().unwrap_or(doc.len());
    // Pill that ^D would dismiss
    let target = if show_caret { doc.pill_at_caret() } else { None };

    let caret_span = || Span::styled("▏", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
    let pill_style = Style::default().fg(Color::Black).bg(Color::LightBlue);
    let dismiss_style = pill_style.fg(Color::Red).add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut pos = 0;

    for seg in doc.segments() {
        match seg {
            Segment::Text(text) => {
                let mut run = String::new();
                for ch in text.chars() {
                    if show_caret && pos == caret {
                        if !run.is_empty() {
                            current.push(Span::raw(std::mem::take(&mut run)));
                        }
                        current.push(caret_span());
                    }
                    if ch == '\n' {
                        if !run.is_empty() {
                            current.push(Span::raw(std::mem::take(&mut run)));
                        }
                        lines.push(Line::from(std::mem::take(&mut current)));
                    } else {
                        run.push(ch);
                    }
                    pos += 1;
                }
                if !run.is_empty() {
                    current.push(Span::raw(run));
                }
            }
            Segment::Token(token) => {
                if show_caret && pos == caret {
                    current.push(caret_span());
                }
                let close_style = if target == Some(token.id) { dismiss_style } else { pill_style };
                current.push(Span::styled(
                    format!("[{} ", truncate_to_width(&token.display_name, PILL_MAX_WIDTH)),
                    pill_style,
                ));
                current.push(Span::styled("×", close_style));
                current.push(Span::styled("]", pill_style));
                pos += 1;
            }
        }
    }

    if show_caret && pos == caret {
        current.push(caret_span());
    }
    lines.push(Line::from(current));
    lines
}

fn render_composer(f: &mut Frame, console: &Console, area: Rect) {
    let tokens = console.goal().tokens().count();
    let title = format!("Goal ({} tool{})", tokens, if tokens == 1 { "" } else { "s" });
    let para = Paragraph::new(composer_lines(console))
        .wrap(Wrap { trim: false })
        .block(focus_block(title, console.focus() == Focus::Composer));
    f.render_widget(para, area);
}

fn render_log(f: &mut Frame, log: &str, area: Rect) {
    // Newest output stays in view
    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(visible);
    let text = lines[start..].join("\n");

    let para = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Agent log"));
    f.render_widget(para, area);
}

fn render_correction(f: &mut Frame, console: &Console, area: Rect) {
    let input = Paragraph::new(console.correction().to_string()).block(focus_block(
        "Correction (Enter to send to the running agent)".into(),
        console.focus() == Focus::Correction,
    ));
    f.render_widget(input, area);
}

fn render_notice(f: &mut Frame, console: &Console, area: Rect) {
    let Some(notice) = console.state().notice() else {
        // Quiet: latest activity line instead
        if let Some(last) = console.state().activity().last() {
            let line = Paragraph::new(format!(" {}", last)).style(Style::default().fg(Color::DarkGray));
            f.render_widget(line, area);
        }
        return;
    };
    let style = match notice.level {
        NoticeLevel::Info => Style::default().fg(Color::Green),
        NoticeLevel::Warning => Style::default().fg(Color::Yellow),
        NoticeLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    };
    let text = format!(" [{}] {}  (Esc to dismiss)", notice.at.format("%H:%M:%S"), notice.text);
    f.render_widget(Paragraph::new(text).style(style), area);
}

fn render_controls(f: &mut Frame, console: &Console, area: Rect) {
    let a = console.state().affordances();
    let control = |label: String, enabled: bool| {
        if enabled {
            Span::styled(label, Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
        } else {
            Span::styled(label, Style::default().fg(Color::DarkGray))
        }
    };

    let line = Line::from(vec![
        control(" ^S Start".into(), a.start),
        Span::raw("  "),
        control("^X Stop".into(), a.stop),
        Span::raw("  "),
        control(format!("^P {}", a.pause_label), a.pause),
        Span::styled(
            "  ^D drop pill  ^L clear  ^R refresh  ^T tools  Tab focus  Esc quit",
            Style::default().fg(Color::DarkGray),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn truncate_to_width(s: &str, max: usize) -> String {
    let mut width = 0;
    let mut out = String::new();
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if width + w > max {
            out.push('…');
            return out;
        }
        width += w;
        out.push(ch);
    }
    out
}

fn spinner_char(tick: usize) -> char {
    const SPINNER: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
    SPINNER[tick % SPINNER.len()]
}

// ═══════════════════════════════════════════════════════════════
// TERMINAL SETUP
// ═══════════════════════════════════════════════════════════════

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::event::EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        crossterm::event::DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}
