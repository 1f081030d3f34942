//! clustersim live visualizer — attach to any running simulation at any time.
//!
//! Run in a separate terminal:
//!   cargo run --bin viz
//!
//! Polls `/tmp/clustersim_live.json` every 200ms and renders a live TUI
//! dashboard (§6.1): job lifecycle counts, a link-occupancy gauge per
//! ToR<->Spine link, and the running penalty-time leaderboard.
//!
//! Press q or Esc to quit. The simulation keeps running unaffected.
//!
//! Grounded on the teacher's `src/bin/viz.rs` polling/raw-mode/alternate-screen
//! shell and panel layout, re-pointed at [`clustersim::metrics::SimSnapshot`]
//! instead of the teacher's per-GPU `LiveMetrics`.
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use clustersim::metrics::{read_snapshot, SimSnapshot};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::{io, time::Duration};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let snapshot = read_snapshot();
        terminal.draw(|f| render(f, snapshot.as_ref()))?;

        // Non-blocking: poll for 200ms, then redraw regardless
        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top-level layout
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, snapshot: Option<&SimSnapshot>) {
    let area = f.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(8),    // job lifecycle + leaderboard
            Constraint::Min(6),    // link occupancy
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, rows[0], snapshot);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(rows[1]);

    render_lifecycle(f, cols[0], snapshot);
    render_leaderboard(f, cols[1], snapshot);
    render_links(f, rows[2], snapshot);
    render_footer(f, rows[3]);
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, area: Rect, snapshot: Option<&SimSnapshot>) {
    let block = Block::default()
        .title(Span::styled(
            " clustersim live monitor ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (step, time, method, conflicts, shifts) = snapshot
        .map(|s| (s.step, s.simulated_time, s.method.as_str(), s.last_conflict_total, s.last_shift_count))
        .unwrap_or((0, 0, "—", 0, 0));

    let spans = vec![
        Span::styled("  step: ", Style::default().fg(Color::DarkGray)),
        Span::styled(step.to_string(), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        Span::styled("   t: ", Style::default().fg(Color::DarkGray)),
        Span::raw(time.to_string()),
        Span::styled("   method: ", Style::default().fg(Color::DarkGray)),
        Span::styled(method.to_uppercase(), Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
        Span::styled("   last conflicts: ", Style::default().fg(Color::DarkGray)),
        Span::styled(conflicts.to_string(), Style::default().fg(Color::Red)),
        Span::styled("   shifted jobs: ", Style::default().fg(Color::DarkGray)),
        Span::styled(shifts.to_string(), Style::default().fg(Color::Green)),
    ];

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ---------------------------------------------------------------------------
// Job lifecycle panel
// ---------------------------------------------------------------------------

fn render_lifecycle(f: &mut Frame, area: Rect, snapshot: Option<&SimSnapshot>) {
    let block = Block::default().title(" Jobs ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    match snapshot {
        None => {
            f.render_widget(
                Paragraph::new(Span::styled(
                    "  No simulation running.",
                    Style::default().fg(Color::DarkGray),
                )),
                inner,
            );
        }
        Some(s) => {
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints([
                    Constraint::Length(2), // progress gauge
                    Constraint::Length(1),
                    Constraint::Min(0), // counts + last deploy
                ])
                .split(inner);

            let pct = if s.total > 0 { ((s.ended as f32 / s.total as f32) * 100.0) as u16 } else { 0 };
            let gauge = Gauge::default()
                .block(Block::default().title("Completed"))
                .gauge_style(Style::default().fg(Color::Green))
                .percent(pct)
                .label(format!("{} / {}", s.ended, s.total));
            f.render_widget(gauge, rows[0]);

            let mut lines = vec![
                Line::from(vec![
                    Span::styled("Waiting: ", Style::default().fg(Color::DarkGray)),
                    Span::raw(s.waiting.to_string()),
                ]),
                Line::from(vec![
                    Span::styled("Running: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(s.running.to_string(), Style::default().fg(Color::Yellow)),
                ]),
                Line::from(vec![
                    Span::styled("Ended:   ", Style::default().fg(Color::DarkGray)),
                    Span::styled(s.ended.to_string(), Style::default().fg(Color::Green)),
                ]),
                Line::raw(""),
                Line::from(vec![
                    Span::styled("GPU slots in use: ", Style::default().fg(Color::DarkGray)),
                    Span::raw(s.job_npu_occupied.values().sum::<usize>().to_string()),
                ]),
            ];
            if let Some(job) = &s.last_deployed_job {
                lines.push(Line::from(vec![
                    Span::styled("Last deployed: ", Style::default().fg(Color::DarkGray)),
                    Span::styled(job.clone(), Style::default().fg(Color::Cyan)),
                ]));
            }
            f.render_widget(Paragraph::new(lines), rows[2]);
        }
    }
}

// ---------------------------------------------------------------------------
// Penalty-time leaderboard
// ---------------------------------------------------------------------------

fn render_leaderboard(f: &mut Frame, area: Rect, snapshot: Option<&SimSnapshot>) {
    let block = Block::default().title(" Penalty time (ticks) ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(s) = snapshot else {
        return;
    };

    let mut ranked: Vec<(&String, &i64)> = s.penalty_time.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1));

    let max = ranked.first().map(|(_, p)| **p).unwrap_or(0).max(1);
    let lines: Vec<Line> = ranked
        .into_iter()
        .take(inner.height as usize)
        .map(|(job, penalty)| {
            let bar_width = ((*penalty as f64 / max as f64) * 20.0).round() as usize;
            Line::from(vec![
                Span::styled(format!("{job:>10} "), Style::default().fg(Color::Cyan)),
                Span::styled("#".repeat(bar_width), Style::default().fg(Color::Red)),
                Span::raw(format!(" {penalty}")),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Per-link occupancy
// ---------------------------------------------------------------------------

fn render_links(f: &mut Frame, area: Rect, snapshot: Option<&SimSnapshot>) {
    let block = Block::default().title(" Link occupancy (jobs sharing each link) ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(s) = snapshot else {
        return;
    };

    let mut links: Vec<(&String, &usize)> = s.link_job_counts.iter().collect();
    links.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

    let max = links.first().map(|(_, c)| **c).unwrap_or(0).max(1);
    let lines: Vec<Line> = links
        .into_iter()
        .take(inner.height as usize)
        .map(|(link, count)| {
            let color = if *count > 1 { Color::Red } else { Color::DarkGray };
            let bar_width = ((*count as f64 / max as f64) * 20.0).round() as usize;
            Line::from(vec![
                Span::styled(format!("{link:<28} "), Style::default().fg(Color::Cyan)),
                Span::styled("#".repeat(bar_width), Style::default().fg(color)),
                Span::raw(format!(" {count}")),
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer(f: &mut Frame, area: Rect) {
    let text = Paragraph::new(Span::styled(
        "  q / esc: quit    auto-refreshes every 200ms    reads /tmp/clustersim_live.json",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(text, area);
}
