use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::*,
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    io::{self, Stdout},
    time::{Duration, Instant},
};
use survival_core::{
    EntityId,
    config::SimulationConfig,
    environment::{AgentState, Environment, Food, Occupant},
    game::{Game, SimulationHistory},
};

#[derive(Parser, Debug)]
#[command(version, about = "Grid-world survival simulation", long_about = None)]
struct Args {
    /// Board width
    #[arg(long, default_value_t = 20)]
    width: usize,
    /// Board height
    #[arg(long, default_value_t = 20)]
    height: usize,
    /// Number of agents
    #[arg(short, long, default_value_t = 4)]
    agents: usize,
    /// Number of food items
    #[arg(short, long, default_value_t = 8)]
    foods: usize,
    /// Number of levels to run
    #[arg(short, long, default_value_t = 100)]
    levels: usize,
    /// Seed for the random source; drawn from the OS when absent
    #[arg(short, long)]
    seed: Option<u64>,
    /// Print to the console instead of opening the terminal UI
    #[arg(long)]
    headless: bool,
    /// With --headless, finish with a JSON summary instead of a chart
    #[arg(long, requires = "headless")]
    json: bool,
    /// Milliseconds between levels in the terminal UI
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        SimulationConfig {
            width: self.width,
            height: self.height,
            agents: self.agents,
            foods: self.foods,
            seed: self.seed,
        }
    }
}

struct App {
    /// The core simulation.
    game: Game,
    /// Number of levels to run before stopping.
    levels: usize,
    /// Flag to control the main loop.
    should_quit: bool,
    paused: bool,
}

impl App {
    fn new(game: Game, levels: usize) -> Self {
        App {
            game,
            levels,
            should_quit: false,
            paused: false,
        }
    }

    fn finished(&self) -> bool {
        self.game.level() >= self.levels
    }

    /// Handles one level of the simulation.
    fn tick(&mut self) -> Result<()> {
        if self.paused || self.finished() {
            return Ok(());
        }
        self.game.level_up()?;
        Ok(())
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    config: &'a SimulationConfig,
    levels: usize,
    agents: &'a [AgentState],
    foods: &'a [Food],
    average_rewards: BTreeMap<EntityId, f64>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = args.config();
    let game = Game::from_config(&config).context("Failed to set up the world")?;

    if args.headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
        return run_headless(game, &config, &args);
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    let mut app = App::new(game, args.levels);
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal state before reporting any simulation error
    restore_terminal(&mut terminal)?;
    result
}

/// Runs every level and reports to stdout.
fn run_headless(mut game: Game, config: &SimulationConfig, args: &Args) -> Result<()> {
    for food in game.environment().foods() {
        println!("{food}");
    }
    for level in 1..=args.levels {
        game.level_up()
            .with_context(|| format!("Level {level} failed"))?;
        for agent in game.environment().agents() {
            println!("{agent}");
        }
        println!("Processing ...");
    }
    info!("Finished {} levels", game.level());

    let history = game.history();
    if args.json {
        let summary = Summary {
            config,
            levels: game.level(),
            agents: game.environment().agents(),
            foods: game.environment().foods(),
            average_rewards: history.average_rewards(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", text_chart(history));
    }
    Ok(())
}

/// Renders average rewards as a horizontal bar per agent.
fn text_chart(history: &SimulationHistory) -> String {
    const WIDTH: f64 = 40.0;
    let averages = history.average_rewards();
    let scale = averages
        .values()
        .fold(0.0_f64, |max, avg| max.max(avg.abs()));
    let mut out = String::from("Average reward per agent\n");
    for (agent, average) in &averages {
        let length = if scale > 0.0 {
            (average.abs() / scale * WIDTH).round() as usize
        } else {
            0
        };
        let mark = if *average < 0.0 { '-' } else { '#' };
        out.push_str(&format!(
            "Agent {agent:>3} | {} {average:.2}\n",
            mark.to_string().repeat(length)
        ));
    }
    out
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.toggle_pause(),
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.tick()?;
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(60), // Board and agent list
            Constraint::Percentage(35), // Reward chart
            Constraint::Length(2),      // Status/help
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    render_map(frame, top[0], app.game.environment());
    render_agents(frame, top[1], app);
    render_rewards(frame, rows[1], app.game.history());

    let state = if app.finished() {
        "done"
    } else if app.paused {
        "paused"
    } else {
        "running"
    };
    let status = Paragraph::new(format!(
        "Level {}/{} ({state}). Space to pause, 'q' or 'Esc' to quit.",
        app.game.level(),
        app.levels
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, rows[2]);
}

/// Renders the board, north at the top.
fn render_map(frame: &mut Frame, area: Rect, environment: &Environment) {
    let occupancy = environment.occupancy();
    let mut cells: Vec<Vec<Span>> = vec![Vec::with_capacity(occupancy.width()); occupancy.height()];

    for (position, cell) in occupancy.enumerate() {
        let span = match cell {
            Some(Occupant::Agent(id)) => {
                Span::styled(agent_glyph(*id), Style::default().fg(Color::Red).bold())
            }
            Some(Occupant::Food(_)) => Span::styled("*", Style::default().fg(Color::Green)),
            None => Span::styled(".", Style::default().fg(Color::DarkGray)),
        };
        cells[position.y - 1].push(span);
    }

    let lines: Vec<Line> = cells.into_iter().rev().map(Line::from).collect();
    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Board").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

/// Single-digit ids are drawn as themselves, anything else as `@`.
fn agent_glyph(id: EntityId) -> String {
    u32::try_from(id)
        .ok()
        .and_then(|digit| char::from_digit(digit, 10))
        .map(String::from)
        .unwrap_or_else(|| "@".to_string())
}

/// Lists every agent, followed by what happened in the last level.
fn render_agents(frame: &mut Frame, area: Rect, app: &App) {
    let mut items: Vec<ListItem> = app
        .game
        .environment()
        .agents()
        .iter()
        .map(|agent| {
            ListItem::new(format!(
                "Agent {} at {} reward {}",
                agent.id, agent.position, agent.reward
            ))
        })
        .collect();

    if let Some(turns) = app.game.history().last_level() {
        items.push(ListItem::new(""));
        items.extend(turns.iter().map(|turn| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{}: {} ", turn.agent, turn.decision),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(turn.result.to_string()),
            ]))
        }));
    }

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Agents"));
    frame.render_widget(list, area);
}

/// Bar chart of each agent's average reward across all snapshots.
fn render_rewards(frame: &mut Frame, area: Rect, history: &SimulationHistory) {
    let averages = history.average_rewards();
    // Bars cannot go below zero, so everything is lifted by the lowest average.
    let floor = averages.values().fold(0.0_f64, |min, avg| min.min(*avg));
    let bars: Vec<Bar> = averages
        .iter()
        .map(|(agent, average)| {
            Bar::default()
                .value(((average - floor) * 100.0).round() as u64)
                .text_value(format!("{average:.2}"))
                .label(Line::from(format!("Agent {agent}")))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .title("Average reward")
                .borders(Borders::ALL),
        )
        .bar_width(9)
        .bar_gap(2)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_requires_nothing_else() {
        let args = Args::parse_from(["survival_tui", "--headless", "--seed", "3", "--levels", "5"]);
        assert!(args.headless);
        assert_eq!(args.config().seed, Some(3));
        assert_eq!(args.config().width, 20);
        assert_eq!(args.levels, 5);
    }

    #[test]
    fn json_needs_headless() {
        assert!(Args::try_parse_from(["survival_tui", "--json"]).is_err());
    }

    #[test]
    fn only_single_digit_ids_get_their_own_glyph() {
        assert_eq!(agent_glyph(7), "7");
        assert_eq!(agent_glyph(10), "@");
        assert_eq!(agent_glyph(usize::MAX), "@");
    }

    #[test]
    fn chart_has_one_row_per_agent() {
        let mut game = Game::from_config(&SimulationConfig {
            seed: Some(8),
            ..SimulationConfig::default()
        })
        .unwrap();
        for _ in 0..10 {
            game.level_up().unwrap();
        }
        let chart = text_chart(game.history());
        assert_eq!(chart.lines().count(), 1 + 4);
        assert!(chart.contains("Agent   1 |"));
    }
}
