use anyhow::{Context, Result};
use cell_world_core::{
    CellKind, Position,
    automaton::{Automaton, CellState, LifeMode},
    config::{SimConfig, Variant},
    environment::{Environment, TurnStatus, load_environment_from_string},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
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
use std::{
    io::{self, Stdout},
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML file with `[cleaning]` and `[life]` tables
    #[arg(short, long, global = true, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the cleaning robot simulation
    Clean(CleanArgs),
    /// Run a cellular automaton
    Life(LifeArgs),
}

/// Flags shared by both simulations.
#[derive(Args, Debug)]
struct RunArgs {
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many ticks
    #[arg(long)]
    max_steps: Option<u64>,

    /// Run without the TUI and print a summary
    #[arg(long)]
    headless: bool,

    /// Print the headless summary as JSON
    #[arg(long, requires = "headless")]
    json: bool,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Map file to load instead of generating a world
    #[arg(short, long, value_name = "MAP_FILE")]
    map: Option<PathBuf>,

    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Args, Debug)]
struct LifeArgs {
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Wolfram code of the row rule
    #[arg(long)]
    rule: Option<u8>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VariantArg {
    SingleStation,
    MultiStation,
    Baseline,
}

impl From<VariantArg> for Variant {
    fn from(value: VariantArg) -> Self {
        match value {
            VariantArg::SingleStation => Variant::SingleStation,
            VariantArg::MultiStation => Variant::MultiStation,
            VariantArg::Baseline => Variant::Baseline,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    RowSweep,
    TorusRows,
    Conway,
}

impl From<ModeArg> for LifeMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::RowSweep => LifeMode::RowSweep,
            ModeArg::TorusRows => LifeMode::TorusRows,
            ModeArg::Conway => LifeMode::Conway,
        }
    }
}

/// The simulation shown by the TUI.
enum Simulation {
    Clean {
        environment: Environment,
        /// Remaining dirt after every tick, for the sparkline.
        dirt_history: Vec<u64>,
    },
    Life {
        automaton: Automaton,
        max_generations: u64,
    },
}

impl Simulation {
    fn tick(&mut self) {
        match self {
            Simulation::Clean {
                environment,
                dirt_history,
            } => {
                if environment.status() == TurnStatus::Running {
                    environment.process_turn();
                    dirt_history.push(environment.remaining_dirty() as u64);
                }
            }
            Simulation::Life {
                automaton,
                max_generations,
            } => {
                if automaton.generation() < *max_generations {
                    automaton.step();
                }
            }
        }
    }
}

struct App {
    simulation: Simulation,
    /// Flag to control the main loop.
    should_quit: bool,
    paused: bool,
}

impl App {
    fn new(simulation: Simulation) -> Self {
        App {
            simulation,
            should_quit: false,
            paused: false,
        }
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) {
        if !self.paused {
            self.simulation.tick();
        }
    }

    fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SimConfig::default(),
    };

    let (simulation, run) = match cli.command {
        Command::Clean(args) => {
            let cleaning = &mut config.cleaning;
            if let Some(variant) = args.variant {
                cleaning.variant = variant.into();
            }
            if let Some(seed) = args.run.seed {
                cleaning.seed = Some(seed);
            }
            if let Some(max_steps) = args.run.max_steps {
                cleaning.max_steps = max_steps;
            }
            // Headless runs log to stderr, the TUI owns the terminal.
            if args.run.headless {
                init_tracing(&cli.log_level);
            }
            let environment = match &args.map {
                Some(path) => {
                    let map = std::fs::read_to_string(path)
                        .with_context(|| format!("Failed to read map file {}", path.display()))?;
                    load_environment_from_string(&map, cleaning)
                        .with_context(|| format!("Failed to load map {}", path.display()))?
                }
                None => Environment::generate(cleaning),
            };
            let dirt_history = vec![environment.remaining_dirty() as u64];
            (
                Simulation::Clean {
                    environment,
                    dirt_history,
                },
                args.run,
            )
        }
        Command::Life(args) => {
            let life = &mut config.life;
            if let Some(mode) = args.mode {
                life.mode = mode.into();
            }
            if let Some(rule) = args.rule {
                life.rule = rule;
            }
            if let Some(seed) = args.run.seed {
                life.seed = Some(seed);
            }
            if args.run.headless {
                init_tracing(&cli.log_level);
            }
            let max_generations = args.run.max_steps.unwrap_or(match life.mode {
                LifeMode::RowSweep => life.height as u64,
                LifeMode::TorusRows | LifeMode::Conway => 100,
            });
            (
                Simulation::Life {
                    automaton: Automaton::from_config(life),
                    max_generations,
                },
                args.run,
            )
        }
    };

    if run.headless {
        return run_headless(simulation, run.json);
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;
    let mut app = App::new(simulation);
    let result = run_app(&mut terminal, &mut app);
    // Restore the terminal state even when the loop failed
    restore_terminal(&mut terminal)?;
    result
}

/// Installs the stderr subscriber. `RUST_LOG` wins over `--log-level`.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Runs the simulation to the end and prints a summary on stdout.
fn run_headless(simulation: Simulation, json: bool) -> Result<()> {
    match simulation {
        Simulation::Clean {
            mut environment, ..
        } => {
            let status = environment.run_to_completion();
            let snapshot = environment.snapshot();
            if json {
                let summary = serde_json::json!({
                    "status": status,
                    "seed": environment.seed(),
                    "time_to_clean": environment.time_to_clean(),
                    "batteries": snapshot.batteries().collect::<Vec<_>>(),
                    "snapshot": snapshot,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("status: {:?}", status);
                println!("seed: {}", environment.seed());
                println!("steps: {}", snapshot.step);
                match environment.time_to_clean() {
                    Some(step) => println!("time to clean: {}", step),
                    None => println!("time to clean: not reached"),
                }
                println!(
                    "dirt: {} of {} left ({:.1}% clean)",
                    snapshot.remaining_dirty, snapshot.initial_dirty, snapshot.clean_percent
                );
                println!("moves: {}", snapshot.move_count);
                println!(
                    "average battery: {:.1} {:?}",
                    snapshot.avg_battery,
                    snapshot.batteries().collect::<Vec<_>>()
                );
                for cleaner in &snapshot.cleaners {
                    println!(
                        "cleaner {}: at ({}, {}) battery {} moves {} cleaned {} visited {}",
                        cleaner.id,
                        cleaner.position.x,
                        cleaner.position.y,
                        cleaner.battery,
                        cleaner.move_count,
                        cleaner.cleaned_count,
                        cleaner.visited_cells
                    );
                }
            }
        }
        Simulation::Life {
            mut automaton,
            max_generations,
        } => {
            while automaton.generation() < max_generations && automaton.step() {}
            let rows: Vec<String> = (0..automaton.cells().height())
                .map(|y| {
                    automaton
                        .row(y)
                        .into_iter()
                        .map(|cell| if cell.is_alive() { '#' } else { '.' })
                        .collect()
                })
                .collect();
            if json {
                let summary = serde_json::json!({
                    "mode": automaton.mode(),
                    "rule": automaton.rule().code(),
                    "generation": automaton.generation(),
                    "population": automaton.population(),
                    "rows": rows,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "{:?} rule {} generation {} population {}",
                    automaton.mode(),
                    automaton.rule().code(),
                    automaton.generation(),
                    automaton.population()
                );
                for row in rows {
                    println!("{}", row);
                }
            }
        }
    }
    Ok(())
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
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    let tick_rate = Duration::from_millis(150);
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
            app.tick();
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
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(2)])
        .split(frame.area());

    match &app.simulation {
        Simulation::Clean {
            environment,
            dirt_history,
        } => render_cleaning(frame, main_layout[0], environment, dirt_history),
        Simulation::Life {
            automaton,
            max_generations,
        } => render_life(frame, main_layout[0], automaton, *max_generations),
    }

    let state = if app.paused { "paused" } else { "running" };
    let help_text = Paragraph::new(format!(
        "[{}] 'space' to pause, 'q' or 'Esc' to quit.",
        state
    ))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[1]);
}

fn render_cleaning(frame: &mut Frame, area: Rect, environment: &Environment, dirt_history: &[u64]) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Totals
            Constraint::Min(3),    // Cleaners
            Constraint::Length(6), // Remaining dirt
        ])
        .split(columns[1]);

    render_floor(frame, columns[0], environment);

    let snapshot = environment.snapshot();
    let totals = Paragraph::new(vec![
        Line::from(format!(
            "Step {}/{}  {:?}",
            snapshot.step,
            environment.max_steps(),
            environment.status()
        )),
        Line::from(format!(
            "Dirt {}/{}  {:.1}% clean  Moves {}  Avg battery {:.1}",
            snapshot.remaining_dirty,
            snapshot.initial_dirty,
            snapshot.clean_percent,
            snapshot.move_count,
            snapshot.avg_battery
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title("Totals"));
    frame.render_widget(totals, side[0]);

    let cleaner_items: Vec<ListItem> = environment
        .cleaners()
        .map(|cleaner| {
            let level = cleaner.battery.level();
            let home = environment
                .shortest_path(cleaner.position, cleaner.home_charger)
                .map_or_else(|| "-".to_string(), |path| (path.len() - 1).to_string());
            ListItem::from(Line::from(vec![
                Span::styled(format!("#{} ", cleaner.id), Style::default().bold()),
                Span::raw(format!(
                    "({}, {}) ",
                    cleaner.position.x, cleaner.position.y
                )),
                Span::styled(format!("{:>3}% ", level), battery_style(level)),
                Span::raw(format!(
                    "moves {} cleaned {} visited {} home {}",
                    cleaner.move_count,
                    cleaner.cleaned_count,
                    cleaner.visited.len(),
                    home
                )),
            ]))
        })
        .collect();
    let cleaners =
        List::new(cleaner_items).block(Block::default().borders(Borders::ALL).title("Cleaners"));
    frame.render_widget(cleaners, side[1]);

    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title("Remaining dirt"))
        .data(dirt_history)
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(sparkline, side[2]);
}

fn battery_style(level: u32) -> Style {
    match level {
        0..=20 => Style::default().fg(Color::Red),
        21..=50 => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::Green),
    }
}

/// Renders the floor with cleaners on top.
fn render_floor(frame: &mut Frame, area: Rect, environment: &Environment) {
    let map = environment.terrain();
    let mut lines: Vec<Line> = Vec::with_capacity(map.height());

    for y in 0..map.height() {
        let mut spans: Vec<Span> = Vec::with_capacity(map.width());
        for x in 0..map.width() {
            let position = Position::new(x, y);
            let span = match environment.cleaner_at(position) {
                Some(id) => {
                    let level = environment
                        .get_cleaner_state(id)
                        .map_or(0, |cleaner| cleaner.battery.level());
                    Span::styled("@", battery_style(level).bold())
                }
                None => match map[position] {
                    CellKind::Floor => Span::raw(" "),
                    CellKind::Obstacle => Span::styled("#", Style::default().fg(Color::DarkGray)),
                    CellKind::Charger => Span::styled("C", Style::default().fg(Color::Cyan)),
                    CellKind::Patch { dirty: true } => {
                        Span::styled("*", Style::default().fg(Color::Yellow))
                    }
                    CellKind::Patch { dirty: false } => {
                        Span::styled(".", Style::default().fg(Color::DarkGray))
                    }
                },
            };
            spans.push(span);
        }
        lines.push(Line::from(spans));
    }

    let map_paragraph = Paragraph::new(lines)
        .block(Block::default().title("Cleaning World").borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(map_paragraph, area);
}

fn render_life(frame: &mut Frame, area: Rect, automaton: &Automaton, max_generations: u64) {
    let cells = automaton.cells();
    let lines: Vec<Line> = (0..cells.height())
        .map(|y| {
            let row: String = automaton
                .row(y)
                .into_iter()
                .map(|cell| match cell {
                    CellState::Alive => '█',
                    CellState::Dead => ' ',
                })
                .collect();
            Line::from(Span::styled(row, Style::default().fg(Color::Green)))
        })
        .collect();

    let title = format!(
        "{:?} rule {}  generation {}/{}  population {}",
        automaton.mode(),
        automaton.rule().code(),
        automaton.generation(),
        max_generations,
        automaton.population()
    );
    let paragraph = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(paragraph, area);
}
